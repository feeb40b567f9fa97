// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process listeners.
//!
//! Subscriptions live in a copy-on-write list: adding or removing a listener
//! swaps in a new list, dispatch reads the current one without locking.
//! Delivery is synchronous, on the emitting thread, in registration order.

use crate::descriptor::{EventDescriptor, Keywords, Level};
use crate::error::ListenerError;
use crate::stats::EmissionStats;
use crate::types::Payload;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Decoded event as delivered to listeners.
#[derive(Debug, Clone, Copy)]
pub struct EventWritten<'e> {
    pub source_name: &'e str,
    pub source_guid: Uuid,
    pub event_name: &'e str,
    pub descriptor: EventDescriptor,
    pub tags: u32,
    pub activity_id: Option<Uuid>,
    pub related_activity_id: Option<Uuid>,
    /// Field names and values in declaration order.
    pub payload: &'e Payload,
}

/// Receives events written by an [`EventSource`](crate::EventSource).
///
/// A listener may write events itself; each nested write gets its own frame.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &EventWritten<'_>) -> Result<(), ListenerError>;
}

/// Listener backed by a closure.
///
/// # Example
///
/// ```rust
/// use hdds_eventsource::ClosureListener;
///
/// let listener = ClosureListener::new(|event| {
///     println!("{}: {} fields", event.event_name, event.payload.len());
/// });
/// ```
pub struct ClosureListener<F>
where
    F: Fn(&EventWritten<'_>) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureListener<F>
where
    F: Fn(&EventWritten<'_>) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventListener for ClosureListener<F>
where
    F: Fn(&EventWritten<'_>) + Send + Sync,
{
    fn on_event(&self, event: &EventWritten<'_>) -> Result<(), ListenerError> {
        (self.callback)(event);
        Ok(())
    }
}

/// Level/keyword filter of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerFilter {
    pub level: Level,
    pub keywords: Keywords,
}

impl ListenerFilter {
    pub fn new(level: Level, keywords: Keywords) -> Self {
        Self { level, keywords }
    }

    /// Every level, every keyword.
    pub fn all() -> Self {
        Self::new(Level::LOG_ALWAYS, Keywords::NONE)
    }

    #[inline]
    pub fn accepts(&self, level: Level, keywords: Keywords) -> bool {
        self.level.accepts(level) && self.keywords.matches(keywords)
    }
}

impl Default for ListenerFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Token returned by [`ListenerRegistry::add`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Subscription {
    id: ListenerId,
    filter: ListenerFilter,
    listener: Arc<dyn EventListener>,
}

/// Ordered, copy-on-write list of subscriptions.
pub struct ListenerRegistry {
    subscriptions: ArcSwap<Vec<Arc<Subscription>>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe `listener`; it is dispatched after every earlier subscriber.
    pub fn add(&self, listener: Arc<dyn EventListener>, filter: ListenerFilter) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let sub = Arc::new(Subscription {
            id,
            filter,
            listener,
        });
        self.subscriptions.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&sub));
            next
        });
        id
    }

    /// Unsubscribe; `false` if `id` was not subscribed.
    pub fn remove(&self, id: ListenerId) -> bool {
        let previous = self.subscriptions.rcu(|current| {
            current
                .iter()
                .filter(|s| s.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.load().is_empty()
    }

    /// True if any subscription accepts an event at `level`/`keywords`.
    #[inline]
    pub fn any_enabled(&self, level: Level, keywords: Keywords) -> bool {
        self.subscriptions
            .load()
            .iter()
            .any(|s| s.filter.accepts(level, keywords))
    }

    /// Deliver `event` to every accepting subscriber, in order.
    ///
    /// Errors and panics are isolated per listener: they are logged and
    /// counted, and dispatch moves on. Returns the number of failures.
    pub fn dispatch(&self, event: &EventWritten<'_>, stats: &EmissionStats) -> usize {
        let subscriptions = self.subscriptions.load_full();
        let mut failures = 0;

        for sub in subscriptions.iter() {
            if !sub
                .filter
                .accepts(event.descriptor.level, event.descriptor.keywords)
            {
                continue;
            }

            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                sub.listener.on_event(event)
            }));

            match result {
                Ok(Ok(())) => stats.record_listener_delivery(),
                Ok(Err(e)) => {
                    failures += 1;
                    stats.record_listener_failure();
                    log::warn!(
                        "[eventsource] listener {:?} failed on '{}': {e}",
                        sub.id,
                        event.event_name
                    );
                }
                Err(_) => {
                    failures += 1;
                    stats.record_listener_failure();
                    log::warn!(
                        "[eventsource] listener {:?} panicked on '{}'",
                        sub.id,
                        event.event_name
                    );
                }
            }
        }

        failures
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
