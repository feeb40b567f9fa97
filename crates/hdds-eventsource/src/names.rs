// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Name/identity cache: (event name, tags) -> identity + name metadata.
//!
//! Entries are created once and never mutated afterwards, except for the
//! native handles, memoized per payload shape on first use. Handle creation
//! runs without holding any cache lock: concurrent first writers may each
//! define the event, the first to publish wins and the others release their
//! handle.

use crate::error::{EncodeError, SinkError};
use crate::metadata::name_metadata;
use crate::sink::{EventDefinition, EventHandle, NativeSink};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Cached identity and metadata for one (name, tags) pair.
#[derive(Debug)]
pub struct NameInfo {
    name: String,
    tags: u32,
    identity: u32,
    name_metadata: Vec<u8>,
    handles: DashMap<TypeId, EventHandle>,
}

impl NameInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> u32 {
        self.tags
    }

    /// Process-stable identity, unique within the owning source.
    pub fn identity(&self) -> u32 {
        self.identity
    }

    /// Serialized segment 1.
    pub fn name_metadata(&self) -> &[u8] {
        &self.name_metadata
    }

    /// Native handle defined for payload shape `shape`, if any.
    pub fn handle(&self, shape: TypeId) -> Option<EventHandle> {
        self.handles.get(&shape).map(|h| *h.value())
    }

    /// Number of payload shapes defined natively under this name.
    pub fn defined_shapes(&self) -> usize {
        self.handles.len()
    }

    fn take_handles(&self) -> Vec<EventHandle> {
        let shapes: Vec<TypeId> = self.handles.iter().map(|h| *h.key()).collect();
        shapes
            .into_iter()
            .filter_map(|shape| self.handles.remove(&shape).map(|(_, h)| h))
            .collect()
    }
}

/// Per-source cache of [`NameInfo`] entries.
#[derive(Debug)]
pub struct NameCache {
    entries: DashMap<(String, u32), Arc<NameInfo>>,
    next_identity: AtomicU32,
    closed: AtomicBool,
}

impl NameCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_identity: AtomicU32::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Cached entry for `(name, tags)`, created on first use.
    ///
    /// Returns `Ok(None)` once the cache is closed.
    pub fn resolve(&self, name: &str, tags: u32) -> Result<Option<Arc<NameInfo>>, EncodeError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let key = (name.to_string(), tags);
        if let Some(info) = self.entries.get(&key) {
            return Ok(Some(Arc::clone(info.value())));
        }

        let info = self
            .entries
            .entry(key)
            .or_try_insert_with(|| {
                let name_metadata = name_metadata(name, tags)?;
                let identity = self.next_identity.fetch_add(1, Ordering::Relaxed);
                log::debug!("[eventsource] event '{name}' (tags {tags:#x}) -> identity {identity}");
                Ok::<_, EncodeError>(Arc::new(NameInfo {
                    name: name.to_string(),
                    tags,
                    identity,
                    name_metadata,
                    handles: DashMap::new(),
                }))
            })?
            .value()
            .clone();
        Ok(Some(info))
    }

    /// Native handle for `info` written with payload shape `shape`,
    /// defining the event on first use.
    ///
    /// Idempotent per shape; losers of a concurrent definition race release
    /// their handle and adopt the winner's. Returns `Ok(None)` when the cache
    /// was closed while the definition was in flight: the handle is released
    /// here and the write must be dropped.
    pub fn get_or_create_handle(
        &self,
        info: &NameInfo,
        shape: TypeId,
        definition: &EventDefinition<'_>,
        sink: &dyn NativeSink,
    ) -> Result<Option<EventHandle>, SinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        if let Some(handle) = info.handle(shape) {
            return Ok(Some(handle));
        }

        let created = sink.define_event(definition)?;
        let winner = match info.handles.entry(shape) {
            Entry::Occupied(winner) => Some(*winner.get()),
            Entry::Vacant(slot) => {
                slot.insert(created);
                None
            }
        };
        let handle = match winner {
            Some(winner) => {
                sink.release_event(created);
                log::debug!(
                    "[eventsource] lost handle race for '{}', released {created:?}",
                    info.name
                );
                winner
            }
            None => {
                log::debug!("[eventsource] defined '{}' as {created:?}", info.name);
                created
            }
        };

        // close() drains handles after raising the flag; whoever removes a
        // handle releases it.
        if self.closed.load(Ordering::SeqCst) {
            if let Some((_, orphan)) = info.handles.remove(&shape) {
                sink.release_event(orphan);
                log::debug!(
                    "[eventsource] '{}' closed during definition, released {orphan:?}",
                    info.name
                );
            }
            return Ok(None);
        }
        Ok(Some(handle))
    }

    /// Stop handing out entries and return every handle created so far.
    pub fn close(&self) -> Vec<EventHandle> {
        self.closed.store(true, Ordering::SeqCst);
        let handles = self
            .entries
            .iter()
            .flat_map(|entry| entry.value().take_handles())
            .collect();
        self.entries.clear();
        handles
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for NameCache {
    fn default() -> Self {
        Self::new()
    }
}
