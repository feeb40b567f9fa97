// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-thread activity correlation.
//!
//! Each thread keeps a chain of open activities. A Start event pushes a
//! fresh id whose related id is the activity that was current; the matching
//! Stop pops back to that parent. Chains never cross threads: propagating an
//! activity elsewhere means passing its id explicitly in
//! [`EventOptions`](crate::EventOptions).

use crate::descriptor::ActivityOptions;
use std::cell::RefCell;
use uuid::Uuid;

const START_SUFFIX: &str = "Start";
const STOP_SUFFIX: &str = "Stop";

#[derive(Debug, Clone)]
struct OpenActivity {
    id: Uuid,
    source: Uuid,
    name: String,
}

thread_local! {
    static CHAIN: RefCell<Vec<OpenActivity>> = const { RefCell::new(Vec::new()) };
}

/// Ids attached to a Start event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityIds {
    pub activity_id: Option<Uuid>,
    pub related_activity_id: Option<Uuid>,
}

/// Activity name shared by a Start/Stop pair: the event name without its
/// `Start` or `Stop` suffix.
pub fn activity_name(event_name: &str) -> &str {
    event_name
        .strip_suffix(START_SUFFIX)
        .or_else(|| event_name.strip_suffix(STOP_SUFFIX))
        .unwrap_or(event_name)
}

/// Handle to the calling thread's activity chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityTracker;

impl ActivityTracker {
    pub fn new() -> Self {
        Self
    }

    /// Open an activity for a Start event of `source`.
    ///
    /// Unless `options` has [`ActivityOptions::RECURSIVE`], an activity of
    /// the same name already open for this source is closed first, along
    /// with everything opened after it.
    pub fn on_start(&self, source: Uuid, event_name: &str, options: ActivityOptions) -> ActivityIds {
        if options.contains(ActivityOptions::DISABLE) {
            return ActivityIds {
                activity_id: self.current(),
                related_activity_id: None,
            };
        }

        let name = activity_name(event_name);
        CHAIN.with(|chain| {
            let mut chain = chain.borrow_mut();
            if !options.contains(ActivityOptions::RECURSIVE) {
                if let Some(pos) = find(&chain, source, name) {
                    log::debug!(
                        "[eventsource] restarting activity '{name}', closing {} open",
                        chain.len() - pos
                    );
                    chain.truncate(pos);
                }
            }

            let related = chain.last().map(|a| a.id);
            let id = Uuid::new_v4();
            chain.push(OpenActivity {
                id,
                source,
                name: name.to_string(),
            });
            ActivityIds {
                activity_id: Some(id),
                related_activity_id: related,
            }
        })
    }

    /// Close the activity matching a Stop event and return its id.
    ///
    /// Activities opened after the matching one are closed with it. `None`
    /// if no activity of that name is open for `source`.
    pub fn on_stop(&self, source: Uuid, event_name: &str, options: ActivityOptions) -> Option<Uuid> {
        if options.contains(ActivityOptions::DISABLE) {
            return self.current();
        }

        let name = activity_name(event_name);
        CHAIN.with(|chain| {
            let mut chain = chain.borrow_mut();
            let pos = find(&chain, source, name)?;
            let id = chain[pos].id;
            chain.truncate(pos);
            Some(id)
        })
    }

    /// Drop activity `id` opened on this thread by a Start that was never
    /// written, together with anything opened after it.
    pub fn abandon(&self, id: Uuid) {
        CHAIN.with(|chain| {
            let mut chain = chain.borrow_mut();
            if let Some(pos) = chain.iter().rposition(|a| a.id == id) {
                chain.truncate(pos);
            }
        });
    }

    /// Innermost open activity on this thread.
    pub fn current(&self) -> Option<Uuid> {
        CHAIN.with(|chain| chain.borrow().last().map(|a| a.id))
    }

    /// Open activities on this thread.
    pub fn depth(&self) -> usize {
        CHAIN.with(|chain| chain.borrow().len())
    }
}

fn find(chain: &[OpenActivity], source: Uuid, name: &str) -> Option<usize> {
    chain
        .iter()
        .rposition(|a| a.source == source && a.name == name)
}
