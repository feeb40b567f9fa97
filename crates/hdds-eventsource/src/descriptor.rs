// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event descriptor and per-call write options.
//!
//! `EventDescriptor` is what the native consumer sees for every event:
//! identity, level, opcode and keywords. `EventOptions` is what the
//! instrumented caller passes to [`EventSource::write`](crate::EventSource::write).

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use uuid::Uuid;

/// Event verbosity (0 = always ... 5 = verbose).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(pub u8);

impl Level {
    pub const LOG_ALWAYS: Level = Level(0);
    pub const CRITICAL: Level = Level(1);
    pub const ERROR: Level = Level(2);
    pub const WARNING: Level = Level(3);
    pub const INFORMATIONAL: Level = Level(4);
    pub const VERBOSE: Level = Level(5);

    /// True when a session listening at `self` accepts an event of `event` level.
    ///
    /// A session level of 0 accepts everything.
    #[inline]
    pub fn accepts(self, event: Level) -> bool {
        self.0 == 0 || event.0 <= self.0
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::INFORMATIONAL
    }
}

/// Event opcode. Values above 2 are free for provider-defined semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Opcode(pub u8);

impl Opcode {
    pub const INFO: Opcode = Opcode(0);
    pub const START: Opcode = Opcode(1);
    pub const STOP: Opcode = Opcode(2);
}

/// 64-bit keyword flag set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Keywords(pub u64);

impl Keywords {
    pub const NONE: Keywords = Keywords(0);
    pub const ALL: Keywords = Keywords(u64::MAX);

    #[inline]
    pub fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Keyword match rule: an empty side matches anything, otherwise at
    /// least one bit must be shared.
    #[inline]
    pub fn matches(self, event: Keywords) -> bool {
        self.0 == 0 || event.0 == 0 || (self.0 & event.0) != 0
    }
}

impl BitOr for Keywords {
    type Output = Keywords;

    fn bitor(self, rhs: Self) -> Self::Output {
        Keywords(self.0 | rhs.0)
    }
}

impl BitOrAssign for Keywords {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Keywords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keywords({:#018x})", self.0)
    }
}

/// Per-event descriptor handed to the native consumer. Immutable per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDescriptor {
    pub identity: u32,
    pub level: Level,
    pub opcode: Opcode,
    pub keywords: Keywords,
}

impl EventDescriptor {
    pub fn new(identity: u32, level: Level, opcode: Opcode, keywords: Keywords) -> Self {
        Self {
            identity,
            level,
            opcode,
            keywords,
        }
    }
}

/// Controls automatic activity tracking for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivityOptions(u8);

impl ActivityOptions {
    pub const NONE: ActivityOptions = ActivityOptions(0);
    /// Do not touch the thread's activity chain for this event.
    pub const DISABLE: ActivityOptions = ActivityOptions(0x2);
    /// Allow a Start while an activity of the same name is already open.
    pub const RECURSIVE: ActivityOptions = ActivityOptions(0x4);

    #[inline]
    pub fn contains(self, other: ActivityOptions) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl BitOr for ActivityOptions {
    type Output = ActivityOptions;

    fn bitor(self, rhs: Self) -> Self::Output {
        ActivityOptions(self.0 | rhs.0)
    }
}

/// Caller-side options for a single write.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventOptions {
    pub level: Level,
    pub opcode: Opcode,
    pub keywords: Keywords,
    /// 28-bit provider-defined tags, encoded into the name metadata.
    pub tags: u32,
    pub activity_options: ActivityOptions,
    /// Explicit activity id. Supplying either explicit id disables
    /// automatic tracking for the event.
    pub activity_id: Option<Uuid>,
    pub related_activity_id: Option<Uuid>,
}

impl EventOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn opcode(mut self, opcode: Opcode) -> Self {
        self.opcode = opcode;
        self
    }

    pub fn keywords(mut self, keywords: Keywords) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn tags(mut self, tags: u32) -> Self {
        self.tags = tags;
        self
    }

    pub fn activity_options(mut self, options: ActivityOptions) -> Self {
        self.activity_options = options;
        self
    }

    pub fn activity_id(mut self, id: Uuid) -> Self {
        self.activity_id = Some(id);
        self
    }

    pub fn related_activity_id(mut self, id: Uuid) -> Self {
        self.related_activity_id = Some(id);
        self
    }

    pub(crate) fn has_explicit_activity(&self) -> bool {
        self.activity_id.is_some() || self.related_activity_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_accepts() {
        assert!(Level::VERBOSE.accepts(Level::INFORMATIONAL));
        assert!(!Level::WARNING.accepts(Level::INFORMATIONAL));
        assert!(Level::LOG_ALWAYS.accepts(Level::VERBOSE));
        assert!(Level::CRITICAL.accepts(Level::LOG_ALWAYS));
    }

    #[test]
    fn test_keywords_match_rule() {
        let session = Keywords(0b0110);
        assert!(session.matches(Keywords(0b0010)));
        assert!(!session.matches(Keywords(0b1000)));
        assert!(session.matches(Keywords::NONE));
        assert!(Keywords::NONE.matches(Keywords(0b1000)));
    }

    #[test]
    fn test_explicit_activity_detection() {
        assert!(!EventOptions::new().has_explicit_activity());
        let opts = EventOptions::new().related_activity_id(Uuid::from_u128(7));
        assert!(opts.has_explicit_activity());
    }
}
