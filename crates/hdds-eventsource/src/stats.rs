// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-source emission counters.
//!
//! Counters use Relaxed atomics; a snapshot is a best-effort view, not a
//! consistent cut across counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by one event source.
#[derive(Debug, Default)]
pub struct EmissionStats {
    events_written: AtomicU64,
    events_suppressed: AtomicU64,
    encode_failures: AtomicU64,
    native_failures: AtomicU64,
    listener_deliveries: AtomicU64,
    listener_failures: AtomicU64,
}

/// Point-in-time copy of [`EmissionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Writes that reached the native sink or at least one listener.
    pub events_written: u64,
    /// Writes skipped because nothing was enabled for them.
    pub events_suppressed: u64,
    pub encode_failures: u64,
    pub native_failures: u64,
    pub listener_deliveries: u64,
    /// Listener callbacks that returned an error or panicked.
    pub listener_failures: u64,
    /// Pins held by in-flight writes at snapshot time.
    pub live_pins: usize,
}

impl EmissionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_written(&self) {
        self.events_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed(&self) {
        self.events_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_native_failure(&self) {
        self.native_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_listener_delivery(&self) {
        self.listener_deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_listener_failure(&self) {
        self.listener_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters; `live_pins` comes from the source's pin ledger.
    pub fn snapshot(&self, live_pins: usize) -> StatsSnapshot {
        StatsSnapshot {
            events_written: self.events_written.load(Ordering::Relaxed),
            events_suppressed: self.events_suppressed.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            native_failures: self.native_failures.load(Ordering::Relaxed),
            listener_deliveries: self.listener_deliveries.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
            live_pins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = EmissionStats::new();
        stats.record_written();
        stats.record_written();
        stats.record_suppressed();
        stats.record_listener_failure();

        let snap = stats.snapshot(0);
        assert_eq!(snap.events_written, 2);
        assert_eq!(snap.events_suppressed, 1);
        assert_eq!(snap.listener_failures, 1);
        assert_eq!(snap.encode_failures, 0);
        assert_eq!(snap.live_pins, 0);
    }
}
