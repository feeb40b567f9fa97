// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native writer boundary.
//!
//! The platform facility that actually records events sits behind
//! [`NativeSink`]. A source hands it a definition once per (name, tags, shape) to
//! obtain an [`EventHandle`], then one ordered segment list per write:
//!
//! ```text
//! [0] provider metadata   [1] name metadata   [2] type metadata
//! [3..] payload segments  (scalar | length, pinned)*
//! ```
//!
//! [`NullSink`] discards everything; [`MemorySink`] records owned copies for
//! inspection.

use crate::descriptor::EventDescriptor;
use crate::error::SinkError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Role of one segment in a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    ProviderMetadata,
    EventMetadata,
    TypeMetadata,
    /// Fixed-width field copied into scratch.
    Scalar,
    /// u16 LE element or byte count preceding a pinned segment.
    Length,
    /// Variable-length data borrowed from the payload.
    Pinned,
}

/// One contiguous byte range handed to the native writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub kind: SegmentKind,
    pub data: &'a [u8],
}

impl<'a> Segment<'a> {
    pub fn new(kind: SegmentKind, data: &'a [u8]) -> Self {
        Self { kind, data }
    }
}

/// Opaque handle for a defined event, issued by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(pub u64);

/// Inputs to [`NativeSink::define_event`].
#[derive(Debug, Clone, Copy)]
pub struct EventDefinition<'a> {
    pub provider_metadata: &'a [u8],
    pub name_metadata: &'a [u8],
    pub type_metadata: &'a [u8],
    pub descriptor: &'a EventDescriptor,
}

/// Platform event writer.
///
/// Implementations must be callable from any thread. `write` must not keep
/// references into `segments` past its return: pinned segments are released
/// as soon as the call completes.
pub trait NativeSink: Send + Sync {
    /// Register an event and return its handle.
    fn define_event(&self, definition: &EventDefinition<'_>) -> Result<EventHandle, SinkError>;

    /// Drop a handle that lost a definition race. Default: nothing to free.
    fn release_event(&self, _handle: EventHandle) {}

    /// Record one event.
    fn write(
        &self,
        handle: EventHandle,
        descriptor: &EventDescriptor,
        activity_id: Option<&Uuid>,
        related_activity_id: Option<&Uuid>,
        segments: &[Segment<'_>],
    ) -> Result<(), SinkError>;
}

/// Sink that accepts and discards everything.
#[derive(Debug, Default)]
pub struct NullSink {
    next_handle: AtomicU64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NativeSink for NullSink {
    fn define_event(&self, _definition: &EventDefinition<'_>) -> Result<EventHandle, SinkError> {
        Ok(EventHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1))
    }

    fn write(
        &self,
        _handle: EventHandle,
        _descriptor: &EventDescriptor,
        _activity_id: Option<&Uuid>,
        _related_activity_id: Option<&Uuid>,
        _segments: &[Segment<'_>],
    ) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Owned copy of one write, as seen by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub handle: EventHandle,
    pub descriptor: EventDescriptor,
    pub activity_id: Option<Uuid>,
    pub related_activity_id: Option<Uuid>,
    pub segments: Vec<(SegmentKind, Vec<u8>)>,
}

impl RecordedEvent {
    /// Payload segments only, in write order.
    pub fn payload(&self) -> impl Iterator<Item = &(SegmentKind, Vec<u8>)> {
        self.segments.iter().skip(3)
    }
}

/// Owned copy of one `define_event` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDefinition {
    pub handle: EventHandle,
    pub name_metadata: Vec<u8>,
    pub type_metadata: Vec<u8>,
}

/// In-memory sink that records every write. Used by tests and benches.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RecordedEvent>>,
    definitions: Mutex<Vec<RecordedDefinition>>,
    next_handle: AtomicU64,
    defined: AtomicU64,
    released: AtomicU64,
    fail_writes: Mutex<Option<SinkError>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with `error`; `None` to recover.
    pub fn fail_writes(&self, error: Option<SinkError>) {
        *self.fail_writes.lock() = error;
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Every definition handed out, in call order.
    pub fn definitions(&self) -> Vec<RecordedDefinition> {
        self.definitions.lock().clone()
    }

    /// Successful `define_event` calls.
    pub fn defined(&self) -> u64 {
        self.defined.load(Ordering::Relaxed)
    }

    /// `release_event` calls.
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }
}

impl NativeSink for MemorySink {
    fn define_event(&self, definition: &EventDefinition<'_>) -> Result<EventHandle, SinkError> {
        self.defined.fetch_add(1, Ordering::Relaxed);
        let handle = EventHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        self.definitions.lock().push(RecordedDefinition {
            handle,
            name_metadata: definition.name_metadata.to_vec(),
            type_metadata: definition.type_metadata.to_vec(),
        });
        Ok(handle)
    }

    fn release_event(&self, _handle: EventHandle) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    fn write(
        &self,
        handle: EventHandle,
        descriptor: &EventDescriptor,
        activity_id: Option<&Uuid>,
        related_activity_id: Option<&Uuid>,
        segments: &[Segment<'_>],
    ) -> Result<(), SinkError> {
        if let Some(err) = self.fail_writes.lock().clone() {
            return Err(err);
        }
        let recorded = RecordedEvent {
            handle,
            descriptor: *descriptor,
            activity_id: activity_id.copied(),
            related_activity_id: related_activity_id.copied(),
            segments: segments.iter().map(|s| (s.kind, s.data.to_vec())).collect(),
        };
        self.events.lock().push(recorded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Keywords, Level, Opcode};

    fn descriptor() -> EventDescriptor {
        EventDescriptor::new(1, Level::INFORMATIONAL, Opcode::INFO, Keywords::NONE)
    }

    #[test]
    fn test_memory_sink_records_segments() {
        let sink = MemorySink::new();
        let desc = descriptor();
        let def = EventDefinition {
            provider_metadata: &[4, 0, b'P', 0],
            name_metadata: &[3, 0, 0],
            type_metadata: &[2, 0],
            descriptor: &desc,
        };
        let handle = sink.define_event(&def).expect("define");
        assert_eq!(sink.defined(), 1);
        assert_eq!(sink.definitions()[0].type_metadata, vec![2, 0]);

        let segments = [
            Segment::new(SegmentKind::ProviderMetadata, def.provider_metadata),
            Segment::new(SegmentKind::EventMetadata, def.name_metadata),
            Segment::new(SegmentKind::TypeMetadata, def.type_metadata),
            Segment::new(SegmentKind::Scalar, &[1, 0, 0, 0]),
        ];
        sink.write(handle, &desc, None, None, &segments).expect("write");

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].handle, handle);
        let payload: Vec<_> = events[0].payload().collect();
        assert_eq!(payload, vec![&(SegmentKind::Scalar, vec![1, 0, 0, 0])]);
    }

    #[test]
    fn test_memory_sink_injected_failure() {
        let sink = MemorySink::new();
        sink.fail_writes(Some(SinkError::new(87, "invalid parameter")));
        let err = sink
            .write(EventHandle(1), &descriptor(), None, None, &[])
            .unwrap_err();
        assert_eq!(err.code, 87);
        assert!(sink.is_empty());

        sink.fail_writes(None);
        sink.write(EventHandle(1), &descriptor(), None, None, &[])
            .expect("recovered");
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_null_sink_hands_out_distinct_handles() {
        let sink = NullSink::new();
        let desc = descriptor();
        let def = EventDefinition {
            provider_metadata: &[],
            name_metadata: &[],
            type_metadata: &[],
            descriptor: &desc,
        };
        let a = sink.define_event(&def).expect("define");
        let b = sink.define_event(&def).expect("define");
        assert_ne!(a, b);
    }
}
