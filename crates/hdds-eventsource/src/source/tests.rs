// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//! Tests for EventSource.

use super::*;
use crate::config::EventSourceConfig;
use crate::descriptor::ActivityOptions;
use crate::error::EmitFailure;
use crate::listener::ClosureListener;
use crate::sink::MemorySink;
use crate::types::{FieldKind, FieldValue, ShapeBuilder, Value};
use parking_lot::Mutex;
use std::sync::Weak;

struct Request {
    url: String,
    status: u16,
}

impl EventPayload for Request {
    const NAME: &'static str = "Request";

    fn describe(shape: &mut ShapeBuilder<Self>) {
        shape
            .field("url", FieldKind::Str, |r| FieldValue::Str(&r.url))
            .field("status", FieldKind::U16, |r| FieldValue::U16(r.status));
    }
}

struct Unmappable;

impl EventPayload for Unmappable {
    const NAME: &'static str = "Unmappable";

    fn describe(shape: &mut ShapeBuilder<Self>) {
        shape.field("map", FieldKind::Other("BTreeMap<u8, u8>"), |_| FieldValue::U8(0));
    }
}

struct Tally {
    count: u32,
}

impl EventPayload for Tally {
    const NAME: &'static str = "Tally";

    fn describe(shape: &mut ShapeBuilder<Self>) {
        shape.field("count", FieldKind::U32, |t| FieldValue::U32(t.count));
    }
}

/// Sink that closes its source from inside `define_event`.
#[derive(Default)]
struct ClosingSink {
    inner: MemorySink,
    source: Mutex<Weak<EventSource>>,
}

impl NativeSink for ClosingSink {
    fn define_event(&self, definition: &EventDefinition<'_>) -> core::result::Result<EventHandle, SinkError> {
        let handle = self.inner.define_event(definition)?;
        if let Some(source) = self.source.lock().upgrade() {
            source.close();
        }
        Ok(handle)
    }

    fn release_event(&self, handle: EventHandle) {
        self.inner.release_event(handle);
    }

    fn write(
        &self,
        handle: EventHandle,
        descriptor: &EventDescriptor,
        activity_id: Option<&Uuid>,
        related_activity_id: Option<&Uuid>,
        segments: &[Segment<'_>],
    ) -> core::result::Result<(), SinkError> {
        self.inner
            .write(handle, descriptor, activity_id, related_activity_id, segments)
    }
}

fn request() -> Request {
    Request {
        url: "/orders".into(),
        status: 200,
    }
}

fn recording_source() -> (EventSource, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let source = EventSource::builder("Contoso-Orders")
        .sink(sink.clone())
        .native_session(Level::VERBOSE, Keywords::NONE)
        .build()
        .expect("valid source");
    (source, sink)
}

#[test]
fn test_builder_rejects_malformed_trait() {
    let err = EventSource::builder("Bad")
        .with_trait("ETW_GROUP", "#ABC")
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    let err = EventSource::builder("Bad")
        .with_trait("ETW_X", "@v")
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("unknown trait number"));
}

#[test]
fn test_builder_keeps_traits_and_derives_guid() {
    let source = EventSource::builder("Contoso-Orders")
        .with_trait("ETW_GROUP", "{4f50731a-89cf-4782-b3e0-dce8c90476ba}")
        .with_trait("Owner", "@billing-team")
        .build()
        .expect("valid source");

    assert_eq!(source.get_trait("Owner"), Some("@billing-team"));
    assert_eq!(source.get_trait("Missing"), None);
    assert_eq!(source.guid(), crate::config::guid_from_name("Contoso-Orders"));
    assert!(!source.is_native_enabled());
}

#[test]
fn test_builder_from_config() {
    let config = EventSourceConfig::from_toml_str(
        r##"
        name = "Fabrikam"
        guid = "00000000-0000-0000-0000-0000000000aa"

        [[traits]]
        key = "ETW_3"
        value = "#00 ff"
        "##,
    )
    .expect("valid config");

    let source = EventSourceBuilder::from_config(&config)
        .build()
        .expect("valid source");
    assert_eq!(source.name(), "Fabrikam");
    assert_eq!(source.guid(), Uuid::from_u128(0xaa));
    assert!(source.provider_metadata().ends_with(&[5, 0, 3, 0x00, 0xff]));
}

#[test]
fn test_disabled_write_does_nothing() {
    let (source, sink) = recording_source();
    source.disable_native();

    source
        .write("Request", &EventOptions::new(), &request())
        .expect("suppressed write is ok");
    assert!(sink.is_empty());
    assert_eq!(source.registered_shapes(), 0);
    assert_eq!(source.resolved_names(), 0);
    assert_eq!(source.stats().events_suppressed, 1);
}

#[test]
fn test_native_level_filter() {
    let (source, sink) = recording_source();
    source.enable_native(Level::WARNING, Keywords::NONE);

    assert!(!source.is_enabled(Level::VERBOSE, Keywords::NONE));
    assert!(source.is_enabled(Level::ERROR, Keywords::NONE));

    let verbose = EventOptions::new().level(Level::VERBOSE);
    source.write("Request", &verbose, &request()).expect("write");
    assert!(sink.is_empty());

    let error = EventOptions::new().level(Level::ERROR);
    source.write("Request", &error, &request()).expect("write");
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_write_segment_order() {
    let (source, sink) = recording_source();
    source
        .write("Request", &EventOptions::new().tags(0x5), &request())
        .expect("write");

    let events = sink.events();
    assert_eq!(events.len(), 1);
    let kinds: Vec<_> = events[0].segments.iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![
            SegmentKind::ProviderMetadata,
            SegmentKind::EventMetadata,
            SegmentKind::TypeMetadata,
            SegmentKind::Length,
            SegmentKind::Pinned,
            SegmentKind::Scalar,
        ]
    );
    assert_eq!(events[0].segments[0].1, source.provider_metadata());
    assert_eq!(events[0].segments[4].1, b"/orders");
    assert_eq!(events[0].segments[5].1, 200u16.to_le_bytes());
    assert_eq!(source.stats().live_pins, 0);
}

#[test]
fn test_handle_defined_once_per_name() {
    let (source, sink) = recording_source();
    for _ in 0..5 {
        source
            .write("Request", &EventOptions::new(), &request())
            .expect("write");
    }
    source
        .write("Other", &EventOptions::new(), &request())
        .expect("write");

    assert_eq!(sink.defined(), 2);
    let events = sink.events();
    assert!(events[..5].iter().all(|e| e.handle == events[0].handle));
    assert_ne!(events[5].handle, events[0].handle);
    assert_ne!(
        events[5].descriptor.identity,
        events[0].descriptor.identity
    );
}

#[test]
fn test_handle_per_payload_shape() {
    let (source, sink) = recording_source();
    source
        .write("Evt", &EventOptions::new(), &Tally { count: 3 })
        .expect("first shape");
    source
        .write("Evt", &EventOptions::new(), &request())
        .expect("second shape");
    source
        .write("Evt", &EventOptions::new(), &Tally { count: 4 })
        .expect("first shape again");

    let definitions = sink.definitions();
    let events = sink.events();
    assert_eq!(definitions.len(), 2);
    assert_ne!(events[0].handle, events[1].handle);
    assert_eq!(events[2].handle, events[0].handle);
    assert_eq!(events[0].descriptor.identity, events[1].descriptor.identity);

    for event in &events {
        let definition = definitions
            .iter()
            .find(|d| d.handle == event.handle)
            .expect("handle was defined");
        assert_eq!(definition.type_metadata, event.segments[2].1);
    }

    source.close();
    assert_eq!(sink.released(), 2);
}

#[test]
fn test_native_failure_is_wrapped_and_not_sticky() {
    let (source, sink) = recording_source();
    sink.fail_writes(Some(SinkError::new(8, "out of buffers")));

    let err = source
        .write("Request", &EventOptions::new(), &request())
        .unwrap_err();
    match err {
        Error::Emission { event, source: EmitFailure::Native(cause) } => {
            assert_eq!(event, "Request");
            assert_eq!(cause.code, 8);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(source.stats().native_failures, 1);
    assert_eq!(source.stats().live_pins, 0);

    sink.fail_writes(None);
    source
        .write("Request", &EventOptions::new(), &request())
        .expect("later writes still go through");
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_unsupported_shape_fails_registration() {
    let (source, sink) = recording_source();
    for _ in 0..2 {
        let err = source
            .write("Bad", &EventOptions::new(), &Unmappable)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFieldType { shape: "Unmappable", .. }));
    }
    assert!(sink.is_empty());

    source
        .write("Request", &EventOptions::new(), &request())
        .expect("other shapes unaffected");
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_start_stop_correlation() {
    let (source, sink) = recording_source();
    let start = EventOptions::new().opcode(Opcode::START);
    let stop = EventOptions::new().opcode(Opcode::STOP);

    source.write("RequestStart", &start, &request()).expect("start");
    source.write("Progress", &EventOptions::new(), &request()).expect("info");
    source.write("RequestStop", &stop, &request()).expect("stop");
    source.write("Idle", &EventOptions::new(), &()).expect("info");

    let events = sink.events();
    let started = events[0].activity_id.expect("start has an activity");
    assert_eq!(events[1].activity_id, Some(started));
    assert_eq!(events[2].activity_id, Some(started));
    assert_eq!(events[3].activity_id, None);
    assert_eq!(source.tracker.current(), None);
}

#[test]
fn test_explicit_ids_suppress_tracking() {
    let (source, sink) = recording_source();
    let related = Uuid::from_u128(0x77);
    let start = EventOptions::new()
        .opcode(Opcode::START)
        .related_activity_id(related);

    source.write("JobStart", &start, &request()).expect("start");

    let events = sink.events();
    assert_eq!(events[0].activity_id, None);
    assert_eq!(events[0].related_activity_id, Some(related));
    assert_eq!(source.tracker.depth(), 0);
}

#[test]
fn test_disabled_activity_tracking() {
    let (source, sink) = recording_source();
    let start = EventOptions::new()
        .opcode(Opcode::START)
        .activity_options(ActivityOptions::DISABLE);
    source.write("QuietStart", &start, &request()).expect("start");
    assert_eq!(sink.events()[0].activity_id, None);
    assert_eq!(source.tracker.depth(), 0);
}

#[test]
fn test_listener_receives_decoded_payload() {
    let (source, _sink) = recording_source();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&seen);
    source.add_listener(
        Arc::new(ClosureListener::new(move |event| {
            let fields: Vec<(String, Value)> = event
                .payload
                .iter()
                .map(|(n, v)| (n.to_string(), v.clone()))
                .collect();
            captured.lock().push((event.event_name.to_string(), fields));
        })),
        ListenerFilter::all(),
    );

    source
        .write("Request", &EventOptions::new(), &request())
        .expect("write");

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "Request");
    assert_eq!(
        seen[0].1,
        vec![
            ("url".to_string(), Value::Str("/orders".into())),
            ("status".to_string(), Value::U16(200)),
        ]
    );
}

#[test]
fn test_listener_only_source_skips_native() {
    let sink = Arc::new(MemorySink::new());
    let source = EventSource::builder("ListenOnly")
        .sink(sink.clone())
        .build()
        .expect("valid source");
    let count = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&count);
    source.add_listener(
        Arc::new(ClosureListener::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        })),
        ListenerFilter::all(),
    );

    source
        .write("Request", &EventOptions::new(), &request())
        .expect("write");
    assert_eq!(count.load(Ordering::Relaxed), 1);
    assert!(sink.is_empty());
    assert_eq!(sink.defined(), 0);
}

#[test]
fn test_nested_write_from_listener() {
    let (source, sink) = recording_source();
    let source = Arc::new(source);
    let weak = Arc::downgrade(&source);
    source.add_listener(
        Arc::new(ClosureListener::new(move |event| {
            if event.event_name != "Request" {
                return;
            }
            if let Some(source) = weak.upgrade() {
                source
                    .write("Audit", &EventOptions::new(), &())
                    .expect("nested write");
            }
        })),
        ListenerFilter::all(),
    );

    source
        .write("Request", &EventOptions::new(), &request())
        .expect("write");

    let names: Vec<_> = sink
        .events()
        .iter()
        .map(|e| e.descriptor.identity)
        .collect();
    assert_eq!(names.len(), 2);
    assert_eq!(source.stats().live_pins, 0);
}

#[test]
fn test_close_drops_writes_and_releases_handles() {
    let (source, sink) = recording_source();
    source
        .write("Request", &EventOptions::new(), &request())
        .expect("write");
    source.close();
    source.close();

    assert!(source.is_closed());
    assert_eq!(sink.released(), 1);

    source.enable_native(Level::VERBOSE, Keywords::NONE);
    source
        .write("Request", &EventOptions::new(), &request())
        .expect("closed source drops silently");
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_close_during_definition_drops_write() {
    let sink = Arc::new(ClosingSink::default());
    let source = Arc::new(
        EventSource::builder("Contoso-Closing")
            .sink(sink.clone())
            .native_session(Level::VERBOSE, Keywords::NONE)
            .build()
            .expect("valid source"),
    );
    *sink.source.lock() = Arc::downgrade(&source);

    source
        .write("Request", &EventOptions::new(), &request())
        .expect("closing source drops silently");

    assert!(source.is_closed());
    assert!(sink.inner.is_empty());
    assert_eq!(sink.inner.defined(), 1);
    assert_eq!(sink.inner.released(), 1);
    assert_eq!(source.stats().events_written, 0);
}

#[test]
fn test_failed_start_does_not_stay_open() {
    let (source, sink) = recording_source();
    let start = EventOptions::new().opcode(Opcode::START);

    sink.fail_writes(Some(SinkError::new(8, "out of buffers")));
    assert!(source.write("JobStart", &start, &request()).is_err());
    assert_eq!(source.tracker.depth(), 0);

    sink.fail_writes(None);
    let oversized = Request {
        url: "u".repeat(70_000),
        status: 500,
    };
    assert!(source.write("JobStart", &start, &oversized).is_err());
    assert_eq!(source.tracker.depth(), 0);

    source.write("TaskStart", &start, &request()).expect("start");
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].related_activity_id, None);
    source
        .write("TaskStop", &EventOptions::new().opcode(Opcode::STOP), &request())
        .expect("stop");
    assert_eq!(source.tracker.depth(), 0);
}

#[test]
fn test_define_event_and_write_raw() {
    let (source, sink) = recording_source();
    let options = EventOptions::new().level(Level::WARNING);
    let (descriptor, handle) = source
        .define_event::<Request>("Raw", &options)
        .expect("define")
        .expect("open");

    let status = 404u16.to_le_bytes();
    let segments = [
        Segment::new(SegmentKind::ProviderMetadata, source.provider_metadata()),
        Segment::new(SegmentKind::Scalar, &status),
    ];
    let activity = Uuid::from_u128(9);
    source
        .write_raw("Raw", &descriptor, handle, Some(&activity), None, &segments)
        .expect("raw write");

    let events = sink.events();
    assert_eq!(events[0].handle, handle);
    assert_eq!(events[0].descriptor.level, Level::WARNING);
    assert_eq!(events[0].activity_id, Some(activity));
    assert_eq!(events[0].segments.len(), 2);
    assert_eq!(sink.defined(), 1);
}

#[test]
fn test_write_raw_respects_native_filter() {
    let (source, sink) = recording_source();
    let (descriptor, handle) = source
        .define_event::<()>("Raw", &EventOptions::new())
        .expect("define")
        .expect("open");
    source.disable_native();
    source
        .write_raw("Raw", &descriptor, handle, None, None, &[])
        .expect("suppressed");
    assert!(sink.is_empty());
}
