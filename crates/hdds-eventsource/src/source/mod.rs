// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event source: the write pipeline.
//!
//! ```text
//! write(name, options, payload)
//!   |- enabled?  (native session or any listener)   -- no -> return
//!   |- register shape          (TypeRegistry, cached)
//!   |- resolve (name, tags)    (NameCache, cached)  -- closed -> return
//!   |- activity ids            (explicit > tracked > none)
//!   |- encode into frame       (scratch + pins, released on drop)
//!   |- native write            [provider, name, type, payload...]
//!   `- listener fan-out        (decoded, registration order)
//! ```

mod builder;

pub use builder::EventSourceBuilder;

use crate::activity::{ActivityIds, ActivityTracker};
use crate::descriptor::{ActivityOptions, EventDescriptor, EventOptions, Keywords, Level, Opcode};
use crate::error::{EncodeError, Error, Result, SinkError};
use crate::frame::{PinLedger, ScratchFrame};
use crate::listener::{EventListener, EventWritten, ListenerFilter, ListenerId, ListenerRegistry};
use crate::names::{NameCache, NameInfo};
use crate::sink::{EventDefinition, EventHandle, NativeSink, Segment, SegmentKind};
use crate::stats::{EmissionStats, StatsSnapshot};
use crate::types::{decode_payload, EventPayload, Payload, TypeDescriptorSet, TypeRegistry};
use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Which consumers a write is routed to.
#[derive(Debug, Clone, Copy)]
struct Route {
    native: bool,
    listeners: bool,
}

/// Result of a successfully encoded write.
struct Emitted {
    /// `Ok(false)` when the source closed while the event was being defined.
    native: core::result::Result<bool, SinkError>,
    payload: Option<Payload>,
}

/// A named provider of structured events.
///
/// Cheap to share (`Arc<EventSource>`); every method takes `&self` and may
/// be called from any thread.
pub struct EventSource {
    name: String,
    guid: Uuid,
    traits: Vec<(String, String)>,
    provider_metadata: Vec<u8>,
    sink: Arc<dyn NativeSink>,

    native_enabled: AtomicBool,
    native_level: AtomicU8,
    native_keywords: AtomicU64,

    types: TypeRegistry,
    names: NameCache,
    listeners: ListenerRegistry,
    tracker: ActivityTracker,
    stats: EmissionStats,
    ledger: PinLedger,
}

impl EventSource {
    pub fn builder(name: impl Into<String>) -> EventSourceBuilder {
        EventSourceBuilder::new(name)
    }

    /// Source with default settings and a discarding native sink.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        EventSourceBuilder::new(name).build()
    }

    pub(crate) fn from_parts(
        name: String,
        guid: Uuid,
        traits: Vec<(String, String)>,
        provider_metadata: Vec<u8>,
        sink: Arc<dyn NativeSink>,
    ) -> Self {
        Self {
            name,
            guid,
            traits,
            provider_metadata,
            sink,
            native_enabled: AtomicBool::new(false),
            native_level: AtomicU8::new(0),
            native_keywords: AtomicU64::new(0),
            types: TypeRegistry::new(),
            names: NameCache::new(),
            listeners: ListenerRegistry::new(),
            tracker: ActivityTracker::new(),
            stats: EmissionStats::new(),
            ledger: PinLedger::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn guid(&self) -> Uuid {
        self.guid
    }

    /// Value of the provider trait `key`, as configured.
    pub fn get_trait(&self, key: &str) -> Option<&str> {
        self.traits
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Serialized segment 0, for callers assembling raw writes.
    pub fn provider_metadata(&self) -> &[u8] {
        &self.provider_metadata
    }

    // ------------------------------------------------------------------
    // Enablement
    // ------------------------------------------------------------------

    /// Enable the native session at `level`/`keywords`.
    pub fn enable_native(&self, level: Level, keywords: Keywords) {
        self.native_level.store(level.0, Ordering::Relaxed);
        self.native_keywords.store(keywords.0, Ordering::Relaxed);
        self.native_enabled.store(true, Ordering::Release);
        log::debug!(
            "[eventsource] '{}' native session enabled (level {}, keywords {:?})",
            self.name,
            level.0,
            keywords
        );
    }

    pub fn disable_native(&self) {
        self.native_enabled.store(false, Ordering::Release);
        log::debug!("[eventsource] '{}' native session disabled", self.name);
    }

    pub fn is_native_enabled(&self) -> bool {
        self.native_enabled.load(Ordering::Acquire)
    }

    #[inline]
    fn native_accepts(&self, level: Level, keywords: Keywords) -> bool {
        self.native_enabled.load(Ordering::Acquire)
            && Level(self.native_level.load(Ordering::Relaxed)).accepts(level)
            && Keywords(self.native_keywords.load(Ordering::Relaxed)).matches(keywords)
    }

    /// True if a write at `level`/`keywords` would reach anyone.
    #[inline]
    pub fn is_enabled(&self, level: Level, keywords: Keywords) -> bool {
        self.native_accepts(level, keywords) || self.listeners.any_enabled(level, keywords)
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn add_listener(&self, listener: Arc<dyn EventListener>, filter: ListenerFilter) -> ListenerId {
        let id = self.listeners.add(listener, filter);
        log::debug!("[eventsource] '{}' listener {id:?} subscribed", self.name);
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write one event.
    ///
    /// Returns `Ok(())` without doing any work when nobody is enabled for
    /// `options.level`/`options.keywords`, or after [`close`](Self::close).
    /// Unsupported payload shapes fail with [`Error::UnsupportedFieldType`];
    /// encoding and native failures with [`Error::Emission`]. Listener
    /// failures are never reported here.
    pub fn write<T: EventPayload>(&self, name: &str, options: &EventOptions, payload: &T) -> Result<()> {
        let route = Route {
            native: self.native_accepts(options.level, options.keywords),
            listeners: self.listeners.any_enabled(options.level, options.keywords),
        };
        if !route.native && !route.listeners {
            self.stats.record_suppressed();
            return Ok(());
        }

        let set = self.types.register::<T>()?;
        let info = match self.names.resolve(name, options.tags) {
            Ok(Some(info)) => info,
            Ok(None) => {
                log::debug!("[eventsource] '{}' closed, dropping '{name}'", self.name);
                return Ok(());
            }
            Err(e) => {
                self.stats.record_encode_failure();
                return Err(Error::emission(name, e));
            }
        };

        let descriptor = EventDescriptor::new(
            info.identity(),
            options.level,
            options.opcode,
            options.keywords,
        );
        let ids = self.activity_ids(name, options);
        let opened = self.opened_activity(options, &ids);

        let emitted = match self.emit(&info, &set, &descriptor, &ids, payload, route) {
            Ok(emitted) => emitted,
            Err(e) => {
                self.stats.record_encode_failure();
                log::debug!("[eventsource] encoding '{name}' failed: {e}");
                self.abandon_activity(opened);
                return Err(Error::emission(name, e));
            }
        };

        if matches!(emitted.native, Ok(false)) {
            log::debug!("[eventsource] '{}' closed while defining '{name}', dropped", self.name);
            self.abandon_activity(opened);
            return Ok(());
        }

        if let Some(payload) = &emitted.payload {
            let event = EventWritten {
                source_name: &self.name,
                source_guid: self.guid,
                event_name: name,
                descriptor,
                tags: options.tags,
                activity_id: ids.activity_id,
                related_activity_id: ids.related_activity_id,
                payload,
            };
            self.listeners.dispatch(&event, &self.stats);
        }

        match emitted.native {
            Ok(_) => {
                self.stats.record_written();
                Ok(())
            }
            Err(e) => {
                self.stats.record_native_failure();
                log::debug!("[eventsource] native write of '{name}' failed: {e}");
                self.abandon_activity(opened);
                Err(Error::emission(name, e))
            }
        }
    }

    /// Write pre-serialized segments through an existing handle.
    ///
    /// `segments` is handed to the native writer unchanged. Listeners are not
    /// notified: the payload is opaque here.
    pub fn write_raw(
        &self,
        name: &str,
        descriptor: &EventDescriptor,
        handle: EventHandle,
        activity_id: Option<&Uuid>,
        related_activity_id: Option<&Uuid>,
        segments: &[Segment<'_>],
    ) -> Result<()> {
        if !self.native_accepts(descriptor.level, descriptor.keywords) {
            self.stats.record_suppressed();
            return Ok(());
        }
        if self.names.is_closed() {
            return Ok(());
        }

        match self
            .sink
            .write(handle, descriptor, activity_id, related_activity_id, segments)
        {
            Ok(()) => {
                self.stats.record_written();
                Ok(())
            }
            Err(e) => {
                self.stats.record_native_failure();
                Err(Error::emission(name, e))
            }
        }
    }

    /// Descriptor and native handle for writing `name` with payload shape
    /// `T` through [`write_raw`](Self::write_raw).
    ///
    /// `None` once the source is closed. Handles are per payload shape: the
    /// same name defined with two shapes yields two handles.
    pub fn define_event<T: EventPayload>(
        &self,
        name: &str,
        options: &EventOptions,
    ) -> Result<Option<(EventDescriptor, EventHandle)>> {
        let set = self.types.register::<T>()?;
        let Some(info) = self
            .names
            .resolve(name, options.tags)
            .map_err(|e| Error::emission(name, e))?
        else {
            return Ok(None);
        };

        let descriptor = EventDescriptor::new(
            info.identity(),
            options.level,
            options.opcode,
            options.keywords,
        );
        let definition = EventDefinition {
            provider_metadata: &self.provider_metadata,
            name_metadata: info.name_metadata(),
            type_metadata: set.type_metadata(),
            descriptor: &descriptor,
        };
        let handle = self
            .names
            .get_or_create_handle(&info, TypeId::of::<T>(), &definition, self.sink.as_ref())
            .map_err(|e| Error::emission(name, e))?;
        Ok(handle.map(|handle| (descriptor, handle)))
    }

    fn activity_ids(&self, name: &str, options: &EventOptions) -> ActivityIds {
        if options.has_explicit_activity() {
            return ActivityIds {
                activity_id: options.activity_id,
                related_activity_id: options.related_activity_id,
            };
        }

        match options.opcode {
            Opcode::START => self
                .tracker
                .on_start(self.guid, name, options.activity_options),
            Opcode::STOP => ActivityIds {
                activity_id: self
                    .tracker
                    .on_stop(self.guid, name, options.activity_options),
                related_activity_id: None,
            },
            _ => ActivityIds {
                activity_id: self.tracker.current(),
                related_activity_id: None,
            },
        }
    }

    /// Activity this write pushed onto the thread's chain, if any.
    fn opened_activity(&self, options: &EventOptions, ids: &ActivityIds) -> Option<Uuid> {
        let tracked = options.opcode == Opcode::START
            && !options.has_explicit_activity()
            && !options.activity_options.contains(ActivityOptions::DISABLE);
        if tracked {
            ids.activity_id
        } else {
            None
        }
    }

    /// Close an activity whose Start never reached the native consumer.
    fn abandon_activity(&self, opened: Option<Uuid>) {
        if let Some(id) = opened {
            self.tracker.abandon(id);
        }
    }

    /// Encode into a fresh frame, write natively, decode for listeners.
    ///
    /// The frame session ends when this returns, on every path.
    fn emit<T: EventPayload>(
        &self,
        info: &NameInfo,
        set: &TypeDescriptorSet<T>,
        descriptor: &EventDescriptor,
        ids: &ActivityIds,
        payload: &T,
        route: Route,
    ) -> core::result::Result<Emitted, EncodeError> {
        let mut frame = ScratchFrame::with_ledger(&self.ledger);
        let mut session = frame.session(set.scratch_size(), set.slot_count(), set.pin_count());
        set.encode(payload, &mut session)?;

        let mut segments = Vec::with_capacity(3 + session.finish());
        segments.push(Segment::new(SegmentKind::ProviderMetadata, &self.provider_metadata));
        segments.push(Segment::new(SegmentKind::EventMetadata, info.name_metadata()));
        segments.push(Segment::new(SegmentKind::TypeMetadata, set.type_metadata()));
        session.append_segments(&mut segments);

        let native = if route.native {
            self.write_native(info, TypeId::of::<T>(), set.type_metadata(), descriptor, ids, &segments)
        } else {
            Ok(true)
        };

        let payload = if route.listeners {
            match decode_payload(set.schema(), &segments[3..]) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    self.stats.record_encode_failure();
                    log::warn!("[eventsource] cannot decode '{}' for listeners: {e}", info.name());
                    None
                }
            }
        } else {
            None
        };

        Ok(Emitted { native, payload })
    }

    /// `Ok(false)` if the source closed before a handle could be kept.
    fn write_native(
        &self,
        info: &NameInfo,
        shape: TypeId,
        type_metadata: &[u8],
        descriptor: &EventDescriptor,
        ids: &ActivityIds,
        segments: &[Segment<'_>],
    ) -> core::result::Result<bool, SinkError> {
        let definition = EventDefinition {
            provider_metadata: &self.provider_metadata,
            name_metadata: info.name_metadata(),
            type_metadata,
            descriptor,
        };
        let Some(handle) = self
            .names
            .get_or_create_handle(info, shape, &definition, self.sink.as_ref())?
        else {
            return Ok(false);
        };
        self.sink.write(
            handle,
            descriptor,
            ids.activity_id.as_ref(),
            ids.related_activity_id.as_ref(),
            segments,
        )?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// End the source's lifecycle. Later writes are dropped silently and
    /// every native handle is released. Idempotent.
    pub fn close(&self) {
        self.native_enabled.store(false, Ordering::Release);
        let handles = self.names.close();
        for handle in &handles {
            self.sink.release_event(*handle);
        }
        log::debug!(
            "[eventsource] '{}' closed, released {} handles",
            self.name,
            handles.len()
        );
    }

    pub fn is_closed(&self) -> bool {
        self.names.is_closed()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.ledger.live())
    }

    /// Distinct payload shapes registered so far.
    pub fn registered_shapes(&self) -> usize {
        self.types.len()
    }

    /// Distinct (name, tags) pairs resolved so far.
    pub fn resolved_names(&self) -> usize {
        self.names.len()
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("name", &self.name)
            .field("guid", &self.guid)
            .field("native_enabled", &self.is_native_enabled())
            .field("listeners", &self.listeners.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
