// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HDDS EventSource - self-describing structured events
//!
//! Instrumented code describes its events once, as typed payload shapes, and
//! writes them through an [`EventSource`]. Each write is handed to a native
//! tracing consumer as an ordered, self-describing segment list and fanned out
//! to in-process listeners as decoded name/value pairs. When nobody is
//! listening, a write costs one enablement check.
//!
//! ## Quick Start
//!
//! ```rust
//! use hdds_eventsource::types::{EventPayload, FieldKind, FieldValue, ShapeBuilder};
//! use hdds_eventsource::{EventOptions, EventSource, Keywords, Level, Result};
//!
//! struct Checkout {
//!     cart_id: u64,
//!     region: String,
//! }
//!
//! impl EventPayload for Checkout {
//!     const NAME: &'static str = "Checkout";
//!
//!     fn describe(shape: &mut ShapeBuilder<Self>) {
//!         shape
//!             .field("cart_id", FieldKind::U64, |c| FieldValue::U64(c.cart_id))
//!             .field("region", FieldKind::Str, |c| FieldValue::Str(&c.region));
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let source = EventSource::builder("Contoso-Shop")
//!         .with_trait("ETW_GROUP", "{4f50731a-89cf-4782-b3e0-dce8c90476ba}")
//!         .native_session(Level::INFORMATIONAL, Keywords::NONE)
//!         .build()?;
//!
//!     let checkout = Checkout { cart_id: 42, region: "eu-west".into() };
//!     source.write("Checkout", &EventOptions::new(), &checkout)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------------------------------------+
//! |  EventSource::write                                                |
//! |    enablement -> TypeRegistry -> NameCache -> ActivityTracker      |
//! |    -> ScratchFrame (scratch + pins) -> NativeSink -> listeners     |
//! +-------------------------------------------------------------------+
//! |  metadata: provider / name / type blocks, trait value grammar      |
//! +-------------------------------------------------------------------+
//! ```
//!
//! | Module | Role |
//! |--------|------|
//! | [`metadata`] | Provider, event-name and type metadata blocks |
//! | [`types`] | Payload shapes, cached descriptor sets, decoded values |
//! | [`names`] | (name, tags) -> identity and native handle |
//! | [`frame`] | Call-scoped scratch and pin buffers |
//! | [`activity`] | Per-thread Start/Stop correlation |
//! | [`source`] | The write pipeline |
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`] facade with an `[eventsource]`
//! prefix. The crate installs no logger.

pub mod activity;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod frame;
pub mod listener;
pub mod metadata;
pub mod names;
pub mod sink;
pub mod source;
pub mod stats;
pub mod types;

pub use activity::{ActivityIds, ActivityTracker};
pub use config::{EventSourceConfig, TraitConfig};
pub use descriptor::{ActivityOptions, EventDescriptor, EventOptions, Keywords, Level, Opcode};
pub use error::{EmitFailure, EncodeError, Error, ListenerError, Result, SinkError};
pub use listener::{ClosureListener, EventListener, EventWritten, ListenerFilter, ListenerId};
pub use sink::{EventDefinition, EventHandle, MemorySink, NativeSink, NullSink, Segment, SegmentKind};
pub use source::{EventSource, EventSourceBuilder};
pub use stats::StatsSnapshot;
pub use types::{EventPayload, Payload, Value};
