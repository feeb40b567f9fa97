// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for event sources, shape registration and emission.

use thiserror::Error;

/// Errors returned by event source operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Provider construction rejected its configuration (malformed trait,
    /// unknown trait number, illegal value prefix, bad config file).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A payload shape declares a field the wire encoding cannot carry.
    ///
    /// Memoized per shape: every later registration of the same shape
    /// returns this same error without rebuilding.
    #[error("Unsupported field type in shape '{shape}': field '{field}' has type {kind}")]
    UnsupportedFieldType {
        shape: &'static str,
        field: String,
        kind: String,
    },

    /// One emission failed while encoding or inside the native writer.
    #[error("Failed to emit event '{event}': {source}")]
    Emission {
        event: String,
        #[source]
        source: EmitFailure,
    },
}

/// Underlying cause of an [`Error::Emission`].
#[derive(Debug, Clone, Error)]
pub enum EmitFailure {
    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("native write failed: {0}")]
    Native(#[from] SinkError),
}

/// Field encoding failures, raised while filling a write frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("field '{field}' expected {expected}, accessor produced {found}")]
    KindMismatch {
        field: String,
        expected: String,
        found: &'static str,
    },

    #[error("field '{field}' is {len} bytes, length prefix allows at most {max}")]
    TooLong { field: String, len: usize, max: usize },

    #[error("scratch overflow at offset {offset}: {needed} bytes needed, {capacity} reserved")]
    ScratchOverflow {
        offset: usize,
        needed: usize,
        capacity: usize,
    },

    #[error("pin table exhausted: {capacity} pins reserved")]
    PinOverflow { capacity: usize },

    #[error("payload truncated at segment {segment}")]
    Truncated { segment: usize },
}

/// Error reported by a [`NativeSink`](crate::sink::NativeSink).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("native sink error {code}: {reason}")]
pub struct SinkError {
    pub code: i32,
    pub reason: String,
}

impl SinkError {
    pub fn new(code: i32, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Error returned by an [`EventListener`](crate::listener::EventListener) callback.
///
/// Isolated per listener: dispatch continues with the next subscriber.
#[derive(Debug, Clone, Error)]
#[error("listener failed: {0}")]
pub struct ListenerError(pub String);

/// Convenient alias for event source results.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn emission(event: &str, source: impl Into<EmitFailure>) -> Self {
        Error::Emission {
            event: event.to_string(),
            source: source.into(),
        }
    }
}
