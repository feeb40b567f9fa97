// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event source builder.
//!
//! All provider configuration is validated eagerly in [`build`]: malformed
//! traits fail construction with [`Error::Configuration`] and never reach the
//! write path.
//!
//! [`build`]: EventSourceBuilder::build

use super::EventSource;
use crate::config::{guid_from_name, EventSourceConfig, TraitConfig};
use crate::descriptor::{Keywords, Level};
use crate::error::Result;
use crate::metadata::provider_metadata;
use crate::sink::{NativeSink, NullSink};
use std::sync::Arc;
use uuid::Uuid;

/// Fluent configuration for an [`EventSource`].
pub struct EventSourceBuilder {
    name: String,
    guid: Option<Uuid>,
    traits: Vec<(String, String)>,
    sink: Option<Arc<dyn NativeSink>>,
    native_session: Option<(Level, Keywords)>,
}

impl EventSourceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guid: None,
            traits: Vec::new(),
            sink: None,
            native_session: None,
        }
    }

    /// Start from a loaded [`EventSourceConfig`].
    pub fn from_config(config: &EventSourceConfig) -> Self {
        let mut builder = Self::new(config.name.clone());
        builder.guid = config.guid;
        builder.traits = config
            .traits
            .iter()
            .map(|t| (t.key.clone(), t.value.clone()))
            .collect();
        builder
    }

    /// Explicit provider GUID (default: derived from the name).
    pub fn guid(mut self, guid: Uuid) -> Self {
        self.guid = Some(guid);
        self
    }

    /// Add one provider trait. `ETW_*` keys are encoded into provider
    /// metadata; other keys are only retained.
    pub fn with_trait(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.traits.push((key.into(), value.into()));
        self
    }

    pub fn traits<I, K, V>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.traits
            .extend(traits.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Native writer (default: [`NullSink`]).
    pub fn sink(mut self, sink: Arc<dyn NativeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Start with the native session enabled at `level`/`keywords`.
    pub fn native_session(mut self, level: Level, keywords: Keywords) -> Self {
        self.native_session = Some((level, keywords));
        self
    }

    pub fn build(self) -> Result<EventSource> {
        let config = EventSourceConfig {
            name: self.name,
            guid: self.guid,
            traits: self
                .traits
                .iter()
                .map(|(key, value)| TraitConfig {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        };
        config.validate()?;

        let metadata = provider_metadata(&config.name, &self.traits)?;
        let guid = config.guid.unwrap_or_else(|| guid_from_name(&config.name));
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(NullSink::new()) as Arc<dyn NativeSink>);

        log::debug!(
            "[eventsource] created source '{}' {guid} ({} traits, {} metadata bytes)",
            config.name,
            self.traits.len(),
            metadata.len()
        );

        let source = EventSource::from_parts(config.name, guid, self.traits, metadata, sink);
        if let Some((level, keywords)) = self.native_session {
            source.enable_native(level, keywords);
        }
        Ok(source)
    }
}
