// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event source configuration.
//!
//! Wire limits live here as constants; provider identity (name, GUID,
//! traits) can be built programmatically through
//! [`EventSourceBuilder`](crate::EventSourceBuilder) or loaded from TOML:
//!
//! ```toml
//! name = "Contoso-Billing"
//!
//! [[traits]]
//! key = "ETW_GROUP"
//! value = "{4f50731a-89cf-4782-b3e0-dce8c90476ba}"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Largest metadata block expressible by the u16 size prefix.
pub const MAX_METADATA_SIZE: usize = u16::MAX as usize;

/// Largest string/blob/array byte length carried by a u16 length segment.
pub const MAX_LENGTH_PREFIXED: usize = u16::MAX as usize;

/// Deepest struct nesting accepted by the type registry.
pub const MAX_NESTING_DEPTH: usize = 8;

/// Most fields a single struct level may declare (child count is one byte).
pub const MAX_STRUCT_FIELDS: usize = u8::MAX as usize;

/// Trait number of the `ETW_GROUP` provider trait.
pub const ETW_GROUP_TRAIT: u8 = 1;

/// Prefix marking a trait key as encodable provider metadata.
pub const TRAIT_KEY_PREFIX: &str = "ETW_";

/// Namespace for name-derived provider GUIDs.
pub const EVENT_SOURCE_NAMESPACE: Uuid = Uuid::from_u128(0x482c_2db2_c390_47c8_87f8_1a15_bfc1_30fb);

/// One provider trait as a key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitConfig {
    pub key: String,
    pub value: String,
}

/// File-loadable provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSourceConfig {
    /// Provider name, encoded into segment 0 of every event.
    pub name: String,

    /// Explicit provider GUID. Derived from `name` when absent.
    #[serde(default)]
    pub guid: Option<Uuid>,

    /// Provider traits, in declaration order.
    #[serde(default)]
    pub traits: Vec<TraitConfig>,
}

impl EventSourceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guid: None,
            traits: Vec::new(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate fields that do not depend on trait parsing.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::config("event source name must not be empty"));
        }
        if self.name.contains('\0') {
            return Err(Error::config("event source name must not contain NUL"));
        }
        Ok(())
    }

    /// Provider GUID: explicit, or derived from the name.
    pub fn resolved_guid(&self) -> Uuid {
        self.guid.unwrap_or_else(|| guid_from_name(&self.name))
    }
}

/// Deterministic provider GUID for `name`.
///
/// Name-based (v5) UUID over the upper-cased name in UTF-16BE, so the same
/// provider name always yields the same GUID regardless of case.
pub fn guid_from_name(name: &str) -> Uuid {
    let upper = name.to_uppercase();
    let mut bytes = Vec::with_capacity(upper.len() * 2);
    for unit in upper.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Uuid::new_v5(&EVENT_SOURCE_NAMESPACE, &bytes)
}
