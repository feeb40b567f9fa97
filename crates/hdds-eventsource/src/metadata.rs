// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binary metadata blocks: provider, event name and payload type.
//!
//! Every block starts with its own total size as u16 LE, so the decoder on
//! the native side can walk segments 0..=2 without extra framing.
//!
//! ```text
//! provider : size | name | 0 | { size | trait# | value }*
//! name     : size | tags (7 bits/byte, high bit = more) | name | 0
//! type     : size | { field-name | 0 | type-tag [| child-count] }*
//! ```

use crate::config::{ETW_GROUP_TRAIT, MAX_METADATA_SIZE, TRAIT_KEY_PREFIX};
use crate::error::{EncodeError, Error, Result};
use uuid::Uuid;

/// Size-prefixed metadata block under construction.
#[derive(Debug)]
pub(crate) struct SizedBlock {
    buf: Vec<u8>,
}

impl SizedBlock {
    pub(crate) fn new() -> Self {
        Self::with_capacity(32)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let mut buf = Vec::with_capacity(capacity + 2);
        buf.extend_from_slice(&[0, 0]);
        Self { buf }
    }

    pub(crate) fn push_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// UTF-8 bytes followed by a NUL terminator.
    pub(crate) fn push_cstr(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    /// Patch the size prefix and hand back the block.
    pub(crate) fn finish(mut self, what: &str) -> core::result::Result<Vec<u8>, EncodeError> {
        let len = self.buf.len();
        if len > MAX_METADATA_SIZE {
            return Err(EncodeError::TooLong {
                field: what.to_string(),
                len,
                max: MAX_METADATA_SIZE,
            });
        }
        self.buf[..2].copy_from_slice(&(len as u16).to_le_bytes());
        Ok(self.buf)
    }
}

/// Build segment 0: provider name plus every `ETW_*` trait.
///
/// `traits` is a flat key/value list. Keys without the `ETW_` prefix are
/// kept by the source but contribute no bytes here.
pub fn provider_metadata(name: &str, traits: &[(String, String)]) -> Result<Vec<u8>> {
    if name.contains('\0') {
        return Err(Error::config("provider name must not contain NUL"));
    }

    let mut block = SizedBlock::with_capacity(name.len() + 1 + traits.len() * 20);
    block.push_cstr(name);

    for (key, value) in traits {
        let Some(number) = trait_number(key)? else {
            continue;
        };

        let mut trait_bytes = Vec::with_capacity(value.len() + 3);
        trait_bytes.extend_from_slice(&[0, 0, number]);
        encode_trait_value(value, &mut trait_bytes)?;

        let len = trait_bytes.len();
        if len > MAX_METADATA_SIZE {
            return Err(Error::config(format!(
                "trait {key} is {len} bytes, limit is {MAX_METADATA_SIZE}"
            )));
        }
        trait_bytes[..2].copy_from_slice(&(len as u16).to_le_bytes());
        block.push_bytes(&trait_bytes);
    }

    block
        .finish("provider metadata")
        .map_err(|e| Error::config(e.to_string()))
}

/// Map a trait key to its trait number.
///
/// `Ok(None)` for keys outside the `ETW_` namespace.
pub fn trait_number(key: &str) -> Result<Option<u8>> {
    let Some(rest) = key.strip_prefix(TRAIT_KEY_PREFIX) else {
        return Ok(None);
    };
    if rest == "GROUP" {
        return Ok(Some(ETW_GROUP_TRAIT));
    }
    rest.parse::<u8>()
        .map(Some)
        .map_err(|_| Error::config(format!("unknown trait number in key '{key}'")))
}

/// Encode one trait value; the leading character selects the interpretation.
///
/// - `@text` - UTF-8 `text`
/// - `{guid}` - 16-byte GUID, mixed-endian (Windows) layout
/// - `#hex` - hex byte pairs, spaces between pairs ignored
/// - alphabetic or space - the whole value as UTF-8
pub fn encode_trait_value(value: &str, out: &mut Vec<u8>) -> Result<()> {
    let Some(first) = value.chars().next() else {
        return Err(Error::config("empty trait value"));
    };

    match first {
        '@' => out.extend_from_slice(value[1..].as_bytes()),
        '{' => {
            let guid = Uuid::parse_str(value)
                .map_err(|e| Error::config(format!("invalid GUID trait '{value}': {e}")))?;
            out.extend_from_slice(&guid.to_bytes_le());
        }
        '#' => decode_hex_pairs(&value[1..], out)?,
        c if c.is_alphabetic() || c == ' ' => out.extend_from_slice(value.as_bytes()),
        _ => {
            return Err(Error::config(format!(
                "illegal trait value prefix '{first}' in '{value}'"
            )))
        }
    }
    Ok(())
}

fn decode_hex_pairs(digits: &str, out: &mut Vec<u8>) -> Result<()> {
    let bytes = digits.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b' ' {
            i += 1;
            continue;
        }
        if i + 1 >= bytes.len() {
            return Err(Error::config(format!(
                "odd number of hex digits in trait value '#{digits}'"
            )));
        }
        let hi = hex_digit(bytes[i], digits)?;
        let lo = hex_digit(bytes[i + 1], digits)?;
        out.push((hi << 4) | lo);
        i += 2;
    }
    Ok(())
}

fn hex_digit(c: u8, digits: &str) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(Error::config(format!(
            "invalid hex digit '{}' in trait value '#{digits}'",
            c as char
        ))),
    }
}

/// Append the 28-bit tags, seven bits per byte, most significant first.
pub fn encode_tags(tags: u32, out: &mut Vec<u8>) {
    let mut left = tags & 0x0fff_ffff;
    loop {
        let more = (left & 0x001f_ffff) != 0;
        let mut current = ((left >> 21) & 0x7f) as u8;
        if more {
            current |= 0x80;
        }
        out.push(current);
        left = (left << 7) & 0x0fff_ffff;
        if !more {
            break;
        }
    }
}

/// Build segment 1: tags plus event name.
pub fn name_metadata(name: &str, tags: u32) -> core::result::Result<Vec<u8>, EncodeError> {
    let mut tag_bytes = Vec::with_capacity(4);
    encode_tags(tags, &mut tag_bytes);

    let mut block = SizedBlock::with_capacity(tag_bytes.len() + name.len() + 1);
    block.push_bytes(&tag_bytes);
    block.push_cstr(name);
    block.finish("event name metadata")
}
