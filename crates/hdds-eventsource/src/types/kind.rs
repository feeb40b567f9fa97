// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field type classification and wire type tags.

use std::fmt;

/// Wire type tags written into the type metadata block.
pub mod tag {
    pub const STR: u8 = 2;
    pub const I8: u8 = 3;
    pub const U8: u8 = 4;
    pub const I16: u8 = 5;
    pub const U16: u8 = 6;
    pub const I32: u8 = 7;
    pub const U32: u8 = 8;
    pub const I64: u8 = 9;
    pub const U64: u8 = 10;
    pub const F32: u8 = 11;
    pub const F64: u8 = 12;
    pub const BOOL: u8 = 13;
    pub const BYTES: u8 = 14;
    pub const GUID: u8 = 15;
    pub const STRUCT: u8 = 22;
    /// OR-ed into an element tag for variable-count arrays.
    pub const VCOUNT_FLAG: u8 = 0x20;
}

/// Declared type of one leaf field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    /// 16-byte GUID, mixed-endian on the wire.
    Guid,
    /// UTF-8 string, length-prefixed and pinned.
    Str,
    /// Opaque byte blob, length-prefixed and pinned.
    Bytes,
    /// Variable-count array of fixed-width numeric elements.
    Array(Box<FieldKind>),
    /// A type the shape-discovery layer could not map. Never encodable.
    Other(&'static str),
}

impl FieldKind {
    pub fn array_of(elem: FieldKind) -> Self {
        FieldKind::Array(Box::new(elem))
    }

    /// Fixed encoding width for scalars; `None` for length-prefixed kinds.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::F32 => Some(4),
            Self::U64 | Self::I64 | Self::F64 => Some(8),
            Self::Guid => Some(16),
            Self::Str | Self::Bytes | Self::Array(_) | Self::Other(_) => None,
        }
    }

    /// Numeric kinds allowed as array elements.
    pub fn is_array_element(&self) -> bool {
        matches!(
            self,
            Self::U8
                | Self::I8
                | Self::U16
                | Self::I16
                | Self::U32
                | Self::I32
                | Self::U64
                | Self::I64
                | Self::F32
                | Self::F64
        )
    }

    /// True when the kind can be registered at all.
    pub fn is_supported(&self) -> bool {
        match self {
            Self::Array(elem) => elem.is_array_element(),
            Self::Other(_) => false,
            _ => true,
        }
    }

    /// Type tag for the metadata block. Only meaningful for supported kinds.
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Bool => tag::BOOL,
            Self::U8 => tag::U8,
            Self::I8 => tag::I8,
            Self::U16 => tag::U16,
            Self::I16 => tag::I16,
            Self::U32 => tag::U32,
            Self::I32 => tag::I32,
            Self::U64 => tag::U64,
            Self::I64 => tag::I64,
            Self::F32 => tag::F32,
            Self::F64 => tag::F64,
            Self::Guid => tag::GUID,
            Self::Str => tag::STR,
            Self::Bytes | Self::Other(_) => tag::BYTES,
            Self::Array(elem) => elem.type_tag() | tag::VCOUNT_FLAG,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array(elem) => write!(f, "[{elem}]"),
            Self::Other(name) => write!(f, "{name}"),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_widths() {
        assert_eq!(FieldKind::Bool.fixed_width(), Some(1));
        assert_eq!(FieldKind::I16.fixed_width(), Some(2));
        assert_eq!(FieldKind::F32.fixed_width(), Some(4));
        assert_eq!(FieldKind::U64.fixed_width(), Some(8));
        assert_eq!(FieldKind::Guid.fixed_width(), Some(16));
        assert_eq!(FieldKind::Str.fixed_width(), None);
        assert_eq!(FieldKind::array_of(FieldKind::U32).fixed_width(), None);
    }

    #[test]
    fn test_supported_arrays() {
        assert!(FieldKind::array_of(FieldKind::F64).is_supported());
        assert!(!FieldKind::array_of(FieldKind::Str).is_supported());
        assert!(!FieldKind::array_of(FieldKind::array_of(FieldKind::U8)).is_supported());
        assert!(!FieldKind::Other("HashMap<String, u32>").is_supported());
    }

    #[test]
    fn test_array_tag_sets_vcount_flag() {
        let tag = FieldKind::array_of(FieldKind::U16).type_tag();
        assert_eq!(tag & tag::VCOUNT_FLAG, tag::VCOUNT_FLAG);
        assert_eq!(tag & !tag::VCOUNT_FLAG, tag::U16);
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldKind::U32.to_string(), "u32");
        assert_eq!(FieldKind::array_of(FieldKind::Str).to_string(), "[str]");
    }
}
