// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field values: borrowed on the write side, owned on the listener side.

use super::kind::FieldKind;
use std::borrow::Cow;
use uuid::Uuid;

/// Value produced by a field accessor. Borrows variable-length data from
/// the payload so it can be pinned instead of copied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Guid(Uuid),
    Str(&'a str),
    Bytes(&'a [u8]),
    Array(ArrayRef<'a>),
}

impl FieldValue<'_> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::U8(_) => "u8",
            Self::I8(_) => "i8",
            Self::U16(_) => "u16",
            Self::I16(_) => "i16",
            Self::U32(_) => "u32",
            Self::I32(_) => "i32",
            Self::U64(_) => "u64",
            Self::I64(_) => "i64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Guid(_) => "guid",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::Array(a) => a.type_name(),
        }
    }

    /// Whether this value can be encoded as a field declared `kind`.
    pub fn matches(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (Self::Bool(_), FieldKind::Bool)
            | (Self::U8(_), FieldKind::U8)
            | (Self::I8(_), FieldKind::I8)
            | (Self::U16(_), FieldKind::U16)
            | (Self::I16(_), FieldKind::I16)
            | (Self::U32(_), FieldKind::U32)
            | (Self::I32(_), FieldKind::I32)
            | (Self::U64(_), FieldKind::U64)
            | (Self::I64(_), FieldKind::I64)
            | (Self::F32(_), FieldKind::F32)
            | (Self::F64(_), FieldKind::F64)
            | (Self::Guid(_), FieldKind::Guid)
            | (Self::Str(_), FieldKind::Str)
            | (Self::Bytes(_), FieldKind::Bytes) => true,
            (Self::Array(a), FieldKind::Array(elem)) => a.element_kind() == **elem,
            _ => false,
        }
    }
}

/// Borrowed slice of numeric array elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArrayRef<'a> {
    U8(&'a [u8]),
    I8(&'a [i8]),
    U16(&'a [u16]),
    I16(&'a [i16]),
    U32(&'a [u32]),
    I32(&'a [i32]),
    U64(&'a [u64]),
    I64(&'a [i64]),
    F32(&'a [f32]),
    F64(&'a [f64]),
}

/// Reinterpret a numeric slice as its in-memory bytes.
///
/// Only used on little-endian targets, where memory order is wire order.
#[cfg(target_endian = "little")]
fn raw_bytes<T: Copy>(slice: &[T]) -> &[u8] {
    // SAFETY: callers only pass primitive integer/float slices, which have no
    // padding and no invalid bit patterns as bytes; the returned slice covers
    // exactly `size_of_val(slice)` bytes of the same allocation and borrows it.
    unsafe { std::slice::from_raw_parts(slice.as_ptr().cast::<u8>(), std::mem::size_of_val(slice)) }
}

#[cfg(target_endian = "little")]
macro_rules! le_bytes {
    ($slice:expr) => {
        Cow::Borrowed(raw_bytes($slice))
    };
}

#[cfg(not(target_endian = "little"))]
macro_rules! le_bytes {
    ($slice:expr) => {
        Cow::Owned($slice.iter().flat_map(|v| v.to_le_bytes()).collect())
    };
}

impl<'a> ArrayRef<'a> {
    pub fn len(&self) -> usize {
        match self {
            Self::U8(s) => s.len(),
            Self::I8(s) => s.len(),
            Self::U16(s) => s.len(),
            Self::I16(s) => s.len(),
            Self::U32(s) => s.len(),
            Self::I32(s) => s.len(),
            Self::U64(s) => s.len(),
            Self::I64(s) => s.len(),
            Self::F32(s) => s.len(),
            Self::F64(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_kind(&self) -> FieldKind {
        match self {
            Self::U8(_) => FieldKind::U8,
            Self::I8(_) => FieldKind::I8,
            Self::U16(_) => FieldKind::U16,
            Self::I16(_) => FieldKind::I16,
            Self::U32(_) => FieldKind::U32,
            Self::I32(_) => FieldKind::I32,
            Self::U64(_) => FieldKind::U64,
            Self::I64(_) => FieldKind::I64,
            Self::F32(_) => FieldKind::F32,
            Self::F64(_) => FieldKind::F64,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::U8(_) => "[u8]",
            Self::I8(_) => "[i8]",
            Self::U16(_) => "[u16]",
            Self::I16(_) => "[i16]",
            Self::U32(_) => "[u32]",
            Self::I32(_) => "[i32]",
            Self::U64(_) => "[u64]",
            Self::I64(_) => "[i64]",
            Self::F32(_) => "[f32]",
            Self::F64(_) => "[f64]",
        }
    }

    /// Little-endian element bytes. Borrowed (pinned) on little-endian targets.
    pub fn as_le_bytes(&self) -> Cow<'a, [u8]> {
        match *self {
            Self::U8(s) => Cow::Borrowed(s),
            Self::I8(s) => le_bytes!(s),
            Self::U16(s) => le_bytes!(s),
            Self::I16(s) => le_bytes!(s),
            Self::U32(s) => le_bytes!(s),
            Self::I32(s) => le_bytes!(s),
            Self::U64(s) => le_bytes!(s),
            Self::I64(s) => le_bytes!(s),
            Self::F32(s) => le_bytes!(s),
            Self::F64(s) => le_bytes!(s),
        }
    }
}

/// Decoded field value delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Guid(Uuid),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    /// Nested struct, fields in declaration order.
    Struct(Vec<(String, Value)>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Any unsigned integer, widened.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U8(v) => Some(u64::from(*v)),
            Self::U16(v) => Some(u64::from(*v)),
            Self::U32(v) => Some(u64::from(*v)),
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Any signed integer, widened.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I8(v) => Some(i64::from(*v)),
            Self::I16(v) => Some(i64::from(*v)),
            Self::I32(v) => Some(i64::from(*v)),
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F32(v) => Some(f64::from(*v)),
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_guid(&self) -> Option<Uuid> {
        match self {
            Self::Guid(v) => Some(*v),
            _ => None,
        }
    }

    /// Field of a nested struct value.
    pub fn get_field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}
