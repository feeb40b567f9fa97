// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decode payload segments back into named values for listeners.

use super::kind::FieldKind;
use super::registry::{SchemaKind, SchemaNode};
use super::value::Value;
use crate::error::EncodeError;
use crate::sink::{Segment, SegmentKind};
use uuid::Uuid;

/// Decoded payload: (field name, value) pairs in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Vec<(String, Value)>,
}

impl Payload {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    /// First field named `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_inner(self) -> Vec<(String, Value)> {
        self.fields
    }
}

struct SegmentReader<'s, 'a> {
    segments: &'s [Segment<'a>],
    next: usize,
}

impl<'a> SegmentReader<'_, 'a> {
    fn take(&mut self, kind: SegmentKind) -> Result<&'a [u8], EncodeError> {
        let index = self.next;
        match self.segments.get(index) {
            Some(seg) if seg.kind == kind => {
                self.next += 1;
                Ok(seg.data)
            }
            _ => Err(EncodeError::Truncated { segment: index }),
        }
    }

    fn scalar(&mut self, width: usize) -> Result<&'a [u8], EncodeError> {
        let index = self.next;
        let data = self.take(SegmentKind::Scalar)?;
        if data.len() != width {
            return Err(EncodeError::Truncated { segment: index });
        }
        Ok(data)
    }

    fn counted(&mut self) -> Result<(usize, &'a [u8]), EncodeError> {
        let index = self.next;
        let len = self.take(SegmentKind::Length)?;
        let count = match len {
            [lo, hi] => u16::from_le_bytes([*lo, *hi]) as usize,
            _ => return Err(EncodeError::Truncated { segment: index }),
        };
        let data = self.take(SegmentKind::Pinned)?;
        Ok((count, data))
    }
}

/// Rebuild named values from the payload segments of one write.
///
/// `segments` must hold only payload segments (no metadata), in the order
/// the descriptor set produced them.
pub fn decode_payload(schema: &[SchemaNode], segments: &[Segment<'_>]) -> Result<Payload, EncodeError> {
    let mut reader = SegmentReader { segments, next: 0 };
    let fields = decode_nodes(schema, &mut reader)?;
    if reader.next != segments.len() {
        return Err(EncodeError::Truncated {
            segment: reader.next,
        });
    }
    Ok(Payload::new(fields))
}

fn decode_nodes(
    nodes: &[SchemaNode],
    reader: &mut SegmentReader<'_, '_>,
) -> Result<Vec<(String, Value)>, EncodeError> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let value = match &node.kind {
            SchemaKind::Field(kind) => decode_field(kind, reader)?,
            SchemaKind::Struct(children) => Value::Struct(decode_nodes(children, reader)?),
        };
        out.push((node.name.clone(), value));
    }
    Ok(out)
}

fn decode_field(kind: &FieldKind, reader: &mut SegmentReader<'_, '_>) -> Result<Value, EncodeError> {
    if let Some(width) = kind.fixed_width() {
        let data = reader.scalar(width)?;
        return Ok(scalar_value(kind, data));
    }

    let index = reader.next;
    let (count, data) = reader.counted()?;
    match kind {
        FieldKind::Str => {
            if data.len() != count {
                return Err(EncodeError::Truncated { segment: index + 1 });
            }
            Ok(Value::Str(String::from_utf8_lossy(data).into_owned()))
        }
        FieldKind::Bytes => {
            if data.len() != count {
                return Err(EncodeError::Truncated { segment: index + 1 });
            }
            Ok(Value::Bytes(data.to_vec()))
        }
        FieldKind::Array(elem) => {
            let width = elem.fixed_width().unwrap_or(1);
            if data.len() != count * width {
                return Err(EncodeError::Truncated { segment: index + 1 });
            }
            Ok(Value::Array(
                data.chunks_exact(width)
                    .map(|chunk| scalar_value(elem, chunk))
                    .collect(),
            ))
        }
        _ => Err(EncodeError::Truncated { segment: index }),
    }
}

/// `data` must be exactly `kind.fixed_width()` bytes.
fn scalar_value(kind: &FieldKind, data: &[u8]) -> Value {
    macro_rules! le {
        ($t:ty) => {{
            let mut buf = [0u8; std::mem::size_of::<$t>()];
            buf.copy_from_slice(data);
            <$t>::from_le_bytes(buf)
        }};
    }

    match kind {
        FieldKind::Bool => Value::Bool(data[0] != 0),
        FieldKind::U8 => Value::U8(data[0]),
        FieldKind::I8 => Value::I8(le!(i8)),
        FieldKind::U16 => Value::U16(le!(u16)),
        FieldKind::I16 => Value::I16(le!(i16)),
        FieldKind::U32 => Value::U32(le!(u32)),
        FieldKind::I32 => Value::I32(le!(i32)),
        FieldKind::U64 => Value::U64(le!(u64)),
        FieldKind::I64 => Value::I64(le!(i64)),
        FieldKind::F32 => Value::F32(le!(f32)),
        FieldKind::F64 => Value::F64(le!(f64)),
        FieldKind::Guid => {
            let mut buf = [0u8; 16];
            buf.copy_from_slice(data);
            Value::Guid(Uuid::from_bytes_le(buf))
        }
        FieldKind::Str | FieldKind::Bytes | FieldKind::Array(_) | FieldKind::Other(_) => {
            Value::Bytes(data.to_vec())
        }
    }
}
