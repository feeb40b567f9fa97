// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type descriptor registry: payload shape -> cached descriptor set.
//!
//! Each shape is built exactly once per registry. Both outcomes are
//! memoized: a shape with an unsupported field keeps failing with the same
//! [`Error::UnsupportedFieldType`] without being rebuilt, and never affects
//! other shapes.

use super::kind::{tag, FieldKind};
use super::shape::{Accessor, EventPayload, FieldSpec, ShapeBuilder};
use super::value::FieldValue;
use crate::config::{MAX_LENGTH_PREFIXED, MAX_NESTING_DEPTH, MAX_STRUCT_FIELDS};
use crate::error::{EncodeError, Error, Result};
use crate::frame::ScratchFrame;
use crate::metadata::SizedBlock;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Node of the declared field tree, as seen by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaNode {
    pub name: String,
    pub kind: SchemaKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaKind {
    Field(FieldKind),
    Struct(Vec<SchemaNode>),
}

/// How a leaf field lands in the write frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Fixed-width value copied into one scratch slot.
    Scalar { width: usize },
    /// u16 length in scratch followed by a pinned data segment.
    Counted,
}

impl Encoding {
    /// Scratch bytes reserved by this encoding.
    pub fn scratch_bytes(self) -> usize {
        match self {
            Encoding::Scalar { width } => width,
            Encoding::Counted => 2,
        }
    }

    /// Payload segments produced by this encoding.
    pub fn segments(self) -> usize {
        match self {
            Encoding::Scalar { .. } => 1,
            Encoding::Counted => 2,
        }
    }
}

/// Leaf field descriptor: accessor plus encode routine.
pub struct FieldDescriptor<T> {
    path: String,
    kind: FieldKind,
    depth: usize,
    encoding: Encoding,
    accessor: Accessor<T>,
}

impl<T> FieldDescriptor<T> {
    /// Dotted path from the payload root, e.g. `to.x`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Nesting depth, 0 for top-level fields.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Extract this field from `payload` and append it to `frame`.
    pub fn encode<'a>(&self, payload: &'a T, frame: &mut ScratchFrame<'a>) -> core::result::Result<(), EncodeError> {
        let value = (self.accessor)(payload);
        if !value.matches(&self.kind) {
            return Err(EncodeError::KindMismatch {
                field: self.path.clone(),
                expected: self.kind.to_string(),
                found: value.type_name(),
            });
        }

        match value {
            FieldValue::Bool(v) => frame.write_scalar(&[u8::from(v)]),
            FieldValue::U8(v) => frame.write_scalar(&[v]),
            FieldValue::I8(v) => frame.write_scalar(&v.to_le_bytes()),
            FieldValue::U16(v) => frame.write_scalar(&v.to_le_bytes()),
            FieldValue::I16(v) => frame.write_scalar(&v.to_le_bytes()),
            FieldValue::U32(v) => frame.write_scalar(&v.to_le_bytes()),
            FieldValue::I32(v) => frame.write_scalar(&v.to_le_bytes()),
            FieldValue::U64(v) => frame.write_scalar(&v.to_le_bytes()),
            FieldValue::I64(v) => frame.write_scalar(&v.to_le_bytes()),
            FieldValue::F32(v) => frame.write_scalar(&v.to_le_bytes()),
            FieldValue::F64(v) => frame.write_scalar(&v.to_le_bytes()),
            FieldValue::Guid(v) => frame.write_scalar(&v.to_bytes_le()),
            FieldValue::Str(s) => self.write_counted(frame, s.len(), Cow::Borrowed(s.as_bytes())),
            FieldValue::Bytes(b) => self.write_counted(frame, b.len(), Cow::Borrowed(b)),
            FieldValue::Array(a) => self.write_counted(frame, a.len(), a.as_le_bytes()),
        }
    }

    fn write_counted<'a>(
        &self,
        frame: &mut ScratchFrame<'a>,
        count: usize,
        data: Cow<'a, [u8]>,
    ) -> core::result::Result<(), EncodeError> {
        if count > MAX_LENGTH_PREFIXED {
            return Err(EncodeError::TooLong {
                field: self.path.clone(),
                len: count,
                max: MAX_LENGTH_PREFIXED,
            });
        }
        frame.write_length(count as u16)?;
        frame.pin(data)
    }
}

/// Cached, reusable encoding plan for one payload shape.
pub struct TypeDescriptorSet<T> {
    name: &'static str,
    fields: Vec<FieldDescriptor<T>>,
    schema: Vec<SchemaNode>,
    scratch_size: usize,
    slot_count: usize,
    pin_count: usize,
    type_metadata: Vec<u8>,
}

impl<T: EventPayload> TypeDescriptorSet<T> {
    /// Build the descriptor set from `T`'s declared shape.
    pub fn build() -> Result<Self> {
        let mut shape = ShapeBuilder::<T>::new();
        T::describe(&mut shape);

        let mut set = Self {
            name: T::NAME,
            fields: Vec::new(),
            schema: Vec::new(),
            scratch_size: 0,
            slot_count: 0,
            pin_count: 0,
            type_metadata: Vec::new(),
        };

        let mut meta = SizedBlock::new();
        set.schema = set.flatten(shape.fields, "", 0, &mut meta)?;
        set.type_metadata = meta.finish(T::NAME).map_err(|_| Error::UnsupportedFieldType {
            shape: T::NAME,
            field: T::NAME.to_string(),
            kind: "type metadata larger than 65535 bytes".to_string(),
        })?;
        Ok(set)
    }

    fn unsupported(&self, field: &str, kind: impl ToString) -> Error {
        Error::UnsupportedFieldType {
            shape: self.name,
            field: field.to_string(),
            kind: kind.to_string(),
        }
    }

    fn flatten(
        &mut self,
        specs: Vec<FieldSpec<T>>,
        prefix: &str,
        depth: usize,
        meta: &mut SizedBlock,
    ) -> Result<Vec<SchemaNode>> {
        let mut nodes = Vec::with_capacity(specs.len());
        for spec in specs {
            match spec {
                FieldSpec::Leaf {
                    name,
                    kind,
                    accessor,
                } => {
                    let path = join_path(prefix, &name);
                    if !kind.is_supported() {
                        return Err(self.unsupported(&path, &kind));
                    }
                    let encoding = match kind.fixed_width() {
                        Some(width) => Encoding::Scalar { width },
                        None => Encoding::Counted,
                    };

                    meta.push_cstr(&name);
                    meta.push_u8(kind.type_tag());

                    self.scratch_size += encoding.scratch_bytes();
                    self.slot_count += encoding.segments();
                    if encoding == Encoding::Counted {
                        self.pin_count += 1;
                    }
                    nodes.push(SchemaNode {
                        name,
                        kind: SchemaKind::Field(kind.clone()),
                    });
                    self.fields.push(FieldDescriptor {
                        path,
                        kind,
                        depth,
                        encoding,
                        accessor,
                    });
                }
                FieldSpec::Struct { name, fields } => {
                    let path = join_path(prefix, &name);
                    if depth + 1 > MAX_NESTING_DEPTH {
                        return Err(self.unsupported(
                            &path,
                            format!("struct nested deeper than {MAX_NESTING_DEPTH} levels"),
                        ));
                    }
                    if fields.len() > MAX_STRUCT_FIELDS {
                        return Err(self.unsupported(
                            &path,
                            format!("struct with more than {MAX_STRUCT_FIELDS} fields"),
                        ));
                    }

                    meta.push_cstr(&name);
                    meta.push_u8(tag::STRUCT);
                    meta.push_u8(fields.len() as u8);

                    let children = self.flatten(fields, &path, depth + 1, meta)?;
                    nodes.push(SchemaNode {
                        name,
                        kind: SchemaKind::Struct(children),
                    });
                }
            }
        }
        Ok(nodes)
    }
}

impl<T> TypeDescriptorSet<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Leaf descriptors in wire order.
    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    pub fn schema(&self) -> &[SchemaNode] {
        &self.schema
    }

    /// Exact scratch bytes one write needs; no padding.
    pub fn scratch_size(&self) -> usize {
        self.scratch_size
    }

    /// Payload segments one write produces.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Fields that pin borrowed data.
    pub fn pin_count(&self) -> usize {
        self.pin_count
    }

    pub fn type_metadata(&self) -> &[u8] {
        &self.type_metadata
    }

    /// Encode every field of `payload` in declaration order.
    ///
    /// Stops at the first failing field; the caller's frame session releases
    /// whatever was pinned before the failure.
    pub fn encode<'a>(&self, payload: &'a T, frame: &mut ScratchFrame<'a>) -> core::result::Result<(), EncodeError> {
        for field in &self.fields {
            field.encode(payload, frame)?;
        }
        Ok(())
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

type RegistryEntry = core::result::Result<Arc<dyn Any + Send + Sync>, Error>;

/// Memoizing registry of descriptor sets, keyed by payload type.
pub struct TypeRegistry {
    entries: DashMap<TypeId, RegistryEntry>,
    builds: AtomicU64,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            builds: AtomicU64::new(0),
        }
    }

    /// Descriptor set for `T`, built on first use.
    pub fn register<T: EventPayload>(&self) -> Result<Arc<TypeDescriptorSet<T>>> {
        let key = TypeId::of::<T>();

        let cached = self.entries.get(&key).map(|e| e.value().clone());
        let entry = match cached {
            Some(entry) => entry,
            None => self
                .entries
                .entry(key)
                .or_insert_with(|| {
                    self.builds.fetch_add(1, Ordering::Relaxed);
                    let built = TypeDescriptorSet::<T>::build();
                    match &built {
                        Ok(set) => log::debug!(
                            "[eventsource] registered shape '{}' ({} fields, {} scratch bytes, {} pins)",
                            T::NAME,
                            set.fields().len(),
                            set.scratch_size(),
                            set.pin_count()
                        ),
                        Err(e) => log::debug!("[eventsource] rejected shape '{}': {e}", T::NAME),
                    }
                    built.map(|set| Arc::new(set) as Arc<dyn Any + Send + Sync>)
                })
                .value()
                .clone(),
        };

        let any = entry?;
        #[allow(clippy::expect_used)] // entries are keyed by TypeId::of::<T>()
        let set = any
            .downcast::<TypeDescriptorSet<T>>()
            .ok()
            .expect("registry entry type matches its TypeId key");
        Ok(set)
    }

    /// Number of shape builds performed (successful or not).
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
