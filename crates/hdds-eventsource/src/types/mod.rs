// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Payload shapes, descriptor sets and the decoded listener view.

mod decode;
mod kind;
mod registry;
mod shape;
mod value;

pub use decode::{decode_payload, Payload};
pub use kind::{tag, FieldKind};
pub use registry::{
    Encoding, FieldDescriptor, SchemaKind, SchemaNode, TypeDescriptorSet, TypeRegistry,
};
pub use shape::{Accessor, EventPayload, ShapeBuilder};
pub use value::{ArrayRef, FieldValue, Value};
