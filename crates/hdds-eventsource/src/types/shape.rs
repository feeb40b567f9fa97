// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Explicit payload shape description.
//!
//! A payload type lists its fields once, as (name, kind, accessor) tuples.
//! The registry turns that list into a cached
//! [`TypeDescriptorSet`](super::TypeDescriptorSet); nothing is rediscovered
//! per write.
//!
//! ```rust
//! use hdds_eventsource::types::{EventPayload, FieldKind, FieldValue, ShapeBuilder};
//!
//! struct Request {
//!     url: String,
//!     status: u16,
//! }
//!
//! impl EventPayload for Request {
//!     const NAME: &'static str = "Request";
//!
//!     fn describe(shape: &mut ShapeBuilder<Self>) {
//!         shape
//!             .field("url", FieldKind::Str, |r| FieldValue::Str(&r.url))
//!             .field("status", FieldKind::U16, |r| FieldValue::U16(r.status));
//!     }
//! }
//! ```

use super::kind::FieldKind;
use super::value::FieldValue;
use std::sync::Arc;

/// Extracts one field value from a payload, borrowing from it.
pub type Accessor<T> = Arc<dyn for<'a> Fn(&'a T) -> FieldValue<'a> + Send + Sync>;

/// Payload types that can be written through an event source.
pub trait EventPayload: Send + Sync + 'static {
    /// Shape name, used in diagnostics.
    const NAME: &'static str;

    /// Declare the ordered field list.
    fn describe(shape: &mut ShapeBuilder<Self>)
    where
        Self: Sized;
}

/// The empty payload.
impl EventPayload for () {
    const NAME: &'static str = "()";

    fn describe(_shape: &mut ShapeBuilder<Self>) {}
}

fn accessor<T, F>(f: F) -> Accessor<T>
where
    F: for<'a> Fn(&'a T) -> FieldValue<'a> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// One declared field, possibly a nested struct.
pub(crate) enum FieldSpec<T> {
    Leaf {
        name: String,
        kind: FieldKind,
        accessor: Accessor<T>,
    },
    Struct {
        name: String,
        fields: Vec<FieldSpec<T>>,
    },
}

impl<U: 'static> FieldSpec<U> {
    /// Re-root this spec under an outer payload type.
    fn project<T: 'static>(self, outer: fn(&T) -> &U) -> FieldSpec<T> {
        match self {
            FieldSpec::Leaf {
                name,
                kind,
                accessor: inner,
            } => FieldSpec::Leaf {
                name,
                kind,
                accessor: accessor(move |t: &T| inner(outer(t))),
            },
            FieldSpec::Struct { name, fields } => FieldSpec::Struct {
                name,
                fields: fields.into_iter().map(|f| f.project(outer)).collect(),
            },
        }
    }
}

/// Collects the field list of one payload shape.
pub struct ShapeBuilder<T> {
    pub(crate) fields: Vec<FieldSpec<T>>,
}

impl<T: 'static> ShapeBuilder<T> {
    pub(crate) fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Declare a leaf field.
    pub fn field<F>(&mut self, name: impl Into<String>, kind: FieldKind, get: F) -> &mut Self
    where
        F: for<'a> Fn(&'a T) -> FieldValue<'a> + Send + Sync + 'static,
    {
        self.fields.push(FieldSpec::Leaf {
            name: name.into(),
            kind,
            accessor: accessor(get),
        });
        self
    }

    /// Declare a nested struct field whose shape is `U`'s.
    pub fn nested<U: EventPayload>(
        &mut self,
        name: impl Into<String>,
        project: fn(&T) -> &U,
    ) -> &mut Self {
        let mut inner = ShapeBuilder::<U>::new();
        U::describe(&mut inner);
        self.fields.push(FieldSpec::Struct {
            name: name.into(),
            fields: inner.fields.into_iter().map(|f| f.project(project)).collect(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point {
        x: i32,
        y: i32,
    }

    impl EventPayload for Point {
        const NAME: &'static str = "Point";

        fn describe(shape: &mut ShapeBuilder<Self>) {
            shape
                .field("x", FieldKind::I32, |p| FieldValue::I32(p.x))
                .field("y", FieldKind::I32, |p| FieldValue::I32(p.y));
        }
    }

    struct Move {
        label: String,
        to: Point,
    }

    impl EventPayload for Move {
        const NAME: &'static str = "Move";

        fn describe(shape: &mut ShapeBuilder<Self>) {
            shape
                .field("label", FieldKind::Str, |m| FieldValue::Str(&m.label))
                .nested("to", |m| &m.to);
        }
    }

    #[test]
    fn test_nested_accessors_are_projected() {
        let mut shape = ShapeBuilder::<Move>::new();
        Move::describe(&mut shape);
        assert_eq!(shape.len(), 2);

        let payload = Move {
            label: "east".into(),
            to: Point { x: 3, y: -1 },
        };

        let FieldSpec::Struct { name, fields } = &shape.fields[1] else {
            panic!("second field should be a struct");
        };
        assert_eq!(name, "to");

        let values: Vec<_> = fields
            .iter()
            .map(|f| match f {
                FieldSpec::Leaf { accessor, .. } => accessor(&payload),
                FieldSpec::Struct { .. } => panic!("no deeper nesting"),
            })
            .collect();
        assert_eq!(values, vec![FieldValue::I32(3), FieldValue::I32(-1)]);
    }

    #[test]
    fn test_unit_payload_is_empty() {
        let mut shape = ShapeBuilder::<()>::new();
        <() as EventPayload>::describe(&mut shape);
        assert!(shape.is_empty());
    }
}
