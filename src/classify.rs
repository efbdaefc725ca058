//! Data source classification
//!
//! Normalizes a raw `SourceValue` into one of four context shapes:
//! producer, row source, mapping, or literal, checked in that order.
//! Invocability wins over iteration, iteration over key addressability,
//! with literal as the fallback.
//!
//! Classification is parameterized by the *expected* shape from the schema
//! side: a JSON array feeding a container is a row source, while the same
//! array feeding a scalar stays a literal. Index addressability alone never
//! decides.

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::ClassifyError;
use crate::schema::{NodeKind, SchemaNode};
use crate::source::{RowCursor, RowProducer, SourceValue, VecRows};

/// The shape the schema expects at a binding site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Static grouping: accepts a mapping, a literal for its sole scalar
    /// child, or rows to hand through to a lone sequence child
    Group,
    Container,
    Scalar,
}

/// The expected shape for a node's own data binding.
pub fn expected_shape(node: &SchemaNode) -> Shape {
    match node.kind {
        NodeKind::Group { .. } => Shape::Group,
        NodeKind::Container { .. } => Shape::Container,
        NodeKind::Scalar { .. } => Shape::Scalar,
    }
}

/// The resolved runtime value reachable at one tree path.
///
/// Produced fresh for each traversal and owned by it; a context is consumed
/// as the traversal advances, so no two contexts for the same path coexist.
pub enum DataContext {
    Literal(Value),
    Mapping(FxHashMap<String, SourceValue>),
    Rows(RowCursor),
    Producer(Box<dyn RowProducer>),
}

impl DataContext {
    pub fn kind(&self) -> &'static str {
        match self {
            DataContext::Literal(_) => "literal",
            DataContext::Mapping(_) => "mapping",
            DataContext::Rows(_) => "row source",
            DataContext::Producer(_) => "producer",
        }
    }
}

impl std::fmt::Debug for DataContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// Normalize a raw value to a `DataContext` against the expected shape.
///
/// Ordering matters and mirrors the contract: invocable first, then lazy
/// iteration, then key addressability, then literal fallback.
pub fn classify(
    raw: SourceValue,
    expected: Shape,
    path: &str,
) -> Result<DataContext, ClassifyError> {
    let ctx = match raw {
        SourceValue::Producer(producer) => DataContext::Producer(producer),
        SourceValue::Rows(source) => DataContext::Rows(RowCursor::new(source)),
        SourceValue::Map(map) => DataContext::Mapping(map),
        SourceValue::Value(value) => match value {
            Value::Array(items) if expected != Shape::Scalar => {
                DataContext::Rows(RowCursor::new(Box::new(VecRows::from_values(items))))
            }
            Value::Object(fields) => DataContext::Mapping(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, SourceValue::Value(v)))
                    .collect(),
            ),
            other if expected == Shape::Container => {
                // An irreducible bare scalar cannot feed a container.
                return Err(ClassifyError::Ambiguous {
                    path: path.to_string(),
                    found: value_kind(&other),
                });
            }
            literal => DataContext::Literal(literal),
        },
    };
    tracing::debug!(path, kind = ctx.kind(), "classified data context");
    Ok(ctx)
}

/// Human-readable kind of a JSON value, for error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
