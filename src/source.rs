//! Data source model - rows, cursors and producers
//!
//! A traversal is handed one `SourceValue` of unknown, heterogeneous shape:
//! a plain JSON value, a nested mapping whose branches may themselves carry
//! row sources, a lazily-consumed `RowSource`, or a `RowProducer` that must
//! be invoked against an external execution handle before it yields rows.
//!
//! Row sources are single-pass and carry an explicit `close` step; the
//! `RowCursor` guard makes release scoped per container, whether the rows
//! were exhausted normally or the consumer stopped early.

use std::any::Any;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::ProducerError;

/// Raw, unclassified data handed to a traversal
pub enum SourceValue {
    /// A plain JSON value: scalar, object or array
    Value(Value),
    /// A nested mapping whose branches are themselves unclassified
    Map(FxHashMap<String, SourceValue>),
    /// A lazy, single-pass row iterator
    Rows(Box<dyn RowSource>),
    /// A producer to invoke once, with an execution handle, for rows
    Producer(Box<dyn RowProducer>),
}

impl SourceValue {
    pub fn map(entries: impl IntoIterator<Item = (String, SourceValue)>) -> Self {
        SourceValue::Map(entries.into_iter().collect())
    }

    pub fn rows(source: impl RowSource + 'static) -> Self {
        SourceValue::Rows(Box::new(source))
    }

    pub fn producer(producer: impl RowProducer + 'static) -> Self {
        SourceValue::Producer(Box::new(producer))
    }
}

impl From<Value> for SourceValue {
    fn from(value: Value) -> Self {
        SourceValue::Value(value)
    }
}

impl std::fmt::Debug for SourceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            SourceValue::Map(m) => f.debug_tuple("Map").field(&m.keys().collect::<Vec<_>>()).finish(),
            SourceValue::Rows(_) => f.write_str("Rows(..)"),
            SourceValue::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// One unit of data yielded by a row source
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    /// Addressed by binding key
    Named(FxHashMap<String, Value>),
    /// Addressed by child declaration order
    Positional(Vec<Value>),
}

impl Row {
    /// Look up a field by binding key (named rows) or by the child's
    /// position in declaration order (positional rows).
    pub fn get(&self, key: &str, position: usize) -> Option<&Value> {
        match self {
            Row::Named(fields) => fields.get(key),
            Row::Positional(values) => values.get(position),
        }
    }
}

/// Lazy, single-pass sequence of rows with an explicit release step.
///
/// `next_row` may fail per row (a cursor dying mid-iteration is the
/// collaborator's failure, hence `ProducerError`). `close` must be safe to
/// call once after the last `next_row`, whether or not the source was
/// exhausted.
pub trait RowSource {
    fn next_row(&mut self) -> Option<Result<Row, ProducerError>>;

    fn close(&mut self) {}
}

/// Invocable data producer: called exactly once per resolution of its
/// binding, with the opaque execution handle the caller supplied (the
/// downcast is the producer's business, not the engine's).
pub trait RowProducer {
    fn produce(&mut self, handle: &mut dyn Any) -> Result<Box<dyn RowSource>, ProducerError>;
}

impl<F> RowProducer for F
where
    F: FnMut(&mut dyn Any) -> Result<Box<dyn RowSource>, ProducerError>,
{
    fn produce(&mut self, handle: &mut dyn Any) -> Result<Box<dyn RowSource>, ProducerError> {
        self(handle)
    }
}

/// In-memory row source backing JSON arrays and test fixtures
pub struct VecRows {
    rows: std::vec::IntoIter<Row>,
}

impl VecRows {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows: rows.into_iter() }
    }

    /// Interpret a JSON array as rows: objects become named rows, arrays
    /// become positional rows, bare scalars become one-column positional
    /// rows (a sequence of atoms feeding a single-child container).
    pub fn from_values(values: Vec<Value>) -> Self {
        let rows = values
            .into_iter()
            .map(|v| match v {
                Value::Object(fields) => {
                    Row::Named(fields.into_iter().collect())
                }
                Value::Array(values) => Row::Positional(values),
                atom => Row::Positional(vec![atom]),
            })
            .collect();
        Self::new(rows)
    }
}

impl RowSource for VecRows {
    fn next_row(&mut self) -> Option<Result<Row, ProducerError>> {
        self.rows.next().map(Ok)
    }
}

/// Scoped guard around a row source.
///
/// Closes the source exactly once: on normal exhaustion, or on drop when the
/// consumer abandons the container early.
pub struct RowCursor {
    source: Box<dyn RowSource>,
    open: bool,
}

impl RowCursor {
    pub fn new(source: Box<dyn RowSource>) -> Self {
        Self { source, open: true }
    }

    pub fn next_row(&mut self) -> Option<Result<Row, ProducerError>> {
        if !self.open {
            return None;
        }
        match self.source.next_row() {
            Some(row) => Some(row),
            None => {
                self.release();
                None
            }
        }
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.source.close();
        }
    }
}

impl Drop for RowCursor {
    fn drop(&mut self) {
        self.release();
    }
}
