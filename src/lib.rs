//! Rowcast - schema-driven dataset streaming engine

pub mod classify;
pub mod config;
pub mod error;
pub mod handler;
pub mod project;
pub mod resolve;
pub mod schema;
pub mod source;
pub mod stream;

pub use classify::{classify, expected_shape, DataContext, Shape};
pub use config::build_schema;
pub use error::{EngineError, FixSuggestion, ProducerError};
pub use handler::Handler;
pub use project::{coerce, TypedValue};
pub use resolve::{BindOptions, BindingDefault};
pub use schema::{Attributes, NodeKind, ScalarType, SchemaNode};
pub use source::{Row, RowCursor, RowProducer, RowSource, SourceValue, VecRows};
pub use stream::{serialize, Event, EventStream, StreamItem};
