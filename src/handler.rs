//! Dataset handler - schema lifecycle and traversal entry point
//!
//! Owns the current schema tree behind a swap-only lock. Traversals run
//! against an `Arc` snapshot, so replacing the schema never affects a
//! stream already in flight.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde_yaml::Value as YamlValue;
use std::any::Any;

use crate::config::build_schema;
use crate::error::EngineError;
use crate::resolve::BindOptions;
use crate::schema::SchemaNode;
use crate::source::SourceValue;
use crate::stream::{serialize, EventStream, StreamItem};

/// Shared, swappable handle to a validated schema tree
#[derive(Debug)]
pub struct Handler {
    schema: RwLock<Arc<SchemaNode>>,
    bind: BindOptions,
}

impl Handler {
    /// Validate a schema tree and wrap it. Both the structural invariants
    /// and the top-level shape restriction are checked here, before any
    /// data is touched.
    pub fn from_schema(root: SchemaNode) -> Result<Self, EngineError> {
        root.validate()?;
        root.validate_top_level()?;
        Ok(Self {
            schema: RwLock::new(Arc::new(root)),
            bind: BindOptions::default(),
        })
    }

    /// Build a handler from an already-parsed YAML config value.
    pub fn from_config(config: &YamlValue) -> Result<Self, EngineError> {
        Self::from_schema(build_schema(config)?)
    }

    /// Build a handler from YAML configuration text.
    pub fn from_yaml(yaml: &str) -> Result<Self, EngineError> {
        let config: YamlValue = serde_yaml::from_str(yaml)?;
        Self::from_config(&config)
    }

    /// Build a handler from a YAML configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    pub fn with_bind_options(mut self, bind: BindOptions) -> Self {
        self.bind = bind;
        self
    }

    /// The current schema tree. The snapshot stays valid (and unchanged)
    /// across any later `replace_schema`.
    pub fn snapshot(&self) -> Arc<SchemaNode> {
        self.schema
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new schema tree. The replacement is validated first; on
    /// failure the current schema stays in place.
    pub fn replace_schema(&self, root: SchemaNode) -> Result<(), EngineError> {
        root.validate()?;
        root.validate_top_level()?;
        let mut guard = self.schema.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(root);
        Ok(())
    }

    /// Stream a data source against a caller-held schema snapshot.
    ///
    /// The stream borrows the snapshot, so take it first:
    /// `let schema = handler.snapshot();` then `handler.stream(&schema, ..)`.
    pub fn stream<'a>(
        &self,
        schema: &'a SchemaNode,
        data: SourceValue,
        handle: &'a mut dyn Any,
    ) -> EventStream<'a> {
        serialize(schema, data, handle, self.bind)
    }

    /// Run a full traversal eagerly and collect every item. Convenience for
    /// callers that do not need the lazy stream.
    pub fn collect_events(
        &self,
        data: SourceValue,
        handle: &mut dyn Any,
    ) -> Vec<StreamItem> {
        let schema = self.snapshot();
        serialize(&schema, data, handle, self.bind).collect()
    }
}
