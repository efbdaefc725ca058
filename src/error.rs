//! Error taxonomy with stable codes and fix suggestions
//!
//! Five distinct error families, one per engine layer:
//! - `SchemaError` (RC-01x): build-time, structural, always fatal to the build
//! - `ResolutionError` (RC-02x): binding lookup / shape mismatch, fatal to the traversal
//! - `ClassifyError` (RC-03x): data source shape cannot be normalized
//! - `ProjectionError` (RC-04x): row-scoped, aborts one container's remaining rows
//! - `ProducerError` (RC-05x): surfaced from the external row-producing collaborator
//!
//! `EngineError` is the umbrella the stream driver reports through.

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Build-time structural errors. Never retried; surfaced before any traversal.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("RC-010: container '{path}' declares zero children")]
    EmptyContainer { path: String },

    #[error("RC-011: duplicate child name '{name}' under '{path}'")]
    DuplicateChild { path: String, name: String },

    #[error("RC-012: unknown type '{type_name}' at '{path}'")]
    UnknownType { path: String, type_name: String },

    #[error("RC-013: unsupported shape at '{path}': containers may not nest inside containers, and the root may hold at most one")]
    UnsupportedShape { path: String },

    #[error("RC-014: invalid dataset root: {details}")]
    InvalidRoot { details: String },

    #[error("RC-015: 'Dataset' type is only valid at the root, found at '{path}'")]
    DatasetBelowRoot { path: String },

    #[error("RC-016: scalar '{path}' may not declare children")]
    ChildrenOnScalar { path: String },

    #[error("RC-017: 'default' at '{path}' is only valid on scalar nodes")]
    DefaultOnNonScalar { path: String },

    #[error("RC-018: malformed declaration at '{path}': {details}")]
    Malformed { path: String, details: String },
}

/// Binding-key lookup failure or shape mismatch between the expected and
/// actual data context. Fatal to the current traversal.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("RC-020: no binding '{key}' in the data context for '{path}'")]
    MissingBinding { path: String, key: String },

    #[error("RC-021: invalid data shape at '{path}': {details}")]
    InvalidShape { path: String, details: String },
}

/// The data source value cannot be normalized to the shape the schema expects.
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("RC-030: ambiguous data for container '{path}': got a bare {found} with no rows to iterate")]
    Ambiguous { path: String, found: &'static str },
}

/// Row-scoped projection failures, reported with container path and row
/// ordinal (1-based). Abort only the remaining rows of that container.
#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("RC-040: row {row} of '{path}' has no field '{field}' and no default is declared")]
    MissingField { path: String, field: String, row: usize },

    #[error("RC-041: row {row} of '{path}': field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        path: String,
        field: String,
        row: usize,
        expected: &'static str,
        found: &'static str,
    },
}

/// Failure surfaced from the external collaborator behind a producer binding
/// or a row cursor. The engine propagates it without retrying.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ProducerError {
    message: String,
}

impl ProducerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Umbrella error reported through the stream driver and the handler.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("RC-050: producer at '{path}' failed: {source}")]
    Producer {
        path: String,
        #[source]
        source: ProducerError,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Attach a tree path to a bare producer failure.
    pub fn producer(path: impl Into<String>, source: ProducerError) -> Self {
        EngineError::Producer { path: path.into(), source }
    }

    /// True for errors that end the whole traversal (as opposed to one
    /// container's remaining rows or one producer-backed sub-tree).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Schema(_)
                | EngineError::Resolution(_)
                | EngineError::Classify(_)
                | EngineError::Yaml(_)
                | EngineError::Io(_)
        )
    }
}

impl FixSuggestion for EngineError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            EngineError::Schema(e) => match e {
                SchemaError::EmptyContainer { .. } => {
                    Some("Declare at least one child under 'children:' (or 'items:')")
                }
                SchemaError::DuplicateChild { .. } => Some("Sibling names must be unique"),
                SchemaError::UnknownType { .. } => {
                    Some("Supported types: Dataset (root), Sequence/Container, Numeric, Text, Boolean")
                }
                SchemaError::UnsupportedShape { .. } => {
                    Some("Flatten the nested sequence; per-row-varying child shapes are not supported")
                }
                SchemaError::InvalidRoot { .. } => {
                    Some("The config needs a 'dataset:' section with exactly one declaration of type Dataset")
                }
                SchemaError::DatasetBelowRoot { .. } => Some("Use Sequence for nested collections"),
                SchemaError::ChildrenOnScalar { .. } => {
                    Some("Only Dataset and Sequence nodes take children")
                }
                SchemaError::DefaultOnNonScalar { .. } => {
                    Some("Move the default onto the scalar fields it applies to")
                }
                SchemaError::Malformed { .. } => {
                    Some("A declaration is either a type name or a mapping with a 'type:' key")
                }
            },
            EngineError::Resolution(ResolutionError::MissingBinding { .. }) => {
                Some("Add the key to the data source, or set 'data:' on the node to rebind it")
            }
            EngineError::Resolution(ResolutionError::InvalidShape { .. }) => {
                Some("Check that containers are fed rows and scalars are fed plain values")
            }
            EngineError::Classify(_) => {
                Some("A container needs an iterable of rows, a producer, or an array value")
            }
            EngineError::Projection(ProjectionError::MissingField { .. }) => {
                Some("Add the field to the row source or declare 'default:' on the schema node")
            }
            EngineError::Projection(ProjectionError::TypeMismatch { .. }) => {
                Some("Fix the declared scalar type or the row data")
            }
            EngineError::Producer { .. } => None,
            EngineError::Yaml(_) => Some("Check YAML syntax: indentation and quoting"),
            EngineError::Io(_) => Some("Check file path and permissions"),
        }
    }
}
