//! Schema tree - the immutable, typed description of the output shape
//!
//! Three node kinds:
//! - `Group`: static, tuple-like grouping (the dataset root); resolves its
//!   children by key, emits no container boundaries of its own
//! - `Container`: row-bearing sequence of variable cardinality
//! - `Scalar`: leaf with one declared primitive type
//!
//! Built once from configuration, read-only afterwards. Replacing a schema
//! means swapping the whole tree, never mutating in place.

use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::error::SchemaError;

/// Insertion-ordered attribute map (serde_json with `preserve_order`).
pub type Attributes = serde_json::Map<String, Value>;

/// Supported primitive types for scalar nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Numeric,
    Text,
    Boolean,
}

impl ScalarType {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Numeric => "numeric",
            ScalarType::Text => "text",
            ScalarType::Boolean => "boolean",
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Node variant plus variant-specific payload
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Static grouping; root-only in configuration (the `Dataset` type).
    Group { children: Vec<SchemaNode> },
    /// Row-bearing sequence (the `Sequence` type).
    Container { children: Vec<SchemaNode> },
    /// Leaf with a declared primitive type and an optional per-row default.
    Scalar { ty: ScalarType, default: Option<Value> },
}

/// One node of the schema tree
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    /// Non-empty identifier, unique among siblings
    pub name: String,
    /// Free-form attributes, insertion-ordered, carried onto emitted events
    pub attributes: Attributes,
    /// Explicit binding-key override; `None` means bind by `name`
    pub binding_key: Option<String>,
    pub kind: NodeKind,
}

impl SchemaNode {
    pub fn group(name: impl Into<String>, children: Vec<SchemaNode>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            binding_key: None,
            kind: NodeKind::Group { children },
        }
    }

    pub fn container(name: impl Into<String>, children: Vec<SchemaNode>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            binding_key: None,
            kind: NodeKind::Container { children },
        }
    }

    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            binding_key: None,
            kind: NodeKind::Scalar { ty, default: None },
        }
    }

    pub fn with_binding(mut self, key: impl Into<String>) -> Self {
        self.binding_key = Some(key.into());
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        if let NodeKind::Scalar { default: d, .. } = &mut self.kind {
            *d = Some(default);
        }
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// The key used to select this node's data from its parent's context.
    /// Defaults to the node name when no override is declared.
    pub fn binding_key(&self) -> &str {
        self.binding_key.as_deref().unwrap_or(&self.name)
    }

    /// Whether the config carried an explicit `data:` override.
    pub fn has_explicit_binding(&self) -> bool {
        self.binding_key.is_some()
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container { .. })
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar { .. })
    }

    /// Children in declaration order; empty for scalar nodes.
    pub fn children(&self) -> &[SchemaNode] {
        match &self.kind {
            NodeKind::Group { children } | NodeKind::Container { children } => children,
            NodeKind::Scalar { .. } => &[],
        }
    }

    /// Depth-first, pre-order traversal, children in declaration order.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Structural invariants: non-empty names, no empty groups/containers,
    /// no sibling name collisions. Applied at build time and again on
    /// programmatic schema replacement.
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.validate_at(&self.name)
    }

    fn validate_at(&self, path: &str) -> Result<(), SchemaError> {
        if self.name.is_empty() {
            return Err(SchemaError::Malformed {
                path: path.to_string(),
                details: "node name must be non-empty".to_string(),
            });
        }
        match &self.kind {
            NodeKind::Scalar { .. } => Ok(()),
            NodeKind::Group { children } | NodeKind::Container { children } => {
                if children.is_empty() {
                    return Err(SchemaError::EmptyContainer { path: path.to_string() });
                }
                let mut seen = FxHashSet::default();
                for child in children {
                    if !seen.insert(child.name.as_str()) {
                        return Err(SchemaError::DuplicateChild {
                            path: path.to_string(),
                            name: child.name.clone(),
                        });
                    }
                    child.validate_at(&join_path(path, &child.name))?;
                }
                Ok(())
            }
        }
    }

    /// Product-level shape restriction, enforced before any traversal:
    /// the root may hold at most one container among its immediate children,
    /// and no container anywhere in the tree may itself contain a container.
    /// The rejected pattern is a sequence whose child shape would vary per
    /// parent row; that cannot be told apart statically, so container
    /// nesting is rejected wholesale.
    pub fn validate_top_level(&self) -> Result<(), SchemaError> {
        let outer_containers = self
            .children()
            .iter()
            .filter(|c| c.is_container())
            .count();
        if self.is_container() {
            // A root container counts as the one allowed sequence itself.
            if outer_containers > 0 {
                return Err(SchemaError::UnsupportedShape { path: self.name.clone() });
            }
        } else if outer_containers > 1 {
            return Err(SchemaError::UnsupportedShape { path: self.name.clone() });
        }
        self.reject_nested_containers(&self.name)
    }

    fn reject_nested_containers(&self, path: &str) -> Result<(), SchemaError> {
        for child in self.children() {
            let child_path = join_path(path, &child.name);
            if child.is_container() && self.is_container() {
                return Err(SchemaError::UnsupportedShape { path: child_path });
            }
            child.reject_nested_containers(&child_path)?;
        }
        Ok(())
    }
}

/// Pre-order iterator over a schema tree
pub struct Walk<'a> {
    stack: Vec<&'a SchemaNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a SchemaNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Push in reverse so children pop in declaration order.
        for child in node.children().iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

/// Join a parent path with a child name using dotted notation.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}
