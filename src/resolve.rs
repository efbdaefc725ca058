//! Cascading binding resolution
//!
//! A child's data context is selected from its parent's *already-resolved*
//! context by the child's binding key; resolution never looks above the
//! immediate parent and never materializes a row source.
//!
//! Three-way rule:
//! - mapping parent: look the key up at the tree level (the branch is taken
//!   out of the parent - contexts are owned by the traversal, one per path)
//! - literal parent: only a sole scalar child may pass the value through
//! - rows/producer parent: defer - the key selects a field within a row, at
//!   projection time, not a sub-tree

use crate::classify::{classify, expected_shape, DataContext};
use crate::error::{EngineError, ResolutionError};
use crate::schema::{join_path, SchemaNode};

/// What resolution produced for one child
#[derive(Debug)]
pub enum Resolution {
    /// The child's own data context, ready to traverse
    Context(DataContext),
    /// Marker: the parent is row-shaped, bind this child per row instead
    Deferred,
}

/// How a container with no explicit `data:` override binds to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingDefault {
    /// Look the node's name up in the parent context (the adopted default)
    #[default]
    ByName,
    /// Hand the parent context to the container unconsumed
    PassThrough,
}

/// Engine-level binding options
#[derive(Debug, Clone, Copy, Default)]
pub struct BindOptions {
    pub container_binding: BindingDefault,
}

/// Resolve one child's context out of its parent's.
///
/// `sibling_count` is the number of children the parent declares; the
/// literal pass-through rule only applies to a sole scalar child.
pub fn resolve_child(
    parent: &mut DataContext,
    child: &SchemaNode,
    sibling_count: usize,
    parent_path: &str,
    opts: &BindOptions,
) -> Result<Resolution, EngineError> {
    let child_path = join_path(parent_path, &child.name);

    // Open question resolved as a config option: a container with no
    // explicit override may take the whole parent context instead of a
    // by-name lookup. The parent context moves to the child.
    if child.is_container()
        && !child.has_explicit_binding()
        && opts.container_binding == BindingDefault::PassThrough
    {
        tracing::debug!(path = child_path.as_str(), "container binding passed through");
        let ctx = std::mem::replace(parent, DataContext::Literal(serde_json::Value::Null));
        return Ok(Resolution::Context(ctx));
    }

    match parent {
        DataContext::Mapping(map) => {
            let key = child.binding_key();
            let raw = map.remove(key).ok_or_else(|| ResolutionError::MissingBinding {
                path: child_path.clone(),
                key: key.to_string(),
            })?;
            let ctx = classify(raw, expected_shape(child), &child_path)?;
            Ok(Resolution::Context(ctx))
        }
        DataContext::Literal(value) => {
            if sibling_count == 1 && child.is_scalar() {
                let value = std::mem::take(value);
                Ok(Resolution::Context(DataContext::Literal(value)))
            } else {
                Err(ResolutionError::InvalidShape {
                    path: child_path,
                    details: format!(
                        "literal context can only feed a sole scalar child, \
                         '{}' is one of {} children",
                        child.name, sibling_count
                    ),
                }
                .into())
            }
        }
        // The key selects a field within a row; hand the row source
        // downstream unconsumed.
        DataContext::Rows(_) | DataContext::Producer(_) => Ok(Resolution::Deferred),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Shape;
    use crate::schema::{ScalarType, SchemaNode};
    use crate::source::{SourceValue, VecRows};
    use serde_json::json;

    fn mapping(entries: Vec<(&str, SourceValue)>) -> DataContext {
        DataContext::Mapping(
            entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        )
    }

    #[test]
    fn mapping_lookup_by_name() {
        let mut parent = mapping(vec![("temp", json!(21.5).into())]);
        let child = SchemaNode::scalar("temp", ScalarType::Numeric);

        let res = resolve_child(&mut parent, &child, 2, "ds", &BindOptions::default()).unwrap();
        assert!(matches!(
            res,
            Resolution::Context(DataContext::Literal(v)) if v == json!(21.5)
        ));
    }

    #[test]
    fn mapping_lookup_honors_override() {
        let mut parent = mapping(vec![("temperature_c", json!(7).into())]);
        let child = SchemaNode::scalar("temp", ScalarType::Numeric).with_binding("temperature_c");

        let res = resolve_child(&mut parent, &child, 1, "ds", &BindOptions::default()).unwrap();
        assert!(matches!(res, Resolution::Context(DataContext::Literal(_))));
    }

    #[test]
    fn missing_binding_reports_key_and_path() {
        let mut parent = mapping(vec![]);
        let child = SchemaNode::scalar("temp", ScalarType::Numeric);

        let err = resolve_child(&mut parent, &child, 1, "ds", &BindOptions::default()).unwrap_err();
        match err {
            EngineError::Resolution(ResolutionError::MissingBinding { path, key }) => {
                assert_eq!(path, "ds.temp");
                assert_eq!(key, "temp");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lookup_takes_the_branch_out_of_the_parent() {
        let mut parent = mapping(vec![("x", json!(1).into())]);
        let child = SchemaNode::scalar("x", ScalarType::Numeric);

        resolve_child(&mut parent, &child, 1, "ds", &BindOptions::default()).unwrap();
        let err = resolve_child(&mut parent, &child, 1, "ds", &BindOptions::default());
        assert!(err.is_err(), "no two contexts for the same path may coexist");
    }

    #[test]
    fn literal_passes_through_to_sole_scalar_child() {
        let mut parent = DataContext::Literal(json!("FRASER"));
        let child = SchemaNode::scalar("name", ScalarType::Text);

        let res = resolve_child(&mut parent, &child, 1, "ds", &BindOptions::default()).unwrap();
        assert!(matches!(
            res,
            Resolution::Context(DataContext::Literal(v)) if v == json!("FRASER")
        ));
    }

    #[test]
    fn literal_rejects_multiple_children() {
        let mut parent = DataContext::Literal(json!("x"));
        let child = SchemaNode::scalar("a", ScalarType::Text);

        let err = resolve_child(&mut parent, &child, 3, "ds", &BindOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Resolution(ResolutionError::InvalidShape { .. })
        ));
    }

    #[test]
    fn row_shaped_parent_defers() {
        let rows = classify(json!([{"a": 1}]).into(), Shape::Container, "ds.seq").unwrap();
        let mut parent = rows;
        let child = SchemaNode::scalar("a", ScalarType::Numeric);

        let res = resolve_child(&mut parent, &child, 1, "ds.seq", &BindOptions::default()).unwrap();
        assert!(matches!(res, Resolution::Deferred));
        // The row source is still unconsumed.
        let DataContext::Rows(mut cursor) = parent else { panic!("rows gone") };
        assert!(cursor.next_row().is_some());
    }

    #[test]
    fn pass_through_hands_parent_context_to_container() {
        let mut parent = mapping(vec![("whatever", json!(1).into())]);
        let child = SchemaNode::container(
            "obs",
            vec![SchemaNode::scalar("a", ScalarType::Numeric)],
        );
        let opts = BindOptions { container_binding: BindingDefault::PassThrough };

        let res = resolve_child(&mut parent, &child, 1, "ds", &opts).unwrap();
        // The container received the parent mapping itself, not a lookup.
        assert!(matches!(res, Resolution::Context(DataContext::Mapping(m)) if m.len() == 1));
    }

    #[test]
    fn pass_through_ignored_with_explicit_override() {
        let mut parent = mapping(vec![(
            "obs",
            SourceValue::rows(VecRows::from_values(vec![json!({"a": 1})])),
        )]);
        let child = SchemaNode::container(
            "observations",
            vec![SchemaNode::scalar("a", ScalarType::Numeric)],
        )
        .with_binding("obs");
        let opts = BindOptions { container_binding: BindingDefault::PassThrough };

        let res = resolve_child(&mut parent, &child, 1, "ds", &opts).unwrap();
        assert!(matches!(res, Resolution::Context(DataContext::Rows(_))));
    }
}
