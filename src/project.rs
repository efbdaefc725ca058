//! Row projection and type coercion
//!
//! For each row a container's source yields, project the raw fields into the
//! container's declared children: look each child's binding key up in the
//! row (or its declaration position, for positional rows), coerce to the
//! declared scalar type, and hand nested container children back to the
//! driver untouched.
//!
//! A failure here is row-scoped: it carries the container path and the
//! 1-based row ordinal, and aborts only that container's remaining rows.

use serde::Serialize;
use serde_json::Value;

use crate::classify::value_kind;
use crate::error::ProjectionError;
use crate::schema::{NodeKind, ScalarType, SchemaNode};
use crate::source::{Row, SourceValue};

/// A coerced, type-tagged scalar value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Numeric(f64),
    Text(String),
    Boolean(bool),
}

/// Transient per-row projection result for one scalar child.
/// `child` indexes into the container's children in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub child: usize,
    pub value: TypedValue,
}

/// One declaration-order slot of a projected row
#[derive(Debug)]
pub enum RowSlot {
    Field(ResolvedField),
    /// A nested container child: its raw per-row data, resolution deferred
    /// to the driver so rows stay one-at-a-time
    Nested { child: usize, raw: SourceValue },
}

/// Coerce a raw value to a declared scalar type.
///
/// - numeric: JSON numbers, and strings that parse as numbers
/// - boolean: JSON booleans and the canonical "true"/"false" tokens only
/// - text: anything, via its canonical string rendering
pub fn coerce(raw: &Value, ty: ScalarType) -> Option<TypedValue> {
    match ty {
        ScalarType::Numeric => match raw {
            Value::Number(n) => n.as_f64().map(TypedValue::Numeric),
            Value::String(s) => s.trim().parse::<f64>().ok().map(TypedValue::Numeric),
            _ => None,
        },
        ScalarType::Boolean => match raw {
            Value::Bool(b) => Some(TypedValue::Boolean(*b)),
            Value::String(s) if s == "true" => Some(TypedValue::Boolean(true)),
            Value::String(s) if s == "false" => Some(TypedValue::Boolean(false)),
            _ => None,
        },
        ScalarType::Text => match raw {
            Value::String(s) => Some(TypedValue::Text(s.clone())),
            other => Some(TypedValue::Text(other.to_string())),
        },
    }
}

/// Project one row into the container's children, in declaration order.
///
/// `ordinal` is the 1-based position of the row within its source, used for
/// error reporting only.
pub fn project_row(
    row: &Row,
    container: &SchemaNode,
    ordinal: usize,
    path: &str,
) -> Result<Vec<RowSlot>, ProjectionError> {
    let children = container.children();
    let mut slots = Vec::with_capacity(children.len());

    for (position, child) in children.iter().enumerate() {
        let raw = row.get(child.binding_key(), position);
        match &child.kind {
            NodeKind::Scalar { ty, default } => {
                let (value, found) = match raw {
                    Some(v) => (coerce(v, *ty), value_kind(v)),
                    None => match default {
                        Some(d) => (coerce(d, *ty), value_kind(d)),
                        None => {
                            return Err(ProjectionError::MissingField {
                                path: path.to_string(),
                                field: child.binding_key().to_string(),
                                row: ordinal,
                            })
                        }
                    },
                };
                let value = value.ok_or_else(|| ProjectionError::TypeMismatch {
                    path: path.to_string(),
                    field: child.binding_key().to_string(),
                    row: ordinal,
                    expected: ty.name(),
                    found,
                })?;
                slots.push(RowSlot::Field(ResolvedField { child: position, value }));
            }
            NodeKind::Container { .. } | NodeKind::Group { .. } => {
                let raw = raw.cloned().ok_or_else(|| ProjectionError::MissingField {
                    path: path.to_string(),
                    field: child.binding_key().to_string(),
                    row: ordinal,
                })?;
                slots.push(RowSlot::Nested { child: position, raw: SourceValue::Value(raw) });
            }
        }
    }

    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaNode;
    use rustc_hash::FxHashMap;
    use serde_json::json;

    fn named(fields: Vec<(&str, Value)>) -> Row {
        Row::Named(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<FxHashMap<_, _>>(),
        )
    }

    fn observations() -> SchemaNode {
        SchemaNode::container(
            "observations",
            vec![
                SchemaNode::scalar("a", ScalarType::Numeric),
                SchemaNode::scalar("b", ScalarType::Text),
            ],
        )
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(coerce(&json!(1), ScalarType::Numeric), Some(TypedValue::Numeric(1.0)));
        assert_eq!(coerce(&json!(2.5), ScalarType::Numeric), Some(TypedValue::Numeric(2.5)));
        assert_eq!(coerce(&json!("3.5"), ScalarType::Numeric), Some(TypedValue::Numeric(3.5)));
        assert_eq!(coerce(&json!(" -4 "), ScalarType::Numeric), Some(TypedValue::Numeric(-4.0)));
        assert_eq!(coerce(&json!("giraffe"), ScalarType::Numeric), None);
        assert_eq!(coerce(&json!(true), ScalarType::Numeric), None);
        assert_eq!(coerce(&Value::Null, ScalarType::Numeric), None);
    }

    #[test]
    fn boolean_coercion_accepts_canonical_tokens_only() {
        assert_eq!(coerce(&json!(true), ScalarType::Boolean), Some(TypedValue::Boolean(true)));
        assert_eq!(coerce(&json!("false"), ScalarType::Boolean), Some(TypedValue::Boolean(false)));
        assert_eq!(coerce(&json!("True"), ScalarType::Boolean), None);
        assert_eq!(coerce(&json!(1), ScalarType::Boolean), None);
        assert_eq!(coerce(&json!("yes"), ScalarType::Boolean), None);
    }

    #[test]
    fn text_coercion_accepts_anything() {
        assert_eq!(coerce(&json!("x"), ScalarType::Text), Some(TypedValue::Text("x".into())));
        assert_eq!(coerce(&json!(7), ScalarType::Text), Some(TypedValue::Text("7".into())));
        assert_eq!(coerce(&json!(false), ScalarType::Text), Some(TypedValue::Text("false".into())));
        assert_eq!(
            coerce(&json!([1, 2]), ScalarType::Text),
            Some(TypedValue::Text("[1,2]".into()))
        );
    }

    #[test]
    fn projects_named_row_in_declaration_order() {
        let row = named(vec![("b", json!("x")), ("a", json!(1))]);
        let slots = project_row(&row, &observations(), 1, "ds.observations").unwrap();

        assert_eq!(slots.len(), 2);
        assert!(matches!(
            &slots[0],
            RowSlot::Field(ResolvedField { child: 0, value: TypedValue::Numeric(n) }) if *n == 1.0
        ));
        assert!(matches!(
            &slots[1],
            RowSlot::Field(ResolvedField { child: 1, value: TypedValue::Text(s) }) if s == "x"
        ));
    }

    #[test]
    fn projects_positional_row_by_declaration_order() {
        let row = Row::Positional(vec![json!(2), json!("y")]);
        let slots = project_row(&row, &observations(), 1, "ds.observations").unwrap();
        assert!(matches!(
            &slots[0],
            RowSlot::Field(ResolvedField { value: TypedValue::Numeric(n), .. }) if *n == 2.0
        ));
    }

    #[test]
    fn positional_arity_shortfall_is_missing_field() {
        let row = Row::Positional(vec![json!(2)]);
        let err = project_row(&row, &observations(), 3, "ds.observations").unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::MissingField { field, row, .. } if field == "b" && row == 3
        ));
    }

    #[test]
    fn missing_field_uses_declared_default() {
        let container = SchemaNode::container(
            "obs",
            vec![SchemaNode::scalar("a", ScalarType::Numeric).with_default(json!(0))],
        );
        let row = named(vec![]);
        let slots = project_row(&row, &container, 1, "ds.obs").unwrap();
        assert!(matches!(
            &slots[0],
            RowSlot::Field(ResolvedField { value: TypedValue::Numeric(n), .. }) if *n == 0.0
        ));
    }

    #[test]
    fn missing_field_without_default_errors_with_ordinal() {
        let row = named(vec![("a", json!(1))]);
        let err = project_row(&row, &observations(), 2, "ds.observations").unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::MissingField { field, row, .. } if field == "b" && row == 2
        ));
    }

    #[test]
    fn type_mismatch_reports_expected_and_found() {
        let row = named(vec![("a", json!("not-a-number")), ("b", json!("x"))]);
        let err = project_row(&row, &observations(), 2, "ds.observations").unwrap_err();
        match err {
            ProjectionError::TypeMismatch { field, row, expected, found, .. } => {
                assert_eq!(field, "a");
                assert_eq!(row, 2);
                assert_eq!(expected, "numeric");
                assert_eq!(found, "string");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lookup_uses_binding_key_not_name() {
        let container = SchemaNode::container(
            "obs",
            vec![SchemaNode::scalar("temp", ScalarType::Numeric).with_binding("temperature_c")],
        );
        let row = named(vec![("temperature_c", json!(21))]);
        let slots = project_row(&row, &container, 1, "ds.obs").unwrap();
        assert!(matches!(&slots[0], RowSlot::Field(_)));
    }

    #[test]
    fn nested_container_child_is_handed_back_raw() {
        let container = SchemaNode::container(
            "outer",
            vec![
                SchemaNode::scalar("a", ScalarType::Numeric),
                SchemaNode::container("inner", vec![SchemaNode::scalar("b", ScalarType::Text)]),
            ],
        );
        let row = named(vec![("a", json!(1)), ("inner", json!([{"b": "x"}]))]);
        let slots = project_row(&row, &container, 1, "ds.outer").unwrap();
        assert!(matches!(
            &slots[1],
            RowSlot::Nested { child: 1, raw: SourceValue::Value(Value::Array(_)) }
        ));
    }
}
