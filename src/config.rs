//! Schema configuration parsing
//!
//! Builds the immutable schema tree from an ordered, nested YAML structure:
//!
//! ```yaml
//! dataset:
//!   station:
//!     type: Dataset
//!     attributes:
//!       station_name: FRASER
//!     children:
//!       observations:
//!         type: Sequence
//!         data: obs               # binding-key override, defaults to name
//!         children:
//!           time: Text            # string shorthand
//!           temp:
//!             type: Numeric
//!             default: 0
//!             attributes:
//!               units: degrees_C
//! ```
//!
//! Declarations are either a bare type name or a mapping with `type:` plus
//! optional `attributes`, `data`, `default` and `children`/`items`. Children
//! may be a mapping or a list of single-entry mappings; declaration order is
//! preserved either way. All structural problems surface here as
//! `SchemaError`, before any traversal begins.

use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use crate::error::SchemaError;
use crate::schema::{join_path, Attributes, NodeKind, ScalarType, SchemaNode};

/// Build a schema tree from a parsed YAML config with a `dataset:` section.
pub fn build_schema(config: &YamlValue) -> Result<SchemaNode, SchemaError> {
    let section = config
        .as_mapping()
        .and_then(|m| m.get("dataset"))
        .ok_or_else(|| SchemaError::InvalidRoot {
            details: "missing 'dataset:' section".to_string(),
        })?;

    let decls = section.as_mapping().ok_or_else(|| SchemaError::InvalidRoot {
        details: "'dataset:' must be a mapping".to_string(),
    })?;
    if decls.len() != 1 {
        return Err(SchemaError::InvalidRoot {
            details: format!("expected exactly 1 declaration, found {}", decls.len()),
        });
    }

    let (name, declaration) = decls.iter().next().unwrap_or((&YamlValue::Null, &YamlValue::Null));
    let name = name.as_str().ok_or_else(|| SchemaError::InvalidRoot {
        details: "dataset name must be a string".to_string(),
    })?;

    let type_name = declaration
        .as_mapping()
        .and_then(|m| m.get("type"))
        .and_then(|t| t.as_str());
    if !type_name.is_some_and(|t| t.eq_ignore_ascii_case("dataset")) {
        return Err(SchemaError::InvalidRoot {
            details: "top-level declaration must have type Dataset".to_string(),
        });
    }

    let root = parse_declaration(name, declaration, name, true)?;
    root.validate()?;
    Ok(root)
}

/// Parse one `<name>: <declaration>` pair into a schema node.
fn parse_declaration(
    name: &str,
    declaration: &YamlValue,
    path: &str,
    is_root: bool,
) -> Result<SchemaNode, SchemaError> {
    match declaration {
        // Shorthand: the declaration is just a type name.
        YamlValue::String(type_name) => {
            make_node(name, type_name, path, is_root, Attributes::new(), None, None, None)
        }
        YamlValue::Mapping(decl) => {
            let type_name = decl
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| SchemaError::Malformed {
                    path: path.to_string(),
                    details: "missing or non-string 'type' key".to_string(),
                })?;

            let attributes = match decl.get("attributes") {
                None | Some(YamlValue::Null) => Attributes::new(),
                Some(YamlValue::Mapping(m)) => parse_attributes(m, path)?,
                Some(_) => {
                    return Err(SchemaError::Malformed {
                        path: path.to_string(),
                        details: "'attributes' must be a mapping".to_string(),
                    })
                }
            };

            let binding = match decl.get("data") {
                None => None,
                Some(YamlValue::String(key)) => Some(key.clone()),
                Some(_) => {
                    return Err(SchemaError::Malformed {
                        path: path.to_string(),
                        details: "'data' (binding-key override) must be a string".to_string(),
                    })
                }
            };

            let default = decl.get("default").map(|v| yaml_to_json(v, path)).transpose()?;

            // `children` and `items` are synonyms; `items` wins a tie only
            // by never being declared alongside `children` in practice.
            let children = decl.get("children").or_else(|| decl.get("items"));

            make_node(name, type_name, path, is_root, attributes, binding, default, children)
        }
        _ => Err(SchemaError::Malformed {
            path: path.to_string(),
            details: "declaration must be a type name or a mapping".to_string(),
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn make_node(
    name: &str,
    type_name: &str,
    path: &str,
    is_root: bool,
    attributes: Attributes,
    binding: Option<String>,
    default: Option<JsonValue>,
    children: Option<&YamlValue>,
) -> Result<SchemaNode, SchemaError> {
    let is_scalar = parse_scalar_type(type_name).is_some();
    if default.is_some() && !is_scalar {
        return Err(SchemaError::DefaultOnNonScalar { path: path.to_string() });
    }

    let kind = if type_name.eq_ignore_ascii_case("dataset") {
        if !is_root {
            return Err(SchemaError::DatasetBelowRoot { path: path.to_string() });
        }
        NodeKind::Group { children: parse_children(children, path)? }
    } else if type_name.eq_ignore_ascii_case("sequence") || type_name.eq_ignore_ascii_case("container") {
        NodeKind::Container { children: parse_children(children, path)? }
    } else if let Some(ty) = parse_scalar_type(type_name) {
        if children.is_some() {
            return Err(SchemaError::ChildrenOnScalar { path: path.to_string() });
        }
        NodeKind::Scalar { ty, default }
    } else {
        return Err(SchemaError::UnknownType {
            path: path.to_string(),
            type_name: type_name.to_string(),
        });
    };

    Ok(SchemaNode {
        name: name.to_string(),
        attributes,
        binding_key: binding,
        kind,
    })
}

fn parse_scalar_type(type_name: &str) -> Option<ScalarType> {
    if type_name.eq_ignore_ascii_case("numeric") {
        Some(ScalarType::Numeric)
    } else if type_name.eq_ignore_ascii_case("text") {
        Some(ScalarType::Text)
    } else if type_name.eq_ignore_ascii_case("boolean") {
        Some(ScalarType::Boolean)
    } else {
        None
    }
}

/// Children come as a mapping (`name: declaration`) or a list of
/// single-entry mappings; both preserve declaration order.
fn parse_children(
    children: Option<&YamlValue>,
    path: &str,
) -> Result<Vec<SchemaNode>, SchemaError> {
    let mut parsed = Vec::new();

    match children {
        None | Some(YamlValue::Null) => {}
        Some(YamlValue::Mapping(m)) => {
            for (key, declaration) in m {
                let name = child_name(key, path)?;
                parsed.push(parse_declaration(name, declaration, &join_path(path, name), false)?);
            }
        }
        Some(YamlValue::Sequence(entries)) => {
            for entry in entries {
                let m = entry.as_mapping().filter(|m| m.len() == 1).ok_or_else(|| {
                    SchemaError::Malformed {
                        path: path.to_string(),
                        details: "each child list entry must be a single-entry mapping".to_string(),
                    }
                })?;
                let (key, declaration) = m.iter().next().unwrap_or((&YamlValue::Null, &YamlValue::Null));
                let name = child_name(key, path)?;
                parsed.push(parse_declaration(name, declaration, &join_path(path, name), false)?);
            }
        }
        Some(_) => {
            return Err(SchemaError::Malformed {
                path: path.to_string(),
                details: "'children' must be a mapping or a list".to_string(),
            })
        }
    }

    Ok(parsed)
}

fn child_name<'a>(key: &'a YamlValue, path: &str) -> Result<&'a str, SchemaError> {
    key.as_str().ok_or_else(|| SchemaError::Malformed {
        path: path.to_string(),
        details: "child names must be strings".to_string(),
    })
}

fn parse_attributes(m: &serde_yaml::Mapping, path: &str) -> Result<Attributes, SchemaError> {
    let mut attributes = Attributes::new();
    for (key, value) in m {
        let name = child_name(key, path)?;
        attributes.insert(name.to_string(), yaml_to_json(value, path)?);
    }
    Ok(attributes)
}

/// Attribute and default values cross from the YAML config into the JSON
/// value model the engine runs on.
fn yaml_to_json(value: &YamlValue, path: &str) -> Result<JsonValue, SchemaError> {
    serde_json::to_value(value).map_err(|e| SchemaError::Malformed {
        path: path.to_string(),
        details: format!("value is not representable: {}", e),
    })
}
