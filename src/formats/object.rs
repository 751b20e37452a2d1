//! Mapping between the canonical tree and an object model (`serde_json::Value`)
//!
//! JSON and YAML share this mapping:
//! - the top level is an object with a single root key (`$schema` ignored)
//! - keys prefixed with `@` are attributes, `#text` is element text
//! - scalars are text-only elements, arrays repeat an element, `null` is empty
//! - children sharing a name are grouped into an array at their first position
//! - mixed content is a `#content` array of text strings and single-key
//!   element objects, in document order

use crate::document::{is_valid_name, CanonicalDocument, Node};
use crate::errors::ConverterError;
use serde_json::{Map, Value};

const ATTRIBUTE_PREFIX: char = '@';
const TEXT_KEY: &str = "#text";
const CONTENT_KEY: &str = "#content";
const SCHEMA_KEY: &str = "$schema";

/// Build the canonical tree from a parsed object model.
pub(crate) fn value_to_document(value: Value) -> Result<CanonicalDocument, ConverterError> {
    let map = match value {
        Value::Object(map) => map,
        Value::Null => {
            return Err(ConverterError::Parse("Document is empty".to_string()));
        }
        other => {
            return Err(ConverterError::Parse(format!(
                "Top level must be an object with a single root element, found {}",
                kind(&other)
            )));
        }
    };

    let mut roots = map.into_iter().filter(|(k, _)| k != SCHEMA_KEY);
    let (name, body) = roots
        .next()
        .ok_or_else(|| ConverterError::Parse("Document has no root element".to_string()))?;
    if let Some((extra, _)) = roots.next() {
        return Err(ConverterError::Parse(format!(
            "Document has more than one root element ('{}' and '{}')",
            name, extra
        )));
    }

    if matches!(body, Value::Array(_)) {
        return Err(ConverterError::Parse(format!(
            "Root element '{}' cannot be an array",
            name
        )));
    }

    let root = value_to_node(name, body, "")?;
    Ok(CanonicalDocument::new(root))
}

fn value_to_node(name: String, value: Value, parent_path: &str) -> Result<Node, ConverterError> {
    let path = format!("{}/{}", parent_path, name);
    if !is_valid_name(&name) {
        return Err(ConverterError::Parse(format!(
            "Invalid element name '{}' at {}",
            name, path
        )));
    }

    let mut node = Node::new(name);
    match value {
        Value::Null => {}
        Value::Object(map) => {
            let mixed = map.contains_key(CONTENT_KEY);
            for (key, child) in map {
                if key == CONTENT_KEY {
                    push_content(&mut node, child, &path)?;
                } else if mixed && !key.starts_with(ATTRIBUTE_PREFIX) {
                    return Err(ConverterError::Parse(format!(
                        "'{}' cannot appear next to '{}' at {}",
                        key, CONTENT_KEY, path
                    )));
                } else if key == TEXT_KEY {
                    node.set_text(scalar_text(child, &path, &key)?);
                } else if let Some(attr) = key.strip_prefix(ATTRIBUTE_PREFIX) {
                    if !is_valid_name(attr) {
                        return Err(ConverterError::Parse(format!(
                            "Invalid attribute name '{}' at {}",
                            attr, path
                        )));
                    }
                    let text = scalar_text(child, &path, &key)?;
                    node.set_attribute(attr, text);
                } else if let Value::Array(items) = child {
                    for item in items {
                        if matches!(item, Value::Array(_)) {
                            return Err(ConverterError::Parse(format!(
                                "Nested arrays are not supported at {}/{}",
                                path, key
                            )));
                        }
                        node.children.push(value_to_node(key.clone(), item, &path)?);
                    }
                } else {
                    node.children.push(value_to_node(key, child, &path)?);
                }
            }
        }
        Value::Array(_) => {
            return Err(ConverterError::Parse(format!(
                "Unexpected array at {}",
                path
            )));
        }
        scalar => {
            let text = scalar_text(scalar, &path, TEXT_KEY)?;
            node.set_text(text);
        }
    }
    Ok(node)
}

/// Appends a `#content` array to `node`: strings are text segments, objects
/// with a single key are elements.
fn push_content(node: &mut Node, value: Value, path: &str) -> Result<(), ConverterError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(ConverterError::Parse(format!(
                "'{}' at {} must be an array, found {}",
                CONTENT_KEY,
                path,
                kind(&other)
            )));
        }
    };
    for item in items {
        match item {
            Value::String(text) => node.push_text(&text),
            Value::Object(map) if map.len() == 1 => {
                for (key, child) in map {
                    if matches!(child, Value::Array(_)) {
                        return Err(ConverterError::Parse(format!(
                            "Nested arrays are not supported at {}/{}",
                            path, key
                        )));
                    }
                    node.children.push(value_to_node(key, child, path)?);
                }
            }
            other => {
                return Err(ConverterError::Parse(format!(
                    "'{}' entries at {} must be strings or single-element objects, found {}",
                    CONTENT_KEY,
                    path,
                    kind(&other)
                )));
            }
        }
    }
    Ok(())
}

fn scalar_text(value: Value, path: &str, key: &str) -> Result<String, ConverterError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(ConverterError::Parse(format!(
            "Expected a scalar for '{}' at {}, found {}",
            key,
            if path.is_empty() { "/" } else { path },
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Build the object model for a canonical tree.
pub(crate) fn document_to_value(doc: &CanonicalDocument) -> Value {
    let mut top = Map::new();
    top.insert(doc.root.name.clone(), node_to_value(&doc.root));
    Value::Object(top)
}

fn node_to_value(node: &Node) -> Value {
    if node.is_leaf() {
        return Value::String(node.text.clone().unwrap_or_default());
    }

    let mut map = Map::new();
    for (name, value) in &node.attributes {
        map.insert(format!("{}{}", ATTRIBUTE_PREFIX, name), Value::String(value.clone()));
    }
    if node.is_mixed() {
        map.insert(CONTENT_KEY.to_string(), Value::Array(mixed_content(node)));
        return Value::Object(map);
    }
    if let Some(text) = &node.text {
        map.insert(TEXT_KEY.to_string(), Value::String(text.clone()));
    }

    // Group same-named children at the position of their first occurrence.
    let mut order: Vec<&str> = Vec::new();
    for child in &node.children {
        if !order.contains(&child.name.as_str()) {
            order.push(&child.name);
        }
    }
    for name in order {
        let group: Vec<Value> = node.children_named(name).map(node_to_value).collect();
        let value = if group.len() == 1 {
            group.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(group)
        };
        map.insert(name.to_string(), value);
    }
    Value::Object(map)
}

fn mixed_content(node: &Node) -> Vec<Value> {
    let mut items = Vec::new();
    items.extend(node.text.clone().map(Value::String));
    for child in &node.children {
        let mut element = Map::new();
        element.insert(child.name.clone(), node_to_value(child));
        items.push(Value::Object(element));
        items.extend(child.tail.clone().map(Value::String));
    }
    items
}
