//! JSON encoding of evaluated values.

use crate::error::ConfigError;
use crate::value::Value;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use unicfg_eval::{BasicType, NodeId, NodeValue, SourceInfo, Tree};

/// Encode `value` and its descendants as JSON.
///
/// Struct fields keep definition order. Bytes become base64 strings. Any
/// incomplete node below `value` fails the whole encoding.
pub(crate) fn to_json(value: &Value) -> Result<Vec<u8>, ConfigError> {
    let Some(id) = value.node_id() else {
        return Err(ConfigError::Serialization {
            message: "cannot marshal an undefined value".to_string(),
            position: value.position(),
        });
    };

    let tree = value.tree();
    if let Some((constraint, position)) = first_incomplete(tree, id) {
        return Err(ConfigError::Incomplete {
            constraint,
            position: position.map_or_else(|| "-".to_string(), ToString::to_string),
        });
    }

    serde_json::to_vec(&NodeView { tree, id }).map_err(|e| ConfigError::Serialization {
        message: e.to_string(),
        position: value.position(),
    })
}

fn first_incomplete(tree: &Tree, id: NodeId) -> Option<(BasicType, Option<&SourceInfo>)> {
    let node = tree.node(id);
    match &node.value {
        NodeValue::Incomplete(constraint) => Some((*constraint, node.positions.first())),
        NodeValue::Struct(fields) => {
            fields.values().find_map(|&child| first_incomplete(tree, child))
        }
        NodeValue::List(items) => items.iter().find_map(|&child| first_incomplete(tree, child)),
        _ => None,
    }
}

struct NodeView<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl Serialize for NodeView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.tree.node(self.id).value {
            NodeValue::Null => serializer.serialize_unit(),
            NodeValue::Bool(b) => serializer.serialize_bool(*b),
            NodeValue::Int(i) => serializer.serialize_i64(*i),
            NodeValue::Float(f) if !f.is_finite() => {
                Err(S::Error::custom(format!("unsupported float value {}", f)))
            }
            NodeValue::Float(f) => serializer.serialize_f64(*f),
            NodeValue::String(s) => serializer.serialize_str(s),
            NodeValue::Bytes(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            NodeValue::Struct(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (label, &id) in fields {
                    map.serialize_entry(label, &NodeView { tree: self.tree, id })?;
                }
                map.end()
            }
            NodeValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for &id in items {
                    seq.serialize_element(&NodeView { tree: self.tree, id })?;
                }
                seq.end()
            }
            NodeValue::Incomplete(constraint) => {
                Err(S::Error::custom(format!("incomplete value {}", constraint)))
            }
        }
    }
}
