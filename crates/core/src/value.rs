//! Result values stored by commands that produce output.

use serde::{Deserialize, Serialize};

use crate::node::NodeSet;

/// Value held in a command's result slot until the output phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultValue {
    /// Nodes of the database resource
    Nodes(NodeSet),
    /// Sequence of textual items
    Items(Vec<String>),
    /// Structured value
    Json(serde_json::Value),
    /// Raw bytes
    Binary(Vec<u8>),
}

impl ResultValue {
    /// Number of items a serializer will emit for this value.
    pub fn item_count(&self) -> usize {
        match self {
            ResultValue::Nodes(nodes) => nodes.len(),
            ResultValue::Items(items) => items.len(),
            ResultValue::Json(serde_json::Value::Array(values)) => values.len(),
            ResultValue::Json(_) | ResultValue::Binary(_) => 1,
        }
    }
}

impl From<NodeSet> for ResultValue {
    fn from(nodes: NodeSet) -> Self {
        ResultValue::Nodes(nodes)
    }
}

impl From<String> for ResultValue {
    fn from(text: String) -> Self {
        ResultValue::Items(vec![text])
    }
}

impl From<&str> for ResultValue {
    fn from(text: &str) -> Self {
        ResultValue::Items(vec![text.to_string()])
    }
}
