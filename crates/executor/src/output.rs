//! Serializer boundary used by the output phase and by frame streaming.
//!
//! A [`Serializer`] turns a command's [`ResultValue`] into a sequence of
//! [`Chunk`]s, one per result item. The output phase writes the chunks to a
//! byte channel separated by [`OutputFormat::separator`]; the frame adapter
//! forwards each chunk as one frame.
//!
//! [`StandardSerializer`] renders plain text and JSON. Other formats plug in
//! through the trait.

use keystone_core::{Error, ResultValue, Result};
use serde::{Deserialize, Serialize};

/// One serialized result item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Textual item
    Text(String),
    /// Binary item
    Bytes(Vec<u8>),
}

impl Chunk {
    /// Raw bytes of the chunk.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Chunk::Text(s) => s.as_bytes(),
            Chunk::Bytes(b) => b,
        }
    }
}

/// Output method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMethod {
    /// Plain text (default)
    #[default]
    Text,
    /// JSON
    Json,
}

/// Serialization options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFormat {
    /// Output method.
    pub method: OutputMethod,
    /// Written between items by the output phase.
    pub separator: String,
    /// Pretty-print structured items.
    pub indent: bool,
}

impl OutputFormat {
    /// Plain text, one item per line.
    pub fn text() -> Self {
        Self {
            method: OutputMethod::Text,
            separator: "\n".to_string(),
            indent: false,
        }
    }

    /// Compact JSON, one item per line.
    pub fn json() -> Self {
        Self {
            method: OutputMethod::Json,
            separator: "\n".to_string(),
            indent: false,
        }
    }

    /// Pretty-print structured items.
    pub fn indented(mut self) -> Self {
        self.indent = true;
        self
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::text()
    }
}

/// Turns a result value into chunks.
pub trait Serializer: Send + Sync {
    /// Serialize `value` with `format`.
    fn serialize(&self, value: &ResultValue, format: &OutputFormat) -> Result<Vec<Chunk>>;
}

/// Text and JSON serializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardSerializer;

impl Serializer for StandardSerializer {
    fn serialize(&self, value: &ResultValue, format: &OutputFormat) -> Result<Vec<Chunk>> {
        match format.method {
            OutputMethod::Text => Ok(text_chunks(value)),
            OutputMethod::Json => json_chunks(value, format.indent),
        }
    }
}

fn text_chunks(value: &ResultValue) -> Vec<Chunk> {
    match value {
        ResultValue::Nodes(nodes) => nodes.iter().map(|n| Chunk::Text(n.to_string())).collect(),
        ResultValue::Items(items) => items.iter().cloned().map(Chunk::Text).collect(),
        ResultValue::Json(serde_json::Value::Array(values)) => {
            values.iter().map(|v| Chunk::Text(json_text(v))).collect()
        }
        ResultValue::Json(v) => vec![Chunk::Text(json_text(v))],
        ResultValue::Binary(bytes) => vec![Chunk::Bytes(bytes.clone())],
    }
}

/// Strings without quotes, everything else as compact JSON.
fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_chunks(value: &ResultValue, indent: bool) -> Result<Vec<Chunk>> {
    let render = |v: &serde_json::Value| -> Result<Chunk> {
        let text = if indent {
            serde_json::to_string_pretty(v)?
        } else {
            serde_json::to_string(v)?
        };
        Ok(Chunk::Text(text))
    };

    match value {
        ResultValue::Nodes(nodes) => nodes
            .iter()
            .map(|n| render(&serde_json::Value::from(n.0)))
            .collect(),
        ResultValue::Items(items) => items
            .iter()
            .map(|s| render(&serde_json::Value::String(s.clone())))
            .collect(),
        ResultValue::Json(serde_json::Value::Array(values)) => values.iter().map(render).collect(),
        ResultValue::Json(v) => Ok(vec![render(v)?]),
        ResultValue::Binary(_) => Err(Error::Serialization {
            reason: "binary items cannot be written as JSON".to_string(),
        }),
    }
}
