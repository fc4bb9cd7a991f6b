//! Content blocks carried inside user and assistant turns.
//!
//! Decoding never fails. Missing fields fall back to empty defaults and an
//! unknown `type` becomes a [`ContentBlock::Text`] holding the JSON of the
//! unrecognized block, so one odd block cannot abort the surrounding message.

use serde::Serialize;
use serde_json::Value;

use super::fields::{self, JsonObject};

/// A single piece of an assistant or user turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// Extended reasoning trace.
    Thinking {
        /// The reasoning text.
        thinking: String,
        /// Opaque signature; must be passed back unmodified.
        signature: String,
    },
    /// Tool invocation requested by the model.
    ToolUse {
        /// Tool use identifier.
        id: String,
        /// Name of the tool.
        name: String,
        /// Tool arguments.
        input: Value,
    },
    /// Output of a tool invocation.
    ToolResult {
        /// Identifier of the originating tool use.
        tool_use_id: String,
        /// Result payload: a string, structured value, or absent.
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<Value>,
        /// Whether the tool reported an error.
        is_error: bool,
    },
}

impl ContentBlock {
    /// Decode a content block from a JSON object.
    #[must_use]
    pub fn from_json(obj: &JsonObject) -> Self {
        let string = |key: &str| fields::string(obj, &[key]).unwrap_or_default();

        match obj.get("type").and_then(Value::as_str) {
            Some("text") => Self::Text {
                text: string("text"),
            },
            Some("thinking") => Self::Thinking {
                thinking: string("thinking"),
                signature: string("signature"),
            },
            Some("tool_use") => Self::ToolUse {
                id: string("id"),
                name: string("name"),
                input: fields::value(obj, &["input"])
                    .cloned()
                    .unwrap_or_else(|| Value::Object(JsonObject::new())),
            },
            Some("tool_result") => Self::ToolResult {
                tool_use_id: string("tool_use_id"),
                content: fields::value(obj, &["content"]).cloned(),
                is_error: fields::boolean(obj, &["is_error"]).unwrap_or(false),
            },
            other => {
                tracing::debug!(block_type = ?other, "Unrecognized content block, keeping as text");
                Self::Text {
                    text: Value::Object(obj.clone()).to_string(),
                }
            }
        }
    }

    /// Decode a content block from any JSON value.
    ///
    /// Non-object values are wrapped as text holding their JSON form.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(obj) => Self::from_json(obj),
            other => Self::Text {
                text: other.to_string(),
            },
        }
    }

    /// Decode an ordered list of blocks; a non-array yields an empty list.
    #[must_use]
    pub fn list_from_value(value: Option<&Value>) -> Vec<Self> {
        value
            .and_then(Value::as_array)
            .map(|items| items.iter().map(Self::from_value).collect())
            .unwrap_or_default()
    }

    /// Discriminator of this block as it appears on the wire.
    #[must_use]
    pub fn block_type(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Thinking { .. } => "thinking",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
        }
    }

    /// Returns the text if this is a text block.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Returns true if this is a tool use block.
    #[must_use]
    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse { .. })
    }

    /// Re-encode this block in wire form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
