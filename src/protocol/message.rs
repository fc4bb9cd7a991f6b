//! Top-level protocol records emitted by the CLI in stream-json mode.
//!
//! Each line of output decodes into exactly one [`Message`]. Decoding is
//! total: an unknown or missing `type` produces [`Message::Generic`], and
//! missing fields fall back to defaults. The original object is kept on every
//! variant so fields this crate does not model are never lost.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::Value;

use super::content::ContentBlock;
use super::fields::{self, JsonObject};
use super::usage::ModelUsage;

/// Kind reported for records whose `type` field is absent.
pub const UNKNOWN_MESSAGE_TYPE: &str = "unknown";

/// Discriminator of a decoded [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    User,
    Assistant,
    System,
    Result,
    Generic,
}

/// User turn content: the protocol sends either a bare string or blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum UserContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl UserContent {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(text)) => Self::Text(text.clone()),
            Some(Value::Array(_)) => Self::Blocks(ContentBlock::list_from_value(value)),
            Some(other) => Self::Text(other.to_string()),
            None => Self::Text(String::new()),
        }
    }

    /// Text of the turn; block content joins its text blocks with newlines.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => join_text(blocks),
        }
    }
}

/// User turn, including tool results fed back to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct UserMessage {
    pub content: UserContent,
    /// Turn identifier (`uuid` on the wire).
    pub turn_id: Option<String>,
    pub parent_tool_use_id: Option<String>,
    pub raw: JsonObject,
}

/// Assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantMessage {
    pub content: Vec<ContentBlock>,
    pub id: Option<String>,
    pub model: Option<String>,
    /// Usage object as sent, not yet normalized.
    pub usage: Option<Value>,
    /// Set when this turn belongs to a sub-agent spawned by a tool use.
    pub parent_tool_use_id: Option<String>,
    pub raw: JsonObject,
}

impl AssistantMessage {
    /// Concatenated text blocks, newline separated.
    #[must_use]
    pub fn text(&self) -> String {
        join_text(&self.content)
    }

    /// Tool use blocks in order of appearance.
    #[must_use]
    pub fn tool_uses(&self) -> Vec<&ContentBlock> {
        self.content.iter().filter(|b| b.is_tool_use()).collect()
    }

    /// Usage normalized into a [`ModelUsage`], if present.
    #[must_use]
    pub fn parsed_usage(&self) -> Option<ModelUsage> {
        self.usage
            .as_ref()
            .and_then(Value::as_object)
            .map(ModelUsage::from_json)
    }
}

/// System notice such as the `init` record.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemMessage {
    pub subtype: String,
    pub session_id: Option<String>,
    pub raw: JsonObject,
}

impl SystemMessage {
    #[must_use]
    pub fn is_init(&self) -> bool {
        self.subtype == "init"
    }

    /// Full decoded record, including fields not modelled here.
    #[must_use]
    pub fn payload(&self) -> &JsonObject {
        &self.raw
    }
}

/// Final record of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMessage {
    /// `success`, `error`, or another CLI-defined tag.
    pub subtype: String,
    /// Final answer text.
    pub result_text: Option<String>,
    pub session_id: Option<String>,
    pub duration_ms: u64,
    pub duration_api_ms: u64,
    pub is_error: bool,
    pub num_turns: u32,
    pub total_cost_usd: Option<f64>,
    pub usage: Option<Value>,
    /// Model identifier to raw usage object.
    pub model_usage: Option<JsonObject>,
    /// Present only when a JSON schema was requested.
    pub structured_output: Option<Value>,
    pub raw: JsonObject,
}

impl ResultMessage {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.subtype == "success"
    }

    /// Per-model usage as typed snapshots. Non-object entries are skipped.
    #[must_use]
    pub fn parsed_model_usage(&self) -> BTreeMap<String, ModelUsage> {
        self.model_usage
            .iter()
            .flatten()
            .filter_map(|(model, usage)| {
                usage
                    .as_object()
                    .map(|obj| (model.clone(), ModelUsage::from_json(obj)))
            })
            .collect()
    }

    /// Cache-read tokens summed across models.
    #[must_use]
    pub fn cache_read_tokens(&self) -> u64 {
        self.parsed_model_usage()
            .values()
            .map(|u| u.cache_read_input_tokens)
            .fold(0, u64::saturating_add)
    }

    /// Cache-creation tokens summed across models.
    #[must_use]
    pub fn cache_creation_tokens(&self) -> u64 {
        self.parsed_model_usage()
            .values()
            .map(|u| u.cache_creation_input_tokens)
            .fold(0, u64::saturating_add)
    }
}

/// Record with a `type` this crate does not model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericMessage {
    /// The original `type`, or [`UNKNOWN_MESSAGE_TYPE`] when absent.
    pub kind: String,
    pub raw: JsonObject,
}

/// One decoded protocol record.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    User(UserMessage),
    Assistant(AssistantMessage),
    System(SystemMessage),
    Result(ResultMessage),
    Generic(GenericMessage),
}

impl Message {
    /// Decode a message from one JSON object.
    #[must_use]
    pub fn from_json(obj: JsonObject) -> Self {
        match obj.get("type").and_then(Value::as_str) {
            Some("user") => Self::User(parse_user(obj)),
            Some("assistant") => Self::Assistant(parse_assistant(obj)),
            Some("system") => Self::System(parse_system(obj)),
            Some("result") => Self::Result(parse_result(obj)),
            other => {
                let kind = match other {
                    Some(kind) => kind.to_string(),
                    None => obj
                        .get("type")
                        .filter(|v| !v.is_null())
                        .map_or_else(|| UNKNOWN_MESSAGE_TYPE.to_string(), Value::to_string),
                };
                Self::Generic(GenericMessage { kind, raw: obj })
            }
        }
    }

    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::User(_) => MessageKind::User,
            Self::Assistant(_) => MessageKind::Assistant,
            Self::System(_) => MessageKind::System,
            Self::Result(_) => MessageKind::Result,
            Self::Generic(_) => MessageKind::Generic,
        }
    }

    /// The `type` string this message was decoded from.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::User(_) => "user",
            Self::Assistant(_) => "assistant",
            Self::System(_) => "system",
            Self::Result(_) => "result",
            Self::Generic(m) => &m.kind,
        }
    }

    /// The decoded object exactly as received.
    #[must_use]
    pub fn raw(&self) -> &JsonObject {
        match self {
            Self::User(m) => &m.raw,
            Self::Assistant(m) => &m.raw,
            Self::System(m) => &m.raw,
            Self::Result(m) => &m.raw,
            Self::Generic(m) => &m.raw,
        }
    }

    /// Session identifier, if this record carries one.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::System(m) => m.session_id.as_deref(),
            Self::Result(m) => m.session_id.as_deref(),
            other => other.raw().get("session_id").and_then(Value::as_str),
        }
    }

    /// Returns true for the final result record.
    #[must_use]
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result(_))
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw().serialize(serializer)
    }
}

/// Field lookup over records that may nest their body under `message`.
struct Envelope<'a> {
    outer: &'a JsonObject,
    inner: Option<&'a JsonObject>,
}

impl<'a> Envelope<'a> {
    fn new(outer: &'a JsonObject) -> Self {
        Self {
            outer,
            inner: outer.get("message").and_then(Value::as_object),
        }
    }

    /// Nested value first, then the flattened sibling.
    fn get(&self, key: &str) -> Option<&'a Value> {
        let nested = self
            .inner
            .and_then(|inner| inner.get(key))
            .filter(|v| !v.is_null());
        let flat = self.outer.get(key).filter(|v| !v.is_null());

        match (nested, flat) {
            (Some(nested), Some(flat)) => {
                if nested != flat {
                    tracing::debug!(
                        field = key,
                        "Nested message field disagrees with top-level field, using nested value"
                    );
                }
                Some(nested)
            }
            (nested, flat) => nested.or(flat),
        }
    }

    fn string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::as_str).map(str::to_string)
    }
}

fn parse_user(obj: JsonObject) -> UserMessage {
    let env = Envelope::new(&obj);
    let content = UserContent::from_value(env.get("content"));
    let turn_id = fields::string(&obj, &["uuid"]);
    let parent_tool_use_id = fields::string(&obj, &["parent_tool_use_id"]);

    UserMessage {
        content,
        turn_id,
        parent_tool_use_id,
        raw: obj,
    }
}

fn parse_assistant(obj: JsonObject) -> AssistantMessage {
    let env = Envelope::new(&obj);
    let content = ContentBlock::list_from_value(env.get("content"));
    let id = env.string("id");
    let model = env.string("model");
    let usage = env.get("usage").cloned();
    let parent_tool_use_id = fields::string(&obj, &["parent_tool_use_id"]);

    AssistantMessage {
        content,
        id,
        model,
        usage,
        parent_tool_use_id,
        raw: obj,
    }
}

fn parse_system(obj: JsonObject) -> SystemMessage {
    SystemMessage {
        subtype: fields::string(&obj, &["subtype"]).unwrap_or_default(),
        session_id: fields::string(&obj, &["session_id"]),
        raw: obj,
    }
}

fn parse_result(obj: JsonObject) -> ResultMessage {
    ResultMessage {
        subtype: fields::string(&obj, &["subtype"]).unwrap_or_default(),
        result_text: fields::string(&obj, &["result"]),
        session_id: fields::string(&obj, &["session_id"]),
        duration_ms: fields::unsigned(&obj, &["duration_ms"]).unwrap_or(0),
        duration_api_ms: fields::unsigned(&obj, &["duration_api_ms"]).unwrap_or(0),
        is_error: fields::boolean(&obj, &["is_error"]).unwrap_or(false),
        num_turns: fields::unsigned(&obj, &["num_turns"])
            .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX)),
        total_cost_usd: fields::float(&obj, &["total_cost_usd"]),
        usage: fields::value(&obj, &["usage"]).cloned(),
        model_usage: fields::object(&obj, &["model_usage", "modelUsage"]).cloned(),
        structured_output: fields::value(&obj, &["structured_output"]).cloned(),
        raw: obj,
    }
}

fn join_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(ContentBlock::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}
