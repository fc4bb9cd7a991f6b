//! Summary view over a finished run.

use serde_json::Value;

use crate::protocol::{AssistantMessage, ContentBlock, Message, ResultMessage};

/// Messages from one run plus the derived summary.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub messages: Vec<Message>,
    /// Index of the last result record in `messages`.
    result_index: Option<usize>,
    pub session_id: Option<String>,
}

impl QueryResult {
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        let result_index = messages.iter().rposition(Message::is_result);
        let session_id = messages
            .iter()
            .filter(|m| matches!(m, Message::System(_) | Message::Result(_)))
            .find_map(|m| m.session_id().filter(|id| !id.is_empty()))
            .map(str::to_string);

        Self {
            messages,
            result_index,
            session_id,
        }
    }

    /// The last result record, if the run produced one.
    #[must_use]
    pub fn result(&self) -> Option<&ResultMessage> {
        match self.messages.get(self.result_index?)? {
            Message::Result(result) => Some(result),
            _ => None,
        }
    }

    /// Final answer text.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.result()?.result_text.as_deref()
    }

    /// Schema-constrained answer, when one was requested.
    #[must_use]
    pub fn structured(&self) -> Option<&Value> {
        self.result()?.structured_output.as_ref()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result().is_some_and(ResultMessage::is_success)
    }

    /// True when the result says so, or when there is no result at all.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.result().map_or(true, |r| r.is_error)
    }

    #[must_use]
    pub fn cost_usd(&self) -> Option<f64> {
        self.result()?.total_cost_usd
    }

    #[must_use]
    pub fn turns(&self) -> u32 {
        self.result().map_or(0, |r| r.num_turns)
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.result().map_or(0, |r| r.duration_ms)
    }

    pub fn assistant_messages(&self) -> impl Iterator<Item = &AssistantMessage> {
        self.messages.iter().filter_map(|m| match m {
            Message::Assistant(a) => Some(a),
            _ => None,
        })
    }

    /// Text of every assistant turn, skipping turns without text.
    #[must_use]
    pub fn full_text(&self) -> String {
        self.assistant_messages()
            .map(AssistantMessage::text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool use blocks across all assistant turns.
    #[must_use]
    pub fn tool_uses(&self) -> Vec<&ContentBlock> {
        self.assistant_messages()
            .flat_map(AssistantMessage::tool_uses)
            .collect()
    }
}

impl From<Vec<Message>> for QueryResult {
    fn from(messages: Vec<Message>) -> Self {
        Self::new(messages)
    }
}
