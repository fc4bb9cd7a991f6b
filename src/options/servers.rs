//! MCP server and sub-agent definitions passed to the CLI as JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How the CLI reaches an MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpServerConfig {
    /// Server exposed over Server-Sent Events.
    Sse {
        #[serde(rename = "type")]
        kind: SseTag,
        url: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
    },
    /// Server launched as a child process speaking stdio.
    Stdio {
        command: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
    },
}

/// Wire tag for SSE servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SseTag {
    Sse,
}

impl McpServerConfig {
    #[must_use]
    pub fn stdio(
        command: impl Into<String>,
        args: Vec<String>,
        env: BTreeMap<String, String>,
    ) -> Self {
        Self::Stdio {
            command: command.into(),
            args,
            env,
        }
    }

    #[must_use]
    pub fn sse(url: impl Into<String>, headers: BTreeMap<String, String>) -> Self {
        Self::Sse {
            kind: SseTag::Sse,
            url: url.into(),
            headers,
        }
    }
}

/// A named sub-agent the model may delegate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub description: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AgentDefinition {
    #[must_use]
    pub fn new(description: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            prompt: prompt.into(),
            tools: None,
            model: None,
        }
    }

    #[must_use]
    pub fn tools(mut self, tools: &[&str]) -> Self {
        self.tools = Some(tools.iter().map(|s| (*s).to_string()).collect());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}
