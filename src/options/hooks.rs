//! Shell-command hooks registered with the CLI.

use serde::{Deserialize, Serialize};

/// Lifecycle point at which a hook fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    UserPromptSubmit,
    Stop,
    SubagentStop,
    PreCompact,
}

impl HookEvent {
    /// Name used as the key in the `--hooks` payload.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::Stop => "Stop",
            Self::SubagentStop => "SubagentStop",
            Self::PreCompact => "PreCompact",
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands to run for tools whose name matches `matcher`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookMatcher {
    /// Tool name pattern; `None` matches every tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    /// Shell commands to execute.
    #[serde(default)]
    pub hooks: Vec<String>,
    /// Timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

impl HookMatcher {
    #[must_use]
    pub fn new(matcher: Option<String>, hooks: Vec<String>, timeout: Option<u32>) -> Self {
        Self {
            matcher,
            hooks,
            timeout,
        }
    }

    /// A matcher running a single shell command.
    #[must_use]
    pub fn command(command: impl Into<String>, matcher: Option<&str>, timeout: Option<u32>) -> Self {
        Self {
            matcher: matcher.map(str::to_string),
            hooks: vec![command.into()],
            timeout,
        }
    }
}
