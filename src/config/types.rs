//! Configuration types.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable carrying the API key for the CLI.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Cloud provider switches understood by the Claude Code CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Route requests through Amazon Bedrock.
    pub bedrock: bool,
    /// Route requests through Google Vertex AI.
    pub vertex: bool,
    /// Route requests through Microsoft Foundry.
    pub foundry: bool,
}

impl ProvidersConfig {
    /// `CLAUDE_CODE_USE_*` variables for the enabled providers.
    #[must_use]
    pub fn env(&self) -> BTreeMap<String, String> {
        [
            ("CLAUDE_CODE_USE_BEDROCK", self.bedrock),
            ("CLAUDE_CODE_USE_VERTEX", self.vertex),
            ("CLAUDE_CODE_USE_FOUNDRY", self.foundry),
        ]
        .into_iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(key, _)| (key.to_string(), "1".to_string()))
        .collect()
    }
}

/// Agent configuration loaded from TOML and the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Path to the `claude` binary; located automatically when unset.
    pub cli_path: Option<PathBuf>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub permission_mode: String,
    pub cwd: Option<PathBuf>,
    pub allowed_tools: Vec<String>,
    pub max_turns: Option<u32>,
    /// Wall-clock limit per invocation, in seconds. Zero disables it.
    pub process_timeout: Option<u64>,
    pub providers: ProvidersConfig,
}

fn default_permission_mode() -> String {
    "default".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cli_path: None,
            api_key: None,
            model: None,
            permission_mode: default_permission_mode(),
            cwd: None,
            allowed_tools: Vec::new(),
            max_turns: None,
            process_timeout: None,
            providers: ProvidersConfig::default(),
        }
    }
}

impl AgentConfig {
    /// The configured process timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.process_timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Base environment handed to every CLI invocation.
    #[must_use]
    pub fn provider_env(&self) -> BTreeMap<String, String> {
        let mut env = self.providers.env();
        if let Some(ref key) = self.api_key {
            env.insert(API_KEY_ENV.to_string(), key.clone());
        }
        env
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get("CLAUDE_AGENT_CLI_PATH") {
            self.cli_path = Some(PathBuf::from(path));
        }
        if let Some(key) = get(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(model) = get("CLAUDE_AGENT_MODEL") {
            self.model = Some(model);
        }
        if let Some(mode) = get("CLAUDE_AGENT_PERMISSION_MODE") {
            self.permission_mode = mode;
        }
        if let Some(cwd) = get("CLAUDE_AGENT_CWD") {
            self.cwd = Some(PathBuf::from(cwd));
        }
        if let Some(turns) = get("CLAUDE_AGENT_MAX_TURNS") {
            match turns.trim().parse() {
                Ok(turns) => self.max_turns = Some(turns),
                Err(_) => tracing::warn!(value = %turns, "Ignoring invalid CLAUDE_AGENT_MAX_TURNS"),
            }
        }
        if let Some(timeout) = get("CLAUDE_AGENT_TIMEOUT") {
            match timeout.trim().parse() {
                Ok(secs) => self.process_timeout = Some(secs),
                Err(_) => tracing::warn!(value = %timeout, "Ignoring invalid CLAUDE_AGENT_TIMEOUT"),
            }
        }

        if let Some(flag) = get("CLAUDE_CODE_USE_BEDROCK") {
            self.providers.bedrock = is_truthy(&flag);
        }
        if let Some(flag) = get("CLAUDE_CODE_USE_VERTEX") {
            self.providers.vertex = is_truthy(&flag);
        }
        if let Some(flag) = get("CLAUDE_CODE_USE_FOUNDRY") {
            self.providers.foundry = is_truthy(&flag);
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
