//! Per-query options and their translation into CLI flags.
//!
//! [`AgentOptions`] is a plain builder. [`AgentOptions::to_cli_args`] renders
//! the protocol flags the transport places between the binary path and the
//! fixed `--verbose --print <prompt>` tail.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{json, Value};

use super::{AgentDefinition, HookEvent, HookMatcher, McpServerConfig};

/// System prompt override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemPrompt {
    /// Replace the system prompt entirely.
    Text(String),
    /// Use a named preset, optionally appending text.
    Preset {
        preset: String,
        append: Option<String>,
    },
}

impl SystemPrompt {
    /// The Claude Code preset with optional appended instructions.
    #[must_use]
    pub fn claude_code(append: Option<&str>) -> Self {
        Self::Preset {
            preset: "claude_code".to_string(),
            append: append.map(str::to_string),
        }
    }

    fn to_arg(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Preset { preset, append } => {
                let mut value = json!({"type": "preset", "preset": preset});
                if let Some(append) = append {
                    value["append"] = Value::String(append.clone());
                }
                value.to_string()
            }
        }
    }
}

/// Options for a single query.
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub system_prompt: Option<SystemPrompt>,
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
    pub permission_mode: Option<String>,
    pub continue_conversation: bool,
    pub resume: Option<String>,
    pub fork_session: bool,
    pub max_turns: Option<u32>,
    pub model: Option<String>,
    /// JSON schema the final answer must satisfy.
    pub output_schema: Option<Value>,
    pub cwd: Option<PathBuf>,
    pub settings: Option<String>,
    pub add_dirs: Vec<PathBuf>,
    /// Extra environment for the CLI process; wins over transport defaults.
    pub env: BTreeMap<String, String>,
    /// Additional `--flag [value]` pairs, in insertion order.
    pub extra_args: Vec<(String, Option<String>)>,
    pub hooks: BTreeMap<HookEvent, Vec<HookMatcher>>,
    pub user: Option<String>,
    pub include_partial_messages: bool,
    pub agents: BTreeMap<String, AgentDefinition>,
    pub setting_sources: Vec<String>,
    pub sandbox: Option<Value>,
    pub plugins: Vec<PathBuf>,
    pub enable_file_checkpointing: bool,
    pub max_budget_usd: Option<f64>,
    pub max_thinking_tokens: Option<u32>,
    pub fallback_model: Option<String>,
    pub betas: Vec<String>,
}

impl AgentOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tools the agent may use without asking.
    #[must_use]
    pub fn allowed_tools(mut self, tools: &[&str]) -> Self {
        self.allowed_tools = tools.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Set the tools the agent must never use.
    #[must_use]
    pub fn disallowed_tools(mut self, tools: &[&str]) -> Self {
        self.disallowed_tools = tools.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Replace the system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(SystemPrompt::Text(prompt.into()));
        self
    }

    /// Use the Claude Code system prompt, optionally appending text.
    #[must_use]
    pub fn use_claude_code_prompt(mut self, append: Option<&str>) -> Self {
        self.system_prompt = Some(SystemPrompt::claude_code(append));
        self
    }

    #[must_use]
    pub fn mcp_server(mut self, name: impl Into<String>, config: McpServerConfig) -> Self {
        self.mcp_servers.insert(name.into(), config);
        self
    }

    #[must_use]
    pub fn permission_mode(mut self, mode: impl Into<String>) -> Self {
        self.permission_mode = Some(mode.into());
        self
    }

    /// Resume an existing session, optionally forking it.
    #[must_use]
    pub fn resume(mut self, session_id: impl Into<String>, fork: bool) -> Self {
        self.resume = Some(session_id.into());
        self.fork_session = fork;
        self
    }

    /// Continue the most recent conversation.
    #[must_use]
    pub fn continue_conversation(mut self) -> Self {
        self.continue_conversation = true;
        self
    }

    #[must_use]
    pub fn max_turns(mut self, turns: u32) -> Self {
        self.max_turns = Some(turns);
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the working directory for the CLI process.
    #[must_use]
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn settings(mut self, path: impl Into<String>) -> Self {
        self.settings = Some(path.into());
        self
    }

    #[must_use]
    pub fn add_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.add_dirs.push(dir.into());
        self
    }

    /// Constrain the final answer to a JSON schema.
    #[must_use]
    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn agent(mut self, name: impl Into<String>, definition: AgentDefinition) -> Self {
        self.agents.insert(name.into(), definition);
        self
    }

    #[must_use]
    pub fn setting_sources(mut self, sources: &[&str]) -> Self {
        self.setting_sources = sources.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn sandbox(mut self, settings: Value) -> Self {
        self.sandbox = Some(settings);
        self
    }

    /// Load a local plugin directory.
    #[must_use]
    pub fn plugin(mut self, path: impl Into<PathBuf>) -> Self {
        self.plugins.push(path.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user = Some(user_id.into());
        self
    }

    /// Pass an arbitrary flag; the name is given without leading dashes.
    #[must_use]
    pub fn extra_arg(mut self, flag: impl Into<String>, value: Option<&str>) -> Self {
        self.extra_args
            .push((flag.into(), value.map(str::to_string)));
        self
    }

    #[must_use]
    pub fn enable_file_checkpointing(mut self, enable: bool) -> Self {
        self.enable_file_checkpointing = enable;
        self
    }

    #[must_use]
    pub fn include_partial_messages(mut self, include: bool) -> Self {
        self.include_partial_messages = include;
        self
    }

    /// Register a hook for an event.
    #[must_use]
    pub fn hook(mut self, event: HookEvent, matcher: HookMatcher) -> Self {
        self.hooks.entry(event).or_default().push(matcher);
        self
    }

    #[must_use]
    pub fn pre_tool_use(
        self,
        command: impl Into<String>,
        matcher: Option<&str>,
        timeout: Option<u32>,
    ) -> Self {
        self.hook(
            HookEvent::PreToolUse,
            HookMatcher::command(command, matcher, timeout),
        )
    }

    #[must_use]
    pub fn post_tool_use(
        self,
        command: impl Into<String>,
        matcher: Option<&str>,
        timeout: Option<u32>,
    ) -> Self {
        self.hook(
            HookEvent::PostToolUse,
            HookMatcher::command(command, matcher, timeout),
        )
    }

    #[must_use]
    pub fn max_budget_usd(mut self, amount: f64) -> Self {
        self.max_budget_usd = Some(amount);
        self
    }

    #[must_use]
    pub fn max_thinking_tokens(mut self, tokens: u32) -> Self {
        self.max_thinking_tokens = Some(tokens);
        self
    }

    #[must_use]
    pub fn fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = Some(model.into());
        self
    }

    #[must_use]
    pub fn betas(mut self, betas: &[&str]) -> Self {
        self.betas = betas.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Get the working directory, if set.
    #[must_use]
    pub fn get_working_dir(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    /// Build the protocol flags for the CLI.
    #[must_use]
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec!["--output-format".to_string(), "stream-json".to_string()];

        if let Some(model) = &self.model {
            push_pair(&mut args, "--model", model);
        }

        if let Some(mode) = &self.permission_mode {
            push_pair(&mut args, "--permission-mode", mode);
        }

        if let Some(turns) = self.max_turns.filter(|t| *t > 0) {
            push_pair(&mut args, "--max-turns", &turns.to_string());
        }

        if let Some(session_id) = &self.resume {
            push_pair(&mut args, "--resume", session_id);
        }

        if self.fork_session {
            args.push("--fork-session".to_string());
        }

        if self.continue_conversation {
            args.push("--continue".to_string());
        }

        if let Some(prompt) = &self.system_prompt {
            push_pair(&mut args, "--system-prompt", &prompt.to_arg());
        }

        if !self.allowed_tools.is_empty() {
            push_pair(&mut args, "--allowed-tools", &self.allowed_tools.join(","));
        }

        if !self.disallowed_tools.is_empty() {
            push_pair(
                &mut args,
                "--disallowed-tools",
                &self.disallowed_tools.join(","),
            );
        }

        for dir in &self.add_dirs {
            push_pair(&mut args, "--add-dir", &dir.display().to_string());
        }

        if let Some(schema) = &self.output_schema {
            push_pair(&mut args, "--output-format-json-schema", &schema.to_string());
        }

        if let Some(settings) = &self.settings {
            push_pair(&mut args, "--settings", settings);
        }

        if !self.mcp_servers.is_empty() {
            push_pair(&mut args, "--mcp-servers", &to_json(&self.mcp_servers));
        }

        for source in &self.setting_sources {
            push_pair(&mut args, "--setting-source", source);
        }

        if !self.agents.is_empty() {
            push_pair(&mut args, "--agents", &to_json(&self.agents));
        }

        if !self.hooks.is_empty() {
            let payload: BTreeMap<&str, &Vec<HookMatcher>> = self
                .hooks
                .iter()
                .map(|(event, matchers)| (event.as_str(), matchers))
                .collect();
            push_pair(&mut args, "--hooks", &to_json(&payload));
        }

        if !self.plugins.is_empty() {
            let plugins: Vec<Value> = self
                .plugins
                .iter()
                .map(|path| json!({"type": "local", "path": path.display().to_string()}))
                .collect();
            push_pair(&mut args, "--plugins", &to_json(&plugins));
        }

        if let Some(sandbox) = &self.sandbox {
            push_pair(&mut args, "--sandbox", &sandbox.to_string());
        }

        if self.enable_file_checkpointing {
            args.push("--enable-file-checkpointing".to_string());
        }

        if self.include_partial_messages {
            args.push("--include-partial-messages".to_string());
        }

        if let Some(user) = &self.user {
            push_pair(&mut args, "--user", user);
        }

        if let Some(amount) = self.max_budget_usd {
            push_pair(&mut args, "--max-budget-usd", &amount.to_string());
        }

        if let Some(tokens) = self.max_thinking_tokens {
            push_pair(&mut args, "--max-thinking-tokens", &tokens.to_string());
        }

        if let Some(model) = &self.fallback_model {
            push_pair(&mut args, "--fallback-model", model);
        }

        for beta in &self.betas {
            push_pair(&mut args, "--beta", beta);
        }

        for (flag, value) in &self.extra_args {
            args.push(format!("--{}", flag.trim_start_matches('-')));
            if let Some(value) = value {
                args.push(value.clone());
            }
        }

        args
    }

    /// Merge this query's environment over `defaults`; entries here win.
    #[must_use]
    pub fn to_env(&self, defaults: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut env = defaults.clone();
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }
}

fn push_pair(args: &mut Vec<String>, flag: &str, value: &str) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

// Maps keyed by strings always serialize; fall back to an empty object anyway.
fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
