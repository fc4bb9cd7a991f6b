//! ClaudeAgent tests against a fake CLI.

#[cfg(unix)]
mod query_test;

use claude_agent::config::AgentConfig;
use claude_agent::transport::ProcessTransport;
use claude_agent::{ClaudeAgent, QueryResult};

#[test]
fn agent_options_follow_config() {
    let config = AgentConfig {
        model: Some("claude-haiku".to_string()),
        permission_mode: "plan".to_string(),
        ..AgentConfig::default()
    };
    let agent = ClaudeAgent::with_transport(config, ProcessTransport::new("claude"));

    let args = agent.options().to_cli_args();
    assert!(args.windows(2).any(|w| w == ["--model", "claude-haiku"]));
    assert!(args.windows(2).any(|w| w == ["--permission-mode", "plan"]));
}

#[test]
fn empty_query_result_is_error() {
    let result = QueryResult::from(Vec::new());
    assert!(result.is_error());
    assert!(!result.is_success());
}
