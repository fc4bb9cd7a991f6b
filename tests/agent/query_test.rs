//! End-to-end queries through ClaudeAgent.

use std::path::PathBuf;
use std::time::Duration;

use claude_agent::config::{AgentConfig, ProvidersConfig};
use claude_agent::options::AgentOptions;
use claude_agent::protocol::MessageKind;
use claude_agent::transport::TransportError;
use claude_agent::ClaudeAgent;
use tokio_test::assert_ok;

use crate::transport::support::{heredoc, lines_of, FakeCli, ASSISTANT, INIT, RESULT};

/// Script that records its arguments and `CLAUDE_CODE_USE_VERTEX`, then
/// prints a short conversation.
fn recording_cli() -> FakeCli {
    FakeCli::new(&format!(
        "dir=$(dirname \"$0\")\nprintf '%s\\n' \"$@\" > \"$dir/args.txt\"\necho \"$CLAUDE_CODE_USE_VERTEX\" > \"$dir/env.txt\"\n{}",
        heredoc(&[INIT, ASSISTANT, RESULT])
    ))
}

fn agent_for(cli: &FakeCli) -> ClaudeAgent {
    ClaudeAgent::new(AgentConfig {
        cli_path: Some(cli.path.clone()),
        model: Some("claude-sonnet-4-5".to_string()),
        allowed_tools: vec!["Read".to_string(), "Grep".to_string()],
        providers: ProvidersConfig {
            vertex: true,
            ..ProvidersConfig::default()
        },
        ..AgentConfig::default()
    })
}

#[tokio::test]
async fn query_returns_summary() {
    let cli = recording_cli();
    let agent = agent_for(&cli);

    let result = assert_ok!(agent.query("Summarize", None).await);
    assert_eq!(result.text(), Some("Done"));
    assert!(result.is_success());
    assert_eq!(result.session_id.as_deref(), Some("s1"));
    assert_eq!(result.cost_usd(), Some(0.02));
    assert_eq!(result.turns(), 1);
    assert_eq!(result.full_text(), "Working on it");

    let args = lines_of(&cli.file("args.txt"));
    assert!(args.windows(2).any(|w| w == ["--model", "claude-sonnet-4-5"]));
    assert!(args.windows(2).any(|w| w == ["--allowed-tools", "Read,Grep"]));
    assert_eq!(args.last().map(String::as_str), Some("Summarize"));
    assert_eq!(lines_of(&cli.file("env.txt")), vec!["1"]);
}

#[tokio::test]
async fn explicit_options_override_config() {
    let cli = recording_cli();
    let agent = agent_for(&cli).with_options(AgentOptions::new().model("claude-opus"));

    assert_ok!(agent.query("p", None).await);
    let args = lines_of(&cli.file("args.txt"));
    assert!(args.windows(2).any(|w| w == ["--model", "claude-opus"]));
    assert!(!args.contains(&"claude-sonnet-4-5".to_string()));
}

#[tokio::test]
async fn stream_collect_invokes_callback_per_message() {
    let cli = recording_cli();
    let agent = agent_for(&cli);

    let mut seen = Vec::new();
    let result = assert_ok!(
        agent
            .stream_collect("p", |message| seen.push(message.kind()), None)
            .await
    );

    assert_eq!(
        seen,
        vec![MessageKind::System, MessageKind::Assistant, MessageKind::Result]
    );
    assert_eq!(result.messages.len(), 3);
    assert_eq!(result.text(), Some("Done"));
}

#[tokio::test]
async fn stream_collect_propagates_errors() {
    let cli = FakeCli::printing(&[INIT, "{oops"], 0);
    let agent = agent_for(&cli);

    let mut seen = 0;
    let err = agent
        .stream_collect("p", |_| seen += 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ProtocolDecode { .. }));
    assert_eq!(seen, 1);
}

#[tokio::test]
async fn stop_from_clone_interrupts_query() {
    let cli = FakeCli::new(&format!("{}\nexec sleep 30", heredoc(&[INIT])));
    let agent = agent_for(&cli);
    let stopper = agent.clone();

    let query = tokio::spawn(async move { agent.query("p", None).await });
    tokio::time::sleep(Duration::from_millis(300)).await;
    stopper.stop();

    let result = tokio::time::timeout(Duration::from_secs(10), query)
        .await
        .expect("query did not stop")
        .unwrap();
    let result = assert_ok!(result);
    assert_eq!(result.messages.len(), 1);
    assert!(result.is_error());
}

#[tokio::test]
async fn missing_cli_is_reported() {
    let agent = ClaudeAgent::new(AgentConfig {
        cli_path: Some(PathBuf::from("/nonexistent/bin/claude")),
        ..AgentConfig::default()
    });
    let err = agent.query("p", None).await.unwrap_err();
    assert!(err.to_string().contains("/nonexistent/bin/claude"));
}
