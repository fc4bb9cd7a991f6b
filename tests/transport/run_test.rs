//! Tests for running the CLI to completion.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use claude_agent::options::AgentOptions;
use claude_agent::protocol::{Message, MessageKind};
use claude_agent::transport::{ProcessTransport, TransportError, TransportState};
use tokio_test::{assert_err, assert_ok};

use super::support::{heredoc, lines_of, wait_terminated, FakeCli, ASSISTANT, INIT, RESULT};

#[tokio::test]
async fn run_returns_messages_in_output_order() {
    let cli = FakeCli::printing(&["Starting up...", INIT, "", ASSISTANT, RESULT], 0);
    let transport = cli.transport();

    let messages = assert_ok!(transport.run("hello", &AgentOptions::new()).await);
    let kinds: Vec<MessageKind> = messages.iter().map(Message::kind).collect();
    assert_eq!(
        kinds,
        vec![MessageKind::System, MessageKind::Assistant, MessageKind::Result]
    );
    assert_eq!(transport.state(), TransportState::Terminated);
}

#[tokio::test]
async fn run_discards_banner_lines() {
    let cli = FakeCli::printing(
        &["Starting up...", r#"{"type":"system","subtype":"init","session_id":"s1"}"#],
        0,
    );

    let messages = assert_ok!(cli.transport().run("p", &AgentOptions::new()).await);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].session_id(), Some("s1"));
}

#[tokio::test]
async fn run_fails_on_malformed_json_line() {
    let cli = FakeCli::printing(&[INIT, "{not valid json", RESULT], 0);

    let err = assert_err!(cli.transport().run("p", &AgentOptions::new()).await);
    match err {
        TransportError::ProtocolDecode { line, source } => {
            assert_eq!(line, "{not valid json");
            assert!(source.is_some());
        }
        other => panic!("Expected ProtocolDecode, got {other:?}"),
    }
}

#[tokio::test]
async fn run_reports_cli_missing_from_stderr() {
    let cli = FakeCli::new("echo 'bash: claude: command not found' >&2\nexit 1");
    let err = assert_err!(cli.transport().run("p", &AgentOptions::new()).await);
    assert!(matches!(err, TransportError::CliMissing { .. }), "{err:?}");
}

#[tokio::test]
async fn run_reports_missing_binary() {
    let transport = ProcessTransport::new("/nonexistent/bin/claude");
    let err = assert_err!(transport.run("p", &AgentOptions::new()).await);
    match err {
        TransportError::CliMissing { path } => {
            assert_eq!(path, PathBuf::from("/nonexistent/bin/claude"));
        }
        other => panic!("Expected CliMissing, got {other:?}"),
    }
    assert_eq!(transport.state(), TransportState::Terminated);
}

#[tokio::test]
async fn run_nonzero_exit_with_result_is_benign() {
    let cli = FakeCli::new(&format!("{}\necho 'warning: flaky' >&2\nexit 1", heredoc(&[RESULT])));

    let messages = assert_ok!(cli.transport().run("p", &AgentOptions::new()).await);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_result());
}

#[tokio::test]
async fn run_nonzero_exit_without_result_fails() {
    let cli = FakeCli::new(&format!("{}\necho 'boom' >&2\nexit 3", heredoc(&[INIT])));

    let err = assert_err!(cli.transport().run("p", &AgentOptions::new()).await);
    match err {
        TransportError::Process { exit_code, stderr } => {
            assert_eq!(exit_code, 3);
            assert_eq!(stderr.as_deref(), Some("boom"));
        }
        other => panic!("Expected Process, got {other:?}"),
    }
}

#[tokio::test]
async fn run_empty_output_is_empty_success() {
    let cli = FakeCli::new("exit 0");
    let messages = assert_ok!(cli.transport().run("p", &AgentOptions::new()).await);
    assert!(messages.is_empty());
}

#[tokio::test]
async fn run_passes_arguments_environment_and_cwd() {
    let cli = FakeCli::new(
        r#"printf '%s\n' "$@" > "$ARGS_FILE"
pwd > "$CWD_FILE"
echo "{\"type\":\"result\",\"subtype\":\"success\",\"result\":\"$MARKER\"}""#,
    );
    let work = tempfile::TempDir::new().unwrap();
    let work_dir = work.path().canonicalize().unwrap();
    let args_file = cli.file("args.txt");
    let cwd_file = cli.file("cwd.txt");

    let transport = cli
        .transport()
        .with_env("MARKER", "from-default")
        .with_env("ARGS_FILE", args_file.to_string_lossy());
    let options = AgentOptions::new()
        .model("claude-sonnet-4-5")
        .max_turns(3)
        .cwd(&work_dir)
        .env("MARKER", "from-options")
        .env("CWD_FILE", cwd_file.to_string_lossy());

    let messages = assert_ok!(transport.run("Fix the bug", &options).await);
    let Message::Result(result) = &messages[0] else {
        panic!("Expected Result");
    };
    assert_eq!(result.result_text.as_deref(), Some("from-options"));

    let args = lines_of(&args_file);
    assert_eq!(&args[..2], &["--output-format", "stream-json"]);
    assert!(args.windows(2).any(|w| w == ["--model", "claude-sonnet-4-5"]));
    assert!(args.windows(2).any(|w| w == ["--max-turns", "3"]));
    assert_eq!(&args[args.len() - 3..], &["--verbose", "--print", "Fix the bug"]);

    assert_eq!(lines_of(&cwd_file), vec![work_dir.to_string_lossy().to_string()]);
}

#[tokio::test]
async fn run_times_out_and_kills_process() {
    let cli = FakeCli::new(&format!("{}\nexec sleep 30", heredoc(&[INIT])));
    let transport = cli.transport().with_timeout(Duration::from_millis(300));

    let started = Instant::now();
    let err = assert_err!(transport.run("p", &AgentOptions::new()).await);
    assert!(matches!(err, TransportError::Timeout { .. }), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(transport.state(), TransportState::Terminated);
}

#[tokio::test]
async fn run_returns_once_cli_exits_despite_background_child() {
    // The background sleep inherits stderr and keeps the pipe open.
    let cli = FakeCli::new(&format!("sleep 5 >/dev/null &\n{}\nexit 0", heredoc(&[RESULT])));
    let transport = cli.transport().with_timeout(Duration::from_secs(3));

    let started = Instant::now();
    let messages = assert_ok!(transport.run("p", &AgentOptions::new()).await);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_result());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(transport.state(), TransportState::Terminated);
}

#[tokio::test]
async fn run_keeps_stderr_written_before_background_child() {
    let cli = FakeCli::new("echo 'crashed' >&2\nsleep 5 >/dev/null &\nexit 2");
    let transport = cli.transport();

    let started = Instant::now();
    let err = assert_err!(transport.run("p", &AgentOptions::new()).await);
    match err {
        TransportError::Process { exit_code, stderr } => {
            assert_eq!(exit_code, 2);
            assert_eq!(stderr.as_deref(), Some("crashed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn run_while_streaming_is_busy() {
    // Only the "first" prompt keeps running.
    let cli = FakeCli::new(&format!(
        "for last; do :; done\n{}\n[ \"$last\" = first ] && exec sleep 30\nexit 0",
        heredoc(&[INIT])
    ));
    let transport = Arc::new(cli.transport());

    let mut stream = assert_ok!(transport.stream("first", &AgentOptions::new()));
    let first = stream.next_message().await.unwrap().unwrap();
    assert!(matches!(first, Message::System(_)));
    assert_eq!(transport.state(), TransportState::Running);

    let err = assert_err!(transport.run("second", &AgentOptions::new()).await);
    assert!(matches!(err, TransportError::Busy));

    transport.stop();
    assert!(stream.next_message().await.is_none());
    wait_terminated(&transport, Duration::from_secs(10)).await;

    let messages = assert_ok!(transport.run("third", &AgentOptions::new()).await);
    assert!(matches!(messages[0], Message::System(_)));
}
