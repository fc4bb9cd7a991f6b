//! Tests for streaming CLI output.

use std::time::Duration;

use claude_agent::options::AgentOptions;
use claude_agent::protocol::{Message, MessageKind};
use claude_agent::transport::{MessageStream, TransportError, TransportState};
use futures_util::StreamExt;
use tokio_test::{assert_err, assert_ok};

use super::support::{heredoc, wait_terminated, FakeCli, ASSISTANT, INIT, RESULT};

async fn next_within(stream: &mut MessageStream) -> Option<Result<Message, TransportError>> {
    tokio::time::timeout(Duration::from_secs(10), stream.next_message())
        .await
        .expect("stream stalled")
}

#[tokio::test]
async fn stream_yields_messages_in_order() {
    let cli = FakeCli::printing(&["Starting up...", INIT, ASSISTANT, RESULT], 0);
    let transport = cli.transport();

    let stream = assert_ok!(transport.stream("p", &AgentOptions::new()));
    let kinds: Vec<MessageKind> = stream.map(|item| item.unwrap().kind()).collect().await;
    assert_eq!(
        kinds,
        vec![MessageKind::System, MessageKind::Assistant, MessageKind::Result]
    );
    assert_eq!(transport.state(), TransportState::Terminated);
}

#[tokio::test]
async fn stream_matches_batch_run() {
    let cli = FakeCli::printing(&[INIT, "note: not json", ASSISTANT, "", RESULT], 0);
    let transport = cli.transport();

    let batch = assert_ok!(transport.run("p", &AgentOptions::new()).await);
    let streamed = assert_ok!(transport.stream("p", &AgentOptions::new()));
    let streamed = assert_ok!(streamed.collect_messages().await);
    assert_eq!(streamed, batch);
}

#[tokio::test]
async fn stream_flushes_final_line_without_newline() {
    let cli = FakeCli::new(&format!("printf '%s' '{RESULT}'"));
    let stream = assert_ok!(cli.transport().stream("p", &AgentOptions::new()));

    let messages = assert_ok!(stream.collect_messages().await);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_result());
}

#[tokio::test]
async fn stream_reassembles_lines_split_across_writes() {
    let cli = FakeCli::new(
        r#"printf '{"type":"system",'
sleep 0.2
printf '"subtype":"init","session_id":"split"}\n{"type":"res'
sleep 0.2
printf 'ult","subtype":"success"}\n'"#,
    );
    let stream = assert_ok!(cli.transport().stream("p", &AgentOptions::new()));

    let messages = assert_ok!(stream.collect_messages().await);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].session_id(), Some("split"));
    assert!(messages[1].is_result());
}

#[tokio::test]
async fn stream_delivers_before_process_exits() {
    let cli = FakeCli::new(&format!("{}\nsleep 1\n{}", heredoc(&[INIT]), heredoc(&[RESULT])));
    let mut stream = assert_ok!(cli.transport().stream("p", &AgentOptions::new()));

    let started = std::time::Instant::now();
    let first = next_within(&mut stream).await.unwrap().unwrap();
    assert_eq!(first.kind(), MessageKind::System);
    assert!(started.elapsed() < Duration::from_millis(900));

    let last = next_within(&mut stream).await.unwrap().unwrap();
    assert!(last.is_result());
    assert!(next_within(&mut stream).await.is_none());
}

#[tokio::test]
async fn stream_ends_with_decode_error() {
    let cli = FakeCli::printing(&[INIT, "{broken", RESULT], 0);
    let mut stream = assert_ok!(cli.transport().stream("p", &AgentOptions::new()));

    let first = next_within(&mut stream).await.unwrap();
    assert!(first.is_ok());
    let err = assert_err!(next_within(&mut stream).await.unwrap());
    assert_eq!(err.offending_line(), Some("{broken"));
    assert!(next_within(&mut stream).await.is_none());
}

#[tokio::test]
async fn stream_ignores_nonzero_exit_after_messages() {
    let cli = FakeCli::new(&format!("{}\necho 'crashed' >&2\nexit 2", heredoc(&[INIT])));
    let stream = assert_ok!(cli.transport().stream("p", &AgentOptions::new()));

    let messages = assert_ok!(stream.collect_messages().await);
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn stream_reports_failure_without_messages() {
    let cli = FakeCli::new("echo 'Starting up...'\necho 'crashed' >&2\nexit 2");
    let stream = assert_ok!(cli.transport().stream("p", &AgentOptions::new()));

    let err = assert_err!(stream.collect_messages().await);
    assert_eq!(err.exit_code(), Some(2));
}

#[tokio::test]
async fn stream_reports_cli_missing_from_stderr() {
    let cli = FakeCli::new("echo 'sh: 1: claude: not found' >&2\nexit 127");
    let stream = assert_ok!(cli.transport().stream("p", &AgentOptions::new()));

    let err = assert_err!(stream.collect_messages().await);
    assert!(matches!(err, TransportError::CliMissing { .. }), "{err:?}");
}

#[tokio::test]
async fn stream_missing_binary_fails_immediately() {
    let transport = claude_agent::transport::ProcessTransport::new("/nonexistent/bin/claude");
    let err = assert_err!(transport.stream("p", &AgentOptions::new()));
    assert!(matches!(err, TransportError::CliMissing { .. }));
    assert_eq!(transport.state(), TransportState::Terminated);
}

#[tokio::test]
async fn stream_ends_once_cli_exits_despite_background_child() {
    let cli = FakeCli::new(&format!("sleep 5 >/dev/null &\n{}\nexit 0", heredoc(&[RESULT])));
    let transport = cli.transport().with_timeout(Duration::from_secs(1));
    let stream = assert_ok!(transport.stream("p", &AgentOptions::new()));

    let started = std::time::Instant::now();
    let messages = assert_ok!(stream.collect_messages().await);
    assert_eq!(messages.len(), 1);
    assert!(started.elapsed() < Duration::from_millis(1500));
    wait_terminated(&transport, Duration::from_secs(2)).await;
}

#[tokio::test]
async fn stop_interrupts_running_stream() {
    let cli = FakeCli::new(&format!("{}\nexec sleep 30", heredoc(&[INIT])));
    let transport = cli.transport();
    let mut stream = assert_ok!(transport.stream("p", &AgentOptions::new()));

    let first = next_within(&mut stream).await.unwrap().unwrap();
    assert_eq!(first.kind(), MessageKind::System);

    transport.stop();
    transport.stop();
    assert!(next_within(&mut stream).await.is_none());
    assert_eq!(transport.state(), TransportState::Terminated);

    // Stopping an idle transport is a no-op.
    transport.stop();
}

#[tokio::test]
async fn stream_times_out() {
    let cli = FakeCli::new(&format!("{}\nexec sleep 30", heredoc(&[INIT])));
    let transport = cli.transport().with_timeout(Duration::from_millis(300));
    let mut stream = assert_ok!(transport.stream("p", &AgentOptions::new()));

    assert!(next_within(&mut stream).await.unwrap().is_ok());
    let err = assert_err!(next_within(&mut stream).await.unwrap());
    assert!(matches!(err, TransportError::Timeout { .. }), "{err:?}");
    assert!(next_within(&mut stream).await.is_none());
}

#[tokio::test]
async fn dropping_stream_terminates_process() {
    let cli = FakeCli::new(&format!(
        "while :; do\n{}\nsleep 0.05\ndone",
        heredoc(&[INIT])
    ));
    let transport = cli.transport();
    let mut stream = assert_ok!(transport.stream("p", &AgentOptions::new()));

    assert!(next_within(&mut stream).await.unwrap().is_ok());
    drop(stream);

    wait_terminated(&transport, Duration::from_secs(15)).await;
}
