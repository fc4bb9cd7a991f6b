//! Subprocess transport for the Claude Code CLI.
//!
//! A [`ProcessTransport`] runs at most one CLI process at a time, either to
//! completion ([`ProcessTransport::run`]) or as a live [`MessageStream`]
//! ([`ProcessTransport::stream`]). [`ProcessTransport::stop`] interrupts the
//! active process from any thread.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::ChildStderr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::AgentConfig;
use crate::options::AgentOptions;
use crate::protocol::Message;

use super::{
    check_exit, check_nonempty, decode_line, decode_output, find_cli, send_interrupt,
    AgentProcess, CommandSpec, LineBuffer, MessageStream, StreamItem, TransportError,
    DEFAULT_CHANNEL_BUFFER, DEFAULT_TERMINATE_TIMEOUT,
};

/// Flags always placed after the composed options, before the prompt.
pub const TRAILING_FLAGS: [&str; 2] = ["--verbose", "--print"];

/// Size of each stdout read in streaming mode.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// How long stderr may stay open once stdout is drained and the CLI exited.
/// Background children can inherit the pipe and hold it open.
const STDERR_GRACE: Duration = Duration::from_millis(200);

/// Lifecycle of the transport's current (or last) invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportState {
    /// Nothing has run yet.
    #[default]
    Idle,
    /// Spawning the process.
    Starting,
    /// Process running, output being read.
    Running,
    /// Output finished or shutting down; the process is being reaped and
    /// can no longer be interrupted.
    Draining,
    /// Last invocation finished; a new one may start.
    Terminated,
}

impl TransportState {
    /// Whether an invocation is in flight.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Draining)
    }
}

#[derive(Debug, Default)]
struct Slot {
    state: TransportState,
    pid: Option<u32>,
}

/// Runs the Claude Code CLI and decodes its stream-json output.
#[derive(Debug)]
pub struct ProcessTransport {
    cli_path: PathBuf,
    default_env: BTreeMap<String, String>,
    timeout: Option<Duration>,
    slot: Arc<Mutex<Slot>>,
}

impl ProcessTransport {
    /// Create a transport for the CLI at `cli_path` with no defaults.
    #[must_use]
    pub fn new(cli_path: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: cli_path.into(),
            default_env: BTreeMap::new(),
            timeout: None,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Create a transport from configuration, locating the CLI if the
    /// configuration does not name one.
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::from_config_with(config, find_cli)
    }

    /// Like [`ProcessTransport::from_config`] with a custom CLI locator.
    #[must_use]
    pub fn from_config_with(config: &AgentConfig, locate: impl FnOnce() -> PathBuf) -> Self {
        let cli_path = config.cli_path.clone().unwrap_or_else(locate);
        let mut transport = Self::new(cli_path);
        transport.default_env = config.provider_env();
        transport.timeout = config.timeout();
        transport
    }

    /// Set the wall-clock timeout for each invocation.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a base environment variable; per-query options override it.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn cli_path(&self) -> &Path {
        &self.cli_path
    }

    #[must_use]
    pub fn default_env(&self) -> &BTreeMap<String, String> {
        &self.default_env
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TransportState {
        lock(&self.slot).state
    }

    /// Compose the command line and environment for one query.
    #[must_use]
    pub fn build_command(&self, prompt: &str, options: &AgentOptions) -> CommandSpec {
        let mut args = options.to_cli_args();
        args.extend(TRAILING_FLAGS.iter().map(|f| (*f).to_string()));
        args.push(prompt.to_string());

        CommandSpec {
            program: self.cli_path.clone(),
            args,
            env: options.to_env(&self.default_env),
            cwd: options.cwd.clone(),
        }
    }

    /// Run a query to completion and return every decoded message.
    ///
    /// # Errors
    ///
    /// - `Busy` if another invocation is active.
    /// - `CliMissing` if the binary is absent or stderr says it was not found.
    /// - `ProtocolDecode` if a JSON-looking line fails to parse, or output
    ///   that looks like JSON yields no messages at all.
    /// - `Process` on a non-zero exit with no result record.
    /// - `Timeout` if the configured timeout elapses.
    pub async fn run(
        &self,
        prompt: &str,
        options: &AgentOptions,
    ) -> Result<Vec<Message>, TransportError> {
        let active = ActiveRun::begin(&self.slot)?;
        let deadline = self.deadline();
        let spec = self.build_command(prompt, options);
        let mut process = AgentProcess::spawn(&spec)?;
        active.running(process.id());

        let stderr = StderrCapture::spawn(process.take_stderr());
        let stdout = process.take_stdout();
        let read = within(deadline, read_all(stdout)).await;
        let Some(stdout) = read else {
            return Err(self.time_out(&active, &mut process).await);
        };
        let stdout = stdout?;

        active.draining();
        let waited = within(deadline, process.wait()).await;
        let Some(status) = waited else {
            return Err(self.time_out(&active, &mut process).await);
        };
        let status = status?;
        let stderr = stderr.finish(deadline).await;
        let stdout = String::from_utf8_lossy(&stdout);

        let messages = decode_output(&stdout)?;
        let has_result = messages.iter().any(Message::is_result);
        check_exit(status.code(), &stderr, has_result, &self.cli_path)?;
        check_nonempty(&messages, &stdout)?;

        tracing::debug!(
            messages = messages.len(),
            exit_code = ?status.code(),
            "Claude CLI run finished"
        );
        Ok(messages)
    }

    /// Run a query and stream messages as the CLI prints them.
    ///
    /// Spawn failures are returned directly; later failures arrive as the
    /// final item of the stream. Once at least one message has been
    /// delivered, a non-zero exit is not reported.
    ///
    /// # Errors
    ///
    /// Returns `Busy` if another invocation is active, or `CliMissing`/`Io`
    /// if the process cannot be spawned.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn stream(
        &self,
        prompt: &str,
        options: &AgentOptions,
    ) -> Result<MessageStream, TransportError> {
        let active = ActiveRun::begin(&self.slot)?;
        let spec = self.build_command(prompt, options);
        let process = AgentProcess::spawn(&spec)?;
        active.running(process.id());

        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);
        let reader = StreamReader {
            process,
            active,
            tx,
            cli_path: self.cli_path.clone(),
            deadline: self.deadline(),
            timeout: self.timeout,
            emitted: 0,
        };
        tokio::spawn(reader.run());

        Ok(MessageStream::new(rx))
    }

    /// Interrupt the running process, if any. Never fails.
    pub fn stop(&self) {
        let slot = lock(&self.slot);
        match (slot.state, slot.pid) {
            (TransportState::Running, Some(pid)) => send_interrupt(pid),
            (state, _) => tracing::debug!(?state, "No running process to stop"),
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|t| Instant::now() + t)
    }

    async fn time_out(&self, active: &ActiveRun, process: &mut AgentProcess) -> TransportError {
        let timeout = self.timeout.unwrap_or_default();
        tracing::warn!(?timeout, "Claude CLI timed out, killing process");
        active.draining();
        if let Err(e) = process.kill().await {
            tracing::warn!(error = %e, "Failed to kill timed out process");
        }
        TransportError::Timeout { timeout }
    }
}

/// Marks the transport busy for the lifetime of one invocation.
#[derive(Debug)]
struct ActiveRun {
    slot: Arc<Mutex<Slot>>,
}

impl ActiveRun {
    fn begin(slot: &Arc<Mutex<Slot>>) -> Result<Self, TransportError> {
        let mut guard = lock(slot);
        if guard.state.is_active() {
            return Err(TransportError::Busy);
        }
        transition(&mut guard, TransportState::Starting);
        Ok(Self {
            slot: Arc::clone(slot),
        })
    }

    fn running(&self, pid: Option<u32>) {
        let mut guard = lock(&self.slot);
        guard.pid = pid;
        transition(&mut guard, TransportState::Running);
    }

    /// Forget the pid before the process is reaped, so `stop` cannot signal
    /// a recycled one.
    fn draining(&self) {
        let mut guard = lock(&self.slot);
        guard.pid = None;
        transition(&mut guard, TransportState::Draining);
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        let mut guard = lock(&self.slot);
        guard.pid = None;
        transition(&mut guard, TransportState::Terminated);
    }
}

/// Background task feeding a [`MessageStream`].
///
/// Fields drop in declaration order, so the run is marked terminated
/// before the channel closes.
struct StreamReader {
    process: AgentProcess,
    active: ActiveRun,
    tx: mpsc::Sender<StreamItem>,
    cli_path: PathBuf,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    emitted: usize,
}

/// Whether the read loop should keep going.
enum Flow {
    Continue,
    Stop,
}

impl StreamReader {
    async fn run(mut self) {
        let stderr = StderrCapture::spawn(self.process.take_stderr());

        let Some(mut stdout) = self.process.take_stdout() else {
            self.fail(TransportError::Io(std::io::Error::other(
                "process stdout not available",
            )))
            .await;
            return;
        };

        let mut buffer = LineBuffer::new();
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];

        loop {
            let read = match within(self.deadline, stdout.read(&mut chunk)).await {
                Some(read) => read,
                None => return self.time_out().await,
            };
            let n = match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => return self.fail(TransportError::Io(e)).await,
            };

            buffer.push(&chunk[..n]);
            while let Some(line) = buffer.next_line() {
                if let Flow::Stop = self.deliver(&line).await {
                    return;
                }
            }
        }

        if let Some(rest) = buffer.finish() {
            if let Flow::Stop = self.deliver(&rest).await {
                return;
            }
        }

        self.active.draining();
        let waited = within(self.deadline, self.process.wait()).await;
        let status = match waited {
            Some(Ok(status)) => status,
            Some(Err(e)) => return self.fail(TransportError::Io(e)).await,
            None => return self.time_out().await,
        };

        let stderr = stderr.finish(self.deadline).await;

        tracing::debug!(
            emitted = self.emitted,
            exit_code = ?status.code(),
            "Claude CLI stream finished"
        );

        if let Err(e) = check_exit(status.code(), &stderr, self.emitted > 0, &self.cli_path) {
            let _ = self.tx.send(Err(e)).await;
        }
    }

    async fn deliver(&mut self, line: &str) -> Flow {
        match decode_line(line) {
            Ok(None) => Flow::Continue,
            Ok(Some(message)) => {
                if self.tx.send(Ok(message)).await.is_err() {
                    tracing::debug!("Stream consumer dropped, interrupting process");
                    self.active.draining();
                    if let Err(e) = self
                        .process
                        .graceful_terminate(DEFAULT_TERMINATE_TIMEOUT)
                        .await
                    {
                        tracing::warn!(error = %e, "Failed to terminate process");
                    }
                    return Flow::Stop;
                }
                self.emitted += 1;
                Flow::Continue
            }
            Err(e) => {
                self.fail(e).await;
                Flow::Stop
            }
        }
    }

    /// Report a terminal error and make sure the process is gone.
    async fn fail(&mut self, error: TransportError) {
        tracing::debug!(error = %error, "Claude CLI stream failed");
        self.active.draining();
        let _ = self.tx.send(Err(error)).await;
        if let Err(e) = self.process.kill().await {
            tracing::debug!(error = %e, "Failed to kill process");
        }
    }

    async fn time_out(&mut self) {
        let timeout = self.timeout.unwrap_or_default();
        tracing::warn!(?timeout, "Claude CLI timed out, killing process");
        self.fail(TransportError::Timeout { timeout }).await;
    }
}

/// Collects stderr in the background so a pipe held open by a leftover
/// child never delays exit reconciliation.
struct StderrCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl StderrCapture {
    fn spawn(stderr: Option<ChildStderr>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let Some(mut stderr) = stderr else {
                return;
            };
            let mut chunk = vec![0u8; READ_CHUNK_SIZE];
            loop {
                match stderr.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        tracing::debug!(error = %e, "Failed to read stderr");
                        break;
                    }
                }
            }
        });
        Self { buf, task }
    }

    /// Wait up to [`STDERR_GRACE`] (never past `deadline`) for stderr to
    /// close, then return whatever was captured.
    async fn finish(mut self, deadline: Option<Instant>) -> String {
        let grace = Instant::now() + STDERR_GRACE;
        let until = deadline.map_or(grace, |d| d.min(grace));
        if tokio::time::timeout_at(until, &mut self.task).await.is_err() {
            tracing::debug!("stderr still open after exit, using partial capture");
        }
        let bytes = std::mem::take(&mut *self.buf.lock().unwrap_or_else(PoisonError::into_inner));
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Drop for StderrCapture {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn transition(slot: &mut Slot, to: TransportState) {
    tracing::debug!(from = ?slot.state, to = ?to, "Transport state transition");
    slot.state = to;
}

/// Await `fut`, giving up at `deadline` if one is set.
async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
