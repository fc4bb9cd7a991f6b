//! Claude Code process spawning and control.
//!
//! [`AgentProcess`] wraps the child process for one invocation. It owns the
//! pipes and exposes the signals the transport needs: interrupt for
//! cooperative cancellation and kill for timeouts.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use super::TransportError;

/// Default grace period between an interrupt and a forced kill.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything needed to launch one CLI invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Variables added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

/// A running Claude Code process.
#[derive(Debug)]
pub struct AgentProcess {
    child: Child,
}

impl AgentProcess {
    /// Spawn the process described by `spec` with piped stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::CliMissing` if the binary does not exist or
    /// is not executable, `TransportError::Io` for other spawn failures.
    pub fn spawn(spec: &CommandSpec) -> Result<Self, TransportError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = spec.cwd {
            cmd.current_dir(dir);
        }

        tracing::debug!(
            program = %spec.program.display(),
            args = spec.args.len(),
            cwd = ?spec.cwd,
            "Spawning Claude CLI"
        );

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                TransportError::CliMissing {
                    path: spec.program.clone(),
                }
            }
            _ => TransportError::Io(e),
        })?;

        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process and reap it.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Ask the process to stop, letting it flush its output first.
    pub fn interrupt(&self) {
        if let Some(pid) = self.id() {
            send_interrupt(pid);
        }
    }

    /// Interrupt the process, then kill it if it has not exited in `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting or killing fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        if self.id().is_none() {
            return Ok(());
        }

        self.interrupt();

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(?timeout, "Process ignored interrupt, killing");
                self.child.kill().await
            }
        }
    }
}

/// Deliver SIGINT to `pid`. Failures are logged, never raised.
#[cfg(unix)]
pub fn send_interrupt(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        tracing::warn!(pid, "Process id out of range, not interrupting");
        return;
    };

    match kill(Pid::from_raw(raw), Signal::SIGINT) {
        Ok(()) => tracing::debug!(pid, "Sent SIGINT to Claude CLI"),
        Err(e) => tracing::debug!(pid, error = %e, "Failed to send SIGINT"),
    }
}

/// Interrupts are not available on this platform.
#[cfg(not(unix))]
pub fn send_interrupt(pid: u32) {
    tracing::warn!(pid, "Interrupting a process is not supported on this platform");
}
