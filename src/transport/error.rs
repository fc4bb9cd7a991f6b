//! Transport error types.

use std::path::PathBuf;
use std::time::Duration;

/// Installation hint shown when the CLI cannot be found.
pub const INSTALL_HINT: &str = "npm install -g @anthropic-ai/claude-code";

/// Errors that end a `run` or `stream` call.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The CLI binary is missing or not executable.
    #[error("Claude Code CLI not found at '{}'. Install it with: {}", .path.display(), INSTALL_HINT)]
    CliMissing { path: PathBuf },

    /// The CLI failed without producing a usable result.
    #[error("Claude CLI process failed with exit code {exit_code}{}", stderr_suffix(.stderr.as_deref()))]
    Process {
        exit_code: i32,
        stderr: Option<String>,
    },

    /// A line that should have been JSON failed to parse.
    #[error("Failed to parse JSON line: {line}")]
    ProtocolDecode {
        line: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A run was started while another is still active.
    #[error("Transport is busy with another process")]
    Busy,

    /// The process exceeded its wall-clock timeout and was killed.
    #[error("Claude CLI process timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// I/O error talking to the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// The offending line, for protocol decode errors.
    #[must_use]
    pub fn offending_line(&self) -> Option<&str> {
        match self {
            Self::ProtocolDecode { line, .. } => Some(line),
            _ => None,
        }
    }

    /// Exit code, for process failures.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Process { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

fn stderr_suffix(stderr: Option<&str>) -> String {
    stderr.map_or_else(String::new, |s| format!(": {s}"))
}
