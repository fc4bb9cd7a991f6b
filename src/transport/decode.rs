//! Line framing and classification for stream-json output.
//!
//! Each non-blank line is decoded as JSON. A line that fails to
//! decode is a protocol violation only if it looks like JSON (starts with
//! `{` or `[`); anything else is banner or warning text printed outside the
//! protocol and is dropped.

use std::path::Path;

use serde_json::Value;

use crate::protocol::{JsonObject, Message};

use super::TransportError;

/// Phrases in stderr that mean the shell could not find the binary.
const CLI_MISSING_MARKERS: &[&str] = &["command not found", "not found"];

/// Whether a line is meant to be JSON.
#[must_use]
pub fn looks_like_json(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

/// Decode one line of output.
///
/// Returns `Ok(None)` for blank lines and incidental text.
///
/// # Errors
///
/// Returns `TransportError::ProtocolDecode` if a JSON-looking line is not
/// valid JSON.
pub fn decode_line(line: &str) -> Result<Option<Message>, TransportError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(obj)) => Ok(Some(Message::from_json(obj))),
        // No `type` to dispatch on; items are kept under their indices.
        Ok(Value::Array(items)) => {
            let obj: JsonObject = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), item))
                .collect();
            Ok(Some(Message::from_json(obj)))
        }
        Ok(_) => {
            tracing::debug!(line = %line, "Skipping scalar output line");
            Ok(None)
        }
        Err(e) if looks_like_json(line) => Err(TransportError::ProtocolDecode {
            line: line.to_string(),
            source: Some(e),
        }),
        Err(_) => {
            tracing::debug!(line = %line, "Skipping non-protocol output line");
            Ok(None)
        }
    }
}

/// Decode a complete captured stdout.
///
/// # Errors
///
/// Fails on the first JSON-looking line that does not decode.
pub fn decode_output(output: &str) -> Result<Vec<Message>, TransportError> {
    let mut messages = Vec::new();
    for line in output.lines() {
        if let Some(message) = decode_line(line)? {
            messages.push(message);
        }
    }
    Ok(messages)
}

/// Whether stderr carries shell "binary not found" phrasing.
#[must_use]
pub fn is_cli_missing(stderr: &str) -> bool {
    CLI_MISSING_MARKERS
        .iter()
        .any(|marker| stderr.contains(marker))
}

/// Decide whether a finished process counts as a failure.
///
/// A missing exit code (death by signal, e.g. after an interrupt) and zero
/// are both success. A non-zero code is a missing CLI if stderr says so,
/// benign if `has_output` (a usable result already came through), and a
/// process failure otherwise.
///
/// # Errors
///
/// Returns `CliMissing` or `Process` as described above.
pub fn check_exit(
    exit_code: Option<i32>,
    stderr: &str,
    has_output: bool,
    cli_path: &Path,
) -> Result<(), TransportError> {
    let Some(code) = exit_code.filter(|c| *c != 0) else {
        return Ok(());
    };

    let stderr = stderr.trim();
    if is_cli_missing(stderr) {
        return Err(TransportError::CliMissing {
            path: cli_path.to_path_buf(),
        });
    }

    if has_output {
        tracing::debug!(exit_code = code, "Non-zero exit after a result record, ignoring");
        return Ok(());
    }

    Err(TransportError::Process {
        exit_code: code,
        stderr: (!stderr.is_empty()).then(|| stderr.to_string()),
    })
}

/// Reject output that was clearly protocol data but produced no messages.
///
/// # Errors
///
/// Returns `ProtocolDecode` with the first output line.
pub fn check_nonempty(messages: &[Message], output: &str) -> Result<(), TransportError> {
    if !messages.is_empty() {
        return Ok(());
    }
    let Some(first_line) = output.trim().lines().next() else {
        return Ok(());
    };
    if looks_like_json(first_line) {
        return Err(TransportError::ProtocolDecode {
            line: first_line.trim().to_string(),
            source: None,
        });
    }
    Ok(())
}

/// Accumulates raw stdout bytes and yields complete lines.
///
/// Bytes are buffered rather than text so a chunk boundary inside a
/// multi-byte character is harmless.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of output.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Take the next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.buf.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line[..pos]).into_owned())
    }

    /// Take whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    /// Bytes buffered but not yet returned as a line.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
