//! Colored terminal rendering of decoded messages.
//!
//! Used by the binary's `stream` command to show a run as it happens.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;
use serde_json::Value;

use crate::protocol::{ContentBlock, Message, UserContent};
use crate::transport::TransportError;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 80;

/// Truncate to at most `max_len` characters, adding an ellipsis if cut.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// Format tool input for display, truncating long values.
#[must_use]
pub fn format_tool_input(input: &Value, raw_mode: bool) -> String {
    match input {
        Value::Object(map) => {
            let pairs: Vec<String> = map
                .iter()
                .map(|(k, v)| {
                    let value_str = match v {
                        Value::String(s) => truncate(s, 50, raw_mode),
                        other => truncate(&other.to_string(), 50, raw_mode),
                    };
                    format!("{k}={value_str}")
                })
                .collect();
            pairs.join(", ")
        }
        other => truncate(&other.to_string(), DEFAULT_MAX_LEN, raw_mode),
    }
}

/// Readable text of a tool result payload.
///
/// Strings pass through, lists of text blocks are joined, anything else
/// is shown as JSON.
#[must_use]
pub fn tool_result_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item.get("text").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => item.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}

/// Print one message as it arrives.
pub fn print_message(message: &Message, raw_mode: bool) {
    match message {
        Message::System(system) if system.is_init() => {
            let model = system
                .raw
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            print_session_start(model, system.session_id.as_deref().unwrap_or("-"), raw_mode);
        }
        Message::System(system) => {
            print_event("SYSTEM", &system.subtype);
        }
        Message::Assistant(assistant) => {
            for block in &assistant.content {
                print_block(block, raw_mode);
            }
        }
        Message::User(user) => {
            if let UserContent::Blocks(blocks) = &user.content {
                for block in blocks {
                    print_block(block, raw_mode);
                }
            }
        }
        Message::Result(result) => print_session_end(
            result.total_cost_usd,
            result.is_error,
            result.session_id.as_deref(),
            result.result_text.as_deref(),
            raw_mode,
        ),
        Message::Generic(generic) => {
            if raw_mode {
                print_event(&generic.kind, &Value::Object(generic.raw.clone()).to_string());
            } else {
                tracing::debug!(kind = %generic.kind, "Skipping unmodelled message");
            }
        }
    }
}

fn print_block(block: &ContentBlock, raw_mode: bool) {
    match block {
        ContentBlock::Text { text } => println!("{text}"),
        ContentBlock::Thinking { thinking, .. } => println!("{}", thinking.dimmed()),
        ContentBlock::ToolUse { name, input, .. } => print_tool_request(name, input, raw_mode),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => print_tool_result(
            tool_use_id,
            &tool_result_text(content.as_ref()),
            *is_error,
            raw_mode,
        ),
    }
    let _ = io::stdout().flush();
}

/// Print session start information.
pub fn print_session_start(model: &str, session_id: &str, raw_mode: bool) {
    println!(
        "{} {} model={}, session={}",
        timestamp().dimmed(),
        "[SESSION]".blue().bold(),
        model.cyan(),
        truncate(session_id, 20, raw_mode).dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print session end information.
pub fn print_session_end(
    cost_usd: Option<f64>,
    is_error: bool,
    session_id: Option<&str>,
    result_msg: Option<&str>,
    raw_mode: bool,
) {
    let ts = timestamp();
    let session = session_id
        .map_or(String::new(), |id| {
            format!("session_id={}", truncate(id, 20, raw_mode))
        });

    if is_error {
        println!(
            "{} {} Session ended with error {}",
            ts.dimmed(),
            "[SESSION]".red().bold(),
            session.dimmed()
        );
        if let Some(msg) = result_msg.filter(|m| !m.is_empty()) {
            println!(
                "{} {} {}",
                ts.dimmed(),
                "[ERROR]".red().bold(),
                truncate(msg, 200, raw_mode).red()
            );
        }
    } else if let Some(cost) = cost_usd {
        println!(
            "{} {} Session completed (cost: ${:.4}) {}",
            ts.dimmed(),
            "[SESSION]".blue().bold(),
            cost,
            session.dimmed()
        );
    } else {
        println!(
            "{} {} Session completed {}",
            ts.dimmed(),
            "[SESSION]".blue().bold(),
            session.dimmed()
        );
    }
    let _ = io::stdout().flush();
}

/// Print a tool request.
pub fn print_tool_request(name: &str, input: &Value, raw_mode: bool) {
    println!(
        "{} {} ({})",
        "[TOOL]".cyan().bold(),
        name.bold(),
        format_tool_input(input, raw_mode).dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print tool result output.
pub fn print_tool_result(tool_use_id: &str, content: &str, is_error: bool, raw_mode: bool) {
    let id_short = truncate(tool_use_id, 12, raw_mode);
    let content_short = truncate(content, 150, raw_mode);
    if is_error {
        println!(
            "{} {} {}",
            "[RESULT]".red().bold(),
            id_short.dimmed(),
            content_short
        );
    } else {
        println!(
            "{} {} {}",
            "[RESULT]".green().bold(),
            id_short.dimmed(),
            content_short
        );
    }
    let _ = io::stdout().flush();
}

/// Print a transport failure.
pub fn print_transport_error(error: &TransportError) {
    eprintln!("{} {}", "[ERROR]".red().bold(), error);
    if let Some(line) = error.offending_line() {
        eprintln!("{} {}", "[LINE]".yellow().bold(), truncate(line, 200, false));
    }
}

/// Print a tagged event line.
pub fn print_event(tag: &str, detail: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        format!("[{}]", tag.to_uppercase()).yellow().bold(),
        detail
    );
    let _ = io::stdout().flush();
}
