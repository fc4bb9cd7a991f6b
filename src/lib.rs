//! Claude Agent - drive the Claude Code CLI and decode its stream-json output.

pub mod agent;
pub mod config;
pub mod display;
pub mod options;
pub mod protocol;
pub mod query;
pub mod transport;

pub use agent::ClaudeAgent;
pub use query::QueryResult;
