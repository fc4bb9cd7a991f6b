//! Claude Code CLI subprocess transport.
//!
//! Spawns the CLI, frames its stdout into stream-json lines, decodes them
//! into [`Message`](crate::protocol::Message)s and reconciles the exit
//! status into a [`TransportError`] where needed.

mod decode;
mod discovery;
mod error;
mod process;
mod process_transport;
mod stream;

pub use decode::*;
pub use discovery::*;
pub use error::*;
pub use process::*;
pub use process_transport::*;
pub use stream::*;
