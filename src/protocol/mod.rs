//! Typed model of the CLI's stream-json protocol.

mod content;
pub mod fields;
mod message;
mod usage;

pub use content::*;
pub use fields::JsonObject;
pub use message::*;
pub use usage::*;
