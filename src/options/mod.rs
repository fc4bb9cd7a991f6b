//! Query options and the command composer that turns them into CLI flags.

mod builder;
mod hooks;
mod servers;

pub use builder::*;
pub use hooks::*;
pub use servers::*;
