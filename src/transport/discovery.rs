//! Locating the Claude Code CLI binary.

use std::env;
use std::path::{Path, PathBuf};

/// Binary name looked up on `PATH` and used as the final fallback.
pub const CLI_NAME: &str = "claude";

/// Find the CLI: well-known install locations first, then `PATH`.
///
/// Falls back to the bare name so spawning reports a missing binary.
#[must_use]
pub fn find_cli() -> PathBuf {
    let home = dirs::home_dir();
    let path_var = env::var_os("PATH");
    find_cli_in(home.as_deref(), path_var.as_deref())
}

/// [`find_cli`] with the home directory and `PATH` supplied by the caller.
#[must_use]
pub fn find_cli_in(home: Option<&Path>, path_var: Option<&std::ffi::OsStr>) -> PathBuf {
    let mut candidates = vec![
        PathBuf::from("/usr/local/bin").join(CLI_NAME),
        PathBuf::from("/usr/bin").join(CLI_NAME),
    ];
    if let Some(home) = home {
        candidates.push(home.join(".npm-global/bin").join(CLI_NAME));
        candidates.push(home.join(".local/bin").join(CLI_NAME));
    }

    if let Some(found) = candidates.into_iter().find(|p| is_executable(p)) {
        tracing::debug!(path = %found.display(), "Found Claude CLI");
        return found;
    }

    if let Some(found) = path_var
        .into_iter()
        .flat_map(env::split_paths)
        .map(|dir| dir.join(cli_file_name()))
        .find(|p| is_executable(p))
    {
        tracing::debug!(path = %found.display(), "Found Claude CLI on PATH");
        return found;
    }

    tracing::debug!("Claude CLI not found, falling back to bare name");
    PathBuf::from(CLI_NAME)
}

fn cli_file_name() -> String {
    if cfg!(windows) {
        format!("{CLI_NAME}.exe")
    } else {
        CLI_NAME.to_string()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
