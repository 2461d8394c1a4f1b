//! Command-line surface. `clap`-derived, matching `Args` in
//! `crates/replicate/server` and the broader pack's convention of a flat,
//! derive-based CLI struct.

use std::path::PathBuf;

use clap::Parser;

fn default_state_dir() -> PathBuf {
    dirs_next_state_dir()
}

/// Platform-appropriate default state directory; no environment variable is
/// required to run. Avoids pulling in the `dirs` crate for a single call
/// site; mirrors what it would return on each platform.
fn dirs_next_state_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("WORLD_SERVER_STATE_DIR") {
        return PathBuf::from(dir);
    }
    #[cfg(target_os = "linux")]
    {
        if let Some(xdg) = std::env::var_os("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("world-server");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".local/state/world-server");
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".world-server");
        }
    }
    PathBuf::from("./world-server-state")
}

#[derive(Debug, Clone, Parser)]
#[command(name = "world-server", about = "Authoritative server for a persistent multi-user 3D world")]
pub struct Args {
    /// Alternate resource lookup directory, consulted before the default
    /// `<state_dir>/server_resources`.
    #[arg(long)]
    pub src_resource_dir: Option<PathBuf>,

    /// Run internal self-tests and exit: 0 on success, 1 on failure.
    /// Does not bind any sockets.
    #[arg(long)]
    pub test: bool,

    /// TCP port for the stream transport.
    #[arg(long, default_value_t = 7600)]
    pub port: u16,

    /// UDP port for the voice relay.
    #[arg(long, default_value_t = 7601)]
    pub voice_port: u16,

    /// Directory holding `server_state.bin` and `server_resources/`.
    /// Defaults to a platform-specific state directory.
    #[arg(long, default_value_os_t = default_state_dir())]
    pub state_dir: PathBuf,
}
