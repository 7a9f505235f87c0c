#![forbid(unsafe_code)]

//! Process-level guards for the server binary.

use anyhow::{Result, bail};
use nix::unistd::Uid;

/// Fails fast when started as root. The server only ever needs access to its
/// own download directory.
pub fn ensure_not_root(process: &str) -> Result<()> {
    if Uid::effective().is_root() {
        bail!("{process} must not be run as root; start it as an unprivileged user or pass --allow-root");
    }
    Ok(())
}
