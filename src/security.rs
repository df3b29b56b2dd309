#![forbid(unsafe_code)]

//! Startup guards for the gateway binary.

use anyhow::{Result, bail};
use nix::unistd::Uid;

/// Refuses to start as root. The gateway runs yt-dlp against caller-supplied
/// URLs, so the child must inherit an unprivileged account.
pub fn ensure_not_root(process: &str) -> Result<()> {
    ensure_not_root_for(Uid::effective(), process)
}

fn ensure_not_root_for(uid: Uid, process: &str) -> Result<()> {
    if uid.is_root() {
        bail!("{process} must not be run as root; start it under a dedicated service account");
    }
    Ok(())
}
