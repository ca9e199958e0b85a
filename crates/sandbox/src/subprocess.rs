//! Subprocess helper shared by the git plumbing in [`crate::sandbox`].
//!
//! Mirrors the timeout-wrapped-command idiom used around the codebase's
//! other adapters: spawn, wait with a timeout, kill on expiry.

use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{Result, SandboxError};

pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(120);
pub const GIT_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run_with_timeout(
    mut cmd: Command,
    timeout_duration: Duration,
    label: &str,
) -> Result<std::process::Output> {
    let child = cmd.spawn().map_err(|source| SandboxError::Spawn {
        command: label.to_string(),
        source,
    })?;

    match timeout(timeout_duration, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SandboxError::Spawn {
            command: label.to_string(),
            source,
        }),
        Err(_) => Err(SandboxError::Timeout {
            command: label.to_string(),
            timeout_secs: timeout_duration.as_secs(),
        }),
    }
}
