use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("failed to create sandbox directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git clone failed: {0}")]
    CloneFailed(String),

    #[error("git checkout failed: {0}")]
    CheckoutFailed(String),

    #[error("command {command} timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("failed to spawn command {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("diff output was not valid utf-8")]
    InvalidDiffOutput,
}

pub type Result<T> = std::result::Result<T, SandboxError>;
