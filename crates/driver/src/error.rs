#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to spawn agent process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to write to agent stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("failed to read agent stdout: {0}")]
    Stdout(#[source] std::io::Error),

    #[error("agent stdout line was not valid JSON: {0}")]
    MalformedMessage(#[source] serde_json::Error),

    #[error("agent process has no stdin handle")]
    MissingStdin,

    #[error("agent process has no stdout handle")]
    MissingStdout,
}

pub type Result<T> = std::result::Result<T, DriverError>;
