use sf_core::{AttemptId, SignalId};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("job payload could not be parsed: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("attempt {0} does not exist")]
    AttemptNotFound(AttemptId),

    #[error("signal {0} does not exist")]
    SignalNotFound(SignalId),

    #[error(transparent)]
    Store(#[from] sf_store::StoreError),

    #[error(transparent)]
    Sandbox(#[from] sf_sandbox::SandboxError),

    #[error(transparent)]
    Driver(#[from] sf_driver::DriverError),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
