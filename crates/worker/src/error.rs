#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("environment variable {0} has an invalid value: {1}")]
    InvalidVar(&'static str, String),
    #[error(transparent)]
    Store(#[from] sf_store::StoreError),
    #[error(transparent)]
    Runner(#[from] sf_runner::RunnerError),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
