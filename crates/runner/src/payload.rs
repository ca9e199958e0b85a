use serde::Deserialize;
use sf_core::{AttemptId, SignalId};

/// Shape of the `payload` JSON column for `run_attempt` / `retry_attempt`
/// jobs, written by the API or sync collaborator when a job is enqueued.
#[derive(Debug, Clone, Deserialize)]
pub struct JobPayload {
    pub attempt_id: AttemptId,
    pub signal_id: SignalId,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub clarifications: Vec<PayloadClarification>,
}

/// A previously answered clarification, carried forward into a retried
/// attempt's prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadClarification {
    pub question: String,
    pub answer: String,
}
