// SPDX-License-Identifier: MIT

//! The `Store` trait: everything the runner, worker, and a future API
//! surface need from the relational backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sf_core::{
    Artifact, Attempt, AttemptId, Clarification, ClarificationId, Job, JobId, JobType, Signal,
    SignalId, SignalState,
};

use crate::error::Result;

/// Fields needed to upsert a `Signal` from a sync collaborator or the API.
#[derive(Debug, Clone)]
pub struct SignalUpsert {
    pub source: String,
    pub repo: String,
    pub issue_number: i64,
    pub external_id: Option<String>,
    pub title: String,
    pub body: Option<String>,
    pub metadata: Value,
    pub project_fields: Value,
    pub priority: i32,
}

/// Fields needed to persist one raised clarification.
#[derive(Debug, Clone)]
pub struct NewClarification {
    pub attempt_id: AttemptId,
    pub question_id: String,
    pub question_text: String,
    pub question_context: Option<String>,
    pub default_answer: Option<String>,
    pub anchors: Value,
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- Queue -----------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn enqueue(
        &self,
        job_type: JobType,
        payload: Value,
        priority: i32,
        max_retries: i32,
        scheduled_for: Option<DateTime<Utc>>,
        attempt_id: Option<AttemptId>,
    ) -> Result<Job>;

    /// Claim the single best-eligible job of one of `types` (any type if
    /// empty) for `worker_id`. See spec.md §4.1 for the eligibility
    /// predicate and ordering.
    async fn claim(&self, types: &[JobType], worker_id: &str) -> Result<Option<Job>>;

    async fn start(&self, job_id: JobId) -> Result<bool>;

    async fn complete(&self, job_id: JobId, result: Option<Value>) -> Result<bool>;

    async fn fail(&self, job_id: JobId, error: &str, retry_delay_seconds: i64) -> Result<bool>;

    async fn heartbeat(&self, job_id: JobId) -> Result<bool>;

    /// Returns the number of jobs reclaimed.
    async fn recover_stale(&self, threshold_seconds: i64) -> Result<u64>;

    // --- Signal ------------------------------------------------------------

    async fn upsert_signal(&self, fields: SignalUpsert) -> Result<Signal>;

    async fn get_signal(&self, id: SignalId) -> Result<Option<Signal>>;

    async fn set_signal_state(&self, id: SignalId, state: SignalState) -> Result<()>;

    // --- Attempt -----------------------------------------------------------

    /// Allocates the next monotonic `attempt_number` for `signal_id`.
    async fn create_attempt(&self, signal_id: SignalId) -> Result<Attempt>;

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>>;

    async fn update_attempt(&self, attempt: &Attempt) -> Result<()>;

    // --- Clarification -------------------------------------------------------

    async fn create_clarification(&self, new: NewClarification) -> Result<Clarification>;

    async fn get_clarifications(&self, ids: &[ClarificationId]) -> Result<Vec<Clarification>>;

    async fn answer_clarification(
        &self,
        id: ClarificationId,
        answer_text: Option<String>,
        accepted_default: bool,
        answered_by: Option<String>,
    ) -> Result<bool>;

    // --- Artifact ------------------------------------------------------------

    /// Append a LOG artifact with the next strictly-increasing
    /// `sequence_num` for this attempt.
    async fn append_log(
        &self,
        attempt_id: AttemptId,
        text: String,
        is_final: bool,
    ) -> Result<Artifact>;

    async fn append_artifact(&self, artifact: Artifact) -> Result<()>;

    async fn list_artifacts(
        &self,
        attempt_id: AttemptId,
        after_seq: Option<i64>,
    ) -> Result<Vec<Artifact>>;
}
