// SPDX-License-Identifier: MIT

//! Postgres-backed `Store`, grounded on the `FOR UPDATE SKIP LOCKED` claim
//! pattern and exponential-backoff retry scheduling used by the queue
//! implementation this crate generalizes from. Queries are runtime-checked
//! (`sqlx::query_as::<_, Row>(...)`), not the `query!` compile-time macros,
//! since building against a live database isn't assumed here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sf_core::{
    Artifact, ArtifactId, ArtifactType, Attempt, AttemptId, AttemptStatus, Clarification,
    ClarificationId, Job, JobId, JobStatus, JobType, Signal, SignalId, SignalState,
};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use crate::error::Result;
use crate::store::{NewClarification, SignalUpsert, Store};

/// Postgres-backed implementation of [`Store`].
///
/// Holds the one process-wide shared resource (the connection pool); every
/// other piece of state is constructed fresh per call, the way `Config` is
/// threaded through rather than cached globally (spec.md §9).
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const JOB_COLUMNS: &str = "id, job_type, payload, status, priority, max_retries, retry_count, \
     scheduled_for, worker_id, claimed_at, heartbeat_at, completed_at, result, error, attempt_id, \
     created_at, updated_at";

const SIGNAL_COLUMNS: &str = "id, source, repo, issue_number, external_id, title, body, metadata, \
     project_fields, priority, state, created_at, updated_at";

const ATTEMPT_COLUMNS: &str = "id, signal_id, attempt_number, status, started_at, finished_at, \
     pr_url, pr_number, branch_name, summary, runner_metadata, error_message, created_at, updated_at";

const CLARIFICATION_COLUMNS: &str = "id, attempt_id, question_id, question_text, question_context, \
     default_answer, accepted_default, answer_text, answered_at, answered_by, anchors, created_at, updated_at";

const ARTIFACT_COLUMNS: &str = "id, attempt_id, artifact_type, name, mime_type, content_text, \
     content_blob, content_path, size_bytes, sequence_num, is_final, created_at";

#[async_trait]
impl Store for PostgresStore {
    #[instrument(skip(self, payload))]
    async fn enqueue(
        &self,
        job_type: JobType,
        payload: Value,
        priority: i32,
        max_retries: i32,
        scheduled_for: Option<DateTime<Utc>>,
        attempt_id: Option<AttemptId>,
    ) -> Result<Job> {
        let id = JobId::new();
        let now = Utc::now();
        let scheduled_for = scheduled_for.unwrap_or(now);
        let row: JobRow = sqlx::query_as(&format!(
            "INSERT INTO jobs (id, job_type, payload, priority, max_retries, scheduled_for, attempt_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) RETURNING {JOB_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(job_type)
        .bind(payload)
        .bind(priority)
        .bind(max_retries)
        .bind(scheduled_for)
        .bind(attempt_id.map(|a| a.as_uuid()))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn claim(&self, types: &[JobType], worker_id: &str) -> Result<Option<Job>> {
        let type_filter: Vec<JobType> = types.to_vec();
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "WITH next_job AS ( \
                SELECT id FROM jobs \
                WHERE status = 'pending' AND scheduled_for <= NOW() AND retry_count < max_retries \
                  AND (cardinality($1::job_type[]) = 0 OR job_type = ANY($1::job_type[])) \
                ORDER BY priority DESC, scheduled_for ASC LIMIT 1 FOR UPDATE SKIP LOCKED \
            ) \
            UPDATE jobs SET status = 'claimed', worker_id = $2, claimed_at = NOW(), heartbeat_at = NOW(), updated_at = NOW() \
            FROM next_job WHERE jobs.id = next_job.id \
            RETURNING {}",
            JOB_COLUMNS
                .split(", ")
                .map(|c| format!("jobs.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        ))
        .bind(&type_filter)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn start(&self, job_id: JobId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'running', heartbeat_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = 'claimed'",
        )
        .bind(job_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, result))]
    async fn complete(&self, job_id: JobId, result: Option<Value>) -> Result<bool> {
        let affected = sqlx::query(
            "UPDATE jobs SET status = 'completed', completed_at = NOW(), result = $2, updated_at = NOW() \
             WHERE id = $1 AND status IN ('claimed', 'running')",
        )
        .bind(job_id.as_uuid())
        .bind(result)
        .execute(&self.pool)
        .await?;
        Ok(affected.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn fail(&self, job_id: JobId, error: &str, retry_delay_seconds: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query("SELECT retry_count, max_retries FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(job_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = current else {
            return Ok(false);
        };
        let old_retry_count: i32 = current.try_get("retry_count")?;
        let max_retries: i32 = current.try_get("max_retries")?;
        let new_retry_count = old_retry_count + 1;

        let affected = if new_retry_count < max_retries {
            let shift = (old_retry_count.max(0) as u32).min(62);
            let backoff_secs = retry_delay_seconds.saturating_mul(1i64 << shift);
            sqlx::query(
                "UPDATE jobs SET status = 'pending', error = $2, retry_count = $3, \
                 scheduled_for = NOW() + ($4 || ' seconds')::INTERVAL, \
                 worker_id = NULL, claimed_at = NULL, heartbeat_at = NULL, updated_at = NOW() \
                 WHERE id = $1 AND status IN ('claimed', 'running')",
            )
            .bind(job_id.as_uuid())
            .bind(error)
            .bind(new_retry_count)
            .bind(backoff_secs.to_string())
            .execute(&mut *tx)
            .await?
        } else {
            sqlx::query(
                "UPDATE jobs SET status = 'dead', error = $2, retry_count = $3, completed_at = NOW(), updated_at = NOW() \
                 WHERE id = $1 AND status IN ('claimed', 'running')",
            )
            .bind(job_id.as_uuid())
            .bind(error)
            .bind(new_retry_count)
            .execute(&mut *tx)
            .await?
        };
        tx.commit().await?;
        Ok(affected.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn heartbeat(&self, job_id: JobId) -> Result<bool> {
        let affected = sqlx::query(
            "UPDATE jobs SET heartbeat_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status IN ('claimed', 'running')",
        )
        .bind(job_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(affected.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn recover_stale(&self, threshold_seconds: i64) -> Result<u64> {
        let affected = sqlx::query(
            "UPDATE jobs SET status = 'pending', error = 'Recovered from stale worker', \
             retry_count = retry_count + 1, worker_id = NULL, claimed_at = NULL, heartbeat_at = NULL, updated_at = NOW() \
             WHERE status IN ('claimed', 'running') \
               AND heartbeat_at < NOW() - ($1 || ' seconds')::INTERVAL \
               AND retry_count < max_retries",
        )
        .bind(threshold_seconds.to_string())
        .execute(&self.pool)
        .await?;
        Ok(affected.rows_affected())
    }

    #[instrument(skip(self, fields))]
    async fn upsert_signal(&self, fields: SignalUpsert) -> Result<Signal> {
        let id = SignalId::new();
        let row: SignalRow = sqlx::query_as(&format!(
            "INSERT INTO signals (id, source, repo, issue_number, external_id, title, body, metadata, project_fields, priority) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (repo, issue_number) DO UPDATE SET \
                source = EXCLUDED.source, external_id = EXCLUDED.external_id, title = EXCLUDED.title, \
                body = EXCLUDED.body, metadata = EXCLUDED.metadata, project_fields = EXCLUDED.project_fields, \
                priority = EXCLUDED.priority, updated_at = NOW() \
             RETURNING {SIGNAL_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(fields.source)
        .bind(fields.repo)
        .bind(fields.issue_number)
        .bind(fields.external_id)
        .bind(fields.title)
        .bind(fields.body)
        .bind(fields.metadata)
        .bind(fields.project_fields)
        .bind(fields.priority)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn get_signal(&self, id: SignalId) -> Result<Option<Signal>> {
        let row: Option<SignalRow> =
            sqlx::query_as(&format!("SELECT {SIGNAL_COLUMNS} FROM signals WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn set_signal_state(&self, id: SignalId, state: SignalState) -> Result<()> {
        sqlx::query("UPDATE signals SET state = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.as_uuid())
            .bind(state)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_attempt(&self, signal_id: SignalId) -> Result<Attempt> {
        let id = AttemptId::new();
        let row: AttemptRow = sqlx::query_as(&format!(
            "INSERT INTO attempts (id, signal_id, attempt_number) \
             VALUES ($1, $2, COALESCE((SELECT MAX(attempt_number) FROM attempts WHERE signal_id = $2), 0) + 1) \
             RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(signal_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>> {
        let row: Option<AttemptRow> =
            sqlx::query_as(&format!("SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, attempt))]
    async fn update_attempt(&self, attempt: &Attempt) -> Result<()> {
        sqlx::query(
            "UPDATE attempts SET status = $2, started_at = $3, finished_at = $4, pr_url = $5, pr_number = $6, \
             branch_name = $7, summary = $8, runner_metadata = $9, error_message = $10, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(attempt.id.as_uuid())
        .bind(attempt.status)
        .bind(attempt.started_at)
        .bind(attempt.finished_at)
        .bind(attempt.pr_url.clone())
        .bind(attempt.pr_number)
        .bind(attempt.branch_name.clone())
        .bind(attempt.summary.clone())
        .bind(attempt.runner_metadata.clone())
        .bind(attempt.error_message.clone())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, new))]
    async fn create_clarification(&self, new: NewClarification) -> Result<Clarification> {
        let id = ClarificationId::new();
        let row: ClarificationRow = sqlx::query_as(&format!(
            "INSERT INTO clarifications (id, attempt_id, question_id, question_text, question_context, default_answer, anchors) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {CLARIFICATION_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(new.attempt_id.as_uuid())
        .bind(new.question_id)
        .bind(new.question_text)
        .bind(new.question_context)
        .bind(new.default_answer)
        .bind(new.anchors)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    #[instrument(skip(self, ids))]
    async fn get_clarifications(&self, ids: &[ClarificationId]) -> Result<Vec<Clarification>> {
        let ids: Vec<uuid::Uuid> = ids.iter().map(|i| i.as_uuid()).collect();
        let rows: Vec<ClarificationRow> = sqlx::query_as(&format!(
            "SELECT {CLARIFICATION_COLUMNS} FROM clarifications WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn answer_clarification(
        &self,
        id: ClarificationId,
        answer_text: Option<String>,
        accepted_default: bool,
        answered_by: Option<String>,
    ) -> Result<bool> {
        let affected = sqlx::query(
            "UPDATE clarifications SET answer_text = $2, accepted_default = $3, answered_by = $4, \
             answered_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(answer_text)
        .bind(accepted_default)
        .bind(answered_by)
        .execute(&self.pool)
        .await?;
        Ok(affected.rows_affected() > 0)
    }

    #[instrument(skip(self, text))]
    async fn append_log(
        &self,
        attempt_id: AttemptId,
        text: String,
        is_final: bool,
    ) -> Result<Artifact> {
        let id = ArtifactId::new();
        let row: ArtifactRow = sqlx::query_as(&format!(
            "INSERT INTO artifacts (id, attempt_id, artifact_type, name, mime_type, content_text, size_bytes, sequence_num, is_final) \
             VALUES ( \
                $1, $2, 'log', \
                'log-' || (COALESCE((SELECT MAX(sequence_num) FROM artifacts WHERE attempt_id = $2 AND artifact_type = 'log'), -1) + 1), \
                'application/json', $3, LENGTH($3), \
                COALESCE((SELECT MAX(sequence_num) FROM artifacts WHERE attempt_id = $2 AND artifact_type = 'log'), -1) + 1, \
                $4 \
             ) RETURNING {ARTIFACT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(attempt_id.as_uuid())
        .bind(text)
        .bind(is_final)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    #[instrument(skip(self, artifact))]
    async fn append_artifact(&self, artifact: Artifact) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO artifacts ({ARTIFACT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(artifact.id.as_uuid())
        .bind(artifact.attempt_id.as_uuid())
        .bind(artifact.artifact_type)
        .bind(artifact.name)
        .bind(artifact.mime_type)
        .bind(artifact.content_text)
        .bind(artifact.content_blob)
        .bind(artifact.content_path)
        .bind(artifact.size_bytes)
        .bind(artifact.sequence_num)
        .bind(artifact.is_final)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_artifacts(
        &self,
        attempt_id: AttemptId,
        after_seq: Option<i64>,
    ) -> Result<Vec<Artifact>> {
        let rows: Vec<ArtifactRow> = sqlx::query_as(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts \
             WHERE attempt_id = $1 AND ($2::BIGINT IS NULL OR sequence_num > $2) \
             ORDER BY sequence_num ASC NULLS LAST"
        ))
        .bind(attempt_id.as_uuid())
        .bind(after_seq)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// --- row <-> domain conversions --------------------------------------------

#[derive(FromRow)]
struct JobRow {
    id: uuid::Uuid,
    job_type: JobType,
    payload: Value,
    status: JobStatus,
    priority: i32,
    max_retries: i32,
    retry_count: i32,
    scheduled_for: DateTime<Utc>,
    worker_id: Option<String>,
    claimed_at: Option<DateTime<Utc>>,
    heartbeat_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<Value>,
    error: Option<String>,
    attempt_id: Option<uuid::Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<JobRow> for Job {
    fn from(r: JobRow) -> Self {
        Job {
            id: r.id.into(),
            job_type: r.job_type,
            payload: r.payload,
            status: r.status,
            priority: r.priority,
            max_retries: r.max_retries,
            retry_count: r.retry_count,
            scheduled_for: r.scheduled_for,
            worker_id: r.worker_id,
            claimed_at: r.claimed_at,
            heartbeat_at: r.heartbeat_at,
            completed_at: r.completed_at,
            result: r.result,
            error: r.error,
            attempt_id: r.attempt_id.map(Into::into),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SignalRow {
    id: uuid::Uuid,
    source: String,
    repo: String,
    issue_number: i64,
    external_id: Option<String>,
    title: String,
    body: Option<String>,
    metadata: Value,
    project_fields: Value,
    priority: i32,
    state: SignalState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SignalRow> for Signal {
    fn from(r: SignalRow) -> Self {
        Signal {
            id: r.id.into(),
            source: r.source,
            repo: r.repo,
            issue_number: r.issue_number,
            external_id: r.external_id,
            title: r.title,
            body: r.body,
            metadata: r.metadata,
            project_fields: r.project_fields,
            priority: r.priority,
            state: r.state,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: uuid::Uuid,
    signal_id: uuid::Uuid,
    attempt_number: i32,
    status: AttemptStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    pr_url: Option<String>,
    pr_number: Option<i32>,
    branch_name: Option<String>,
    summary: Value,
    runner_metadata: Value,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AttemptRow> for Attempt {
    fn from(r: AttemptRow) -> Self {
        Attempt {
            id: r.id.into(),
            signal_id: r.signal_id.into(),
            attempt_number: r.attempt_number,
            status: r.status,
            started_at: r.started_at,
            finished_at: r.finished_at,
            pr_url: r.pr_url,
            pr_number: r.pr_number,
            branch_name: r.branch_name,
            summary: r.summary,
            runner_metadata: r.runner_metadata,
            error_message: r.error_message,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ClarificationRow {
    id: uuid::Uuid,
    attempt_id: uuid::Uuid,
    question_id: String,
    question_text: String,
    question_context: Option<String>,
    default_answer: Option<String>,
    accepted_default: bool,
    answer_text: Option<String>,
    answered_at: Option<DateTime<Utc>>,
    answered_by: Option<String>,
    anchors: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ClarificationRow> for Clarification {
    fn from(r: ClarificationRow) -> Self {
        Clarification {
            id: r.id.into(),
            attempt_id: r.attempt_id.into(),
            question_id: r.question_id,
            question_text: r.question_text,
            question_context: r.question_context,
            default_answer: r.default_answer,
            accepted_default: r.accepted_default,
            answer_text: r.answer_text,
            answered_at: r.answered_at,
            answered_by: r.answered_by,
            anchors: r.anchors,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ArtifactRow {
    id: uuid::Uuid,
    attempt_id: uuid::Uuid,
    artifact_type: ArtifactType,
    name: String,
    mime_type: Option<String>,
    content_text: Option<String>,
    content_blob: Option<Vec<u8>>,
    content_path: Option<String>,
    size_bytes: i64,
    sequence_num: Option<i64>,
    is_final: bool,
    created_at: DateTime<Utc>,
}

impl From<ArtifactRow> for Artifact {
    fn from(r: ArtifactRow) -> Self {
        Artifact {
            id: r.id.into(),
            attempt_id: r.attempt_id.into(),
            artifact_type: r.artifact_type,
            name: r.name,
            mime_type: r.mime_type,
            content_text: r.content_text,
            content_blob: r.content_blob,
            content_path: r.content_path,
            size_bytes: r.size_bytes,
            sequence_num: r.sequence_num,
            is_final: r.is_final,
            created_at: r.created_at,
        }
    }
}

#[cfg(all(test, feature = "integration"))]
mod tests {
    //! Exercised only against a live Postgres instance, gated the way
    //! `fourthplaces-mntogether`'s `testcontainers`-based tests are.
    use super::*;

    async fn test_store() -> Option<PostgresStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let store = PostgresStore::connect(&url).await.ok()?;
        store.migrate().await.ok()?;
        Some(store)
    }

    #[tokio::test]
    async fn enqueue_and_claim_round_trip() {
        let Some(store) = test_store().await else {
            eprintln!("skipping: DATABASE_URL not set");
            return;
        };
        let job = store
            .enqueue(JobType::RunAttempt, Value::Null, 0, 3, None, None)
            .await
            .unwrap();
        let claimed = store.claim(&[], "integration-worker").await.unwrap();
        assert_eq!(claimed.unwrap().id.as_uuid(), job.id.as_uuid());
    }
}
