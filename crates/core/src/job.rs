// SPDX-License-Identifier: MIT

//! The `Job` entity: a unit of work in the durable queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AttemptId, JobId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    SyncSignals,
    RunAttempt,
    RetryAttempt,
    Cleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Claimed,
    Running,
    Completed,
    Failed,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub payload: Value,
    pub status: JobStatus,
    pub priority: i32,
    pub max_retries: i32,
    pub retry_count: i32,
    pub scheduled_for: DateTime<Utc>,
    pub worker_id: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub attempt_id: Option<AttemptId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        id: JobId,
        job_type: JobType,
        payload: Value,
        priority: i32,
        max_retries: i32,
        scheduled_for: DateTime<Utc>,
        attempt_id: Option<AttemptId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            job_type,
            payload,
            status: JobStatus::Pending,
            priority,
            max_retries,
            retry_count: 0,
            scheduled_for,
            worker_id: None,
            claimed_at: None,
            heartbeat_at: None,
            completed_at: None,
            result: None,
            error: None,
            attempt_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}
