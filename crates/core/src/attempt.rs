// SPDX-License-Identifier: MIT

//! The `Attempt` entity: one execution of the agent against a signal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AttemptId, SignalId};

/// Resolved per the Open Question in spec.md §9: the richer taxonomy, not
/// the PENDING/RUNNING/COMPLETE/WAITING/ERROR set. See DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attempt_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Running,
    Success,
    NeedsHuman,
    Failed,
    Noop,
}

impl AttemptStatus {
    /// Terminal statuses never transition further for this attempt id.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttemptStatus::Success | AttemptStatus::Failed | AttemptStatus::Noop
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub signal_id: SignalId,
    pub attempt_number: i32,
    pub status: AttemptStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub pr_url: Option<String>,
    pub pr_number: Option<i32>,
    pub branch_name: Option<String>,
    pub summary: Value,
    pub runner_metadata: Value,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attempt {
    pub fn new(id: AttemptId, signal_id: SignalId, attempt_number: i32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            signal_id,
            attempt_number,
            status: AttemptStatus::Pending,
            started_at: None,
            finished_at: None,
            pr_url: None,
            pr_number: None,
            branch_name: None,
            summary: Value::Null,
            runner_metadata: Value::Null,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Idempotent RUNNING transition: a retried job re-executing the same
    /// attempt id must not clobber an already-set `started_at`. Never
    /// regresses a terminal attempt back to RUNNING.
    pub fn mark_running(&mut self, now: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.status = AttemptStatus::Running;
        self.updated_at = now;
    }

    /// Terminal transition (Success/Failed/Noop): sets `finished_at`.
    pub fn mark_terminal(&mut self, status: AttemptStatus, now: DateTime<Utc>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.finished_at = Some(now);
        self.updated_at = now;
    }

    /// NeedsHuman is not terminal: the attempt may resume once a human
    /// answers the pending clarifications, so `finished_at` stays unset.
    pub fn mark_needs_human(&mut self, now: DateTime<Utc>) {
        self.status = AttemptStatus::NeedsHuman;
        self.updated_at = now;
    }
}
