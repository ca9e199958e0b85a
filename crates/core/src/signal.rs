// SPDX-License-Identifier: MIT

//! The `Signal` entity: a work item sourced from an upstream collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::SignalId;

/// Coarse workflow position of a signal, projected by the runner alongside
/// the attempt's own status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "signal_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SignalState {
    Pending,
    Queued,
    InProgress,
    Completed,
    Blocked,
    Skipped,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub source: String,
    pub repo: String,
    pub issue_number: i64,
    pub external_id: Option<String>,
    pub title: String,
    pub body: Option<String>,
    pub metadata: Value,
    pub project_fields: Value,
    pub priority: i32,
    pub state: SignalState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Signal {
    /// `owner/name#issue_number` URL-ish handle used in log lines and prompts.
    pub fn reference(&self) -> String {
        format!("{}#{}", self.repo, self.issue_number)
    }
}
