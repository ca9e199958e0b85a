// SPDX-License-Identifier: MIT

//! The `Artifact` entity: output of an attempt (logs, diffs, plans, errors).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ArtifactId, AttemptId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "artifact_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Log,
    Diff,
    Plan,
    Cost,
    Error,
    Screenshot,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub attempt_id: AttemptId,
    pub artifact_type: ArtifactType,
    pub name: String,
    pub mime_type: Option<String>,
    pub content_text: Option<String>,
    pub content_blob: Option<Vec<u8>>,
    pub content_path: Option<String>,
    pub size_bytes: i64,
    pub sequence_num: Option<i64>,
    pub is_final: bool,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Exactly one of `content_text` / `content_blob` / `content_path` must
    /// be set.
    pub fn has_content(&self) -> bool {
        self.content_text.is_some() || self.content_blob.is_some() || self.content_path.is_some()
    }

    pub fn log_entry(
        id: ArtifactId,
        attempt_id: AttemptId,
        sequence_num: i64,
        text: String,
        is_final: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let size_bytes = text.len() as i64;
        Self {
            id,
            attempt_id,
            artifact_type: ArtifactType::Log,
            name: format!("log-{sequence_num}"),
            mime_type: Some("application/json".to_string()),
            content_text: Some(text),
            content_blob: None,
            content_path: None,
            size_bytes,
            sequence_num: Some(sequence_num),
            is_final,
            created_at: now,
        }
    }
}
