// SPDX-License-Identifier: MIT

//! The `Clarification` entity: a question the agent raised plus its answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AttemptId, ClarificationId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clarification {
    pub id: ClarificationId,
    pub attempt_id: AttemptId,
    /// Stable string, unique within the attempt (e.g. `"auq_0_1"`).
    pub question_id: String,
    pub question_text: String,
    pub question_context: Option<String>,
    pub default_answer: Option<String>,
    pub accepted_default: bool,
    pub answer_text: Option<String>,
    pub answered_at: Option<DateTime<Utc>>,
    pub answered_by: Option<String>,
    /// Structured option lists for multiple-choice questions.
    pub anchors: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Clarification {
    pub fn is_answered(&self) -> bool {
        self.answer_text.is_some() || self.accepted_default
    }

    pub fn effective_answer(&self) -> Option<&str> {
        self.answer_text
            .as_deref()
            .or_else(|| (self.accepted_default).then_some(self.default_answer.as_deref()).flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(now: DateTime<Utc>) -> Clarification {
        Clarification {
            id: ClarificationId::new(),
            attempt_id: AttemptId::new(),
            question_id: "auq_0_0".into(),
            question_text: "Which database?".into(),
            question_context: None,
            default_answer: Some("PostgreSQL".into()),
            accepted_default: false,
            answer_text: None,
            answered_at: None,
            answered_by: None,
            anchors: Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unanswered_by_default() {
        let c = base(Utc::now());
        assert!(!c.is_answered());
        assert_eq!(c.effective_answer(), None);
    }

    #[test]
    fn answer_text_wins_over_default() {
        let mut c = base(Utc::now());
        c.answer_text = Some("MySQL".into());
        c.accepted_default = true;
        assert!(c.is_answered());
        assert_eq!(c.effective_answer(), Some("MySQL"));
    }

    #[test]
    fn accepted_default_without_answer_text() {
        let mut c = base(Utc::now());
        c.accepted_default = true;
        assert!(c.is_answered());
        assert_eq!(c.effective_answer(), Some("PostgreSQL"));
    }
}
