// SPDX-License-Identifier: MIT

//! Structured question shapes shared by the driver (which raises them) and
//! the classifier (which extracts them from an `ExecutionResult`).

use serde::{Deserialize, Serialize};

/// A single labeled choice offered to the human for a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub label: String,
    #[serde(default)]
    pub description: String,
}

/// One question raised via the agent's ask-user tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub question: String,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default, rename = "multiSelect")]
    pub multi_select: bool,
}

/// A batch of questions raised in a single ask-user tool call, tagged with
/// the tool-use id they arrived under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskedQuestions {
    pub id: String,
    pub questions: Vec<QuestionEntry>,
}
