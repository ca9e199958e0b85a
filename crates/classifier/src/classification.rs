use sf_core::{AskedQuestions, AttemptStatus, QuestionEntry};

/// Result of classifying one agent execution.
#[derive(Debug, Clone)]
pub struct Classification {
    pub status: AttemptStatus,
    pub questions: Vec<AskedQuestions>,
    pub assumptions: Vec<String>,
    pub risk_flags: Vec<String>,
    pub pr_url: Option<String>,
    pub what_changed: Vec<String>,
    pub error_message: Option<String>,
}

impl Classification {
    pub(crate) fn failed(error_message: impl Into<String>, risk_flag: &str) -> Self {
        Self {
            status: AttemptStatus::Failed,
            questions: Vec::new(),
            assumptions: Vec::new(),
            risk_flags: vec![risk_flag.to_string()],
            pr_url: None,
            what_changed: Vec::new(),
            error_message: Some(error_message.into()),
        }
    }

    pub(crate) fn needs_human(
        questions: Vec<AskedQuestions>,
        assumptions: Vec<String>,
        what_changed: Vec<String>,
    ) -> Self {
        Self {
            status: AttemptStatus::NeedsHuman,
            questions,
            assumptions,
            risk_flags: Vec::new(),
            pr_url: None,
            what_changed,
            error_message: None,
        }
    }
}

pub(crate) fn synthetic_question(category: &str) -> QuestionEntry {
    QuestionEntry {
        question: format!("Clarification needed ({category})"),
        header: Some(format!("Detected {category} pattern in output")),
        options: Vec::new(),
        multi_select: false,
    }
}
