use serde_json::Value;
use sf_core::AskedQuestions;

use crate::metrics::ExecutionMetrics;

/// Outcome of one driver run, consumed by the classifier.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: Value,
    pub metrics: ExecutionMetrics,
    pub final_text: String,
    pub prompt: String,
    pub timed_out: bool,
    pub budget_exceeded: bool,
    pub questions_asked: Vec<AskedQuestions>,
    pub interrupted_for_questions: bool,
    pub error_message: Option<String>,
}

impl ExecutionResult {
    /// `success = ¬timed_out ∧ ¬budget_exceeded ∧ error=nil ∧ (result absent ∨ result.is_error=false)`.
    pub fn compute_success(timed_out: bool, budget_exceeded: bool, error_message: &Option<String>, result_is_error: Option<bool>) -> bool {
        !timed_out
            && !budget_exceeded
            && error_message.is_none()
            && result_is_error != Some(true)
    }
}
