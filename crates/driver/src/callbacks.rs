use std::collections::HashMap;

use async_trait::async_trait;
use sf_core::{AskedQuestions, ClarificationId};

/// Bidirectional ask-user rendezvous, backed by the enclosing runner's
/// store. Bidirectional mode applies when a real implementation is
/// supplied (`Option<Arc<dyn DriverCallbacks>>`); its absence selects
/// blocking mode.
#[async_trait]
pub trait DriverCallbacks: Send + Sync {
    /// Persist each question as a Clarification row, keyed by the tool
    /// call that raised it. Returns `tool_id -> [clarification_id]`.
    async fn on_questions_asked(
        &self,
        questions: Vec<AskedQuestions>,
    ) -> HashMap<String, Vec<ClarificationId>>;

    /// Returns answers keyed by `question_id` once every clarification
    /// raised this run `is_answered`, or `None` if still incomplete.
    async fn poll_for_answers(&self) -> Option<HashMap<String, String>>;
}

/// Log sink for driver-emitted entries. Every call persists one LOG
/// artifact with a strictly increasing `sequence_num`; `is_final` marks
/// the terminal entry.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn log(&self, sequence_num: i64, entry: serde_json::Value, is_final: bool);
}
