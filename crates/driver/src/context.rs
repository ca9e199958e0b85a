use serde_json::Value;

/// Full context for a signal, assembled by the runner from the `Signal`
/// and `Job` payload before driving the agent.
#[derive(Debug, Clone)]
pub struct SignalContext {
    pub source: String,
    pub repo: String,
    pub issue_number: Option<i64>,
    pub title: String,
    pub body: Option<String>,
    pub metadata: Option<Value>,
    pub project_fields: Option<Value>,
    pub clarifications: Vec<PriorClarification>,
}

/// A previously answered question carried forward into a retried attempt.
#[derive(Debug, Clone)]
pub struct PriorClarification {
    pub question: String,
    pub answer: String,
}
