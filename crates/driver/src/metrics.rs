/// Metrics accumulated while driving one agent execution.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutionMetrics {
    pub tool_call_count: u32,
    pub turn_count: u32,
    pub commands_run: Vec<String>,
    pub total_cost_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
}
