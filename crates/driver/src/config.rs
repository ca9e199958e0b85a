/// Execution budgets and tool permissions for one driver run.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub max_turns: u32,
    pub timeout_seconds: u64,
    pub max_tool_calls: u32,
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub answer_poll_interval_seconds: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_turns: 50,
            timeout_seconds: 1200,
            max_tool_calls: 200,
            allowed_tools: vec![
                "Read".into(),
                "Write".into(),
                "Edit".into(),
                "Glob".into(),
                "Grep".into(),
                "Bash".into(),
                "AskUserQuestion".into(),
            ],
            disallowed_tools: vec!["WebFetch".into(), "WebSearch".into()],
            answer_poll_interval_seconds: 5,
        }
    }
}
