use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ASK_USER_TOOL: &str = "AskUserQuestion";

/// One message in the agent's asynchronous output stream.
///
/// Serializes with `{"type": "...", ...}`, matching the wire format an
/// external agent subprocess emits as newline-delimited JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    System {
        #[serde(default)]
        content: Option<Value>,
    },
    Assistant {
        content: Vec<ContentBlock>,
    },
    User {
        content: Vec<ContentBlock>,
    },
    Result {
        session_id: String,
        is_error: bool,
        duration_ms: u64,
        #[serde(default)]
        cost_usd: f64,
        #[serde(default)]
        turns: u32,
        #[serde(default)]
        usage: Option<Value>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "block_type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
    },
}
