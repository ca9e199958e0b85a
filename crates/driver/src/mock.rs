use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::message::{AgentMessage, ContentBlock};
use crate::source::MessageSource;

/// Canned execution scenarios for exercising the driver loop without a
/// real agent subprocess, selected by the `claude_mock_scenario` config
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockScenario {
    /// Makes one change and reports a PR URL.
    Success,
    /// Raises one AskUserQuestion call carrying two questions, then
    /// finishes once both are answered.
    AskUserQuestion,
    /// The process errors out mid-run.
    ExecutionError,
    /// Never produces a `Result` message; the wall-clock budget fires.
    Timeout,
    /// Emits `ToolUse` blocks past `max_tool_calls`.
    BudgetExceeded,
}

impl MockScenario {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "success" => Some(Self::Success),
            "ask_user_question" => Some(Self::AskUserQuestion),
            "execution_error" => Some(Self::ExecutionError),
            "timeout" => Some(Self::Timeout),
            "budget_exceeded" => Some(Self::BudgetExceeded),
            _ => None,
        }
    }
}

pub struct MockSource {
    scenario: MockScenario,
    queue: VecDeque<AgentMessage>,
    resumed: bool,
}

impl MockSource {
    pub fn new(scenario: MockScenario) -> Self {
        let queue = match scenario {
            MockScenario::Success => VecDeque::from([
                AgentMessage::System { content: None },
                AgentMessage::Assistant {
                    content: vec![
                        ContentBlock::ToolUse {
                            id: "tu_1".into(),
                            name: "Bash".into(),
                            input: serde_json::json!({"command": "git status"}),
                        },
                        ContentBlock::Text {
                            text: "Opened https://github.com/acme/widgets/pull/7.".into(),
                        },
                    ],
                },
                AgentMessage::Result {
                    session_id: "mock-session".into(),
                    is_error: false,
                    duration_ms: 1500,
                    cost_usd: 0.02,
                    turns: 1,
                    usage: None,
                },
            ]),
            MockScenario::AskUserQuestion => VecDeque::from([
                AgentMessage::Assistant {
                    content: vec![ContentBlock::ToolUse {
                        id: "tu_ask".into(),
                        name: crate::message::ASK_USER_TOOL.into(),
                        input: serde_json::json!({
                            "questions": [
                                {
                                    "question": "Which database should this use?",
                                    "header": "Database choice",
                                    "options": [],
                                    "multiSelect": false,
                                },
                                {
                                    "question": "Should we use JWT tokens for auth?",
                                    "header": "Auth approach",
                                    "options": [],
                                    "multiSelect": false,
                                },
                            ]
                        }),
                    }],
                },
            ]),
            MockScenario::ExecutionError => VecDeque::from([AgentMessage::Result {
                session_id: "mock-session".into(),
                is_error: true,
                duration_ms: 500,
                cost_usd: 0.0,
                turns: 1,
                usage: None,
            }]),
            MockScenario::Timeout => VecDeque::new(),
            MockScenario::BudgetExceeded => {
                let tool_calls = vec![
                    AgentMessage::Assistant {
                        content: (0..250)
                            .map(|i| ContentBlock::ToolUse {
                                id: format!("tu_{i}"),
                                name: "Bash".into(),
                                input: serde_json::json!({"command": "echo hi"}),
                            })
                            .collect(),
                    },
                    AgentMessage::Result {
                        session_id: "mock-session".into(),
                        is_error: false,
                        duration_ms: 1000,
                        cost_usd: 0.0,
                        turns: 1,
                        usage: None,
                    },
                ];
                VecDeque::from(tool_calls)
            }
        };

        Self {
            scenario,
            queue,
            resumed: false,
        }
    }
}

#[async_trait]
impl MessageSource for MockSource {
    async fn next_message(&mut self) -> Result<Option<AgentMessage>> {
        if self.scenario == MockScenario::Timeout {
            tokio::time::sleep(Duration::from_secs(u64::MAX)).await;
        }
        Ok(self.queue.pop_front())
    }

    async fn send_tool_result(&mut self, _tool_use_id: &str, _payload: Value) -> Result<()> {
        if self.scenario == MockScenario::AskUserQuestion && !self.resumed {
            self.resumed = true;
            self.queue.push_back(AgentMessage::Assistant {
                content: vec![ContentBlock::Text {
                    text: "Using PostgreSQL with JWT tokens per the implementation spec.".into(),
                }],
            });
            self.queue.push_back(AgentMessage::Result {
                session_id: "mock-session".into(),
                is_error: false,
                duration_ms: 2000,
                cost_usd: 0.03,
                turns: 2,
                usage: None,
            });
        }
        Ok(())
    }

    async fn interrupt(&mut self) {
        self.queue.clear();
    }
}
