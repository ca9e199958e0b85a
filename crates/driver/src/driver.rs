use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use sf_core::{AskedQuestions, Clock, QuestionEntry};
use tokio_util::sync::CancellationToken;

use crate::callbacks::{DriverCallbacks, LogSink};
use crate::config::DriverConfig;
use crate::context::SignalContext;
use crate::message::{AgentMessage, ContentBlock, ASK_USER_TOOL};
use crate::metrics::ExecutionMetrics;
use crate::prompt::build_prompt;
use crate::result::ExecutionResult;
use crate::source::MessageSource;

const TOOL_RESULT_TRUNCATE_CHARS: usize = 5_000;

/// Drive `source` to completion, enforcing budgets and handling the
/// ask-user rendezvous, logging every entry through `log_sink`.
///
/// Shared by [`crate::SubprocessAgentDriver`] and [`crate::MockAgentDriver`]
/// so the rendezvous and budget logic is written once.
pub async fn run<S: MessageSource, C: Clock>(
    mut source: S,
    clock: &C,
    signal: &SignalContext,
    config: &DriverConfig,
    log_sink: &dyn LogSink,
    callbacks: Option<Arc<dyn DriverCallbacks>>,
    cancel: Option<CancellationToken>,
) -> ExecutionResult {
    let prompt = build_prompt(signal);
    log_sink
        .log(
            0,
            json!({"type": "prompt", "timestamp": clock.now(), "prompt": &prompt}),
            false,
        )
        .await;

    let mut sequence_num: i64 = 0;
    let mut ask_user_count: usize = 0;
    let mut metrics = ExecutionMetrics::default();
    let mut final_text_parts: Vec<String> = Vec::new();
    let mut questions_asked: Vec<AskedQuestions> = Vec::new();
    let mut budget_exceeded = false;
    let mut interrupted_for_questions = false;
    let mut error_message: Option<String> = None;
    let mut result_is_error: Option<bool> = None;
    let mut output = serde_json::Map::new();

    let timeout_duration = Duration::from_secs(config.timeout_seconds);
    let timed_out = tokio::time::timeout(timeout_duration, async {
        'outer: loop {
            if let Some(cancel) = &cancel {
                if cancel.is_cancelled() {
                    source.interrupt().await;
                    break;
                }
            }

            match source.next_message().await {
                Ok(Some(AgentMessage::System { content })) => {
                    sequence_num += 1;
                    log_sink
                        .log(
                            sequence_num,
                            json!({"type": "system", "timestamp": clock.now(), "content": content}),
                            false,
                        )
                        .await;
                }
                Ok(Some(AgentMessage::Assistant { content })) => {
                    metrics.turn_count += 1;
                    let mut text_parts = Vec::new();
                    let mut tool_calls = Vec::new();
                    let mut pending_ask_user: Option<(String, Vec<QuestionEntry>)> = None;

                    for block in content {
                        match block {
                            ContentBlock::Text { text } => {
                                final_text_parts.push(text.clone());
                                text_parts.push(text);
                            }
                            ContentBlock::ToolUse { id, name, input } => {
                                metrics.tool_call_count += 1;
                                if name == "Bash" {
                                    if let Some(cmd) = input.get("command").and_then(Value::as_str) {
                                        metrics.commands_run.push(cmd.to_string());
                                    }
                                }
                                if name == ASK_USER_TOOL {
                                    let questions: Vec<QuestionEntry> = input
                                        .get("questions")
                                        .cloned()
                                        .and_then(|v| serde_json::from_value(v).ok())
                                        .unwrap_or_default();
                                    pending_ask_user = Some((id.clone(), questions));
                                }
                                tool_calls.push(json!({"id": id, "name": name, "input": input}));
                                if metrics.tool_call_count >= config.max_tool_calls {
                                    budget_exceeded = true;
                                    source.interrupt().await;
                                }
                            }
                            ContentBlock::ToolResult { .. } => {}
                        }
                        if budget_exceeded {
                            break;
                        }
                    }

                    if pending_ask_user.is_none() {
                        sequence_num += 1;
                        log_sink
                            .log(
                                sequence_num,
                                json!({
                                    "type": "assistant",
                                    "timestamp": clock.now(),
                                    "turn": metrics.turn_count,
                                    "text": if text_parts.is_empty() { None } else { Some(text_parts.join("\n")) },
                                    "tool_calls": tool_calls,
                                }),
                                false,
                            )
                            .await;
                    }

                    if let Some((tool_id, questions)) = pending_ask_user {
                        // The driver, not the agent, owns question ids: a stable
                        // `auq_<index>` per ask-user invocation this run. The
                        // agent's own ToolUse block id (`tool_id`) is kept only
                        // to correlate the eventual `send_tool_result` call.
                        let auq_id = format!("auq_{ask_user_count}");
                        ask_user_count += 1;

                        match &callbacks {
                            Some(cb) => {
                                sequence_num += 1;
                                log_sink
                                    .log(
                                        sequence_num,
                                        json!({
                                            "type": "event",
                                            "timestamp": clock.now(),
                                            "event": "waiting_for_human",
                                            "questions": &questions,
                                        }),
                                        false,
                                    )
                                    .await;

                                let asked = AskedQuestions {
                                    id: auq_id.clone(),
                                    questions: questions.clone(),
                                };
                                cb.on_questions_asked(vec![asked]).await;

                                let answers = loop {
                                    tokio::time::sleep(Duration::from_secs(
                                        config.answer_poll_interval_seconds,
                                    ))
                                    .await;
                                    if let Some(answers) = cb.poll_for_answers().await {
                                        break answers;
                                    }
                                };

                                sequence_num += 1;
                                log_sink
                                    .log(
                                        sequence_num,
                                        json!({
                                            "type": "event",
                                            "timestamp": clock.now(),
                                            "event": "human_answered",
                                            "answers": &answers,
                                        }),
                                        false,
                                    )
                                    .await;

                                let mut formatted: HashMap<String, String> = HashMap::new();
                                for (i, q) in questions.iter().enumerate() {
                                    let question_id = format!("{auq_id}_{i}");
                                    if let Some(answer) = answers.get(&question_id) {
                                        formatted.insert(q.question.clone(), answer.clone());
                                    }
                                }

                                if let Err(e) = source
                                    .send_tool_result(
                                        &tool_id,
                                        json!({"questions": &questions, "answers": formatted}),
                                    )
                                    .await
                                {
                                    error_message = Some(e.to_string());
                                    break 'outer;
                                }
                            }
                            None => {
                                interrupted_for_questions = true;
                                questions_asked.push(AskedQuestions {
                                    id: auq_id,
                                    questions,
                                });
                                source.interrupt().await;
                            }
                        }
                    }

                    if budget_exceeded || interrupted_for_questions {
                        break;
                    }
                }
                Ok(Some(AgentMessage::User { content })) => {
                    let tool_results: Vec<Value> = content
                        .into_iter()
                        .filter_map(|block| match block {
                            ContentBlock::ToolResult {
                                tool_use_id,
                                content,
                            } => {
                                let content = truncate_tool_result(content);
                                Some(json!({"tool_use_id": tool_use_id, "content": content}))
                            }
                            _ => None,
                        })
                        .collect();

                    if !tool_results.is_empty() {
                        sequence_num += 1;
                        log_sink
                            .log(
                                sequence_num,
                                json!({
                                    "type": "tool_result",
                                    "timestamp": clock.now(),
                                    "tool_results": tool_results,
                                }),
                                false,
                            )
                            .await;
                    }
                }
                Ok(Some(AgentMessage::Result {
                    session_id,
                    is_error,
                    duration_ms,
                    cost_usd,
                    turns,
                    usage,
                })) => {
                    result_is_error = Some(is_error);
                    metrics.total_cost_usd = cost_usd;
                    metrics.turn_count = metrics.turn_count.max(turns);
                    if let Some(usage) = &usage {
                        metrics.input_tokens =
                            usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0);
                        metrics.output_tokens =
                            usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0);
                        metrics.cache_read_tokens = usage
                            .get("cache_read_input_tokens")
                            .and_then(Value::as_u64)
                            .unwrap_or(0);
                        metrics.cache_creation_tokens = usage
                            .get("cache_creation_input_tokens")
                            .and_then(Value::as_u64)
                            .unwrap_or(0);
                    }

                    output.insert("session_id".to_string(), json!(session_id));
                    output.insert("is_error".to_string(), json!(is_error));
                    output.insert("duration_ms".to_string(), json!(duration_ms));

                    sequence_num += 1;
                    log_sink
                        .log(
                            sequence_num,
                            json!({
                                "type": "result",
                                "timestamp": clock.now(),
                                "session_id": session_id,
                                "is_error": is_error,
                                "duration_ms": duration_ms,
                                "cost_usd": cost_usd,
                                "turns": turns,
                                "usage": usage,
                            }),
                            true,
                        )
                        .await;
                    break;
                }
                Ok(None) => break,
                Err(e) => {
                    error_message = Some(e.to_string());
                    break;
                }
            }
        }
    })
    .await
    .is_err();

    output.insert("final_text".to_string(), json!(final_text_parts.join("\n")));
    if let Some(error) = &error_message {
        output.insert("error".to_string(), json!(error));
    }

    let success = ExecutionResult::compute_success(timed_out, budget_exceeded, &error_message, result_is_error);

    ExecutionResult {
        success,
        output: Value::Object(output),
        metrics,
        final_text: final_text_parts.join("\n"),
        prompt,
        timed_out,
        budget_exceeded,
        questions_asked,
        interrupted_for_questions,
        error_message,
    }
}

fn truncate_tool_result(content: Value) -> Value {
    if let Value::String(s) = &content {
        if s.len() > TOOL_RESULT_TRUNCATE_CHARS {
            let mut truncated = s.chars().take(TOOL_RESULT_TRUNCATE_CHARS).collect::<String>();
            truncated.push_str("\n... (truncated)");
            return Value::String(truncated);
        }
    }
    content
}
