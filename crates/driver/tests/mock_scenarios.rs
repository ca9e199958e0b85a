#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sf_core::{AskedQuestions, ClarificationId, FakeClock};
use sf_driver::{DriverCallbacks, DriverConfig, LogSink, MockAgentDriver, MockScenario, SignalContext};

fn signal() -> SignalContext {
    SignalContext {
        source: "github".to_string(),
        repo: "acme/widgets".to_string(),
        issue_number: Some(7),
        title: "Add dark mode".to_string(),
        body: Some("Please add a dark theme.".to_string()),
        metadata: None,
        project_fields: None,
        clarifications: Vec::new(),
    }
}

fn fast_config() -> DriverConfig {
    DriverConfig {
        timeout_seconds: 2,
        answer_poll_interval_seconds: 0,
        ..DriverConfig::default()
    }
}

#[derive(Default)]
struct RecordingLogSink {
    entries: Mutex<Vec<(i64, bool)>>,
}

#[async_trait]
impl LogSink for RecordingLogSink {
    async fn log(&self, sequence_num: i64, _entry: serde_json::Value, is_final: bool) {
        self.entries.lock().expect("lock").push((sequence_num, is_final));
    }
}

/// Answers immediately on first poll, recording the ids the driver assigned.
#[derive(Default)]
struct ImmediateAnswers {
    asked: Mutex<Vec<AskedQuestions>>,
}

#[async_trait]
impl DriverCallbacks for ImmediateAnswers {
    async fn on_questions_asked(
        &self,
        questions: Vec<AskedQuestions>,
    ) -> HashMap<String, Vec<ClarificationId>> {
        self.asked.lock().expect("lock").extend(questions);
        HashMap::new()
    }

    async fn poll_for_answers(&self) -> Option<HashMap<String, String>> {
        let mut answers = HashMap::new();
        answers.insert("auq_0_0".to_string(), "PostgreSQL".to_string());
        answers.insert("auq_0_1".to_string(), "Yes, JWT tokens".to_string());
        Some(answers)
    }
}

#[tokio::test]
async fn success_scenario_yields_pr_url_and_final_log() {
    let clock = FakeClock::new(chrono::Utc::now());
    let driver = MockAgentDriver::new(MockScenario::Success);
    let log_sink = RecordingLogSink::default();

    let result = driver
        .execute(&clock, &signal(), &fast_config(), &log_sink, None)
        .await;

    assert!(result.success);
    assert!(!result.timed_out);
    assert!(!result.budget_exceeded);
    assert!(result.final_text.contains("pull/7"));
    assert_eq!(result.metrics.commands_run, vec!["git status"]);

    let entries = log_sink.entries.lock().expect("lock");
    assert!(entries.iter().any(|(_, is_final)| *is_final));
}

#[tokio::test]
async fn ask_user_bidirectional_resumes_after_answers() {
    let clock = FakeClock::new(chrono::Utc::now());
    let driver = MockAgentDriver::new(MockScenario::AskUserQuestion);
    let log_sink = RecordingLogSink::default();
    let callbacks = Arc::new(ImmediateAnswers::default());

    let result = driver
        .execute(&clock, &signal(), &fast_config(), &log_sink, Some(callbacks.clone()))
        .await;

    assert!(result.success);
    assert!(!result.interrupted_for_questions);
    assert!(result.questions_asked.is_empty());
    assert!(result.final_text.contains("implementation spec"));

    let asked = callbacks.asked.lock().expect("lock");
    assert_eq!(asked.len(), 1);
    assert_eq!(asked[0].id, "auq_0");
    assert_eq!(asked[0].questions.len(), 2);
}

#[tokio::test]
async fn ask_user_blocking_mode_interrupts_and_records_questions() {
    let clock = FakeClock::new(chrono::Utc::now());
    let driver = MockAgentDriver::new(MockScenario::AskUserQuestion);
    let log_sink = RecordingLogSink::default();

    let result = driver
        .execute(&clock, &signal(), &fast_config(), &log_sink, None)
        .await;

    assert!(result.interrupted_for_questions);
    assert_eq!(result.questions_asked.len(), 1);
    assert_eq!(result.questions_asked[0].id, "auq_0");
    assert_eq!(result.questions_asked[0].questions.len(), 2);
    assert_eq!(
        result.questions_asked[0].questions[0].question,
        "Which database should this use?"
    );
}

#[tokio::test]
async fn execution_error_scenario_fails_classification() {
    let clock = FakeClock::new(chrono::Utc::now());
    let driver = MockAgentDriver::new(MockScenario::ExecutionError);
    let log_sink = RecordingLogSink::default();

    let result = driver
        .execute(&clock, &signal(), &fast_config(), &log_sink, None)
        .await;

    assert!(!result.success);
    assert!(!result.timed_out);
}

#[tokio::test]
async fn budget_exceeded_scenario_stops_the_run() {
    let clock = FakeClock::new(chrono::Utc::now());
    let driver = MockAgentDriver::new(MockScenario::BudgetExceeded);
    let log_sink = RecordingLogSink::default();

    let result = driver
        .execute(&clock, &signal(), &fast_config(), &log_sink, None)
        .await;

    assert!(result.budget_exceeded);
    assert!(!result.success);
    assert!(result.metrics.tool_call_count >= DriverConfig::default().max_tool_calls);
}

#[tokio::test]
async fn timeout_scenario_trips_wall_clock_budget() {
    let clock = FakeClock::new(chrono::Utc::now());
    let driver = MockAgentDriver::new(MockScenario::Timeout);
    let log_sink = RecordingLogSink::default();
    let config = DriverConfig {
        timeout_seconds: 1,
        ..fast_config()
    };

    let result = driver.execute(&clock, &signal(), &config, &log_sink, None).await;

    assert!(result.timed_out);
    assert!(!result.success);
}
