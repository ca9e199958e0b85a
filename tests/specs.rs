#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Workspace-level integration coverage: composes Sandbox, AgentDriver, and
//! Classifier end-to-end against a real local git repository, the one
//! literal scenario that doesn't fit inside any single crate's own test
//! suite. Per-crate suites already cover: claim race, backoff math, and
//! stale recovery (`sf-store`), the bidirectional/blocking ask-user
//! rendezvous (`sf-driver`), and the diff-size risk flag (`sf-classifier`).

use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sf_classifier::{classify, ClassifierConfig};
use sf_core::{AttemptStatus, FakeClock};
use sf_driver::{DriverConfig, LogSink, MockAgentDriver, MockScenario, SignalContext};
use sf_runner::StoreDriverCallbacks;
use sf_sandbox::Sandbox;
use sf_store::{InMemoryStore, SignalUpsert, Store};

fn init_upstream_repo(dir: &std::path::Path) {
    let run = |args: &[&str]| {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .expect("git available");
        assert!(status.success(), "git {args:?} failed");
    };

    run(&["init", "--initial-branch=main", "."]);
    run(&["config", "user.email", "upstream@example.com"]);
    run(&["config", "user.name", "Upstream"]);
    std::fs::write(dir.join("README.md"), "hello\n").expect("write file");
    run(&["add", "-A"]);
    run(&["commit", "-m", "initial"]);
}

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

#[derive(Default)]
struct RecordingLogSink {
    entries: Mutex<Vec<serde_json::Value>>,
}

#[async_trait]
impl LogSink for RecordingLogSink {
    async fn log(&self, _sequence_num: i64, entry: serde_json::Value, _is_final: bool) {
        self.entries.lock().expect("lock").push(entry);
    }
}

/// Sandbox → AgentDriver → Classifier composed end-to-end: a real clone,
/// the mock agent's `success` scenario touching the working tree, and the
/// classifier reading the resulting diff. Mirrors `AttemptRunner::
/// run_attempt`'s own sequencing (`crates/runner/src/runner.rs`) without
/// its network-dependent repo URL construction.
#[tokio::test]
async fn success_scenario_composes_into_a_success_classification_with_pr_url() {
    let upstream = tempfile::tempdir().expect("tempdir");
    init_upstream_repo(upstream.path());
    let repo_url = format!("file://{}", upstream.path().display());

    let base_dir = tempfile::tempdir().expect("tempdir");
    let sandbox = Sandbox::acquire(base_dir.path(), &repo_url, "main", None)
        .await
        .expect("acquire succeeds");

    std::fs::write(sandbox.path().join("README.md"), "hello\ndark mode\n").expect("write file");
    let status = Command::new("git")
        .args(["add", "-A"])
        .current_dir(sandbox.path())
        .status()
        .expect("git add available");
    assert!(status.success());

    let clock = FakeClock::new(chrono::Utc::now());
    let driver = MockAgentDriver::new(MockScenario::Success);
    let log_sink = RecordingLogSink::default();
    let execution_result = driver
        .execute(&clock, &signal(), &DriverConfig::default(), &log_sink, None)
        .await;
    assert!(execution_result.success);
    assert!(!log_sink.entries.lock().expect("lock").is_empty());

    let diff_stats = sandbox.get_diff_stats().await.expect("diff stats");
    assert_eq!(diff_stats.files_count(), 1);

    let classification = classify(&execution_result, &diff_stats, &ClassifierConfig::default());
    assert_eq!(classification.status, AttemptStatus::Success);
    assert!(classification.pr_url.as_deref().is_some_and(|url| url.contains("pull/7")));
    assert!(classification.risk_flags.is_empty());

    sandbox.release().await;
}

/// The same composition in blocking mode (no callbacks supplied): the
/// driver suspends and reports the raised question instead of resuming,
/// and the classifier maps that straight to NEEDS_HUMAN regardless of the
/// (here, empty) diff.
#[tokio::test]
async fn blocking_ask_user_scenario_composes_into_needs_human() {
    let upstream = tempfile::tempdir().expect("tempdir");
    init_upstream_repo(upstream.path());
    let repo_url = format!("file://{}", upstream.path().display());

    let base_dir = tempfile::tempdir().expect("tempdir");
    let sandbox = Sandbox::acquire(base_dir.path(), &repo_url, "main", None)
        .await
        .expect("acquire succeeds");

    let clock = FakeClock::new(chrono::Utc::now());
    let driver = MockAgentDriver::new(MockScenario::AskUserQuestion);
    let log_sink = RecordingLogSink::default();
    let execution_result = driver
        .execute(&clock, &signal(), &DriverConfig::default(), &log_sink, None)
        .await;
    assert!(execution_result.interrupted_for_questions);
    assert_eq!(execution_result.questions_asked.len(), 1);

    let diff_stats = sandbox.get_diff_stats().await.expect("diff stats");
    assert_eq!(diff_stats.files_count(), 0);

    let classification = classify(&execution_result, &diff_stats, &ClassifierConfig::default());
    assert_eq!(classification.status, AttemptStatus::NeedsHuman);
    assert_eq!(classification.questions.len(), 1);

    sandbox.release().await;
}

/// The bidirectional rendezvous, backed by a real `Store`: the mock agent
/// raises two questions in one `AskUserQuestion` call, `StoreDriverCallbacks`
/// persists each as a `Clarification` keyed `auq_0_0`/`auq_0_1`, and once
/// both rows are answered the driver resumes and finishes successfully.
#[tokio::test]
async fn bidirectional_ask_user_scenario_persists_two_clarifications_and_resumes() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let stored_signal = store
        .upsert_signal(SignalUpsert {
            source: "github".to_string(),
            repo: "acme/widgets".to_string(),
            issue_number: 7,
            external_id: None,
            title: "Add dark mode".to_string(),
            body: Some("Please add a dark theme.".to_string()),
            metadata: serde_json::Value::Null,
            project_fields: serde_json::Value::Null,
            priority: 0,
        })
        .await
        .expect("upsert signal");
    let attempt = store.create_attempt(stored_signal.id).await.expect("create attempt");
    let callbacks = Arc::new(StoreDriverCallbacks::new(store.clone(), attempt.id));

    let clock = FakeClock::new(chrono::Utc::now());
    let driver = MockAgentDriver::new(MockScenario::AskUserQuestion);
    let log_sink = RecordingLogSink::default();
    let config = DriverConfig {
        answer_poll_interval_seconds: 0,
        ..DriverConfig::default()
    };

    let answer_once_raised = async {
        let raised = loop {
            let raised = callbacks.raised_clarification_ids();
            if raised.len() == 2 {
                break raised;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        for (question_id, answer) in [("auq_0_0", "PostgreSQL"), ("auq_0_1", "Yes, JWT tokens")] {
            let (_, clarification_id) = raised
                .iter()
                .find(|(id, _)| id.as_str() == question_id)
                .expect("question id present");
            store
                .answer_clarification(*clarification_id, Some(answer.to_string()), false, None)
                .await
                .expect("answer clarification");
        }
        raised
    };

    let signal_context = signal();
    let (execution_result, raised) = tokio::join!(
        driver.execute(&clock, &signal_context, &config, &log_sink, Some(callbacks.clone())),
        answer_once_raised
    );

    assert!(execution_result.success);
    assert!(!execution_result.interrupted_for_questions);
    assert!(execution_result.final_text.contains("implementation spec"));

    let mut ids: Vec<&str> = raised.iter().map(|(id, _)| id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["auq_0_0", "auq_0_1"]);
}
