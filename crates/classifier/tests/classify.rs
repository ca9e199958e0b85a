#![allow(clippy::expect_used, clippy::unwrap_used)]

use serde_json::json;
use sf_classifier::{classify, ClassifierConfig};
use sf_core::{AskedQuestions, AttemptStatus, QuestionEntry};
use sf_driver::ExecutionResult;
use sf_sandbox::DiffStats;

fn base_result() -> ExecutionResult {
    ExecutionResult {
        success: true,
        output: json!({}),
        metrics: Default::default(),
        final_text: String::new(),
        prompt: "do the thing".to_string(),
        timed_out: false,
        budget_exceeded: false,
        questions_asked: Vec::new(),
        interrupted_for_questions: false,
        error_message: None,
    }
}

fn diff_with(files: &[&str], added: u64, deleted: u64) -> DiffStats {
    DiffStats {
        lines_added: added,
        lines_deleted: deleted,
        files_touched: files.iter().map(|s| s.to_string()).collect(),
    }
}

#[test]
fn timeout_takes_priority_over_everything_else() {
    let mut result = base_result();
    result.timed_out = true;
    result.success = false;
    let classification = classify(&result, &DiffStats::default(), &ClassifierConfig::default());
    assert_eq!(classification.status, AttemptStatus::Failed);
    assert_eq!(classification.risk_flags, vec!["TIMEOUT".to_string()]);
}

#[test]
fn budget_exceeded_takes_priority_over_success() {
    let mut result = base_result();
    result.budget_exceeded = true;
    let classification = classify(&result, &DiffStats::default(), &ClassifierConfig::default());
    assert_eq!(classification.status, AttemptStatus::Failed);
    assert_eq!(classification.risk_flags, vec!["BUDGET_EXCEEDED".to_string()]);
}

#[test]
fn explicit_questions_yield_needs_human() {
    let mut result = base_result();
    result.questions_asked = vec![AskedQuestions {
        id: "tu_1".to_string(),
        questions: vec![QuestionEntry {
            question: "Which package manager?".to_string(),
            header: None,
            options: Vec::new(),
            multi_select: false,
        }],
    }];
    let classification = classify(&result, &DiffStats::default(), &ClassifierConfig::default());
    assert_eq!(classification.status, AttemptStatus::NeedsHuman);
    assert_eq!(classification.questions.len(), 1);
}

#[test]
fn implicit_stuck_heuristic_fires_when_no_files_touched() {
    let mut result = base_result();
    result.final_text = "I'm not sure which repository to modify here.".to_string();
    let classification = classify(&result, &DiffStats::default(), &ClassifierConfig::default());
    assert_eq!(classification.status, AttemptStatus::NeedsHuman);
    assert_eq!(classification.questions.len(), 1);
    assert_eq!(classification.questions[0].id, "implicit_stuck");
}

#[test]
fn implicit_stuck_heuristic_does_not_fire_when_files_were_touched() {
    let mut result = base_result();
    result.final_text = "I'm not sure which repository to modify here.".to_string();
    let diff = diff_with(&["src/main.rs"], 1, 0);
    let classification = classify(&result, &diff, &ClassifierConfig::default());
    assert_eq!(classification.status, AttemptStatus::Success);
}

#[test]
fn execution_error_maps_to_failed() {
    let mut result = base_result();
    result.success = false;
    result.error_message = Some("agent crashed".to_string());
    let classification = classify(&result, &DiffStats::default(), &ClassifierConfig::default());
    assert_eq!(classification.status, AttemptStatus::Failed);
    assert_eq!(classification.risk_flags, vec!["EXECUTION_ERROR".to_string()]);
    assert_eq!(
        classification.error_message,
        Some("Execution failed: agent crashed".to_string())
    );
}

#[test]
fn success_with_pr_url_extracts_it() {
    let mut result = base_result();
    result.final_text = "Opened https://github.com/acme/widgets/pull/7 for review.".to_string();
    let diff = diff_with(&["src/lib.rs"], 5, 2);
    let classification = classify(&result, &diff, &ClassifierConfig::default());
    assert_eq!(classification.status, AttemptStatus::Success);
    assert_eq!(
        classification.pr_url,
        Some("https://github.com/acme/widgets/pull/7".to_string())
    );
}

#[test]
fn success_without_files_touched_is_noop() {
    let result = base_result();
    let classification = classify(&result, &DiffStats::default(), &ClassifierConfig::default());
    assert_eq!(classification.status, AttemptStatus::Noop);
}

#[test]
fn diff_size_exceeded_flags_risk_but_stays_success() {
    let mut result = base_result();
    result.final_text = "https://github.com/acme/widgets/pull/9".to_string();
    let diff = diff_with(&["src/lib.rs"], 700, 200);
    let config = ClassifierConfig::default();
    let classification = classify(&result, &diff, &config);
    assert_eq!(classification.status, AttemptStatus::Success);
    assert!(classification
        .risk_flags
        .contains(&"DIFF_SIZE_EXCEEDED:900".to_string()));
}

#[test]
fn files_exceeded_flags_risk() {
    let mut result = base_result();
    result.final_text = "https://github.com/acme/widgets/pull/9".to_string();
    let files: Vec<String> = (0..41).map(|i| format!("file{i}.rs")).collect();
    let diff = DiffStats {
        lines_added: 41,
        lines_deleted: 0,
        files_touched: files,
    };
    let classification = classify(&result, &diff, &ClassifierConfig::default());
    assert!(classification
        .risk_flags
        .contains(&"FILES_EXCEEDED:41".to_string()));
}

#[test]
fn assumptions_are_extracted_on_success() {
    let mut result = base_result();
    result.final_text =
        "I'm assuming the default branch is main.\nhttps://github.com/acme/widgets/pull/1".to_string();
    let diff = diff_with(&["src/lib.rs"], 1, 0);
    let classification = classify(&result, &diff, &ClassifierConfig::default());
    assert_eq!(classification.assumptions, vec!["the default branch is main.".to_string()]);
}
