use sf_core::{AskedQuestions, AttemptStatus};
use sf_driver::ExecutionResult;
use sf_sandbox::DiffStats;

use crate::classification::{synthetic_question, Classification};
use crate::config::ClassifierConfig;
use crate::patterns::{detect_stuck_categories, extract_assumptions, extract_pr_url};

/// Pure decision tree over `(ExecutionResult, DiffStats)`. See
/// `sf-classifier`'s crate docs for the full ordering.
pub fn classify(execution_result: &ExecutionResult, diff_stats: &DiffStats, config: &ClassifierConfig) -> Classification {
    if execution_result.timed_out {
        return Classification::failed("Execution timed out", "TIMEOUT");
    }

    if execution_result.budget_exceeded {
        return Classification::failed("Tool call budget exceeded", "BUDGET_EXCEEDED");
    }

    let all_text = execution_result.final_text.as_str();

    if !execution_result.questions_asked.is_empty() {
        return Classification::needs_human(
            execution_result.questions_asked.clone(),
            extract_assumptions(all_text),
            diff_stats.files_touched.clone(),
        );
    }

    if diff_stats.files_count() == 0 && execution_result.success {
        let categories = detect_stuck_categories(all_text);
        if !categories.is_empty() {
            let questions: Vec<_> = categories.iter().map(|c| synthetic_question(c)).collect();
            return Classification::needs_human(
                vec![AskedQuestions {
                    id: "implicit_stuck".to_string(),
                    questions,
                }],
                extract_assumptions(all_text),
                Vec::new(),
            );
        }
    }

    if !execution_result.success {
        let error = execution_result
            .error_message
            .clone()
            .or_else(|| {
                execution_result
                    .output
                    .get("error")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Unknown error".to_string());
        return Classification {
            status: AttemptStatus::Failed,
            questions: Vec::new(),
            assumptions: Vec::new(),
            risk_flags: vec!["EXECUTION_ERROR".to_string()],
            pr_url: None,
            what_changed: Vec::new(),
            error_message: Some(format!("Execution failed: {error}")),
        };
    }

    let pr_url = extract_pr_url(all_text);

    let mut risk_flags = Vec::new();
    let total_lines = diff_stats.total_lines();
    if total_lines > config.max_diff_lines {
        risk_flags.push(format!("DIFF_SIZE_EXCEEDED:{total_lines}"));
    }
    let files_count = diff_stats.files_count();
    if files_count > config.max_files_touched {
        risk_flags.push(format!("FILES_EXCEEDED:{files_count}"));
    }

    let status = if pr_url.is_some() {
        AttemptStatus::Success
    } else if files_count == 0 {
        AttemptStatus::Noop
    } else {
        AttemptStatus::Success
    };

    Classification {
        status,
        questions: Vec::new(),
        assumptions: extract_assumptions(all_text),
        risk_flags,
        pr_url,
        what_changed: diff_stats.files_touched.clone(),
        error_message: None,
    }
}
