use std::sync::Arc;

use serde_json::{json, Value};
use sf_classifier::classify;
use sf_core::{AttemptStatus, Clock, Job, SignalState, SystemClock};
use sf_driver::{MockAgentDriver, PriorClarification, SignalContext, SubprocessAgentDriver};
use sf_sandbox::Sandbox;
use sf_store::Store;

use crate::callbacks::StoreDriverCallbacks;
use crate::config::RunnerConfig;
use crate::error::{Result, RunnerError};
use crate::log_sink::StoreLogSink;
use crate::payload::JobPayload;

/// Orchestrates one `run_attempt` / `retry_attempt` job end to end: claim to
/// terminal attempt/signal state. See spec.md §4.4 for the eight-step
/// sequence this follows.
pub struct AttemptRunner<C: Clock = SystemClock> {
    store: Arc<dyn Store>,
    config: RunnerConfig,
    clock: C,
}

impl AttemptRunner<SystemClock> {
    pub fn new(store: Arc<dyn Store>, config: RunnerConfig) -> Self {
        Self::with_clock(store, config, SystemClock)
    }
}

impl<C: Clock> AttemptRunner<C> {
    pub fn with_clock(store: Arc<dyn Store>, config: RunnerConfig, clock: C) -> Self {
        Self { store, config, clock }
    }

    /// Runs one attempt for `job` and returns the summary written to
    /// `Job.result`.
    pub async fn run_attempt(&self, job: &Job) -> Result<Value> {
        let payload: JobPayload = serde_json::from_value(job.payload.clone())?;

        let mut attempt = self
            .store
            .get_attempt(payload.attempt_id)
            .await?
            .ok_or(RunnerError::AttemptNotFound(payload.attempt_id))?;
        let signal = self
            .store
            .get_signal(payload.signal_id)
            .await?
            .ok_or(RunnerError::SignalNotFound(payload.signal_id))?;

        // Idempotent: a retried job re-executing this attempt id must not
        // clobber an already-set `started_at`.
        attempt.mark_running(self.clock.now());
        self.store.update_attempt(&attempt).await?;

        let repo_url = format!("https://github.com/{}.git", signal.repo);
        let sandbox = Sandbox::acquire(
            &self.config.worker_tmpdir_base,
            &repo_url,
            &self.config.base_branch,
            self.config.github_pat.as_deref(),
        )
        .await?;

        let signal_context = SignalContext {
            source: signal.source.clone(),
            repo: signal.repo.clone(),
            issue_number: Some(signal.issue_number),
            title: payload.title,
            body: payload.body,
            metadata: Some(signal.metadata.clone()),
            project_fields: Some(signal.project_fields.clone()),
            clarifications: payload
                .clarifications
                .into_iter()
                .map(|c| PriorClarification {
                    question: c.question,
                    answer: c.answer,
                })
                .collect(),
        };

        // Everything from here on holds `sandbox` by reference so the
        // directory is released on every exit path, not just the happy one.
        let outcome = self.drive_attempt(&sandbox, &mut attempt, &signal, signal_context).await;
        sandbox.release().await;
        let summary = outcome?;

        Ok(summary)
    }

    async fn drive_attempt(
        &self,
        sandbox: &Sandbox,
        attempt: &mut sf_core::Attempt,
        signal: &sf_core::Signal,
        signal_context: SignalContext,
    ) -> Result<Value> {
        let log_sink = StoreLogSink::new(self.store.clone(), attempt.id);
        let callbacks = Arc::new(StoreDriverCallbacks::new(self.store.clone(), attempt.id));

        let execution_result = match self.config.mock_scenario {
            Some(scenario) => {
                MockAgentDriver::new(scenario)
                    .execute(&self.clock, &signal_context, &self.config.driver, &log_sink, Some(callbacks))
                    .await
            }
            None => {
                let driver = SubprocessAgentDriver::new(&self.config.agent_command, self.config.agent_args.clone());
                driver
                    .execute(
                        &self.clock,
                        &signal_context,
                        sandbox.path(),
                        &self.config.driver,
                        &log_sink,
                        Some(callbacks),
                    )
                    .await?
            }
        };

        let diff_stats = sandbox.get_diff_stats().await?;
        let classification = classify(&execution_result, &diff_stats, &self.config.classifier);

        let summary = json!({
            "status": classification.status,
            "what_changed": classification.what_changed,
            "assumptions": classification.assumptions,
            "risk_flags": classification.risk_flags,
            "metrics": {
                "tool_calls": execution_result.metrics.tool_call_count,
                "turns": execution_result.metrics.turn_count,
                "commands_run": execution_result.metrics.commands_run,
                "cost_usd": execution_result.metrics.total_cost_usd,
            },
        });

        attempt.summary = summary.clone();
        attempt.runner_metadata = json!({
            "timed_out": execution_result.timed_out,
            "budget_exceeded": execution_result.budget_exceeded,
            "interrupted_for_questions": execution_result.interrupted_for_questions,
            "session_id": execution_result.output.get("session_id"),
        });
        attempt.error_message = classification.error_message.clone();

        if let Some(pr_url) = &classification.pr_url {
            attempt.pr_url = Some(pr_url.clone());
            attempt.pr_number = pr_number(pr_url);
            attempt.branch_name = Some(sandbox.branch_name().to_string());
        }

        let finished_at = self.clock.now();
        if classification.status == AttemptStatus::NeedsHuman {
            attempt.mark_needs_human(finished_at);
        } else {
            attempt.mark_terminal(classification.status, finished_at);
        }
        self.store.update_attempt(attempt).await?;

        match classification.status {
            AttemptStatus::NeedsHuman => {
                self.store.set_signal_state(signal.id, SignalState::Blocked).await?;
            }
            AttemptStatus::Success => {
                self.store.set_signal_state(signal.id, SignalState::Completed).await?;
            }
            AttemptStatus::Failed | AttemptStatus::Noop => {}
            AttemptStatus::Pending | AttemptStatus::Running => unreachable!("classify never returns a non-terminal, non-needs-human status"),
        }

        Ok(summary)
    }
}

/// Extract the trailing `/pull/<n>` segment of a GitHub PR URL.
fn pr_number(pr_url: &str) -> Option<i32> {
    pr_url.rsplit('/').next()?.parse().ok()
}
