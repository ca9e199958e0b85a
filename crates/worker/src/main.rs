#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod error;

use std::sync::Arc;
use std::time::Duration;

use sf_core::JobType;
use sf_runner::{AttemptRunner, RunnerConfig};
use sf_store::{PostgresStore, Store};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

/// Base backoff unit for `fail`'s exponential schedule (spec.md §4.1).
const RETRY_DELAY_SECONDS: i64 = 60;

const WORKER_ID_PREFIX: &str = "sf-worker";

#[tokio::main]
async fn main() -> error::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let config = Config::from_env()?;
    let worker_id = format!("{WORKER_ID_PREFIX}-{}", std::process::id());

    tracing::info!(
        worker_id,
        poll_interval_seconds = config.worker_poll_interval_seconds,
        "worker starting"
    );

    let store = PostgresStore::connect(&config.database_url).await?;
    store.migrate().await?;
    let store: Arc<dyn Store> = Arc::new(store);

    let runner = AttemptRunner::new(store.clone(), runner_config(&config));

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!(worker_id, "shutdown signal received, stopping");
                break;
            }
            () = process_next_job(&store, &runner, &worker_id, &config) => {}
        }
    }

    Ok(())
}

async fn process_next_job(
    store: &Arc<dyn Store>,
    runner: &AttemptRunner,
    worker_id: &str,
    config: &Config,
) {
    let recovered = store
        .recover_stale(config.stale_job_threshold_seconds)
        .await
        .unwrap_or_else(|err| {
            tracing::error!(%err, "stale-recovery sweep failed");
            0
        });
    if recovered > 0 {
        tracing::warn!(recovered, "reclaimed stale jobs");
    }

    let job = match store
        .claim(&[JobType::RunAttempt, JobType::RetryAttempt], worker_id)
        .await
    {
        Ok(Some(job)) => job,
        Ok(None) => {
            tokio::time::sleep(Duration::from_secs(config.worker_poll_interval_seconds)).await;
            return;
        }
        Err(err) => {
            tracing::error!(%err, "claim failed");
            tokio::time::sleep(Duration::from_secs(config.worker_poll_interval_seconds)).await;
            return;
        }
    };

    let job_id = job.id;
    tracing::info!(%job_id, job_type = ?job.job_type, "claimed job");

    if let Err(err) = store.start(job_id).await {
        tracing::error!(%job_id, %err, "failed to mark job running");
        return;
    }

    match runner.run_attempt(&job).await {
        Ok(result) => {
            if let Err(err) = store.complete(job_id, Some(result)).await {
                tracing::error!(%job_id, %err, "failed to mark job complete");
            } else {
                tracing::info!(%job_id, "job complete");
            }
        }
        Err(err) => {
            tracing::error!(%job_id, %err, "job failed");
            if let Err(store_err) = store
                .fail(job_id, &err.to_string(), RETRY_DELAY_SECONDS)
                .await
            {
                tracing::error!(%job_id, %store_err, "failed to record job failure");
            }
        }
    }
}

fn runner_config(config: &Config) -> RunnerConfig {
    let mut runner_config = RunnerConfig {
        worker_tmpdir_base: config.worker_tmpdir_base.clone(),
        github_pat: config.github_pat.clone(),
        agent_command: config.claude_code_path.clone(),
        mock_scenario: config.claude_mock_scenario,
        ..RunnerConfig::default()
    };
    runner_config.driver.max_turns = config.claude_default_max_turns;
    runner_config.driver.timeout_seconds = config.claude_default_timeout_seconds;
    runner_config.driver.max_tool_calls = config.max_tool_calls;
    runner_config
}

/// Resolves once SIGTERM or Ctrl-C is received, mirroring `runner.py`'s
/// `_handle_shutdown` signal handlers.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => tracing::error!(%err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
