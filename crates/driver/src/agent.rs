use std::sync::Arc;

use sf_core::Clock;
use tokio_util::sync::CancellationToken;

use crate::callbacks::{DriverCallbacks, LogSink};
use crate::config::DriverConfig;
use crate::context::SignalContext;
use crate::driver::run;
use crate::error::Result;
use crate::mock::{MockScenario, MockSource};
use crate::result::ExecutionResult;
use crate::source::SubprocessSource;

/// Spawns the real agent subprocess and exchanges the tagged message
/// protocol with it over stdio.
pub struct SubprocessAgentDriver {
    command: String,
    args: Vec<String>,
    cancel: CancellationToken,
}

impl SubprocessAgentDriver {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            cancel: CancellationToken::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn execute<C: Clock>(
        &self,
        clock: &C,
        signal: &SignalContext,
        cwd: &std::path::Path,
        config: &DriverConfig,
        log_sink: &dyn LogSink,
        callbacks: Option<Arc<dyn DriverCallbacks>>,
    ) -> Result<ExecutionResult> {
        let prompt = crate::prompt::build_prompt(signal);
        let source = SubprocessSource::spawn(&self.command, &self.args, cwd, &prompt).await?;
        Ok(run(
            source,
            clock,
            signal,
            config,
            log_sink,
            callbacks,
            Some(self.cancel.clone()),
        )
        .await)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Drives a scripted [`MockScenario`] instead of a real subprocess, for
/// deterministic tests of the rendezvous and budget logic.
pub struct MockAgentDriver {
    scenario: MockScenario,
    cancel: CancellationToken,
}

impl MockAgentDriver {
    pub fn new(scenario: MockScenario) -> Self {
        Self {
            scenario,
            cancel: CancellationToken::new(),
        }
    }

    pub async fn execute<C: Clock>(
        &self,
        clock: &C,
        signal: &SignalContext,
        config: &DriverConfig,
        log_sink: &dyn LogSink,
        callbacks: Option<Arc<dyn DriverCallbacks>>,
    ) -> ExecutionResult {
        let source = MockSource::new(self.scenario);
        run(
            source,
            clock,
            signal,
            config,
            log_sink,
            callbacks,
            Some(self.cancel.clone()),
        )
        .await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
