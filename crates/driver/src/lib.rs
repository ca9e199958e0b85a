#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Spawns the external agent, exchanges the tagged message protocol with
//! it, enforces execution budgets, and suspends on ask-user rendezvous
//! until clarifications are answered.

mod agent;
mod callbacks;
mod config;
mod context;
mod driver;
mod error;
mod message;
mod metrics;
mod mock;
mod prompt;
mod result;
mod source;

pub use agent::{MockAgentDriver, SubprocessAgentDriver};
pub use callbacks::{DriverCallbacks, LogSink};
pub use config::DriverConfig;
pub use context::{PriorClarification, SignalContext};
pub use error::{DriverError, Result};
pub use message::{AgentMessage, ContentBlock, ASK_USER_TOOL};
pub use metrics::ExecutionMetrics;
pub use mock::MockScenario;
pub use prompt::build_prompt;
pub use result::ExecutionResult;
pub use source::{MessageSource, SubprocessSource};
