#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sf-runner: glues Store, Sandbox, AgentDriver, and Classifier into the
//! per-attempt orchestration described in spec.md §4.4.

mod callbacks;
mod config;
mod error;
mod log_sink;
mod payload;
mod runner;

pub use callbacks::StoreDriverCallbacks;
pub use config::RunnerConfig;
pub use error::{Result, RunnerError};
pub use log_sink::StoreLogSink;
pub use payload::{JobPayload, PayloadClarification};
pub use runner::AttemptRunner;
