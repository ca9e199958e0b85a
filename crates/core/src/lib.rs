// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sf-core: shared domain types for the signal → attempt control plane.
//!
//! Every other crate in this workspace depends on `sf-core` for the entity
//! structs, typed ids, and the `Clock` abstraction; none of them reach for
//! `chrono::Utc::now()` or a bare `Uuid` directly.

pub mod artifact;
pub mod attempt;
pub mod clarification;
pub mod clock;
pub mod ids;
pub mod job;
#[macro_use]
pub mod macros;
pub mod question;
pub mod signal;

pub use artifact::{Artifact, ArtifactType};
pub use attempt::{Attempt, AttemptStatus};
pub use clarification::Clarification;
pub use clock::{Clock, FakeClock, SystemClock};
pub use ids::{ArtifactId, AttemptId, ClarificationId, JobId, SignalId};
pub use job::{Job, JobStatus, JobType};
pub use question::{AskedQuestions, QuestionEntry, QuestionOption};
pub use signal::{Signal, SignalState};
