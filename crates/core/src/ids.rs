// SPDX-License-Identifier: MIT

//! Typed identifiers for every entity in the domain model.
//!
//! Each entity shares the same underlying representation (a `Uuid`) but gets
//! its own type so a `JobId` can't be passed where an `AttemptId` is
//! expected.

crate::define_id! {
    /// Identifies an inbound signal (issue, PR comment, webhook event, ...).
    pub struct SignalId;
}

crate::define_id! {
    /// Identifies one execution attempt against a signal.
    pub struct AttemptId;
}

crate::define_id! {
    /// Identifies a single clarification question raised during an attempt.
    pub struct ClarificationId;
}

crate::define_id! {
    /// Identifies a unit of queued work.
    pub struct JobId;
}

crate::define_id! {
    /// Identifies a piece of attempt output (log chunk, diff, artifact file).
    pub struct ArtifactId;
}
