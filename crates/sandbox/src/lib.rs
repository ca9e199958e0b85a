//! Scoped per-attempt working trees with guaranteed release.
//!
//! A [`Sandbox`] owns its directory tree exclusively; no two attempts
//! share a workspace. It is a filesystem and VCS isolation boundary
//! only — it does not virtualise CPU, memory, or network.

mod diff;
mod error;
mod sandbox;
mod subprocess;

pub use diff::DiffStats;
pub use error::{Result, SandboxError};
pub use sandbox::Sandbox;
