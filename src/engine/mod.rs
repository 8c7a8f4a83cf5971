// src/engine/mod.rs

//! Run orchestration.
//!
//! The pure decisions (precondition checks, abort policy, exit code) live in
//! [`core`]; [`orchestrator`] is the async shell that drives the executor,
//! the per-stack lifecycles and the event sink; [`session`] holds the
//! run-scoped data.

pub mod core;
pub mod orchestrator;
pub mod session;

pub use core::{validate_stacks, AbortReason, MISSING_ID_MESSAGE};
pub use orchestrator::{Orchestrator, RunOptions, RunReport};
pub use session::{derive_run_id, RunOutput, RunSession, StackExecution, RUN_ID_ENV_VARS};
