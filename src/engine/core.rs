// src/engine/core.rs

//! Pure run decisions.
//!
//! Everything here is synchronous and deterministic: precondition checks,
//! what to do after a stack reaches a terminal state, and the aggregate exit
//! code. The async shell in [`super::orchestrator`] only applies these
//! decisions.

use std::collections::HashMap;

use crate::cloud::ReportSummary;
use crate::errors::{Result, StackrunError};
use crate::stack::Stack;
use crate::types::{FailurePolicy, LifecycleState, ReportFailureMode};

/// Greppable part of the error raised when sync is requested for stacks
/// without identifiers.
pub const MISSING_ID_MESSAGE: &str =
    "--cloud-sync-deployment flag requires that selected stacks contain an ID field";

/// Why stacks after the current one were never started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// An interruption was received.
    Canceled,
    /// A stack failed and the failure policy is `abort`.
    StackFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Abort(AbortReason),
}

/// Check the whole selection before anything runs.
///
/// With deployment sync every stack needs a non-blank identifier, and no
/// two stacks may share one.
pub fn validate_stacks(stacks: &[Stack], sync: bool) -> Result<()> {
    if !sync {
        return Ok(());
    }

    let missing: Vec<&str> = stacks
        .iter()
        .filter(|s| s.remote_id().is_none())
        .map(|s| s.name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(StackrunError::ValidationError(format!(
            "{MISSING_ID_MESSAGE} (missing on: {})",
            missing.join(", ")
        )));
    }

    let mut owners: HashMap<&str, &str> = HashMap::new();
    for stack in stacks {
        if let Some(id) = stack.remote_id() {
            if let Some(first) = owners.insert(id, stack.name.as_str()) {
                return Err(StackrunError::ValidationError(format!(
                    "duplicate stack id '{id}' on stacks '{first}' and '{}'",
                    stack.name
                )));
            }
        }
    }

    Ok(())
}

/// Decide how the run proceeds once a stack reached `terminal`.
pub fn next_step(policy: FailurePolicy, terminal: LifecycleState) -> Step {
    match terminal {
        LifecycleState::Canceled => Step::Abort(AbortReason::Canceled),
        LifecycleState::Failed if policy == FailurePolicy::Abort => {
            Step::Abort(AbortReason::StackFailed)
        }
        _ => Step::Continue,
    }
}

/// `0` only if every stack reached `ok` (and, in `fail` mode, every event
/// was delivered); `1` otherwise.
pub fn aggregate_exit_code<I>(states: I, reporting: &ReportSummary, mode: ReportFailureMode) -> i32
where
    I: IntoIterator<Item = Option<LifecycleState>>,
{
    let all_ok = states
        .into_iter()
        .all(|state| state == Some(LifecycleState::Ok));
    let reporting_ok = mode == ReportFailureMode::Warn || reporting.is_complete();

    if all_ok && reporting_ok { 0 } else { 1 }
}
