// src/engine/session.rs

//! Run-scoped data: the run identifier and the per-stack execution records.

use tracing::debug;
use uuid::Uuid;

use crate::exec::{ExecOutcome, OutputBuffer};
use crate::lifecycle::StackLifecycle;
use crate::stack::Stack;
use crate::types::LifecycleState;

/// CI variables recognized as a run identifier, in priority order.
pub const RUN_ID_ENV_VARS: &[&str] = &["GITHUB_RUN_ID"];

/// Run identifier from the CI environment, or a fresh UUID.
pub fn derive_run_id() -> String {
    derive_run_id_with(|var| std::env::var(var).ok())
}

pub fn derive_run_id_with(lookup: impl Fn(&str) -> Option<String>) -> String {
    for var in RUN_ID_ENV_VARS {
        if let Some(value) = lookup(var) {
            let value = value.trim();
            if !value.is_empty() {
                debug!(var, run_id = value, "using run id from CI environment");
                return value.to_string();
            }
        }
    }
    Uuid::new_v4().to_string()
}

/// Run-wide capture of every stack's output, in processing order.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub stdout: OutputBuffer,
    pub stderr: OutputBuffer,
}

/// One stack's processing record.
#[derive(Debug)]
pub struct StackExecution {
    pub stack: Stack,
    pub lifecycle: StackLifecycle,
    pub stdout: OutputBuffer,
    pub stderr: OutputBuffer,
    pub outcome: Option<ExecOutcome>,
    /// States handed to the event sink, in order.
    pub reported: Vec<LifecycleState>,
}

impl StackExecution {
    pub fn new(stack: Stack, output: &RunOutput) -> Self {
        Self {
            lifecycle: StackLifecycle::new(stack.name.clone()),
            stack,
            stdout: OutputBuffer::tee_into(&output.stdout),
            stderr: OutputBuffer::tee_into(&output.stderr),
            outcome: None,
            reported: Vec::new(),
        }
    }

    pub fn state(&self) -> Option<LifecycleState> {
        self.lifecycle.current()
    }

    pub fn states(&self) -> Vec<LifecycleState> {
        self.lifecycle.states()
    }
}

#[derive(Debug)]
pub struct RunSession {
    pub run_id: String,
    pub executions: Vec<StackExecution>,
}

impl RunSession {
    pub fn new(run_id: impl Into<String>, stacks: Vec<Stack>, output: &RunOutput) -> Self {
        Self {
            run_id: run_id.into(),
            executions: stacks
                .into_iter()
                .map(|stack| StackExecution::new(stack, output))
                .collect(),
        }
    }
}
