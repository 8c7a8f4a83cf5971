// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The orchestrator talks to a `StackExecutor` instead of spawning processes
//! itself. Production code uses [`ProcessExecutor`]; tests can provide an
//! implementation that records requests and returns scripted outcomes.

use std::future::Future;
use std::pin::Pin;

use super::cancel::CancelReceiver;
use super::process::{run_process, ExecOutcome, ExecRequest};
use super::relay::EscalationPolicy;

/// Trait abstracting how a stack's command is executed.
pub trait StackExecutor: Send {
    /// Run the request to completion.
    ///
    /// Cancellation requests arriving on `cancel` while the command runs
    /// belong to this stack. Implementations must not return before the
    /// command has actually ended.
    fn execute<'a>(
        &'a mut self,
        request: ExecRequest,
        cancel: &'a mut CancelReceiver,
    ) -> Pin<Box<dyn Future<Output = ExecOutcome> + Send + 'a>>;
}

/// Real executor backend used in production.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    policy: EscalationPolicy,
    passthrough: bool,
}

impl ProcessExecutor {
    pub fn new(policy: EscalationPolicy) -> Self {
        Self {
            policy,
            passthrough: false,
        }
    }

    /// Also copy the child's output to our own stdout/stderr.
    pub fn with_passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    pub fn policy(&self) -> EscalationPolicy {
        self.policy
    }
}

impl StackExecutor for ProcessExecutor {
    fn execute<'a>(
        &'a mut self,
        request: ExecRequest,
        cancel: &'a mut CancelReceiver,
    ) -> Pin<Box<dyn Future<Output = ExecOutcome> + Send + 'a>> {
        let policy = self.policy;
        let passthrough = self.passthrough;
        Box::pin(async move { run_process(request, cancel, policy, passthrough).await })
    }
}
