// src/engine/orchestrator.rs

use std::fmt;

use tracing::{info, warn};

use crate::cloud::{CloudEvent, EventSink, ReportSummary};
use crate::errors::Result;
use crate::exec::{CancelReceiver, CancelSignal, CommandSpec, ExecOutcome, ExecRequest, StackExecutor};
use crate::lifecycle::Transition;
use crate::types::{FailurePolicy, LifecycleState, ReportFailureMode};

use super::core::{aggregate_exit_code, next_step, validate_stacks, AbortReason, Step};
use super::session::{RunOutput, RunSession, StackExecution};
use crate::stack::Stack;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Mirror lifecycle transitions to the deployment-tracking service.
    pub sync: bool,
    pub failure_policy: FailurePolicy,
    pub report_failure: ReportFailureMode,
    /// Interrupts needed to give up on events still being delivered once
    /// every stack is done. A kill request gives up at once.
    pub abandon_reporting_after: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            sync: false,
            failure_policy: FailurePolicy::default(),
            report_failure: ReportFailureMode::default(),
            abandon_reporting_after: 3,
        }
    }
}

/// Result of a whole run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    /// One record per selected stack, in processing order.
    pub executions: Vec<StackExecution>,
    pub aborted: Option<AbortReason>,
    pub reporting: ReportSummary,
    pub exit_code: i32,
}

impl RunReport {
    pub fn execution(&self, stack_name: &str) -> Option<&StackExecution> {
        self.executions.iter().find(|e| e.stack.name == stack_name)
    }

    /// Local transition sequence of a stack.
    pub fn states_of(&self, stack_name: &str) -> Option<Vec<LifecycleState>> {
        self.execution(stack_name).map(StackExecution::states)
    }
}

/// Sequences stacks through the executor, drives their lifecycles and hands
/// every transition to the event sink.
///
/// Stacks run strictly one at a time, in the order given.
pub struct Orchestrator<E: StackExecutor, S: EventSink> {
    executor: E,
    sink: S,
    cancel: CancelReceiver,
    options: RunOptions,
    output: RunOutput,
}

impl<E: StackExecutor, S: EventSink> fmt::Debug for Orchestrator<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<E: StackExecutor, S: EventSink> Orchestrator<E, S> {
    pub fn new(executor: E, sink: S, cancel: CancelReceiver, options: RunOptions) -> Self {
        Self {
            executor,
            sink,
            cancel,
            options,
            output: RunOutput::default(),
        }
    }

    /// Handles to the run-wide output capture; readable while the run is in
    /// progress.
    pub fn output(&self) -> RunOutput {
        self.output.clone()
    }

    /// Run `command` in every stack.
    ///
    /// Returns `Err` only for a violated precondition (nothing started,
    /// nothing reported) or an internal lifecycle bug. Stack failures and
    /// cancellation are part of the returned report.
    pub async fn run(
        mut self,
        run_id: impl Into<String>,
        stacks: Vec<Stack>,
        command: &CommandSpec,
    ) -> Result<RunReport> {
        validate_stacks(&stacks, self.options.sync)?;

        let mut session = RunSession::new(run_id, stacks, &self.output);
        info!(
            run_id = %session.run_id,
            stacks = session.executions.len(),
            cmd = %command,
            sync = self.options.sync,
            "starting run"
        );

        for execution in session.executions.iter_mut() {
            let pending = execution.lifecycle.transition(LifecycleState::Pending)?;
            self.report(&session.run_id, execution, &pending);
        }

        let mut aborted = None;
        for execution in session.executions.iter_mut() {
            if let Some(signal) = self.cancel.try_recv() {
                warn!(?signal, stack = %execution.stack.name, "cancellation received between stacks; not starting");
                aborted = Some(AbortReason::Canceled);
                break;
            }

            let running = execution.lifecycle.transition(LifecycleState::Running)?;
            self.report(&session.run_id, execution, &running);

            let request = ExecRequest {
                stack: execution.stack.name.clone(),
                command: command.clone(),
                working_dir: execution.stack.path.clone(),
                stdout: execution.stdout.clone(),
                stderr: execution.stderr.clone(),
            };
            let outcome = self.executor.execute(request, &mut self.cancel).await;

            let terminal = outcome.terminal_state();
            let done = execution.lifecycle.transition(terminal)?;
            self.report(&session.run_id, execution, &done);
            log_outcome(execution, &outcome);
            execution.outcome = Some(outcome);

            if let Step::Abort(reason) = next_step(self.options.failure_policy, terminal) {
                aborted = Some(reason);
                break;
            }
        }

        let skipped: Vec<&str> = session
            .executions
            .iter()
            .filter(|e| e.state() == Some(LifecycleState::Pending))
            .map(|e| e.stack.name.as_str())
            .collect();
        if let Some(reason) = aborted {
            warn!(run_id = %session.run_id, ?reason, ?skipped, "run aborted; remaining stacks left pending");
        }

        let reporting = self.finish_reporting(&session.run_id).await;
        if !reporting.is_complete() {
            warn!(
                run_id = %session.run_id,
                failed = reporting.failed.len(),
                delivered = reporting.delivered,
                "some lifecycle events could not be delivered"
            );
        }

        let exit_code = aggregate_exit_code(
            session.executions.iter().map(StackExecution::state),
            &reporting,
            self.options.report_failure,
        );
        info!(run_id = %session.run_id, exit_code, "run finished");

        Ok(RunReport {
            run_id: session.run_id,
            executions: session.executions,
            aborted,
            reporting,
            exit_code,
        })
    }

    /// Wait for the sink to flush, unless the operator insists on leaving.
    async fn finish_reporting(&mut self, run_id: &str) -> ReportSummary {
        // Requests queued while the last stack was exiting were meant for it.
        while self.cancel.try_recv().is_some() {}

        let limit = self.options.abandon_reporting_after.max(1);
        let mut interrupts = 0;
        let flushed = {
            let mut finish = self.sink.finish();
            loop {
                tokio::select! {
                    summary = &mut finish => break Some(summary),
                    Some(signal) = self.cancel.recv() => {
                        interrupts += 1;
                        if signal == CancelSignal::Kill || interrupts >= limit {
                            break None;
                        }
                        warn!(%run_id, interrupts, limit, "still delivering lifecycle events; interrupt again to abandon them");
                    }
                }
            }
        };

        match flushed {
            Some(summary) => summary,
            None => {
                warn!(%run_id, "interrupted while delivering lifecycle events; abandoning the rest");
                self.sink.abandon()
            }
        }
    }

    fn report(&mut self, run_id: &str, execution: &mut StackExecution, transition: &Transition) {
        if !self.options.sync {
            return;
        }
        let Some(stack_id) = execution.stack.remote_id() else {
            warn!(stack = %execution.stack.name, state = %transition.state, "stack has no id; event not reported");
            return;
        };

        self.sink.submit(CloudEvent {
            run_id: run_id.to_string(),
            stack_id: stack_id.to_string(),
            state: transition.state,
            position: transition.position,
        });
        execution.reported.push(transition.state);
    }
}

fn log_outcome(execution: &StackExecution, outcome: &ExecOutcome) {
    let stack = &execution.stack.name;
    match outcome {
        ExecOutcome::Exited { code: 0 } => info!(stack = %stack, "stack finished ok"),
        ExecOutcome::Exited { code } => warn!(stack = %stack, exit_code = code, "stack command failed"),
        ExecOutcome::Terminated { cause } => warn!(stack = %stack, %cause, "stack command terminated abnormally"),
        ExecOutcome::Canceled { interrupts, forced } => {
            warn!(stack = %stack, interrupts, forced, "stack canceled")
        }
        ExecOutcome::StartFailed(e) => warn!(stack = %stack, error = %e, "stack command did not start"),
    }
}
