use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use stackrun::exec::{
    CancelHandle, CancelReceiver, CancelSignal, ExecOutcome, ExecRequest, StackExecutor,
    StartError,
};

/// What the fake does when asked to run a given stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeStep {
    /// Exit with this code.
    Exit(i32),
    /// Fail to start as if the program did not exist.
    StartFail,
    /// Block until a cancellation request arrives, then report it.
    WaitForCancel,
    /// Queue an interrupt on the run's cancel channel, then exit with this
    /// code. Models a signal landing just as the command finishes.
    ExitThenInterrupt(i32),
}

/// A fake executor that:
/// - records which stacks were "run", in order
/// - writes one line of output per stack
/// - returns a scripted outcome (default `Exit(0)`).
pub struct FakeExecutor {
    steps: HashMap<String, FakeStep>,
    executed: Arc<Mutex<Vec<String>>>,
    cancel: Option<CancelHandle>,
}

impl FakeExecutor {
    pub fn new(executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            steps: HashMap::new(),
            executed,
            cancel: None,
        }
    }

    pub fn with_step(mut self, stack: &str, step: FakeStep) -> Self {
        self.steps.insert(stack.to_string(), step);
        self
    }

    /// Handle used by [`FakeStep::ExitThenInterrupt`].
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }
}

impl StackExecutor for FakeExecutor {
    fn execute<'a>(
        &'a mut self,
        request: ExecRequest,
        cancel: &'a mut CancelReceiver,
    ) -> Pin<Box<dyn Future<Output = ExecOutcome> + Send + 'a>> {
        let step = self
            .steps
            .get(&request.stack)
            .copied()
            .unwrap_or(FakeStep::Exit(0));
        self.executed.lock().unwrap().push(request.stack.clone());
        let handle = self.cancel.clone();

        Box::pin(async move {
            request.stdout.append_str(&format!("ran {}\n", request.stack));
            match step {
                FakeStep::Exit(code) => ExecOutcome::Exited { code },
                FakeStep::StartFail => {
                    let err = StartError::NotFound {
                        program: request.command.program.clone(),
                    };
                    request
                        .stderr
                        .append_str(&format!("stackrun: stack {}: {err}\n", request.stack));
                    ExecOutcome::StartFailed(err)
                }
                FakeStep::WaitForCancel => match cancel.recv().await {
                    Some(CancelSignal::Kill) => ExecOutcome::Canceled {
                        interrupts: 0,
                        forced: true,
                    },
                    Some(CancelSignal::Interrupt) => ExecOutcome::Canceled {
                        interrupts: 1,
                        forced: false,
                    },
                    None => ExecOutcome::Terminated {
                        cause: "cancel channel closed".to_string(),
                    },
                },
                FakeStep::ExitThenInterrupt(code) => {
                    if let Some(handle) = handle {
                        handle.interrupt();
                    }
                    ExecOutcome::Exited { code }
                }
            }
        })
    }
}
