// tests/orchestrator_fake_executor.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use stackrun::engine::{AbortReason, Orchestrator, RunOptions};
use stackrun::exec::{cancel, CommandSpec};
use stackrun::stack::Stack;
use stackrun::types::LifecycleState::{Canceled, Failed, Ok as Done, Pending, Running};
use stackrun::types::{FailurePolicy, ReportFailureMode};
use stackrun_test_utils::fake_executor::{FakeExecutor, FakeStep};
use stackrun_test_utils::recording_sink::RecordingSink;
use stackrun_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn three_stacks() -> Vec<Stack> {
    vec![
        Stack::new("a", "/stacks/a").with_id("a-id"),
        Stack::new("b", "/stacks/b").with_id("b-id"),
        Stack::new("c", "/stacks/c").with_id("c-id"),
    ]
}

fn command() -> CommandSpec {
    CommandSpec::new("deploy", ["--yes"])
}

fn options(failure_policy: FailurePolicy) -> RunOptions {
    RunOptions {
        sync: true,
        failure_policy,
        report_failure: ReportFailureMode::Warn,
        ..RunOptions::default()
    }
}

/// (stack id, state, position) for every submitted event.
fn submitted(sink: &RecordingSink) -> Vec<(String, stackrun::types::LifecycleState, usize)> {
    sink.events()
        .into_iter()
        .map(|e| (e.stack_id, e.state, e.position))
        .collect()
}

#[tokio::test]
async fn all_pendings_are_reported_before_the_first_stack_runs() -> TestResult {
    init_tracing();
    let executed = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink::new();
    let (_handle, rx) = cancel::channel();

    let orchestrator = Orchestrator::new(
        FakeExecutor::new(executed.clone()),
        sink.clone(),
        rx,
        options(FailurePolicy::Abort),
    );
    let report = with_timeout(orchestrator.run("run-1", three_stacks(), &command())).await?;

    assert_eq!(report.exit_code, 0);
    assert_eq!(*executed.lock().unwrap(), vec!["a", "b", "c"]);

    let events = submitted(&sink);
    assert_eq!(
        &events[..3],
        &[
            ("a-id".to_string(), Pending, 0),
            ("b-id".to_string(), Pending, 0),
            ("c-id".to_string(), Pending, 0),
        ]
    );
    assert_eq!(events[3], ("a-id".to_string(), Running, 1));
    assert_eq!(events[4], ("a-id".to_string(), Done, 2));
    assert_eq!(events.len(), 9);
    assert!(sink.events().iter().all(|e| e.run_id == "run-1"));
    Ok(())
}

#[tokio::test]
async fn failure_aborts_and_leaves_the_rest_pending() -> TestResult {
    init_tracing();
    let executed = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink::new();
    let (_handle, rx) = cancel::channel();

    let executor = FakeExecutor::new(executed.clone()).with_step("b", FakeStep::Exit(2));
    let orchestrator = Orchestrator::new(executor, sink.clone(), rx, options(FailurePolicy::Abort));
    let report = with_timeout(orchestrator.run("run-2", three_stacks(), &command())).await?;

    assert_eq!(report.exit_code, 1);
    assert_eq!(report.aborted, Some(AbortReason::StackFailed));
    assert_eq!(*executed.lock().unwrap(), vec!["a", "b"]);
    assert_eq!(report.states_of("a"), Some(vec![Pending, Running, Done]));
    assert_eq!(report.states_of("b"), Some(vec![Pending, Running, Failed]));
    assert_eq!(report.states_of("c"), Some(vec![Pending]));
    assert_eq!(report.execution("b").and_then(|e| e.outcome.as_ref()).and_then(|o| o.exit_code()), Some(2));

    let c_events: Vec<_> = sink.events().into_iter().filter(|e| e.stack_id == "c-id").collect();
    assert_eq!(c_events.len(), 1);
    Ok(())
}

#[tokio::test]
async fn continue_policy_runs_every_stack() -> TestResult {
    init_tracing();
    let executed = Arc::new(Mutex::new(Vec::new()));
    let (_handle, rx) = cancel::channel();

    let executor = FakeExecutor::new(executed.clone())
        .with_step("a", FakeStep::StartFail)
        .with_step("b", FakeStep::Exit(1));
    let orchestrator =
        Orchestrator::new(executor, RecordingSink::new(), rx, options(FailurePolicy::Continue));
    let output = orchestrator.output();
    let report = with_timeout(orchestrator.run("run-3", three_stacks(), &command())).await?;

    assert_eq!(report.exit_code, 1);
    assert_eq!(report.aborted, None);
    assert_eq!(*executed.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(report.states_of("a"), Some(vec![Pending, Running, Failed]));
    assert_eq!(report.states_of("c"), Some(vec![Pending, Running, Done]));
    assert!(output.stderr.contents().contains("executable file not found: deploy"));
    assert_eq!(output.stdout.contents(), "ran a\nran b\nran c\n");
    Ok(())
}

#[tokio::test]
async fn cancellation_of_running_stack_aborts_even_with_continue() -> TestResult {
    init_tracing();
    let executed = Arc::new(Mutex::new(Vec::new()));
    let (handle, rx) = cancel::channel();

    let executor = FakeExecutor::new(executed.clone()).with_step("a", FakeStep::WaitForCancel);
    let orchestrator =
        Orchestrator::new(executor, RecordingSink::new(), rx, options(FailurePolicy::Continue));
    let run = tokio::spawn(async move { orchestrator.run("run-4", three_stacks(), &command()).await });

    while executed.lock().unwrap().is_empty() {
        tokio::task::yield_now().await;
    }
    handle.interrupt();
    let report = with_timeout(run).await??;

    assert_eq!(report.exit_code, 1);
    assert_eq!(report.aborted, Some(AbortReason::Canceled));
    assert_eq!(report.states_of("a"), Some(vec![Pending, Running, Canceled]));
    assert_eq!(report.states_of("b"), Some(vec![Pending]));
    assert_eq!(*executed.lock().unwrap(), vec!["a"]);
    Ok(())
}

#[tokio::test]
async fn interrupt_between_stacks_prevents_the_next_start() -> TestResult {
    init_tracing();
    let executed = Arc::new(Mutex::new(Vec::new()));
    let (handle, rx) = cancel::channel();

    let executor = FakeExecutor::new(executed.clone())
        .with_cancel_handle(handle)
        .with_step("a", FakeStep::ExitThenInterrupt(0));
    let orchestrator =
        Orchestrator::new(executor, RecordingSink::new(), rx, options(FailurePolicy::Continue));
    let report = with_timeout(orchestrator.run("run-5", three_stacks(), &command())).await?;

    assert_eq!(report.aborted, Some(AbortReason::Canceled));
    assert_eq!(report.states_of("a"), Some(vec![Pending, Running, Done]));
    assert_eq!(report.states_of("b"), Some(vec![Pending]));
    assert_eq!(report.exit_code, 1);
    assert_eq!(*executed.lock().unwrap(), vec!["a"]);
    Ok(())
}

#[tokio::test]
async fn undelivered_events_only_fail_the_run_when_configured() -> TestResult {
    init_tracing();
    for (mode, expected) in [(ReportFailureMode::Warn, 0), (ReportFailureMode::Fail, 1)] {
        let (_handle, rx) = cancel::channel();
        let options = RunOptions {
            report_failure: mode,
            ..options(FailurePolicy::Abort)
        };
        let orchestrator = Orchestrator::new(
            FakeExecutor::new(Arc::new(Mutex::new(Vec::new()))),
            RecordingSink::failing(),
            rx,
            options,
        );
        let report = with_timeout(orchestrator.run("run-6", three_stacks(), &command())).await?;
        assert_eq!(report.exit_code, expected, "{mode:?}");
        assert_eq!(report.reporting.failed.len(), 9);
    }
    Ok(())
}

#[tokio::test]
async fn without_sync_nothing_is_submitted_and_ids_are_optional() -> TestResult {
    init_tracing();
    let sink = RecordingSink::new();
    let (_handle, rx) = cancel::channel();
    let stacks = vec![Stack::new("a", "/a"), Stack::new("b", "/b")];

    let orchestrator = Orchestrator::new(
        FakeExecutor::new(Arc::new(Mutex::new(Vec::new()))),
        sink.clone(),
        rx,
        RunOptions::default(),
    );
    let report = with_timeout(orchestrator.run("run-7", stacks, &command())).await?;

    assert_eq!(report.exit_code, 0);
    assert!(sink.events().is_empty());
    assert!(report.executions.iter().all(|e| e.reported.is_empty()));
    Ok(())
}

#[tokio::test]
async fn empty_selection_succeeds() -> TestResult {
    init_tracing();
    let (_handle, rx) = cancel::channel();
    let orchestrator = Orchestrator::new(
        FakeExecutor::new(Arc::new(Mutex::new(Vec::new()))),
        RecordingSink::new(),
        rx,
        options(FailurePolicy::Abort),
    );
    let report = orchestrator.run("run-8", Vec::new(), &command()).await?;
    assert_eq!(report.exit_code, 0);
    assert!(report.executions.is_empty());
    Ok(())
}
