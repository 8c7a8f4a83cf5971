// src/exec/process.rs

//! Runs one stack's command as its own process group.

use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

use super::cancel::CancelReceiver;
use super::output::OutputBuffer;
use super::relay::{EscalationPolicy, SignalRelay};
use crate::types::LifecycleState;

/// How long to keep draining output after the child has been reaped.
/// Descendants that escaped the group can keep the pipes open forever.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Program plus arguments; executed directly, without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from an argv-style list; `None` if it is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Everything needed to run the command for one stack.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub stack: String,
    pub command: CommandSpec,
    pub working_dir: PathBuf,
    pub stdout: OutputBuffer,
    pub stderr: OutputBuffer,
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("executable file not found: {program}")]
    NotFound { program: String },

    #[error("permission denied executing {program}")]
    PermissionDenied { program: String },

    #[error("stack directory {} does not exist", dir.display())]
    MissingDir { dir: PathBuf },

    #[error("failed to start {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl StartError {
    fn from_io(program: &str, err: std::io::Error) -> Self {
        let program = program.to_string();
        match err.kind() {
            std::io::ErrorKind::NotFound => StartError::NotFound { program },
            std::io::ErrorKind::PermissionDenied => StartError::PermissionDenied { program },
            _ => StartError::Io {
                program,
                source: err,
            },
        }
    }
}

/// How a stack's command ended.
#[derive(Debug)]
pub enum ExecOutcome {
    /// The process exited on its own with this code.
    Exited { code: i32 },
    /// The process ended abnormally without being asked to (e.g. killed by a
    /// signal nobody relayed, or waiting on it failed).
    Terminated { cause: String },
    /// At least one cancellation request was relayed before it ended.
    Canceled { interrupts: u32, forced: bool },
    /// The command never started.
    StartFailed(StartError),
}

impl ExecOutcome {
    pub fn terminal_state(&self) -> LifecycleState {
        match self {
            ExecOutcome::Exited { code: 0 } => LifecycleState::Ok,
            ExecOutcome::Exited { .. }
            | ExecOutcome::Terminated { .. }
            | ExecOutcome::StartFailed(_) => LifecycleState::Failed,
            ExecOutcome::Canceled { .. } => LifecycleState::Canceled,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecOutcome::Exited { code } => Some(*code),
            _ => None,
        }
    }
}

/// Start `request.command`, capture its output and relay cancellation
/// requests until it ends.
///
/// `passthrough` additionally copies the child's streams to our own
/// stdout/stderr as they arrive.
pub async fn run_process(
    request: ExecRequest,
    cancel: &mut CancelReceiver,
    policy: EscalationPolicy,
    passthrough: bool,
) -> ExecOutcome {
    let ExecRequest {
        stack,
        command,
        working_dir,
        stdout,
        stderr,
    } = request;

    if !working_dir.is_dir() {
        return start_failed(&stack, StartError::MissingDir { dir: working_dir }, &stderr, passthrough);
    }

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .current_dir(&working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return start_failed(&stack, StartError::from_io(&command.program, e), &stderr, passthrough);
        }
    };

    let pid = child.id();
    info!(stack = %stack, pid = ?pid, cmd = %command, dir = %working_dir.display(), "stack process started");

    let mut drains = Vec::with_capacity(2);
    if let Some(out) = child.stdout.take() {
        let sink = passthrough.then(tokio::io::stdout);
        drains.push(spawn_drain(out, stdout.clone(), sink));
    }
    if let Some(err) = child.stderr.take() {
        let sink = passthrough.then(tokio::io::stderr);
        drains.push(spawn_drain(err, stderr.clone(), sink));
    }

    // With process_group(0) the group id equals the child's pid.
    let mut relay = SignalRelay::new(stack.clone(), pid, policy);
    let mut cancel_open = true;

    let status = loop {
        let deadline = relay.kill_deadline();
        let action = tokio::select! {
            status = child.wait() => break status,
            signal = cancel.recv(), if cancel_open => match signal {
                Some(signal) => relay.on_signal(signal),
                None => {
                    debug!(stack = %stack, "cancellation channel closed");
                    cancel_open = false;
                    continue;
                }
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                relay.on_grace_elapsed()
            }
        };
        relay.apply(action, &mut child);
    };

    finish_drains(&stack, drains).await;

    let outcome = if relay.is_canceled() {
        ExecOutcome::Canceled {
            interrupts: relay.interrupts(),
            forced: relay.forced(),
        }
    } else {
        match status {
            Ok(status) => outcome_from_status(status),
            Err(e) => ExecOutcome::Terminated {
                cause: format!("waiting for process: {e}"),
            },
        }
    };

    info!(stack = %stack, pid = ?pid, outcome = ?outcome, "stack process finished");
    outcome
}

fn start_failed(
    stack: &str,
    err: StartError,
    stderr: &OutputBuffer,
    passthrough: bool,
) -> ExecOutcome {
    error!(stack = %stack, error = %err, "stack command could not be started");
    let line = format!("stackrun: stack {stack}: {err}\n");
    stderr.append_str(&line);
    if passthrough {
        eprint!("{line}");
    }
    ExecOutcome::StartFailed(err)
}

fn outcome_from_status(status: ExitStatus) -> ExecOutcome {
    if let Some(code) = status.code() {
        return ExecOutcome::Exited { code };
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExecOutcome::Terminated {
                cause: format!("terminated by signal {signal}"),
            };
        }
    }

    ExecOutcome::Terminated {
        cause: format!("abnormal exit: {status}"),
    }
}

fn spawn_drain<R, W>(mut reader: R, buffer: OutputBuffer, mut sink: Option<W>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    buffer.append(&chunk[..n]);
                    if let Some(w) = sink.as_mut() {
                        if w.write_all(&chunk[..n]).await.is_err() || w.flush().await.is_err() {
                            sink = None;
                        }
                    }
                }
                Err(e) => {
                    debug!(error = %e, "output stream read failed");
                    break;
                }
            }
        }
    })
}

async fn finish_drains(stack: &str, drains: Vec<JoinHandle<()>>) {
    for mut drain in drains {
        if timeout(DRAIN_TIMEOUT, &mut drain).await.is_err() {
            warn!(stack = %stack, "output still open after process exit; abandoning drain");
            drain.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_spec_from_argv() {
        let argv = vec!["echo".to_string(), "a".to_string(), "b".to_string()];
        let command = CommandSpec::from_argv(&argv).unwrap();
        assert_eq!(command.program, "echo");
        assert_eq!(command.args, vec!["a", "b"]);
        assert_eq!(command.to_string(), "echo a b");
        assert!(CommandSpec::from_argv(&[]).is_none());
    }

    #[test]
    fn outcomes_map_to_terminal_states() {
        assert_eq!(ExecOutcome::Exited { code: 0 }.terminal_state(), LifecycleState::Ok);
        assert_eq!(ExecOutcome::Exited { code: 2 }.terminal_state(), LifecycleState::Failed);
        assert_eq!(
            ExecOutcome::Canceled { interrupts: 1, forced: false }.terminal_state(),
            LifecycleState::Canceled
        );
        let start = ExecOutcome::StartFailed(StartError::NotFound { program: "nope".into() });
        assert_eq!(start.terminal_state(), LifecycleState::Failed);
        assert_eq!(start.exit_code(), None);
    }

    #[test]
    fn not_found_start_error_reads_like_a_lookup_failure() {
        let err = StartError::from_io(
            "non-existent-command",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert_eq!(err.to_string(), "executable file not found: non-existent-command");
    }
}
