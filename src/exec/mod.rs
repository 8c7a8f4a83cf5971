// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`process`] starts a stack's command as its own process group, drains
//!   stdout/stderr into [`OutputBuffer`]s and waits for it to end.
//! - [`relay`] decides when interrupts become a forced kill.
//! - [`cancel`] carries operator cancellation requests (and OS signals) to
//!   the running stack.
//! - [`backend`] provides the `StackExecutor` trait and the concrete
//!   `ProcessExecutor` used in production, which tests can replace.

pub mod backend;
pub mod cancel;
pub mod output;
pub mod process;
pub mod relay;

pub use backend::{ProcessExecutor, StackExecutor};
pub use cancel::{CancelHandle, CancelReceiver, CancelSignal};
pub use output::OutputBuffer;
pub use process::{run_process, CommandSpec, ExecOutcome, ExecRequest, StartError};
pub use relay::EscalationPolicy;
