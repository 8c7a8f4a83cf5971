// src/exec/relay.rs

//! Escalating signal relay for a child process group.
//!
//! The relay itself is a small synchronous state machine: the process runner
//! feeds it cancellation requests and timer expiries, and it answers with the
//! [`RelayAction`] to apply. Applying an action is the only part that touches
//! the OS.

use std::time::Duration;

use tokio::process::Child;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::cancel::CancelSignal;

/// When to stop asking nicely.
///
/// The relay never picks a retry count of its own; both thresholds come from
/// the caller (config / CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    /// Interrupt requests after which the group is force-killed. The
    /// request that reaches the limit is itself turned into the kill.
    pub interrupt_limit: u32,
    /// Optional grace period measured from the first interrupt.
    pub kill_after: Option<Duration>,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            interrupt_limit: 3,
            kill_after: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAction {
    None,
    Interrupt,
    Kill,
}

#[derive(Debug)]
pub struct SignalRelay {
    stack: String,
    pgid: Option<u32>,
    policy: EscalationPolicy,
    interrupts: u32,
    forced: bool,
    first_interrupt_at: Option<Instant>,
}

impl SignalRelay {
    pub fn new(stack: impl Into<String>, pgid: Option<u32>, policy: EscalationPolicy) -> Self {
        Self {
            stack: stack.into(),
            pgid,
            policy,
            interrupts: 0,
            forced: false,
            first_interrupt_at: None,
        }
    }

    pub fn interrupts(&self) -> u32 {
        self.interrupts
    }

    pub fn forced(&self) -> bool {
        self.forced
    }

    /// True once any cancellation request has been accepted.
    pub fn is_canceled(&self) -> bool {
        self.interrupts > 0 || self.forced
    }

    pub fn on_signal(&mut self, signal: CancelSignal) -> RelayAction {
        if self.forced {
            debug!(stack = %self.stack, ?signal, "process group already force-killed; ignoring");
            return RelayAction::None;
        }

        match signal {
            CancelSignal::Kill => RelayAction::Kill,
            CancelSignal::Interrupt => {
                self.interrupts += 1;
                if self.first_interrupt_at.is_none() {
                    self.first_interrupt_at = Some(Instant::now());
                }
                if self.interrupts >= self.policy.interrupt_limit.max(1) {
                    info!(
                        stack = %self.stack,
                        interrupts = self.interrupts,
                        limit = self.policy.interrupt_limit,
                        "interrupt limit reached; escalating to kill"
                    );
                    RelayAction::Kill
                } else {
                    RelayAction::Interrupt
                }
            }
        }
    }

    /// Deadline of the grace period, if one is armed and still relevant.
    pub fn kill_deadline(&self) -> Option<Instant> {
        if self.forced {
            return None;
        }
        match (self.first_interrupt_at, self.policy.kill_after) {
            // A grace period past the clock's range never elapses.
            (Some(first), Some(grace)) => first.checked_add(grace),
            _ => None,
        }
    }

    pub fn on_grace_elapsed(&mut self) -> RelayAction {
        if self.forced {
            return RelayAction::None;
        }
        info!(stack = %self.stack, "grace period elapsed after interrupt; escalating to kill");
        RelayAction::Kill
    }

    pub fn apply(&mut self, action: RelayAction, child: &mut Child) {
        match action {
            RelayAction::None => {}
            RelayAction::Interrupt => {
                info!(stack = %self.stack, pgid = ?self.pgid, count = self.interrupts, "forwarding interrupt to process group");
                self.interrupt_group(child);
            }
            RelayAction::Kill => {
                self.forced = true;
                warn!(stack = %self.stack, pgid = ?self.pgid, "force-killing process group");
                self.kill_group(child);
            }
        }
    }

    #[cfg(unix)]
    fn interrupt_group(&self, _child: &mut Child) {
        if let Some(pgid) = self.pgid {
            self.signal_group(pgid, libc::SIGINT);
        }
    }

    #[cfg(not(unix))]
    fn interrupt_group(&self, child: &mut Child) {
        // No process groups or SIGINT here; the best we can do is kill.
        if let Err(e) = child.start_kill() {
            debug!(stack = %self.stack, error = %e, "child already gone");
        }
    }

    fn kill_group(&self, child: &mut Child) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            self.signal_group(pgid, libc::SIGKILL);
        }
        if let Err(e) = child.start_kill() {
            debug!(stack = %self.stack, error = %e, "child already gone");
        }
    }

    #[cfg(unix)]
    fn signal_group(&self, pgid: u32, signal: libc::c_int) {
        let Ok(pgid) = libc::pid_t::try_from(pgid) else {
            warn!(stack = %self.stack, pgid, "process group id out of range");
            return;
        };
        // SAFETY: killpg only reads its integer arguments.
        let rc = unsafe { libc::killpg(pgid, signal) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ESRCH) {
                debug!(stack = %self.stack, pgid, "process group already exited");
            } else {
                warn!(stack = %self.stack, pgid, signal, error = %err, "failed to signal process group");
            }
        }
    }
}
