// src/exec/cancel.rs

//! Cancellation requests flowing from the operator to the running stack.
//!
//! Every request is edge-triggered: one `interrupt()` is one relay attempt.
//! Sending after the receiving side is gone is a no-op, so it is always safe
//! to signal, including after the child has exited.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelSignal {
    /// Ask the child process group to shut down gracefully (SIGINT).
    Interrupt,
    /// Terminate the child process group unconditionally (SIGKILL).
    Kill,
}

#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: mpsc::UnboundedSender<CancelSignal>,
}

impl CancelHandle {
    /// Returns `false` if nobody is listening anymore.
    pub fn interrupt(&self) -> bool {
        self.send(CancelSignal::Interrupt)
    }

    pub fn kill(&self) -> bool {
        self.send(CancelSignal::Kill)
    }

    fn send(&self, signal: CancelSignal) -> bool {
        self.tx.send(signal).is_ok()
    }
}

#[derive(Debug)]
pub struct CancelReceiver {
    rx: mpsc::UnboundedReceiver<CancelSignal>,
}

impl CancelReceiver {
    /// Next request, or `None` once every handle has been dropped.
    pub async fn recv(&mut self) -> Option<CancelSignal> {
        self.rx.recv().await
    }

    /// Non-blocking poll for a request that is already queued.
    pub fn try_recv(&mut self) -> Option<CancelSignal> {
        self.rx.try_recv().ok()
    }
}

pub fn channel() -> (CancelHandle, CancelReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CancelHandle { tx }, CancelReceiver { rx })
}

/// Spawn the task that turns OS interruption signals into
/// [`CancelSignal::Interrupt`] requests.
///
/// SIGINT and SIGTERM are both forwarded as interrupts. The task ends once
/// the receiving side has been dropped.
#[cfg(unix)]
pub fn spawn_signal_listener(handle: CancelHandle) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                received = interrupt.recv() => match received {
                    Some(()) => "SIGINT",
                    None => break,
                },
                received = terminate.recv() => match received {
                    Some(()) => "SIGTERM",
                    None => break,
                },
            };

            info!(signal = name, "interruption received; relaying to running stack");
            if !handle.interrupt() {
                debug!("no cancellation receiver left; signal listener exiting");
                break;
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_signal_listener(handle: CancelHandle) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for Ctrl+C");
                break;
            }
            info!("Ctrl+C received; relaying to running stack");
            if !handle.interrupt() {
                break;
            }
        }
    }))
}
