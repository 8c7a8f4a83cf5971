// src/cloud/reporter.rs

//! Mirrors lifecycle transitions to the deployment-tracking service.
//!
//! The orchestrator hands events to an [`EventSink`] without waiting on the
//! network. [`CloudReporter`] feeds them through an mpsc channel into a single
//! background task, so they are submitted strictly in hand-off order.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::client::{Client, ClientError};
use super::deployments::create_event;
use super::types::CloudEvent;
use crate::types::ReportFailureMode;

/// Delivery policy for lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPolicy {
    /// Attempts per event, including the first one.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    pub on_failure: ReportFailureMode,
}

impl Default for ReportPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(250),
            on_failure: ReportFailureMode::Warn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelivery {
    pub event: CloudEvent,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub delivered: usize,
    pub failed: Vec<FailedDelivery>,
}

impl ReportSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Destination for lifecycle events.
pub trait EventSink: Send {
    /// Queue an event. Must not block on delivery.
    fn submit(&mut self, event: CloudEvent);

    /// Flush everything queued so far and report what happened to it.
    fn finish(&mut self) -> Pin<Box<dyn Future<Output = ReportSummary> + Send + '_>>;

    /// Stop delivering immediately. Events not yet confirmed are reported
    /// as failed.
    fn abandon(&mut self) -> ReportSummary;
}

/// Sink used when deployment sync is off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSink;

impl EventSink for DisabledSink {
    fn submit(&mut self, event: CloudEvent) {
        debug!(stack_id = %event.stack_id, state = %event.state, "deployment sync disabled; event not sent");
    }

    fn finish(&mut self) -> Pin<Box<dyn Future<Output = ReportSummary> + Send + '_>> {
        Box::pin(async { ReportSummary::default() })
    }

    fn abandon(&mut self) -> ReportSummary {
        ReportSummary::default()
    }
}

pub const ABANDONED_ERROR: &str = "delivery abandoned after interruption";

pub struct CloudReporter {
    tx: Option<mpsc::UnboundedSender<CloudEvent>>,
    task: Option<JoinHandle<()>>,
    /// Everything handed to the task, in order.
    submitted: Vec<CloudEvent>,
    /// Outcomes so far; the task settles events in submission order.
    progress: Arc<Mutex<ReportSummary>>,
}

impl std::fmt::Debug for CloudReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudReporter")
            .field("open", &self.tx.is_some())
            .field("submitted", &self.submitted.len())
            .finish_non_exhaustive()
    }
}

impl CloudReporter {
    /// Spawn the delivery task. Must be called inside a Tokio runtime.
    pub fn spawn(client: Client, org_id: impl Into<String>, policy: ReportPolicy) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<CloudEvent>();
        let org_id = org_id.into();
        let progress = Arc::new(Mutex::new(ReportSummary::default()));
        let shared = Arc::clone(&progress);

        let task = tokio::spawn(async move {
            info!(base_url = %client.base_url(), org_id = %org_id, "cloud reporter started");

            while let Some(event) = rx.recv().await {
                let result = deliver(&client, &org_id, &event, policy).await;
                let mut summary = lock(&shared);
                match result {
                    Ok(()) => summary.delivered += 1,
                    Err(e) => {
                        warn!(
                            run_id = %event.run_id,
                            stack_id = %event.stack_id,
                            state = %event.state,
                            error = %e,
                            "giving up on lifecycle event"
                        );
                        summary.failed.push(FailedDelivery {
                            event,
                            error: e.to_string(),
                        });
                    }
                }
            }

            let summary = lock(&shared);
            info!(
                delivered = summary.delivered,
                failed = summary.failed.len(),
                "cloud reporter finished"
            );
        });

        Self {
            tx: Some(tx),
            task: Some(task),
            submitted: Vec::new(),
            progress,
        }
    }

    fn snapshot(&self) -> ReportSummary {
        lock(&self.progress).clone()
    }
}

impl EventSink for CloudReporter {
    fn submit(&mut self, event: CloudEvent) {
        let Some(tx) = &self.tx else {
            warn!(stack_id = %event.stack_id, state = %event.state, "reporter already finished; dropping event");
            return;
        };
        match tx.send(event.clone()) {
            Ok(()) => self.submitted.push(event),
            Err(e) => error!(stack_id = %e.0.stack_id, "reporter task is gone; dropping event"),
        }
    }

    fn finish(&mut self) -> Pin<Box<dyn Future<Output = ReportSummary> + Send + '_>> {
        // Closing the channel lets the task drain what is queued and stop.
        self.tx.take();
        let task = self.task.take();

        Box::pin(async move {
            if let Some(task) = task {
                if let Err(e) = task.await {
                    error!(error = %e, "reporter task failed");
                }
            }
            self.snapshot()
        })
    }

    fn abandon(&mut self) -> ReportSummary {
        self.tx.take();
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let mut summary = self.snapshot();
        let settled = summary.delivered + summary.failed.len();
        let dropped = self.submitted.get(settled..).unwrap_or_default();
        if !dropped.is_empty() {
            warn!(
                abandoned = dropped.len(),
                delivered = summary.delivered,
                "abandoning lifecycle events that were not delivered"
            );
        }
        summary
            .failed
            .extend(dropped.iter().cloned().map(|event| FailedDelivery {
                event,
                error: ABANDONED_ERROR.to_string(),
            }));
        summary
    }
}

fn lock(progress: &Mutex<ReportSummary>) -> MutexGuard<'_, ReportSummary> {
    progress.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn deliver(
    client: &Client,
    org_id: &str,
    event: &CloudEvent,
    policy: ReportPolicy,
) -> Result<(), ClientError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match create_event(client, org_id, event).await {
            Ok(ack) => {
                if ack.stack_id != event.stack_id || ack.position != event.position {
                    warn!(
                        stack_id = %event.stack_id,
                        position = event.position,
                        ack_stack_id = %ack.stack_id,
                        ack_position = ack.position,
                        "acknowledgement does not match submitted event"
                    );
                }
                debug!(stack_id = %event.stack_id, state = %event.state, attempt, "lifecycle event recorded");
                return Ok(());
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(
                    stack_id = %event.stack_id,
                    state = %event.state,
                    attempt,
                    max_attempts,
                    error = %e,
                    "lifecycle event delivery failed; retrying"
                );
                tokio::time::sleep(policy.retry_delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
