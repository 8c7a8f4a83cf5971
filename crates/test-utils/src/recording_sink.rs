use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use stackrun::cloud::{CloudEvent, EventSink, FailedDelivery, ReportSummary, ABANDONED_ERROR};

/// Event sink that keeps every submitted event in memory.
///
/// With `failing()` every event is reported as undelivered instead.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<CloudEvent>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<CloudEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn submit(&mut self, event: CloudEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn finish(&mut self) -> Pin<Box<dyn Future<Output = ReportSummary> + Send + '_>> {
        let events = self.events();
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                all_failed(events, "recording sink set to fail")
            } else {
                ReportSummary {
                    delivered: events.len(),
                    failed: Vec::new(),
                }
            }
        })
    }

    fn abandon(&mut self) -> ReportSummary {
        all_failed(self.events(), ABANDONED_ERROR)
    }
}

fn all_failed(events: Vec<CloudEvent>, error: &str) -> ReportSummary {
    ReportSummary {
        delivered: 0,
        failed: events
            .into_iter()
            .map(|event| FailedDelivery {
                event,
                error: error.to_string(),
            })
            .collect(),
    }
}
