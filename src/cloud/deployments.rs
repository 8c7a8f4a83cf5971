// src/cloud/deployments.rs

//! Deployment-events resource: `/v1/deployments/{org_id}/{run_id}/events`.

use super::client::{Client, ClientError};
use super::types::{CloudEvent, EventAck, EventsResponse};

pub fn events_path(org_id: &str, run_id: &str) -> String {
    format!("/v1/deployments/{org_id}/{run_id}/events")
}

/// Record one lifecycle event.
pub async fn create_event(
    client: &Client,
    org_id: &str,
    event: &CloudEvent,
) -> Result<EventAck, ClientError> {
    client.post(&events_path(org_id, &event.run_id), event).await
}

/// Fetch the event log recorded for a run.
pub async fn fetch_events(
    client: &Client,
    org_id: &str,
    run_id: &str,
) -> Result<EventsResponse, ClientError> {
    client.get(&events_path(org_id, run_id)).await
}
