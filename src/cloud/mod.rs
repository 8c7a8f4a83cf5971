// src/cloud/mod.rs

//! Deployment-tracking service integration.
//!
//! - [`client`]: generic bearer-authenticated request with a validated,
//!   typed response.
//! - [`credential`]: the token-supplying capability used by the client.
//! - [`types`] / [`deployments`]: the deployment-events resource.
//! - [`reporter`]: ordered, best-effort delivery of lifecycle events.

pub mod client;
pub mod credential;
pub mod deployments;
pub mod reporter;
pub mod types;

pub use client::{Client, ClientError, Validate};
pub use credential::{Credential, CredentialError, EnvCredential, StaticCredential};
pub use deployments::{create_event, events_path, fetch_events};
pub use reporter::{
    CloudReporter, DisabledSink, EventSink, FailedDelivery, ReportPolicy, ReportSummary, ABANDONED_ERROR,
};
pub use types::{CloudEvent, EventAck, EventsResponse};
