// src/cloud/client.rs

//! Generic authenticated request/response transport.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::credential::{Credential, CredentialError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Schema-level check run on every decoded response before it is returned.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("obtaining API credential: {0}")]
    Credential(#[from] CredentialError),

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: Method,
        url: String,
        status: u16,
        body: String,
    },

    #[error("decoding response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid response from {url}: {reason}")]
    Validation { url: String, reason: String },

    #[error("building HTTP client: {0}")]
    Setup(#[source] reqwest::Error),
}

impl ClientError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network { .. } => true,
            ClientError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Stateless API client: a base URL, a credential and a connection pool.
#[derive(Clone)]
pub struct Client {
    base_url: String,
    credential: Arc<dyn Credential>,
    http: reqwest::Client,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(base_url: impl Into<String>, credential: Arc<dyn Credential>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("stackrun/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Setup)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T>(&self, path: &str) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Validate,
    {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Validate,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Perform an authenticated request and return the decoded, validated
    /// response body.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Validate,
        B: Serialize + ?Sized,
    {
        let token = self.credential.token()?;
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        let mut req = self.http.request(method.clone(), &url).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(body);
        }

        debug!(%method, %url, "sending API request");
        let response = req.send().await.map_err(|source| ClientError::Network {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|source| ClientError::Network {
            url: url.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(ClientError::Status {
                method,
                url,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).trim().to_string(),
            });
        }

        let value: T = serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode {
            url: url.clone(),
            source,
        })?;
        value
            .validate()
            .map_err(|reason| ClientError::Validation { url, reason })?;

        Ok(value)
    }
}
