// src/cloud/credential.rs

//! Minimal bearer-token capability.

use thiserror::Error;

/// Default environment variable holding the API token.
pub const DEFAULT_TOKEN_ENV: &str = "STACKRUN_CLOUD_TOKEN";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no cloud token found: set {var}")]
    Missing { var: String },

    #[error("cloud token in {var} is empty")]
    Empty { var: String },
}

/// Anything able to produce a bearer token on demand.
pub trait Credential: Send + Sync {
    fn token(&self) -> Result<String, CredentialError>;
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl Default for EnvCredential {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_ENV)
    }
}

impl Credential for EnvCredential {
    fn token(&self) -> Result<String, CredentialError> {
        match std::env::var(&self.var) {
            Ok(token) if token.trim().is_empty() => Err(CredentialError::Empty {
                var: self.var.clone(),
            }),
            Ok(token) => Ok(token.trim().to_string()),
            Err(_) => Err(CredentialError::Missing {
                var: self.var.clone(),
            }),
        }
    }
}

/// Fixed token; handy for tests and for callers that already hold one.
#[derive(Debug, Clone)]
pub struct StaticCredential(String);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl Credential for StaticCredential {
    fn token(&self) -> Result<String, CredentialError> {
        Ok(self.0.clone())
    }
}
