// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::cloud::credential::DEFAULT_TOKEN_ENV;
use crate::cloud::ReportPolicy;
use crate::exec::EscalationPolicy;
use crate::types::{FailurePolicy, ReportFailureMode};

/// Stack manifest exactly as read from TOML.
///
/// ```toml
/// [run]
/// interrupt_limit = 3
/// kill_after = "30s"
/// on_stack_failure = "abort"
///
/// [cloud]
/// base_url = "https://api.example.com"
/// org_id = "0000-1111"
///
/// [stack.app]
/// path = "stacks/app"
/// id = "app-id"
/// ```
///
/// Turn it into a [`ConfigFile`] with `ConfigFile::try_from`, which
/// validates it and parses durations.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub run: RawRunSection,

    #[serde(default)]
    pub cloud: Option<RawCloudSection>,

    /// Keyed by stack name.
    #[serde(default)]
    pub stack: BTreeMap<String, StackConfig>,
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRunSection {
    /// Interrupts relayed before the process group is force-killed.
    #[serde(default = "default_interrupt_limit")]
    pub interrupt_limit: u32,

    /// Grace period after the first interrupt, e.g. `"30s"`.
    #[serde(default)]
    pub kill_after: Option<String>,

    #[serde(default)]
    pub on_stack_failure: FailurePolicy,
}

fn default_interrupt_limit() -> u32 {
    3
}

impl Default for RawRunSection {
    fn default() -> Self {
        Self {
            interrupt_limit: default_interrupt_limit(),
            kill_after: None,
            on_stack_failure: FailurePolicy::default(),
        }
    }
}

/// `[cloud]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCloudSection {
    pub base_url: String,
    pub org_id: String,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,

    #[serde(default)]
    pub on_report_failure: ReportFailureMode,

    /// Environment variable the API token is read from.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> String {
    "250ms".to_string()
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

/// `[stack.<name>]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StackConfig {
    /// Directory of the stack, relative to the manifest.
    pub path: String,

    /// Identifier used by the deployment-tracking service.
    #[serde(default)]
    pub id: Option<String>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub run: RunSettings,
    pub cloud: Option<CloudSettings>,
    pub stack: BTreeMap<String, StackConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub interrupt_limit: u32,
    pub kill_after: Option<Duration>,
    pub on_stack_failure: FailurePolicy,
}

impl RunSettings {
    pub fn escalation_policy(&self) -> EscalationPolicy {
        EscalationPolicy {
            interrupt_limit: self.interrupt_limit,
            kill_after: self.kill_after,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudSettings {
    pub base_url: String,
    pub org_id: String,
    pub token_env: String,
    pub report: ReportPolicy,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        run: RunSettings,
        cloud: Option<CloudSettings>,
        stack: BTreeMap<String, StackConfig>,
    ) -> Self {
        Self { run, cloud, stack }
    }
}
