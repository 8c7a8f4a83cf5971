// src/config/validate.rs

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::cloud::ReportPolicy;
use crate::config::duration::parse_duration;
use crate::config::model::{
    CloudSettings, ConfigFile, RawCloudSection, RawConfigFile, RawRunSection, RunSettings,
    StackConfig,
};
use crate::errors::{Result, StackrunError};

/// Upper bound for `[run].kill_after`.
const MAX_KILL_AFTER: Duration = Duration::from_secs(24 * 60 * 60);
/// Upper bound for `[cloud].retry_delay`.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60 * 60);

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StackrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_stacks(&raw.stack)?;
        validate_stack_paths(&raw.stack)?;
        let run = validate_run_section(&raw.run)?;
        let cloud = raw.cloud.as_ref().map(validate_cloud_section).transpose()?;
        Ok(ConfigFile::new_unchecked(run, cloud, raw.stack))
    }
}

fn ensure_has_stacks(stacks: &BTreeMap<String, StackConfig>) -> Result<()> {
    if stacks.is_empty() {
        return Err(StackrunError::ConfigError(
            "config must contain at least one [stack.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_stack_paths(stacks: &BTreeMap<String, StackConfig>) -> Result<()> {
    let mut seen = HashSet::new();
    for (name, stack) in stacks.iter() {
        let path = stack.path.trim();
        if path.is_empty() {
            return Err(StackrunError::ConfigError(format!(
                "stack '{name}' has an empty `path`"
            )));
        }
        if Path::new(path).is_absolute() {
            return Err(StackrunError::ConfigError(format!(
                "stack '{name}' path '{path}' must be relative to the manifest"
            )));
        }
        let normalized = path.trim_end_matches('/').trim_start_matches("./");
        if !seen.insert(normalized.to_string()) {
            return Err(StackrunError::ConfigError(format!(
                "stack '{name}' reuses path '{path}'"
            )));
        }
    }
    Ok(())
}

fn validate_run_section(run: &RawRunSection) -> Result<RunSettings> {
    if run.interrupt_limit == 0 {
        return Err(StackrunError::ConfigError(
            "[run].interrupt_limit must be >= 1 (got 0)".to_string(),
        ));
    }

    let kill_after = run
        .kill_after
        .as_deref()
        .map(parse_duration)
        .transpose()
        .map_err(|e| StackrunError::ConfigError(format!("[run].kill_after: {e}")))?;
    if let Some(grace) = kill_after {
        ensure_at_most("[run].kill_after", grace, MAX_KILL_AFTER)?;
    }

    Ok(RunSettings {
        interrupt_limit: run.interrupt_limit,
        kill_after,
        on_stack_failure: run.on_stack_failure,
    })
}

fn validate_cloud_section(cloud: &RawCloudSection) -> Result<CloudSettings> {
    let base_url = cloud.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(StackrunError::ConfigError(format!(
            "[cloud].base_url must be an http(s) URL (got '{base_url}')"
        )));
    }
    if cloud.org_id.trim().is_empty() {
        return Err(StackrunError::ConfigError(
            "[cloud].org_id must not be empty".to_string(),
        ));
    }
    if cloud.max_attempts == 0 {
        return Err(StackrunError::ConfigError(
            "[cloud].max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    let retry_delay = parse_duration(&cloud.retry_delay)
        .map_err(|e| StackrunError::ConfigError(format!("[cloud].retry_delay: {e}")))?;
    ensure_at_most("[cloud].retry_delay", retry_delay, MAX_RETRY_DELAY)?;

    Ok(CloudSettings {
        base_url: base_url.to_string(),
        org_id: cloud.org_id.trim().to_string(),
        token_env: cloud.token_env.clone(),
        report: ReportPolicy {
            max_attempts: cloud.max_attempts,
            retry_delay,
            on_failure: cloud.on_report_failure,
        },
    })
}

fn ensure_at_most(key: &str, value: Duration, max: Duration) -> Result<()> {
    if value > max {
        return Err(StackrunError::ConfigError(format!(
            "{key} must be at most {}s (got {}s)",
            max.as_secs(),
            value.as_secs()
        )));
    }
    Ok(())
}
