// src/logging.rs

//! Logging setup for `stackrun` using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from, in order:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `STACKRUN_LOG`, read as `EnvFilter` directives
//!    (e.g. `warn` or `stackrun::cloud=debug,info`)
//! 3. `info`
//!
//! Logs go to STDERR so that stdout carries only the stacks' output.

use anyhow::Result;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "STACKRUN_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Initialise the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let (filter, rejected) = log_filter(cli_level, env.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("initialising logging: {e}"))?;

    if let Some(error) = rejected {
        warn!(var = LOG_ENV_VAR, %error, "ignoring invalid log filter; using the default");
    }
    Ok(())
}

/// The filter to install, plus the parse error if the environment value
/// had to be ignored.
fn log_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> (EnvFilter, Option<String>) {
    if let Some(level) = cli_level {
        return (EnvFilter::new(directive(level)), None);
    }

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        None => (EnvFilter::new(DEFAULT_DIRECTIVE), None),
        Some(directives) => match EnvFilter::try_new(directives) {
            Ok(filter) => (filter, None),
            Err(e) => (EnvFilter::new(DEFAULT_DIRECTIVE), Some(e.to_string())),
        },
    }
}

/// HTTP and TLS crates stay at `warn` when the flag asks for more detail.
fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug,hyper=warn,h2=warn,reqwest=warn,rustls=warn",
        LogLevel::Trace => "trace,hyper=warn,h2=warn,reqwest=warn,rustls=warn",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    fn max_level(cli_level: Option<LogLevel>, env: Option<&str>) -> Option<LevelFilter> {
        log_filter(cli_level, env).0.max_level_hint()
    }

    #[test]
    fn cli_flag_overrides_the_environment() {
        assert_eq!(max_level(Some(LogLevel::Error), Some("trace")), Some(LevelFilter::ERROR));
        assert_eq!(max_level(Some(LogLevel::Trace), None), Some(LevelFilter::TRACE));
    }

    #[test]
    fn environment_accepts_per_module_directives() {
        assert_eq!(max_level(None, Some("warn")), Some(LevelFilter::WARN));
        assert_eq!(
            max_level(None, Some("stackrun::cloud=debug,warn")),
            Some(LevelFilter::DEBUG)
        );
    }

    #[test]
    fn unset_or_invalid_environment_falls_back_to_info() {
        assert_eq!(max_level(None, None), Some(LevelFilter::INFO));
        assert_eq!(max_level(None, Some("  ")), Some(LevelFilter::INFO));

        let (filter, rejected) = log_filter(None, Some("stackrun=loud"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
        assert!(rejected.is_some());
    }
}
