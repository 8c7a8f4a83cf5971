// src/lib.rs

pub mod cli;
pub mod cloud;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod lifecycle;
pub mod logging;
pub mod stack;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::{CliArgs, Commands, EventsArgs, RunArgs};
use crate::cloud::{Client, CloudReporter, Credential, DisabledSink, EnvCredential, EventSink};
use crate::config::{config_root_dir, load_and_validate, CloudSettings, ConfigFile};
use crate::engine::{derive_run_id, validate_stacks, Orchestrator, RunOptions};
use crate::errors::StackrunError;
use crate::exec::{cancel, CommandSpec, ProcessExecutor};
use crate::stack::{select_stacks, Stack};

/// High-level entry point used by `main.rs`. Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    match args.command {
        Commands::Run(run_args) => run_stacks(&cfg, &args.config, run_args).await,
        Commands::Events(events_args) => print_events(&cfg, events_args).await,
    }
}

/// Wires together:
/// - stack selection
/// - precondition checks
/// - executor and OS signal forwarding
/// - (optional) cloud reporter
async fn run_stacks(cfg: &ConfigFile, config_path: &Path, args: RunArgs) -> Result<i32> {
    let root = config_root_dir(config_path);
    let stacks = select_stacks(cfg, &root);
    let command = CommandSpec::from_argv(&args.command)
        .ok_or_else(|| StackrunError::ConfigError("no command given".to_string()))?;
    let run_id = derive_run_id();

    if args.dry_run {
        print_dry_run(&run_id, &stacks, &command, args.cloud_sync_deployment);
        return Ok(0);
    }

    // Fail on missing ids before touching credentials or the network.
    validate_stacks(&stacks, args.cloud_sync_deployment)?;

    let options = RunOptions {
        sync: args.cloud_sync_deployment,
        failure_policy: if args.continue_on_error {
            types::FailurePolicy::Continue
        } else {
            cfg.run.on_stack_failure
        },
        report_failure: cfg
            .cloud
            .as_ref()
            .map(|c| c.report.on_failure)
            .unwrap_or_default(),
        abandon_reporting_after: cfg.run.interrupt_limit,
    };

    let executor = ProcessExecutor::new(cfg.run.escalation_policy()).with_passthrough(true);

    let (handle, cancel_rx) = cancel::channel();
    let _listener = cancel::spawn_signal_listener(handle).context("installing signal handlers")?;

    if options.sync {
        let settings = cfg.cloud.as_ref().ok_or_else(|| {
            StackrunError::ConfigError(
                "--cloud-sync-deployment requires a [cloud] section in the manifest".to_string(),
            )
        })?;
        let client = cloud_client(settings)?;
        let reporter = CloudReporter::spawn(client, settings.org_id.clone(), settings.report);
        drive(executor, reporter, cancel_rx, options, run_id, stacks, &command).await
    } else {
        drive(executor, DisabledSink, cancel_rx, options, run_id, stacks, &command).await
    }
}

async fn drive<S: EventSink>(
    executor: ProcessExecutor,
    sink: S,
    cancel_rx: cancel::CancelReceiver,
    options: RunOptions,
    run_id: String,
    stacks: Vec<Stack>,
    command: &CommandSpec,
) -> Result<i32> {
    let orchestrator = Orchestrator::new(executor, sink, cancel_rx, options);
    let report = orchestrator.run(run_id, stacks, command).await?;
    Ok(report.exit_code)
}

/// Client for the configured service; checks the token up front so a run
/// never starts with reporting that can only fail.
fn cloud_client(settings: &CloudSettings) -> Result<Client> {
    let credential = EnvCredential::new(settings.token_env.clone());
    credential
        .token()
        .map_err(|e| StackrunError::ConfigError(e.to_string()))?;
    let client = Client::new(settings.base_url.clone(), Arc::new(credential))
        .map_err(StackrunError::from)?;
    Ok(client)
}

async fn print_events(cfg: &ConfigFile, args: EventsArgs) -> Result<i32> {
    let settings = cfg.cloud.as_ref().ok_or_else(|| {
        StackrunError::ConfigError("`events` requires a [cloud] section in the manifest".to_string())
    })?;
    let client = cloud_client(settings)?;

    info!(run_id = %args.run_id, "fetching recorded events");
    let events = cloud::fetch_events(&client, &settings.org_id, &args.run_id)
        .await
        .map_err(StackrunError::from)?;

    println!("{}", serde_json::to_string_pretty(&events)?);
    Ok(0)
}

/// Simple dry-run output: run id, stacks in processing order, command.
fn print_dry_run(run_id: &str, stacks: &[Stack], command: &CommandSpec, sync: bool) {
    println!("stackrun dry-run");
    println!("  run_id = {run_id}");
    println!("  cloud_sync_deployment = {sync}");
    println!("  cmd = {command}");
    println!();

    println!("stacks ({}):", stacks.len());
    for stack in stacks {
        println!("  - {}", stack.name);
        println!("      path: {}", stack.path.display());
        if let Some(id) = stack.remote_id() {
            println!("      id: {id}");
        }
    }

    debug!("dry-run complete (no execution)");
}
