#![expect(clippy::print_stdout, reason = "CLI output is emitted here")]
#![expect(clippy::print_stderr, reason = "CLI output is emitted here")]

//! `bcx-node` command-line front end.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use bcx_harness_common::init_tracing;
use clap::Parser;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

pub mod commands;

use crate::HarnessError;
use crate::app::commands::Cli;
use crate::app::commands::Commands;
use crate::app::commands::NodeArgs;
use crate::app::commands::OutputFormat;
use crate::app::commands::RunArgs;
use crate::node::BootPolicy;
use crate::node::HarnessContext;
use crate::node::NodeHarness;
use crate::rpc::Unit;
use crate::settings::HarnessSettings;
use crate::signals::TeardownOnSignal;

const PROGRAM_NAME: &str = "bcx-node";

/// Exit codes following sysexits.h.
mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const USAGE: i32 = 64;
    pub const DATAERR: i32 = 65;
    pub const UNAVAILABLE: i32 = 69;
    pub const TEMPFAIL: i32 = 75;
}

#[derive(Debug, Serialize)]
struct CommandOutput<'a> {
    argv: Vec<String>,
    script: String,
    tokens: &'a [String],
}

#[derive(Debug, Serialize)]
struct RunningNode<'a> {
    container: &'a str,
    name: &'a str,
    p2p_port: u16,
    rpc_shares: String,
    rpc_credits: String,
}

#[derive(Default)]
pub struct Application;

impl Application {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self) -> Result<i32> {
        let exit_code = match self.execute() {
            Ok(code) => code,
            Err(e) => self.handle_error(e),
        };
        Ok(exit_code)
    }

    fn execute(&self) -> Result<i32> {
        let cli = Cli::parse();
        let _telemetry = init_tracing(if cli.verbose { "debug" } else { "warn" });
        let format = cli.effective_format();
        debug!(command = ?cli.command, format = ?format, "CLI command parsed");

        match &cli.command {
            Commands::Command(args) => {
                print_command(args, format)?;
                Ok(exit_codes::SUCCESS)
            }
            Commands::Run(args) => run_node(args, format),
        }
    }

    fn handle_error(&self, e: anyhow::Error) -> i32 {
        eprintln!("{PROGRAM_NAME}: Error: {e:#}");
        match find_error::<HarnessError>(&e) {
            Some(err) => exit_code_for(err),
            None => exit_codes::GENERAL_ERROR,
        }
    }
}

fn print_command(args: &NodeArgs, format: OutputFormat) -> Result<()> {
    let config = args.to_config().context("invalid node options")?;
    let command = config.daemon_command();
    match format {
        OutputFormat::Text => println!("{}", command.script()),
        OutputFormat::Json => {
            let output = CommandOutput {
                argv: command.argv(),
                script: command.script(),
                tokens: command.cli_tokens(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Launches one node and holds it until the daemon exits. Teardown hooks
/// run whatever the outcome, including SIGINT and SIGTERM.
fn run_node(args: &RunArgs, format: OutputFormat) -> Result<i32> {
    let config = args.to_config().context("invalid node options")?;
    let mut settings = HarnessSettings::from_env();
    if let Some(dir) = &args.source_dir {
        settings = settings.with_source_dir(Some(dir.clone()));
    }
    if let Some(secs) = args.boot_timeout {
        settings = settings.with_boot_timeout(Duration::from_secs(secs));
    }

    let context = HarnessContext::docker(settings).context("failed to reach the container engine")?;
    let _signals = TeardownOnSignal::install(Arc::clone(context.teardown()), |signal| {
        std::process::exit(128 + signal)
    })
    .context("failed to install signal handlers")?;
    let outcome = drive_node(&context, config, args.commit.as_deref(), format);

    let report = context.teardown().run();
    if !report.is_clean() {
        warn!(failures = report.failures.len(), "Teardown finished with failures");
    }
    outcome
}

fn drive_node(
    context: &HarnessContext,
    config: crate::HarnessConfig,
    commit: Option<&str>,
    format: OutputFormat,
) -> Result<i32> {
    let mut node = NodeHarness::launch(context, config).context("failed to launch node")?;
    node.wait_for_boot_with(&BootPolicy::from_settings(context.settings()))
        .context("node did not boot")?;

    let client = node.client()?;
    let endpoints = client.endpoints();
    let running = RunningNode {
        container: node.id(),
        name: node.name(),
        p2p_port: node.port()?,
        rpc_shares: endpoints.for_unit(Unit::Shares).url(),
        rpc_credits: endpoints.for_unit(Unit::Credits).url(),
    };
    match format {
        OutputFormat::Text => {
            println!("{} ({})", running.name, running.container);
            println!("  p2p port:    {}", running.p2p_port);
            println!("  rpc shares:  {}", running.rpc_shares);
            println!("  rpc credits: {}", running.rpc_credits);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(&running)?),
    }

    let code = node.wait_for_shutdown().context("failed waiting for node")?;
    if let Some(repo) = commit {
        node.commit(repo).context("failed to commit node")?;
    }
    Ok(i32::try_from(code).unwrap_or(exit_codes::GENERAL_ERROR))
}

fn find_error<T: std::error::Error + 'static>(error: &anyhow::Error) -> Option<&T> {
    error.chain().find_map(|source| source.downcast_ref::<T>())
}

fn exit_code_for(error: &HarnessError) -> i32 {
    match error {
        HarnessError::Configuration { .. } => exit_codes::USAGE,
        HarnessError::Json(_) => exit_codes::DATAERR,
        HarnessError::Environment { .. }
        | HarnessError::PortsUnavailable { .. }
        | HarnessError::Transport { .. } => exit_codes::UNAVAILABLE,
        HarnessError::Timeout { .. } => exit_codes::TEMPFAIL,
        _ => exit_codes::GENERAL_ERROR,
    }
}
