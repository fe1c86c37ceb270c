//! xpudp - X-Plane UDP command-line client
//!
//! Discovers a running simulator from its multicast beacon, then watches,
//! writes and samples datarefs and the aircraft pose from the terminal.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::*;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "xpudp")]
#[command(about = "X-Plane UDP client - watch and write datarefs over the network")]
#[command(version)]
#[command(long_about = "
xpudp talks to X-Plane over its UDP interface. It waits for the simulator's
multicast beacon, then subscribes to datarefs, writes values and samples the
aircraft pose.

Use --json flag for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Client configuration file (YAML)
    #[arg(short, long, global = true, env = "XPUDP_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds to wait for the simulator beacon
    #[arg(
        short,
        long,
        global = true,
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to datarefs and print their values
    Watch(WatchArgs),

    /// Write a dataref value
    Set(SetArgs),

    /// Print the aircraft position and attitude
    Pose(PoseArgs),

    /// Wait for a simulator beacon and describe the simulator
    Beacon,

    /// Print a shell completion script, e.g. `eval "$(xpudp completion bash)"`
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("xpudp={log_level},xplane_udp_client={log_level}").into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let result = execute_command(&cli).await;

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let exit_code = e
                .downcast_ref::<CliError>()
                .map_or(1, CliError::exit_code);
            std::process::exit(exit_code);
        }
    }
}

async fn execute_command(cli: &Cli) -> Result<()> {
    let timeout = Duration::from_secs(cli.timeout);
    match &cli.command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
        Commands::Watch(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::watch::execute(args, config, timeout, cli.json).await
        }
        Commands::Set(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::set::execute(args, config, timeout, cli.json).await
        }
        Commands::Pose(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::pose::execute(args, config, timeout, cli.json).await
        }
        Commands::Beacon => {
            let config = load_config(cli.config.as_deref())?;
            commands::beacon::execute(config, timeout, cli.json).await
        }
    }
}
