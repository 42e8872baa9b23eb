//! Deterministic orchestration of black-box simulation models.
//!
//! Reads `simchain.toml`, drives each stage's model through an engine bridge
//! process, and prints the harvested results.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use simchain::cli::{RunOverrides, cmd_check, cmd_init, cmd_run, load_run_config};
use simchain::exit_codes;
use simchain::io::bridge::BridgeEngine;
use simchain::io::config::DEFAULT_CONFIG_FILE;
use simchain::logging;

#[derive(Parser)]
#[command(
    name = "simchain",
    version,
    about = "Run and chain simulation models through declarative variable mappings"
)]
struct Cli {
    /// Run configuration; relative model and mapping paths resolve against its directory.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a template config and mapping documents next to `--config` if missing.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Print each stage's mappings and report problems without opening an engine.
    Check,
    /// Execute the configured stages.
    Run {
        /// Run a single stage with its own inputs.
        #[arg(long, value_name = "STAGE", conflicts_with = "chain")]
        only: Option<String>,
        /// Run every stage in order, propagating values.
        #[arg(long)]
        chain: bool,
        /// Ask the engine to show its UI.
        #[arg(long)]
        visible: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::for_error(&err));
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Check => cmd_check(&load_run_config(&cli.config)?),
        Command::Run {
            only,
            chain,
            visible,
        } => {
            let overrides = RunOverrides {
                only,
                chain,
                visible,
            };
            let cfg = overrides.apply(load_run_config(&cli.config)?)?;
            let engine = BridgeEngine::from_config(&cfg.engine);
            cmd_run(&engine, &cfg)
        }
    }
}
