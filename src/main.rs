use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod docker;
mod environment;
mod install;
mod prompt;
mod provision;
mod sequencer;
mod templates;
mod util;
mod validate;
mod workflow;

use cli::{Command, RootArgs};

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "DATACATS_LOG";

fn main() -> Result<ExitCode> {
    let args = RootArgs::parse();
    init_logging(args.verbose);
    let settings = config::load_settings()?;
    tracing::debug!(home = %settings.home.display(), docker = %settings.docker, "settings loaded");

    match args.command {
        Command::Create(create) => workflow::run_create(&create, &settings),
        Command::Init(init) => {
            workflow::run_init(&init, &settings)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
