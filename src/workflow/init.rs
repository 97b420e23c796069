//! The init workflow: bring up a child for an existing source directory.
//!
//! Used after the data directory was purged, for a source tree copied from
//! elsewhere, or to add another child.
use super::finish::{finish, FinishOptions};
use super::plan::{init_plan, Mode};
use crate::cli::InitArgs;
use crate::config::Settings;
use crate::docker::DockerCli;
use crate::environment::Environment;
use crate::prompt::{SecretReader, TerminalSecrets};
use crate::provision::Provision;
use crate::sequencer::run_phase;
use anyhow::{anyhow, Result};
use std::io::{self, Write};
use std::path::Path;

pub fn run_init(args: &InitArgs, settings: &Settings) -> Result<()> {
    let runtime = DockerCli::from_command_line(&settings.docker)?;
    let directory = args
        .environment_dir
        .as_deref()
        .unwrap_or_else(|| Path::new("."));
    let mut env = Environment::load(directory, &args.child, settings, Box::new(runtime))?;
    if let Some(address) = &args.address {
        env.set_address(address);
    }
    if let Some(port) = args.port {
        env.set_port(port);
    }
    tracing::info!(
        name = env.name(),
        child = env.child_name(),
        port = env.port(),
        ckan_version = env.ckan_version(),
        srcdir = %env.paths().srcdir().display(),
        "initializing environment"
    );

    let options = FinishOptions {
        start_web: !args.image_only,
        create_sysadmin: !args.no_sysadmin,
        address: env.address().to_string(),
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mode = provision_existing(&env, &options, &mut out, &mut TerminalSecrets)?;
    tracing::debug!(?mode, "init complete");
    Ok(())
}

/// Run the init steps and the shared finisher against `env`.
///
/// An already materialized child is rejected before anything is touched.
pub fn provision_existing(
    env: &dyn Provision,
    options: &FinishOptions,
    out: &mut dyn Write,
    secrets: &mut dyn SecretReader,
) -> Result<Mode> {
    if env.children().contains(env.child_name()) {
        return Err(anyhow!(
            "Child environment {} already exists.",
            env.child_name()
        ));
    }

    let mode = Mode::detect(env);
    let header = format!(
        "Creating environment {name}/{child} from existing environment directory \"{name}\"",
        name = env.name(),
        child = env.child_name()
    );
    let steps = init_plan(mode);
    run_phase(out, &header, env, steps.as_slice())?;

    finish(env, options, out, secrets)?;
    Ok(mode)
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
