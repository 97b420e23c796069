//! The create workflow: a new environment, or a new child of one.
use super::finish::{finish, FinishOptions};
use super::plan::{create_plan, Mode};
use crate::cli::CreateArgs;
use crate::config::Settings;
use crate::docker::DockerCli;
use crate::environment::Environment;
use crate::prompt::{SecretReader, TerminalSecrets};
use crate::provision::Provision;
use crate::sequencer::run_phase;
use crate::validate::valid_deploy_name;
use anyhow::Result;
use std::io::{self, Write};
use std::process::ExitCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOptions {
    /// Scaffold and enable the starter theme extension.
    pub skin: bool,
    pub finish: FinishOptions,
}

impl CreateOptions {
    pub fn from_args(args: &CreateArgs) -> Self {
        Self {
            skin: !args.bare,
            finish: FinishOptions {
                start_web: !args.image_only,
                create_sysadmin: !args.no_sysadmin,
                address: args.address.clone(),
            },
        }
    }
}

pub fn run_create(args: &CreateArgs, settings: &Settings) -> Result<ExitCode> {
    let runtime = DockerCli::from_command_line(&settings.docker)?;
    let mut env = match Environment::new(
        &args.environment_dir,
        args.ckan.as_deref(),
        &args.child,
        args.port,
        settings,
        Box::new(runtime),
    ) {
        Ok(env) => env,
        Err(err) => {
            println!("{err:#}");
            return Ok(ExitCode::from(1));
        }
    };
    env.set_address(&args.address);
    tracing::info!(
        name = env.name(),
        child = env.child_name(),
        port = env.port(),
        ckan_version = env.ckan_version(),
        datadir = %env.paths().datadir().display(),
        "creating environment"
    );

    let options = CreateOptions::from_args(args);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mode = provision_new(&env, &options, &mut out, &mut TerminalSecrets)?;
    tracing::debug!(?mode, "create complete");
    Ok(ExitCode::SUCCESS)
}

/// Run the create steps and the shared finisher against `env`.
pub fn provision_new(
    env: &dyn Provision,
    options: &CreateOptions,
    out: &mut dyn Write,
    secrets: &mut dyn SecretReader,
) -> Result<Mode> {
    if !valid_deploy_name(env.name()) {
        writeln!(out, "WARNING: When deploying you will need to choose a")?;
        writeln!(out, "target name that is at least 5 characters long")?;
        writeln!(out)?;
    }

    let mode = Mode::detect(env);
    let header = format!(
        "Creating environment \"{}/{}\"",
        env.name(),
        env.child_name()
    );
    let steps = create_plan(mode, options.skin);
    run_phase(out, &header, env, steps.as_slice())?;

    finish(env, &options.finish, out, secrets)?;
    Ok(mode)
}

#[cfg(test)]
#[path = "create_tests.rs"]
mod tests;
