//! Shared tail of the create and init workflows.
use super::plan::ProvisionStep;
use crate::install::InstallOptions;
use crate::prompt::{confirm_password, PromptOutcome, SecretReader};
use crate::provision::Provision;
use crate::sequencer::run_phase;
use anyhow::Result;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishOptions {
    pub start_web: bool,
    pub create_sysadmin: bool,
    /// Address the web server binds to.
    pub address: String,
}

/// Install packages, initialize the database, then optionally start the web
/// server and create the admin account.
pub fn finish(
    env: &dyn Provision,
    options: &FinishOptions,
    out: &mut dyn Write,
    secrets: &mut dyn SecretReader,
) -> Result<()> {
    env.install_dependencies(&InstallOptions { clean: false })?;

    run_phase(out, "Initializing database", env, &[ProvisionStep::CkanDbInit])?;

    if options.start_web {
        env.start_web(&options.address)?;
        writeln!(out, "Starting web server at {} ...", env.web_address())?;
        out.flush()?;
    }

    if options.create_sysadmin {
        match confirm_password(secrets, out)? {
            PromptOutcome::Accepted(password) => env.create_admin_set_password(&password)?,
            PromptOutcome::Cancelled => {
                writeln!(out)?;
                tracing::info!("admin account creation cancelled");
            }
        }
    }

    // Without a web server nothing needs the database or search index.
    if !options.start_web {
        env.stop_postgres_and_solr()?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "finish_tests.rs"]
mod tests;
