//! CLI argument parsing for environment provisioning.
use crate::environment::{DEFAULT_ADDRESS, DEFAULT_CHILD_NAME};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "datacats",
    version,
    about = "Provision local CKAN development environments",
    after_help = "Examples:\n  datacats create ~/projects/mysite\n  datacats create --bare --no-sysadmin ~/projects/mysite 5005\n  datacats create --child staging ~/projects/mysite\n  datacats init ~/projects/mysite",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Emit debug logs to stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Create(CreateArgs),
    Init(InitArgs),
}

/// Create command inputs for a new environment or child.
#[derive(Parser, Debug)]
#[command(
    about = "Create a new environment",
    after_help = "ENVIRONMENT_DIR is a path for the new environment directory. The last\npart of this path will be used as the environment name."
)]
pub struct CreateArgs {
    /// Bare CKAN site with no example extension
    #[arg(short = 'b', long)]
    pub bare: bool,

    /// Create the environment but don't start containers
    #[arg(short = 'i', long)]
    pub image_only: bool,

    /// Don't prompt for an initial sysadmin user account
    #[arg(short = 'n', long)]
    pub no_sysadmin: bool,

    /// Pick a child environment to create
    #[arg(short = 'c', long, value_name = "NAME", default_value = DEFAULT_CHILD_NAME)]
    pub child: String,

    /// Address to listen on
    #[arg(long, value_name = "IP", default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Use this CKAN version instead of the default
    #[arg(long, value_name = "CKAN_VERSION")]
    pub ckan: Option<String>,

    pub environment_dir: PathBuf,

    pub port: Option<u16>,
}

/// Init command inputs for an existing environment directory.
#[derive(Parser, Debug)]
#[command(
    about = "Initialize a purged environment or copied environment directory",
    after_help = "ENVIRONMENT_DIR is an existing datacats environment directory. Defaults to '.'"
)]
pub struct InitArgs {
    /// Create the environment but don't start containers
    #[arg(short = 'i', long)]
    pub image_only: bool,

    /// Don't prompt for an initial sysadmin user account
    #[arg(short = 'n', long)]
    pub no_sysadmin: bool,

    /// Pick a child environment to initialize
    #[arg(short = 'c', long, value_name = "NAME", default_value = DEFAULT_CHILD_NAME)]
    pub child: String,

    /// Address to listen on (defaults to the child's saved address)
    #[arg(long, value_name = "IP")]
    pub address: Option<String>,

    pub environment_dir: Option<PathBuf>,

    pub port: Option<u16>,
}
