//! Operations the provisioning workflows perform on an environment.
//!
//! Every side-effecting operation must be idempotent or guard itself against
//! re-execution: a failed workflow is recovered by running it again, not by
//! resuming it.
use crate::install::InstallOptions;
use anyhow::Result;
use std::collections::BTreeSet;

pub trait Provision {
    fn name(&self) -> &str;
    fn child_name(&self) -> &str;
    /// Children already materialized for this environment's data.
    fn children(&self) -> &BTreeSet<String>;
    /// Whether the environment's data directory already exists.
    fn data_exists(&self) -> bool;

    fn create_directories(&self, create_project_dir: bool) -> Result<()>;
    fn create_bash_profile(&self) -> Result<()>;
    fn create_virtualenv(&self) -> Result<()>;
    /// Persist the environment-wide descriptor.
    fn save(&self) -> Result<()>;
    fn create_source(&self) -> Result<()>;
    fn create_ckan_ini(&self) -> Result<()>;
    /// Persist the child-specific descriptor (port, address, passwords).
    fn save_child(&self) -> Result<()>;
    fn start_postgres_and_solr(&self) -> Result<()>;
    fn fix_storage_permissions(&self) -> Result<()>;
    fn update_ckan_ini(&self, skin: bool) -> Result<()>;
    fn fix_project_permissions(&self) -> Result<()>;
    fn create_install_template_skin(&self) -> Result<()>;
    fn ckan_db_init(&self) -> Result<()>;
    fn install_dependencies(&self, options: &InstallOptions) -> Result<()>;
    fn start_web(&self, address: &str) -> Result<()>;
    fn web_address(&self) -> String;
    fn stop_postgres_and_solr(&self) -> Result<()>;
    fn create_admin_set_password(&self, password: &str) -> Result<()>;
}
