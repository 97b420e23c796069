//! Environment descriptors and the operations that materialize them.
//!
//! An environment is a CKAN source directory plus a data directory under the
//! datacats home. Each environment hosts one or more children, each with its
//! own database, search index, and uploaded files.
mod actions;
pub mod ckan_ini;
pub mod paths;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use crate::config::Settings;
use crate::docker::{ContainerRuntime, RunSpec};
use crate::util::{absolute_path, random_secret};
use crate::validate::valid_name;
use anyhow::{anyhow, Result};
use paths::EnvironmentPaths;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::net::TcpListener;
use std::path::Path;

pub const DEFAULT_CHILD_NAME: &str = "primary";
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

const BASE_PORT: u16 = 5000;
const PORT_SPAN: u16 = 1000;
const SECRET_LEN: usize = 16;

/// Keys of the generated per-child service passwords.
pub const PASSWORD_KEYS: [&str; 4] = [
    "BEAKER_SESSION_SECRET",
    "CKAN_PASSWORD",
    "DATASTORE_RO_PASSWORD",
    "DATASTORE_RW_PASSWORD",
];

/// One environment/child pair.
pub struct Environment {
    name: String,
    child_name: String,
    ckan_version: String,
    port: u16,
    /// Set when the port came from the user or the saved child; otherwise it
    /// is re-picked whenever the address changes.
    port_pinned: bool,
    address: String,
    children: BTreeSet<String>,
    passwords: BTreeMap<String, String>,
    paths: EnvironmentPaths,
    settings: Settings,
    runtime: Box<dyn ContainerRuntime>,
}

impl Environment {
    /// Prepare a brand-new environment (or a new child of an existing one)
    /// at `directory`, whose last component becomes the environment name.
    pub fn new(
        directory: &Path,
        ckan_version: Option<&str>,
        child_name: &str,
        port: Option<u16>,
        settings: &Settings,
        runtime: Box<dyn ContainerRuntime>,
    ) -> Result<Self> {
        let ckan_version = settings.resolve_ckan_version(ckan_version)?;
        let directory = absolute_path(directory)?;
        let name = directory
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                anyhow!(
                    "Cannot determine an environment name from {}",
                    directory.display()
                )
            })?
            .to_string();
        if !valid_name(&name) {
            return Err(anyhow!(
                "Please choose an environment name starting with a letter and including only lowercase letters and digits"
            ));
        }
        ensure_valid_child_name(child_name)?;
        let workdir = directory
            .parent()
            .filter(|parent| parent.is_dir())
            .ok_or_else(|| anyhow!("Parent directory for environment does not exist"))?;

        let datadir = settings.home.join(&name);
        // A child of an existing environment follows the data directory back to
        // wherever the source directory lives now.
        let srcdir = if datadir.is_dir() {
            store::read_srcdir_location(&datadir)?
        } else {
            workdir.join(&name)
        };
        let paths = EnvironmentPaths::new(datadir, child_name, srcdir);

        if paths.sitedir().is_dir() {
            return Err(anyhow!(
                "Site data directory {} already exists",
                paths.sitedir().display()
            ));
        }
        if paths.srcdir().is_dir() && !paths.datadir().is_dir() {
            return Err(anyhow!(
                "Environment directory exists, but data directory does not.\nIf you simply want to recreate the data directory, run \"datacats init\" in the environment directory."
            ));
        }

        let address = DEFAULT_ADDRESS.to_string();
        let port_pinned = port.is_some();
        let port = port.unwrap_or_else(|| choose_port(&name, child_name, &address));
        let children = store::list_sites(paths.datadir())?;
        tracing::debug!(
            name = %name,
            child = child_name,
            port,
            srcdir = %paths.srcdir().display(),
            "new environment descriptor"
        );
        Ok(Self {
            name,
            child_name: child_name.to_string(),
            ckan_version,
            port,
            port_pinned,
            address,
            children,
            passwords: generate_passwords(),
            paths,
            settings: settings.clone(),
            runtime,
        })
    }

    /// Load the environment whose source directory contains `directory`.
    pub fn load(
        directory: &Path,
        child_name: &str,
        settings: &Settings,
        runtime: Box<dyn ContainerRuntime>,
    ) -> Result<Self> {
        ensure_valid_child_name(child_name)?;
        let start = absolute_path(directory)?;
        let srcdir = store::find_environment_root(&start)?;
        let file = store::read_environment_file(&srcdir)?;
        let paths = EnvironmentPaths::new(settings.home.join(&file.name), child_name, srcdir);

        let site = file.sites.get(child_name);
        let address = site
            .and_then(|site| site.address.clone())
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        let saved_port = site.and_then(|site| site.port);
        let port = saved_port.unwrap_or_else(|| choose_port(&file.name, child_name, &address));
        let passwords =
            store::read_passwords_optional(&paths.passwords_path())?.unwrap_or_else(generate_passwords);
        let children = store::list_sites(paths.datadir())?;
        tracing::debug!(
            name = %file.name,
            child = child_name,
            port,
            children = children.len(),
            "loaded environment descriptor"
        );
        Ok(Self {
            name: file.name,
            child_name: child_name.to_string(),
            ckan_version: file.ckan_version,
            port,
            port_pinned: saved_port.is_some(),
            address,
            children,
            passwords,
            paths,
            settings: settings.clone(),
            runtime,
        })
    }

    pub fn ckan_version(&self) -> &str {
        &self.ckan_version
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
        self.port_pinned = true;
    }

    pub fn set_address(&mut self, address: &str) {
        if address == self.address {
            return;
        }
        self.address = address.to_string();
        if !self.port_pinned {
            self.port = choose_port(&self.name, &self.child_name, &self.address);
        }
    }

    pub fn paths(&self) -> &EnvironmentPaths {
        &self.paths
    }

    pub fn passwords(&self) -> &BTreeMap<String, String> {
        &self.passwords
    }

    pub(crate) fn runtime(&self) -> &dyn ContainerRuntime {
        self.runtime.as_ref()
    }

    pub(crate) fn container_name(&self, role: &str) -> String {
        format!("datacats_{role}_{}_{}", self.name, self.child_name)
    }

    fn web_spec(&self) -> RunSpec {
        RunSpec::new(self.settings.images.web.as_str())
    }

    fn preload_spec(&self) -> RunSpec {
        RunSpec::new(self.settings.images.preload(&self.ckan_version))
    }

    /// One-off web container with the virtualenv and project mounted.
    pub(crate) fn project_spec(&self) -> RunSpec {
        self.web_spec()
            .rw(self.paths.venv_dir(), "/usr/lib/ckan")
            .rw(self.paths.srcdir(), "/project")
    }

    /// Environment variables that point CKAN at this child's services.
    fn ckan_env(&self) -> BTreeMap<String, String> {
        let password = |key: &str| self.passwords.get(key).cloned().unwrap_or_default();
        let mut env = BTreeMap::new();
        env.insert(
            "CKAN_SQLALCHEMY_URL".to_string(),
            format!("postgresql://ckan:{}@db:5432/ckan", password("CKAN_PASSWORD")),
        );
        env.insert(
            "CKAN_DATASTORE_READ_URL".to_string(),
            format!(
                "postgresql://ckan_datastore_readonly:{}@db:5432/ckan_datastore",
                password("DATASTORE_RO_PASSWORD")
            ),
        );
        env.insert(
            "CKAN_DATASTORE_WRITE_URL".to_string(),
            format!(
                "postgresql://ckan_datastore_readwrite:{}@db:5432/ckan_datastore",
                password("DATASTORE_RW_PASSWORD")
            ),
        );
        env.insert(
            "CKAN_SOLR_URL".to_string(),
            "http://solr:8080/solr".to_string(),
        );
        env.insert(
            "BEAKER_SESSION_SECRET".to_string(),
            password("BEAKER_SESSION_SECRET"),
        );
        env
    }

    /// One-off web container linked to this child's database and search index.
    fn db_spec(&self) -> RunSpec {
        self.web_spec()
            .envs(&self.ckan_env())
            .ro(self.paths.venv_dir(), "/usr/lib/ckan")
            .ro(self.paths.srcdir(), "/project")
            .link(self.container_name("postgres"), "db")
            .link(self.container_name("solr"), "solr")
    }
}

fn ensure_valid_child_name(child_name: &str) -> Result<()> {
    if !valid_name(child_name) {
        return Err(anyhow!("{child_name} is not a valid child name."));
    }
    Ok(())
}

fn generate_passwords() -> BTreeMap<String, String> {
    PASSWORD_KEYS
        .iter()
        .map(|key| (key.to_string(), random_secret(SECRET_LEN)))
        .collect()
}

/// Pick a listen port in 5000-5999, starting from a position derived from the
/// environment and child names and skipping ports already bound on `address`.
pub(crate) fn choose_port(name: &str, child_name: &str, address: &str) -> u16 {
    let mut hasher = DefaultHasher::new();
    (name, child_name).hash(&mut hasher);
    let start = (hasher.finish() % u64::from(PORT_SPAN)) as u16;
    (0..PORT_SPAN)
        .map(|offset| BASE_PORT + (start + offset) % PORT_SPAN)
        .find(|&port| port_available(address, port))
        .unwrap_or(BASE_PORT + start)
}

fn port_available(address: &str, port: u16) -> bool {
    TcpListener::bind((address, port)).is_ok()
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
