//! On-disk environment descriptors.
//!
//! The environment file in the source directory names the environment and
//! records each child's listen settings; passwords stay in the child's data
//! directory so copies of the source tree never carry them.
use super::paths::{self, EnvironmentPaths};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Current schema version for `.datacats-environment`.
pub const ENVIRONMENT_SCHEMA_VERSION: u32 = 1;
/// Data directory layout version written to `<datadir>/.version`.
pub const DATA_LAYOUT_VERSION: &str = "2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentFile {
    pub schema_version: u32,
    pub name: String,
    pub ckan_version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sites: BTreeMap<String, SiteEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

pub fn read_environment_file(srcdir: &Path) -> Result<EnvironmentFile> {
    let path = paths::environment_file(srcdir);
    let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
    let file: EnvironmentFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse environment file {}", path.display()))?;
    if file.schema_version != ENVIRONMENT_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported environment file schema_version {} in {}",
            file.schema_version,
            path.display()
        ));
    }
    Ok(file)
}

fn read_environment_file_optional(srcdir: &Path) -> Result<Option<EnvironmentFile>> {
    if !paths::environment_file(srcdir).is_file() {
        return Ok(None);
    }
    read_environment_file(srcdir).map(Some)
}

pub fn write_environment_file(srcdir: &Path, file: &EnvironmentFile) -> Result<()> {
    let path = paths::environment_file(srcdir);
    let text = serde_json::to_string_pretty(file).context("serialize environment file")?;
    fs::write(&path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Write the environment-wide descriptor, keeping any recorded sites.
pub fn save_environment(paths: &EnvironmentPaths, name: &str, ckan_version: &str) -> Result<()> {
    let mut file = read_environment_file_optional(paths.srcdir())?.unwrap_or(EnvironmentFile {
        schema_version: ENVIRONMENT_SCHEMA_VERSION,
        name: name.to_string(),
        ckan_version: ckan_version.to_string(),
        sites: BTreeMap::new(),
    });
    file.name = name.to_string();
    file.ckan_version = ckan_version.to_string();
    write_environment_file(paths.srcdir(), &file)?;

    let version_path = paths.version_path();
    fs::write(&version_path, DATA_LAYOUT_VERSION)
        .with_context(|| format!("write {}", version_path.display()))?;
    let location = paths.project_dir_path();
    fs::write(&location, paths.srcdir().to_string_lossy().as_bytes())
        .with_context(|| format!("write {}", location.display()))?;
    Ok(())
}

/// Record one child's listen settings in the environment file.
pub fn save_site(paths: &EnvironmentPaths, child_name: &str, site: SiteEntry) -> Result<()> {
    let mut file = read_environment_file(paths.srcdir())?;
    file.sites.insert(child_name.to_string(), site);
    write_environment_file(paths.srcdir(), &file)
}

pub fn read_srcdir_location(datadir: &Path) -> Result<PathBuf> {
    let path = paths::project_dir_path(datadir);
    let text =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    Ok(PathBuf::from(text.trim()))
}

pub fn write_passwords(path: &Path, passwords: &BTreeMap<String, String>) -> Result<()> {
    let text = serde_json::to_string_pretty(passwords).context("serialize passwords")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn read_passwords_optional(path: &Path) -> Result<Option<BTreeMap<String, String>>> {
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let passwords = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse passwords {}", path.display()))?;
    Ok(Some(passwords))
}

/// Names of the children materialized under `<datadir>/sites`.
///
/// A missing `sites/` directory means no children yet; any other read error
/// is returned.
pub fn list_sites(datadir: &Path) -> Result<BTreeSet<String>> {
    let dir = paths::sites_dir(datadir);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(err) => return Err(err).with_context(|| format!("read directory {}", dir.display())),
    };
    let mut sites = BTreeSet::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            sites.insert(name.to_string());
        }
    }
    Ok(sites)
}

/// Walk up from `start` to the nearest directory holding an environment file.
pub fn find_environment_root(start: &Path) -> Result<PathBuf> {
    if !start.is_dir() {
        return Err(anyhow!("No environment found at {}", start.display()));
    }
    start
        .ancestors()
        .find(|dir| paths::environment_file(dir).is_file())
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("Environment not found in {} or above", start.display()))
}
