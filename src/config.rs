//! Tool settings.
//!
//! Settings come from built-in defaults, an optional `config.json` in the
//! datacats home directory, and a couple of environment overrides, in that
//! order of precedence.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the datacats home directory.
pub const HOME_ENV: &str = "DATACATS_HOME";
/// Environment variable overriding the container CLI command.
pub const DOCKER_ENV: &str = "DATACATS_DOCKER";
/// File name of the optional settings file inside the home directory.
pub const SETTINGS_FILE: &str = "config.json";

/// Container images used by an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub web: String,
    pub postgres: String,
    pub solr: String,
    /// Prefix for the preload image; the CKAN version is appended as the tag.
    pub preload_prefix: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            web: "datacats/web".to_string(),
            postgres: "datacats/postgres".to_string(),
            solr: "datacats/solr".to_string(),
            preload_prefix: "datacats/web:preload-".to_string(),
        }
    }
}

impl ImageSettings {
    /// Return the preload image carrying CKAN source and virtualenv for `version`.
    pub fn preload(&self, version: &str) -> String {
        format!("{}{version}", self.preload_prefix)
    }
}

/// Resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding per-environment data directories.
    pub home: PathBuf,
    /// Container CLI command line, e.g. `docker` or `sudo docker`.
    pub docker: String,
    pub images: ImageSettings,
    pub supported_ckan_versions: Vec<String>,
    pub default_ckan_version: String,
    /// How long `ckan_db_init` keeps retrying while the database starts.
    pub db_init_retry_seconds: u64,
    pub db_init_retry_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home: default_home(),
            docker: "docker".to_string(),
            images: ImageSettings::default(),
            supported_ckan_versions: vec!["2.3".to_string()],
            default_ckan_version: "2.3".to_string(),
            db_init_retry_seconds: 20,
            db_init_retry_delay_ms: 2000,
        }
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".datacats")
}

/// Load settings, applying `config.json` and environment overrides.
pub fn load_settings() -> Result<Settings> {
    let home = std::env::var_os(HOME_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(default_home);
    let mut settings = read_settings_file(&home)?.unwrap_or_default();
    settings.home = home;
    if let Ok(docker) = std::env::var(DOCKER_ENV) {
        if !docker.trim().is_empty() {
            settings.docker = docker;
        }
    }
    validate_settings(&settings)?;
    Ok(settings)
}

/// Read `<home>/config.json` when present.
pub fn read_settings_file(home: &Path) -> Result<Option<Settings>> {
    let path = home.join(SETTINGS_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(&path).with_context(|| format!("read settings {}", path.display()))?;
    let settings: Settings = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse settings JSON {}", path.display()))?;
    Ok(Some(settings))
}

/// Reject settings that cannot drive a provisioning run.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.docker.trim().is_empty() {
        return Err(anyhow!("docker command must be non-empty"));
    }
    let images = [
        ("web", &settings.images.web),
        ("postgres", &settings.images.postgres),
        ("solr", &settings.images.solr),
        ("preload_prefix", &settings.images.preload_prefix),
    ];
    for (label, image) in images {
        if image.trim().is_empty() {
            return Err(anyhow!("images.{label} must be non-empty"));
        }
    }
    if settings.supported_ckan_versions.is_empty() {
        return Err(anyhow!("supported_ckan_versions must list at least one version"));
    }
    if !settings
        .supported_ckan_versions
        .contains(&settings.default_ckan_version)
    {
        return Err(anyhow!(
            "default_ckan_version {:?} is not in supported_ckan_versions",
            settings.default_ckan_version
        ));
    }
    Ok(())
}

impl Settings {
    /// Resolve the CKAN version for a new environment.
    pub fn resolve_ckan_version(&self, requested: Option<&str>) -> Result<String> {
        let version = requested
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(self.default_ckan_version.as_str());
        if !self.supported_ckan_versions.iter().any(|v| v == version) {
            return Err(anyhow!(
                "CKAN version {version} is not supported (supported: {})",
                self.supported_ckan_versions.join(", ")
            ));
        }
        Ok(version.to_string())
    }
}
