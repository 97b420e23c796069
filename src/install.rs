//! Python package installation for an environment's source tree.
//!
//! Every top-level directory of the source tree that carries a `setup.py` is
//! installed in develop mode into the environment's virtualenv, CKAN first.
use crate::environment::Environment;
use crate::provision::Provision;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

const PIP: &str = "/usr/lib/ckan/bin/pip";
const REQUIREMENT_FILES: [&str; 2] = ["requirements.txt", "pip-requirements.txt"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Delete stale `*.pyc` files before installing.
    pub clean: bool,
}

/// One installable package directory under the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePlan {
    pub dir: String,
    pub requirements: Option<String>,
}

impl PackagePlan {
    fn container_dir(&self) -> String {
        format!("/project/{}", self.dir)
    }
}

/// Discover installable packages in `srcdir`, `ckan` first and the rest sorted.
pub fn plan_install(srcdir: &Path) -> Result<Vec<PackagePlan>> {
    let entries =
        fs::read_dir(srcdir).with_context(|| format!("read directory {}", srcdir.display()))?;
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", srcdir.display()))?;
        let path = entry.path();
        if !path.join("setup.py").is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            dirs.push(name.to_string());
        }
    }
    dirs.sort();
    let ckan = dirs
        .iter()
        .position(|dir| dir == "ckan")
        .ok_or_else(|| anyhow!("ckan not found in {}", srcdir.display()))?;
    let first = dirs.remove(ckan);
    dirs.insert(0, first);

    Ok(dirs
        .into_iter()
        .map(|dir| {
            let requirements = REQUIREMENT_FILES
                .iter()
                .find(|file| srcdir.join(&dir).join(file).is_file())
                .map(|file| (*file).to_string());
            PackagePlan { dir, requirements }
        })
        .collect())
}

/// Remove compiled python files under `root`; returns how many were deleted.
pub fn remove_compiled_python(root: &Path) -> Result<usize> {
    let mut removed = 0;
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries =
            fs::read_dir(&dir).with_context(|| format!("read directory {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
            let file_type = entry
                .file_type()
                .with_context(|| format!("stat {}", entry.path().display()))?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && path.extension().is_some_and(|ext| ext == "pyc") {
                fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

pub fn install(env: &Environment, options: &InstallOptions) -> Result<()> {
    let srcdir = env.paths().srcdir();
    let packages = plan_install(srcdir)?;
    if options.clean {
        let removed = remove_compiled_python(srcdir)?;
        tracing::debug!(removed, "removed compiled python files");
    }
    for package in &packages {
        if let Some(requirements) = &package.requirements {
            let path = format!("{}/{}", package.container_dir(), requirements);
            env.runtime()
                .run(&env.project_spec().command([PIP, "install", "-r", path.as_str()]))
                .with_context(|| format!("install requirements for {}", package.dir))?;
        }
    }
    for package in &packages {
        let dir = package.container_dir();
        let output = env
            .runtime()
            .run(&env.project_spec().command([PIP, "install", "-e", dir.as_str()]))
            .with_context(|| format!("install {}", package.dir))?;
        tracing::debug!(
            package = %package.dir,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "develop install complete"
        );
    }
    tracing::debug!(packages = packages.len(), "installed source packages");
    env.fix_project_permissions()
}
