//! Typed paths into an environment's data and source layout.
use std::path::{Path, PathBuf};

/// File in the source directory holding the environment descriptor.
pub const ENVIRONMENT_FILE: &str = ".datacats-environment";

/// Locates the data, site, and source directories of one environment child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentPaths {
    datadir: PathBuf,
    child_name: String,
    srcdir: PathBuf,
}

impl EnvironmentPaths {
    pub fn new(datadir: PathBuf, child_name: &str, srcdir: PathBuf) -> Self {
        Self {
            datadir,
            child_name: child_name.to_string(),
            srcdir,
        }
    }

    /// Return the per-environment data directory (`<home>/<name>`).
    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    /// Return the project source directory.
    pub fn srcdir(&self) -> &Path {
        &self.srcdir
    }

    /// Return the `sites/` directory holding one directory per child.
    pub fn sites_dir(&self) -> PathBuf {
        sites_dir(&self.datadir)
    }

    /// Return the data directory for this child.
    pub fn sitedir(&self) -> PathBuf {
        self.sites_dir().join(&self.child_name)
    }

    /// Return the shared virtualenv directory.
    pub fn venv_dir(&self) -> PathBuf {
        self.datadir.join("venv")
    }

    /// Return the `.version` layout marker path.
    pub fn version_path(&self) -> PathBuf {
        self.datadir.join(".version")
    }

    /// Return the `project-dir` back-reference to the source directory.
    pub fn project_dir_path(&self) -> PathBuf {
        project_dir_path(&self.datadir)
    }

    pub fn postgres_dir(&self) -> PathBuf {
        self.sitedir().join("postgres")
    }

    pub fn solr_dir(&self) -> PathBuf {
        self.sitedir().join("solr")
    }

    pub fn files_dir(&self) -> PathBuf {
        self.sitedir().join("files")
    }

    pub fn run_dir(&self) -> PathBuf {
        self.sitedir().join("run")
    }

    pub fn passwords_path(&self) -> PathBuf {
        self.sitedir().join("passwords.json")
    }

    pub fn bash_profile_path(&self) -> PathBuf {
        self.run_dir().join(".bash_profile")
    }

    pub fn admin_input_path(&self) -> PathBuf {
        self.run_dir().join("admin.json")
    }

    pub fn ckan_ini_path(&self) -> PathBuf {
        self.srcdir.join("development.ini")
    }

    pub fn schema_xml_path(&self) -> PathBuf {
        self.srcdir.join("schema.xml")
    }
}

pub fn sites_dir(datadir: &Path) -> PathBuf {
    datadir.join("sites")
}

pub fn environment_file(srcdir: &Path) -> PathBuf {
    srcdir.join(ENVIRONMENT_FILE)
}

pub fn project_dir_path(datadir: &Path) -> PathBuf {
    datadir.join("project-dir")
}
