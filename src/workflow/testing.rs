//! Recording `Provision` fake and scripted prompt input for workflow tests.
use crate::install::InstallOptions;
use crate::prompt::{SecretInput, SecretReader};
use crate::provision::Provision;
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};

pub(crate) struct RecordingEnv {
    name: String,
    child_name: String,
    children: BTreeSet<String>,
    data_exists: bool,
    fail_on: Option<String>,
    calls: RefCell<Vec<String>>,
}

impl RecordingEnv {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            child_name: "primary".to_string(),
            children: BTreeSet::new(),
            data_exists: false,
            fail_on: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn with_data(mut self) -> Self {
        self.data_exists = true;
        self
    }

    pub(crate) fn with_child(mut self, child_name: &str) -> Self {
        self.child_name = child_name.to_string();
        self
    }

    pub(crate) fn with_existing_child(mut self, child_name: &str) -> Self {
        self.children.insert(child_name.to_string());
        self
    }

    /// Make the operation whose recorded call starts with `operation` fail.
    pub(crate) fn failing_on(mut self, operation: &str) -> Self {
        self.fail_on = Some(operation.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        let fails = self
            .fail_on
            .as_deref()
            .is_some_and(|operation| call.starts_with(operation));
        self.calls.borrow_mut().push(call.clone());
        if fails {
            return Err(anyhow!("{call} failed"));
        }
        Ok(())
    }
}

impl Provision for RecordingEnv {
    fn name(&self) -> &str {
        &self.name
    }

    fn child_name(&self) -> &str {
        &self.child_name
    }

    fn children(&self) -> &BTreeSet<String> {
        &self.children
    }

    fn data_exists(&self) -> bool {
        self.data_exists
    }

    fn create_directories(&self, create_project_dir: bool) -> Result<()> {
        self.record(format!("create_directories({create_project_dir})"))
    }

    fn create_bash_profile(&self) -> Result<()> {
        self.record("create_bash_profile".to_string())
    }

    fn create_virtualenv(&self) -> Result<()> {
        self.record("create_virtualenv".to_string())
    }

    fn save(&self) -> Result<()> {
        self.record("save".to_string())
    }

    fn create_source(&self) -> Result<()> {
        self.record("create_source".to_string())
    }

    fn create_ckan_ini(&self) -> Result<()> {
        self.record("create_ckan_ini".to_string())
    }

    fn save_child(&self) -> Result<()> {
        self.record("save_child".to_string())
    }

    fn start_postgres_and_solr(&self) -> Result<()> {
        self.record("start_postgres_and_solr".to_string())
    }

    fn fix_storage_permissions(&self) -> Result<()> {
        self.record("fix_storage_permissions".to_string())
    }

    fn update_ckan_ini(&self, skin: bool) -> Result<()> {
        self.record(format!("update_ckan_ini({skin})"))
    }

    fn fix_project_permissions(&self) -> Result<()> {
        self.record("fix_project_permissions".to_string())
    }

    fn create_install_template_skin(&self) -> Result<()> {
        self.record("create_install_template_skin".to_string())
    }

    fn ckan_db_init(&self) -> Result<()> {
        self.record("ckan_db_init".to_string())
    }

    fn install_dependencies(&self, options: &InstallOptions) -> Result<()> {
        self.record(format!("install_dependencies(clean={})", options.clean))
    }

    fn start_web(&self, address: &str) -> Result<()> {
        self.record(format!("start_web({address})"))
    }

    fn web_address(&self) -> String {
        "http://127.0.0.1:5123/".to_string()
    }

    fn stop_postgres_and_solr(&self) -> Result<()> {
        self.record("stop_postgres_and_solr".to_string())
    }

    fn create_admin_set_password(&self, password: &str) -> Result<()> {
        self.record(format!("create_admin_set_password({password})"))
    }
}

/// Replays scripted answers; panics if read more often than scripted.
pub(crate) struct ScriptedSecrets {
    inputs: VecDeque<SecretInput>,
    pub(crate) reads: usize,
}

impl ScriptedSecrets {
    pub(crate) fn new(inputs: &[&str]) -> Self {
        Self {
            inputs: inputs
                .iter()
                .map(|value| SecretInput::Entered(value.to_string()))
                .collect(),
            reads: 0,
        }
    }

    pub(crate) fn interrupted() -> Self {
        Self {
            inputs: VecDeque::from([SecretInput::Interrupted]),
            reads: 0,
        }
    }
}

impl SecretReader for ScriptedSecrets {
    fn read_secret(&mut self, _prompt: &str) -> Result<SecretInput> {
        self.reads += 1;
        Ok(self
            .inputs
            .pop_front()
            .expect("prompt read more inputs than scripted"))
    }
}
