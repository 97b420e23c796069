//! Static step lists for the create and init workflows.
//!
//! Membership depends only on the [`Mode`] and the skin flag; order never
//! changes.
use crate::provision::Provision;
use crate::sequencer::Step;
use anyhow::Result;

/// Whether a workflow builds the environment from scratch or only adds a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Full,
    ChildOnly,
}

impl Mode {
    /// Decided once per workflow, before any step runs.
    pub fn detect(env: &dyn Provision) -> Self {
        if env.data_exists() {
            Mode::ChildOnly
        } else {
            Mode::Full
        }
    }

    pub fn is_full(self) -> bool {
        self == Mode::Full
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    CreateDirectories { create_project_dir: bool },
    CreateBashProfile,
    CreateVirtualenv,
    Save,
    CreateSource,
    CreateCkanIni,
    SaveChild,
    StartPostgresAndSolr,
    FixStoragePermissions,
    UpdateCkanIni { skin: bool },
    FixProjectPermissions,
    CreateInstallTemplateSkin,
    CkanDbInit,
}

impl<'a> Step<dyn Provision + 'a> for ProvisionStep {
    fn label(&self) -> String {
        match self {
            ProvisionStep::CreateDirectories { create_project_dir } => {
                format!("create_directories(create_project_dir={create_project_dir})")
            }
            ProvisionStep::CreateBashProfile => "create_bash_profile".to_string(),
            ProvisionStep::CreateVirtualenv => "create_virtualenv".to_string(),
            ProvisionStep::Save => "save".to_string(),
            ProvisionStep::CreateSource => "create_source".to_string(),
            ProvisionStep::CreateCkanIni => "create_ckan_ini".to_string(),
            ProvisionStep::SaveChild => "save_child".to_string(),
            ProvisionStep::StartPostgresAndSolr => "start_postgres_and_solr".to_string(),
            ProvisionStep::FixStoragePermissions => "fix_storage_permissions".to_string(),
            ProvisionStep::UpdateCkanIni { skin } => format!("update_ckan_ini(skin={skin})"),
            ProvisionStep::FixProjectPermissions => "fix_project_permissions".to_string(),
            ProvisionStep::CreateInstallTemplateSkin => "create_install_template_skin".to_string(),
            ProvisionStep::CkanDbInit => "ckan_db_init".to_string(),
        }
    }

    fn execute(&self, env: &(dyn Provision + 'a)) -> Result<()> {
        match *self {
            ProvisionStep::CreateDirectories { create_project_dir } => {
                env.create_directories(create_project_dir)
            }
            ProvisionStep::CreateBashProfile => env.create_bash_profile(),
            ProvisionStep::CreateVirtualenv => env.create_virtualenv(),
            ProvisionStep::Save => env.save(),
            ProvisionStep::CreateSource => env.create_source(),
            ProvisionStep::CreateCkanIni => env.create_ckan_ini(),
            ProvisionStep::SaveChild => env.save_child(),
            ProvisionStep::StartPostgresAndSolr => env.start_postgres_and_solr(),
            ProvisionStep::FixStoragePermissions => env.fix_storage_permissions(),
            ProvisionStep::UpdateCkanIni { skin } => env.update_ckan_ini(skin),
            ProvisionStep::FixProjectPermissions => env.fix_project_permissions(),
            ProvisionStep::CreateInstallTemplateSkin => env.create_install_template_skin(),
            ProvisionStep::CkanDbInit => env.ckan_db_init(),
        }
    }
}

pub fn create_plan(mode: Mode, skin: bool) -> Vec<ProvisionStep> {
    let full = mode.is_full();
    let mut steps = vec![
        ProvisionStep::CreateDirectories {
            create_project_dir: full,
        },
        ProvisionStep::CreateBashProfile,
    ];
    if full {
        steps.extend([
            ProvisionStep::CreateVirtualenv,
            ProvisionStep::Save,
            ProvisionStep::CreateSource,
            ProvisionStep::CreateCkanIni,
        ]);
    }
    steps.extend([
        ProvisionStep::SaveChild,
        ProvisionStep::StartPostgresAndSolr,
        ProvisionStep::FixStoragePermissions,
        ProvisionStep::UpdateCkanIni { skin },
        ProvisionStep::FixProjectPermissions,
    ]);
    if full && skin {
        steps.push(ProvisionStep::CreateInstallTemplateSkin);
    }
    steps.push(ProvisionStep::CkanDbInit);
    steps
}

pub fn init_plan(mode: Mode) -> Vec<ProvisionStep> {
    let mut steps = vec![ProvisionStep::CreateDirectories {
        create_project_dir: false,
    }];
    if mode.is_full() {
        steps.extend([ProvisionStep::Save, ProvisionStep::CreateVirtualenv]);
    }
    steps.extend([
        ProvisionStep::SaveChild,
        ProvisionStep::StartPostgresAndSolr,
        ProvisionStep::FixStoragePermissions,
        ProvisionStep::FixProjectPermissions,
    ]);
    steps
}
