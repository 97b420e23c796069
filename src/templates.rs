//! Files written into environments, embedded at build time.

/// Shell profile written to each child's run directory.
pub const BASH_PROFILE_SH: &str = include_str!("../templates/bash_profile.sh");
/// Script run inside the web image to create or update the sysadmin account.
pub const UPDATE_ADD_ADMIN_PY: &str = include_str!("../templates/update_add_admin.py");

/// Placeholder replaced with `<name>/<child>` in [`BASH_PROFILE_SH`].
pub const ENVIRONMENT_PLACEHOLDER: &str = "__ENVIRONMENT__";

/// Render the shell profile for one environment child.
pub fn bash_profile(name: &str, child_name: &str) -> String {
    BASH_PROFILE_SH.replace(ENVIRONMENT_PLACEHOLDER, &format!("{name}/{child_name}"))
}
