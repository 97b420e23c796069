//! Naming rules for environments and children.
use regex::Regex;
use std::sync::OnceLock;

/// Shortest name accepted as a deployment target.
pub const MIN_DEPLOY_NAME_LEN: usize = 5;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9]*$").expect("valid name regex"))
}

/// Environment and child names: a lowercase letter, then lowercase letters or digits.
pub fn valid_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

/// Deploy targets additionally need at least [`MIN_DEPLOY_NAME_LEN`] characters.
pub fn valid_deploy_name(name: &str) -> bool {
    valid_name(name) && name.len() >= MIN_DEPLOY_NAME_LEN
}
