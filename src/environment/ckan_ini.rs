//! In-place option updates for CKAN's paste-style ini files.
//!
//! Only `key = value` lines inside the target section are touched; comments,
//! ordering, and every other section survive unchanged.
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Section holding the application options CKAN reads.
pub const APP_SECTION: &str = "app:main";

/// Set `options` in `section` of the ini text, appending missing keys to the
/// end of that section and creating the section if needed.
pub fn set_options(text: &str, section: &str, options: &[(String, String)]) -> String {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let header = format!("[{section}]");
    let start = lines.iter().position(|line| line.trim() == header);
    let Some(start) = start else {
        if lines.last().is_some_and(|line| !line.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push(header);
        lines.extend(options.iter().map(|(key, value)| render_option(key, value)));
        return join_lines(&lines);
    };
    let mut end = lines[start + 1..]
        .iter()
        .position(|line| line.trim_start().starts_with('['))
        .map(|offset| start + 1 + offset)
        .unwrap_or(lines.len());

    for (key, value) in options {
        let existing = (start + 1..end).find(|&idx| option_key(&lines[idx]) == Some(key.as_str()));
        match existing {
            Some(idx) => lines[idx] = render_option(key, value),
            None => {
                // Insert after the last non-blank line of the section.
                let mut insert_at = end;
                while insert_at > start + 1 && lines[insert_at - 1].trim().is_empty() {
                    insert_at -= 1;
                }
                lines.insert(insert_at, render_option(key, value));
                end += 1;
            }
        }
    }
    join_lines(&lines)
}

/// Apply [`set_options`] to the file at `path`.
pub fn update_file(path: &Path, section: &str, options: &[(String, String)]) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let updated = set_options(&text, section, options);
    fs::write(path, updated.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn option_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') || trimmed.starts_with(';') || trimmed.starts_with('[') {
        return None;
    }
    let (key, _) = trimmed.split_once('=')?;
    Some(key.trim())
}

fn render_option(key: &str, value: &str) -> String {
    if value.is_empty() {
        format!("{key} =")
    } else {
        format!("{key} = {value}")
    }
}

fn join_lines(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const SAMPLE: &str = "\
[DEFAULT]
debug = false

[app:main]
use = egg:ckan
# solr_url = http://127.0.0.1:8983/solr
sqlalchemy.url = postgresql://old

[loggers]
keys = root
";

    #[test]
    fn replaces_existing_and_appends_missing_keys_within_section() {
        let updated = set_options(
            SAMPLE,
            APP_SECTION,
            &opts(&[
                ("sqlalchemy.url", "postgresql://new"),
                ("solr_url", "http://solr:8080/solr"),
            ]),
        );

        assert_eq!(
            updated,
            "\
[DEFAULT]
debug = false

[app:main]
use = egg:ckan
# solr_url = http://127.0.0.1:8983/solr
sqlalchemy.url = postgresql://new
solr_url = http://solr:8080/solr

[loggers]
keys = root
"
        );
    }

    #[test]
    fn empty_values_render_without_trailing_space() {
        let updated = set_options(SAMPLE, APP_SECTION, &opts(&[("ckan.site_logo", "")]));
        assert!(updated.contains("\nckan.site_logo =\n"));
    }

    #[test]
    fn keys_in_other_sections_are_untouched() {
        let updated = set_options(SAMPLE, APP_SECTION, &opts(&[("debug", "true")]));
        assert!(updated.contains("[DEFAULT]\ndebug = false\n"));
        assert!(updated.contains("sqlalchemy.url = postgresql://old\ndebug = true\n"));
    }

    #[test]
    fn missing_section_is_created_at_the_end() {
        let updated = set_options("[DEFAULT]\ndebug = false\n", APP_SECTION, &opts(&[("a", "1")]));
        assert_eq!(updated, "[DEFAULT]\ndebug = false\n\n[app:main]\na = 1\n");
    }

    #[test]
    fn update_file_rewrites_in_place() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("development.ini");
        std::fs::write(&path, SAMPLE).expect("write ini");

        update_file(&path, APP_SECTION, &opts(&[("ckan.site_title", "demo")])).expect("update");

        let text = std::fs::read_to_string(&path).expect("read ini");
        assert!(text.contains("ckan.site_title = demo"));
    }
}
