//! String template rendering utilities.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub struct TemplateVars;

impl TemplateVars {
    pub const PROJECT_NAME: &'static str = "project_name";
    pub const PROJECT_USERNAME: &'static str = "project_username";
    pub const ADMIN_EMAIL: &'static str = "admin_email";
    pub const SERVER_NAME: &'static str = "server_name";
    pub const SERVER_ALIAS: &'static str = "server_alias";
    pub const SETTINGS_MODULE: &'static str = "settings_module";
    pub const BRANCH: &'static str = "branch";
    pub const GIT_HEAD: &'static str = "git_head";
    pub const CRON_EMAIL: &'static str = "cron_email";
}

static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Substitute every `{{key}}` in one pass. Substituted values are not
/// rescanned; unknown keys are left in place.
pub fn render_map(template: &str, variables: &HashMap<String, String>) -> String {
    PLACEHOLDER_PATTERN
        .replace_all(template, |caps: &regex::Captures<'_>| {
            variables
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Placeholder keys left in `text`, in order of first appearance.
pub fn unresolved(text: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_PATTERN.captures_iter(text) {
        let key = caps[1].to_string();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Find the first file named `name` at or below `root`.
pub fn locate(root: &Path, name: &str) -> Result<PathBuf> {
    let pattern = root.join("**").join(name);
    let pattern_str = pattern.to_string_lossy();

    let mut matches: Vec<PathBuf> = glob::glob(&pattern_str)
        .map_err(|e| Error::internal_unexpected(format!("Invalid template pattern: {}", e)))?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();

    // Shallowest match wins, then lexical order.
    matches.sort_by(|a, b| {
        a.components()
            .count()
            .cmp(&b.components().count())
            .then_with(|| a.cmp(b))
    });

    matches
        .into_iter()
        .next()
        .ok_or_else(|| Error::template_not_found(name, root.display().to_string()))
}
