//! Settings registry.
//!
//! Loaded once before any task runs and passed by reference to every task.
//! Holds the typed sections the recipes need (packages, debconf seeds,
//! sysadmins, hosts) plus free-form named overrides consulted by the
//! resolver.

use crate::error::{Error, Result};
use crate::paths;
use heck::ToShoutySnakeCase;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A named override value, kept exactly as it was written in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
    Record(BTreeMap<String, serde_json::Value>),
}

impl SettingValue {
    /// Whether the value counts as "given": empty text, `false` and empty
    /// collections are treated like an omitted value.
    pub fn is_present(&self) -> bool {
        match self {
            SettingValue::Bool(b) => *b,
            SettingValue::Integer(_) | SettingValue::Float(_) => true,
            SettingValue::Text(s) => !s.is_empty(),
            SettingValue::List(items) => !items.is_empty(),
            SettingValue::Record(map) => !map.is_empty(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "bool",
            SettingValue::Integer(_) => "integer",
            SettingValue::Float(_) => "float",
            SettingValue::Text(_) => "text",
            SettingValue::List(_) => "list",
            SettingValue::Record(_) => "record",
        }
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Integer(value)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(value: Vec<String>) -> Self {
        SettingValue::List(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sysadmin {
    #[serde(alias = "ssh_key_path")]
    pub ssh_key_path: String,
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default)]
    pub email: Option<String>,
}

fn default_shell() -> String {
    "bash".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostEntry {
    pub address: String,
    pub label: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default, alias = "identity_file")]
    pub identity_file: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HostSpec {
    Pair(String, String),
    Full(HostEntry),
}

fn deserialize_hosts<'de, D>(deserializer: D) -> std::result::Result<Vec<HostEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let specs = Vec::<HostSpec>::deserialize(deserializer)?;
    Ok(specs
        .into_iter()
        .map(|spec| match spec {
            HostSpec::Pair(address, label) => HostEntry {
                address,
                label,
                user: None,
                port: None,
                identity_file: None,
            },
            HostSpec::Full(entry) => entry,
        })
        .collect())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, alias = "base_packages")]
    pub base_packages: Vec<String>,
    #[serde(default, alias = "debconf_seeds")]
    pub debconf_seeds: Vec<String>,
    #[serde(default)]
    pub sysadmins: BTreeMap<String, Sysadmin>,
    #[serde(default, deserialize_with = "deserialize_hosts")]
    pub hosts: Vec<HostEntry>,
    #[serde(default, alias = "ssh_user")]
    pub ssh_user: Option<String>,
    #[serde(default, alias = "template_dir")]
    pub template_dir: Option<String>,
    #[serde(default)]
    overrides: BTreeMap<String, SettingValue>,
    #[serde(skip)]
    source: Option<PathBuf>,
}

/// Canonical form of an override name: `projectName`, `project_name` and
/// `PROJECT_NAME` all map to `PROJECT_NAME`.
pub fn normalize_name(name: &str) -> String {
    name.to_shouty_snake_case()
}

impl Settings {
    /// Look up a named override.
    pub fn get(&self, name: &str) -> Option<&SettingValue> {
        self.overrides.get(&normalize_name(name))
    }

    pub fn overrides(&self) -> &BTreeMap<String, SettingValue> {
        &self.overrides
    }

    /// File the registry was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Builder used while assembling a registry in code.
    pub fn with_override(mut self, name: &str, value: impl Into<SettingValue>) -> Self {
        self.overrides.insert(normalize_name(name), value.into());
        self
    }

    pub fn with_sysadmin(mut self, name: &str, sysadmin: Sysadmin) -> Self {
        self.sysadmins.insert(name.to_string(), sysadmin);
        self
    }

    pub fn with_host(mut self, address: &str, label: &str) -> Self {
        self.hosts.push(HostEntry {
            address: address.to_string(),
            label: label.to_string(),
            user: None,
            port: None,
            identity_file: None,
        });
        self
    }

    pub fn from_json_str(content: &str, origin: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(content)
            .map_err(|e| Error::config_invalid_format(origin, e.to_string()))?;
        Ok(settings.normalized())
    }

    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)
            .map_err(|e| Error::config_invalid_format(origin, e.to_string()))?;
        Ok(settings.normalized())
    }

    fn normalized(mut self) -> Self {
        self.overrides = std::mem::take(&mut self.overrides)
            .into_iter()
            .map(|(k, v)| (normalize_name(&k), v))
            .collect();
        self
    }

    /// Sysadmin email addresses, in name order, skipping entries without one.
    pub fn sysadmin_emails(&self) -> Vec<String> {
        self.sysadmins
            .values()
            .filter_map(|s| s.email.clone())
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// Local directory searched for `template.*` files.
    pub fn template_root(&self) -> PathBuf {
        match &self.template_dir {
            Some(dir) if !dir.is_empty() => PathBuf::from(shellexpand::tilde(dir).to_string()),
            _ => PathBuf::from("."),
        }
    }
}

/// Load settings from a file, choosing the format by extension.
pub fn load_file(path: &Path) -> Result<Settings> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("read {}", display))))?;

    let mut settings = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Settings::from_toml_str(&content, &display)?,
        _ => Settings::from_json_str(&content, &display)?,
    };
    settings.source = Some(path.to_path_buf());
    Ok(settings)
}

/// Where the settings file path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsOrigin {
    Flag,
    Env,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsLocation {
    pub path: PathBuf,
    pub origin: SettingsOrigin,
}

/// Settings file lookup: explicit path, then `STAGEHAND_SETTINGS`, then
/// `~/.config/stagehand/settings.json`.
pub fn locate(explicit: Option<&Path>) -> Result<SettingsLocation> {
    if let Some(path) = explicit {
        return Ok(SettingsLocation {
            path: path.to_path_buf(),
            origin: SettingsOrigin::Flag,
        });
    }

    if let Some(path) = paths::settings_from_env() {
        return Ok(SettingsLocation {
            path,
            origin: SettingsOrigin::Env,
        });
    }

    Ok(SettingsLocation {
        path: paths::settings_json()?,
        origin: SettingsOrigin::Default,
    })
}

/// Load the settings registry.
///
/// An explicit path (flag or `STAGEHAND_SETTINGS`) must exist. The default
/// `~/.config/stagehand/settings.json` is optional: when it is missing the
/// registry is empty and every resolver lookup falls through to defaults.
pub fn load(explicit: Option<&Path>) -> Result<Settings> {
    let location = locate(explicit)?;

    if location.origin != SettingsOrigin::Default || location.path.exists() {
        return load_file(&location.path);
    }

    log_status!(
        "settings",
        "No settings file at {}; using built-in defaults",
        location.path.display()
    );
    Ok(Settings::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE_JSON: &str = r#"{
        "basePackages": ["git-core", "vim"],
        "debconfSeeds": ["seeds/postfix.seed"],
        "sysadmins": {
            "alice": {"sshKeyPath": "~/.ssh/alice.pub", "email": "alice@example.com"},
            "bob": {"ssh_key_path": "/keys/bob.pub", "shell": "zsh"}
        },
        "hosts": [
            ["10.0.0.5", "web1"],
            {"address": "10.0.0.6", "label": "db1", "user": "deploy", "port": 2222}
        ],
        "overrides": {
            "projectName": "shop",
            "BRANCH": "stable",
            "install_crontab": true,
            "SWAP_SIZE": 512,
            "EXTRA_HOSTS": ["a", "b"]
        }
    }"#;

    #[test]
    fn parses_typed_sections_and_host_forms() {
        let settings = Settings::from_json_str(SAMPLE_JSON, "inline").unwrap();

        assert_eq!(settings.base_packages, vec!["git-core", "vim"]);
        assert_eq!(settings.sysadmins["alice"].shell, "bash");
        assert_eq!(settings.sysadmins["bob"].shell, "zsh");
        assert_eq!(settings.hosts.len(), 2);
        assert_eq!(settings.hosts[0].label, "web1");
        assert_eq!(settings.hosts[0].user, None);
        assert_eq!(settings.hosts[1].port, Some(2222));
    }

    #[test]
    fn override_names_are_normalized() {
        let settings = Settings::from_json_str(SAMPLE_JSON, "inline").unwrap();

        assert_eq!(
            settings.get("PROJECT_NAME"),
            Some(&SettingValue::Text("shop".to_string()))
        );
        assert_eq!(
            settings.get("project_name"),
            Some(&SettingValue::Text("shop".to_string()))
        );
        assert_eq!(settings.get("INSTALL_CRONTAB"), Some(&SettingValue::Bool(true)));
        assert_eq!(settings.get("swapSize"), Some(&SettingValue::Integer(512)));
        assert_eq!(settings.get("EXTRA_HOSTS").map(|v| v.kind()), Some("list"));
        assert_eq!(settings.get("UNDEFINED"), None);
    }

    #[test]
    fn sysadmin_emails_skip_missing() {
        let settings = Settings::from_json_str(SAMPLE_JSON, "inline").unwrap();
        assert_eq!(settings.sysadmin_emails(), vec!["alice@example.com"]);
    }

    #[test]
    fn loads_toml_by_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            r#"
basePackages = ["htop"]
hosts = [["192.168.1.10", "staging"]]

[overrides]
PROJECT_NAME = "blog"
"#,
        )
        .unwrap();

        let settings = load_file(&path).unwrap();
        assert_eq!(settings.base_packages, vec!["htop"]);
        assert_eq!(settings.hosts[0].address, "192.168.1.10");
        assert_eq!(
            settings.get("projectName"),
            Some(&SettingValue::Text("blog".to_string()))
        );
        assert_eq!(settings.source(), Some(path.as_path()));
    }

    #[test]
    fn invalid_content_is_a_config_error() {
        let err = Settings::from_json_str("{ not json", "broken.json").unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_format");
    }

    #[test]
    fn explicit_missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = load(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn explicit_path_wins_lookup() {
        let location = locate(Some(Path::new("/srv/stagehand.toml"))).unwrap();
        assert_eq!(location.origin, SettingsOrigin::Flag);
        assert_eq!(location.path, PathBuf::from("/srv/stagehand.toml"));
    }

    #[test]
    fn presence_rules() {
        assert!(!SettingValue::Text(String::new()).is_present());
        assert!(!SettingValue::Bool(false).is_present());
        assert!(!SettingValue::List(vec![]).is_present());
        assert!(SettingValue::Integer(0).is_present());
        assert!(SettingValue::Text("x".to_string()).is_present());
    }
}
