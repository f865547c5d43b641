//! Host registry.
//!
//! Maps the symbolic labels from the settings `hosts` section to connection
//! targets. Selecting a host is an explicit call; the selected label doubles
//! as the hostname written by the hosts-file bootstrap step.

use crate::error::{Error, Result};
use crate::settings::{HostEntry, Settings};
use crate::utils::suggest;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub label: String,
    pub address: String,
    /// SSH login user.
    pub user: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

impl Target {
    pub fn new(label: impl Into<String>, address: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            address: address.into(),
            user: user.into(),
            port: 22,
            identity_file: None,
        }
    }

    /// Hostname applied by `setup_hosts`.
    pub fn hostname(&self) -> &str {
        &self.label
    }
}

pub struct HostRegistry<'a> {
    settings: &'a Settings,
}

impl<'a> HostRegistry<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    pub fn list(&self) -> &'a [HostEntry] {
        &self.settings.hosts
    }

    pub fn get(&self, label: &str) -> Result<&'a HostEntry> {
        self.settings
            .hosts
            .iter()
            .find(|h| h.label == label)
            .ok_or_else(|| {
                let labels: Vec<&str> = self.settings.hosts.iter().map(|h| h.label.as_str()).collect();
                Error::host_not_found(label, suggest::similar(label, &labels))
            })
    }

    /// Resolve `label` to a connection target.
    ///
    /// Login user precedence: `user_override`, the host entry's `user`,
    /// settings `sshUser`, `$USER`, then `root`.
    pub fn select(&self, label: &str, user_override: Option<&str>) -> Result<Target> {
        let entry = self.get(label)?;

        let user = user_override
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .or_else(|| entry.user.clone().filter(|u| !u.is_empty()))
            .or_else(|| self.settings.ssh_user.clone().filter(|u| !u.is_empty()))
            .or_else(|| std::env::var("USER").ok().filter(|u| !u.is_empty()))
            .unwrap_or_else(|| "root".to_string());

        log_status!("hosts", "Selected {} ({}) as {}", entry.label, entry.address, user);

        Ok(Target {
            label: entry.label.clone(),
            address: entry.address.clone(),
            user,
            port: entry.port.unwrap_or(22),
            identity_file: entry.identity_file.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        let mut settings = Settings::default()
            .with_host("10.0.0.5", "web1")
            .with_host("10.0.0.6", "web2");
        settings.hosts[1].user = Some("deploy".to_string());
        settings.hosts[1].port = Some(2222);
        settings.ssh_user = Some("ops".to_string());
        settings
    }

    #[test]
    fn select_applies_user_precedence() {
        let settings = settings();
        let registry = HostRegistry::new(&settings);

        assert_eq!(registry.select("web1", Some("admin")).unwrap().user, "admin");
        assert_eq!(registry.select("web1", None).unwrap().user, "ops");

        let web2 = registry.select("web2", None).unwrap();
        assert_eq!(web2.user, "deploy");
        assert_eq!(web2.port, 2222);
        assert_eq!(web2.hostname(), "web2");
    }

    #[test]
    fn unknown_label_suggests_similar() {
        let settings = settings();
        let registry = HostRegistry::new(&settings);

        let err = registry.select("web", None).unwrap_err();
        assert_eq!(err.code.as_str(), "host.not_found");
        assert_eq!(err.details["suggestions"][0], "web1");
    }
}
