//! Parameter resolution.
//!
//! Every task parameter is resolved on its own from three ordered sources:
//! the explicit call-site value, the named entry in the settings registry,
//! and the built-in default. The first present value wins.

use crate::error::{Error, Result};
use crate::settings::{SettingValue, Settings};
use serde::Serialize;

/// Which source produced a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Explicit,
    Registry,
    Default,
    Unset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub name: String,
    pub value: Option<SettingValue>,
    pub source: Source,
}

#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    settings: &'a Settings,
}

impl<'a> Resolver<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Resolve and report where the value came from.
    pub fn explain(
        &self,
        explicit: Option<SettingValue>,
        name: &str,
        default: Option<SettingValue>,
    ) -> Resolution {
        let (value, source) = if let Some(v) = explicit.filter(SettingValue::is_present) {
            (Some(v), Source::Explicit)
        } else if let Some(v) = self.settings.get(name).filter(|v| v.is_present()) {
            (Some(v.clone()), Source::Registry)
        } else if default.is_some() {
            (default, Source::Default)
        } else {
            (None, Source::Unset)
        };

        Resolution {
            name: name.to_string(),
            value,
            source,
        }
    }

    /// explicit > registry entry `name` > `default`. Registry values are
    /// returned verbatim, whatever their kind.
    pub fn resolve(
        &self,
        explicit: Option<SettingValue>,
        name: &str,
        default: Option<SettingValue>,
    ) -> Option<SettingValue> {
        self.explain(explicit, name, default).value
    }

    /// Text parameter; `None` when nothing resolves.
    pub fn opt_text(
        &self,
        explicit: Option<&str>,
        name: &str,
        default: Option<&str>,
    ) -> Result<Option<String>> {
        let resolved = self.resolve(
            explicit.map(SettingValue::from),
            name,
            default.map(SettingValue::from),
        );

        match resolved {
            None => Ok(None),
            Some(SettingValue::Text(s)) => Ok(Some(s)),
            Some(SettingValue::Integer(n)) => Ok(Some(n.to_string())),
            Some(SettingValue::Float(n)) => Ok(Some(n.to_string())),
            Some(SettingValue::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(kind_mismatch(name, &other, "text")),
        }
    }

    /// Text parameter with an always-present default.
    pub fn text(&self, explicit: Option<&str>, name: &str, default: &str) -> Result<String> {
        Ok(self
            .opt_text(explicit, name, Some(default))?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Text parameter that has no default; unresolved is a configuration error.
    pub fn require_text(&self, explicit: Option<&str>, name: &str) -> Result<String> {
        self.opt_text(explicit, name, None)?.ok_or_else(|| {
            Error::config_missing_key(
                name,
                self.settings.source().map(|p| p.display().to_string()),
            )
            .with_hint(format!(
                "Pass {}=<value> to the task or set overrides.{} in settings",
                name.to_lowercase(),
                name
            ))
        })
    }

    /// Boolean parameter. An explicit `false` counts as omitted, so a
    /// registry `true` still wins over it.
    pub fn flag(&self, explicit: Option<bool>, name: &str, default: bool) -> Result<bool> {
        let resolved = self.resolve(
            explicit.map(SettingValue::Bool),
            name,
            Some(SettingValue::Bool(default)),
        );

        match resolved {
            None => Ok(default),
            Some(SettingValue::Bool(b)) => Ok(b),
            Some(SettingValue::Integer(n)) => Ok(n != 0),
            Some(SettingValue::Text(s)) => {
                parse_bool(&s).ok_or_else(|| kind_mismatch(name, &SettingValue::Text(s), "bool"))
            }
            Some(other) => Err(kind_mismatch(name, &other, "bool")),
        }
    }

    /// Integer parameter; `None` when nothing resolves.
    pub fn number(
        &self,
        explicit: Option<i64>,
        name: &str,
        default: Option<i64>,
    ) -> Result<Option<i64>> {
        let resolved = self.resolve(
            explicit.map(SettingValue::Integer),
            name,
            default.map(SettingValue::Integer),
        );

        match resolved {
            None => Ok(None),
            Some(SettingValue::Integer(n)) => Ok(Some(n)),
            Some(SettingValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| kind_mismatch(name, &SettingValue::Text(s), "integer")),
            Some(other) => Err(kind_mismatch(name, &other, "integer")),
        }
    }

    /// List parameter. A single text value becomes a one-element list.
    pub fn list(
        &self,
        explicit: Option<Vec<String>>,
        name: &str,
        default: Vec<String>,
    ) -> Result<Vec<String>> {
        let resolved = self.resolve(
            explicit.map(SettingValue::List),
            name,
            Some(SettingValue::List(default)),
        );

        match resolved {
            None => Ok(Vec::new()),
            Some(SettingValue::List(items)) => Ok(items),
            Some(SettingValue::Text(s)) => Ok(vec![s]),
            Some(other) => Err(kind_mismatch(name, &other, "list")),
        }
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "no" | "n" | "off" | "0" | "" => Some(false),
        _ => None,
    }
}

fn kind_mismatch(name: &str, value: &SettingValue, wanted: &str) -> Error {
    Error::config_invalid_value(
        name,
        Some(format!("{:?}", value)),
        format!("expected {}, found {}", wanted, value.kind()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Settings {
        Settings::default()
            .with_override("PROJECT_NAME", "shop")
            .with_override("INSTALL_CRONTAB", true)
            .with_override("SWAP_SIZE", 1024_i64)
            .with_override("EMPTY_VALUE", "")
            .with_override("PACKAGES", vec!["vim".to_string()])
    }

    #[test]
    fn explicit_always_wins() {
        let settings = registry();
        let r = Resolver::new(&settings);

        assert_eq!(
            r.resolve(Some("blog".into()), "PROJECT_NAME", Some("project".into())),
            Some(SettingValue::Text("blog".to_string()))
        );
        assert_eq!(r.text(Some("blog"), "PROJECT_NAME", "project").unwrap(), "blog");
    }

    #[test]
    fn registry_beats_default_when_explicit_absent() {
        let settings = registry();
        let r = Resolver::new(&settings);

        assert_eq!(r.text(None, "PROJECT_NAME", "project").unwrap(), "shop");
        assert_eq!(r.text(Some(""), "PROJECT_NAME", "project").unwrap(), "shop");
        assert_eq!(r.text(None, "BRANCH", "master").unwrap(), "master");
    }

    #[test]
    fn registry_value_is_returned_verbatim() {
        let settings = registry();
        let r = Resolver::new(&settings);

        assert_eq!(
            r.resolve(None, "SWAP_SIZE", Some("0".into())),
            Some(SettingValue::Integer(1024))
        );
        assert_eq!(
            r.resolve(None, "PACKAGES", None),
            Some(SettingValue::List(vec!["vim".to_string()]))
        );
    }

    #[test]
    fn undefined_name_without_default_is_unset() {
        let settings = registry();
        let r = Resolver::new(&settings);

        assert_eq!(r.resolve(None, "UNDEFINED_NAME", None), None);
        let explained = r.explain(None, "UNDEFINED_NAME", None);
        assert_eq!(explained.source, Source::Unset);
        assert_eq!(r.opt_text(None, "UNDEFINED_NAME", None).unwrap(), None);
    }

    #[test]
    fn empty_registry_entry_falls_through_to_default() {
        let settings = registry();
        let r = Resolver::new(&settings);

        let explained = r.explain(None, "EMPTY_VALUE", Some("fallback".into()));
        assert_eq!(explained.source, Source::Default);
        assert_eq!(explained.value, Some(SettingValue::Text("fallback".to_string())));
    }

    #[test]
    fn explicit_false_defers_to_registry() {
        let settings = registry();
        let r = Resolver::new(&settings);

        assert!(r.flag(Some(false), "INSTALL_CRONTAB", false).unwrap());
        assert!(r.flag(Some(true), "UNSET_FLAG", false).unwrap());
        assert!(!r.flag(None, "UNSET_FLAG", false).unwrap());
    }

    #[test]
    fn typed_helpers_convert_and_reject() {
        let settings = registry().with_override("SIZE_AS_TEXT", "256");
        let r = Resolver::new(&settings);

        assert_eq!(r.number(None, "SIZE_AS_TEXT", None).unwrap(), Some(256));
        assert_eq!(r.text(None, "SWAP_SIZE", "0").unwrap(), "1024");
        assert_eq!(r.list(None, "PROJECT_NAME", vec![]).unwrap(), vec!["shop"]);

        let err = r.number(None, "PACKAGES", None).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
    }

    #[test]
    fn require_text_reports_missing_key() {
        let settings = registry();
        let r = Resolver::new(&settings);

        let err = r.require_text(None, "GIT_URL").unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
        assert_eq!(err.details["key"], "GIT_URL");
    }
}
