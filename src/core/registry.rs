//! Task registry and dispatch.
//!
//! An explicit table of named operations. Each entry declares the arguments
//! it accepts so the dispatcher can reject typos before anything runs on the
//! remote host.

use crate::error::{Error, Result};
use crate::output::{Outcome, TaskReport};
use crate::resolve::parse_bool;
use crate::session::Session;
use crate::tasks;
use crate::utils::suggest;
use heck::ToSnakeCase;
use serde::Serialize;
use std::collections::BTreeMap;

pub type TaskRunner = fn(&mut Session<'_>, &TaskArgs) -> Result<Outcome>;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: &'static str,
    /// Settings override consulted when the argument is omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setting: Option<&'static str>,
    pub summary: &'static str,
}

pub const fn param(
    name: &'static str,
    setting: Option<&'static str>,
    summary: &'static str,
) -> ParamSpec {
    ParamSpec {
        name,
        setting,
        summary,
    }
}

#[derive(Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub name: &'static str,
    pub domain: &'static str,
    pub summary: &'static str,
    pub params: &'static [ParamSpec],
    #[serde(skip)]
    pub runner: TaskRunner,
}

/// `key=value` task arguments. Keys are normalized to snake_case.
#[derive(Debug, Clone, Default)]
pub struct TaskArgs {
    values: BTreeMap<String, String>,
}

impl TaskArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self> {
        let mut args = Self::new();
        for item in raw {
            let item = item.as_ref();
            let (key, value) = item.split_once('=').ok_or_else(|| {
                Error::validation_invalid_argument(
                    "args",
                    format!("Expected key=value, got '{}'", item),
                    None,
                    None,
                )
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::validation_invalid_argument(
                    "args",
                    format!("Missing key in '{}'", item),
                    None,
                    None,
                ));
            }
            args.values.insert(key.to_snake_case(), value.to_string());
        }
        Ok(args)
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_snake_case(), value.into());
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn owned(&self, key: &str) -> Option<String> {
        self.text(key).map(str::to_string)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.text(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::validation_missing_argument(vec![key.to_string()]))
    }

    pub fn flag(&self, key: &str) -> Result<Option<bool>> {
        match self.text(key) {
            None => Ok(None),
            Some(raw) => parse_bool(raw).map(Some).ok_or_else(|| {
                Error::validation_invalid_argument(
                    key,
                    format!("Expected a boolean, got '{}'", raw),
                    None,
                    None,
                )
            }),
        }
    }

    pub fn number(&self, key: &str) -> Result<Option<i64>> {
        match self.text(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
                Error::validation_invalid_argument(
                    key,
                    format!("Expected an integer, got '{}'", raw),
                    None,
                    None,
                )
            }),
        }
    }
}

pub struct TaskRegistry {
    tasks: Vec<TaskSpec>,
}

impl TaskRegistry {
    /// Every task shipped with stagehand.
    pub fn builtin() -> Self {
        Self {
            tasks: tasks::catalogue(),
        }
    }

    pub fn list(&self) -> &[TaskSpec] {
        &self.tasks
    }

    /// Look up a task; `create-user` and `create_user` are the same name.
    pub fn get(&self, name: &str) -> Result<&TaskSpec> {
        let wanted = name.to_snake_case();
        self.tasks.iter().find(|t| t.name == wanted).ok_or_else(|| {
            let names: Vec<&str> = self.tasks.iter().map(|t| t.name).collect();
            Error::task_not_found(name, suggest::similar(&wanted, &names))
        })
    }

    /// Run `name` against the session's host and collect the report.
    pub fn dispatch(
        &self,
        name: &str,
        args: &TaskArgs,
        mut session: Session<'_>,
    ) -> Result<TaskReport> {
        let spec = self.get(name)?;
        check_known_args(spec, args)?;

        log_status!("task", "Running {} on {}", spec.name, session.hostname());
        let outcome = (spec.runner)(&mut session, args)?;

        match &outcome {
            Outcome::Completed => log_status!("task", "{} completed", spec.name),
            Outcome::Skipped { reason } => log_status!("task", "{} skipped: {}", spec.name, reason),
            Outcome::Conflict { reason } => {
                log_status!("task", "{} stopped: {}", spec.name, reason)
            }
        }

        Ok(session.into_report(spec.name, outcome))
    }
}

fn check_known_args(spec: &TaskSpec, args: &TaskArgs) -> Result<()> {
    let known: Vec<&str> = spec.params.iter().map(|p| p.name).collect();
    for key in args.keys() {
        if !known.contains(&key) {
            return Err(Error::validation_invalid_argument(
                key,
                format!("Task '{}' does not accept '{}'", spec.name, key),
                Some(spec.name.to_string()),
                Some(known.iter().map(|k| k.to_string()).collect()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_pairs() {
        let args = TaskArgs::parse(&["gitUrl=git@example.com:shop.git", "swap_size=512", "note=a=b"])
            .unwrap();

        assert_eq!(args.text("git_url"), Some("git@example.com:shop.git"));
        assert_eq!(args.number("swap_size").unwrap(), Some(512));
        assert_eq!(args.text("note"), Some("a=b"));
    }

    #[test]
    fn rejects_malformed_arguments() {
        let err = TaskArgs::parse(&["standalone"]).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");

        let args = TaskArgs::new().with("admin", "maybe");
        assert!(args.flag("admin").is_err());
        assert_eq!(TaskArgs::new().with("admin", "yes").flag("admin").unwrap(), Some(true));
    }

    #[test]
    fn unknown_task_suggests_names() {
        let registry = TaskRegistry::builtin();
        let err = registry.get("create_usr").err().unwrap();
        assert_eq!(err.code.as_str(), "task.not_found");
        assert_eq!(err.details["suggestions"][0], "create_user");
    }

    #[test]
    fn dashed_names_resolve() {
        let registry = TaskRegistry::builtin();
        assert_eq!(registry.get("setup-project").unwrap().name, "setup_project");
    }

    #[test]
    fn task_names_are_unique() {
        let registry = TaskRegistry::builtin();
        let mut names: Vec<&str> = registry.list().iter().map(|t| t.name).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
