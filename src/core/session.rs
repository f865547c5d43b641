//! Remote execution session.
//!
//! A [`Session`] wraps one [`Transport`] for the lifetime of a task run and
//! owns the execution-context stack: acting user, working directory and
//! failure tolerance. [`Session::within`] pushes a [`Scope`] overlay and pops
//! it on every exit path, so an inner failure never leaks its user or cwd
//! into the enclosing steps.

use crate::error::{Error, RemoteCommandFailedDetails, Result, TargetDetails};
use crate::hosts::Target;
use crate::output::{Outcome, StepKind, StepRecord, TaskReport};
use crate::resolve::Resolver;
use crate::settings::Settings;
use crate::transport::{CommandOutput, Transport};
use crate::utils::{shell, template};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Effective execution context for a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecContext {
    /// Acting remote user; `None` means the SSH login user.
    pub user: Option<String>,
    pub cwd: Option<String>,
    pub warn_only: bool,
}

/// Partial overlay applied on top of the enclosing [`ExecContext`].
#[derive(Debug, Clone, Default)]
pub struct Scope {
    user: Option<String>,
    cwd: Option<String>,
    warn_only: Option<bool>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Relative paths are joined onto the enclosing cwd.
    pub fn in_dir(mut self, dir: impl Into<String>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Failed commands return their output instead of aborting the task.
    pub fn tolerant(mut self) -> Self {
        self.warn_only = Some(true);
        self
    }

    pub fn apply(&self, base: &ExecContext) -> ExecContext {
        let cwd = match (&self.cwd, &base.cwd) {
            (Some(dir), _) if dir.starts_with('/') => Some(dir.clone()),
            (Some(dir), Some(parent)) => Some(format!("{}/{}", parent.trim_end_matches('/'), dir)),
            (Some(dir), None) => Some(dir.clone()),
            (None, parent) => parent.clone(),
        };

        ExecContext {
            user: self.user.clone().or_else(|| base.user.clone()),
            cwd,
            warn_only: self.warn_only.unwrap_or(base.warn_only),
        }
    }
}

type PauseHook<'a> = Box<dyn FnMut(&str) -> Result<()> + 'a>;

pub struct Session<'a> {
    transport: &'a dyn Transport,
    settings: &'a Settings,
    host: String,
    login_user: String,
    operator: String,
    base: ExecContext,
    stack: Vec<ExecContext>,
    steps: Vec<StepRecord>,
    warnings: Vec<String>,
    data: Map<String, Value>,
    pause_hook: PauseHook<'a>,
}

impl<'a> Session<'a> {
    pub fn new(transport: &'a dyn Transport, settings: &'a Settings, target: &Target) -> Self {
        Self {
            transport,
            settings,
            host: target.label.clone(),
            login_user: target.user.clone(),
            operator: "unknown".to_string(),
            base: ExecContext::default(),
            stack: Vec::new(),
            steps: Vec::new(),
            warnings: Vec::new(),
            data: Map::new(),
            pause_hook: Box::new(|prompt: &str| {
                log_status!("pause", "{}", prompt);
                Ok(())
            }),
        }
    }

    /// Local user recorded in deploy log lines.
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    /// Hook invoked by [`Session::pause`]; an `Err` aborts the task.
    pub fn with_pause_hook(mut self, hook: impl FnMut(&str) -> Result<()> + 'a) -> Self {
        self.pause_hook = Box::new(hook);
        self
    }

    pub fn settings(&self) -> &'a Settings {
        self.settings
    }

    pub fn resolver(&self) -> Resolver<'a> {
        Resolver::new(self.settings)
    }

    /// Symbolic name of the selected host.
    pub fn hostname(&self) -> &str {
        &self.host
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn context(&self) -> &ExecContext {
        self.stack.last().unwrap_or(&self.base)
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Run `f` with `scope` overlaid on the current context.
    pub fn within<T>(
        &mut self,
        scope: Scope,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let next = scope.apply(self.context());
        self.stack.push(next);
        let result = f(self);
        self.stack.pop();
        result
    }

    /// Run as the acting user.
    pub fn run(&mut self, command: &str) -> Result<CommandOutput> {
        let user = self.context().user.clone();
        self.exec(StepKind::Run, command, user, None, false)
    }

    /// Run as root.
    pub fn sudo(&mut self, command: &str) -> Result<CommandOutput> {
        self.exec(StepKind::Sudo, command, Some("root".to_string()), None, false)
    }

    /// Run through sudo as a named user, e.g. `postgres`.
    pub fn sudo_as(&mut self, command: &str, user: &str) -> Result<CommandOutput> {
        self.exec(StepKind::Sudo, command, Some(user.to_string()), None, false)
    }

    /// Read-only probe. Never aborts; callers branch on `success`.
    pub fn query(&mut self, command: &str, as_root: bool) -> Result<CommandOutput> {
        let user = self.effective_user(as_root);
        self.exec(StepKind::Check, command, user, None, true)
    }

    /// Whether `path` exists, resolved against the current cwd.
    pub fn exists(&mut self, path: &str, as_root: bool) -> Result<bool> {
        let command = format!("test -e {}", shell::quote_path(path));
        Ok(self.query(&command, as_root)?.success)
    }

    pub fn upload(&mut self, local: &Path, remote: &str, as_root: bool) -> Result<CommandOutput> {
        let content = fs::read(local).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", local.display())))
        })?;
        log_status!("upload", "{} -> {}", local.display(), remote);
        self.upload_bytes(&content, remote, as_root)
    }

    /// Write `content` to `remote`, replacing any existing file.
    pub fn upload_bytes(
        &mut self,
        content: &[u8],
        remote: &str,
        as_root: bool,
    ) -> Result<CommandOutput> {
        let command = format!("cat > {}", shell::quote_path(remote));
        let user = self.effective_user(as_root);
        self.exec(StepKind::Upload, &command, user, Some(content), false)
    }

    /// Render a local `{{key}}` template and upload the result.
    pub fn render_template(
        &mut self,
        template_path: &Path,
        remote: &str,
        context: &HashMap<String, String>,
        as_root: bool,
    ) -> Result<CommandOutput> {
        let source = fs::read_to_string(template_path).map_err(|e| {
            Error::internal_io(
                e.to_string(),
                Some(format!("read template {}", template_path.display())),
            )
        })?;
        let rendered = template::render_map(&source, context);
        let leftover = template::unresolved(&rendered);
        if !leftover.is_empty() {
            self.warn(format!(
                "{} has unrendered placeholders: {}",
                template_path.display(),
                leftover.join(", ")
            ));
        }
        log_status!("render", "{} -> {}", template_path.display(), remote);
        self.upload_bytes(rendered.as_bytes(), remote, as_root)
    }

    /// Append lines to a remote file. Lines already present are appended again.
    pub fn append(&mut self, path: &str, lines: &[&str], as_root: bool) -> Result<CommandOutput> {
        let quoted: Vec<String> = lines.iter().map(|l| shell::quote_path(l)).collect();
        let command = format!(
            "printf '%s\\n' {} >> {}",
            quoted.join(" "),
            shell::quote_path(path)
        );
        self.mutate(&command, as_root)
    }

    /// In-place `sed` substitution, restricted to lines matching `limit` when non-empty.
    pub fn sed(
        &mut self,
        path: &str,
        before: &str,
        after: &str,
        limit: &str,
        as_root: bool,
    ) -> Result<CommandOutput> {
        let substitution = format!(
            "s/{}/{}/g",
            escape_sed_delimiter(before),
            escape_sed_delimiter(after)
        );
        let expr = if limit.is_empty() {
            substitution
        } else {
            format!("/{}/ {}", escape_sed_delimiter(limit), substitution)
        };
        let command = format!(
            "sed -i.bak -r -e {} {}",
            shell::quote_path(&expr),
            shell::quote_path(path)
        );
        self.mutate(&command, as_root)
    }

    /// Strip a leading `#` from lines matching `regex`.
    pub fn uncomment(&mut self, path: &str, regex: &str, as_root: bool) -> Result<CommandOutput> {
        let expr = format!(
            "s/^([[:space:]]*)#[[:space:]]?({})/\\1\\2/g",
            escape_sed_delimiter(regex)
        );
        let command = format!(
            "sed -i.bak -r -e {} {}",
            shell::quote_path(&expr),
            shell::quote_path(path)
        );
        self.mutate(&command, as_root)
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log_status!("warn", "{}", message);
        self.warnings.push(message);
    }

    /// Attach a value to the task report's `data`.
    pub fn record(&mut self, key: &str, value: impl Into<Value>) {
        self.data.insert(key.to_string(), value.into());
    }

    pub fn pause(&mut self, prompt: &str) -> Result<()> {
        (self.pause_hook)(prompt)
    }

    pub fn into_report(self, task: &str, outcome: Outcome) -> TaskReport {
        TaskReport {
            task: task.to_string(),
            host: self.host,
            outcome,
            steps: self.steps,
            warnings: self.warnings,
            data: self.data,
        }
    }

    fn mutate(&mut self, command: &str, as_root: bool) -> Result<CommandOutput> {
        if as_root {
            self.sudo(command)
        } else {
            self.run(command)
        }
    }

    fn effective_user(&self, as_root: bool) -> Option<String> {
        if as_root {
            Some("root".to_string())
        } else {
            self.context().user.clone()
        }
    }

    fn exec(
        &mut self,
        kind: StepKind,
        command: &str,
        user: Option<String>,
        stdin: Option<&[u8]>,
        force_tolerant: bool,
    ) -> Result<CommandOutput> {
        let ctx = self.context().clone();
        let line = self.compose(command, user.as_deref(), ctx.cwd.as_deref());

        match kind {
            StepKind::Sudo => log_status!("sudo", "{}", command),
            StepKind::Check => log_status!("check", "{}", command),
            StepKind::Upload => {}
            StepKind::Run => log_status!("run", "{}", command),
        }

        let output = self.transport.execute(&line, stdin);

        self.steps.push(StepRecord {
            kind,
            command: command.to_string(),
            user: user.clone(),
            cwd: ctx.cwd.clone(),
            success: output.success,
            exit_code: output.exit_code,
        });

        if output.success || ctx.warn_only || force_tolerant {
            return Ok(output);
        }

        let details = RemoteCommandFailedDetails {
            command: command.to_string(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            target: TargetDetails {
                host: Some(self.host.clone()),
                user: Some(user.unwrap_or_else(|| self.login_user.clone())),
                cwd: ctx.cwd,
            },
        };

        if details.exit_code == 255 {
            Err(Error::ssh_connect_failed(details))
        } else {
            Err(Error::remote_command_failed(details))
        }
    }

    /// Wrap `command` with cwd and user switching.
    fn compose(&self, command: &str, user: Option<&str>, cwd: Option<&str>) -> String {
        let inner = match cwd {
            Some(dir) => format!("cd {} && {}", shell::quote_path(dir), command),
            None => command.to_string(),
        };

        match user {
            None => inner,
            Some(u) if u == self.login_user => inner,
            Some("root") => format!("sudo -H sh -c {}", shell::escape_command_for_shell(&inner)),
            Some(u) => format!(
                "sudo -H -u {} sh -c {}",
                shell::quote_arg(u),
                shell::escape_command_for_shell(&inner)
            ),
        }
    }
}

fn escape_sed_delimiter(value: &str) -> String {
    value.replace('/', "\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;

    fn target() -> Target {
        Target::new("web1", "10.0.0.5", "deploy")
    }

    #[test]
    fn nested_scopes_restore_after_inner_failure() {
        let settings = Settings::default();
        let transport = RecordingTransport::new("web1").with_failure("false");
        let mut session = Session::new(&transport, &settings, &target());

        let outer = Scope::new().as_user("alice").in_dir("/srv/app");
        let result = session.within(outer, |s| {
            let inner = Scope::new().as_user("bob").in_dir("/opt/x");
            let failed = s.within(inner, |s| {
                assert_eq!(s.context().user.as_deref(), Some("bob"));
                assert_eq!(s.context().cwd.as_deref(), Some("/opt/x"));
                s.run("false").map(|_| ())
            });
            assert!(failed.is_err());

            assert_eq!(s.context().user.as_deref(), Some("alice"));
            assert_eq!(s.context().cwd.as_deref(), Some("/srv/app"));
            assert!(!s.context().warn_only);
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(session.context(), &ExecContext::default());
    }

    #[test]
    fn inner_scope_inherits_unset_fields() {
        let base = Scope::new().as_user("alice").in_dir("/home/alice").apply(&ExecContext::default());
        let nested = Scope::new().in_dir("code").tolerant().apply(&base);

        assert_eq!(nested.user.as_deref(), Some("alice"));
        assert_eq!(nested.cwd.as_deref(), Some("/home/alice/code"));
        assert!(nested.warn_only);
    }

    #[test]
    fn commands_are_wrapped_for_user_and_cwd() {
        let settings = Settings::default();
        let transport = RecordingTransport::new("web1");
        let mut session = Session::new(&transport, &settings, &target());

        session
            .within(Scope::new().as_user("shop-master").in_dir("/home/shop-master"), |s| {
                s.run("git pull")?;
                s.sudo("a2enmod rewrite")?;
                Ok(())
            })
            .unwrap();
        session.run("uptime").unwrap();

        let commands = transport.commands();
        assert_eq!(
            commands[0],
            "sudo -H -u shop-master sh -c 'cd '\\''/home/shop-master'\\'' && git pull'"
        );
        assert_eq!(
            commands[1],
            "sudo -H sh -c 'cd '\\''/home/shop-master'\\'' && a2enmod rewrite'"
        );
        assert_eq!(commands[2], "uptime");
        assert_eq!(session.steps()[0].user.as_deref(), Some("shop-master"));
        assert_eq!(session.steps()[0].command, "git pull");
    }

    #[test]
    fn failure_aborts_unless_tolerant() {
        let settings = Settings::default();
        let transport = RecordingTransport::new("web1")
            .with_response("apache2ctl", CommandOutput::failed(1, "Syntax error"));
        let mut session = Session::new(&transport, &settings, &target());

        let err = session.sudo("apache2ctl configtest").unwrap_err();
        assert_eq!(err.code.as_str(), "remote.command_failed");
        assert_eq!(err.details["target"]["user"], "root");

        let out = session
            .within(Scope::new().tolerant(), |s| s.sudo("apache2ctl configtest"))
            .unwrap();
        assert!(!out.success);
    }

    #[test]
    fn connection_failure_maps_to_ssh_error() {
        let settings = Settings::default();
        let transport = RecordingTransport::new("web1")
            .with_response("uptime", CommandOutput::failed(255, "Connection refused"));
        let mut session = Session::new(&transport, &settings, &target());

        let err = session.run("uptime").unwrap_err();
        assert_eq!(err.code.as_str(), "ssh.connect_failed");
    }

    #[test]
    fn sed_and_append_compose_expected_commands() {
        let settings = Settings::default();
        let transport = RecordingTransport::new("web1");
        let mut session = Session::new(&transport, &settings, &Target::new("web1", "h", "root"));

        session
            .sed("/etc/ssh/sshd_config", "yes", "no", "PermitRootLogin", true)
            .unwrap();
        session.append("/etc/fstab", &["/swapfile swap swap defaults 0 0"], true).unwrap();

        let commands = transport.commands();
        assert_eq!(
            commands[0],
            "sed -i.bak -r -e '/PermitRootLogin/ s/yes/no/g' '/etc/ssh/sshd_config'"
        );
        assert_eq!(
            commands[1],
            "printf '%s\\n' '/swapfile swap swap defaults 0 0' >> '/etc/fstab'"
        );
    }
}
