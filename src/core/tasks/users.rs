//! Users, groups and SSH keys.

use crate::accounts;
use crate::error::Result;
use crate::output::Outcome;
use crate::paths::remote_home;
use crate::registry::{param, ParamSpec, TaskArgs, TaskSpec};
use crate::session::{Scope, Session};
use crate::tasks::local_path;
use crate::utils::shell::quote_arg;
use crate::utils::validation;
use std::path::Path;

const SUDOERS_STANZA: &[&str] = &[
    "# Members of the admin group may gain root privileges",
    "# They can run any command as root with no password",
    "%admin ALL=(ALL) NOPASSWD: ALL",
];

/// Append a local public key file to `username`'s `authorized_keys`.
///
/// The file may hold several keys.
pub fn add_ssh_keys(s: &mut Session<'_>, username: &str, key_path: &Path) -> Result<()> {
    let username = validation::require_account_name(username, "username")?;
    let owner = format!("{}:{}", username, username);

    s.within(Scope::new().in_dir(remote_home(username)), |s| {
        s.sudo("mkdir -p .ssh")?;
        s.upload(key_path, "keys", true)?;
        s.sudo("cat keys >> .ssh/authorized_keys")?;
        s.sudo(&format!("chown -R {} .ssh/", owner))?;
        s.sudo("rm -f keys")?;
        Ok(())
    })
}

/// Create `name` unless the group database already has it.
pub fn create_group(s: &mut Session<'_>, name: &str) -> Result<Outcome> {
    let name = validation::require_account_name(name, "name")?;
    if accounts::group_exists(s, name)? {
        return Ok(Outcome::skipped(format!("Group {} already exists", name)));
    }
    s.sudo(&format!("groupadd {}", name))?;
    Ok(Outcome::Completed)
}

/// Create a login account with an SSH key.
///
/// Returns `Skipped` without touching anything when the account exists;
/// existing accounts are not reconciled.
pub fn create_user(
    s: &mut Session<'_>,
    username: &str,
    key_path: &Path,
    shell: &str,
    admin: bool,
) -> Result<Outcome> {
    let username = validation::require_account_name(username, "username")?;
    let shell = validation::require_non_empty(shell, "shell", "Shell cannot be empty")?;

    if accounts::user_exists(s, username)? {
        log_status!("users", "User {} already exists", username);
        return Ok(Outcome::skipped(format!("User {} already exists", username)));
    }

    let shell_lookup = format!("\"$(which {})\"", quote_arg(shell));
    if admin {
        create_group(s, "admin")?;
        s.sudo(&format!("useradd -G admin -m -s {} {}", shell_lookup, username))?;
    } else {
        s.sudo(&format!("useradd -m -s {} {}", shell_lookup, username))?;
    }
    add_ssh_keys(s, username, key_path)?;
    Ok(Outcome::Completed)
}

/// Remove an account and its home directory. Fails if the account is absent.
pub fn delete_user(s: &mut Session<'_>, username: &str) -> Result<Outcome> {
    let username = validation::require_account_name(username, "username")?;
    s.sudo(&format!("userdel -r {}", username))?;
    Ok(Outcome::Completed)
}

/// Admin account for every configured sysadmin.
pub fn create_sysadmins(s: &mut Session<'_>) -> Result<Outcome> {
    let settings = s.settings();
    if settings.sysadmins.is_empty() {
        return Ok(Outcome::skipped("No sysadmins configured"));
    }

    let root = settings.template_root();
    for (name, sysadmin) in &settings.sysadmins {
        let key = local_path(&sysadmin.ssh_key_path, &root);
        create_user(s, name, &key, &sysadmin.shell, true)?;
    }
    Ok(Outcome::Completed)
}

/// Passwordless sudo for the `admin` group.
///
/// Appends unconditionally: running it twice leaves the stanza in
/// `/etc/sudoers` twice. A warning is recorded when that happens.
pub fn config_sudo(s: &mut Session<'_>) -> Result<Outcome> {
    let probe = format!(
        "grep -qxF {} /etc/sudoers",
        quote_arg(SUDOERS_STANZA[SUDOERS_STANZA.len() - 1])
    );
    if s.query(&probe, true)?.success {
        s.warn("/etc/sudoers already grants the admin group; the stanza is appended again");
    }
    s.append("/etc/sudoers", SUDOERS_STANZA, true)?;
    Ok(Outcome::Completed)
}

const KEY_PARAMS: &[ParamSpec] = &[
    param("username", None, "Account receiving the keys"),
    param("ssh_key_path", None, "Local public key file"),
];

const GROUP_PARAMS: &[ParamSpec] = &[param("name", None, "Group name")];

const CREATE_USER_PARAMS: &[ParamSpec] = &[
    param("username", None, "Account name"),
    param("ssh_key_path", None, "Local public key file appended to authorized_keys"),
    param("shell", None, "Login shell (default bash)"),
    param("admin", None, "Add the account to the admin group (default false)"),
];

const DELETE_USER_PARAMS: &[ParamSpec] = &[param("username", None, "Account name")];

const NO_PARAMS: &[ParamSpec] = &[];

pub fn tasks() -> Vec<TaskSpec> {
    vec![
        TaskSpec {
            name: "add_ssh_keys",
            domain: "users",
            summary: "Append a local public key file to an account's authorized_keys",
            params: KEY_PARAMS,
            runner: run_add_ssh_keys,
        },
        TaskSpec {
            name: "create_group",
            domain: "users",
            summary: "Create a group if it does not exist",
            params: GROUP_PARAMS,
            runner: |s, a| create_group(s, a.require("name")?),
        },
        TaskSpec {
            name: "create_user",
            domain: "users",
            summary: "Create an account with an SSH key unless it already exists",
            params: CREATE_USER_PARAMS,
            runner: run_create_user,
        },
        TaskSpec {
            name: "delete_user",
            domain: "users",
            summary: "Delete an account and its home directory",
            params: DELETE_USER_PARAMS,
            runner: |s, a| delete_user(s, a.require("username")?),
        },
        TaskSpec {
            name: "create_sysadmins",
            domain: "users",
            summary: "Create an admin account for every configured sysadmin",
            params: NO_PARAMS,
            runner: |s, _| create_sysadmins(s),
        },
        TaskSpec {
            name: "config_sudo",
            domain: "users",
            summary: "Grant the admin group passwordless sudo",
            params: NO_PARAMS,
            runner: |s, _| config_sudo(s),
        },
    ]
}

fn run_add_ssh_keys(s: &mut Session<'_>, args: &TaskArgs) -> Result<Outcome> {
    let key = local_path(args.require("ssh_key_path")?, Path::new("."));
    add_ssh_keys(s, args.require("username")?, &key)?;
    Ok(Outcome::Completed)
}

fn run_create_user(s: &mut Session<'_>, args: &TaskArgs) -> Result<Outcome> {
    let key = local_path(args.require("ssh_key_path")?, Path::new("."));
    create_user(
        s,
        args.require("username")?,
        &key,
        args.text("shell").unwrap_or("bash"),
        args.flag("admin")?.unwrap_or(false),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::Target;
    use crate::settings::Settings;
    use crate::transport::RecordingTransport;

    #[test]
    fn create_group_is_idempotent() {
        let settings = Settings::default();
        let transport =
            RecordingTransport::new("web1").with_stdout("getent group", "admin:x:110:alice\n");
        let mut session = Session::new(&transport, &settings, &Target::new("web1", "h", "root"));

        let outcome = create_group(&mut session, "admin").unwrap();
        assert!(matches!(outcome, Outcome::Skipped { .. }));
        assert_eq!(transport.commands(), vec!["getent group"]);

        create_group(&mut session, "admins").unwrap();
        assert_eq!(transport.commands().last().map(String::as_str), Some("groupadd admins"));
    }

    #[test]
    fn config_sudo_warns_on_repeat() {
        let settings = Settings::default();
        let transport = RecordingTransport::new("web1");
        let mut session = Session::new(&transport, &settings, &Target::new("web1", "h", "root"));

        config_sudo(&mut session).unwrap();
        let report = session.into_report("config_sudo", Outcome::Completed);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.steps[1].command.contains("%admin ALL=(ALL) NOPASSWD: ALL"));
    }

    #[test]
    fn invalid_username_is_rejected_before_any_command() {
        let settings = Settings::default();
        let transport = RecordingTransport::new("web1");
        let mut session = Session::new(&transport, &settings, &Target::new("web1", "h", "root"));

        let err = delete_user(&mut session, "bob; reboot").unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
        assert!(transport.commands().is_empty());
    }
}
