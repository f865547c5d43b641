//! Project lifecycle: account, checkout, virtualenv, Apache/WSGI and cron
//! configuration, redeploys.
//!
//! A deployment is identified by project name and branch, which combine into
//! the project account name (`<project>-<branch>` unless overridden). Nothing
//! else is persisted; every task rebuilds the paths from these conventions.
//! Each parameter is resolved on its own, so any of them can be overridden
//! per call while the rest come from settings or defaults.

use crate::accounts;
use crate::error::Result;
use crate::output::Outcome;
use crate::paths::remote_home;
use crate::registry::{param, ParamSpec, TaskArgs, TaskSpec};
use crate::resolve::Resolver;
use crate::session::{Scope, Session};
use crate::tasks::{local_path, system, users};
use crate::utils::shell::{quote_arg, quote_path};
use crate::utils::template::{self, TemplateVars};
use crate::utils::validation;
use chrono::Local;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

static REMOTE_BRANCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([^/\s]+)/(\S+)\s*$").unwrap());

/// Call-site arguments shared by the project tasks. `None` defers to
/// settings, then to the built-in default.
#[derive(Debug, Clone, Default)]
pub struct ProjectArgs {
    pub project_name: Option<String>,
    pub branch: Option<String>,
    pub project_username: Option<String>,
    pub git_url: Option<String>,
    pub server_name: Option<String>,
    pub server_alias: Option<String>,
    pub admin_email: Option<String>,
    pub settings_module: Option<String>,
    pub cron_settings_module: Option<String>,
    pub cron_email: Option<String>,
    pub install_crontab: Option<bool>,
    pub requirements_path: Option<String>,
    pub env_path: Option<String>,
    pub target_directory: Option<String>,
    pub site_packages: Option<bool>,
    pub media_directory: Option<String>,
    pub git_head: Option<String>,
    pub vhost_extension: Option<String>,
    pub do_migrate: Option<bool>,
    pub do_update_apache: Option<bool>,
    pub update_packages: bool,
    /// Set by `setup_project`; suppresses migrations.
    pub initial_deployment: bool,
    pub command: Option<String>,
}

impl ProjectArgs {
    pub fn from_task_args(args: &TaskArgs) -> Result<Self> {
        Ok(Self {
            project_name: args.owned("project_name"),
            branch: args.owned("branch"),
            project_username: args.owned("project_username"),
            git_url: args.owned("git_url"),
            server_name: args.owned("server_name"),
            server_alias: args.owned("server_alias"),
            admin_email: args.owned("admin_email"),
            settings_module: args.owned("settings_module"),
            cron_settings_module: args.owned("cron_settings_module"),
            cron_email: args.owned("cron_email"),
            install_crontab: args.flag("install_crontab")?,
            requirements_path: args.owned("requirements_path"),
            env_path: args.owned("env_path"),
            target_directory: args.owned("target_directory"),
            site_packages: args.flag("site_packages")?,
            media_directory: args.owned("media_directory"),
            git_head: args.owned("git_head"),
            vhost_extension: args.owned("vhost_extension"),
            do_migrate: args.flag("do_migrate")?,
            do_update_apache: args.flag("do_update_apache")?,
            update_packages: args.flag("update_packages")?.unwrap_or(false),
            initial_deployment: false,
            command: args.owned("command"),
        })
    }
}

/// Project name, branch and the account that holds the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectIdentity {
    pub name: String,
    pub branch: String,
    pub account: String,
}

impl ProjectIdentity {
    pub fn resolve(r: Resolver<'_>, p: &ProjectArgs) -> Result<Self> {
        let name = r.text(p.project_name.as_deref(), "PROJECT_NAME", "project")?;
        validation::require_path_component(&name, "project_name")?;
        let branch = r.text(p.branch.as_deref(), "BRANCH", "master")?;
        let account = r.text(
            p.project_username.as_deref(),
            "PROJECT_USERNAME",
            &format!("{}-{}", name, branch),
        )?;
        validation::require_account_name(&account, "project_username")?;

        Ok(Self {
            name,
            branch,
            account,
        })
    }

    pub fn home(&self) -> String {
        remote_home(&self.account)
    }

    pub fn checkout_dir(&self) -> String {
        format!("{}/{}", self.home(), self.name)
    }

    fn scope(&self) -> Scope {
        Scope::new().as_user(&self.account).in_dir(self.home())
    }

    fn checkout_scope(&self) -> Scope {
        Scope::new().as_user(&self.account).in_dir(self.checkout_dir())
    }
}

struct Site {
    server_name: String,
    server_alias: String,
    admin_email: String,
    settings_module: String,
}

impl Site {
    fn resolve(r: Resolver<'_>, p: &ProjectArgs) -> Result<Self> {
        let server_name = r.text(p.server_name.as_deref(), "SERVER_NAME", "localhost")?;
        let server_alias = r.text(
            p.server_alias.as_deref(),
            "SERVER_ALIAS",
            &format!("www.{}", server_name),
        )?;
        let admin_email = r.text(
            p.admin_email.as_deref(),
            "ADMIN_EMAIL",
            &format!("root@{}", server_name),
        )?;
        let settings_module = settings_module(r, p)?;

        Ok(Self {
            server_name,
            server_alias,
            admin_email,
            settings_module,
        })
    }
}

fn settings_module(r: Resolver<'_>, p: &ProjectArgs) -> Result<String> {
    r.text(p.settings_module.as_deref(), "SETTINGS_MODULE", "settings")
}

/// A remote-tracking branch from `git branch -r`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBranch {
    pub remote: String,
    pub name: String,
}

/// Remote branches that need a local tracking branch after a clone:
/// everything except `HEAD` pointers and `master`.
pub fn tracking_branches(listing: &str) -> Vec<RemoteBranch> {
    listing
        .lines()
        .filter(|line| !line.contains("HEAD"))
        .filter_map(|line| REMOTE_BRANCH.captures(line))
        .map(|caps| RemoteBranch {
            remote: caps[1].to_string(),
            name: caps[2].to_string(),
        })
        .filter(|b| b.name != "master")
        .collect()
}

/// Create the project account unless it exists.
///
/// The account gets every sysadmin's key, its own keypair for pulling from
/// the git host, host-key checking disabled for outbound SSH, and a `log/`
/// directory shared with `www-data`.
pub fn setup_project_user(s: &mut Session<'_>, p: &ProjectArgs) -> Result<Outcome> {
    let id = ProjectIdentity::resolve(s.resolver(), p)?;
    let account = id.account.as_str();

    if accounts::user_exists(s, account)? {
        log_status!("project", "Account {} already exists", account);
        return Ok(Outcome::skipped(format!("Account {} already exists", account)));
    }

    s.sudo(&format!(
        "adduser --gecos {} --disabled-password {}",
        account, account
    ))?;
    s.sudo(&format!("usermod -a -G www-data {}", account))?;

    let settings = s.settings();
    let root = settings.template_root();
    for sysadmin in settings.sysadmins.values() {
        users::add_ssh_keys(s, account, &local_path(&sysadmin.ssh_key_path, &root))?;
    }

    s.within(id.scope(), |s| {
        s.run("mkdir -p .ssh")?;
        s.run("ssh-keygen -t rsa -f .ssh/id_rsa -N \"\"")?;
        s.append(".ssh/config", &["Host *", "StrictHostKeyChecking no"], false)?;
        s.run("mkdir -p log")?;
        s.run("chmod 770 log")?;
        s.run(&format!("chown {}:www-data log", account))?;
        s.run("touch log/app.log")?;
        s.run("touch log/db.log")?;
        s.run("chmod 664 log/*.log")?;
        s.run(&format!("chown {}:www-data log/*.log", account))?;
        Ok(())
    })?;

    Ok(Outcome::Completed)
}

/// Fresh virtualenv in the account home, with current setuptools and pip.
pub fn setup_project_virtualenv(s: &mut Session<'_>, p: &ProjectArgs) -> Result<Outcome> {
    let r = s.resolver();
    let id = ProjectIdentity::resolve(r, p)?;
    let target = r.text(p.target_directory.as_deref(), "TARGET_DIRECTORY", "env")?;
    let site_packages = r.flag(p.site_packages, "SITE_PACKAGES", false)?;

    s.within(id.scope(), |s| {
        if site_packages {
            s.run(&format!("virtualenv {}", quote_arg(&target)))?;
        } else {
            s.run(&format!("virtualenv --no-site-packages {}", quote_arg(&target)))?;
        }
        s.run(&format!("{}/bin/easy_install -U setuptools", target))?;
        s.run(&format!("{}/bin/easy_install -U pip", target))?;
        Ok(())
    })?;

    Ok(Outcome::Completed)
}

/// `pip install -r` into the project virtualenv. Paths are relative to the
/// account home.
pub fn install_project_requirements(s: &mut Session<'_>, p: &ProjectArgs) -> Result<Outcome> {
    let r = s.resolver();
    let id = ProjectIdentity::resolve(r, p)?;
    let requirements = r.text(
        p.requirements_path.as_deref(),
        "REQUIREMENTS_PATH",
        &format!("{}/deploy/requirements.txt", id.name),
    )?;
    let env_path = r.text(p.env_path.as_deref(), "ENV_PATH", "env")?;
    let upgrade = if p.update_packages { " --upgrade" } else { "" };

    s.within(id.scope(), |s| {
        s.run(&format!(
            "{}/bin/pip install{} -r {}",
            env_path,
            upgrade,
            quote_arg(&requirements)
        ))
    })?;

    Ok(Outcome::Completed)
}

/// Clone the repository into `<home>/<project>` and check out the branch.
///
/// Returns `Conflict` without issuing any command beyond the existence check
/// when the checkout directory is already there.
pub fn setup_project_code(s: &mut Session<'_>, p: &ProjectArgs) -> Result<Outcome> {
    let r = s.resolver();
    let id = ProjectIdentity::resolve(r, p)?;
    let git_url = r.require_text(p.git_url.as_deref(), "GIT_URL")?;

    s.within(id.scope(), |s| {
        if s.exists(&id.name, false)? {
            log_status!("project", "{} already exists, not cloning", id.checkout_dir());
            return Ok(Outcome::conflict(format!(
                "Destination {} already exists; the repository has been cloned already",
                id.checkout_dir()
            )));
        }

        s.run(&format!("git clone {} {}", quote_arg(&git_url), quote_arg(&id.name)))?;

        s.within(Scope::new().in_dir(&id.name), |s| {
            s.run("git submodule init")?;
            s.run("git submodule update --recursive")?;

            let listing = s.run("git branch -r")?.stdout;
            for branch in tracking_branches(&listing) {
                s.run(&format!(
                    "git branch {} --track {}/{}",
                    quote_arg(&branch.name),
                    branch.remote,
                    branch.name
                ))?;
            }

            s.run(&format!("git checkout {}", quote_arg(&id.branch)))?;
            Ok(Outcome::Completed)
        })
    })
}

fn render_context<V: AsRef<str>>(pairs: &[(&str, V)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.as_ref().to_string()))
        .collect()
}

/// Render unless the destination exists. Existing files are left as they
/// are and noted in the report.
fn render_once(
    s: &mut Session<'_>,
    template_path: &Path,
    dest: &str,
    context: &HashMap<String, String>,
) -> Result<bool> {
    if s.exists(dest, true)? {
        s.warn(format!("{} already exists; left unchanged", dest));
        return Ok(false);
    }
    s.render_template(template_path, dest, context, true)?;
    Ok(true)
}

/// HEAD of the checkout, or empty when it cannot be read.
fn current_head(s: &mut Session<'_>, id: &ProjectIdentity) -> Result<String> {
    let output = s.within(id.checkout_scope(), |s| s.query("git rev-parse HEAD", false))?;
    Ok(if output.success {
        output.stdout.trim().to_string()
    } else {
        String::new()
    })
}

/// Install the Apache vhost and WSGI entry point, enable the site and reload.
///
/// A failed `apache2ctl configtest` is reported as a warning and Apache is
/// not reloaded.
pub fn setup_project_apache(s: &mut Session<'_>, p: &ProjectArgs) -> Result<Outcome> {
    let r = s.resolver();
    let id = ProjectIdentity::resolve(r, p)?;
    let site = Site::resolve(r, p)?;
    let media = r.text(
        p.media_directory.as_deref(),
        "MEDIA_DIRECTORY",
        &format!("{}/media/", id.name),
    )?;
    let extension = r.text(p.vhost_extension.as_deref(), "VHOST_EXTENSION", "apache2")?;

    let root = s.settings().template_root();
    let vhost_template = template::locate(&root, "template.apache2")?;
    let wsgi_template = template::locate(&root, "template.wsgi")?;

    let git_head = match r.opt_text(p.git_head.as_deref(), "CURRENT_HEAD", None)? {
        Some(head) => head,
        None => current_head(s, &id)?,
    };

    let media_path = format!("{}/{}", id.home(), media);
    s.sudo(&format!("chgrp www-data -R {}", quote_path(&media_path)))?;
    s.sudo(&format!("chmod g+w {}", quote_path(&media_path)))?;

    let context = render_context(&[
        (TemplateVars::PROJECT_NAME, &id.name),
        (TemplateVars::PROJECT_USERNAME, &id.account),
        (TemplateVars::ADMIN_EMAIL, &site.admin_email),
        (TemplateVars::SERVER_NAME, &site.server_name),
        (TemplateVars::SERVER_ALIAS, &site.server_alias),
        (TemplateVars::SETTINGS_MODULE, &site.settings_module),
        (TemplateVars::BRANCH, &id.branch),
        (TemplateVars::GIT_HEAD, &git_head),
    ]);

    let vhost_file = format!("{}.{}", id.account, extension);
    let vhost_dest = format!("/etc/apache2/sites-available/{}", vhost_file);
    render_once(s, &vhost_template, &vhost_dest, &context)?;
    s.within(Scope::new().tolerant(), |s| {
        s.sudo(&format!("a2ensite {}", quote_arg(&vhost_file)))
    })?;

    let wsgi_dest = format!("{}/{}.wsgi", id.home(), id.account);
    render_once(s, &wsgi_template, &wsgi_dest, &context)?;
    s.sudo(&format!(
        "chown {}:www-data {}",
        id.account,
        quote_path(&wsgi_dest)
    ))?;
    s.sudo(&format!("chmod 755 {}", quote_path(&wsgi_dest)))?;

    let configtest = s.within(Scope::new().tolerant(), |s| {
        s.sudo("a2enmod rewrite")?;
        s.sudo("a2enmod headers")?;
        s.sudo("apache2ctl configtest")
    })?;

    if configtest.success {
        system::apache_reload(s)?;
    } else {
        s.warn(
            "Invalid apache configuration! The requested configuration was installed, \
             but there is a problem with it.",
        );
    }

    s.record("vhost", vhost_dest);
    s.record("wsgi", wsgi_dest);
    Ok(Outcome::Completed)
}

/// Render `deploy/crontab` in the checkout and optionally install it.
pub fn setup_project_crontab(s: &mut Session<'_>, p: &ProjectArgs) -> Result<Outcome> {
    let r = s.resolver();
    let id = ProjectIdentity::resolve(r, p)?;
    let module = settings_module(r, p)?;
    let cron_module = r.text(
        p.cron_settings_module.as_deref(),
        "CRON_SETTINGS_MODULE",
        &module,
    )?;
    let cron_email = r.text(p.cron_email.as_deref(), "CRON_EMAIL", "root@localhost")?;
    let install = r.flag(p.install_crontab, "INSTALL_CRONTAB", false)?;

    let root = s.settings().template_root();
    let crontab_template = template::locate(&root, "template.crontab")?;

    let context = render_context(&[
        (TemplateVars::PROJECT_NAME, &id.name),
        (TemplateVars::PROJECT_USERNAME, &id.account),
        (TemplateVars::CRON_EMAIL, &cron_email),
        (TemplateVars::SETTINGS_MODULE, &cron_module),
    ]);
    let crontab_path = format!("{}/deploy/crontab", id.checkout_dir());

    s.within(Scope::new().as_user(&id.account), |s| {
        s.render_template(&crontab_template, &crontab_path, &context, false)?;
        if install {
            s.within(Scope::new().in_dir(id.checkout_dir()), |s| {
                s.run("crontab deploy/crontab")
            })?;
        }
        Ok(())
    })?;

    s.record("crontab", crontab_path);
    s.record("crontabInstalled", install);
    Ok(Outcome::Completed)
}

/// Pull the branch, reinstall requirements, re-render configuration and
/// append a line to `<home>/log/deploy.log`.
pub fn update_project(s: &mut Session<'_>, p: &ProjectArgs) -> Result<Outcome> {
    let r = s.resolver();
    let id = ProjectIdentity::resolve(r, p)?;
    let module = settings_module(r, p)?;
    let env_path = r.text(p.env_path.as_deref(), "ENV_PATH", "env")?;
    let do_migrate = r.flag(p.do_migrate, "DO_MIGRATE", false)?;

    s.within(id.checkout_scope(), |s| {
        s.run(&format!("git checkout {}", quote_arg(&id.branch)))?;
        s.run("git pull")?;
        s.run("git submodule update")?;
        Ok(())
    })?;

    install_project_requirements(s, p)?;

    if do_migrate && !p.initial_deployment {
        let python = format!("{}/{}/bin/python", id.home(), env_path);
        s.within(id.checkout_scope(), |s| {
            s.run(&format!(
                "{} manage.py migrate --settings={}",
                python,
                quote_arg(&module)
            ))
        })?;
    }

    if p.do_update_apache.unwrap_or(true) {
        setup_project_apache(s, p)?;
    }
    setup_project_crontab(s, p)?;

    let head = s.within(id.checkout_scope(), |s| {
        s.run("find -L . -name '*.pyc' | xargs -r rm")?;
        Ok(s.run("git rev-parse HEAD")?.stdout.trim().to_string())
    })?;

    let line = format!(
        "Deploy on {} by {}. HEAD: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
        s.operator(),
        head
    );
    s.within(Scope::new().in_dir(id.home()), |s| {
        s.append("log/deploy.log", &[line.as_str()], true)
    })?;

    s.record("head", head);
    s.record("deployLog", line);
    Ok(Outcome::Completed)
}

/// Full setup: account, checkout, virtualenv, logrotate, then an initial
/// deployment through [`update_project`].
///
/// Pauses after printing the account's public key so it can be registered
/// with the git host before cloning.
pub fn setup_project(s: &mut Session<'_>, p: &ProjectArgs) -> Result<Outcome> {
    let r = s.resolver();
    let id = ProjectIdentity::resolve(r, p)?;
    r.require_text(p.git_url.as_deref(), "GIT_URL")?;

    setup_project_user(s, p)?;

    let public_key = s.sudo(&format!("cat {}/.ssh/id_rsa.pub", id.home()))?;
    log_status!("project", "Project account public key:\n{}", public_key.stdout.trim());
    s.record("publicKey", public_key.stdout.trim());
    s.pause("Register the public key with the git host, then press enter to clone")?;

    let checkout = setup_project_code(s, p)?;
    if !checkout.is_completed() {
        return Ok(checkout);
    }
    setup_project_virtualenv(s, p)?;

    let logrotate_dir = format!("{}/deploy/logrotate/", id.checkout_dir());
    s.within(Scope::new().in_dir(logrotate_dir), |s| {
        s.sudo("cat apache2 >> /etc/logrotate.d/apache2")
    })?;

    let initial = ProjectArgs {
        initial_deployment: true,
        ..p.clone()
    };
    update_project(s, &initial)?;

    log_status!(
        "project",
        "Setup complete. Use patch_virtualenv to link system packages the virtualenv needs."
    );
    Ok(Outcome::Completed)
}

/// Remove the checkout. The account and its home stay.
pub fn delete_project_code(s: &mut Session<'_>, p: &ProjectArgs) -> Result<Outcome> {
    let id = ProjectIdentity::resolve(s.resolver(), p)?;
    s.sudo(&format!("rm -rf {}", quote_path(&id.checkout_dir())))?;
    Ok(Outcome::Completed)
}

/// Run `manage.py <command>` in the checkout with the project virtualenv.
pub fn manage_project(s: &mut Session<'_>, p: &ProjectArgs) -> Result<Outcome> {
    let r = s.resolver();
    let id = ProjectIdentity::resolve(r, p)?;
    let command = validation::require(p.command.as_deref(), "command", "Missing manage.py command")?;
    let command = validation::require_non_empty(command, "command", "Missing manage.py command")?;
    let module = settings_module(r, p)?;
    let env_path = r.text(p.env_path.as_deref(), "ENV_PATH", "env")?;

    let output = s.within(id.checkout_scope(), |s| {
        s.run(&format!(
            "{}/{}/bin/python manage.py {} --settings={}",
            id.home(),
            env_path,
            command,
            quote_arg(&module)
        ))
    })?;

    s.record("stdout", output.stdout);
    Ok(Outcome::Completed)
}

const PROJECT_NAME: ParamSpec = param("project_name", Some("PROJECT_NAME"), "Project name (default project)");
const BRANCH: ParamSpec = param("branch", Some("BRANCH"), "Deployment branch (default master)");
const PROJECT_USERNAME: ParamSpec = param(
    "project_username",
    Some("PROJECT_USERNAME"),
    "Project account (default <project>-<branch>)",
);
const GIT_URL: ParamSpec = param("git_url", Some("GIT_URL"), "Repository to clone (required)");
const TARGET_DIRECTORY: ParamSpec = param(
    "target_directory",
    Some("TARGET_DIRECTORY"),
    "Virtualenv directory relative to the account home (default env)",
);
const SITE_PACKAGES: ParamSpec = param(
    "site_packages",
    Some("SITE_PACKAGES"),
    "Give the virtualenv access to system site-packages (default false)",
);
const REQUIREMENTS_PATH: ParamSpec = param(
    "requirements_path",
    Some("REQUIREMENTS_PATH"),
    "Requirements file relative to the account home",
);
const ENV_PATH: ParamSpec = param("env_path", Some("ENV_PATH"), "Virtualenv relative to the account home (default env)");
const UPDATE_PACKAGES: ParamSpec = param("update_packages", None, "Upgrade already-installed packages");
const SERVER_NAME: ParamSpec = param("server_name", Some("SERVER_NAME"), "Apache ServerName (default localhost)");
const SERVER_ALIAS: ParamSpec = param("server_alias", Some("SERVER_ALIAS"), "Apache ServerAlias (default www.<server>)");
const ADMIN_EMAIL: ParamSpec = param("admin_email", Some("ADMIN_EMAIL"), "ServerAdmin address (default root@<server>)");
const SETTINGS_MODULE: ParamSpec = param("settings_module", Some("SETTINGS_MODULE"), "Settings module (default settings)");
const MEDIA_DIRECTORY: ParamSpec = param(
    "media_directory",
    Some("MEDIA_DIRECTORY"),
    "Media directory relative to the account home (default <project>/media/)",
);
const GIT_HEAD: ParamSpec = param("git_head", Some("CURRENT_HEAD"), "Commit hash for templates (default: queried)");
const VHOST_EXTENSION: ParamSpec = param("vhost_extension", Some("VHOST_EXTENSION"), "Vhost file extension (default apache2)");
const CRON_SETTINGS_MODULE: ParamSpec = param(
    "cron_settings_module",
    Some("CRON_SETTINGS_MODULE"),
    "Settings module for cron jobs (default settings_module)",
);
const CRON_EMAIL: ParamSpec = param("cron_email", Some("CRON_EMAIL"), "MAILTO for cron jobs (default root@localhost)");
const INSTALL_CRONTAB: ParamSpec = param("install_crontab", Some("INSTALL_CRONTAB"), "Install the rendered crontab (default false)");
const DO_MIGRATE: ParamSpec = param("do_migrate", Some("DO_MIGRATE"), "Run manage.py migrate (default false)");
const DO_UPDATE_APACHE: ParamSpec = param("do_update_apache", None, "Re-render Apache configuration (default true)");
const COMMAND: ParamSpec = param("command", None, "manage.py subcommand and its arguments");

const IDENTITY_PARAMS: &[ParamSpec] = &[PROJECT_NAME, BRANCH, PROJECT_USERNAME];

const VIRTUALENV_PARAMS: &[ParamSpec] = &[
    PROJECT_NAME,
    BRANCH,
    PROJECT_USERNAME,
    TARGET_DIRECTORY,
    SITE_PACKAGES,
];

const REQUIREMENTS_PARAMS: &[ParamSpec] = &[
    PROJECT_NAME,
    BRANCH,
    PROJECT_USERNAME,
    REQUIREMENTS_PATH,
    ENV_PATH,
    UPDATE_PACKAGES,
];

const CODE_PARAMS: &[ParamSpec] = &[PROJECT_NAME, BRANCH, PROJECT_USERNAME, GIT_URL];

const APACHE_PARAMS: &[ParamSpec] = &[
    PROJECT_NAME,
    BRANCH,
    PROJECT_USERNAME,
    SERVER_NAME,
    SERVER_ALIAS,
    ADMIN_EMAIL,
    SETTINGS_MODULE,
    MEDIA_DIRECTORY,
    GIT_HEAD,
    VHOST_EXTENSION,
];

const CRONTAB_PARAMS: &[ParamSpec] = &[
    PROJECT_NAME,
    BRANCH,
    PROJECT_USERNAME,
    SETTINGS_MODULE,
    CRON_SETTINGS_MODULE,
    CRON_EMAIL,
    INSTALL_CRONTAB,
];

const UPDATE_PARAMS: &[ParamSpec] = &[
    PROJECT_NAME,
    BRANCH,
    PROJECT_USERNAME,
    REQUIREMENTS_PATH,
    ENV_PATH,
    UPDATE_PACKAGES,
    DO_MIGRATE,
    DO_UPDATE_APACHE,
    SERVER_NAME,
    SERVER_ALIAS,
    ADMIN_EMAIL,
    SETTINGS_MODULE,
    MEDIA_DIRECTORY,
    GIT_HEAD,
    VHOST_EXTENSION,
    CRON_SETTINGS_MODULE,
    CRON_EMAIL,
    INSTALL_CRONTAB,
];

const SETUP_PARAMS: &[ParamSpec] = &[
    PROJECT_NAME,
    BRANCH,
    PROJECT_USERNAME,
    GIT_URL,
    TARGET_DIRECTORY,
    SITE_PACKAGES,
    REQUIREMENTS_PATH,
    ENV_PATH,
    UPDATE_PACKAGES,
    DO_UPDATE_APACHE,
    SERVER_NAME,
    SERVER_ALIAS,
    ADMIN_EMAIL,
    SETTINGS_MODULE,
    MEDIA_DIRECTORY,
    GIT_HEAD,
    VHOST_EXTENSION,
    CRON_SETTINGS_MODULE,
    CRON_EMAIL,
    INSTALL_CRONTAB,
];

const MANAGE_PARAMS: &[ParamSpec] = &[
    PROJECT_NAME,
    BRANCH,
    PROJECT_USERNAME,
    COMMAND,
    SETTINGS_MODULE,
    ENV_PATH,
];

fn project_task(
    name: &'static str,
    summary: &'static str,
    params: &'static [ParamSpec],
    runner: fn(&mut Session<'_>, &TaskArgs) -> Result<Outcome>,
) -> TaskSpec {
    TaskSpec {
        name,
        domain: "projects",
        summary,
        params,
        runner,
    }
}

pub fn tasks() -> Vec<TaskSpec> {
    vec![
        project_task(
            "setup_project_user",
            "Create the project account with keys and a log directory",
            IDENTITY_PARAMS,
            |s, a| setup_project_user(s, &ProjectArgs::from_task_args(a)?),
        ),
        project_task(
            "setup_project_virtualenv",
            "Create the project virtualenv",
            VIRTUALENV_PARAMS,
            |s, a| setup_project_virtualenv(s, &ProjectArgs::from_task_args(a)?),
        ),
        project_task(
            "install_project_requirements",
            "pip install the project's requirements file",
            REQUIREMENTS_PARAMS,
            |s, a| install_project_requirements(s, &ProjectArgs::from_task_args(a)?),
        ),
        project_task(
            "setup_project_code",
            "Clone the repository and create tracking branches",
            CODE_PARAMS,
            |s, a| setup_project_code(s, &ProjectArgs::from_task_args(a)?),
        ),
        project_task(
            "setup_project_apache",
            "Install the Apache vhost and WSGI file and reload Apache",
            APACHE_PARAMS,
            |s, a| setup_project_apache(s, &ProjectArgs::from_task_args(a)?),
        ),
        project_task(
            "setup_project_crontab",
            "Render and optionally install the project crontab",
            CRONTAB_PARAMS,
            |s, a| setup_project_crontab(s, &ProjectArgs::from_task_args(a)?),
        ),
        project_task(
            "update_project",
            "Pull, reinstall requirements, re-render configuration and log the deploy",
            UPDATE_PARAMS,
            |s, a| update_project(s, &ProjectArgs::from_task_args(a)?),
        ),
        project_task(
            "setup_project",
            "Provision account, checkout and virtualenv, then run the first deploy",
            SETUP_PARAMS,
            |s, a| setup_project(s, &ProjectArgs::from_task_args(a)?),
        ),
        project_task(
            "delete_project_code",
            "Remove the project checkout (the account is kept)",
            IDENTITY_PARAMS,
            |s, a| delete_project_code(s, &ProjectArgs::from_task_args(a)?),
        ),
        project_task(
            "manage_project",
            "Run a manage.py command in the project checkout",
            MANAGE_PARAMS,
            |s, a| manage_project(s, &ProjectArgs::from_task_args(a)?),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    #[test]
    fn identity_defaults_and_overrides() {
        let settings = Settings::default();
        let id = ProjectIdentity::resolve(Resolver::new(&settings), &ProjectArgs::default()).unwrap();
        assert_eq!(id.account, "project-master");
        assert_eq!(id.checkout_dir(), "/home/project-master/project");

        let settings = Settings::default()
            .with_override("PROJECT_NAME", "shop")
            .with_override("BRANCH", "stable");
        let args = ProjectArgs {
            branch: Some("beta".to_string()),
            ..ProjectArgs::default()
        };
        let id = ProjectIdentity::resolve(Resolver::new(&settings), &args).unwrap();
        assert_eq!(id.account, "shop-beta");
    }

    #[test]
    fn tracking_branches_skip_head_and_master() {
        let listing = "  origin/HEAD -> origin/master\n  origin/master\n  origin/stable\n  origin/feature/search\n  origin/master-old\n";
        let names: Vec<String> = tracking_branches(listing).into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["stable", "feature/search", "master-old"]);
    }

    #[test]
    fn project_task_args_parse_flags() {
        let args = TaskArgs::new().with("do_migrate", "yes").with("update_packages", "true");
        let parsed = ProjectArgs::from_task_args(&args).unwrap();
        assert_eq!(parsed.do_migrate, Some(true));
        assert!(parsed.update_packages);
        assert!(!parsed.initial_deployment);
    }
}
