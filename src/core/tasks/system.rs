//! System bootstrap.
//!
//! Best-effort steps for a fresh Ubuntu host. Apart from the swap, hosts and
//! timezone steps, nothing here checks remote state before acting.

use crate::error::{Error, Result};
use crate::output::Outcome;
use crate::registry::{param, ParamSpec, TaskArgs, TaskSpec};
use crate::session::{Scope, Session};
use crate::tasks::{file_name, local_path, users};
use crate::utils::shell::{quote_arg, quote_path};

const APACHE_PACKAGES: &[&str] = &["apache2", "apache2-utils", "libapache2-mod-wsgi"];
const POSTGRES_PACKAGES: &[&str] = &["postgresql", "python-egenix-mxdatetime"];

const DEFAULT_TZ_FILE: &str = "/usr/share/zoneinfo/Etc/UTC";
const DEFAULT_TZ_CONFIG: &str = "/etc/localtime";

/// Enable universe sources, refresh the package index and upgrade.
pub fn update(s: &mut Session<'_>) -> Result<Outcome> {
    s.uncomment("/etc/apt/sources.list", "deb.*universe", true)?;
    s.sudo("apt-get update -y")?;
    s.sudo("apt-get upgrade -y")?;
    Ok(Outcome::Completed)
}

/// Upload each configured debconf seed and feed it to `debconf-set-selections`.
pub fn install_debconf_seeds(s: &mut Session<'_>) -> Result<Outcome> {
    let settings = s.settings();
    let root = settings.template_root();

    s.sudo("apt-get -y install debconf-utils")?;
    for seed in &settings.debconf_seeds {
        let local = local_path(seed, &root);
        let remote = format!("/tmp/{}", file_name(&local));
        log_status!("system", "Installing seed: {}", remote);
        s.upload(&local, &remote, false)?;
        s.sudo(&format!("debconf-set-selections {}", quote_path(&remote)))?;
    }
    Ok(Outcome::Completed)
}

pub fn install_base_packages(s: &mut Session<'_>) -> Result<Outcome> {
    let packages = &s.settings().base_packages;
    if packages.is_empty() {
        return Ok(Outcome::skipped("No basePackages configured"));
    }
    for pkg in packages {
        s.sudo(&format!("apt-get -y install {}", quote_arg(pkg)))?;
    }
    Ok(Outcome::Completed)
}

/// Point apticron notifications at the sysadmins' addresses.
pub fn config_apticron(s: &mut Session<'_>) -> Result<Outcome> {
    let emails = s.settings().sysadmin_emails();
    if emails.is_empty() {
        return Ok(Outcome::skipped("No sysadmin email addresses configured"));
    }
    s.sed(
        "/etc/apticron/apticron.conf",
        "\"root\"",
        &format!("\"{}\"", emails.join(" ")),
        "EMAIL=",
        true,
    )?;
    Ok(Outcome::Completed)
}

/// Disable root and password logins, then restart sshd.
///
/// Make sure sysadmin accounts with keys exist before running this.
pub fn config_sshd(s: &mut Session<'_>) -> Result<Outcome> {
    let sshd_config = "/etc/ssh/sshd_config";
    s.sed(sshd_config, "yes", "no", "PermitRootLogin", true)?;
    s.sed(
        sshd_config,
        "#PasswordAuthentication yes",
        "PasswordAuthentication no",
        "",
        true,
    )?;
    s.sudo("/etc/init.d/ssh restart")?;
    Ok(Outcome::Completed)
}

/// Apache with mod_wsgi backed by a shared virtualenv, plus mod_ssl.
pub fn install_apache(s: &mut Session<'_>) -> Result<Outcome> {
    for pkg in APACHE_PACKAGES {
        s.sudo(&format!("apt-get -y install {}", pkg))?;
    }
    s.sudo("virtualenv --no-site-packages /var/www/virtualenv")?;
    s.append(
        "/etc/apache2/conf.d/wsgi-virtualenv",
        &["WSGIPythonHome /var/www/virtualenv"],
        true,
    )?;
    s.sudo("a2enmod ssl")?;
    s.append("/etc/apache2/httpd.conf", &["ServerName localhost"], true)?;
    apache_reload(s)
}

pub fn install_postgres(s: &mut Session<'_>) -> Result<Outcome> {
    for pkg in POSTGRES_PACKAGES {
        s.sudo(&format!("apt-get -y install {}", pkg))?;
    }
    s.sudo("apt-get -y build-dep psycopg2")?;
    Ok(Outcome::Completed)
}

/// Create `/swapfile` of `size_mb` megabytes and register it in fstab.
/// No-op when no size resolves.
pub fn setup_swap(s: &mut Session<'_>, size_mb: Option<i64>) -> Result<Outcome> {
    let size = match s.resolver().number(size_mb, "SWAP_SIZE", None)? {
        Some(size) if size > 0 => size,
        _ => return Ok(Outcome::skipped("No swap size given")),
    };
    let blocks = size.checked_mul(1024).ok_or_else(|| {
        Error::validation_invalid_argument(
            "swap_size",
            "Swap size is too large",
            Some(size.to_string()),
            None,
        )
    })?;

    s.sudo(&format!(
        "dd if=/dev/zero of=/swapfile bs=1024 count={}",
        blocks
    ))?;
    s.sudo("mkswap /swapfile")?;
    s.sudo("chown root:root /swapfile")?;
    s.sudo("chmod 0600 /swapfile")?;
    s.sudo("swapon /swapfile")?;
    s.append("/etc/fstab", &["/swapfile swap swap defaults 0 0"], true)?;
    Ok(Outcome::Completed)
}

/// Write the hostname to `/etc/hostname` and a `127.0.1.1` line to `/etc/hosts`.
///
/// Falls back to the selected host's label when no hostname is given.
pub fn setup_hosts(s: &mut Session<'_>, hostname: Option<&str>) -> Result<Outcome> {
    let fallback = s.hostname().to_string();
    let hostname = s
        .resolver()
        .opt_text(hostname, "HOSTNAME", Some(fallback.as_str()))?
        .unwrap_or_default();
    if hostname.is_empty() {
        return Ok(Outcome::skipped("setup_hosts requires a hostname"));
    }

    let entry = format!("127.0.1.1\t{}", hostname);
    s.append("/etc/hosts", &[entry.as_str()], true)?;
    s.sudo(&format!("hostname {}", quote_arg(&hostname)))?;
    s.sudo(&format!("echo {} > /etc/hostname", quote_arg(&hostname)))?;
    Ok(Outcome::Completed)
}

/// Copy a zoneinfo file over the system timezone, if the file exists.
pub fn set_timezone(
    s: &mut Session<'_>,
    tz_file: Option<&str>,
    tz_config: Option<&str>,
) -> Result<Outcome> {
    let r = s.resolver();
    let tz_file = r.text(tz_file, "TZ_FILE", DEFAULT_TZ_FILE)?;
    let tz_config = r.text(tz_config, "TZ_CONFIG", DEFAULT_TZ_CONFIG)?;

    if !s.exists(&tz_file, false)? {
        return Ok(Outcome::skipped(format!("{} does not exist", tz_file)));
    }
    s.sudo(&format!("cp {} {}", quote_path(&tz_file), quote_path(&tz_config)))?;
    Ok(Outcome::Completed)
}

/// Graceful restart: reloads configuration without dropping connections.
pub fn apache_reload(s: &mut Session<'_>) -> Result<Outcome> {
    s.sudo("/etc/init.d/apache2 reload")?;
    Ok(Outcome::Completed)
}

/// Full restart. Only needed after changing Apache itself, e.g. new modules.
pub fn apache_restart(s: &mut Session<'_>) -> Result<Outcome> {
    s.sudo("/etc/init.d/apache2 restart")?;
    Ok(Outcome::Completed)
}

/// Symlink a system package into a project virtualenv's site-packages.
pub fn patch_virtualenv(
    s: &mut Session<'_>,
    user: &str,
    package_path: &str,
    virtualenv_path: &str,
    python: &str,
) -> Result<Outcome> {
    let target = format!(
        "/home/{}/{}/lib/{}/site-packages/",
        user, virtualenv_path, python
    );
    s.within(Scope::new().as_user(user), |s| {
        s.run(&format!("ln -s {} {}", quote_path(package_path), quote_path(&target)))
    })?;
    Ok(Outcome::Completed)
}

/// Options for [`init_server`].
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub swap_size: Option<i64>,
    pub apache: bool,
    pub postgres: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            swap_size: None,
            apache: true,
            postgres: true,
        }
    }
}

/// Baseline configuration of a fresh server.
pub fn init_server(s: &mut Session<'_>, options: &InitOptions) -> Result<Outcome> {
    setup_swap(s, options.swap_size)?;
    setup_hosts(s, None)?;
    update(s)?;
    set_timezone(s, None, None)?;
    install_debconf_seeds(s)?;
    install_base_packages(s)?;
    config_apticron(s)?;
    users::create_sysadmins(s)?;
    users::config_sudo(s)?;
    if options.apache {
        install_apache(s)?;
    }
    if options.postgres {
        install_postgres(s)?;
    }
    config_sshd(s)?;
    Ok(Outcome::Completed)
}

const NO_PARAMS: &[ParamSpec] = &[];

const SWAP_PARAMS: &[ParamSpec] = &[param("size", Some("SWAP_SIZE"), "Swap size in MB")];

const HOSTS_PARAMS: &[ParamSpec] = &[param(
    "hostname",
    Some("HOSTNAME"),
    "Hostname to apply (defaults to the selected host label)",
)];

const TIMEZONE_PARAMS: &[ParamSpec] = &[
    param("tz_file", Some("TZ_FILE"), "Zoneinfo file to install"),
    param("tz_config", Some("TZ_CONFIG"), "Destination, usually /etc/localtime"),
];

const PATCH_PARAMS: &[ParamSpec] = &[
    param("user", None, "Project account owning the virtualenv"),
    param("package_path", None, "Remote package directory to link"),
    param("virtualenv_path", None, "Virtualenv relative to the account home (default env)"),
    param("python", None, "Python lib directory name (default python2.6)"),
];

const INIT_PARAMS: &[ParamSpec] = &[
    param("swap_size", Some("SWAP_SIZE"), "Swap size in MB; omitted skips swap"),
    param("apache", None, "Install Apache (default true)"),
    param("postgres", None, "Install PostgreSQL (default true)"),
];

pub fn tasks() -> Vec<TaskSpec> {
    vec![
        TaskSpec {
            name: "update",
            domain: "system",
            summary: "Enable universe sources, refresh the package index and upgrade",
            params: NO_PARAMS,
            runner: |s, _| update(s),
        },
        TaskSpec {
            name: "install_debconf_seeds",
            domain: "system",
            summary: "Install debconf seed files for unattended package configuration",
            params: NO_PARAMS,
            runner: |s, _| install_debconf_seeds(s),
        },
        TaskSpec {
            name: "install_base_packages",
            domain: "system",
            summary: "Install every package listed in basePackages",
            params: NO_PARAMS,
            runner: |s, _| install_base_packages(s),
        },
        TaskSpec {
            name: "config_apticron",
            domain: "system",
            summary: "Send apticron notifications to the sysadmins",
            params: NO_PARAMS,
            runner: |s, _| config_apticron(s),
        },
        TaskSpec {
            name: "config_sshd",
            domain: "system",
            summary: "Disable root and password SSH logins",
            params: NO_PARAMS,
            runner: |s, _| config_sshd(s),
        },
        TaskSpec {
            name: "install_apache",
            domain: "system",
            summary: "Install Apache with mod_wsgi and mod_ssl",
            params: NO_PARAMS,
            runner: |s, _| install_apache(s),
        },
        TaskSpec {
            name: "install_postgres",
            domain: "system",
            summary: "Install PostgreSQL and psycopg2 build dependencies",
            params: NO_PARAMS,
            runner: |s, _| install_postgres(s),
        },
        TaskSpec {
            name: "setup_swap",
            domain: "system",
            summary: "Create and enable a swap file",
            params: SWAP_PARAMS,
            runner: |s, a| setup_swap(s, a.number("size")?),
        },
        TaskSpec {
            name: "setup_hosts",
            domain: "system",
            summary: "Set the hostname and its /etc/hosts entry",
            params: HOSTS_PARAMS,
            runner: |s, a| setup_hosts(s, a.text("hostname")),
        },
        TaskSpec {
            name: "set_timezone",
            domain: "system",
            summary: "Install a zoneinfo file as the system timezone",
            params: TIMEZONE_PARAMS,
            runner: |s, a| set_timezone(s, a.text("tz_file"), a.text("tz_config")),
        },
        TaskSpec {
            name: "apache_reload",
            domain: "system",
            summary: "Gracefully reload Apache",
            params: NO_PARAMS,
            runner: |s, _| apache_reload(s),
        },
        TaskSpec {
            name: "apache_restart",
            domain: "system",
            summary: "Restart Apache",
            params: NO_PARAMS,
            runner: |s, _| apache_restart(s),
        },
        TaskSpec {
            name: "patch_virtualenv",
            domain: "system",
            summary: "Link a system package into a project virtualenv",
            params: PATCH_PARAMS,
            runner: run_patch_virtualenv,
        },
        TaskSpec {
            name: "init_server",
            domain: "system",
            summary: "Run the full bootstrap sequence on a fresh server",
            params: INIT_PARAMS,
            runner: run_init_server,
        },
    ]
}

fn run_patch_virtualenv(s: &mut Session<'_>, args: &TaskArgs) -> Result<Outcome> {
    patch_virtualenv(
        s,
        args.require("user")?,
        args.require("package_path")?,
        args.text("virtualenv_path").unwrap_or("env"),
        args.text("python").unwrap_or("python2.6"),
    )
}

fn run_init_server(s: &mut Session<'_>, args: &TaskArgs) -> Result<Outcome> {
    let options = InitOptions {
        swap_size: args.number("swap_size")?,
        apache: args.flag("apache")?.unwrap_or(true),
        postgres: args.flag("postgres")?.unwrap_or(true),
    };
    init_server(s, &options)
}
