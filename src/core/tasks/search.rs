//! Solr on Jetty: schema and service configuration.

use crate::error::Result;
use crate::output::Outcome;
use crate::registry::{param, ParamSpec, TaskArgs, TaskSpec};
use crate::session::Session;
use crate::tasks::local_path;
use std::path::Path;

const DEFAULT_SCHEMA_DIR: &str = "deploy/solr_home/conf/";
const DEFAULT_SCHEMA_DEST: &str = "/etc/solr/conf/";
const DEFAULT_JETTY_CONFIG: &str = "deploy/jetty";
const DEFAULT_JETTY_DEST: &str = "/etc/default/jetty";

fn join_remote(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// Upload `<local_dir>/schema.xml` to `<dest_dir>/schema.xml`.
pub fn install_solr_schema(s: &mut Session<'_>, local_dir: &Path, dest_dir: &str) -> Result<Outcome> {
    let local = local_dir.join("schema.xml");
    let dest = join_remote(dest_dir, "schema.xml");
    log_status!("search", "Installing {} to {}", local.display(), dest);
    s.upload(&local, &dest, true)?;
    Ok(Outcome::Completed)
}

pub fn restart_jetty(s: &mut Session<'_>) -> Result<Outcome> {
    s.sudo("/etc/init.d/jetty stop")?;
    s.sudo("/etc/init.d/jetty start")?;
    Ok(Outcome::Completed)
}

/// Install the Jetty defaults file and restart Jetty.
pub fn config_jetty(s: &mut Session<'_>, local: &Path, dest: &str) -> Result<Outcome> {
    s.upload(local, dest, true)?;
    restart_jetty(s)
}

/// Schema plus Jetty configuration, from the default local layout.
pub fn install_solr(s: &mut Session<'_>) -> Result<Outcome> {
    let root = s.settings().template_root();
    install_solr_schema(s, &local_path(DEFAULT_SCHEMA_DIR, &root), DEFAULT_SCHEMA_DEST)?;
    config_jetty(s, &local_path(DEFAULT_JETTY_CONFIG, &root), DEFAULT_JETTY_DEST)
}

const SCHEMA_PARAMS: &[ParamSpec] = &[
    param("local_path", None, "Local directory holding schema.xml (default deploy/solr_home/conf/)"),
    param("dest_path", None, "Remote Solr conf directory (default /etc/solr/conf/)"),
];

const JETTY_PARAMS: &[ParamSpec] = &[
    param("local_path", None, "Local Jetty defaults file (default deploy/jetty)"),
    param("dest_path", None, "Remote destination (default /etc/default/jetty)"),
];

const NO_PARAMS: &[ParamSpec] = &[];

pub fn tasks() -> Vec<TaskSpec> {
    vec![
        TaskSpec {
            name: "install_solr_schema",
            domain: "search",
            summary: "Upload schema.xml into the Solr conf directory",
            params: SCHEMA_PARAMS,
            runner: run_install_solr_schema,
        },
        TaskSpec {
            name: "config_jetty",
            domain: "search",
            summary: "Install the Jetty defaults file and restart Jetty",
            params: JETTY_PARAMS,
            runner: run_config_jetty,
        },
        TaskSpec {
            name: "restart_jetty",
            domain: "search",
            summary: "Stop and start Jetty",
            params: NO_PARAMS,
            runner: |s, _| restart_jetty(s),
        },
        TaskSpec {
            name: "install_solr",
            domain: "search",
            summary: "Install the Solr schema and Jetty configuration",
            params: NO_PARAMS,
            runner: |s, _| install_solr(s),
        },
    ]
}

fn run_install_solr_schema(s: &mut Session<'_>, args: &TaskArgs) -> Result<Outcome> {
    let root = s.settings().template_root();
    let local = local_path(args.text("local_path").unwrap_or(DEFAULT_SCHEMA_DIR), &root);
    let dest = args.text("dest_path").unwrap_or(DEFAULT_SCHEMA_DEST);
    install_solr_schema(s, &local, dest)
}

fn run_config_jetty(s: &mut Session<'_>, args: &TaskArgs) -> Result<Outcome> {
    let root = s.settings().template_root();
    let local = local_path(args.text("local_path").unwrap_or(DEFAULT_JETTY_CONFIG), &root);
    let dest = args.text("dest_path").unwrap_or(DEFAULT_JETTY_DEST);
    config_jetty(s, &local, dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::Target;
    use crate::settings::Settings;
    use crate::transport::RecordingTransport;

    #[test]
    fn remote_paths_join_without_double_slash() {
        assert_eq!(join_remote("/etc/solr/conf/", "schema.xml"), "/etc/solr/conf/schema.xml");
        assert_eq!(join_remote("/etc/solr/conf", "schema.xml"), "/etc/solr/conf/schema.xml");
    }

    #[test]
    fn restart_stops_before_starting() {
        let settings = Settings::default();
        let transport = RecordingTransport::new("search1");
        let mut session = Session::new(&transport, &settings, &Target::new("search1", "h", "root"));

        restart_jetty(&mut session).unwrap();
        let commands = transport.commands();
        assert_eq!(commands.len(), 2);
        assert!(commands[0].contains("/etc/init.d/jetty stop"));
        assert!(commands[1].contains("/etc/init.d/jetty start"));
    }
}
