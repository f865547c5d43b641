use stagehand::hosts::HostRegistry;
use stagehand::registry::{TaskArgs, TaskRegistry};
use stagehand::session::Session;
use stagehand::settings;
use stagehand::transport::RecordingTransport;
use tempfile::tempdir;

const SETTINGS: &str = r#"{
    "hosts": [
        ["10.0.0.5", "web1"],
        {"address": "10.0.0.9", "label": "db1", "user": "ops", "port": 2222}
    ],
    "sshUser": "deploy",
    "overrides": {
        "projectName": "shop",
        "SWAP_SIZE": 1024
    }
}"#;

fn load_settings() -> (tempfile::TempDir, settings::Settings) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, SETTINGS).unwrap();
    let loaded = settings::load(Some(&path)).unwrap();
    (dir, loaded)
}

#[test]
fn dispatch_runs_task_and_reports_steps() {
    let (_dir, settings) = load_settings();
    let target = HostRegistry::new(&settings).select("db1", None).unwrap();
    assert_eq!(target.user, "ops");
    assert_eq!(target.port, 2222);

    let transport = RecordingTransport::new("db1");
    let session = Session::new(&transport, &settings, &target);
    let args = TaskArgs::parse(&["owner=shop", "dbname=shopdb"]).unwrap();

    let report = TaskRegistry::builtin()
        .dispatch("create-postgres-db", &args, session)
        .unwrap();

    assert_eq!(report.task, "create_postgres_db");
    assert_eq!(report.host, "db1");
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.steps[0].user.as_deref(), Some("postgres"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcome"]["status"], "completed");
    assert_eq!(json["steps"][0]["kind"], "sudo");
    assert_eq!(json["steps"][0]["exitCode"], 0);
}

#[test]
fn unknown_argument_is_rejected_before_any_command() {
    let (_dir, settings) = load_settings();
    let target = HostRegistry::new(&settings).select("web1", None).unwrap();
    let transport = RecordingTransport::new("web1");
    let session = Session::new(&transport, &settings, &target);
    let args = TaskArgs::parse(&["username=bob", "pasword=x"]).unwrap();

    let err = TaskRegistry::builtin()
        .dispatch("create_postgres_user", &args, session)
        .unwrap_err();

    assert_eq!(err.code.as_str(), "validation.invalid_argument");
    assert!(transport.commands().is_empty());
}

#[test]
fn unknown_task_and_host_suggest_alternatives() {
    let (_dir, settings) = load_settings();

    let err = HostRegistry::new(&settings).select("web", None).unwrap_err();
    assert_eq!(err.code.as_str(), "host.not_found");
    assert_eq!(err.details["suggestions"][0], "web1");

    let err = TaskRegistry::builtin().get("install-apach").err().unwrap();
    assert_eq!(err.code.as_str(), "task.not_found");
    assert_eq!(err.details["suggestions"][0], "install_apache");
}

#[test]
fn settings_overrides_feed_task_parameters() {
    let (_dir, settings) = load_settings();
    let target = HostRegistry::new(&settings).select("web1", None).unwrap();
    assert_eq!(target.user, "deploy");

    let transport = RecordingTransport::dry_run("web1");
    let session = Session::new(&transport, &settings, &target);

    let report = TaskRegistry::builtin()
        .dispatch("setup_swap", &TaskArgs::new(), session)
        .unwrap();

    assert!(report.outcome.is_completed());
    assert!(report
        .steps
        .iter()
        .any(|s| s.command.contains("count=1048576")));
}

#[test]
fn init_server_flags_drop_optional_components() {
    let (_dir, settings) = load_settings();
    let target = HostRegistry::new(&settings).select("web1", None).unwrap();
    let transport = RecordingTransport::dry_run("web1");
    let session = Session::new(&transport, &settings, &target);
    let args = TaskArgs::parse(&["apache=false", "postgres=no"]).unwrap();

    TaskRegistry::builtin()
        .dispatch("init_server", &args, session)
        .unwrap();

    let commands = transport.commands();
    assert!(!commands.iter().any(|c| c.contains("apache2-utils")));
    assert!(!commands.iter().any(|c| c.contains("postgresql")));
    assert!(commands.iter().any(|c| c.contains("PermitRootLogin")));
}
