use stagehand::hosts::Target;
use stagehand::output::{Outcome, StepKind};
use stagehand::session::Session;
use stagehand::settings::Settings;
use stagehand::tasks::{databases, users};
use stagehand::transport::RecordingTransport;
use tempfile::tempdir;

const PASSWD: &str = "root:x:0:0:root:/root:/bin/bash\n\
deploy:x:1000:1000::/home/deploy:/bin/bash\n\
alice2:x:1001:1001::/home/alice2:/bin/bash\n";

fn target() -> Target {
    Target::new("web1", "10.0.0.5", "deploy")
}

#[test]
fn create_admin_user_end_to_end() {
    let dir = tempdir().unwrap();
    let key = dir.path().join("bob.pub");
    std::fs::write(&key, "ssh-rsa AAAAB3Nza bob@laptop\n").unwrap();

    let settings = Settings::default();
    let transport = RecordingTransport::new("web1")
        .with_stdout("getent passwd", PASSWD)
        .with_stdout("getent group", "root:x:0:\nsudo:x:27:deploy\n");
    let mut session = Session::new(&transport, &settings, &target());

    let outcome = users::create_user(&mut session, "bob", &key, "bash", true).unwrap();
    assert_eq!(outcome, Outcome::Completed);

    let report = session.into_report("create_user", outcome);
    let commands: Vec<&str> = report.steps.iter().map(|s| s.command.as_str()).collect();
    assert_eq!(
        commands,
        vec![
            "getent passwd",
            "getent group",
            "groupadd admin",
            "useradd -G admin -m -s \"$(which bash)\" bob",
            "mkdir -p .ssh",
            "cat > 'keys'",
            "cat keys >> .ssh/authorized_keys",
            "chown -R bob:bob .ssh/",
            "rm -f keys",
        ]
    );

    let key_steps: Vec<_> = report.steps.iter().skip(4).collect();
    assert!(key_steps
        .iter()
        .all(|s| s.cwd.as_deref() == Some("/home/bob") && s.user.as_deref() == Some("root")));
    assert_eq!(report.steps[5].kind, StepKind::Upload);

    let upload = transport
        .recorded()
        .into_iter()
        .find(|r| r.stdin.is_some())
        .unwrap();
    assert!(upload.stdin.unwrap().contains("ssh-rsa AAAAB3Nza bob@laptop"));
    assert!(upload.command.starts_with("sudo -H sh -c "));
}

#[test]
fn existing_user_is_skipped_without_mutation() {
    let dir = tempdir().unwrap();
    let key = dir.path().join("deploy.pub");
    std::fs::write(&key, "ssh-ed25519 AAAA deploy\n").unwrap();

    let settings = Settings::default();
    let transport = RecordingTransport::new("web1").with_stdout("getent passwd", PASSWD);
    let mut session = Session::new(&transport, &settings, &target());

    let outcome = users::create_user(&mut session, "deploy", &key, "bash", false).unwrap();
    assert!(matches!(outcome, Outcome::Skipped { .. }));

    let report = session.into_report("create_user", outcome);
    assert!(report.mutations().is_empty());
    assert_eq!(transport.commands().len(), 1);
}

#[test]
fn similar_account_names_do_not_count_as_existing() {
    let dir = tempdir().unwrap();
    let key = dir.path().join("alice.pub");
    std::fs::write(&key, "ssh-rsa AAAA alice\n").unwrap();

    let settings = Settings::default();
    let transport = RecordingTransport::new("web1").with_stdout("getent passwd", PASSWD);
    let mut session = Session::new(&transport, &settings, &target());

    let outcome = users::create_user(&mut session, "alice", &key, "zsh", false).unwrap();
    assert_eq!(outcome, Outcome::Completed);
    assert!(transport
        .commands()
        .iter()
        .any(|c| c.contains("useradd -m -s \"$(which zsh)\" alice")));
}

#[test]
fn missing_key_file_fails_after_account_creation() {
    let settings = Settings::default();
    let transport = RecordingTransport::new("web1");
    let mut session = Session::new(&transport, &settings, &target());

    let err = users::create_user(
        &mut session,
        "carol",
        std::path::Path::new("/nonexistent/carol.pub"),
        "bash",
        false,
    )
    .unwrap_err();
    assert_eq!(err.code.as_str(), "internal.io_error");
}

#[test]
fn postgres_role_and_database_run_as_postgres() {
    let settings = Settings::default();
    let transport = RecordingTransport::new("db1");
    let mut session = Session::new(&transport, &settings, &target());

    databases::create_postgres_user(&mut session, "shop", "s3cret").unwrap();
    databases::create_postgres_db(&mut session, "shop", "shopdb").unwrap();

    let commands = transport.commands();
    assert_eq!(commands.len(), 2);
    assert!(commands
        .iter()
        .all(|c| c.starts_with("sudo -H -u postgres sh -c ")));
    assert!(commands[0].contains("CREATE ROLE shop PASSWORD"));
    assert!(commands[0].contains("NOSUPERUSER CREATEDB NOCREATEROLE INHERIT LOGIN;"));
    assert!(commands[1].contains("createdb -E UTF8 -T template0 -O shop shopdb"));

    let report = session.into_report("create_postgres_db", Outcome::Completed);
    assert_eq!(report.steps[1].user.as_deref(), Some("postgres"));
}

#[test]
fn postgres_failure_is_a_remote_error() {
    let settings = Settings::default();
    let transport = RecordingTransport::new("db1").with_failure("dropdb");
    let mut session = Session::new(&transport, &settings, &target());

    let err = databases::drop_postgres_db(&mut session, "shopdb").unwrap_err();
    assert_eq!(err.code.as_str(), "remote.command_failed");
    assert_eq!(err.details["command"], "dropdb shopdb");
    assert_eq!(err.details["target"]["user"], "postgres");
}

#[test]
fn unsafe_database_names_are_rejected_before_any_command() {
    let settings = Settings::default();
    let transport = RecordingTransport::new("db1");
    let mut session = Session::new(&transport, &settings, &target());

    let err = databases::create_postgres_db(&mut session, "shop", "shop; DROP TABLE x").unwrap_err();
    assert_eq!(err.code.as_str(), "validation.invalid_argument");
    assert!(transport.commands().is_empty());
}
