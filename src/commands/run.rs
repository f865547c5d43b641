use clap::Args;
use serde::Serialize;

use stagehand::hosts::HostRegistry;
use stagehand::output::{Outcome, TaskReport};
use stagehand::registry::{TaskArgs, TaskRegistry};
use stagehand::session::Session;
use stagehand::ssh::SshClient;
use stagehand::transport::{RecordingTransport, Transport};
use stagehand::utils::command;

use super::CmdResult;

/// Exit code for a run that stopped on a precondition conflict.
const CONFLICT_EXIT_CODE: i32 = 3;

#[derive(Args)]
pub struct RunArgs {
    /// Host label from settings
    pub host: String,

    /// Task name (see `stagehand tasks list`)
    pub task: String,

    /// Task arguments as key=value pairs.
    ///
    /// Examples:
    ///   stagehand run web1 create_user username=bob ssh_key_path=keys/bob.pub admin=true
    ///   stagehand run web1 setup_project project_name=shop git_url=git@example.com:shop.git
    #[arg(num_args = 0.., trailing_var_arg = true)]
    pub args: Vec<String>,

    /// SSH login user (overrides the host entry and sshUser)
    #[arg(long)]
    pub user: Option<String>,

    /// Record the commands the task would issue without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Never pause for operator confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    pub dry_run: bool,
    pub transport: String,
    #[serde(flatten)]
    pub report: TaskReport,
}

pub fn run(args: RunArgs, global: &crate::commands::GlobalArgs) -> CmdResult<RunOutput> {
    let settings = global.load_settings()?;
    let registry = TaskRegistry::builtin();

    // Resolve task and arguments before connecting anywhere.
    let task = registry.get(&args.task)?.name;
    let task_args = TaskArgs::parse(&args.args)?;
    let target = HostRegistry::new(&settings).select(&args.host, args.user.as_deref())?;

    let recorder;
    let client;
    let transport: &dyn Transport = if args.dry_run {
        recorder = RecordingTransport::dry_run(target.label.clone());
        &recorder
    } else {
        client = SshClient::from_target(&target)?;
        &client
    };
    let description = transport.describe();

    let mut session =
        Session::new(transport, &settings, &target).with_operator(command::local_user());
    if !args.yes && !args.dry_run && crate::tty::is_stdin_tty() {
        session = session.with_pause_hook(|prompt| {
            crate::tty::prompt(&format!("{} ", prompt)).map(|_| ())
        });
    }

    let report = registry.dispatch(task, &task_args, session)?;
    let exit_code = match report.outcome {
        Outcome::Conflict { .. } => CONFLICT_EXIT_CODE,
        Outcome::Completed | Outcome::Skipped { .. } => 0,
    };

    Ok((
        RunOutput {
            dry_run: args.dry_run,
            transport: description,
            report,
        },
        exit_code,
    ))
}
