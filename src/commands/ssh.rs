use clap::Args;
use serde::Serialize;

use stagehand::hosts::HostRegistry;
use stagehand::shell;
use stagehand::ssh::SshClient;
use stagehand::transport::Transport;

use super::CmdResult;

#[derive(Args)]
pub struct SshArgs {
    /// Host label from settings
    pub host: String,

    /// Command to execute (omit for interactive shell).
    ///
    /// Examples:
    ///   stagehand ssh web1 -- uptime
    ///   stagehand ssh web1 -- tail -n 50 /var/log/apache2/error.log
    ///
    /// If you need shell operators (&&, |, redirects), pass a single quoted string:
    ///   stagehand ssh web1 "cd /etc/apache2 && ls sites-enabled"
    #[arg(num_args = 0.., trailing_var_arg = true)]
    pub command: Vec<String>,

    /// SSH login user (overrides the host entry and sshUser)
    #[arg(long)]
    pub user: Option<String>,
}

impl SshArgs {
    pub fn is_interactive(&self) -> bool {
        self.command.is_empty()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshOutput {
    pub host: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    pub success: bool,
}

pub fn run(args: SshArgs, global: &crate::commands::GlobalArgs) -> CmdResult<SshOutput> {
    let settings = global.load_settings()?;
    let target = HostRegistry::new(&settings).select(&args.host, args.user.as_deref())?;
    let client = SshClient::from_target(&target)?;

    let command = match args.command.len() {
        0 => None,
        // A single string is a raw shell command.
        1 => Some(args.command[0].clone()),
        // Multi-arg form quotes each argument; no shell operators.
        _ => Some(shell::quote_args(&args.command)),
    };

    match command {
        Some(cmd) => {
            let output = client.execute(&cmd, None);
            Ok((
                SshOutput {
                    host: target.label,
                    user: target.user,
                    command: Some(cmd),
                    stdout: Some(output.stdout),
                    stderr: Some(output.stderr),
                    success: output.success,
                },
                output.exit_code,
            ))
        }
        None => {
            let exit_code = client.execute_interactive(None);
            Ok((
                SshOutput {
                    host: target.label,
                    user: target.user,
                    command: None,
                    stdout: None,
                    stderr: None,
                    success: exit_code == 0,
                },
                exit_code,
            ))
        }
    }
}
