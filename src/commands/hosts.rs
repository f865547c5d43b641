use clap::{Args, Subcommand};
use serde::Serialize;

use stagehand::hosts::{HostRegistry, Target};
use stagehand::settings::HostEntry;

use super::CmdResult;

#[derive(Args)]
pub struct HostsArgs {
    #[command(subcommand)]
    pub command: Option<HostsCommand>,
}

#[derive(Subcommand)]
pub enum HostsCommand {
    /// List configured hosts
    List,
    /// Show the connection target a host label resolves to
    Show {
        /// Host label
        label: String,
        /// SSH login user override
        #[arg(long)]
        user: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum HostsOutput {
    List { hosts: Vec<HostEntry> },
    Show { target: Target },
}

pub fn run(args: HostsArgs, global: &crate::commands::GlobalArgs) -> CmdResult<HostsOutput> {
    let settings = global.load_settings()?;
    let registry = HostRegistry::new(&settings);

    match args.command.unwrap_or(HostsCommand::List) {
        HostsCommand::List => Ok((
            HostsOutput::List {
                hosts: registry.list().to_vec(),
            },
            0,
        )),
        HostsCommand::Show { label, user } => {
            let target = registry.select(&label, user.as_deref())?;
            Ok((HostsOutput::Show { target }, 0))
        }
    }
}
