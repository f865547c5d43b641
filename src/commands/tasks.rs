use clap::{Args, Subcommand};
use serde::Serialize;

use stagehand::registry::{TaskRegistry, TaskSpec};

use super::CmdResult;

#[derive(Args)]
pub struct TasksArgs {
    #[command(subcommand)]
    pub command: Option<TasksCommand>,
}

#[derive(Subcommand)]
pub enum TasksCommand {
    /// List every task, optionally for one domain
    List {
        /// Domain filter (system, users, databases, projects, search)
        #[arg(long)]
        domain: Option<String>,
    },
    /// Show a task and the arguments it accepts
    Show {
        /// Task name (`create-user` and `create_user` are equivalent)
        name: String,
    },
}

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum TasksOutput {
    List { tasks: Vec<TaskSpec> },
    Show { task: TaskSpec },
}

pub fn run_json(args: TasksArgs) -> CmdResult<TasksOutput> {
    let registry = TaskRegistry::builtin();

    match args.command.unwrap_or(TasksCommand::List { domain: None }) {
        TasksCommand::List { domain } => {
            let tasks = registry
                .list()
                .iter()
                .filter(|t| domain.as_deref().map_or(true, |d| t.domain == d))
                .copied()
                .collect();
            Ok((TasksOutput::List { tasks }, 0))
        }
        TasksCommand::Show { name } => {
            let task = *registry.get(&name)?;
            Ok((TasksOutput::Show { task }, 0))
        }
    }
}
