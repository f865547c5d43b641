use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use commands::GlobalArgs;

#[derive(Debug, Clone, Copy)]
enum ResponseMode {
    Json,
    Raw(RawOutputMode),
}

#[derive(Debug, Clone, Copy)]
enum RawOutputMode {
    InteractivePassthrough,
    Help,
}

mod commands;
mod output;
mod tty;

use commands::{hosts, run, settings_cmd, ssh, tasks};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(version = VERSION)]
#[command(about = "Provision Ubuntu servers and deploy WSGI projects over SSH")]
struct Cli {
    /// Settings file (default: $STAGEHAND_SETTINGS, then ~/.config/stagehand/settings.json)
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task against a configured host
    Run(run::RunArgs),
    /// Inspect configured hosts
    Hosts(hosts::HostsArgs),
    /// Inspect the task catalogue
    Tasks(tasks::TasksArgs),
    /// Inspect the settings registry and parameter resolution
    Settings(settings_cmd::SettingsArgs),
    /// SSH into a configured host
    Ssh(ssh::SshArgs),
    /// List available commands (alias for --help)
    List,
}

fn response_mode(command: &Commands) -> ResponseMode {
    match command {
        Commands::Ssh(args) if args.is_interactive() => {
            ResponseMode::Raw(RawOutputMode::InteractivePassthrough)
        }
        Commands::List => ResponseMode::Raw(RawOutputMode::Help),
        _ => ResponseMode::Json,
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs {
        settings: cli.settings.clone(),
    };

    let mode = response_mode(&cli.command);

    match mode {
        ResponseMode::Json => {}
        ResponseMode::Raw(RawOutputMode::InteractivePassthrough) => {
            if !tty::require_tty_for_interactive() {
                let err = stagehand::Error::validation_invalid_argument(
                    "tty",
                    "This command requires an interactive TTY",
                    None,
                    None,
                );
                let _ = output::print_result::<serde_json::Value>(Err(err));
                return std::process::ExitCode::from(exit_code_to_u8(2));
            }
        }
        ResponseMode::Raw(RawOutputMode::Help) => {
            let mut cmd = Cli::command();
            if cmd.print_help().is_err() {
                return std::process::ExitCode::from(1);
            }
            println!();
            return std::process::ExitCode::SUCCESS;
        }
    }

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    match mode {
        ResponseMode::Json => {
            let _ = output::print_json_result(json_result);
        }
        ResponseMode::Raw(_) => {
            if let Err(err) = json_result {
                let _ = output::print_result::<serde_json::Value>(Err(err));
            }
        }
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
