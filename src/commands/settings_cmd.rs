use clap::{Args, Subcommand};
use serde::Serialize;

use stagehand::resolve::{Resolution, Resolver};
use stagehand::settings::{self, normalize_name, Settings, SettingsOrigin};

use super::{parse_setting_value, CmdResult};

#[derive(Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: Option<SettingsCommand>,
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show the loaded settings registry
    Show,
    /// Show which settings file is used
    Path,
    /// Resolve a named parameter the way tasks do
    Resolve {
        /// Parameter name (PROJECT_NAME, projectName and project_name are equivalent)
        name: String,
        /// Call-site value (JSON or plain text)
        #[arg(long)]
        explicit: Option<String>,
        /// Default value (JSON or plain text)
        #[arg(long)]
        default: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SettingsOutput {
    Show {
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        settings: Settings,
    },
    Path {
        path: String,
        exists: bool,
        origin: SettingsOrigin,
    },
    Resolve { resolution: Resolution },
}

pub fn run(args: SettingsArgs, global: &crate::commands::GlobalArgs) -> CmdResult<SettingsOutput> {
    match args.command.unwrap_or(SettingsCommand::Show) {
        SettingsCommand::Show => {
            let settings = global.load_settings()?;
            let source = settings.source().map(|p| p.display().to_string());
            Ok((SettingsOutput::Show { source, settings }, 0))
        }
        SettingsCommand::Path => {
            let location = settings::locate(global.settings.as_deref())?;
            Ok((
                SettingsOutput::Path {
                    path: location.path.display().to_string(),
                    exists: location.path.exists(),
                    origin: location.origin,
                },
                0,
            ))
        }
        SettingsCommand::Resolve {
            name,
            explicit,
            default,
        } => {
            let settings = global.load_settings()?;
            let resolution = Resolver::new(&settings).explain(
                explicit.as_deref().map(parse_setting_value),
                &normalize_name(&name),
                default.as_deref().map(parse_setting_value),
            );
            Ok((SettingsOutput::Resolve { resolution }, 0))
        }
    }
}
