use std::path::PathBuf;

use stagehand::settings::{self, Settings};

pub type CmdResult<T> = stagehand::Result<(T, i32)>;

pub(crate) struct GlobalArgs {
    /// `--settings` path, if given.
    pub settings: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn load_settings(&self) -> stagehand::Result<Settings> {
        settings::load(self.settings.as_deref())
    }
}

/// Parse a command-line value as JSON when it is valid JSON, else as text.
pub(crate) fn parse_setting_value(raw: &str) -> settings::SettingValue {
    if let Ok(value) = serde_json::from_str::<settings::SettingValue>(raw) {
        return value;
    }
    settings::SettingValue::Text(raw.to_string())
}

pub mod hosts;
pub mod run;
pub mod settings_cmd;
pub mod ssh;
pub mod tasks;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run_json($args))
    };
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (stagehand::Result<serde_json::Value>, i32) {
    crate::tty::status("stagehand is working...");

    match command {
        // Commands without settings
        crate::Commands::Tasks(args) => dispatch!(args, tasks),

        // Commands with global context
        crate::Commands::Run(args) => dispatch!(args, global, run),
        crate::Commands::Hosts(args) => dispatch!(args, global, hosts),
        crate::Commands::Settings(args) => dispatch!(args, global, settings_cmd),
        crate::Commands::Ssh(args) => dispatch!(args, global, ssh),

        // Special case: List uses raw output mode
        crate::Commands::List => {
            let err = stagehand::Error::validation_invalid_argument(
                "output_mode",
                "List command uses raw output mode",
                None,
                None,
            );
            crate::output::map_cmd_result_to_json::<serde_json::Value>(Err(err))
        }
    }
}
