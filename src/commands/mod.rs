use rollout::defaults::Defaults;
use std::path::PathBuf;

pub type CmdResult<T> = rollout::Result<(T, i32)>;

/// Context shared by every command. Defaults are loaded once per process.
pub(crate) struct GlobalArgs {
    pub defaults: Defaults,
}

impl GlobalArgs {
    /// `--projects-dir` when given, otherwise the configured projects directory.
    pub fn projects_dir(&self, flag: Option<&str>) -> PathBuf {
        match flag {
            Some(dir) if !dir.trim().is_empty() => {
                PathBuf::from(shellexpand::tilde(dir.trim()).to_string())
            }
            _ => self.defaults.projects_dir(),
        }
    }
}

pub mod deploy;
pub mod projects;

pub(crate) fn run_text(command: crate::Commands, global: &GlobalArgs) -> (String, i32) {
    match command {
        crate::Commands::Deploy(args) => deploy::run_text(args, global),
        _ => (
            "Command does not support text output".to_string(),
            crate::output::exit_code_for_error(rollout::ErrorCode::ValidationInvalidArgument),
        ),
    }
}

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (rollout::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Deploy(args) => dispatch!(args, global, deploy),
        crate::Commands::Projects(args) => dispatch!(args, global, projects),

        // Special case: List uses raw output mode
        crate::Commands::List => {
            let err = rollout::Error::validation_invalid_argument(
                "output_mode",
                "List command uses raw output mode",
                None,
                None,
            );
            crate::output::map_cmd_result_to_json::<serde_json::Value>(Err(err))
        }
    }
}
