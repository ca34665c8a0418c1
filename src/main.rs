use clap::{CommandFactory, Parser, Subcommand};

use commands::GlobalArgs;

#[derive(Debug, Clone, Copy)]
enum ResponseMode {
    Json,
    Raw(RawOutputMode),
}

#[derive(Debug, Clone, Copy)]
enum RawOutputMode {
    Text,
    Help,
}

mod commands;
mod output;
mod tty;

use commands::{deploy, projects};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "rollout")]
#[command(version = VERSION)]
#[command(about = "Atomic, symlink-switched releases for git-hosted web projects")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a project: export a branch into a new build and switch `current`
    Deploy(deploy::DeployArgs),
    /// List deployable projects and their active builds
    Projects(projects::ProjectsArgs),
    /// List available commands (alias for --help)
    List,
}

fn response_mode(command: &Commands) -> ResponseMode {
    match command {
        Commands::Deploy(args) if !args.json => ResponseMode::Raw(RawOutputMode::Text),
        Commands::List => ResponseMode::Raw(RawOutputMode::Help),
        _ => ResponseMode::Json,
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs {
        defaults: rollout::defaults::load_defaults(),
    };

    match response_mode(&cli.command) {
        ResponseMode::Raw(RawOutputMode::Help) => {
            let mut cmd = Cli::command();
            if cmd.print_help().is_err() {
                return std::process::ExitCode::from(1);
            }
            println!();
            std::process::ExitCode::SUCCESS
        }
        ResponseMode::Raw(RawOutputMode::Text) => {
            let (content, exit_code) = commands::run_text(cli.command, &global);
            let _ = output::write_stdout(&content);
            std::process::ExitCode::from(exit_code_to_u8(exit_code))
        }
        ResponseMode::Json => {
            let (json_result, exit_code) = commands::run_json(cli.command, &global);
            let _ = output::print_json_result(json_result);
            std::process::ExitCode::from(exit_code_to_u8(exit_code))
        }
    }
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
