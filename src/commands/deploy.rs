use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

use rollout::adapter::AdapterRegistry;
use rollout::manager::{DeployOptions, DeployResult, DeploySummary, Manager};
use rollout::permissions::PermissionOverrides;
use rollout::project;
use rollout::Error;

use super::{CmdResult, GlobalArgs};
use crate::output;
use crate::tty;

#[derive(Args, Debug, Default)]
pub struct DeployArgs {
    /// Project directory name under the projects directory (or a path to one)
    pub project: Option<String>,

    /// Branch to deploy (default: manifest default_branch, then the configured default)
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Directory holding the deployable projects
    #[arg(long, value_name = "DIR")]
    pub projects_dir: Option<String>,

    /// Directory mode applied to the build (e.g. 775)
    #[arg(long, value_name = "MODE")]
    pub dir_mode: Option<String>,

    /// File mode applied to the build (e.g. 664)
    #[arg(long, value_name = "MODE")]
    pub file_mode: Option<String>,

    /// Owner applied to the build (user or user:group)
    #[arg(long, value_name = "OWNER")]
    pub owner: Option<String>,

    /// Print the JSON envelope instead of text; never prompts
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutput {
    pub command: String,
    #[serde(flatten)]
    pub summary: DeploySummary,
    pub lines: Vec<String>,
}

const BANNER_WIDTH: usize = 25;

fn banner() -> String {
    let border = "#".repeat(BANNER_WIDTH + 4);
    let blank = format!("##{}##", " ".repeat(BANNER_WIDTH));
    let title = format!("##{:^width$}##", "ROLLOUT DEPLOYMENT", width = BANNER_WIDTH);
    [border.as_str(), &blank, &title, &blank, &border].join("\n")
}

/// Resolve the project directory: explicit name or path, the only project, or
/// an interactive menu.
fn select_project(requested: Option<&str>, projects_dir: &Path, interactive: bool) -> rollout::Result<PathBuf> {
    if let Some(id) = requested.map(str::trim).filter(|s| !s.is_empty()) {
        let as_path = Path::new(id);
        if as_path.components().count() > 1 && project::is_deployable(as_path) {
            return Ok(as_path.to_path_buf());
        }
        return project::resolve(projects_dir, id);
    }

    let projects = project::discover(projects_dir)?;
    match projects.len() {
        0 => Err(Error::project_none_deployable(
            projects_dir.display().to_string(),
        )),
        1 => Ok(projects_dir.join(&projects[0])),
        _ if interactive => {
            let index = tty::choose(&projects, "Select the project to deploy: ")?;
            Ok(projects_dir.join(&projects[index]))
        }
        _ => Err(Error::validation_missing_argument(vec!["project".to_string()])
            .with_hint(format!("Deployable projects: {}", projects.join(", ")))),
    }
}

fn options_from_args(args: &DeployArgs, branch: Option<String>) -> DeployOptions {
    DeployOptions {
        branch,
        permissions: PermissionOverrides {
            directory: args.dir_mode.clone(),
            file: args.file_mode.clone(),
            owner: args.owner.clone(),
        },
        ..Default::default()
    }
}

/// Select, prompt and build the manager. `None` when the operator declines.
fn prepare(args: &DeployArgs, global: &GlobalArgs, interactive: bool) -> rollout::Result<Option<Manager>> {
    let projects_dir = global.projects_dir(args.projects_dir.as_deref());
    let project_path = select_project(args.project.as_deref(), &projects_dir, interactive)?;
    let name = project_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut branch = args.branch.clone().filter(|b| !b.trim().is_empty());
    if branch.is_none() && interactive {
        let answer = tty::prompt(&format!(
            "Specify branch to deploy {} (leave blank to use default): ",
            name
        ))?;
        if !answer.is_empty() {
            branch = Some(answer);
        }
    }

    let manager = Manager::new(
        &project_path,
        options_from_args(args, branch),
        &global.defaults,
        &AdapterRegistry::with_builtins(),
    )?;

    if interactive && !args.yes {
        let question = format!(
            "\nAbout to deploy {} branch for {}.\nDo you wish to continue? (y/n): ",
            manager.branch(),
            name
        );
        if !tty::confirm(&question)? {
            return Ok(None);
        }
    }

    Ok(Some(manager))
}

/// JSON mode: no prompts; failures carry the run summary in their details.
pub fn run(args: DeployArgs, global: &GlobalArgs) -> CmdResult<DeployOutput> {
    let Some(mut manager) = prepare(&args, global, false)? else {
        return Err(Error::internal_unexpected("Deployment was not confirmed"));
    };

    let result = manager.deploy();
    let summary = manager.summary();

    match result.error {
        None => Ok((
            DeployOutput {
                command: "deploy".to_string(),
                lines: summary.steps.lines(),
                summary,
            },
            0,
        )),
        Some(err) => Err(with_summary(err, &summary)),
    }
}

fn with_summary(mut err: Error, summary: &DeploySummary) -> Error {
    let value = serde_json::to_value(summary).unwrap_or(serde_json::Value::Null);
    if !err.details.is_object() {
        err.details = serde_json::json!({});
    }
    if let serde_json::Value::Object(ref mut map) = err.details {
        map.insert("deployment".to_string(), value);
    }
    err
}

/// Text mode: banner, prompts, one line per step, then the verdict.
pub fn run_text(args: DeployArgs, global: &GlobalArgs) -> (String, i32) {
    let _ = output::write_stdout(&format!("\n{}\n", banner()));

    let interactive = tty::is_stdin_tty();
    let mut manager = match prepare(&args, global, interactive) {
        Ok(Some(manager)) => manager,
        Ok(None) => return ("Aborting...".to_string(), 0),
        Err(err) => return (render_failure(&[], &err), output::exit_code_for_error(err.code)),
    };

    tty::status(&format!(
        "Deploying {} ({}) with the {} adapter...",
        manager.project_name(),
        manager.branch(),
        manager.adapter_name()
    ));

    let result = manager.deploy();
    render_result(&manager.steps().lines(), &result)
}

fn render_result(lines: &[String], result: &DeployResult) -> (String, i32) {
    match &result.error {
        None => {
            let mut out = lines.to_vec();
            out.push(String::new());
            out.push("Project successfully deployed.".to_string());
            (out.join("\n"), 0)
        }
        Some(err) => (render_failure(lines, err), output::exit_code_for_error(err.code)),
    }
}

fn render_failure(lines: &[String], err: &Error) -> String {
    let mut out = lines.to_vec();
    if !out.is_empty() {
        out.push(String::new());
    }
    out.push("Deployment failed.".to_string());
    out.push(err.message.clone());
    out.push(err.trace());
    out.join("\n")
}
