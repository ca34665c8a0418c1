use clap::Args;
use serde::Serialize;
use std::fs;
use std::path::Path;

use rollout::layout::ProjectLayout;
use rollout::project;

use super::{CmdResult, GlobalArgs};

#[derive(Args, Debug, Default)]
pub struct ProjectsArgs {
    /// Directory holding the deployable projects
    #[arg(long, value_name = "DIR")]
    pub projects_dir: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntry {
    pub name: String,
    pub path: String,
    /// Build id `current` points at, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_build: Option<String>,
    pub builds: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsOutput {
    pub command: String,
    pub projects_dir: String,
    pub projects: Vec<ProjectEntry>,
}

pub fn run(args: ProjectsArgs, global: &GlobalArgs) -> CmdResult<ProjectsOutput> {
    let projects_dir = global.projects_dir(args.projects_dir.as_deref());
    let projects = project::discover(&projects_dir)?
        .into_iter()
        .map(|name| entry(&projects_dir, name))
        .collect();

    Ok((
        ProjectsOutput {
            command: "projects".to_string(),
            projects_dir: projects_dir.display().to_string(),
            projects,
        },
        0,
    ))
}

fn entry(projects_dir: &Path, name: String) -> ProjectEntry {
    let layout = ProjectLayout::new(projects_dir.join(&name));
    let current_build = fs::read_link(layout.current())
        .ok()
        .and_then(|target| target.file_name().map(|n| n.to_string_lossy().to_string()));
    let builds = fs::read_dir(layout.builds())
        .map(|entries| entries.filter_map(|e| e.ok()).count())
        .unwrap_or(0);

    ProjectEntry {
        path: layout.root().display().to_string(),
        name,
        current_build,
        builds,
    }
}
