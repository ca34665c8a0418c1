use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::layout::{BUILDS_DIR, REPO_DIR};

/// Names of deployable projects under `projects_dir`, sorted.
///
/// A project is a directory containing both `builds/` and `repo/`.
pub fn discover(projects_dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(projects_dir).map_err(|e| {
        Error::internal_io(
            e.to_string(),
            Some(format!("list projects in {}", projects_dir.display())),
        )
    })?;

    let mut projects: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_deployable(path))
        .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();

    projects.sort();
    Ok(projects)
}

pub fn is_deployable(path: &Path) -> bool {
    path.is_dir() && path.join(BUILDS_DIR).is_dir() && path.join(REPO_DIR).is_dir()
}

/// Resolve a project name (or path) against `projects_dir`.
pub fn resolve(projects_dir: &Path, id: &str) -> Result<std::path::PathBuf> {
    let candidate = projects_dir.join(id);
    if is_deployable(&candidate) {
        return Ok(candidate);
    }

    Err(Error::project_not_found(
        id,
        Some(projects_dir.display().to_string()),
    ))
}
