use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const REPO_DIR: &str = "repo";
pub const BUILDS_DIR: &str = "builds";
pub const SHARED_DIR: &str = "shared";
pub const CURRENT_LINK: &str = "current";

/// Fixed directory convention under a project root.
///
/// Only `root` is stored; every other path is derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final component of the root path.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    pub fn repo(&self) -> PathBuf {
        self.root.join(REPO_DIR)
    }

    pub fn builds(&self) -> PathBuf {
        self.root.join(BUILDS_DIR)
    }

    pub fn shared(&self) -> PathBuf {
        self.root.join(SHARED_DIR)
    }

    pub fn current(&self) -> PathBuf {
        self.root.join(CURRENT_LINK)
    }

    /// Fails with `project.layout_invalid` when the working copy is absent.
    pub fn validate(&self) -> Result<()> {
        if self.repo().is_dir() {
            return Ok(());
        }
        Err(Error::project_layout_invalid(
            self.root.display().to_string(),
            vec![format!("{}/", REPO_DIR)],
        ))
    }
}

/// Versioned build directory for one deployment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTarget {
    pub build_id: String,
    pub build_path: PathBuf,
}

impl BuildTarget {
    /// Timestamped target (`YYYYMMDDHHMMSS`, local time).
    pub fn new(layout: &ProjectLayout) -> Self {
        let build_id = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
        Self::with_id(layout, build_id)
    }

    pub fn with_id(layout: &ProjectLayout, build_id: impl Into<String>) -> Self {
        let build_id = build_id.into();
        let build_path = layout.builds().join(&build_id);
        Self {
            build_id,
            build_path,
        }
    }
}
