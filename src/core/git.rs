//! Repository synchronisation and snapshot export through the git client.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::executor::CommandRunner;
use crate::log_status;
use crate::utils::shell;

/// Branch reported when the current branch cannot be read.
pub const UNKNOWN_BRANCH: &str = "unknown";

/// How the working copy is brought up to date before export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "plan", rename_all = "snake_case")]
pub enum SyncPlan {
    /// `git fetch`, `git checkout <to>`.
    SwitchBranch { from: String, to: String },
    /// `git fetch && git reset --hard FETCH_HEAD`.
    Reset { branch: String },
}

impl SyncPlan {
    /// Choose a plan from the branch currently checked out.
    ///
    /// Unknown and detached (`HEAD`) working copies take the reset path.
    pub fn choose(current: &str, target: &str) -> Self {
        let known = !current.is_empty() && current != UNKNOWN_BRANCH && current != "HEAD";
        if known && current != target {
            SyncPlan::SwitchBranch {
                from: current.to_string(),
                to: target.to_string(),
            }
        } else {
            SyncPlan::Reset {
                branch: target.to_string(),
            }
        }
    }

    /// Commands run for this plan, before the final `git pull`.
    pub fn commands(&self) -> Vec<String> {
        match self {
            SyncPlan::SwitchBranch { to, .. } => vec![
                "git fetch".to_string(),
                format!("git checkout {}", shell::quote_arg(to)),
            ],
            SyncPlan::Reset { .. } => vec!["git fetch && git reset --hard FETCH_HEAD".to_string()],
        }
    }
}

/// Drives git inside a project's working copy.
#[derive(Debug, Clone)]
pub struct RepositorySync {
    repo: PathBuf,
}

impl RepositorySync {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Branch checked out in the working copy, or `unknown`.
    pub fn current_branch(&self, runner: &dyn CommandRunner) -> String {
        let output = runner.run("git rev-parse --abbrev-ref HEAD", &self.repo);
        if !output.success {
            return UNKNOWN_BRANCH.to_string();
        }
        match output.stdout.lines().next().map(str::trim) {
            Some(line) if !line.is_empty() => line.to_string(),
            _ => UNKNOWN_BRANCH.to_string(),
        }
    }

    pub fn plan(&self, runner: &dyn CommandRunner, target: &str) -> SyncPlan {
        SyncPlan::choose(&self.current_branch(runner), target)
    }

    /// Bring the working copy to `target`, then pull.
    pub fn sync(&self, runner: &dyn CommandRunner, target: &str) -> Result<SyncPlan> {
        let plan = self.plan(runner, target);

        match &plan {
            SyncPlan::SwitchBranch { from, to } => {
                log_status!("git", "Switching {} -> {}", from, to);
            }
            SyncPlan::Reset { branch } => {
                log_status!("git", "Resetting {} to FETCH_HEAD", branch);
            }
        }

        for command in plan.commands() {
            self.run_git(runner, &command, "Unable to update repository")?;
        }
        self.run_git(runner, "git pull", "Unable to pull from remote")?;

        Ok(plan)
    }

    /// Extract a snapshot of `branch` into `build_path`.
    pub fn export(&self, runner: &dyn CommandRunner, branch: &str, build_path: &Path) -> Result<()> {
        let command = export_command(branch, build_path);
        log_status!("git", "Exporting {} into {}", branch, build_path.display());
        self.run_git(
            runner,
            &command,
            &format!("Unable to export branch '{}'", branch),
        )
    }

    fn run_git(&self, runner: &dyn CommandRunner, command: &str, message: &str) -> Result<()> {
        let output = runner.run(command, &self.repo);
        if output.success {
            return Ok(());
        }
        Err(Error::git_command_failed(
            message,
            output.failure_details(command),
        ))
    }
}

/// Verify the branch resolves to a commit, then stream `git archive` into tar.
pub fn export_command(branch: &str, build_path: &Path) -> String {
    let commit = shell::quote_arg(&format!("{}^{{commit}}", branch));
    let branch = shell::quote_arg(branch);
    format!(
        "git rev-parse --verify --quiet {} >/dev/null && git archive --format=tar {} | tar -x -C {}",
        commit,
        branch,
        shell::quote_path(build_path)
    )
}
