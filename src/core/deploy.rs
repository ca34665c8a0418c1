//! Deployment pipeline: versioned build directory, repository export, adapter
//! stages and the atomic switch of the `current` link.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::adapter::{self, ProjectAdapter, StageOutcome};
use crate::error::{Error, Result};
use crate::executor::{CommandOutput, CommandRunner, ShellRunner};
use crate::git::{RepositorySync, SyncPlan};
use crate::layout::{BuildTarget, ProjectLayout};
use crate::log_status;
use crate::steps::{StepLog, StepOutcome};
use crate::utils::shell;

pub const STEP_CREATE_BUILD_DIR: &str = "Creating build directory...";
pub const STEP_SYNC_REPOSITORY: &str = "Synchronizing repository...";
pub const STEP_EXPORT_REPOSITORY: &str = "Exporting repository...";
pub const STEP_BEFORE_DEPLOY: &str = "Running project pre-deployment commands...";
pub const STEP_PERMISSIONS: &str = "Updating file permissions...";
pub const STEP_ACTIVATE: &str = "Activating build...";
pub const STEP_AFTER_DEPLOY: &str = "Running project post-deployment commands...";

/// Pipeline position. Any halting failure moves to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployState {
    Initialized,
    BuildDirCreated,
    RepoSynced,
    RepoExported,
    BeforeHooksRun,
    PermissionsApplied,
    Activated,
    AfterHooksRun,
    Completed,
    Failed,
}

impl DeployState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeployState::Completed | DeployState::Failed)
    }
}

// =============================================================================
// Deploy context
// =============================================================================

/// Everything an adapter or hook may see or touch during a run.
pub struct DeployContext {
    layout: ProjectLayout,
    target: BuildTarget,
    branch: String,
    steps: StepLog,
    runner: Box<dyn CommandRunner>,
}

impl DeployContext {
    pub fn new(
        layout: ProjectLayout,
        target: BuildTarget,
        branch: impl Into<String>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            layout,
            target,
            branch: branch.into(),
            steps: StepLog::new(),
            runner,
        }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn target(&self) -> &BuildTarget {
        &self.target
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn project_path(&self) -> &Path {
        self.layout.root()
    }

    pub fn repo_path(&self) -> PathBuf {
        self.layout.repo()
    }

    pub fn shared_path(&self) -> PathBuf {
        self.layout.shared()
    }

    pub fn current_path(&self) -> PathBuf {
        self.layout.current()
    }

    pub fn build_path(&self) -> &Path {
        &self.target.build_path
    }

    pub fn build_id(&self) -> &str {
        &self.target.build_id
    }

    pub fn steps(&self) -> &StepLog {
        &self.steps
    }

    /// Record a finished step; returns its 1-based position in the log.
    pub fn add_step(&mut self, description: impl Into<String>, outcome: StepOutcome) -> usize {
        self.steps.push(description, outcome)
    }

    /// Record a pending step to be resolved with `resolve_step`.
    pub fn begin_step(&mut self, description: impl Into<String>) -> usize {
        self.steps.begin(description)
    }

    pub fn resolve_step(&mut self, index: usize, outcome: StepOutcome) -> bool {
        self.steps.resolve(index, outcome)
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// Run a command in the build directory.
    pub fn run(&self, command: &str) -> CommandOutput {
        self.runner.run(command, self.build_path())
    }

    pub fn run_with_env(&self, command: &str, env: &[(&str, &str)]) -> CommandOutput {
        self.runner.run_with_env(command, self.build_path(), env)
    }

    pub fn run_in(&self, command: &str, dir: &Path) -> CommandOutput {
        self.runner.run(command, dir)
    }
}

impl std::fmt::Debug for DeployContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployContext")
            .field("layout", &self.layout)
            .field("target", &self.target)
            .field("branch", &self.branch)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Deployer
// =============================================================================

/// Runs one deployment of one project. A deployer is single-use: its build
/// target is never reused.
pub struct Deployer {
    ctx: DeployContext,
    adapter: Box<dyn ProjectAdapter>,
    state: DeployState,
    sync_plan: Option<SyncPlan>,
}

type Stage = fn(&dyn ProjectAdapter, &mut DeployContext) -> Result<StageOutcome>;

impl Deployer {
    /// Timestamped build target, shell runner.
    pub fn new(layout: ProjectLayout, branch: impl Into<String>, adapter: Box<dyn ProjectAdapter>) -> Self {
        Self::with_runner(layout, branch, adapter, Box::new(ShellRunner))
    }

    pub fn with_runner(
        layout: ProjectLayout,
        branch: impl Into<String>,
        adapter: Box<dyn ProjectAdapter>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        let target = BuildTarget::new(&layout);
        Self::with_target(layout, target, branch, adapter, runner)
    }

    pub fn with_target(
        layout: ProjectLayout,
        target: BuildTarget,
        branch: impl Into<String>,
        adapter: Box<dyn ProjectAdapter>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            ctx: DeployContext::new(layout, target, branch, runner),
            adapter,
            state: DeployState::Initialized,
            sync_plan: None,
        }
    }

    pub fn state(&self) -> DeployState {
        self.state
    }

    pub fn steps(&self) -> &StepLog {
        self.ctx.steps()
    }

    pub fn context(&self) -> &DeployContext {
        &self.ctx
    }

    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    /// Plan used by the repository step, once it has run.
    pub fn sync_plan(&self) -> Option<&SyncPlan> {
        self.sync_plan.as_ref()
    }

    /// Run the pipeline. The step log is available afterwards in every case.
    pub fn deploy(&mut self) -> Result<()> {
        if self.state != DeployState::Initialized {
            return Err(Error::internal_unexpected(format!(
                "Deployer for build {} has already run",
                self.ctx.build_id()
            )));
        }

        log_status!(
            "deploy",
            "Deploying {} ({}) to build {}",
            self.ctx.layout().name(),
            self.ctx.branch(),
            self.ctx.build_id()
        );

        self.step(1, STEP_CREATE_BUILD_DIR, DeployState::BuildDirCreated, |d| {
            d.create_build_dir()
        })?;

        let plan = self.step(2, STEP_SYNC_REPOSITORY, DeployState::RepoSynced, |d| {
            RepositorySync::new(d.ctx.repo_path()).sync(d.ctx.runner(), d.ctx.branch())
        })?;
        self.sync_plan = Some(plan);

        self.step(3, STEP_EXPORT_REPOSITORY, DeployState::RepoExported, |d| {
            RepositorySync::new(d.ctx.repo_path()).export(
                d.ctx.runner(),
                d.ctx.branch(),
                d.ctx.build_path(),
            )
        })?;

        self.stage(
            4,
            STEP_BEFORE_DEPLOY,
            DeployState::BeforeHooksRun,
            |adapter, ctx| adapter.before_deploy(ctx),
        )?;

        self.step(5, STEP_PERMISSIONS, DeployState::PermissionsApplied, |d| {
            match d.adapter.set_file_permissions(&mut d.ctx)? {
                StageOutcome::Failed(reason) => Err(Error::deploy_permissions_failed(reason)),
                _ => Ok(()),
            }
        })?;

        self.step(6, STEP_ACTIVATE, DeployState::Activated, |d| {
            activate(&d.ctx.current_path(), d.ctx.build_path())
        })?;

        self.stage(
            7,
            STEP_AFTER_DEPLOY,
            DeployState::AfterHooksRun,
            |adapter, ctx| adapter.after_deploy(ctx),
        )?;

        self.state = DeployState::Completed;
        log_status!("deploy", "Build {} is live", self.ctx.build_id());
        Ok(())
    }

    /// Fixed pipeline step: pending entry first, resolved by the result.
    fn step<T>(
        &mut self,
        number: usize,
        description: &str,
        next: DeployState,
        run: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let index = self.ctx.begin_step(description);
        match run(self) {
            Ok(value) => {
                self.ctx.resolve_step(index, StepOutcome::Done);
                self.state = next;
                Ok(value)
            }
            Err(e) => {
                self.ctx.resolve_step(index, StepOutcome::Failed);
                self.state = DeployState::Failed;
                log_status!("deploy", "{} failed: {}", description, e.message);
                Err(e.at_step(number, description))
            }
        }
    }

    /// Adapter stage: the adapter may log its own steps; the stage entry is
    /// appended once it returns. A `Failed` outcome is recorded but does not halt.
    fn stage(
        &mut self,
        number: usize,
        description: &str,
        next: DeployState,
        run: Stage,
    ) -> Result<StageOutcome> {
        match run(self.adapter.as_ref(), &mut self.ctx) {
            Ok(outcome) => {
                self.ctx.add_step(description, outcome.step_outcome());
                if let StageOutcome::Failed(reason) = &outcome {
                    log_status!("deploy", "{} {}", description, reason);
                }
                self.state = next;
                Ok(outcome)
            }
            Err(e) => {
                self.ctx.add_step(description, StepOutcome::Failed);
                self.state = DeployState::Failed;
                log_status!("deploy", "{} failed: {}", description, e.message);
                Err(e.at_step(number, description))
            }
        }
    }

    fn create_build_dir(&self) -> Result<()> {
        let builds = self.ctx.layout().builds();
        let build = self.ctx.build_path();
        // No -p on the build dir: an existing build id must fail.
        let command = format!(
            "mkdir -p {} && mkdir -m 775 {}",
            shell::quote_path(&builds),
            shell::quote_path(build)
        );
        let output = self.ctx.run_in(&command, self.ctx.project_path());
        if output.success {
            return Ok(());
        }
        Err(Error::deploy_build_dir_failed(
            build.display().to_string(),
            output.failure_details(&command),
        ))
    }
}

impl std::fmt::Debug for Deployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployer")
            .field("adapter", &self.adapter.name())
            .field("state", &self.state)
            .field("ctx", &self.ctx)
            .finish()
    }
}

/// Point `current` at `build` with a single rename.
///
/// A staging link is created beside `current` and renamed over it, so
/// `current` is never absent. A `current` that exists and is not a symlink is
/// left untouched and reported.
pub fn activate(current: &Path, build: &Path) -> Result<()> {
    let failed = |reason: String| {
        Error::deploy_activation_failed(
            current.display().to_string(),
            build.display().to_string(),
            reason,
        )
    };

    if let Ok(meta) = fs::symlink_metadata(current) {
        if !meta.file_type().is_symlink() {
            return Err(failed(
                "current exists and is not a symbolic link".to_string(),
            ));
        }
    }

    let name = current
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "current".to_string());
    let staging = current.with_file_name(format!(".{}.rollout.tmp.{}", name, std::process::id()));

    if fs::symlink_metadata(&staging).is_ok() {
        fs::remove_file(&staging).map_err(|e| failed(format!("remove stale staging link: {}", e)))?;
    }

    adapter::symlink(build, &staging).map_err(|e| failed(format!("create staging link: {}", e)))?;

    if let Err(e) = fs::rename(&staging, current) {
        let _ = fs::remove_file(&staging);
        return Err(failed(format!("rename staging link over current: {}", e)));
    }

    log_status!("deploy", "{} -> {}", current.display(), build.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterConfig, GenericAdapter};
    use crate::hooks::HookRegistry;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Records commands and fails the first one containing `fail_on`.
    #[derive(Clone, Default)]
    struct ScriptedRunner {
        fail_on: Option<&'static str>,
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl CommandRunner for ScriptedRunner {
        fn run_with_env(&self, command: &str, _dir: &Path, _env: &[(&str, &str)]) -> CommandOutput {
            self.calls.borrow_mut().push(command.to_string());
            if self.fail_on.is_some_and(|f| command.contains(f)) {
                return CommandOutput::failed(1, "simulated failure");
            }
            if command.starts_with("git rev-parse --abbrev-ref") {
                return CommandOutput::ok("master\n");
            }
            CommandOutput::ok("")
        }
    }

    /// Adapter whose stages return fixed outcomes.
    struct FixedAdapter {
        before: fn() -> Result<StageOutcome>,
        permissions: fn() -> Result<StageOutcome>,
        after: fn() -> Result<StageOutcome>,
    }

    impl Default for FixedAdapter {
        fn default() -> Self {
            Self {
                before: || Ok(StageOutcome::Skipped),
                permissions: || Ok(StageOutcome::Done),
                after: || Ok(StageOutcome::Skipped),
            }
        }
    }

    impl ProjectAdapter for FixedAdapter {
        fn name(&self) -> &str {
            "fixed"
        }
        fn before_deploy(&self, _ctx: &mut DeployContext) -> Result<StageOutcome> {
            (self.before)()
        }
        fn set_file_permissions(&self, _ctx: &mut DeployContext) -> Result<StageOutcome> {
            (self.permissions)()
        }
        fn after_deploy(&self, _ctx: &mut DeployContext) -> Result<StageOutcome> {
            (self.after)()
        }
    }

    fn deployer(dir: &TempDir, runner: ScriptedRunner, adapter: FixedAdapter) -> Deployer {
        let layout = ProjectLayout::new(dir.path());
        let target = BuildTarget::with_id(&layout, "20240101120000");
        // The scripted runner does not touch the filesystem.
        fs::create_dir_all(&target.build_path).unwrap();
        Deployer::with_target(layout, target, "master", Box::new(adapter), Box::new(runner))
    }

    #[cfg(unix)]
    #[test]
    fn happy_path_records_seven_steps() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::default();
        let mut deployer = deployer(&dir, runner.clone(), FixedAdapter::default());

        deployer.deploy().unwrap();

        assert_eq!(deployer.state(), DeployState::Completed);
        assert_eq!(
            deployer.steps().lines(),
            vec![
                "Creating build directory... Done",
                "Synchronizing repository... Done",
                "Exporting repository... Done",
                "Running project pre-deployment commands... Skipped",
                "Updating file permissions... Done",
                "Activating build... Done",
                "Running project post-deployment commands... Skipped",
            ]
        );
        assert_eq!(
            fs::read_link(dir.path().join("current")).unwrap(),
            deployer.context().build_path()
        );
        assert!(matches!(deployer.sync_plan(), Some(SyncPlan::Reset { .. })));

        let calls = runner.calls.borrow();
        assert!(calls[0].starts_with("mkdir -p"));
        assert!(calls[0].contains("&& mkdir -m 775"));
    }

    #[test]
    fn git_failure_halts_at_sync_step() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner {
            fail_on: Some("git pull"),
            ..Default::default()
        };
        let mut deployer = deployer(&dir, runner.clone(), FixedAdapter::default());

        let err = deployer.deploy().unwrap_err();

        assert_eq!(deployer.state(), DeployState::Failed);
        assert_eq!(err.code.as_str(), "git.command_failed");
        assert_eq!(err.step_index(), Some(2));
        assert_eq!(
            deployer.steps().lines(),
            vec![
                "Creating build directory... Done",
                "Synchronizing repository... Error",
            ]
        );
        assert!(!runner.calls.borrow().iter().any(|c| c.contains("git archive")));
    }

    #[test]
    fn build_dir_failure_is_first_step() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner {
            fail_on: Some("mkdir"),
            ..Default::default()
        };
        let mut deployer = deployer(&dir, runner, FixedAdapter::default());

        let err = deployer.deploy().unwrap_err();

        assert_eq!(err.code.as_str(), "deploy.build_dir_failed");
        assert_eq!(deployer.steps().lines(), vec!["Creating build directory... Error"]);
    }

    #[cfg(unix)]
    #[test]
    fn soft_stage_failure_continues() {
        let dir = TempDir::new().unwrap();
        let adapter = FixedAdapter {
            before: || Ok(StageOutcome::Failed("link".to_string())),
            ..Default::default()
        };
        let mut deployer = deployer(&dir, ScriptedRunner::default(), adapter);

        deployer.deploy().unwrap();

        assert_eq!(deployer.state(), DeployState::Completed);
        let lines = deployer.steps().lines();
        assert_eq!(lines[3], "Running project pre-deployment commands... Error");
        assert_eq!(lines[5], "Activating build... Done");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn hard_stage_error_halts() {
        let dir = TempDir::new().unwrap();
        let adapter = FixedAdapter {
            before: || Err(Error::hook_script_not_found("beforeDeploy", "/x/hook.sh")),
            ..Default::default()
        };
        let mut deployer = deployer(&dir, ScriptedRunner::default(), adapter);

        let err = deployer.deploy().unwrap_err();

        assert_eq!(err.step_index(), Some(4));
        assert_eq!(deployer.steps().len(), 4);
        assert_eq!(
            deployer.steps().last().unwrap().to_string(),
            "Running project pre-deployment commands... Error"
        );
        assert!(fs::symlink_metadata(dir.path().join("current")).is_err());
    }

    #[test]
    fn permission_failure_blocks_activation() {
        let dir = TempDir::new().unwrap();
        let adapter = FixedAdapter {
            permissions: || Ok(StageOutcome::Failed("chmod exited 1".to_string())),
            ..Default::default()
        };
        let mut deployer = deployer(&dir, ScriptedRunner::default(), adapter);

        let err = deployer.deploy().unwrap_err();

        assert_eq!(err.code.as_str(), "deploy.permissions_failed");
        assert_eq!(err.step_index(), Some(5));
        assert_eq!(
            deployer.steps().last().unwrap().to_string(),
            "Updating file permissions... Error"
        );
        assert!(fs::symlink_metadata(dir.path().join("current")).is_err());
    }

    #[test]
    fn non_link_current_fails_activation_untouched() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("current")).unwrap();
        fs::write(dir.path().join("current/index.php"), "legacy").unwrap();
        let mut deployer = deployer(&dir, ScriptedRunner::default(), FixedAdapter::default());

        let err = deployer.deploy().unwrap_err();

        assert_eq!(err.code.as_str(), "deploy.activation_failed");
        assert_eq!(err.message, "Error linking to the current directory");
        assert_eq!(deployer.steps().len(), 6);
        assert_eq!(
            fs::read_to_string(dir.path().join("current/index.php")).unwrap(),
            "legacy"
        );
    }

    #[test]
    fn deployer_is_single_use() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner {
            fail_on: Some("mkdir"),
            ..Default::default()
        };
        let mut deployer = deployer(&dir, runner, FixedAdapter::default());
        assert!(deployer.deploy().is_err());
        assert_eq!(deployer.deploy().unwrap_err().code.as_str(), "internal.unexpected");
    }

    #[cfg(unix)]
    #[test]
    fn activate_replaces_existing_link() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("builds/1");
        let new = dir.path().join("builds/2");
        fs::create_dir_all(&old).unwrap();
        fs::create_dir_all(&new).unwrap();
        let current = dir.path().join("current");

        activate(&current, &old).unwrap();
        activate(&current, &new).unwrap();

        assert_eq!(fs::read_link(&current).unwrap(), new);
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".rollout.tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn generic_adapter_stages_skip_without_configuration() {
        let dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let target = BuildTarget::with_id(&layout, "20240101120000");
        fs::create_dir_all(&target.build_path).unwrap();
        let adapter = GenericAdapter::new(AdapterConfig::default(), HookRegistry::new());
        let mut deployer = Deployer::with_target(
            layout,
            target,
            "master",
            Box::new(adapter),
            Box::new(ScriptedRunner::default()),
        );

        deployer.deploy().unwrap();

        assert_eq!(deployer.adapter_name(), "generic");
        assert_eq!(deployer.steps().len(), 7);
        assert_eq!(
            deployer.steps().entries()[3].outcome,
            StepOutcome::Skipped
        );
    }
}
