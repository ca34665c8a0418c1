//! Entry point for one project deployment: resolves manifest, defaults and
//! command-line options into a ready `Deployer`.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::adapter::{AdapterConfig, AdapterRegistry};
use crate::defaults::Defaults;
use crate::deploy::{DeployState, Deployer};
use crate::error::{Error, Result};
use crate::executor::{CommandRunner, ShellRunner};
use crate::git::SyncPlan;
use crate::hooks::HookRegistry;
use crate::layout::{BuildTarget, ProjectLayout};
use crate::manifest;
use crate::permissions::PermissionOverrides;
use crate::steps::StepLog;

/// Invocation-level settings; each set value wins over the manifest.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub branch: Option<String>,
    pub permissions: PermissionOverrides,
    /// In-process callables available to manifest hook bindings.
    pub hooks: HookRegistry,
    /// Replaces the timestamp build id.
    pub build_id: Option<String>,
}

/// Outcome of `Manager::deploy`.
#[derive(Debug, Clone)]
pub struct DeployResult {
    pub success: bool,
    pub error: Option<Error>,
}

impl DeployResult {
    pub fn message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    pub fn trace(&self) -> Option<String> {
        self.error.as_ref().map(Error::trace)
    }
}

/// Summary of a run, for rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySummary {
    pub project: String,
    pub branch: String,
    pub adapter: String,
    pub build_id: String,
    pub build_path: String,
    pub state: DeployState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_plan: Option<SyncPlan>,
    pub steps: StepLog,
}

pub struct Manager {
    layout: ProjectLayout,
    deployer: Deployer,
}

impl Manager {
    pub fn new(
        project_root: impl Into<PathBuf>,
        options: DeployOptions,
        defaults: &Defaults,
        registry: &AdapterRegistry,
    ) -> Result<Self> {
        Self::with_runner(project_root, options, defaults, registry, Box::new(ShellRunner))
    }

    /// Validate configuration and build the deployer. No step runs here.
    pub fn with_runner(
        project_root: impl Into<PathBuf>,
        options: DeployOptions,
        defaults: &Defaults,
        registry: &AdapterRegistry,
        runner: Box<dyn CommandRunner>,
    ) -> Result<Self> {
        let layout = ProjectLayout::new(project_root);
        layout.validate()?;

        options.permissions.validate("options.permissions")?;
        let manifest = manifest::load(layout.root())?.unwrap_or_default();

        let branch = resolve_branch(
            options.branch.as_deref(),
            manifest.default_branch.as_deref(),
            &defaults.branch,
        );

        let mut config = AdapterConfig::from_defaults(defaults);
        config.environment = manifest.environment.clone();
        config.permissions = manifest.permissions.clone().merge(options.permissions);
        config.install_dependencies = manifest.install_dependencies;
        config.hooks = manifest.hooks.clone();

        let adapter = registry.create(
            &layout.name(),
            manifest.project_type.as_deref(),
            config,
            options.hooks,
        );

        let target = match options.build_id {
            Some(id) if !id.trim().is_empty() => BuildTarget::with_id(&layout, id.trim()),
            _ => BuildTarget::new(&layout),
        };

        let deployer = Deployer::with_target(layout.clone(), target, branch, adapter, runner);

        Ok(Self { layout, deployer })
    }

    /// Run the deployment, converting any failure into the result.
    pub fn deploy(&mut self) -> DeployResult {
        match self.deployer.deploy() {
            Ok(()) => DeployResult {
                success: true,
                error: None,
            },
            Err(e) => DeployResult {
                success: false,
                error: Some(e),
            },
        }
    }

    pub fn steps(&self) -> &StepLog {
        self.deployer.steps()
    }

    pub fn project_name(&self) -> String {
        self.layout.name()
    }

    pub fn project_path(&self) -> &Path {
        self.layout.root()
    }

    pub fn branch(&self) -> &str {
        self.deployer.context().branch()
    }

    pub fn build_id(&self) -> &str {
        self.deployer.context().build_id()
    }

    pub fn build_path(&self) -> &Path {
        self.deployer.context().build_path()
    }

    pub fn adapter_name(&self) -> &str {
        self.deployer.adapter_name()
    }

    pub fn state(&self) -> DeployState {
        self.deployer.state()
    }

    pub fn summary(&self) -> DeploySummary {
        DeploySummary {
            project: self.project_name(),
            branch: self.branch().to_string(),
            adapter: self.adapter_name().to_string(),
            build_id: self.build_id().to_string(),
            build_path: self.build_path().display().to_string(),
            state: self.state(),
            sync_plan: self.deployer.sync_plan().cloned(),
            steps: self.steps().clone(),
        }
    }
}

/// Explicit value, then the manifest default, then the global default.
pub fn resolve_branch(explicit: Option<&str>, manifest: Option<&str>, fallback: &str) -> String {
    [explicit, manifest]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|b| !b.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
