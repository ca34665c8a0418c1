//! Project adapters: framework-specific work around the deployment pipeline.
//!
//! Every adapter implements `ProjectAdapter`. The specialised adapters wrap a
//! `GenericAdapter` and add their own steps before delegating to it.

mod ecommerce;
mod generic;
mod lightweight;
mod registry;

pub use ecommerce::EcommerceAdapter;
pub use generic::GenericAdapter;
pub use lightweight::LightweightAdapter;
pub use registry::{AdapterConstructor, AdapterRegistry, GENERIC_TYPE, MAGENTO_TYPE, ZEND_TYPE};

use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::defaults::{CommandsConfig, Defaults, PermissionsConfig};
use crate::deploy::DeployContext;
use crate::error::Result;
use crate::hooks::HookBindings;
use crate::permissions::{PermissionOverrides, PermissionScheme};
use crate::steps::StepOutcome;

/// Result of one adapter lifecycle stage.
///
/// `Err` from a stage halts the deployment; `Failed` is recorded and the
/// pipeline continues (except for permissions, which treat it as fatal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum StageOutcome {
    Done,
    Skipped,
    Failed(String),
}

impl StageOutcome {
    pub fn step_outcome(&self) -> StepOutcome {
        match self {
            StageOutcome::Done => StepOutcome::Done,
            StageOutcome::Skipped => StepOutcome::Skipped,
            StageOutcome::Failed(_) => StepOutcome::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }

    /// Combine with the outcome of a later part of the same stage.
    ///
    /// A failure wins over everything, and any `Done` wins over `Skipped`.
    pub fn and(self, next: StageOutcome) -> StageOutcome {
        match (self, next) {
            (StageOutcome::Failed(reason), _) => StageOutcome::Failed(reason),
            (_, StageOutcome::Failed(reason)) => StageOutcome::Failed(reason),
            (StageOutcome::Skipped, StageOutcome::Skipped) => StageOutcome::Skipped,
            _ => StageOutcome::Done,
        }
    }
}

/// Resolved per-project settings handed to an adapter constructor.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Suffix of environment-specific files (`name.<env>`).
    pub environment: Option<String>,
    /// Manifest and command-line overrides, layered over the adapter's defaults.
    pub permissions: PermissionOverrides,
    pub permission_defaults: PermissionsConfig,
    pub install_dependencies: bool,
    pub commands: CommandsConfig,
    pub hooks: HookBindings,
}

impl AdapterConfig {
    pub fn from_defaults(defaults: &Defaults) -> Self {
        Self {
            environment: None,
            permissions: PermissionOverrides::default(),
            permission_defaults: defaults.permissions.clone(),
            install_dependencies: false,
            commands: defaults.commands.clone(),
            hooks: HookBindings::new(),
        }
    }

    /// Overrides resolved over the standard modes.
    pub fn standard_permissions(&self) -> PermissionScheme {
        self.permissions.resolve(&self.permission_defaults.standard)
    }

    /// Overrides resolved over the strict modes.
    pub fn strict_permissions(&self) -> PermissionScheme {
        self.permissions.resolve(&self.permission_defaults.strict)
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::from_defaults(&Defaults::default())
    }
}

/// Framework-specific deployment behaviour.
pub trait ProjectAdapter {
    /// Type tag, e.g. `generic`, `zend`, `magento`.
    fn name(&self) -> &str;

    /// Runs after the snapshot export, before permissions.
    fn before_deploy(&self, ctx: &mut DeployContext) -> Result<StageOutcome>;

    /// Applies the permission scheme to the build directory.
    fn set_file_permissions(&self, ctx: &mut DeployContext) -> Result<StageOutcome>;

    /// Runs once `current` points at the new build.
    fn after_deploy(&self, ctx: &mut DeployContext) -> Result<StageOutcome>;
}

/// Replace `link` with a symlink to `target`, removing a directory or file
/// already at `link`.
pub(crate) fn relink(target: &Path, link: &Path) -> std::io::Result<()> {
    if let Ok(meta) = fs::symlink_metadata(link) {
        if meta.is_dir() {
            fs::remove_dir_all(link)?;
        } else {
            fs::remove_file(link)?;
        }
    }
    symlink(target, link)
}

#[cfg(unix)]
pub(crate) fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub(crate) fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_dominates_combination() {
        let failed = StageOutcome::Failed("link".to_string());
        assert_eq!(
            StageOutcome::Done.and(failed.clone()),
            StageOutcome::Failed("link".to_string())
        );
        assert_eq!(
            failed.and(StageOutcome::Failed("later".to_string())),
            StageOutcome::Failed("link".to_string())
        );
    }

    #[test]
    fn done_beats_skipped() {
        assert_eq!(
            StageOutcome::Skipped.and(StageOutcome::Done),
            StageOutcome::Done
        );
        assert_eq!(
            StageOutcome::Done.and(StageOutcome::Skipped),
            StageOutcome::Done
        );
        assert_eq!(
            StageOutcome::Skipped.and(StageOutcome::Skipped),
            StageOutcome::Skipped
        );
    }

    #[test]
    fn config_resolves_standard_and_strict_modes() {
        let config = AdapterConfig::default();
        assert_eq!(config.standard_permissions().dir_mode, "775");
        assert_eq!(config.strict_permissions().file_mode, "440");
    }

    #[cfg(unix)]
    #[test]
    fn relink_replaces_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let shared = dir.path().join("shared_tmp");
        let link = dir.path().join("tmp");
        fs::create_dir(&shared).unwrap();
        fs::create_dir(&link).unwrap();
        fs::write(link.join("stale"), "x").unwrap();

        relink(&shared, &link).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), shared);
    }
}
