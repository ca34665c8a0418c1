use super::{AdapterConfig, ProjectAdapter, StageOutcome};
use crate::deploy::DeployContext;
use crate::error::Result;
use crate::hooks::{self, HookRegistry};
use crate::log_status;
use crate::permissions::PermissionScheme;
use crate::steps::StepOutcome;

pub const INSTALL_STEP: &str = "Installing dependencies...";

/// Default adapter: optional dependency install, standard permissions and the
/// manifest's `beforeDeploy`/`afterDeploy` hooks.
#[derive(Debug, Clone)]
pub struct GenericAdapter {
    config: AdapterConfig,
    registry: HookRegistry,
    permissions: PermissionScheme,
}

impl GenericAdapter {
    pub fn new(config: AdapterConfig, registry: HookRegistry) -> Self {
        let permissions = config.standard_permissions();
        Self::with_permissions(config, registry, permissions)
    }

    pub fn with_permissions(
        config: AdapterConfig,
        registry: HookRegistry,
        permissions: PermissionScheme,
    ) -> Self {
        Self {
            config,
            registry,
            permissions,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn permissions(&self) -> &PermissionScheme {
        &self.permissions
    }

    fn install_dependencies(&self, ctx: &mut DeployContext) -> StageOutcome {
        if !self.config.install_dependencies {
            return StageOutcome::Skipped;
        }

        let index = ctx.begin_step(INSTALL_STEP);
        let command = &self.config.commands.install_dependencies;
        let output = ctx.run(command);

        if output.success {
            ctx.resolve_step(index, StepOutcome::Done);
            return StageOutcome::Done;
        }

        ctx.resolve_step(index, StepOutcome::Failed);
        log_status!("deploy", "Dependency install failed: {}", output.stderr.trim());
        StageOutcome::Failed(format!(
            "'{}' exited with code {}",
            command, output.exit_code
        ))
    }

    /// Best-effort opcode cache reset; failure is only logged.
    pub(crate) fn reset_opcode_cache(&self, ctx: &DeployContext) {
        let output = ctx.run(&self.config.commands.opcache_reset);
        if !output.success {
            log_status!(
                "deploy",
                "Opcode cache reset failed (exit {}): {}",
                output.exit_code,
                output.stderr.trim()
            );
        }
    }
}

impl ProjectAdapter for GenericAdapter {
    fn name(&self) -> &str {
        super::GENERIC_TYPE
    }

    fn before_deploy(&self, ctx: &mut DeployContext) -> Result<StageOutcome> {
        let installed = self.install_dependencies(ctx);
        if installed.is_failed() {
            return Ok(installed);
        }
        let hook = hooks::run_hook(
            &self.config.hooks,
            &self.registry,
            hooks::BEFORE_DEPLOY,
            ctx,
        )?;
        Ok(installed.and(hook))
    }

    fn set_file_permissions(&self, ctx: &mut DeployContext) -> Result<StageOutcome> {
        self.permissions.apply(ctx)?;
        Ok(StageOutcome::Done)
    }

    fn after_deploy(&self, ctx: &mut DeployContext) -> Result<StageOutcome> {
        hooks::run_hook(&self.config.hooks, &self.registry, hooks::AFTER_DEPLOY, ctx)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::executor::ShellRunner;
    use crate::hooks::HookBinding;
    use crate::layout::{BuildTarget, ProjectLayout};
    use std::fs;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> DeployContext {
        let layout = ProjectLayout::new(dir.path());
        let target = BuildTarget::with_id(&layout, "20240101120000");
        fs::create_dir_all(&target.build_path).unwrap();
        DeployContext::new(layout, target, "master", Box::new(ShellRunner))
    }

    #[test]
    fn nothing_configured_skips_both_stages() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let adapter = GenericAdapter::new(AdapterConfig::default(), HookRegistry::new());

        assert_eq!(adapter.before_deploy(&mut ctx).unwrap(), StageOutcome::Skipped);
        assert_eq!(adapter.after_deploy(&mut ctx).unwrap(), StageOutcome::Skipped);
        assert!(ctx.steps().is_empty());
    }

    #[test]
    fn install_step_runs_configured_command() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let mut config = AdapterConfig::default();
        config.install_dependencies = true;
        config.commands.install_dependencies = "touch installed".to_string();
        let adapter = GenericAdapter::new(config, HookRegistry::new());

        let outcome = adapter.before_deploy(&mut ctx).unwrap();

        assert_eq!(outcome, StageOutcome::Done);
        assert!(ctx.build_path().join("installed").exists());
        assert_eq!(ctx.steps().lines(), vec!["Installing dependencies... Done"]);
    }

    #[test]
    fn failed_install_skips_hook() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hook.sh"), "touch hooked\n").unwrap();
        let mut ctx = context(&dir);
        let mut config = AdapterConfig::default();
        config.install_dependencies = true;
        config.commands.install_dependencies = "exit 2".to_string();
        config.hooks.insert(
            hooks::BEFORE_DEPLOY.to_string(),
            HookBinding {
                include: "hook.sh".to_string(),
                call: None,
            },
        );
        let adapter = GenericAdapter::new(config, HookRegistry::new());

        let outcome = adapter.before_deploy(&mut ctx).unwrap();

        assert!(outcome.is_failed());
        assert!(!ctx.build_path().join("hooked").exists());
        assert_eq!(ctx.steps().lines(), vec!["Installing dependencies... Error"]);
    }

    #[test]
    fn permissions_use_standard_modes() {
        let adapter = GenericAdapter::new(AdapterConfig::default(), HookRegistry::new());
        assert_eq!(adapter.permissions().dir_mode, "775");
        assert_eq!(adapter.permissions().file_mode, "664");
    }

    #[test]
    fn applies_permissions_to_build() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        fs::create_dir(ctx.build_path().join("lib")).unwrap();
        fs::write(ctx.build_path().join("lib/app.php"), "<?php").unwrap();
        let adapter = GenericAdapter::new(AdapterConfig::default(), HookRegistry::new());

        assert_eq!(
            adapter.set_file_permissions(&mut ctx).unwrap(),
            StageOutcome::Done
        );

        let dir_mode = fs::metadata(ctx.build_path().join("lib"))
            .unwrap()
            .permissions()
            .mode();
        let file_mode = fs::metadata(ctx.build_path().join("lib/app.php"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(dir_mode & 0o777, 0o775);
        assert_eq!(file_mode & 0o777, 0o664);
    }
}
