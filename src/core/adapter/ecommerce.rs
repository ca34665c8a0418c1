use std::fs;
use std::path::Path;

use super::{relink, symlink, AdapterConfig, GenericAdapter, ProjectAdapter, StageOutcome};
use crate::deploy::DeployContext;
use crate::error::{Error, Result};
use crate::hooks::HookRegistry;
use crate::log_status;
use crate::steps::StepOutcome;
use crate::utils::shell;

const MAINTENANCE_FLAG: &str = "maintenance.flag";
const MAINTENANCE_FLAG_DISABLED: &str = "maintenance.flag.disabled";
const LOCAL_CONFIG: &str = "app/etc/local.xml";
const BOOTSTRAP: &str = "app/Mage.php";
const CRON_SCRIPT: &str = "cron.sh";

/// Directories served from `shared/` instead of the build.
const SHARED_DIRS: [&str; 2] = ["media", "var"];

/// Files replaced by their `<name>.<env>` variant when an environment is set.
pub const ENVIRONMENT_FILES: [&str; 5] = [
    ".htaccess",
    "errors/local.xml",
    LOCAL_CONFIG,
    "newrelic.php",
    "robots.txt",
];

pub const CACHE_FLUSH_STEP: &str = "Flushing platform cache...";
pub const MIGRATE_STEP: &str = "Applying platform updates...";

/// E-commerce platform (`magento`): maintenance marker, shared media and var,
/// environment-specific configuration, strict permissions, cache flush and
/// schema updates after activation.
#[derive(Debug, Clone)]
pub struct EcommerceAdapter {
    inner: GenericAdapter,
}

impl EcommerceAdapter {
    pub fn new(config: AdapterConfig, registry: HookRegistry) -> Self {
        let permissions = config.strict_permissions();
        Self {
            inner: GenericAdapter::with_permissions(config, registry, permissions),
        }
    }

    pub fn permissions(&self) -> &crate::permissions::PermissionScheme {
        self.inner.permissions()
    }

    fn prepare_build(&self, ctx: &DeployContext) -> std::result::Result<(), String> {
        let build = ctx.build_path();
        let shared = ctx.shared_path();

        let disabled = build.join(MAINTENANCE_FLAG_DISABLED);
        if disabled.exists() {
            rename(&disabled, &build.join(MAINTENANCE_FLAG))?;
        }

        for dir in SHARED_DIRS {
            relink(&shared.join(dir), &build.join(dir))
                .map_err(|e| format!("Unable to link shared {}: {}", dir, e))?;
        }

        if let Some(env) = self.inner.config().environment.as_deref() {
            for file in ENVIRONMENT_FILES {
                let variant = build.join(format!("{}.{}", file, env));
                if variant.exists() {
                    log_status!("magento", "Using {}.{}", file, env);
                    rename(&variant, &build.join(file))?;
                }
            }
        }

        let local_config = build.join(LOCAL_CONFIG);
        let shared_config = shared.join(LOCAL_CONFIG);
        if !local_config.exists() && shared_config.exists() {
            if let Some(parent) = local_config.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Unable to create {}: {}", parent.display(), e))?;
            }
            // Drop a dangling link left by the snapshot before linking.
            if local_config.is_symlink() {
                fs::remove_file(&local_config)
                    .map_err(|e| format!("Unable to remove {}: {}", local_config.display(), e))?;
            }
            symlink(&shared_config, &local_config)
                .map_err(|e| format!("Unable to link {}: {}", LOCAL_CONFIG, e))?;
        }

        let dev = build.join("dev");
        if dev.is_dir() {
            fs::remove_dir_all(&dev)
                .map_err(|e| format!("Unable to remove {}: {}", dev.display(), e))?;
        }

        Ok(())
    }

    /// Run a platform command as a recorded step.
    fn platform_step(&self, ctx: &mut DeployContext, description: &str, command: &str) -> bool {
        let index = ctx.begin_step(description);
        let output = ctx.run(command);
        ctx.resolve_step(index, if output.success {
            StepOutcome::Done
        } else {
            StepOutcome::Failed
        });
        if !output.success {
            log_status!(
                "magento",
                "{} failed (exit {}): {}",
                description,
                output.exit_code,
                output.stderr.trim()
            );
        }
        output.success
    }

    fn finish_platform(&self, ctx: &mut DeployContext) -> StageOutcome {
        let commands = &self.inner.config().commands;

        if ctx.build_path().join(BOOTSTRAP).exists() {
            let flush = commands.platform_cache_flush.clone();
            let migrate = commands.platform_migrate.clone();
            if !self.platform_step(ctx, CACHE_FLUSH_STEP, &flush) {
                return StageOutcome::Failed("Platform cache flush failed".to_string());
            }
            if !self.platform_step(ctx, MIGRATE_STEP, &migrate) {
                return StageOutcome::Failed("Platform updates failed".to_string());
            }
        }

        match self.lift_maintenance(ctx) {
            Ok(()) => StageOutcome::Done,
            Err(reason) => StageOutcome::Failed(reason),
        }
    }

    /// Rename `maintenance.flag` back to its disabled name.
    ///
    /// The permission pass leaves the build root at the scheme's directory
    /// mode, which may deny the owner write access. Owner write is granted for
    /// the rename and the directory mode is put back afterwards.
    fn lift_maintenance(&self, ctx: &DeployContext) -> std::result::Result<(), String> {
        let build = ctx.build_path();
        let flag = build.join(MAINTENANCE_FLAG);
        if !flag.exists() {
            return Ok(());
        }

        let quoted = shell::quote_path(build);
        run_chmod(ctx, &format!("chmod u+w {}", quoted))?;
        let renamed = rename(&flag, &build.join(MAINTENANCE_FLAG_DISABLED));
        let restored = run_chmod(
            ctx,
            &format!(
                "chmod {} {}",
                shell::quote_arg(&self.permissions().dir_mode),
                quoted
            ),
        );
        renamed.and(restored)
    }
}

fn run_chmod(ctx: &DeployContext, command: &str) -> std::result::Result<(), String> {
    let output = ctx.run(command);
    if output.success {
        return Ok(());
    }
    Err(format!(
        "{} exited with {}: {}",
        command,
        output.exit_code,
        output.stderr.trim()
    ))
}

fn rename(from: &Path, to: &Path) -> std::result::Result<(), String> {
    fs::rename(from, to).map_err(|e| {
        format!(
            "Unable to rename {} to {}: {}",
            from.display(),
            to.display(),
            e
        )
    })
}

impl ProjectAdapter for EcommerceAdapter {
    fn name(&self) -> &str {
        super::MAGENTO_TYPE
    }

    fn before_deploy(&self, ctx: &mut DeployContext) -> Result<StageOutcome> {
        if let Err(reason) = self.prepare_build(ctx) {
            log_status!("magento", "{}", reason);
            return Ok(StageOutcome::Failed(reason));
        }
        Ok(StageOutcome::Done.and(self.inner.before_deploy(ctx)?))
    }

    fn set_file_permissions(&self, ctx: &mut DeployContext) -> Result<StageOutcome> {
        self.inner.set_file_permissions(ctx)?;

        let cron = ctx.build_path().join(CRON_SCRIPT);
        if cron.is_file() {
            let command = format!("chmod +x {}", shell::quote_path(&cron));
            let output = ctx.run(&command);
            if !output.success {
                return Err(Error::deploy_permissions_failed(format!(
                    "{} exited with {}: {}",
                    command,
                    output.exit_code,
                    output.stderr.trim()
                )));
            }
        }
        Ok(StageOutcome::Done)
    }

    fn after_deploy(&self, ctx: &mut DeployContext) -> Result<StageOutcome> {
        self.inner.reset_opcode_cache(ctx);
        let platform = self.finish_platform(ctx);
        Ok(platform.and(self.inner.after_deploy(ctx)?))
    }
}
