use std::fs;

use super::{relink, AdapterConfig, GenericAdapter, ProjectAdapter, StageOutcome};
use crate::deploy::DeployContext;
use crate::error::Result;
use crate::hooks::HookRegistry;
use crate::log_status;

/// Lightweight application framework (`zend`): the build's `tmp/` is replaced
/// by a link to the shared one and opcode caches are reset after activation.
#[derive(Debug, Clone)]
pub struct LightweightAdapter {
    inner: GenericAdapter,
}

impl LightweightAdapter {
    pub fn new(config: AdapterConfig, registry: HookRegistry) -> Self {
        Self {
            inner: GenericAdapter::new(config, registry),
        }
    }

    fn link_shared_tmp(&self, ctx: &DeployContext) -> StageOutcome {
        let build_tmp = ctx.build_path().join("tmp");
        let shared_tmp = ctx.shared_path().join("tmp");

        if build_tmp.is_dir() && !build_tmp.is_symlink() {
            if let Err(e) = fs::remove_dir_all(&build_tmp) {
                return StageOutcome::Failed(format!(
                    "Unable to remove {}: {}",
                    build_tmp.display(),
                    e
                ));
            }
        }

        log_status!("zend", "Linking {} -> {}", build_tmp.display(), shared_tmp.display());
        match relink(&shared_tmp, &build_tmp) {
            Ok(()) => StageOutcome::Done,
            Err(e) => StageOutcome::Failed(format!(
                "Unable to link {}: {}",
                build_tmp.display(),
                e
            )),
        }
    }
}

impl ProjectAdapter for LightweightAdapter {
    fn name(&self) -> &str {
        super::ZEND_TYPE
    }

    fn before_deploy(&self, ctx: &mut DeployContext) -> Result<StageOutcome> {
        let linked = self.link_shared_tmp(ctx);
        if linked.is_failed() {
            return Ok(linked);
        }
        Ok(linked.and(self.inner.before_deploy(ctx)?))
    }

    fn set_file_permissions(&self, ctx: &mut DeployContext) -> Result<StageOutcome> {
        self.inner.set_file_permissions(ctx)
    }

    fn after_deploy(&self, ctx: &mut DeployContext) -> Result<StageOutcome> {
        self.inner.reset_opcode_cache(ctx);
        self.inner.after_deploy(ctx)
    }
}
