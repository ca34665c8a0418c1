//! Project hooks bound to deployment lifecycle points.
//!
//! A manifest binds a lifecycle point (`beforeDeploy`, `afterDeploy`) to a
//! script relative to the project root and an optional callable name. When the
//! callable is registered in the host's `HookRegistry` it runs in process with
//! the deploy context; otherwise the script runs as `sh <script> [<call>]` in
//! the build directory with `ROLLOUT_*` variables describing the deployment.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::adapter::StageOutcome;
use crate::deploy::DeployContext;
use crate::error::{Error, Result};
use crate::log_status;
use crate::steps::StepOutcome;
use crate::utils::shell;

pub const BEFORE_DEPLOY: &str = "beforeDeploy";
pub const AFTER_DEPLOY: &str = "afterDeploy";

/// Script include plus optional callable for one lifecycle point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookBinding {
    pub include: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<String>,
}

/// Lifecycle point name -> binding.
pub type HookBindings = BTreeMap<String, HookBinding>;

/// In-process hook: `Ok(true)` done, `Ok(false)` soft failure, `Err` halts.
pub type HookFn = Arc<dyn Fn(&mut DeployContext) -> Result<bool> + Send + Sync>;

/// Callables the hosting application makes available to hook bindings.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<String, HookFn>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(&mut DeployContext) -> Result<bool> + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
        self
    }

    pub fn get(&self, name: &str) -> Option<HookFn> {
        self.hooks.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.names())
            .finish()
    }
}

/// Step description recorded for a bound hook.
pub fn step_description(event: &str) -> String {
    format!("Running {} hook...", event)
}

/// Run the hook bound to `event`, recording its step in the context.
///
/// Returns `Skipped` when nothing is bound.
pub fn run_hook(
    bindings: &HookBindings,
    registry: &HookRegistry,
    event: &str,
    ctx: &mut DeployContext,
) -> Result<StageOutcome> {
    let Some(binding) = bindings.get(event) else {
        return Ok(StageOutcome::Skipped);
    };

    let index = ctx.begin_step(step_description(event));

    let script = ctx.project_path().join(&binding.include);
    if !script.is_file() {
        ctx.resolve_step(index, StepOutcome::Failed);
        return Err(Error::hook_script_not_found(
            event,
            script.display().to_string(),
        ));
    }

    let registered = binding.call.as_deref().and_then(|name| registry.get(name));

    let outcome = match registered {
        Some(hook) => match hook(ctx) {
            Ok(true) => StageOutcome::Done,
            Ok(false) => StageOutcome::Failed(format!("Hook '{}' reported failure", event)),
            Err(e) => {
                ctx.resolve_step(index, StepOutcome::Failed);
                let reason = e
                    .details
                    .get("error")
                    .and_then(|v| v.as_str())
                    .map(String::from)
                    .unwrap_or(e.message);
                return Err(Error::hook_failed(event, reason));
            }
        },
        None => run_script(binding, event, &script, ctx),
    };

    ctx.resolve_step(index, outcome.step_outcome());
    Ok(outcome)
}

fn run_script(
    binding: &HookBinding,
    event: &str,
    script: &std::path::Path,
    ctx: &DeployContext,
) -> StageOutcome {
    let mut command = format!("sh {}", shell::quote_path(script));
    if let Some(call) = &binding.call {
        command.push(' ');
        command.push_str(&shell::quote_arg(call));
    }

    let vars = hook_env(ctx, event);
    let env: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let output = ctx.run_with_env(&command, &env);

    if output.success {
        return StageOutcome::Done;
    }

    log_status!(
        "hook",
        "{} exited with {}: {}",
        event,
        output.exit_code,
        output.stderr.trim()
    );
    StageOutcome::Failed(format!(
        "Hook '{}' exited with code {}",
        event, output.exit_code
    ))
}

/// Environment describing the deployment to script hooks.
pub fn hook_env(ctx: &DeployContext, event: &str) -> Vec<(&'static str, String)> {
    vec![
        ("ROLLOUT_PROJECT_PATH", ctx.project_path().display().to_string()),
        ("ROLLOUT_REPO_PATH", ctx.repo_path().display().to_string()),
        ("ROLLOUT_SHARED_PATH", ctx.shared_path().display().to_string()),
        ("ROLLOUT_CURRENT_PATH", ctx.current_path().display().to_string()),
        ("ROLLOUT_BUILD_PATH", ctx.build_path().display().to_string()),
        ("ROLLOUT_BUILD_ID", ctx.build_id().to_string()),
        ("ROLLOUT_BRANCH", ctx.branch().to_string()),
        ("ROLLOUT_HOOK", event.to_string()),
    ]
}
