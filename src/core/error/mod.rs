use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,

    ProjectNotFound,
    ProjectNoneDeployable,
    ProjectLayoutInvalid,

    DeployBuildDirFailed,
    DeployPermissionsFailed,
    DeployActivationFailed,

    HookFailed,
    HookScriptNotFound,

    GitCommandFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::ProjectNotFound => "project.not_found",
            ErrorCode::ProjectNoneDeployable => "project.none_deployable",
            ErrorCode::ProjectLayoutInvalid => "project.layout_invalid",

            ErrorCode::DeployBuildDirFailed => "deploy.build_dir_failed",
            ErrorCode::DeployPermissionsFailed => "deploy.permissions_failed",
            ErrorCode::DeployActivationFailed => "deploy.activation_failed",

            ErrorCode::HookFailed => "hook.failed",
            ErrorCode::HookScriptNotFound => "hook.script_not_found",

            ErrorCode::GitCommandFailed => "git.command_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundDetails {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searched: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Captured failure of an external command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutInvalidDetails {
    pub root: String,
    pub missing: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationFailedDetails {
    pub current: String,
    pub build: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookDetails {
    pub hook: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn project_not_found(id: impl Into<String>, searched: Option<String>) -> Self {
        let details = to_details(NotFoundDetails {
            id: id.into(),
            searched,
        });
        Self::new(ErrorCode::ProjectNotFound, "Project not found", details)
            .with_hint("Run 'rollout projects' to see deployable projects")
    }

    pub fn project_none_deployable(projects_dir: impl Into<String>) -> Self {
        let dir = projects_dir.into();
        Self::new(
            ErrorCode::ProjectNoneDeployable,
            "No projects suitable for deployment",
            serde_json::json!({ "projectsDir": dir }),
        )
        .with_hint("A deployable project directory contains both 'repo/' and 'builds/'")
    }

    pub fn project_layout_invalid(root: impl Into<String>, missing: Vec<String>) -> Self {
        let root = root.into();
        let message = format!("Project at {} is missing {}", root, missing.join(", "));
        Self::new(
            ErrorCode::ProjectLayoutInvalid,
            message,
            to_details(LayoutInvalidDetails { root, missing }),
        )
    }

    pub fn deploy_build_dir_failed(path: impl Into<String>, details: CommandFailedDetails) -> Self {
        Self::new(
            ErrorCode::DeployBuildDirFailed,
            format!("Unable to create build directory {}", path.into()),
            to_details(details),
        )
    }

    pub fn deploy_permissions_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DeployPermissionsFailed,
            "Error updating file permissions",
            serde_json::json!({ "reason": reason.into() }),
        )
        .with_hint("The build was not activated; 'current' still points at the previous build")
    }

    pub fn deploy_activation_failed(
        current: impl Into<String>,
        build: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let details = to_details(ActivationFailedDetails {
            current: current.into(),
            build: build.into(),
            reason: reason.into(),
        });

        Self::new(
            ErrorCode::DeployActivationFailed,
            "Error linking to the current directory",
            details,
        )
    }

    pub fn hook_failed(hook: impl Into<String>, error: impl Into<String>) -> Self {
        let hook = hook.into();
        let details = to_details(HookDetails {
            hook: hook.clone(),
            script: None,
            error: Some(error.into()),
        });
        Self::new(ErrorCode::HookFailed, format!("Hook '{}' failed", hook), details)
    }

    pub fn hook_script_not_found(hook: impl Into<String>, script: impl Into<String>) -> Self {
        let hook = hook.into();
        let details = to_details(HookDetails {
            hook: hook.clone(),
            script: Some(script.into()),
            error: None,
        });
        Self::new(
            ErrorCode::HookScriptNotFound,
            format!("Script for hook '{}' not found", hook),
            details,
        )
        .with_hint("Hook include paths are relative to the project root")
    }

    pub fn git_command_failed(message: impl Into<String>, details: CommandFailedDetails) -> Self {
        Self::new(ErrorCode::GitCommandFailed, message, to_details(details))
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let details = to_details(ConfigInvalidJsonDetails {
            path: path.into(),
            error: err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Attach the pipeline step (1-based) that raised this error.
    pub fn at_step(mut self, index: usize, description: &str) -> Self {
        let step = serde_json::json!({ "index": index, "description": description });
        match self.details {
            Value::Object(ref mut map) => {
                map.insert("step".to_string(), step);
            }
            Value::Null => {
                self.details = serde_json::json!({ "step": step });
            }
            other => {
                self.details = serde_json::json!({ "step": step, "context": other });
            }
        }
        self
    }

    /// Step index recorded by `at_step`, if any.
    pub fn step_index(&self) -> Option<usize> {
        self.details
            .get("step")
            .and_then(|s| s.get("index"))
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
    }

    /// Multi-line diagnostic: code, failing step, details, hints.
    pub fn trace(&self) -> String {
        let mut lines = vec![format!("code: {}", self.code.as_str())];

        if let Some(step) = self.details.get("step") {
            let index = step.get("index").and_then(|i| i.as_u64()).unwrap_or(0);
            let description = step
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or("");
            lines.push(format!("step: {} {}", index, description));
        }

        let mut details = self.details.clone();
        if let Value::Object(ref mut map) = details {
            map.remove("step");
        }
        let is_empty = match &details {
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        };
        if !is_empty {
            let rendered = serde_json::to_string_pretty(&details).unwrap_or_default();
            lines.push(format!("details: {}", rendered));
        }

        for hint in &self.hints {
            lines.push(format!("hint: {}", hint.message));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_command() -> CommandFailedDetails {
        CommandFailedDetails {
            command: "git pull".to_string(),
            exit_code: 1,
            stdout: String::new(),
            stderr: "fatal: not a git repository".to_string(),
        }
    }

    #[test]
    fn at_step_merges_into_object_details() {
        let err = Error::git_command_failed("Unable to pull from remote", failed_command()).at_step(2, "Synchronizing repository...");

        assert_eq!(err.step_index(), Some(2));
        assert_eq!(err.details["command"], "git pull");
        assert_eq!(err.details["step"]["description"], "Synchronizing repository...");
    }

    #[test]
    fn at_step_wraps_null_details() {
        let err = Error::new(ErrorCode::InternalUnexpected, "boom", Value::Null).at_step(6, "x");
        assert_eq!(err.step_index(), Some(6));
    }

    #[test]
    fn trace_includes_code_step_details_and_hints() {
        let err = Error::deploy_permissions_failed("chmod exited 1").at_step(5, "Updating file permissions...");
        let trace = err.trace();

        assert!(trace.starts_with("code: deploy.permissions_failed"));
        assert!(trace.contains("step: 5 Updating file permissions..."));
        assert!(trace.contains("chmod exited 1"));
        assert!(trace.contains("hint: The build was not activated"));
    }

    #[test]
    fn trace_omits_empty_details() {
        let err = Error::new(ErrorCode::InternalUnexpected, "boom", Value::Null);
        assert_eq!(err.trace(), "code: internal.unexpected");
    }

    #[test]
    fn display_uses_message() {
        let err = Error::project_layout_invalid("/var/www/shop", vec!["repo/".to_string()]);
        assert_eq!(err.to_string(), "Project at /var/www/shop is missing repo/");
    }
}
