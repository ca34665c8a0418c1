use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::hooks::HookBindings;
use crate::permissions::PermissionOverrides;
use crate::utils::io;

/// Manifest file name in the project root.
pub const MANIFEST_FILE: &str = "deploy.json";

/// Per-project deployment settings read from `deploy.json`.
///
/// Every field is optional; a project without a manifest deploys with the
/// generic adapter and the global defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectManifest {
    /// Adapter type tag (`zend`, `magento`, or a host-registered tag).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,

    /// Suffix selecting environment-specific files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(default)]
    pub permissions: PermissionOverrides,

    #[serde(default, alias = "use_composer")]
    pub install_dependencies: bool,

    #[serde(default)]
    pub hooks: HookBindings,
}

pub fn manifest_path(project_root: &Path) -> PathBuf {
    project_root.join(MANIFEST_FILE)
}

/// Load and validate the manifest. A missing file yields `None`.
pub fn load(project_root: &Path) -> Result<Option<ProjectManifest>> {
    let path = manifest_path(project_root);
    if !path.exists() {
        return Ok(None);
    }

    let manifest: ProjectManifest = io::read_json(&path, "read deploy.json")?;
    let manifest = manifest.normalized();
    manifest.validate()?;
    Ok(Some(manifest))
}

impl ProjectManifest {
    /// Treat empty strings as unset.
    pub fn normalized(mut self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        self.project_type = clean(self.project_type);
        self.default_branch = clean(self.default_branch);
        self.environment = clean(self.environment);
        self.permissions = PermissionOverrides {
            directory: clean(self.permissions.directory),
            file: clean(self.permissions.file),
            owner: clean(self.permissions.owner),
        };
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.permissions.validate("permissions")?;

        for (event, binding) in &self.hooks {
            if binding.include.trim().is_empty() {
                return Err(Error::config_invalid_value(
                    format!("hooks.{}.include", event),
                    None,
                    "Hook include path must not be empty",
                ));
            }
        }

        if let Some(env) = &self.environment {
            if env.contains('/') || env.contains('\\') {
                return Err(Error::config_invalid_value(
                    "environment",
                    Some(env.clone()),
                    "Environment must be a plain file suffix",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_manifest_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load(dir.path()).unwrap(), None);
    }

    #[test]
    fn parses_full_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(
            manifest_path(dir.path()),
            r#"{
                "type": "magento",
                "default_branch": "release",
                "environment": "production",
                "permissions": {"directory": "750", "file": "640", "owner": "www-data"},
                "use_composer": true,
                "hooks": {
                    "afterDeploy": {"include": "deploy/hooks.sh", "call": "afterDeploy"}
                }
            }"#,
        )
        .unwrap();

        let manifest = load(dir.path()).unwrap().unwrap();

        assert_eq!(manifest.project_type.as_deref(), Some("magento"));
        assert_eq!(manifest.default_branch.as_deref(), Some("release"));
        assert_eq!(manifest.environment.as_deref(), Some("production"));
        assert_eq!(manifest.permissions.directory.as_deref(), Some("750"));
        assert_eq!(manifest.permissions.owner.as_deref(), Some("www-data"));
        assert!(manifest.install_dependencies);
        let hook = &manifest.hooks["afterDeploy"];
        assert_eq!(hook.include, "deploy/hooks.sh");
        assert_eq!(hook.call.as_deref(), Some("afterDeploy"));
    }

    #[test]
    fn empty_strings_are_unset() {
        let dir = TempDir::new().unwrap();
        fs::write(
            manifest_path(dir.path()),
            r#"{"type": "", "default_branch": "  ", "permissions": {"file": ""}}"#,
        )
        .unwrap();

        let manifest = load(dir.path()).unwrap().unwrap();
        assert_eq!(manifest.project_type, None);
        assert_eq!(manifest.default_branch, None);
        assert_eq!(manifest.permissions.file, None);
    }

    #[test]
    fn malformed_manifest_is_config_error() {
        let dir = TempDir::new().unwrap();
        fs::write(manifest_path(dir.path()), "{\"type\": ").unwrap();

        let err = load(dir.path()).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_json");
    }

    #[test]
    fn invalid_mode_is_config_value_error() {
        let dir = TempDir::new().unwrap();
        fs::write(
            manifest_path(dir.path()),
            r#"{"permissions": {"directory": "8888"}}"#,
        )
        .unwrap();

        let err = load(dir.path()).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
        assert_eq!(err.details["key"], "permissions.directory");
    }
}
