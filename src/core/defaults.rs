use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::paths;

/// Root configuration structure for rollout.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolloutConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via rollout.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Directory holding one sub-directory per deployable project.
    #[serde(default = "default_projects_dir")]
    pub projects_dir: String,

    /// Branch deployed when neither the invocation nor the manifest names one.
    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_permissions")]
    pub permissions: PermissionsConfig,

    #[serde(default = "default_commands")]
    pub commands: CommandsConfig,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
            branch: default_branch(),
            permissions: default_permissions(),
            commands: default_commands(),
        }
    }
}

impl Defaults {
    /// Projects directory with `~` expanded.
    pub fn projects_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.projects_dir).to_string())
    }
}

/// Default permission modes per adapter strictness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsConfig {
    #[serde(default = "default_standard_permissions")]
    pub standard: PermissionModes,

    #[serde(default = "default_strict_permissions")]
    pub strict: PermissionModes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionModes {
    pub dir_mode: String,
    pub file_mode: String,
}

/// Command lines used by the built-in project adapters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_install_dependencies")]
    pub install_dependencies: String,

    #[serde(default = "default_opcache_reset")]
    pub opcache_reset: String,

    #[serde(default = "default_platform_cache_flush")]
    pub platform_cache_flush: String,

    #[serde(default = "default_platform_migrate")]
    pub platform_migrate: String,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_projects_dir() -> String {
    "/var/www".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_permissions() -> PermissionsConfig {
    PermissionsConfig {
        standard: default_standard_permissions(),
        strict: default_strict_permissions(),
    }
}

fn default_standard_permissions() -> PermissionModes {
    PermissionModes {
        dir_mode: "775".to_string(),
        file_mode: "664".to_string(),
    }
}

fn default_strict_permissions() -> PermissionModes {
    PermissionModes {
        dir_mode: "550".to_string(),
        file_mode: "440".to_string(),
    }
}

fn default_commands() -> CommandsConfig {
    CommandsConfig {
        install_dependencies: default_install_dependencies(),
        opcache_reset: default_opcache_reset(),
        platform_cache_flush: default_platform_cache_flush(),
        platform_migrate: default_platform_migrate(),
    }
}

fn default_install_dependencies() -> String {
    "composer install --no-dev --no-interaction --optimize-autoloader".to_string()
}

// CLI-side reset only; FPM/Apache opcode caches live in another process.
fn default_opcache_reset() -> String {
    r#"php -r 'if (function_exists("opcache_reset")) { opcache_reset(); } if (function_exists("apcu_clear_cache")) { apcu_clear_cache(); }'"#.to_string()
}

fn default_platform_cache_flush() -> String {
    r#"php -r 'require "app/Mage.php"; if (!Mage::isInstalled()) { exit(0); } $_SERVER["SCRIPT_NAME"] = "/"; $_SERVER["SCRIPT_FILENAME"] = "/"; Mage::app("admin")->setUseSessionInUrl(false); umask(0); Mage::app()->getCacheInstance()->flush();'"#.to_string()
}

fn default_platform_migrate() -> String {
    r#"php -r 'require "app/Mage.php"; if (!Mage::isInstalled()) { exit(0); } Mage::app("admin"); Mage::getConfig()->reinit(); Mage_Core_Model_Resource_Setup::applyAllUpdates(); Mage_Core_Model_Resource_Setup::applyAllDataUpdates();'"#.to_string()
}

// =============================================================================
// Loading
// =============================================================================

/// Load defaults from rollout.json, falling back to built-in values.
pub fn load_defaults() -> Defaults {
    load_config().defaults
}

/// Load the full rollout.json config, falling back to defaults on any error.
pub fn load_config() -> RolloutConfig {
    paths::rollout_json()
        .ok()
        .and_then(|path| load_config_from(&path).ok())
        .unwrap_or_default()
}

/// Load config from an explicit file path.
pub fn load_config_from(path: &Path) -> crate::Result<RolloutConfig> {
    if !path.exists() {
        return Err(crate::Error::internal_io(
            format!("{} not found", path.display()),
            Some("load rollout.json".to_string()),
        ));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| crate::Error::config_invalid_json(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn built_in_defaults_match_legacy_layout() {
        let defaults = Defaults::default();
        assert_eq!(defaults.projects_dir, "/var/www");
        assert_eq!(defaults.branch, "master");
        assert_eq!(defaults.permissions.standard.dir_mode, "775");
        assert_eq!(defaults.permissions.standard.file_mode, "664");
        assert_eq!(defaults.permissions.strict.dir_mode, "550");
        assert_eq!(defaults.permissions.strict.file_mode, "440");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rollout.json");
        fs::write(
            &path,
            r#"{"defaults": {"branch": "main", "permissions": {"strict": {"dir_mode": "750", "file_mode": "640"}}}}"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.defaults.branch, "main");
        assert_eq!(config.defaults.projects_dir, "/var/www");
        assert_eq!(config.defaults.permissions.strict.dir_mode, "750");
        assert_eq!(config.defaults.permissions.standard.dir_mode, "775");
        assert!(config
            .defaults
            .commands
            .install_dependencies
            .starts_with("composer install"));
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rollout.json");
        fs::write(&path, "{ defaults: ").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_json");
    }

    #[test]
    fn missing_file_is_an_error_for_explicit_loads() {
        let dir = TempDir::new().unwrap();
        assert!(load_config_from(&dir.path().join("rollout.json")).is_err());
    }

    #[test]
    fn projects_dir_expands_tilde() {
        let defaults = Defaults {
            projects_dir: "~/sites".to_string(),
            ..Defaults::default()
        };
        assert!(!defaults.projects_dir().to_string_lossy().starts_with('~'));
    }
}
