use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::defaults::PermissionModes;
use crate::deploy::DeployContext;
use crate::error::{Error, Result};
use crate::log_status;
use crate::utils::shell;

/// Resolved modes and owner applied to a build directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionScheme {
    pub dir_mode: String,
    pub file_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Optional permission values from the manifest or the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl PermissionOverrides {
    /// Layer `higher` over `self`; set values in `higher` win.
    pub fn merge(self, higher: PermissionOverrides) -> Self {
        Self {
            directory: higher.directory.or(self.directory),
            file: higher.file.or(self.file),
            owner: higher.owner.or(self.owner),
        }
    }

    /// Check every set value; `source` prefixes the reported key.
    pub fn validate(&self, source: &str) -> Result<()> {
        if let Some(mode) = &self.directory {
            validate_mode(&format!("{}.directory", source), mode)?;
        }
        if let Some(mode) = &self.file {
            validate_mode(&format!("{}.file", source), mode)?;
        }
        if let Some(owner) = &self.owner {
            validate_owner(&format!("{}.owner", source), owner)?;
        }
        Ok(())
    }

    pub fn resolve(&self, defaults: &PermissionModes) -> PermissionScheme {
        PermissionScheme {
            dir_mode: self
                .directory
                .clone()
                .unwrap_or_else(|| defaults.dir_mode.clone()),
            file_mode: self
                .file
                .clone()
                .unwrap_or_else(|| defaults.file_mode.clone()),
            owner: self.owner.clone().filter(|o| !o.is_empty()),
        }
    }
}

fn octal_mode() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-7]{3,4}$").expect("Invalid regex pattern"))
}

fn symbolic_mode() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[ugoa]*[-+=][rwxXst]*(,[ugoa]*[-+=][rwxXst]*)*$")
            .expect("Invalid regex pattern")
    })
}

fn owner_spec() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._][A-Za-z0-9._-]*(:[A-Za-z0-9._][A-Za-z0-9._-]*)?$")
            .expect("Invalid regex pattern")
    })
}

/// Accept octal (`775`, `0640`) or symbolic (`u+rwX,g-w`) chmod modes.
pub fn validate_mode(key: &str, mode: &str) -> Result<()> {
    if octal_mode().is_match(mode) || symbolic_mode().is_match(mode) {
        return Ok(());
    }
    Err(Error::config_invalid_value(
        key,
        Some(mode.to_string()),
        "Expected an octal mode such as 775 or a symbolic mode such as u+rwX",
    ))
}

/// Accept `user` or `user:group`.
pub fn validate_owner(key: &str, owner: &str) -> Result<()> {
    if owner_spec().is_match(owner) {
        return Ok(());
    }
    Err(Error::config_invalid_value(
        key,
        Some(owner.to_string()),
        "Expected 'user' or 'user:group'",
    ))
}

impl PermissionScheme {
    /// Commands that apply this scheme to `path`.
    ///
    /// `find` does not follow symlinks, so linked shared resources keep their
    /// own permissions.
    pub fn commands(&self, path: &Path) -> Vec<String> {
        let quoted = shell::quote_path(path);
        let mut commands = vec![
            format!(
                "find {} -type d -exec chmod {} {{}} +",
                quoted,
                shell::quote_arg(&self.dir_mode)
            ),
            format!(
                "find {} -type f -exec chmod {} {{}} +",
                quoted,
                shell::quote_arg(&self.file_mode)
            ),
        ];
        if let Some(owner) = &self.owner {
            commands.push(format!("chown -hR {} {}", shell::quote_arg(owner), quoted));
        }
        commands
    }

    /// Apply to the context's build directory; the first failure is fatal.
    pub fn apply(&self, ctx: &DeployContext) -> Result<()> {
        log_status!(
            "permissions",
            "Applying {}/{} to {}",
            self.dir_mode,
            self.file_mode,
            ctx.build_path().display()
        );

        for command in self.commands(ctx.build_path()) {
            let output = ctx.run(&command);
            if !output.success {
                let stderr = output.stderr.trim();
                return Err(Error::deploy_permissions_failed(format!(
                    "{} exited with {}{}",
                    command,
                    output.exit_code,
                    if stderr.is_empty() {
                        String::new()
                    } else {
                        format!(": {}", stderr)
                    }
                )));
            }
        }
        Ok(())
    }
}
