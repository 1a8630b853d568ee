//! User settings persisted at `~/.launchdeck/config.yaml`.
//!
//! # Storage layout
//!
//! ```text
//! ~/.launchdeck/
//!   config.yaml   (mode 0600, directory 0700, created on first save)
//! ```
//!
//! # API pattern
//!
//! Every path-touching function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Domain;

/// Editor value meaning "hand the file to the platform opener" (`open`).
pub const SYSTEM_EDITOR: &str = "system";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything a user can tune. Missing file or missing keys fall back to
/// defaults, so a fresh install needs no config at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Editor for `edit`: `system`, an absolute path, a command line with
    /// flags, or an application name for `open -a`.
    #[serde(default = "default_editor")]
    pub editor: String,
    /// Domain listed when none is given on the command line.
    #[serde(default = "default_domain")]
    pub default_domain: Domain,
    #[serde(default)]
    pub verify: VerifySettings,
}

/// Bounds for the post-mutation verification poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifySettings {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_editor() -> String {
    SYSTEM_EDITOR.to_owned()
}
fn default_domain() -> Domain {
    Domain::GuiSession
}
fn default_attempts() -> u32 {
    8
}
fn default_initial_delay_ms() -> u64 {
    50
}
fn default_max_delay_ms() -> u64 {
    800
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            editor: default_editor(),
            default_domain: default_domain(),
            verify: VerifySettings::default(),
        }
    }
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.launchdeck/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".launchdeck").join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load settings, or defaults when the file does not exist.
///
/// Returns `ConfigError::Parse` (with path + line context) if the file
/// exists but is not valid YAML for [`Settings`].
pub fn load_at(home: &Path) -> Result<Settings, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save settings to `<home>/.launchdeck/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target (same filesystem — no EXDEV on macOS).
pub fn save_at(home: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let path = config_path_at(home);
    let dir = path.parent().unwrap_or(home);
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        set_dir_permissions(dir)?;
    }
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(settings: &Settings) -> Result<(), ConfigError> {
    save_at(&home()?, settings)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
