use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CredsyncError, Result};

const CONFIG_DIR: &str = "credsync";
const SETTINGS_FILE: &str = "settings.json";
const LOG_FILE: &str = "credsync.log";
const HISTORY_FILE: &str = "history";
const CONFIG_ENV: &str = "CREDSYNC_CONFIG";

/// A remote environment mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMapping {
    pub profile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Audit log path; the config directory's `credsync.log` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Everything credsync persists between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// File path to profile name.
    #[serde(default)]
    pub mappings: IndexMap<String, String>,
    /// Remote environment ID to mapping.
    #[serde(default)]
    pub remote_mappings: IndexMap<String, RemoteMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings, or defaults if the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&raw)
            .map_err(|e| CredsyncError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write settings atomically, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| CredsyncError::Serialization(e.to_string()))?;

        let tmp_path = parent.join(format!(".settings.tmp.{}", rand::random::<u64>()));
        {
            let mut tmp = std::fs::File::create(&tmp_path)?;
            tmp.write_all(raw.as_bytes())?;
            tmp.write_all(b"\n")?;
            tmp.sync_all()?;
        }
        restrict_permissions(&tmp_path);
        if let Err(e) = std::fs::rename(&tmp_path, path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn mappings(&self) -> &IndexMap<String, String> {
        &self.mappings
    }

    /// Map `path` to `profile`, replacing any previous profile for that path.
    pub fn add_mapping(&mut self, path: impl Into<String>, profile: impl Into<String>) {
        self.mappings.insert(path.into(), profile.into());
    }

    pub fn remove_mapping(&mut self, path: &str) -> bool {
        self.mappings.shift_remove(path).is_some()
    }

    pub fn remote_mappings(&self) -> &IndexMap<String, RemoteMapping> {
        &self.remote_mappings
    }

    pub fn add_remote_mapping(
        &mut self,
        id: impl Into<String>,
        profile: impl Into<String>,
        display_name: Option<String>,
    ) {
        self.remote_mappings.insert(
            id.into(),
            RemoteMapping {
                profile: profile.into(),
                display_name,
            },
        );
    }

    pub fn remove_remote_mapping(&mut self, id: &str) -> bool {
        self.remote_mappings.shift_remove(id).is_some()
    }

    /// Cache a remote environment's name. Returns false if `id` is not mapped.
    pub fn update_remote_mapping_name(&mut self, id: &str, name: impl Into<String>) -> bool {
        match self.remote_mappings.get_mut(id) {
            Some(mapping) => {
                mapping.display_name = Some(name.into());
                true
            }
            None => false,
        }
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging.enabled
    }

    /// Configured audit log path, or `default_dir/credsync.log`.
    pub fn log_file(&self, default_dir: &Path) -> PathBuf {
        self.logging
            .file
            .clone()
            .unwrap_or_else(|| default_dir.join(LOG_FILE))
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        warn!(path = %path.display(), error = %e, "could not restrict settings file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

/// Returns the credsync config directory (`<config dir>/credsync`).
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join(CONFIG_DIR))
        .ok_or_else(|| CredsyncError::Config("Could not determine the config directory".into()))
}

/// Returns the settings file path: `$CREDSYNC_CONFIG`, else the config directory's `settings.json`.
pub fn settings_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(config_dir()?.join(SETTINGS_FILE))
}

/// Directory holding the settings file; default home of the log and REPL history.
pub fn data_dir(settings_path: &Path) -> PathBuf {
    settings_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn history_path(settings_path: &Path) -> PathBuf {
    data_dir(settings_path).join(HISTORY_FILE)
}
