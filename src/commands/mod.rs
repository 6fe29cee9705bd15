pub mod config;
pub mod list;
pub mod map;
pub mod profiles;
pub mod remote;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::audit::AuditLog;
use crate::config::{self as settings_store, Settings};
use crate::error::CredsyncError;
use crate::remote::{ApiConfig, HttpEnvironmentClient};

/// Loaded settings plus where they live. Built once per process and handed to
/// every command, in one-shot mode and in the REPL alike.
pub struct App {
    pub settings_path: PathBuf,
    pub settings: Settings,
}

impl App {
    pub fn load() -> Result<Self> {
        let settings_path = settings_store::settings_path()?;
        Self::load_from(settings_path)
    }

    pub fn load_from(settings_path: PathBuf) -> Result<Self> {
        let settings = Settings::load(&settings_path)
            .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
        Ok(Self {
            settings_path,
            settings,
        })
    }

    pub fn save(&self) -> Result<()> {
        self.settings
            .save(&self.settings_path)
            .context("Failed to save settings")
    }

    pub fn data_dir(&self) -> PathBuf {
        settings_store::data_dir(&self.settings_path)
    }

    pub fn audit(&self) -> AuditLog {
        AuditLog::new(
            self.settings.logging_enabled(),
            self.settings.log_file(&self.data_dir()),
        )
    }

    pub fn api_config(&self) -> std::result::Result<ApiConfig, CredsyncError> {
        ApiConfig::new(
            self.settings.api_base_url.as_deref(),
            self.settings.api_key.as_deref(),
        )
    }

    pub fn api_client(&self) -> Result<HttpEnvironmentClient> {
        let client = HttpEnvironmentClient::new(self.api_config()?)
            .context("Failed to build HTTP client")?;
        Ok(client)
    }
}

/// Normalize a user-supplied destination path to the absolute form mappings are stored under.
pub fn normalize_path(input: &str) -> Result<String> {
    let absolute = std::path::absolute(Path::new(input))
        .with_context(|| format!("Invalid path: {}", input))?;
    Ok(absolute.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_path_makes_relative_absolute() {
        let normalized = normalize_path("app.env").unwrap();
        assert!(Path::new(&normalized).is_absolute());
        assert!(normalized.ends_with("app.env"));
    }

    #[test]
    fn test_app_load_from_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let app = App::load_from(dir.path().join("settings.json")).unwrap();
        assert!(app.settings.mappings().is_empty());
        assert!(!app.audit().is_enabled());
        assert_eq!(app.data_dir(), dir.path());
    }

    #[test]
    fn test_api_config_without_key_is_error() {
        let dir = TempDir::new().unwrap();
        let app = App::load_from(dir.path().join("settings.json")).unwrap();
        assert!(matches!(app.api_config(), Err(CredsyncError::ApiKeyMissing)));
    }
}
