use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, SecondsFormat};
use tracing::warn;

/// Append-only audit trail of sync activity. Never holds secret values.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(enabled: bool, path: PathBuf) -> Self {
        Self {
            path: enabled.then_some(path),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Append one timestamped line. Failures are reported through `tracing`
    /// and otherwise ignored.
    pub fn append(&self, message: &str) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_line(path, message) {
            warn!(path = %path.display(), error = %e, "could not write audit log");
        }
    }
}

fn append_line(path: &Path, message: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let timestamp = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
    writeln!(file, "{} {}", timestamp, message)
}
