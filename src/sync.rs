//! Batch credential sync.
//!
//! Destinations are grouped by profile so each profile's credentials are
//! fetched once per run. Every destination gets its own outcome; a failure in
//! one profile or one destination never stops the rest of the batch.

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::credentials::CredentialSet;
use crate::env_file;
use crate::error::CredsyncError;
use crate::provider::CredentialProvider;
use crate::remote::{self, EnvironmentApi};

/// Where credentials get written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A local `KEY=VALUE` file.
    File(PathBuf),
    /// A remote environment, with its last known name.
    Remote {
        id: String,
        display_name: Option<String>,
    },
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::File(path) => write!(f, "{}", path.display()),
            Destination::Remote {
                id,
                display_name: Some(name),
            } => write!(f, "{} [{}]", name, id),
            Destination::Remote { id, .. } => write!(f, "remote:{}", id),
        }
    }
}

/// A destination paired with the profile it is mapped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub destination: Destination,
    pub profile: String,
}

impl SyncTarget {
    pub fn new(destination: Destination, profile: impl Into<String>) -> Self {
        Self {
            destination,
            profile: profile.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Updated,
    Unchanged,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationReport {
    pub destination: Destination,
    pub profile: String,
    pub outcome: SyncOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncReport {
    /// No mappings were configured, or none matched.
    NothingToDo,
    /// The credential provider could not be reached; nothing was attempted.
    ProviderUnavailable(String),
    Completed(Vec<DestinationReport>),
}

impl SyncReport {
    pub fn results(&self) -> &[DestinationReport] {
        match self {
            SyncReport::Completed(results) => results,
            _ => &[],
        }
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for result in self.results() {
            match result.outcome {
                SyncOutcome::Updated => tally.updated += 1,
                SyncOutcome::Unchanged => tally.unchanged += 1,
                SyncOutcome::Failed(_) => tally.failed += 1,
            }
        }
        tally
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated, {} unchanged, {} failed",
            self.updated, self.unchanged, self.failed
        )
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncReport::NothingToDo => {
                write!(f, "No mappings configured. Add one with: credsync add <path> <profile>")
            }
            SyncReport::ProviderUnavailable(reason) => {
                write!(f, "Sync aborted, nothing was changed: {}", reason)
            }
            SyncReport::Completed(results) => {
                for result in results {
                    let (mark, status) = match &result.outcome {
                        SyncOutcome::Updated => ("+", "updated".to_string()),
                        SyncOutcome::Unchanged => ("=", "unchanged".to_string()),
                        SyncOutcome::Failed(reason) => ("!", format!("failed: {}", reason)),
                    };
                    writeln!(
                        f,
                        "  {} {} ({}): {}",
                        mark, result.destination, result.profile, status
                    )?;
                }
                write!(f, "{}", self.tally())
            }
        }
    }
}

/// Group targets by profile. Profiles keep the order of their first
/// appearance and destinations keep their order within a profile.
pub fn group_by_profile(targets: &[SyncTarget]) -> IndexMap<&str, Vec<&Destination>> {
    let mut groups: IndexMap<&str, Vec<&Destination>> = IndexMap::new();
    for target in targets {
        groups
            .entry(target.profile.as_str())
            .or_default()
            .push(&target.destination);
    }
    groups
}

/// Runs a sync over a set of targets. Strictly sequential: a profile fetch may
/// take over the terminal for an interactive login.
pub struct SyncEngine<'a> {
    provider: &'a dyn CredentialProvider,
    remote: Option<&'a dyn EnvironmentApi>,
    audit: &'a AuditLog,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        provider: &'a dyn CredentialProvider,
        remote: Option<&'a dyn EnvironmentApi>,
        audit: &'a AuditLog,
    ) -> Self {
        Self {
            provider,
            remote,
            audit,
        }
    }

    pub fn sync(&self, targets: &[SyncTarget]) -> SyncReport {
        if targets.is_empty() {
            return SyncReport::NothingToDo;
        }

        if !self.provider.is_available() {
            let reason = CredsyncError::ProviderUnavailable("version check failed".into());
            self.audit.append(&format!("sync aborted: {}", reason));
            return SyncReport::ProviderUnavailable(reason.to_string());
        }

        let groups = group_by_profile(targets);
        info!(
            profiles = groups.len(),
            destinations = targets.len(),
            "starting sync"
        );

        let mut results = Vec::with_capacity(targets.len());
        for (profile, destinations) in groups {
            match self.provider.fetch(profile) {
                Ok(credentials) => {
                    for destination in destinations {
                        results.push(self.sync_destination(profile, destination, &credentials));
                    }
                }
                Err(e) => {
                    warn!(profile, error = %e, "credential fetch failed");
                    self.audit
                        .append(&format!("profile {}: fetch failed: {}", profile, e));
                    let reason = e.to_string();
                    results.extend(destinations.into_iter().map(|d| DestinationReport {
                        destination: d.clone(),
                        profile: profile.to_string(),
                        outcome: SyncOutcome::Failed(reason.clone()),
                    }));
                }
            }
        }

        let report = SyncReport::Completed(results);
        self.audit.append(&format!("sync finished: {}", report.tally()));
        report
    }

    fn sync_destination(
        &self,
        profile: &str,
        destination: &Destination,
        credentials: &CredentialSet,
    ) -> DestinationReport {
        let (destination, outcome) = match destination {
            Destination::File(path) => match env_file::merge_into_file(path, credentials) {
                Ok(merge) if merge.changed => (destination.clone(), SyncOutcome::Updated),
                Ok(_) => (destination.clone(), SyncOutcome::Unchanged),
                Err(e) => (destination.clone(), SyncOutcome::Failed(e.to_string())),
            },
            Destination::Remote { id, .. } => match self.sync_remote(id, credentials) {
                Ok(display_name) => (
                    Destination::Remote {
                        id: id.clone(),
                        display_name: Some(display_name),
                    },
                    SyncOutcome::Updated,
                ),
                Err(e) => (destination.clone(), SyncOutcome::Failed(e.to_string())),
            },
        };

        let status = match &outcome {
            SyncOutcome::Updated => "updated".to_string(),
            SyncOutcome::Unchanged => "unchanged".to_string(),
            SyncOutcome::Failed(reason) => format!("failed: {}", reason),
        };
        self.audit
            .append(&format!("{} <- {}: {}", destination, profile, status));

        DestinationReport {
            destination,
            profile: profile.to_string(),
            outcome,
        }
    }

    fn sync_remote(
        &self,
        id: &str,
        credentials: &CredentialSet,
    ) -> Result<String, CredsyncError> {
        let api = self.remote.ok_or(CredsyncError::ApiKeyMissing)?;
        Ok(remote::merge_remote(api, id, credentials)?.display_name)
    }
}
