pub mod client;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::credentials::{CredentialSet, RESERVED_REMOTE_KEYS};
use crate::error::{CredsyncError, Result};

pub use client::{ApiConfig, HttpEnvironmentClient};

/// One key/value pair in a remote environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvEntry {
    pub key: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Fields this tool does not interpret (`type` and friends), sent back unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_enabled() -> bool {
    true
}

impl EnvEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Value::String(value.into()),
            enabled: true,
            extra: Map::new(),
        }
    }
}

/// A remote environment: a name plus its ordered entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub values: Vec<EnvEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub id: String,
    pub name: String,
}

/// Remote environment API. Commands and the sync engine only talk to this trait.
pub trait EnvironmentApi {
    fn list_collections(&self) -> Result<Vec<CollectionSummary>>;
    /// `Ok(None)` when no environment has this ID.
    fn get_collection(&self, id: &str) -> Result<Option<Collection>>;
    fn update_collection(&self, id: &str, name: &str, values: &[EnvEntry]) -> Result<Collection>;
}

/// Result of pushing credentials into a remote environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMergeResult {
    pub display_name: String,
}

/// Replace the credential entries of `existing` with those from `credentials`.
///
/// Reserved credential entries are dropped. The remaining entries are
/// deduplicated by key, keeping the last occurrence. Fresh credential entries
/// are appended at the end.
pub fn merge_entries(existing: Vec<EnvEntry>, credentials: &CredentialSet) -> Vec<EnvEntry> {
    let others: Vec<EnvEntry> = existing
        .into_iter()
        .filter(|e| !RESERVED_REMOTE_KEYS.contains(&e.key.as_str()))
        .collect();

    let keep: Vec<bool> = {
        let mut last_index: HashMap<&str, usize> = HashMap::new();
        for (i, entry) in others.iter().enumerate() {
            last_index.insert(entry.key.as_str(), i);
        }
        others
            .iter()
            .enumerate()
            .map(|(i, e)| last_index.get(e.key.as_str()) == Some(&i))
            .collect()
    };

    let mut merged: Vec<EnvEntry> = others
        .into_iter()
        .zip(keep)
        .filter_map(|(entry, keep)| keep.then_some(entry))
        .collect();

    merged.extend(
        credentials
            .remote_entries()
            .into_iter()
            .map(|(key, value)| EnvEntry::new(key, value)),
    );
    merged
}

/// Read-modify-write the remote environment `id` with fresh credentials.
/// Last writer wins: concurrent edits between the read and the write are lost.
pub fn merge_remote(
    api: &dyn EnvironmentApi,
    id: &str,
    credentials: &CredentialSet,
) -> Result<RemoteMergeResult> {
    if id.trim().is_empty() {
        return Err(CredsyncError::CollectionIdRequired);
    }

    let collection = api
        .get_collection(id)?
        .ok_or_else(|| CredsyncError::CollectionNotFound(id.to_string()))?;

    let values = merge_entries(collection.values, credentials);
    debug!(id, entries = values.len(), "updating remote environment");
    let updated = api.update_collection(id, &collection.name, &values)?;

    let display_name = if updated.name.is_empty() {
        collection.name
    } else {
        updated.name
    };
    Ok(RemoteMergeResult { display_name })
}
