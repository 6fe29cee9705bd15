use std::path::PathBuf;

use anyhow::Result;
use tracing::warn;

use super::{normalize_path, App};
use crate::config::Settings;
use crate::provider::AwsCliProvider;
use crate::remote::{EnvironmentApi, HttpEnvironmentClient};
use crate::sync::{Destination, SyncEngine, SyncReport, SyncTarget};

/// Sync every mapping, or only those selected by `target`, and print the report.
pub fn run(app: &mut App, target: Option<&str>) -> Result<()> {
    let targets = select_targets(&app.settings, target);
    if targets.is_empty() {
        match target {
            Some(t) => println!("No mapping matches '{}'.", t),
            None => println!("{}", SyncReport::NothingToDo),
        }
        return Ok(());
    }

    let provider = AwsCliProvider::from_env();
    let client = remote_client(app, &targets);
    let audit = app.audit();
    let engine = SyncEngine::new(
        &provider,
        client.as_ref().map(|c| c as &dyn EnvironmentApi),
        &audit,
    );

    let report = engine.sync(&targets);
    println!("{}", report);

    cache_display_names(app, &report);
    Ok(())
}

/// Resolve a sync target: all mappings, one file, one remote environment,
/// or every destination mapped to a profile, in that order of precedence.
pub fn select_targets(settings: &Settings, target: Option<&str>) -> Vec<SyncTarget> {
    let all = all_targets(settings);
    let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) else {
        return all;
    };

    let file_key = normalize_path(target).ok();
    for key in [Some(target.to_string()), file_key].into_iter().flatten() {
        if let Some(profile) = settings.mappings().get(&key) {
            return vec![SyncTarget::new(
                Destination::File(PathBuf::from(key)),
                profile.clone(),
            )];
        }
    }

    if let Some(mapping) = settings.remote_mappings().get(target) {
        return vec![SyncTarget::new(
            Destination::Remote {
                id: target.to_string(),
                display_name: mapping.display_name.clone(),
            },
            mapping.profile.clone(),
        )];
    }

    all.into_iter().filter(|t| t.profile == target).collect()
}

fn all_targets(settings: &Settings) -> Vec<SyncTarget> {
    let files = settings
        .mappings()
        .iter()
        .map(|(path, profile)| SyncTarget::new(Destination::File(PathBuf::from(path)), profile.clone()));
    let remotes = settings.remote_mappings().iter().map(|(id, mapping)| {
        SyncTarget::new(
            Destination::Remote {
                id: id.clone(),
                display_name: mapping.display_name.clone(),
            },
            mapping.profile.clone(),
        )
    });
    files.chain(remotes).collect()
}

/// Only build an HTTP client when a remote destination is in play. Without
/// one, remote destinations fail individually with a clear reason.
fn remote_client(app: &App, targets: &[SyncTarget]) -> Option<HttpEnvironmentClient> {
    let needs_remote = targets
        .iter()
        .any(|t| matches!(t.destination, Destination::Remote { .. }));
    if !needs_remote {
        return None;
    }
    match app.api_client() {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(error = %e, "remote destinations will be skipped");
            None
        }
    }
}

/// Remember names the remote API reported. Best-effort.
fn cache_display_names(app: &mut App, report: &SyncReport) {
    let mut changed = false;
    for result in report.results() {
        if let Destination::Remote {
            id,
            display_name: Some(name),
        } = &result.destination
        {
            let current = app
                .settings
                .remote_mappings()
                .get(id)
                .and_then(|m| m.display_name.as_deref());
            if current != Some(name.as_str()) {
                changed |= app.settings.update_remote_mapping_name(id, name.clone());
            }
        }
    }
    if changed {
        if let Err(e) = app.save() {
            warn!(error = %e, "could not cache remote environment names");
        }
    }
}
