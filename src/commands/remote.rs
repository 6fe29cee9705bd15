use anyhow::{bail, Context, Result};
use tracing::warn;

use super::map::warn_if_unknown_profile;
use super::App;
use crate::remote::EnvironmentApi;

pub fn list(app: &App) -> Result<()> {
    let client = app.api_client()?;
    let collections = client
        .list_collections()
        .context("Failed to list remote environments")?;
    if collections.is_empty() {
        println!("No remote environments found.");
        return Ok(());
    }
    for collection in &collections {
        let mapped = app
            .settings
            .remote_mappings()
            .get(&collection.id)
            .map(|m| format!(" -> {}", m.profile))
            .unwrap_or_default();
        println!("  {} [{}]{}", collection.name, collection.id, mapped);
    }
    Ok(())
}

pub fn add(app: &mut App, id: &str, profile: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("A remote environment ID is required.");
    }
    if profile.trim().is_empty() {
        bail!("A profile name is required.");
    }
    warn_if_unknown_profile(profile);

    let display_name = lookup_name(app, id);
    app.settings
        .add_remote_mapping(id, profile, display_name.clone());
    app.save()?;
    app.audit()
        .append(&format!("remote mapping added: {} -> {}", id, profile));

    println!(
        "Mapped remote environment {} -> {}.",
        display_name.as_deref().unwrap_or(id),
        profile
    );
    Ok(())
}

pub fn remove(app: &mut App, id: &str) -> Result<()> {
    if app.settings.remove_remote_mapping(id) {
        app.save()?;
        app.audit().append(&format!("remote mapping removed: {}", id));
        println!("Removed remote mapping for {}.", id);
    } else {
        println!("No remote mapping for {}.", id);
    }
    Ok(())
}

/// Best-effort name lookup; any failure just means no cached name.
fn lookup_name(app: &App, id: &str) -> Option<String> {
    let client = match app.api_client() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "skipping remote name lookup");
            return None;
        }
    };
    match client.get_collection(id) {
        Ok(Some(collection)) => Some(collection.name),
        Ok(None) => {
            println!("Warning: remote environment {} was not found. Mapping it anyway.", id);
            None
        }
        Err(e) => {
            warn!(id, error = %e, "remote name lookup failed");
            None
        }
    }
}
