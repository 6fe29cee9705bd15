use anyhow::{bail, Result};
use tracing::debug;

use super::{normalize_path, App};
use crate::profiles::{self, ProfileSources};

pub fn add(app: &mut App, path: &str, profile: &str) -> Result<()> {
    if path.trim().is_empty() {
        bail!("A destination path is required.");
    }
    if profile.trim().is_empty() {
        bail!("A profile name is required.");
    }
    warn_if_unknown_profile(profile);

    let path = normalize_path(path)?;
    let previous = app.settings.mappings().get(&path).cloned();
    app.settings.add_mapping(path.clone(), profile);
    app.save()?;
    app.audit()
        .append(&format!("mapping added: {} -> {}", path, profile));

    match previous {
        Some(old) if old != profile => println!("Remapped {} from '{}' to '{}'.", path, old, profile),
        _ => println!("Mapped {} -> {}.", path, profile),
    }
    Ok(())
}

pub fn remove(app: &mut App, path: &str) -> Result<()> {
    let normalized = normalize_path(path)?;
    // Accept the path exactly as stored too, for mappings made from elsewhere.
    let removed = app.settings.remove_mapping(&normalized) || app.settings.remove_mapping(path);
    if removed {
        app.save()?;
        app.audit().append(&format!("mapping removed: {}", normalized));
        println!("Removed mapping for {}.", normalized);
    } else {
        println!("No mapping for {}.", normalized);
    }
    Ok(())
}

/// Mapping an unknown profile is allowed (it may be created later), but say so.
pub(crate) fn warn_if_unknown_profile(profile: &str) {
    match profiles::list_profiles(&ProfileSources::from_env()) {
        Ok(known) if !known.is_empty() && !known.iter().any(|p| p == profile) => {
            println!(
                "Warning: profile '{}' is not in your AWS config. Run `credsync profiles` to see available ones.",
                profile
            );
        }
        Ok(_) => {}
        Err(e) => debug!(error = %e, "could not read AWS profiles"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn app(dir: &TempDir) -> App {
        App::load_from(dir.path().join("settings.json")).unwrap()
    }

    #[test]
    fn test_add_persists_absolute_path() {
        let dir = TempDir::new().unwrap();
        let env_path = dir.path().join("app.env");
        let mut app = app(&dir);

        add(&mut app, env_path.to_str().unwrap(), "production").unwrap();

        let reloaded = App::load_from(dir.path().join("settings.json")).unwrap();
        assert_eq!(
            reloaded.settings.mappings().get(env_path.to_str().unwrap()),
            Some(&"production".to_string())
        );
    }

    #[test]
    fn test_add_then_remove() {
        let dir = TempDir::new().unwrap();
        let env_path = dir.path().join("app.env");
        let mut app = app(&dir);

        add(&mut app, env_path.to_str().unwrap(), "dev").unwrap();
        remove(&mut app, env_path.to_str().unwrap()).unwrap();
        assert!(app.settings.mappings().is_empty());
    }

    #[test]
    fn test_add_rejects_empty_profile() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        assert!(add(&mut app, "app.env", " ").is_err());
    }
}
