use anyhow::Result;

use super::App;

pub fn run(app: &App) -> Result<()> {
    let mappings = app.settings.mappings();
    let remote = app.settings.remote_mappings();

    if mappings.is_empty() && remote.is_empty() {
        println!("No mappings configured. Add one with: credsync add <path> <profile>");
        return Ok(());
    }

    if !mappings.is_empty() {
        println!("Files:");
        for (path, profile) in mappings {
            println!("  {} -> {}", path, profile);
        }
    }
    if !remote.is_empty() {
        println!("Remote environments:");
        for (id, mapping) in remote {
            let name = mapping.display_name.as_deref().unwrap_or(id);
            println!("  {} [{}] -> {}", name, id, mapping.profile);
        }
    }
    Ok(())
}
