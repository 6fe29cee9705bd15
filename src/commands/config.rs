use std::path::PathBuf;

use anyhow::{Context, Result};

use super::App;

/// Set the remote API key, prompting without echo when not given.
pub fn api_key(app: &mut App, key: Option<String>) -> Result<()> {
    let key = match key {
        Some(key) => key,
        None => rpassword::prompt_password("API key: ").context("Failed to read API key")?,
    };
    let key = key.trim().to_string();
    if key.is_empty() {
        app.settings.api_key = None;
        app.save()?;
        println!("API key cleared.");
    } else {
        app.settings.api_key = Some(key);
        app.save()?;
        println!("API key saved.");
    }
    Ok(())
}

pub fn logging(app: &mut App, enabled: bool, file: Option<PathBuf>) -> Result<()> {
    app.settings.logging.enabled = enabled;
    if let Some(file) = file {
        app.settings.logging.file = Some(file);
    }
    app.save()?;
    if enabled {
        let path = app.settings.log_file(&app.data_dir());
        app.audit().append("audit logging enabled");
        println!("Audit logging enabled: {}", path.display());
    } else {
        println!("Audit logging disabled.");
    }
    Ok(())
}

pub fn show(app: &App) -> Result<()> {
    let settings = &app.settings;
    println!("Settings file:  {}", app.settings_path.display());
    println!(
        "API key:        {}",
        if settings.api_key.is_some() { "set" } else { "not set" }
    );
    println!(
        "API base URL:   {}",
        settings
            .api_base_url
            .as_deref()
            .unwrap_or(crate::remote::client::DEFAULT_BASE_URL)
    );
    println!(
        "Audit logging:  {} ({})",
        if settings.logging_enabled() { "on" } else { "off" },
        settings.log_file(&app.data_dir()).display()
    );
    println!("File mappings:  {}", settings.mappings().len());
    println!("Remote mappings: {}", settings.remote_mappings().len());
    Ok(())
}
