use anyhow::{Context, Result};

use crate::profiles::{self, ProfileSources};

pub fn run() -> Result<()> {
    let names = profiles::list_profiles(&ProfileSources::from_env())
        .context("Failed to read AWS profiles")?;
    if names.is_empty() {
        println!("No AWS profiles found. Configure one with: aws configure sso");
    } else {
        for name in &names {
            println!("{}", name);
        }
    }
    Ok(())
}
