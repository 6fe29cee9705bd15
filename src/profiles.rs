use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

const CONFIG_ENV: &str = "AWS_CONFIG_FILE";
const CREDENTIALS_ENV: &str = "AWS_SHARED_CREDENTIALS_FILE";

/// Locations of the two AWS files profile names are read from. `None` when
/// neither an override nor a home directory gives a location.
#[derive(Debug, Clone)]
pub struct ProfileSources {
    pub config: Option<PathBuf>,
    pub credentials: Option<PathBuf>,
}

impl ProfileSources {
    /// Honour `AWS_CONFIG_FILE` / `AWS_SHARED_CREDENTIALS_FILE`, else `~/.aws/`.
    pub fn from_env() -> Self {
        let from_var = |var: &str| {
            std::env::var_os(var)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self::resolve(
            dirs::home_dir().as_deref(),
            from_var(CONFIG_ENV),
            from_var(CREDENTIALS_ENV),
        )
    }

    fn resolve(
        home: Option<&Path>,
        config: Option<PathBuf>,
        credentials: Option<PathBuf>,
    ) -> Self {
        let aws_dir = home.map(|h| h.join(".aws"));
        if aws_dir.is_none() {
            debug!("no home directory, only explicit AWS file overrides are read");
        }
        let default = |name: &str| aws_dir.as_ref().map(|d| d.join(name));
        Self {
            config: config.or_else(|| default("config")),
            credentials: credentials.or_else(|| default("credentials")),
        }
    }
}

/// Sorted, deduplicated profile names from both files. Missing files are skipped.
pub fn list_profiles(sources: &ProfileSources) -> Result<Vec<String>> {
    let mut names = BTreeSet::new();
    for path in [&sources.config, &sources.credentials].into_iter().flatten() {
        if let Some(content) = read_optional(path)? {
            names.extend(section_profiles(&content));
        }
    }
    Ok(names.into_iter().collect())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Profile names from `[name]` / `[profile name]` headers.
fn section_profiles(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let inner = line.strip_prefix('[')?.strip_suffix(']')?.trim();
            let mut words = inner.split_whitespace();
            let first = words.next()?;
            let name = match (first, words.next()) {
                ("profile", Some(name)) => name,
                ("sso-session" | "services", Some(_)) => return None,
                (name, None) => name,
                _ => return None,
            };
            Some(name.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_section_profiles_handles_both_header_styles() {
        let content = "[default]\nregion = us-east-1\n\n[profile prod]\nsso_session = corp\n[sso-session corp]\nsso_region = us-east-1\n[services local]\n";
        assert_eq!(section_profiles(content), vec!["default", "prod"]);
    }

    #[test]
    fn test_section_profiles_ignores_non_headers() {
        let content = "# [commented]\nkey = [not a header\n  [ dev ]  \n";
        assert_eq!(section_profiles(content), vec!["dev"]);
    }

    #[test]
    fn test_list_profiles_merges_sorts_and_dedupes() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config");
        let credentials = dir.path().join("credentials");
        std::fs::write(&config, "[profile staging]\n[default]\n[profile prod]\n").unwrap();
        std::fs::write(&credentials, "[default]\n[legacy]\n").unwrap();

        let profiles = list_profiles(&ProfileSources {
            config: Some(config),
            credentials: Some(credentials),
        })
        .unwrap();
        assert_eq!(profiles, vec!["default", "legacy", "prod", "staging"]);
    }

    #[test]
    fn test_list_profiles_missing_files_is_empty() {
        let dir = TempDir::new().unwrap();
        let profiles = list_profiles(&ProfileSources {
            config: Some(dir.path().join("nope")),
            credentials: Some(dir.path().join("nope2")),
        })
        .unwrap();
        assert!(profiles.is_empty());
    }

    #[test]
    fn test_no_home_directory_reads_only_overrides() {
        let sources = ProfileSources::resolve(None, None, None);
        assert!(sources.config.is_none());
        assert!(sources.credentials.is_none());
        assert!(list_profiles(&sources).unwrap().is_empty());

        let sources = ProfileSources::resolve(None, Some(PathBuf::from("/etc/aws-config")), None);
        assert_eq!(sources.config, Some(PathBuf::from("/etc/aws-config")));
        assert!(sources.credentials.is_none());
    }

    #[test]
    fn test_home_directory_defaults() {
        let sources = ProfileSources::resolve(Some(Path::new("/home/dev")), None, None);
        assert_eq!(sources.config, Some(PathBuf::from("/home/dev/.aws/config")));
        assert_eq!(
            sources.credentials,
            Some(PathBuf::from("/home/dev/.aws/credentials"))
        );
    }
}
