use std::fmt;

use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{CredsyncError, Result};

pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const ENV_CREDENTIAL_EXPIRATION: &str = "AWS_CREDENTIAL_EXPIRATION";

pub const REMOTE_ACCESS_KEY_ID: &str = "aws_access_key_id";
pub const REMOTE_ACCESS_SECRET: &str = "aws_access_secret";
pub const REMOTE_SESSION_TOKEN: &str = "aws_session_token";

/// Keys a remote environment dedicates to credentials. Anything else in the
/// environment belongs to the user and is left alone.
pub const RESERVED_REMOTE_KEYS: [&str; 3] =
    [REMOTE_ACCESS_KEY_ID, REMOTE_ACCESS_SECRET, REMOTE_SESSION_TOKEN];

/// Credentials resolved for one profile during one sync run.
///
/// Keys keep insertion order, which is the order new lines get appended to a
/// destination file. Values are held as secrets and never show up in `Debug`.
#[derive(Default)]
pub struct CredentialSet {
    values: IndexMap<String, SecretString>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the standard AWS variable set. Optional parts are skipped when absent or empty.
    pub fn from_aws(
        access_key_id: &str,
        secret_access_key: &str,
        session_token: Option<&str>,
        expiration: Option<&str>,
    ) -> Self {
        let mut set = Self::new();
        set.insert(ENV_ACCESS_KEY_ID, access_key_id);
        set.insert(ENV_SECRET_ACCESS_KEY, secret_access_key);
        if let Some(token) = session_token.filter(|t| !t.is_empty()) {
            set.insert(ENV_SESSION_TOKEN, token);
        }
        if let Some(exp) = expiration.filter(|e| !e.is_empty()) {
            set.insert(ENV_CREDENTIAL_EXPIRATION, exp);
        }
        set
    }

    /// Insert or replace a value. Replacing keeps the key's original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .insert(key.into(), SecretString::new(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.expose_secret().as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(k, v)| (k.as_str(), v.expose_secret().as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reject keys and values that cannot be written as a single `KEY=VALUE` line.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in self.iter() {
            if key.trim().is_empty() {
                return Err(CredsyncError::InvalidCredentials("empty key".into()));
            }
            if key.contains('=') || key.contains('\n') || key.contains('\r') {
                return Err(CredsyncError::InvalidCredentials(format!(
                    "key {:?} contains '=' or a line break",
                    key
                )));
            }
            if value.contains('\n') || value.contains('\r') {
                return Err(CredsyncError::InvalidCredentials(format!(
                    "value for {} contains a line break",
                    key
                )));
            }
        }
        Ok(())
    }

    /// The reserved remote entries this set can fill, in reserved-key order.
    /// Missing or empty credentials are omitted.
    pub fn remote_entries(&self) -> Vec<(&'static str, &str)> {
        [
            (REMOTE_ACCESS_KEY_ID, ENV_ACCESS_KEY_ID),
            (REMOTE_ACCESS_SECRET, ENV_SECRET_ACCESS_KEY),
            (REMOTE_SESSION_TOKEN, ENV_SESSION_TOKEN),
        ]
        .into_iter()
        .filter_map(|(remote, env)| {
            self.get(env)
                .filter(|v| !v.is_empty())
                .map(|v| (remote, v))
        })
        .collect()
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}
