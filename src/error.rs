use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredsyncError {
    #[error("Credential provider is not available: {0}. Is the AWS CLI installed and on PATH?")]
    ProviderUnavailable(String),

    #[error("Failed to fetch credentials for profile '{profile}': {detail}")]
    ProfileFetch { profile: String, detail: String },

    #[error("Re-authentication failed for profile '{profile}': {detail}")]
    ReauthenticationFailed { profile: String, detail: String },

    #[error("Provider returned invalid credentials for profile '{profile}': {detail}")]
    InvalidCredentialFormat { profile: String, detail: String },

    #[error("A destination file path is required.")]
    PathRequired,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("A remote environment ID is required.")]
    CollectionIdRequired,

    #[error("Remote environment '{0}' not found.")]
    CollectionNotFound(String),

    #[error("Remote API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No API key configured. Set one with: credsync config api-key")]
    ApiKeyMissing,

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, CredsyncError>;
