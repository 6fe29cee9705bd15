//! Credential provider adapter backed by the AWS CLI.
//!
//! Credentials are exported with `aws configure export-credentials`. When the
//! CLI reports an expired SSO session, `aws sso login` is run interactively
//! and the export is retried exactly once.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::credentials::CredentialSet;
use crate::error::{CredsyncError, Result};

const DEFAULT_PROGRAM: &str = "aws";
const PROGRAM_ENV: &str = "CREDSYNC_AWS_BIN";

/// Phrases in provider output that mean the session needs an interactive login.
const SESSION_EXPIRY_PHRASES: &[&str] = &[
    "token has expired",
    "token expired",
    "expiredtoken",
    "refresh failed",
    "sso session",
    "sso",
];

/// Source of credentials for a named profile.
pub trait CredentialProvider {
    fn fetch(&self, profile: &str) -> Result<CredentialSet>;

    /// Best-effort reachability check. Never fails, returns false instead.
    fn is_available(&self) -> bool;
}

/// Captured result of a non-interactive provider invocation.
#[derive(Debug, Default)]
pub struct Captured {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Runs the provider binary. Split out so the retry flow can be driven by a
/// scripted runner in tests.
pub trait CommandRunner {
    /// Run with captured output. `Err` means the program could not be started.
    fn capture(&self, args: &[&str]) -> std::io::Result<Captured>;

    /// Run attached to the user's terminal. Returns whether it exited successfully.
    fn interactive(&self, args: &[&str]) -> std::io::Result<bool>;
}

/// Runs a real program on `PATH` (or at an explicit path).
#[derive(Debug, Clone)]
pub struct SystemRunner {
    program: PathBuf,
}

impl SystemRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `$CREDSYNC_AWS_BIN` if set, otherwise `aws`.
    pub fn from_env() -> Self {
        let program = std::env::var_os(PROGRAM_ENV)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM));
        Self::new(program)
    }
}

impl CommandRunner for SystemRunner {
    fn capture(&self, args: &[&str]) -> std::io::Result<Captured> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        Ok(Captured {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn interactive(&self, args: &[&str]) -> std::io::Result<bool> {
        let status = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        Ok(status.success())
    }
}

/// JSON emitted by `aws configure export-credentials --format process`.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProcessCredentials {
    #[serde(default)]
    access_key_id: Option<String>,
    #[serde(default)]
    secret_access_key: Option<String>,
    #[serde(default)]
    session_token: Option<String>,
    #[serde(default)]
    expiration: Option<String>,
}

impl Drop for ProcessCredentials {
    fn drop(&mut self) {
        self.access_key_id.zeroize();
        self.secret_access_key.zeroize();
        self.session_token.zeroize();
    }
}

/// True when provider output indicates the session must be re-established
/// interactively. Case-insensitive substring match.
pub fn is_session_expired(output: &str) -> bool {
    let lower = output.to_lowercase();
    SESSION_EXPIRY_PHRASES
        .iter()
        .any(|phrase| lower.contains(phrase))
}

pub struct AwsCliProvider<R = SystemRunner> {
    runner: R,
}

impl AwsCliProvider<SystemRunner> {
    pub fn from_env() -> Self {
        Self::new(SystemRunner::from_env())
    }
}

impl<R: CommandRunner> AwsCliProvider<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn fetch_attempt(&self, profile: &str, allow_reauth: bool) -> Result<CredentialSet> {
        let args = [
            "configure",
            "export-credentials",
            "--profile",
            profile,
            "--format",
            "process",
        ];
        let mut captured = self.runner.capture(&args).map_err(|e| unavailable(&e))?;

        if captured.success {
            let parsed = parse_credentials(profile, &captured.stdout);
            captured.stdout.zeroize();
            return parsed;
        }

        let stdout = String::from_utf8_lossy(&captured.stdout).into_owned();
        captured.stdout.zeroize();
        let detail = failure_detail(&captured.stderr, &stdout);

        if allow_reauth && is_session_expired(&format!("{}\n{}", captured.stderr, stdout)) {
            info!(profile, "SSO session expired, starting interactive login");
            self.reauthenticate(profile)?;
            return self.fetch_attempt(profile, false);
        }

        Err(CredsyncError::ProfileFetch {
            profile: profile.to_string(),
            detail,
        })
    }

    fn reauthenticate(&self, profile: &str) -> Result<()> {
        println!("Session for profile '{}' has expired. Logging in...", profile);
        match self.runner.interactive(&["sso", "login", "--profile", profile]) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CredsyncError::ReauthenticationFailed {
                profile: profile.to_string(),
                detail: "login exited with an error".into(),
            }),
            Err(e) => Err(CredsyncError::ReauthenticationFailed {
                profile: profile.to_string(),
                detail: e.to_string(),
            }),
        }
    }
}

impl<R: CommandRunner> CredentialProvider for AwsCliProvider<R> {
    fn fetch(&self, profile: &str) -> Result<CredentialSet> {
        debug!(profile, "fetching credentials");
        self.fetch_attempt(profile, true)
    }

    fn is_available(&self) -> bool {
        match self.runner.capture(&["--version"]) {
            Ok(captured) => captured.success,
            Err(e) => {
                warn!(error = %e, "credential provider could not be started");
                false
            }
        }
    }
}

fn unavailable(e: &std::io::Error) -> CredsyncError {
    match e.kind() {
        ErrorKind::NotFound => CredsyncError::ProviderUnavailable("executable not found".into()),
        _ => CredsyncError::ProviderUnavailable(e.to_string()),
    }
}

fn failure_detail(stderr: &str, stdout: &str) -> String {
    let detail = if stderr.trim().is_empty() {
        stdout.trim()
    } else {
        stderr.trim()
    };
    if detail.is_empty() {
        "provider exited with an error".into()
    } else {
        detail.to_string()
    }
}

fn parse_credentials(profile: &str, stdout: &[u8]) -> Result<CredentialSet> {
    let invalid = |detail: String| CredsyncError::InvalidCredentialFormat {
        profile: profile.to_string(),
        detail,
    };

    let parsed: ProcessCredentials =
        serde_json::from_slice(stdout).map_err(|e| invalid(e.to_string()))?;

    let access_key_id = parsed
        .access_key_id
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| invalid("missing AccessKeyId".into()))?;
    let secret_access_key = parsed
        .secret_access_key
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| invalid("missing SecretAccessKey".into()))?;

    Ok(CredentialSet::from_aws(
        access_key_id,
        secret_access_key,
        parsed.session_token.as_deref(),
        parsed.expiration.as_deref(),
    ))
}
