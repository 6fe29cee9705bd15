use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "credsync",
    about = "Keep AWS credentials in .env files and remote environments up to date.",
    version
)]
pub struct Cli {
    /// Print debug diagnostics to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run once. Without one, an interactive shell starts.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List AWS profiles found in ~/.aws/config and ~/.aws/credentials.
    Profiles,

    /// Show all destination mappings.
    List,

    /// Map a .env file to a profile (replaces any existing mapping).
    Add {
        /// Path to the .env file. Created on first sync if missing.
        path: String,
        /// AWS profile name.
        profile: String,
    },

    /// Remove a file mapping.
    Remove {
        /// Path to the .env file.
        path: String,
    },

    /// Manage remote environment mappings.
    #[command(subcommand)]
    Remote(RemoteCommand),

    /// Refresh credentials in mapped destinations.
    Sync {
        /// A mapped file path, a remote environment ID, or a profile name.
        /// Omit to sync everything.
        target: Option<String>,
    },

    /// View or change settings.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Start the interactive shell.
    Repl,
}

#[derive(Subcommand, Debug)]
pub enum RemoteCommand {
    /// List environments available through the API.
    List,

    /// Map a remote environment to a profile.
    Add {
        /// Remote environment ID.
        id: String,
        /// AWS profile name.
        profile: String,
    },

    /// Remove a remote environment mapping.
    Remove {
        /// Remote environment ID.
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set the remote API key (prompted when omitted, empty clears it).
    ApiKey { key: Option<String> },

    /// Turn the audit log on or off.
    Logging {
        #[arg(value_parser = ["on", "off"])]
        state: String,
        /// Log file path.
        file: Option<PathBuf>,
    },

    /// Print current settings.
    Show,
}
