use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::CredentialArgs;
use crate::otter::DEFAULT_BASE_URL;

#[derive(Parser, Debug)]
#[command(
    name = "transcribe",
    about = "Otter Transcribe - Upload an audio file to Otter.ai and print the transcript URL",
    version,
    long_about = "Uploads an audio file to Otter.ai for transcription. Credentials are taken from -u/-p, \
the OTTER_USERNAME and OTTER_PASSWORD environment variables, a config file, or an interactive prompt, \
in that order."
)]
pub struct Cli {
    /// Audio file to upload
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Username for otter.ai
    #[arg(short, long)]
    pub username: Option<String>,

    /// Password for otter.ai
    #[arg(short, long)]
    pub password: Option<String>,

    /// Path to a custom config file (defaults to the user config directory)
    #[arg(short, long, value_name = "PATH", env = "TRANSCRIBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the credentials to the config file after a successful login
    #[arg(short, long)]
    pub write_config: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Timeout in seconds for Otter API calls; uploads get extra time per byte
    #[arg(long, value_name = "SECS", default_value = "120")]
    pub timeout: u64,

    /// Otter service root
    #[arg(long, value_name = "URL", env = "OTTER_BASE_URL", default_value = DEFAULT_BASE_URL, hide = true)]
    pub base_url: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    pub fn credential_args(&self) -> CredentialArgs<'_> {
        CredentialArgs {
            username: self.username.as_deref(),
            password: self.password.as_deref(),
            config_path: self.config.as_deref(),
        }
    }
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// The transcript URL only
    Text,
    /// URL and transcript record as JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
