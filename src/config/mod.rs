use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::otter::Credentials;

/// Environment variable holding the Otter username
pub const USERNAME_ENV: &str = "OTTER_USERNAME";

/// Environment variable holding the Otter password
pub const PASSWORD_ENV: &str = "OTTER_PASSWORD";

const CONFIG_DIR_NAME: &str = "transcribe";
const CONFIG_FILE_NAME: &str = "settings.json";

/// Where the credentials in a [`Config`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Args,
    Env,
    File,
    Prompt,
}

/// On-disk layout of the settings file
#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// Resolved credentials plus the settings file they belong to
#[derive(Clone)]
pub struct Config {
    /// Settings file path; written to by [`Config::save`]
    pub path: PathBuf,

    pub source: CredentialSource,

    pub username: String,

    pub password: String,
}

/// Credential-related command line input
#[derive(Debug, Default)]
pub struct CredentialArgs<'a> {
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub config_path: Option<&'a Path>,
}

impl Config {
    /// Resolve credentials with the standard precedence:
    /// args, then environment, then a config file, then an interactive prompt.
    pub fn resolve(args: &CredentialArgs<'_>) -> Result<Self> {
        let env_username = std::env::var(USERNAME_ENV).ok();
        let env_password = std::env::var(PASSWORD_ENV).ok();

        Self::resolve_from(
            args,
            env_username.as_deref(),
            env_password.as_deref(),
            &Self::default_path()?,
            prompt_credentials,
        )
    }

    fn resolve_from(
        args: &CredentialArgs<'_>,
        env_username: Option<&str>,
        env_password: Option<&str>,
        default_path: &Path,
        prompt: impl FnOnce() -> Result<(String, String)>,
    ) -> Result<Self> {
        if let (Some(username), Some(password)) = (non_empty(args.username), non_empty(args.password)) {
            tracing::debug!("Using credentials from command line arguments");
            return Ok(Self::new(default_path, CredentialSource::Args, username, password));
        }

        if let (Some(username), Some(password)) = (non_empty(env_username), non_empty(env_password)) {
            tracing::debug!("Using credentials from {} and {}", USERNAME_ENV, PASSWORD_ENV);
            return Ok(Self::new(default_path, CredentialSource::Env, username, password));
        }

        if let Some(path) = args.config_path {
            return Self::load(path);
        }

        match Self::load(default_path) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::debug!("No usable config file: {:#}", err);
                let (username, password) = prompt()?;
                Ok(Self::new(default_path, CredentialSource::Prompt, &username, &password))
            }
        }
    }

    fn new(path: &Path, source: CredentialSource, username: &str, password: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Load credentials from a settings file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let settings: SettingsFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        tracing::debug!("Loaded credentials from {}", path.display());
        Ok(Self::new(path, CredentialSource::File, &settings.username, &settings.password))
    }

    /// Save the credentials to [`Config::path`], readable only by the owner
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let settings = SettingsFile {
            username: self.username.clone(),
            password: self.password.clone(),
        };
        let content = serde_json::to_string_pretty(&settings)
            .context("Failed to serialize config")?;

        fs_err::write(&self.path, content)
            .context("Failed to write config file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs_err::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Credentials for login; blank values are rejected
    pub fn credentials(&self) -> Result<Credentials> {
        if self.username.is_empty() || self.password.is_empty() {
            anyhow::bail!(
                "Credentials provided are blank; edit \"{}\" or see --help for usage",
                self.path.display()
            );
        }

        Ok(Credentials::new(self.username.clone(), self.password.clone()))
    }

    /// Default settings file location
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("source", &self.source)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Ask for credentials on the terminal; the password is not echoed
fn prompt_credentials() -> Result<(String, String)> {
    let term = console::Term::stderr();

    term.write_line("Enter your otter.ai credentials:")?;
    term.write_str("Username: ")?;
    let username = term.read_line().context("Failed to read username")?;
    term.write_str("Password: ")?;
    let password = term.read_secure_line().context("Failed to read password")?;

    Ok((username.trim().to_string(), password.trim().to_string()))
}
