#![allow(clippy::multiple_crate_versions)]

use serde::{Deserialize, Serialize};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

pub const APP_NAME: &str = "vidshare";

/// Overrides `base_url` when set and non-empty.
pub const BASE_URL_ENV: &str = "VIDSHARE_API_BASE_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const STORAGE_FILE: &str = "storage.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PasswordSource {
    Literal(String),
    Env { env: String },
    Cmd { cmd: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginConfig {
    pub username: Option<String>,
    pub password: Option<PasswordSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_true")]
    pub show_counts: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            show_counts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VidConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub storage_path: Option<PathBuf>,
    #[serde(default)]
    pub login: LoginConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Default for VidConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            storage_path: None,
            login: LoginConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_page_size() -> u64 {
    12
}

#[derive(Debug, thiserror::Error)]
pub enum VidConfigError {
    #[error("config error: {0}")]
    Confy(#[from] confy::ConfyError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("empty password")]
    MissingPassword,
    #[error("no {what} entered")]
    EmptyInput { what: &'static str },
    #[error("environment variable '{env}' not found")]
    MissingEnv { env: String },
    #[error("password command failed: {cmd}: {message}")]
    CommandFailed { cmd: String, message: String },
    #[error("failed to execute password command '{cmd}': {source}")]
    CommandExec { cmd: String, source: io::Error },
    #[error("password command returned empty output: {cmd}")]
    CommandEmpty { cmd: String },
    #[error(
        "{what} required but stdin is not interactive; pass it as an argument or set `login` in {path}",
        path = .path.display()
    )]
    NonInteractive { what: &'static str, path: PathBuf },
}

pub type Result<T> = std::result::Result<T, VidConfigError>;

impl VidConfig {
    /// Loads the config file from the standard OS location.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be read or deserialized.
    pub fn load() -> Result<Self> {
        Ok(confy::load(APP_NAME, None)?)
    }

    /// Loads the config from an explicit file.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be read or deserialized.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Ok(confy::load_path(path)?)
    }

    /// Stores the config to the standard OS location.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn store(&self) -> Result<()> {
        confy::store(APP_NAME, None, self)?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn store_to(&self, path: impl AsRef<Path>) -> Result<()> {
        confy::store_path(path, self)?;
        Ok(())
    }

    /// Location of the config file.
    ///
    /// # Errors
    /// Returns an error if the OS config directory cannot be determined.
    pub fn file_path() -> Result<PathBuf> {
        Ok(confy::get_configuration_file_path(APP_NAME, None)?)
    }

    /// API origin without a trailing `/`, after the environment override.
    #[must_use]
    pub fn base_url(&self) -> String {
        let from_env = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        from_env
            .as_deref()
            .unwrap_or(&self.base_url)
            .trim()
            .trim_end_matches('/')
            .to_string()
    }

    /// Where the durable client storage lives.
    ///
    /// # Errors
    /// Returns an error if no override is set and the OS config directory
    /// cannot be determined.
    pub fn storage_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.storage_path {
            return Ok(path.clone());
        }
        Ok(storage_beside(&Self::file_path()?))
    }

    /// Username from the command line, the config, or an interactive prompt.
    ///
    /// # Errors
    /// Returns an error if nothing is configured and stdin is not a terminal.
    pub fn username(&self, given: Option<String>) -> Result<String> {
        if let Some(username) = given.or_else(|| self.login.username.clone()) {
            return Ok(username);
        }
        prompt("Username: ", "username")
    }

    /// Password from the command line, the configured source, or an
    /// interactive prompt.
    ///
    /// # Errors
    /// Returns an error if the configured source cannot be resolved, or if
    /// nothing is configured and stdin is not a terminal.
    pub fn password(&self, given: Option<String>) -> Result<String> {
        if let Some(password) = given {
            return Ok(password);
        }
        match &self.login.password {
            Some(source) => source.resolve(),
            None => prompt("Password: ", "password"),
        }
    }
}

fn storage_beside(config_file: &Path) -> PathBuf {
    config_file
        .parent()
        .map_or_else(|| PathBuf::from(STORAGE_FILE), |dir| dir.join(STORAGE_FILE))
}

fn prompt(label: &str, what: &'static str) -> Result<String> {
    if !io::stdin().is_terminal() {
        return Err(VidConfigError::NonInteractive {
            what,
            path: VidConfig::file_path()?,
        });
    }

    eprint!("{label}");
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(VidConfigError::EmptyInput { what });
    }
    Ok(trimmed.to_string())
}

impl PasswordSource {
    /// Resolves the secret and trims surrounding whitespace.
    ///
    /// # Errors
    /// Returns an error if the variable or command is unavailable, or the
    /// result is empty.
    pub fn resolve(&self) -> Result<String> {
        match self {
            Self::Literal(value) => non_empty(value),
            Self::Env { env } => {
                let value = std::env::var(env)
                    .map_err(|_| VidConfigError::MissingEnv { env: env.clone() })?;
                non_empty(&value)
            }
            Self::Cmd { cmd } => {
                let output = Command::new("sh")
                    .arg("-c")
                    .arg(cmd)
                    .output()
                    .map_err(|e| VidConfigError::CommandExec {
                        cmd: cmd.clone(),
                        source: e,
                    })?;

                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(VidConfigError::CommandFailed {
                        cmd: cmd.clone(),
                        message: stderr.trim().to_string(),
                    });
                }

                let stdout = String::from_utf8_lossy(&output.stdout);
                let trimmed = stdout.trim();
                if trimmed.is_empty() {
                    return Err(VidConfigError::CommandEmpty { cmd: cmd.clone() });
                }
                Ok(trimmed.to_string())
            }
        }
    }
}

fn non_empty(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(VidConfigError::MissingPassword);
    }
    Ok(trimmed.to_string())
}
