//! Configuration for the linkup sync client.
//!
//! A single TOML file plus `LINKUP_*` environment overrides, credential
//! resolution (env + keyring + plaintext), and translation to
//! `linkup_core::SyncConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use linkup_api::Credentials;
use linkup_core::{Schedule, SyncConfig};

/// Keyring service under which passwords are stored.
pub const KEYRING_SERVICE: &str = "linkup";

/// Environment variable holding the password.
pub const PASSWORD_ENV: &str = "LINKUP_PASSWORD";

const ENV_PREFIX: &str = "LINKUP_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Please set username and password")]
    NoCredentials,

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// LibreLinkUp follower e-mail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password (plaintext -- prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Name of an environment variable containing the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Regional host (`eu`, `us`, `de`, `fr`, `jp`, `ap`, `au`, `ae`, ...).
    #[serde(default = "default_region")]
    pub region: String,

    /// Data refresh interval in minutes.
    #[serde(default = "default_interval")]
    pub interval: f64,

    /// Declared app version; newer API deployments reject old ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Override the regional API root (proxies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            password_env: None,
            region: default_region(),
            interval: default_interval(),
            client_version: None,
            timeout: default_timeout(),
            base_url: None,
        }
    }
}

fn default_region() -> String {
    "eu".into()
}
fn default_interval() -> f64 {
    5.0
}
fn default_timeout() -> u64 {
    30
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "linkup", "linkup").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("linkup");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` + environment. A missing file is not an
/// error; defaults and environment still apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");

    // LINKUP_PASSWORD has its own slot in the resolution chain.
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["password"]));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

pub fn resolve_username(cfg: &Config) -> Result<String, ConfigError> {
    cfg.username
        .clone()
        .filter(|u| !u.trim().is_empty())
        .ok_or(ConfigError::NoCredentials)
}

/// Resolve the password: `password_env` → `LINKUP_PASSWORD` → keyring →
/// plaintext.
pub fn resolve_password(cfg: &Config, username: &str) -> Result<SecretString, ConfigError> {
    // 1. Configured env var
    if let Some(ref env_name) = cfg.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. LINKUP_PASSWORD
    if let Ok(val) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(val));
    }

    // 3. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, username) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 4. Plaintext in config
    match cfg.password {
        Some(ref pw) if !pw.is_empty() => Ok(SecretString::from(pw.clone())),
        _ => Err(ConfigError::NoCredentials),
    }
}

/// Store a password in the system keyring for `username`.
pub fn store_password(username: &str, password: &SecretString) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, username)?;
    entry.set_password(password.expose_secret())?;
    Ok(())
}

pub fn resolve_credentials(cfg: &Config) -> Result<Credentials, ConfigError> {
    let username = resolve_username(cfg)?;
    let password = resolve_password(cfg, &username)?;
    Ok(Credentials::new(username, password))
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `SyncConfig`, resolving credentials and validating fields.
pub fn to_sync_config(cfg: &Config) -> Result<SyncConfig, ConfigError> {
    let credentials = resolve_credentials(cfg)?;
    let mut sync = SyncConfig::new(credentials, validate_region(&cfg.region)?);

    if let Some(ref raw) = cfg.base_url {
        let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
        sync.base_url = Some(url);
    }

    sync.client_version = cfg
        .client_version
        .clone()
        .filter(|v| !v.trim().is_empty());
    sync.timeout = Duration::from_secs(cfg.timeout.max(1));
    sync.schedule = Schedule::with_poll_minutes(cfg.interval);
    Ok(sync)
}

fn validate_region(region: &str) -> Result<String, ConfigError> {
    let region = region.trim().to_ascii_lowercase();
    if region.is_empty() || !region.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigError::Validation {
            field: "region".into(),
            reason: format!("expected a region code like 'eu' or 'us', got '{region}'"),
        });
    }
    Ok(region)
}
