//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use linkup_config::ConfigError;
use linkup_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(dead_code, unused_assignments)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(linkup::auth_failed),
        help(
            "Check your credentials, log into the LibreLinkUp app and accept the terms of use.\n\
             Run: linkup config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("This account belongs to region '{region}'")]
    #[diagnostic(
        code(linkup::wrong_region),
        help("Set region = \"{region}\" in your config, or pass --region {region}")
    )]
    WrongRegion { region: String },

    #[error("The API rejected the declared client version")]
    #[diagnostic(
        code(linkup::client_version),
        help("Set client_version in your config to the current LibreLinkUp app version.")
    )]
    ClientVersionRejected,

    #[error("Please set username and password")]
    #[diagnostic(
        code(linkup::no_credentials),
        help(
            "Configure credentials with: linkup config init\n\
             Or set LINKUP_USERNAME and LINKUP_PASSWORD.\n\
             Config file: {path}"
        )
    )]
    NoCredentials { path: String },

    #[error("Not logged in")]
    #[diagnostic(code(linkup::not_logged_in))]
    NotLoggedIn,

    // ── Data ─────────────────────────────────────────────────────────
    #[error("No linked patients found")]
    #[diagnostic(
        code(linkup::no_devices),
        help("Connect your FreeStyle Libre app with LibreLinkUp and accept the invitation.")
    )]
    NoDevices,

    #[error("Patient '{patient_id}' not found")]
    #[diagnostic(
        code(linkup::not_found),
        help("Run: linkup devices to see linked patients")
    )]
    NotFound { patient_id: String },

    // ── Transport ────────────────────────────────────────────────────
    #[error("Could not reach LibreLinkUp: {reason}")]
    #[diagnostic(
        code(linkup::connection_failed),
        help("Check your network connection and the configured region.")
    )]
    ConnectionFailed { reason: String },

    #[error("API error: {message}")]
    #[diagnostic(code(linkup::api_error))]
    ApiError {
        message: String,
        status: Option<u16>,
    },

    // ── Validation / Configuration ───────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(linkup::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(linkup::config))]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(linkup::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AuthFailed { .. }
            | Self::ClientVersionRejected
            | Self::NoCredentials { .. }
            | Self::NotLoggedIn => exit_code::AUTH,
            Self::WrongRegion { .. } | Self::Validation { .. } | Self::Config { .. } => {
                exit_code::USAGE
            }
            Self::NoDevices | Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::ApiError { .. } | Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::WrongRegion { region } => CliError::WrongRegion { region },
            CoreError::ClientVersionRejected => CliError::ClientVersionRejected,
            CoreError::Unauthorized | CoreError::NotAuthenticated => CliError::NotLoggedIn,
            CoreError::NoDevices => CliError::NoDevices,
            CoreError::DeviceNotFound { patient_id } => CliError::NotFound { patient_id },
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },
            CoreError::Api { message, status } => CliError::ApiError { message, status },
            CoreError::Config { message } => CliError::Config { message },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials => CliError::NoCredentials {
                path: linkup_config::config_path().display().to_string(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
