// ── Core error types ──
//
// User-facing errors from linkup-core. Consumers never see HTTP status
// codes or JSON parse failures directly; the `From<linkup_api::Error>`
// impl translates transport-layer errors into domain variants.
//
// Background operations (login, device list, data poll) log and swallow
// their failures. These errors only surface through the one-shot paths
// the CLI uses.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Account belongs to region '{region}'")]
    WrongRegion { region: String },

    #[error("Client version rejected by the API (required header missing)")]
    ClientVersionRejected,

    #[error("Session expired -- re-authentication required")]
    Unauthorized,

    #[error("Not logged in")]
    NotAuthenticated,

    // ── Data ─────────────────────────────────────────────────────────
    #[error("No linked patients found")]
    NoDevices,

    #[error("Device not found: {patient_id}")]
    DeviceNotFound { patient_id: String },

    // ── Transport ────────────────────────────────────────────────────
    #[error("Cannot reach LibreLinkUp: {reason}")]
    ConnectionFailed { reason: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<linkup_api::Error> for CoreError {
    fn from(err: linkup_api::Error) -> Self {
        use linkup_api::Error as ApiError;

        match err {
            ApiError::Authentication { message } => CoreError::AuthenticationFailed { message },
            ApiError::LoginRejected {
                status,
                message,
                ..
            } => CoreError::AuthenticationFailed {
                message: match message {
                    Some(reason) => format!("login rejected with status {status} ({reason})"),
                    None => format!("login rejected with status {status}"),
                },
            },
            ApiError::RegionRedirect { region } => CoreError::WrongRegion { region },
            ApiError::RequiredHeaderMissing { .. } => CoreError::ClientVersionRejected,
            ApiError::Unauthorized { .. } => CoreError::Unauthorized,
            ApiError::Http { status, body } => CoreError::Api {
                message: body,
                status: Some(status),
            },
            ApiError::Transport(ref e) => {
                if e.is_timeout() || e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(u16::from),
                    }
                }
            }
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::InvalidHeader { name } => CoreError::Config {
                message: format!("value for header {name} is not valid"),
            },
            ApiError::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("unexpected response: {message}"),
                status: None,
            },
        }
    }
}
