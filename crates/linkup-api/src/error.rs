use thiserror::Error;

/// Marker the API puts in the body when the `product`/`version` identity
/// headers are missing or no longer accepted.
const REQUIRED_HEADER_MISSING: &str = "RequiredHeaderMissing";

/// Top-level error type for the `linkup-api` crate.
///
/// Covers every failure mode of the LibreLinkUp follower API:
/// authentication, transport, HTTP status and payload decoding.
/// `linkup-core` decides which of these are worth more than a log line.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login answered with status 0 but without an auth ticket.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Login answered with a non-zero envelope status (bad credentials,
    /// terms of use not accepted, account locked, ...).
    #[error("Login rejected with status {status}")]
    LoginRejected {
        status: i64,
        /// `error.message` of the envelope, when present.
        message: Option<String>,
        body: String,
    },

    /// The account lives in another region; login must go to that host.
    #[error("Account belongs to region '{region}'")]
    RegionRedirect { region: String },

    /// The declared client identity was refused by the API.
    #[error("Request rejected: required header missing (client version outdated)")]
    RequiredHeaderMissing { body: String },

    /// The bearer token is no longer accepted.
    #[error("Unauthorized -- token may be expired")]
    Unauthorized { body: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A header value could not be encoded (token with control characters).
    #[error("Invalid header value for {name}")]
    InvalidHeader { name: &'static str },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Classify a non-success response.
    ///
    /// `RequiredHeaderMissing` is pattern-matched from the body first, because
    /// the API reports it under varying status codes.
    pub fn from_response(status: reqwest::StatusCode, body: String) -> Self {
        if body.contains(REQUIRED_HEADER_MISSING) {
            return Self::RequiredHeaderMissing { body };
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Self::Unauthorized { body };
        }
        Self::Http {
            status: status.as_u16(),
            body,
        }
    }

    /// Returns `true` if the bearer token was rejected and a fresh login
    /// might resolve it.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Returns `true` if the client version header needs updating.
    pub fn is_required_header_missing(&self) -> bool {
        matches!(self, Self::RequiredHeaderMissing { .. })
    }

    /// The raw response body, when the failure came with one.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::LoginRejected { body, .. }
            | Self::RequiredHeaderMissing { body }
            | Self::Unauthorized { body }
            | Self::Http { body, .. }
            | Self::Deserialization { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn header_missing_wins_over_status() {
        let err = Error::from_response(
            StatusCode::FORBIDDEN,
            r#"{"message":"RequiredHeaderMissing"}"#.into(),
        );
        assert!(err.is_required_header_missing());
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn unauthorized_keeps_body() {
        let err = Error::from_response(StatusCode::UNAUTHORIZED, "expired".into());
        assert!(err.is_unauthorized());
        assert_eq!(err.response_body(), Some("expired"));
    }
}
