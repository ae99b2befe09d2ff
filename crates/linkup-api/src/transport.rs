// Shared transport configuration for building reqwest::Client instances.
//
// The LibreLinkUp API refuses requests that don't look like they come from
// the mobile app, so every client carries a fixed identity: product,
// declared app version, user agent and cache headers. The identity never
// changes after construction; per-session auth lives in `RequestContext`.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::error::Error;

/// Product identifier the API expects in the `product` header.
pub const DEFAULT_PRODUCT: &str = "llu.android";

/// Declared app version sent in the `version` header.
///
/// The API starts answering `RequiredHeaderMissing` once this falls below
/// the minimum version it accepts; bump it through configuration.
pub const DEFAULT_CLIENT_VERSION: &str = "4.16.0";

const DEFAULT_USER_AGENT: &str = "Dalvik/2.1.0 (Linux; U; Android 9)";

/// The identity the client declares on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub product: String,
    pub version: String,
    pub user_agent: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            product: DEFAULT_PRODUCT.into(),
            version: DEFAULT_CLIENT_VERSION.into(),
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

impl ClientIdentity {
    /// Override the declared version, keeping the default product.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }

    fn headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(
            "product",
            HeaderValue::from_str(&self.product)
                .map_err(|_| Error::InvalidHeader { name: "product" })?,
        );
        headers.insert(
            "version",
            HeaderValue::from_str(&self.version)
                .map_err(|_| Error::InvalidHeader { name: "version" })?,
        );
        Ok(headers)
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub identity: ClientIdentity,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            identity: ClientIdentity::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` carrying the identity headers.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.identity.user_agent.as_str())
            .default_headers(self.identity.headers()?)
            .build()
            .map_err(Error::Transport)
    }
}
