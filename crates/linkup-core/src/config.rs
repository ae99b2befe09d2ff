// ── Runtime sync configuration ──
//
// These types describe *how* to talk to LibreLinkUp and how often.
// They carry credential data and timing, but never touch disk.
// The CLI constructs a `SyncConfig` (via linkup-config) and hands it in.

use std::time::Duration;

use linkup_api::{ClientIdentity, Credentials, LinkUpClient, TransportConfig};
use tracing::info;
use url::Url;

use crate::error::CoreError;

/// Floor for the data-refresh interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Unconditional re-login period.
pub const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(22 * 60 * 60);

/// Device-list refresh period (23.9 hours).
pub const DEVICE_LIST_INTERVAL: Duration = Duration::from_secs(86_040);

/// Delay between a 401 on a data refresh and the re-login it triggers.
pub const REAUTH_DELAY: Duration = Duration::from_secs(60);

/// Timer periods used by the poll scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub poll_interval: Duration,
    pub token_refresh: Duration,
    pub device_refresh: Duration,
    pub reauth_delay: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self::with_poll_minutes(5.0)
    }
}

impl Schedule {
    /// Fixed periods plus a data-refresh interval given in minutes,
    /// clamped to [`MIN_POLL_INTERVAL`].
    pub fn with_poll_minutes(minutes: f64) -> Self {
        Self {
            poll_interval: clamp_poll_interval(minutes),
            token_refresh: TOKEN_REFRESH_INTERVAL,
            device_refresh: DEVICE_LIST_INTERVAL,
            reauth_delay: REAUTH_DELAY,
        }
    }
}

/// Convert a poll interval in minutes to a `Duration`, never below 0.5 min.
pub fn clamp_poll_interval(minutes: f64) -> Duration {
    let floor = MIN_POLL_INTERVAL.as_secs_f64() / 60.0;
    if !minutes.is_finite() || minutes < floor {
        info!(requested = minutes, "set interval to minimum 0.5");
        return MIN_POLL_INTERVAL;
    }
    Duration::from_secs_f64(minutes * 60.0)
}

/// Everything needed to run one sync instance.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub credentials: Credentials,
    /// Regional host selector (`eu`, `us`, `de`, ...).
    pub region: String,
    /// Explicit API root; overrides `region` (proxies, tests).
    pub base_url: Option<Url>,
    /// Declared app version; `None` uses the built-in default.
    pub client_version: Option<String>,
    pub timeout: Duration,
    pub schedule: Schedule,
}

impl SyncConfig {
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
            base_url: None,
            client_version: None,
            timeout: Duration::from_secs(30),
            schedule: Schedule::default(),
        }
    }

    /// The identity headers this instance declares.
    pub fn identity(&self) -> ClientIdentity {
        self.client_version
            .as_deref()
            .map_or_else(ClientIdentity::default, ClientIdentity::with_version)
    }

    /// Build the HTTP client for this configuration.
    pub fn build_client(&self) -> Result<LinkUpClient, CoreError> {
        let transport = TransportConfig {
            identity: self.identity(),
            timeout: self.timeout,
        };
        let client = match self.base_url {
            Some(ref url) => LinkUpClient::new(url.clone(), &transport)?,
            None => LinkUpClient::for_region(&self.region, &transport).map_err(|_| {
                CoreError::Config {
                    message: format!("invalid region '{}'", self.region),
                }
            })?,
        };
        Ok(client)
    }
}
