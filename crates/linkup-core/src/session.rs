// ── Session manager ──
//
// Owns the current auth ticket. A session is replaced wholesale by each
// successful login and never mutated; readers take an `Arc` snapshot, so
// a request always carries the token of exactly one login.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, TimeZone, Utc};
use linkup_api::{AuthTicket, Credentials, LoginGrant, RequestContext};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::CoreError;
use crate::upstream::LinkUpApi;

const LOGIN_REJECTED_HINT: &str = "Login failed. Please check your credentials, log into the \
     LibreLinkUp app and accept the terms of use.";

/// One successful login.
#[derive(Debug, Clone)]
pub struct Session {
    pub ticket: AuthTicket,
    pub user_id: Option<String>,
    pub issued_at: DateTime<Utc>,
    context: RequestContext,
}

impl Session {
    fn from_grant(grant: LoginGrant) -> Self {
        let context = RequestContext::from_login(&grant.ticket.token, grant.user_id.as_deref());
        Self {
            ticket: grant.ticket,
            user_id: grant.user_id,
            issued_at: Utc::now(),
            context,
        }
    }

    pub fn token(&self) -> &str {
        &self.ticket.token
    }

    /// Headers for authenticated calls made under this session.
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Server-declared expiry, if the ticket carried one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.ticket.expires <= 0 {
            return None;
        }
        Utc.timestamp_opt(self.ticket.expires, 0).single()
    }
}

pub struct SessionManager {
    api: Arc<dyn LinkUpApi>,
    credentials: Credentials,
    current: ArcSwapOption<Session>,
    connected: watch::Sender<bool>,
    /// Bumped by `disconnect`; a login that started in an earlier epoch
    /// never raises the connectivity flag.
    epoch: AtomicU64,
}

impl SessionManager {
    pub fn new(api: Arc<dyn LinkUpApi>, credentials: Credentials) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            api,
            credentials,
            current: ArcSwapOption::empty(),
            connected,
            epoch: AtomicU64::new(0),
        }
    }

    // ── Login ────────────────────────────────────────────────────────

    /// Log in, replacing the session on success.
    ///
    /// Failures are logged and leave the previous session in place.
    /// Returns whether a new session was installed.
    pub async fn login(&self) -> bool {
        self.try_login().await.is_ok()
    }

    /// Log in and report why it failed.
    pub async fn try_login(&self) -> Result<Arc<Session>, CoreError> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        match self.api.login(&self.credentials).await {
            Ok(grant) => {
                let session = Arc::new(Session::from_grant(grant));
                self.current.store(Some(Arc::clone(&session)));
                if self.epoch.load(Ordering::SeqCst) == epoch {
                    self.set_connected(true);
                } else {
                    debug!("disconnected while logging in, connectivity stays cleared");
                }
                info!(
                    expires_at = ?session.expires_at(),
                    account_id = session.context().account_id().is_some(),
                    "login successful"
                );
                Ok(session)
            }
            Err(err) => {
                report_login_failure(&err);
                Err(err.into())
            }
        }
    }

    /// Re-login. With no session this is the same login, logged first.
    pub async fn refresh_token(&self) -> bool {
        if self.current.load().is_none() {
            error!("no session found, logging in again");
        } else {
            debug!("refreshing token");
        }
        self.login().await
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.load_full()
    }

    /// Snapshot of the request context for the next call.
    pub fn context(&self) -> Option<RequestContext> {
        self.current.load().as_ref().map(|s| s.context().clone())
    }

    pub fn has_token(&self) -> bool {
        self.current
            .load()
            .as_ref()
            .is_some_and(|s| !s.token().is_empty())
    }

    // ── Connectivity flag ────────────────────────────────────────────

    /// Clear the connectivity flag and detach logins still in flight.
    pub fn disconnect(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.set_connected(false);
    }

    fn set_connected(&self, connected: bool) {
        self.connected.send_replace(connected);
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn subscribe_connected(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }
}

fn report_login_failure(err: &linkup_api::Error) {
    use linkup_api::Error as ApiError;

    match err {
        ApiError::LoginRejected {
            status,
            message,
            body,
        } => {
            debug!(body = %body, "login response");
            error!(status, reason = ?message, "{LOGIN_REJECTED_HINT}");
        }
        ApiError::RegionRedirect { region } => {
            error!(%region, "account belongs to region '{region}', set region = \"{region}\"");
        }
        ApiError::RequiredHeaderMissing { body } => {
            error!(body = %body, "login refused: RequiredHeaderMissing, update client_version");
        }
        other => {
            error!(error = %other, body = ?other.response_body(), "login failed");
        }
    }
}
