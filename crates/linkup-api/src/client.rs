// LibreLinkUp HTTP client
//
// Wraps `reqwest::Client` with region-aware URL construction, envelope
// unwrapping and response classification. Authenticated calls take a
// `RequestContext` argument instead of reading mutable shared state.

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use secrecy::ExposeSecret;
use tracing::debug;
use url::Url;

use crate::auth::{Credentials, RequestContext};
use crate::error::Error;
use crate::models::{Connection, Envelope, LoginData, LoginGrant};
use crate::transport::TransportConfig;

/// Raw HTTP client for the LibreLinkUp follower API.
///
/// Cheap to clone: `reqwest::Client` shares its connection pool.
#[derive(Debug, Clone)]
pub struct LinkUpClient {
    http: reqwest::Client,
    base_url: Url,
}

impl LinkUpClient {
    /// Create a client for a region (`eu`, `us`, `de`, `ap`, ...).
    pub fn for_region(region: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let base_url = region_base_url(region)?;
        Self::new(base_url, transport)
    }

    /// Create a client against an explicit base URL.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, mut base_url: Url) -> Self {
        // `Url::join` drops the last segment of a path without a trailing slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for an `llu/...` path.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    /// URL of the graph endpoint for one patient.
    pub fn graph_url(&self, patient_id: &str) -> Result<Url, Error> {
        self.url(&format!("llu/connections/{patient_id}/graph"))
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Authenticate with e-mail and password.
    ///
    /// Success requires envelope status 0 *and* an auth ticket in `data`.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, Error> {
        let url = self.url("llu/auth/login")?;
        debug!("logging in at {}", url);

        let body = json!({
            "email": credentials.email,
            "password": credentials.password.expose_secret(),
        });

        let resp = self.http.post(url).json(&body).send().await?;
        let text = Self::check_response(resp).await?;
        let envelope: Envelope<LoginData> = decode(&text)?;

        if envelope.status != 0 {
            return Err(Error::LoginRejected {
                status: envelope.status,
                message: envelope.error.and_then(|e| e.message),
                body: text,
            });
        }

        match envelope.data {
            Some(LoginData {
                redirect: true,
                region: Some(region),
                ..
            }) => Err(Error::RegionRedirect { region }),
            Some(LoginData {
                auth_ticket: Some(ticket),
                user,
                ..
            }) if !ticket.token.is_empty() => {
                debug!("login successful");
                Ok(LoginGrant {
                    ticket,
                    user_id: user.map(|u| u.id),
                })
            }
            _ => Err(Error::Authentication { message: text }),
        }
    }

    /// List linked patients.
    pub async fn connections(&self, ctx: &RequestContext) -> Result<Vec<Connection>, Error> {
        let url = self.url("llu/connections")?;
        let envelope: Envelope<Vec<Connection>> = self.get(ctx, url).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Fetch the raw graph document for one patient.
    ///
    /// Returned untouched (envelope included): the shape is provider-defined
    /// and gets flattened as a whole.
    pub async fn graph(&self, ctx: &RequestContext, patient_id: &str) -> Result<Value, Error> {
        let url = self.graph_url(patient_id)?;
        self.get(ctx, url).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, ctx: &RequestContext, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = ctx.apply(self.http.get(url))?.send().await?;
        let text = Self::check_response(resp).await?;
        decode(&text)
    }

    /// Return the body of a successful response, or classify the failure.
    async fn check_response(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();
        let body = resp.text().await?;
        debug!(%status, body = %body, "response");

        if status.is_success() {
            Ok(body)
        } else {
            Err(Error::from_response(status, body))
        }
    }
}

/// `https://api-{region}.libreview.io/`
pub fn region_base_url(region: &str) -> Result<Url, Error> {
    let region = region.trim().to_ascii_lowercase();
    if region.is_empty() || !region.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidUrl(url::ParseError::InvalidDomainCharacter));
    }
    Ok(Url::parse(&format!("https://api-{region}.libreview.io/"))?)
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    // An empty 200 body decodes as JSON null.
    let body_or_null = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body_or_null).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.to_owned(),
    })
}
