// LibreLinkUp response types
//
// Every endpoint wraps its payload in `{ status, data, ticket? }`; status 0
// means success. Descriptors carry far more fields than the sync needs, so
// only the identifying ones are modelled and the rest lands in `extra` to be
// flattened verbatim.

use serde::{Deserialize, Serialize};

// ── Response Envelope ────────────────────────────────────────────────

/// Standard LibreLinkUp response envelope.
///
/// ```json
/// { "status": 0, "data": { ... } }
/// ```
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub status: i64,
    pub data: Option<T>,
    pub error: Option<ApiMessage>,
}

/// Error detail some failures carry next to a non-zero status.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: Option<String>,
}

// ── Login ────────────────────────────────────────────────────────────

/// `data` of a login response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    #[serde(default)]
    pub auth_ticket: Option<AuthTicket>,
    #[serde(default)]
    pub user: Option<LoginUser>,
    /// Set when the account lives on another regional host.
    #[serde(default)]
    pub redirect: bool,
    #[serde(default)]
    pub region: Option<String>,
}

/// Opaque bearer token plus its issuance metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTicket {
    pub token: String,
    /// Expiry as unix seconds.
    #[serde(default)]
    pub expires: i64,
    /// Lifetime in milliseconds.
    #[serde(default)]
    pub duration: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginUser {
    pub id: String,
}

/// A successful login: the ticket and the user it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub ticket: AuthTicket,
    pub user_id: Option<String>,
}

// ── Connections ──────────────────────────────────────────────────────

/// A linked patient as returned by `llu/connections`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub patient_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Provider metadata (target ranges, sensor, last measurement, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Connection {
    /// `"First Last"`, as shown for the device object.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
