use std::fmt;

use reqwest::RequestBuilder;
use secrecy::SecretString;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Login credentials for a LibreLinkUp follower account.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Everything an authenticated call needs, captured from one login.
///
/// Immutable: a new login produces a new context instead of mutating shared
/// headers, so a request always carries the token of exactly one session.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestContext {
    token: String,
    account_id: Option<String>,
}

impl RequestContext {
    pub fn new(token: impl Into<String>, account_id: Option<String>) -> Self {
        Self {
            token: token.into(),
            account_id,
        }
    }

    /// Build a context from a login ticket, deriving the `Account-Id`
    /// header from the user id when one was returned.
    pub fn from_login(token: &str, user_id: Option<&str>) -> Self {
        Self::new(token, user_id.map(account_id_for))
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    /// Attach bearer auth and the account header to a request.
    pub(crate) fn apply(&self, builder: RequestBuilder) -> Result<RequestBuilder, Error> {
        if self.token.chars().any(char::is_control) {
            return Err(Error::InvalidHeader {
                name: "Authorization",
            });
        }
        let builder = builder.bearer_auth(&self.token);
        Ok(match self.account_id {
            Some(ref id) => builder.header("Account-Id", id),
            None => builder,
        })
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("token", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// SHA-256 hex digest of the user id, as newer API deployments expect in
/// the `Account-Id` header.
pub fn account_id_for(user_id: &str) -> String {
    hex::encode(Sha256::digest(user_id.as_bytes()))
}
