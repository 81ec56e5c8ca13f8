// Authentication types

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// How the stored credential was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Password grant
    Fresh,

    /// Refresh-token grant
    Refreshed,
}

/// Usability of the stored credential at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Absent,
    Valid,
    Expired,
}

impl TokenState {
    /// Derive the state of an optional credential at `now`
    pub fn of(credential: Option<&Credential>, now: DateTime<Utc>) -> Self {
        match credential {
            None => TokenState::Absent,
            Some(c) if c.is_expired_at(now) => TokenState::Expired,
            Some(_) => TokenState::Valid,
        }
    }
}

/// Bearer credential plus the metadata needed to judge its validity
///
/// Never edited in place: a refresh produces a whole new value.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub scope: Option<String>,
    pub jti: Option<String>,
    pub acquired_at: DateTime<Utc>,
    pub origin: Origin,
}

impl Credential {
    /// Build a credential from a token response received at `acquired_at`
    pub fn from_response(response: TokenResponse, origin: Origin, acquired_at: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
            scope: response.scope,
            jti: response.jti,
            acquired_at,
            origin,
        }
    }

    /// Strictly more than `expires_in` seconds have passed since acquisition
    ///
    /// A lifetime too large to represent never runs out; one too negative
    /// already has.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match Duration::try_seconds(self.expires_in) {
            Some(lifetime) => now - self.acquired_at > lifetime,
            None => self.expires_in < 0,
        }
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Value for the outgoing Authorization header
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Identity endpoint token response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
}

/// Static OAuth client identity presented to the identity endpoint
///
/// This is the platform's public CLI client pair, not a user secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientIdentity {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// `Basic base64(id:secret)`
    pub fn basic_authorization(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

/// Resource-owner credentials for the password grant
#[derive(Clone)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
