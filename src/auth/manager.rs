use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::grant::{self, Grant};
use super::types::{ClientIdentity, Credential, Origin, TokenState, UserCredentials};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::http_client::HttpPipeline;

/// What `authorize` has to do to hand out a usable credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAction {
    /// Stored credential is still valid
    Reuse,

    /// Exchange the stored refresh token
    Refresh,

    /// Start over with the password grant
    Acquire,
}

/// Decide the action for the stored credential at `now`
///
/// A credential obtained by refresh is not refreshed again on expiry; only an
/// explicit force may chain a second refresh.
pub fn plan(stored: Option<&Credential>, force_refresh: bool, now: DateTime<Utc>) -> TokenAction {
    let Some(credential) = stored else {
        return TokenAction::Acquire;
    };

    if force_refresh {
        return if credential.has_refresh_token() {
            TokenAction::Refresh
        } else {
            TokenAction::Acquire
        };
    }

    match (TokenState::of(stored, now), credential.origin) {
        (TokenState::Valid, _) => TokenAction::Reuse,
        (_, Origin::Fresh) if credential.has_refresh_token() => TokenAction::Refresh,
        _ => TokenAction::Acquire,
    }
}

/// Token lifecycle manager
/// Owns the current credential and serializes every acquire/refresh
pub struct TokenManager {
    /// Current credential; the lock is held across identity calls so only one
    /// is ever in flight and waiters observe its result
    credential: Mutex<Option<Credential>>,

    /// Pipeline used for identity calls
    pipeline: Arc<HttpPipeline>,

    /// Identity endpoint
    auth_url: String,

    /// Static client identity (Basic auth on the identity endpoint)
    identity: ClientIdentity,

    /// Resource-owner credentials for the password grant
    user: UserCredentials,

    clock: Arc<dyn Clock>,
}

impl TokenManager {
    /// Create a manager with no stored credential
    pub fn new(
        pipeline: Arc<HttpPipeline>,
        auth_url: impl Into<String>,
        identity: ClientIdentity,
        user: UserCredentials,
    ) -> Self {
        Self {
            credential: Mutex::new(None),
            pipeline,
            auth_url: auth_url.into(),
            identity,
            user,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source used for expiry decisions
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get a usable credential, acquiring or refreshing as needed
    pub async fn authorize(&self, force_refresh: bool) -> Result<Credential> {
        let mut slot = self.credential.lock().await;
        let action = plan(slot.as_ref(), force_refresh, self.clock.now());
        self.apply(&mut slot, action).await
    }

    /// Get a new credential after the resource server rejected `rejected`
    ///
    /// Forces a refresh unless another caller already replaced the rejected
    /// credential while this one waited for the lock.
    pub async fn reauthorize(&self, rejected: &Credential) -> Result<Credential> {
        let mut slot = self.credential.lock().await;
        let replaced = slot
            .as_ref()
            .is_some_and(|current| current.access_token != rejected.access_token);

        if replaced {
            tracing::debug!("Credential already replaced by a concurrent caller");
        }

        let action = plan(slot.as_ref(), !replaced, self.clock.now());
        self.apply(&mut slot, action).await
    }

    /// Snapshot of the stored credential
    pub async fn current(&self) -> Option<Credential> {
        self.credential.lock().await.clone()
    }

    /// State of the stored credential right now
    pub async fn state(&self) -> TokenState {
        let slot = self.credential.lock().await;
        TokenState::of(slot.as_ref(), self.clock.now())
    }

    async fn apply(&self, slot: &mut Option<Credential>, action: TokenAction) -> Result<Credential> {
        let credential = match (action, slot.as_ref()) {
            (TokenAction::Reuse, Some(current)) => return Ok(current.clone()),
            (TokenAction::Refresh, Some(current)) => {
                let refresh_token = current.refresh_token.clone();
                match self.refresh(&refresh_token).await {
                    Ok(credential) => credential,
                    Err(e) => {
                        tracing::warn!(error = %e, "Token refresh failed, requesting a new token");
                        self.acquire().await?
                    }
                }
            }
            _ => self.acquire().await?,
        };

        *slot = Some(credential.clone());
        Ok(credential)
    }

    /// Password grant
    async fn acquire(&self) -> Result<Credential> {
        let response = grant::request_token(
            &self.pipeline,
            &self.auth_url,
            &self.identity,
            Grant::Password(&self.user),
        )
        .await?;

        let credential = Credential::from_response(response, Origin::Fresh, self.clock.now());
        tracing::info!(expires_in = credential.expires_in, "Acquired new access token");
        Ok(credential)
    }

    /// Refresh-token grant
    async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
        tracing::debug!("Refreshing access token...");

        let response = grant::request_token(
            &self.pipeline,
            &self.auth_url,
            &self.identity,
            Grant::RefreshToken(refresh_token),
        )
        .await?;

        let credential = Credential::from_response(response, Origin::Refreshed, self.clock.now());
        tracing::info!(expires_in = credential.expires_in, "Access token refreshed");
        Ok(credential)
    }
}
