// Identity endpoint calls (password and refresh-token grants)

use reqwest::Method;

use super::types::{ClientIdentity, TokenResponse, UserCredentials};
use crate::error::{ApiError, Result};
use crate::http_client::{HttpPipeline, RequestBody, RequestDescriptor};

/// OAuth grant sent to the identity endpoint
#[derive(Debug, Clone, Copy)]
pub enum Grant<'a> {
    Password(&'a UserCredentials),
    RefreshToken(&'a str),
}

impl Grant<'_> {
    fn name(&self) -> &'static str {
        match self {
            Grant::Password(_) => "password",
            Grant::RefreshToken(_) => "refresh_token",
        }
    }

    /// Form fields for the token request
    fn form(&self) -> Vec<(String, String)> {
        match self {
            Grant::Password(user) => vec![
                ("username".to_string(), user.username.clone()),
                ("password".to_string(), user.password.clone()),
                ("grant_type".to_string(), "password".to_string()),
            ],
            Grant::RefreshToken(token) => vec![
                ("grant_type".to_string(), "refresh_token".to_string()),
                ("refresh_token".to_string(), token.to_string()),
            ],
        }
    }
}

/// Build the token request for `grant`
pub fn token_request(endpoint: &str, identity: &ClientIdentity, grant: Grant<'_>) -> RequestDescriptor {
    RequestDescriptor::new(Method::POST, endpoint)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .header("Accept", "application/json;charset=utf-8")
        .header("Authorization", identity.basic_authorization())
        .body(RequestBody::Form(grant.form()))
}

/// Perform one token request; every failure becomes `AuthError`
pub async fn request_token(
    pipeline: &HttpPipeline,
    endpoint: &str,
    identity: &ClientIdentity,
    grant: Grant<'_>,
) -> Result<TokenResponse> {
    tracing::debug!(grant = grant.name(), endpoint = endpoint, "Requesting token");

    let request = token_request(endpoint, identity, grant);
    let body = match pipeline.send(&request).await {
        Ok(body) => body,
        Err(ApiError::HttpError { status, body }) => {
            tracing::error!(
                grant = grant.name(),
                status = status,
                "Token request rejected by identity endpoint"
            );

            // Try to surface the OAuth error for more details
            if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(&body) {
                if let (Some(code), Some(description)) = (
                    error_json.get("error").and_then(|v| v.as_str()),
                    error_json.get("error_description").and_then(|v| v.as_str()),
                ) {
                    tracing::error!(error = code, description = description, "OAuth error details");
                }
            }

            return Err(ApiError::AuthError(format!(
                "{} grant failed: {} - {}",
                grant.name(),
                status,
                body
            )));
        }
        Err(e) => {
            tracing::error!(grant = grant.name(), error = %e, "Token request failed");
            return Err(ApiError::AuthError(format!("{} grant failed: {}", grant.name(), e)));
        }
    };

    let data: TokenResponse = serde_json::from_str(&body).map_err(|e| {
        ApiError::AuthError(format!("Failed to parse {} grant response: {}", grant.name(), e))
    })?;

    if data.access_token.is_empty() {
        return Err(ApiError::AuthError(format!(
            "{} grant response does not contain access_token",
            grant.name()
        )));
    }

    Ok(data)
}
