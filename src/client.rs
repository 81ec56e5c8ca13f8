// Authenticated client
// Attaches the bearer credential and retries once after a 401

use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::auth::{Credential, TokenManager};
use crate::error::Result;
use crate::http_client::{HttpPipeline, RequestBody, RequestDescriptor};

/// HTTP client for the management API
pub struct AuthenticatedClient {
    /// Shared request pipeline
    pipeline: Arc<HttpPipeline>,

    /// Token lifecycle manager
    tokens: Arc<TokenManager>,
}

impl AuthenticatedClient {
    pub fn new(pipeline: Arc<HttpPipeline>, tokens: Arc<TokenManager>) -> Self {
        Self { pipeline, tokens }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Send an authenticated request
    ///
    /// A 401 on the first attempt triggers one forced refresh and exactly one
    /// more attempt. Any other failure, and any failure of the retry, is
    /// returned unchanged.
    pub async fn call(
        &self,
        method: Method,
        url: &str,
        extra_headers: &[(String, String)],
        body: Option<RequestBody>,
    ) -> Result<String> {
        let credential = self.tokens.authorize(false).await?;
        let request = build_request(&method, url, extra_headers, body.as_ref(), &credential);

        match self.pipeline.send(&request).await {
            Err(e) if e.is_unauthorized() => {
                tracing::warn!(method = %method, url = url, "Received 401, refreshing token and retrying...");

                let credential = self.tokens.reauthorize(&credential).await?;
                let retry = build_request(&method, url, extra_headers, body.as_ref(), &credential);
                self.pipeline.send(&retry).await
            }
            result => result,
        }
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        self.call(Method::GET, url, &[], None).await
    }

    /// GET and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get(url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Fresh descriptor for one attempt
fn build_request(
    method: &Method,
    url: &str,
    extra_headers: &[(String, String)],
    body: Option<&RequestBody>,
    credential: &Credential,
) -> RequestDescriptor {
    let request = RequestDescriptor::new(method.clone(), url)
        .headers(extra_headers.iter().cloned())
        .header("Authorization", credential.authorization_header());

    match body {
        Some(body) => request.body(body.clone()),
        None => request,
    }
}
