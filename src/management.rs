// Management API facade
// Generic organization-scoped list/get/delete over the authenticated client

use reqwest::Method;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::auth::{ClientIdentity, TokenManager, UserCredentials};
use crate::client::AuthenticatedClient;
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::http_client::{FilePart, HttpPipeline, RequestBody};
use crate::pagination::{PageQuery, Paginator};

/// Organization-scoped client for the management API
pub struct ManagementClient {
    client: AuthenticatedClient,
    base_url: String,
    organization: String,
    page_size: usize,
}

impl ManagementClient {
    pub fn new(
        client: AuthenticatedClient,
        base_url: impl Into<String>,
        organization: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            organization: organization.into(),
            page_size,
        }
    }

    /// Wire up pipeline, token manager and client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let pipeline = Arc::new(HttpPipeline::new(
            config.connect_timeout(),
            config.request_timeout(),
        )?);

        let tokens = Arc::new(TokenManager::new(
            pipeline.clone(),
            config.auth_url.clone(),
            ClientIdentity::new(config.client_id.clone(), config.client_secret.clone()),
            UserCredentials {
                username: config.username.clone(),
                password: config.password.clone(),
            },
        ));

        Ok(Self::new(
            AuthenticatedClient::new(pipeline, tokens),
            config.base_url.clone(),
            config.organization.clone(),
            config.page_size,
        ))
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    /// `{base}/v1/o/{org}/{resource}`
    pub fn org_url(&self, resource: &str) -> String {
        format!(
            "{}/v1/o/{}/{}",
            self.base_url,
            self.organization,
            resource.trim_matches('/')
        )
    }

    /// All names of a resource that lists as a bare string array
    pub async fn list_names(&self, resource: &str) -> Result<Vec<String>> {
        let query = PageQuery::new(self.org_url(resource), self.page_size);
        Paginator::new(&self.client).fetch_all_as(&query).await
    }

    /// All expanded entities of a resource
    ///
    /// `envelope` is the key wrapping the array (`developer` for
    /// `developers`), `cursor_field` the entity field fed back as `startKey`.
    pub async fn list_entities(
        &self,
        resource: &str,
        envelope: &str,
        cursor_field: &str,
    ) -> Result<Vec<Value>> {
        let query = PageQuery::new(self.org_url(resource), self.page_size)
            .expand(true)
            .envelope(envelope)
            .cursor_field(cursor_field);
        Paginator::new(&self.client).fetch_all(&query).await
    }

    /// One entity by name
    pub async fn get_entity(&self, resource: &str, name: &str) -> Result<Value> {
        self.client.get_json(&self.entity_url(resource, name)?).await
    }

    /// Delete one entity; the API echoes the deleted entity
    pub async fn delete_entity(&self, resource: &str, name: &str) -> Result<Value> {
        let body = self
            .client
            .call(Method::DELETE, &self.entity_url(resource, name)?, &[], None)
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Upload a zip bundle, e.g. an API proxy under `apis`
    ///
    /// Posts to `{resource}?action=import&name={name}` as a multipart `file` part.
    pub async fn import_archive(&self, resource: &str, name: &str, path: &Path) -> Result<Value> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            ApiError::InvalidRequest(format!("Cannot read archive {}: {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.zip", name));

        let mut url = reqwest::Url::parse(&self.org_url(resource))
            .map_err(|e| ApiError::ConfigError(format!("Invalid base URL {}: {}", self.base_url, e)))?;
        url.query_pairs_mut()
            .append_pair("action", "import")
            .append_pair("name", name);

        tracing::info!(resource = %resource, name = %name, bytes = data.len(), "Importing archive");

        let body = self
            .client
            .call(
                Method::POST,
                url.as_str(),
                &[],
                Some(RequestBody::Multipart(vec![FilePart::zip(file_name, data)])),
            )
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn entity_url(&self, resource: &str, name: &str) -> Result<String> {
        let mut url = reqwest::Url::parse(&self.org_url(resource))
            .map_err(|e| ApiError::ConfigError(format!("Invalid base URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::ConfigError(format!("Base URL cannot hold a path: {}", self.base_url)))?
            .push(name);
        Ok(url.into())
    }
}
