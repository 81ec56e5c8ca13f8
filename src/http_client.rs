// Request pipeline
// Builds a single HTTP request, sends it and classifies the outcome

use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Request};
use std::time::Duration;

use crate::error::{ApiError, Result};

/// Request payload
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// application/x-www-form-urlencoded fields, in order
    Form(Vec<(String, String)>),

    /// application/json document
    Json(serde_json::Value),

    /// Raw payload with an explicit content type
    Bytes { content_type: String, data: Vec<u8> },

    /// multipart/form-data with one or more file parts
    Multipart(Vec<FilePart>),
}

/// One file carried in a multipart body
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FilePart {
    /// Zip archive under the `file` field, as bundle imports expect
    pub fn zip(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            field: "file".to_string(),
            file_name: file_name.into(),
            content_type: "application/zip".to_string(),
            data,
        }
    }
}

/// Everything needed to issue one HTTP request
///
/// A descriptor is assembled once and then only read; a retry builds a new
/// one rather than patching the old.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header; repeated names are kept in order
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn header_pairs(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn payload(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }
}

/// HTTP pipeline shared by the token manager and the authenticated client
pub struct HttpPipeline {
    /// Shared HTTP client with connection pooling
    client: Client,
}

impl HttpPipeline {
    /// Create a new pipeline
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Send one request and return the response body as text
    ///
    /// The response body is always read to the end, on success and on error,
    /// so the connection goes back to the pool.
    pub async fn send(&self, request: &RequestDescriptor) -> Result<String> {
        let req = self.build(request)?;

        let method = req.method().clone();
        let url = req.url().clone();
        tracing::debug!(method = %method, url = %url, "Sending HTTP request");

        let response = self
            .client
            .execute(req)
            .await
            .map_err(|e| classify_transport_error(e, &url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| classify_transport_error(e, &url))?;
            tracing::warn!(
                status = status.as_u16(),
                method = %method,
                url = %url,
                "Received error response"
            );
            return Err(ApiError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(e, &url))?;

        tracing::debug!(status = %status, bytes = body.len(), "Request successful");
        Ok(body)
    }

    /// Turn a descriptor into a reqwest request, merging headers
    fn build(&self, request: &RequestDescriptor) -> Result<Request> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url());

        builder = match request.payload() {
            Some(RequestBody::Form(fields)) => builder.form(fields),
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Bytes { content_type, data }) => builder
                .header(CONTENT_TYPE, content_type.as_str())
                .body(data.clone()),
            Some(RequestBody::Multipart(parts)) => builder.multipart(multipart_form(parts)?),
            None => builder,
        };
        let multipart = matches!(request.payload(), Some(RequestBody::Multipart(_)));

        let mut req = builder
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        for (name, value) in request.header_pairs() {
            match name.to_ascii_lowercase().as_str() {
                // Overrides whatever the body set
                // The multipart boundary lives in the generated content type
                "content-type" if multipart => {
                    tracing::debug!(content_type = %value, "Ignoring Content-Type for multipart body");
                }
                "content-type" => {
                    let value = header_value(name, value)?;
                    req.headers_mut().insert(CONTENT_TYPE, value);
                }
                "authorization" => {
                    let value = parse_authorization(value)?;
                    req.headers_mut().insert(AUTHORIZATION, value);
                }
                _ => {
                    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                        ApiError::InvalidRequest(format!("Invalid header name: {:?}", name))
                    })?;
                    let value = header_value(name, value)?;
                    req.headers_mut().append(header_name, value);
                }
            }
        }

        Ok(req)
    }
}

/// Build a fresh form per send; a retry re-sends the same parts
fn multipart_form(parts: &[FilePart]) -> Result<Form> {
    parts.iter().try_fold(Form::new(), |form, part| {
        let file = Part::bytes(part.data.clone())
            .file_name(part.file_name.clone())
            .mime_str(&part.content_type)
            .map_err(|e| {
                ApiError::InvalidRequest(format!(
                    "Invalid content type {:?} for part {}: {}",
                    part.content_type, part.field, e
                ))
            })?;
        Ok(form.part(part.field.clone(), file))
    })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ApiError::InvalidRequest(format!("Invalid value for header {}", name)))
}

/// Parse `<scheme> [credentials]` into a sensitive Authorization value
fn parse_authorization(raw: &str) -> Result<HeaderValue> {
    let raw = raw.trim();
    let (scheme, credentials) = match raw.split_once(' ') {
        Some((scheme, credentials)) => (scheme, credentials.trim()),
        None => (raw, ""),
    };

    if scheme.is_empty() || !scheme.bytes().all(is_token_char) {
        return Err(ApiError::InvalidRequest(
            "Malformed Authorization header: invalid scheme".to_string(),
        ));
    }

    let formatted = if credentials.is_empty() {
        scheme.to_string()
    } else {
        format!("{} {}", scheme, credentials)
    };

    // Never echo credentials back in the error
    let mut value = HeaderValue::from_str(&formatted).map_err(|_| {
        ApiError::InvalidRequest("Malformed Authorization header: invalid credentials".to_string())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// RFC 7230 tchar
fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Map a reqwest error onto the error taxonomy
///
/// Timeouts and I/O failures on an established connection (reset, EOF) count
/// as the network stalling. Failing to connect at all (refused, DNS) is a
/// transport error.
fn classify_transport_error(err: reqwest::Error, url: &reqwest::Url) -> ApiError {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connection_failed"
    } else if err.is_body() {
        "body_error"
    } else if err.is_builder() {
        "builder_error"
    } else {
        "request_error"
    };

    tracing::warn!(error_kind = kind, error = %err, url = %url, "HTTP request error");

    if err.is_builder() {
        ApiError::InvalidRequest(err.to_string())
    } else if err.is_timeout() {
        ApiError::Timeout(format!("{} (kind: {})", err, kind))
    } else if err.is_connect() {
        ApiError::Transport(format!("{} (kind: {})", err, kind))
    } else if has_io_cause(&err) {
        ApiError::Timeout(format!("{} (kind: {})", err, kind))
    } else {
        ApiError::Transport(format!("{} (kind: {})", err, kind))
    }
}

fn has_io_cause(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return true;
        }
        source = cause.source();
    }
    false
}
