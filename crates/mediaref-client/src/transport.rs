//! Transport seam between the client and the network
//!
//! The client never touches HTTP directly; it builds a [`ProviderRequest`]
//! and interprets a [`ProviderReply`]. [`ReqwestTransport`] is the
//! production implementation, tests substitute scripted transports.

use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// HTTP method subset used by providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST with JSON body
    Post,
}

/// Outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    /// Method
    pub method: HttpMethod,
    /// Absolute URL without query string
    pub url: String,
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
    /// JSON body for POST
    pub json_body: Option<serde_json::Value>,
    /// Bearer credential
    pub bearer: Option<String>,
}

impl ProviderRequest {
    /// GET request
    #[inline]
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Vec::new(),
            json_body: None,
            bearer: None,
        }
    }

    /// POST request with JSON body
    #[inline]
    #[must_use]
    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            query: Vec::new(),
            json_body: Some(body),
            bearer: None,
        }
    }

    /// With query parameters
    #[inline]
    #[must_use]
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// With bearer token
    #[inline]
    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Query value by name
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Inbound reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderReply {
    /// HTTP status
    pub status: u16,
    /// Headers, names lowercased
    pub headers: HashMap<String, String>,
    /// Raw body
    pub body: Vec<u8>,
}

impl ProviderReply {
    /// Reply with status and body
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// With header (name is lowercased)
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Header value by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Check for 2xx
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy text, truncated for error messages
    #[must_use]
    pub fn body_excerpt(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let trimmed = text.trim();
        if trimmed.chars().count() > 200 {
            let cut: String = trimmed.chars().take(200).collect();
            format!("{cut}...")
        } else {
            trimmed.to_string()
        }
    }
}

/// Executes provider requests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request; non-2xx statuses are replies, not errors
    async fn execute(&self, request: ProviderRequest) -> Result<ProviderReply, TransportError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build transport with request timeout
    ///
    /// # Errors
    /// Returns `TransportError::InvalidRequest` if the client cannot be built
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mediaref/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client
    #[inline]
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn map_reqwest_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: ProviderRequest) -> Result<ProviderReply, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| map_reqwest_error(&e))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(&e))?
            .to_vec();

        Ok(ProviderReply {
            status,
            headers,
            body,
        })
    }
}
