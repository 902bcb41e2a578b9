//! Generative image provider
//!
//! POSTs a prompt and receives the image inline as base64. Shares the error
//! taxonomy and the [`RateLimiter`] type with the search client but keeps its
//! own budget.

use crate::client::classify_failure;
use crate::error::{ClientError, ClientResult};
use crate::rate_limit::{RateLimitHeaders, RateLimitPolicy, RateLimitState, RateLimiter};
use crate::transport::{ProviderRequest, Transport};
use mediaref_store::SharedClock;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Generation endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Full URL of the generation endpoint
    pub endpoint: String,
    /// Bearer credential
    pub api_key: String,
    /// Model name passed through to the provider
    pub model: String,
    /// Requested size, e.g. `1024x1024`
    pub size: String,
    /// Request budget
    pub rate_limit: RateLimitPolicy,
}

impl GenerationConfig {
    /// Config with default model and size
    #[must_use]
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: "dall-e-3".to_string(),
            size: "1024x1024".to_string(),
            rate_limit: RateLimitPolicy {
                limit: 5,
                window_secs: 60,
            },
        }
    }

    /// With model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// With size
    #[inline]
    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    /// With rate-limit policy
    #[inline]
    #[must_use]
    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = policy;
        self
    }
}

/// Image returned by the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// MIME type of the decoded image
    pub mime: String,
    /// Base64 body, unwrapped
    pub base64: String,
}

impl GeneratedImage {
    /// Render as a `data:` URI
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64)
    }
}

#[derive(Debug, Deserialize)]
struct RawGeneration {
    #[serde(default)]
    data: Vec<RawGeneratedItem>,
}

#[derive(Debug, Deserialize)]
struct RawGeneratedItem {
    #[serde(default)]
    b64_json: Option<String>,
}

/// Client for the generative role
pub struct GenerationClient {
    config: GenerationConfig,
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
}

impl fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationClient")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl GenerationClient {
    /// Create client over `transport`
    #[must_use]
    pub fn new(config: GenerationConfig, transport: Arc<dyn Transport>, clock: SharedClock) -> Self {
        Self {
            limiter: RateLimiter::new(config.rate_limit, clock),
            config,
            transport,
        }
    }

    /// Generate one image for `prompt`
    ///
    /// # Errors
    /// Same taxonomy as search; an empty prompt is `InvalidParameters` and a
    /// reply without image data is `MalformedResponse`
    pub async fn generate(&self, prompt: &str) -> ClientResult<GeneratedImage> {
        let prompt = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
        if prompt.is_empty() {
            return Err(ClientError::InvalidParameters("empty prompt".into()));
        }
        if self.config.api_key.is_empty() {
            return Err(ClientError::ProviderUnauthorized(
                "no generation API key configured".into(),
            ));
        }

        self.limiter.acquire()?;
        tracing::debug!(model = %self.config.model, prompt_len = prompt.len(), "requesting generated image");

        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "size": self.config.size,
            "response_format": "b64_json",
            "n": 1,
        });
        let request =
            ProviderRequest::post_json(&self.config.endpoint, body).with_bearer(&self.config.api_key);
        let reply = self.transport.execute(request).await?;
        self.limiter.observe(&RateLimitHeaders::from_reply(&reply));

        if !reply.is_success() {
            let err = classify_failure(&reply, &self.limiter);
            tracing::warn!(status = reply.status, error = %err, "image generation failed");
            return Err(err);
        }

        let raw: RawGeneration = serde_json::from_slice(&reply.body)
            .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;
        let base64 = raw
            .data
            .into_iter()
            .find_map(|item| item.b64_json.filter(|b| !b.is_empty()))
            .ok_or_else(|| ClientError::MalformedResponse("no image data in reply".into()))?;

        Ok(GeneratedImage {
            mime: "image/png".to_string(),
            base64,
        })
    }

    /// Current budget bookkeeping
    #[must_use]
    pub fn rate_limit(&self) -> RateLimitState {
        self.limiter.snapshot()
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpMethod, MockTransport, ProviderReply};
    use chrono::Utc;
    use mediaref_store::ManualClock;

    fn client(mock: MockTransport, key: &str) -> GenerationClient {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        GenerationClient::new(
            GenerationConfig::new("https://gen.test/v1/images/generations", key),
            Arc::new(mock),
            clock,
        )
    }

    #[tokio::test]
    async fn generates_image() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Post
                    && req.bearer.as_deref() == Some("secret")
                    && req
                        .json_body
                        .as_ref()
                        .and_then(|b| b.get("prompt"))
                        .and_then(|p| p.as_str())
                        == Some("a red bicycle")
            })
            .times(1)
            .returning(|_| Ok(ProviderReply::new(200, r#"{"data":[{"b64_json":"aGVsbG8="}]}"#)));

        let image = client(mock, "secret").generate("  a red   bicycle ").await.unwrap();
        assert_eq!(image.to_data_uri(), "data:image/png;base64,aGVsbG8=");
    }

    #[tokio::test]
    async fn missing_key_is_unauthorized() {
        let mut mock = MockTransport::new();
        mock.expect_execute().never();
        let err = client(mock, "").generate("cat").await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn empty_data_is_malformed() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(ProviderReply::new(200, r#"{"data":[]}"#)));
        let err = client(mock, "k").generate("cat").await.unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn budget_is_separate_and_enforced() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(5)
            .returning(|_| Ok(ProviderReply::new(200, r#"{"data":[{"b64_json":"eA=="}]}"#)));
        let client = client(mock, "k");
        for _ in 0..5 {
            client.generate("cat").await.unwrap();
        }
        let err = client.generate("cat").await.unwrap_err();
        assert!(matches!(err, ClientError::RateLimited { .. }));
    }
}
