//! Rate-limited, cached provider client
//!
//! All provider traffic for one client instance flows through here, so the
//! response cache and the request budget are shared by every caller holding
//! the same instance.
//!
//! # Search flow
//! 1. Normalize and validate params (caller errors never cost budget)
//! 2. Live cache entry → return it (no network, no budget)
//! 3. Reserve budget or fail with `RateLimited`
//! 4. Send, fold rate-limit headers into the budget
//! 5. Map status, normalize body, cache on success

use crate::cache::ResponseCache;
use crate::error::{ClientError, ClientResult};
use crate::params::{SearchParams, DEFAULT_MAX_QUERY_LEN};
use crate::rate_limit::{RateLimitHeaders, RateLimitPolicy, RateLimitState, RateLimiter};
use crate::response::{mime_from_url, FetchedAsset, SearchResponse};
use crate::transport::{ProviderReply, ProviderRequest, Transport};
use chrono::Duration;
use mediaref_store::{MediaKind, SharedClock};
use std::fmt;
use std::sync::Arc;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Provider API root, e.g. `https://pixabay.com/api`
    pub base_url: String,
    /// Provider API key
    pub api_key: String,
    /// Longest query sent to the provider
    pub max_query_len: usize,
    /// Lifetime of cached responses
    pub cache_ttl: Duration,
    /// Maximum cached responses
    pub cache_capacity: u64,
    /// Request budget
    pub rate_limit: RateLimitPolicy,
}

impl ClientConfig {
    /// Default response lifetime (24h)
    pub const DEFAULT_CACHE_TTL_SECS: i64 = 24 * 60 * 60;

    /// Config for `base_url` with defaults
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            max_query_len: DEFAULT_MAX_QUERY_LEN,
            cache_ttl: Duration::seconds(Self::DEFAULT_CACHE_TTL_SECS),
            cache_capacity: 1_000,
            rate_limit: RateLimitPolicy::default(),
        }
    }

    /// With rate-limit policy
    #[inline]
    #[must_use]
    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = policy;
        self
    }

    /// With cache TTL
    #[inline]
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// With max query length
    #[inline]
    #[must_use]
    pub fn with_max_query_len(mut self, len: usize) -> Self {
        self.max_query_len = len;
        self
    }

    /// Search endpoint for a media kind
    #[must_use]
    pub fn endpoint(&self, kind: MediaKind) -> String {
        let base = self.base_url.trim_end_matches('/');
        match kind {
            MediaKind::Image => format!("{base}/"),
            MediaKind::Video => format!("{base}/videos/"),
        }
    }
}

/// Map a non-2xx reply onto the error taxonomy
///
/// 429 zeroes the budget so later callers fail fast without a request.
pub(crate) fn classify_failure(reply: &ProviderReply, limiter: &RateLimiter) -> ClientError {
    match reply.status {
        400 => ClientError::InvalidParameters(reply.body_excerpt()),
        401 | 403 => ClientError::ProviderUnauthorized(reply.body_excerpt()),
        429 => {
            let reset = RateLimitHeaders::from_reply(reply).reset_secs;
            ClientError::RateLimited {
                retry_after_secs: limiter.exhaust(reset),
            }
        }
        status => ClientError::provider(Some(status), reply.body_excerpt()),
    }
}

/// Media search client
pub struct ProviderClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    cache: ResponseCache<SearchResponse>,
    limiter: RateLimiter,
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient")
            .field("base_url", &self.config.base_url)
            .field("rate_limit", &self.limiter.snapshot())
            .finish_non_exhaustive()
    }
}

impl ProviderClient {
    /// Create client over `transport`
    #[must_use]
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>, clock: SharedClock) -> Self {
        Self {
            cache: ResponseCache::new(config.cache_capacity, config.cache_ttl, clock.clone()),
            limiter: RateLimiter::new(config.rate_limit, clock),
            config,
            transport,
        }
    }

    /// Run one search
    ///
    /// # Errors
    /// - `InvalidParameters` for bad params (local) or a 400 reply
    /// - `RateLimited` when the budget is exhausted or the provider says so
    /// - `ProviderUnauthorized` for 401/403
    /// - `ProviderError` for other statuses and network failures
    /// - `MalformedResponse` when a 2xx body does not parse
    pub async fn search(&self, params: &SearchParams) -> ClientResult<SearchResponse> {
        let params = params.normalized(self.config.max_query_len)?;
        let key = params.cache_key();

        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!(query = %params.query, kind = %params.kind, "search cache hit");
            return Ok(cached);
        }

        self.limiter.acquire()?;
        tracing::debug!(
            query = %params.query,
            kind = %params.kind,
            remaining = self.limiter.snapshot().remaining,
            "search cache miss, calling provider"
        );

        let request = ProviderRequest::get(self.config.endpoint(params.kind))
            .with_query(params.to_query_pairs(&self.config.api_key));
        let reply = self.transport.execute(request).await?;
        self.limiter.observe(&RateLimitHeaders::from_reply(&reply));

        if !reply.is_success() {
            let err = classify_failure(&reply, &self.limiter);
            tracing::warn!(status = reply.status, error = %err, "provider search failed");
            return Err(err);
        }

        let response = SearchResponse::from_provider_body(params.kind, &reply.body)?;
        self.cache.insert(key, response.clone()).await;
        Ok(response)
    }

    /// Download a rendition chosen from a search hit
    ///
    /// CDN downloads are neither cached nor charged to the search budget.
    ///
    /// # Errors
    /// Returns `ProviderError` for non-2xx replies or network failures
    pub async fn fetch_asset(&self, url: &str, kind: MediaKind) -> ClientResult<FetchedAsset> {
        let reply = self.transport.execute(ProviderRequest::get(url)).await?;
        if !reply.is_success() {
            return Err(ClientError::provider(
                Some(reply.status),
                format!("download of {url} failed"),
            ));
        }
        if reply.body.is_empty() {
            return Err(ClientError::provider(
                Some(reply.status),
                format!("empty download from {url}"),
            ));
        }
        let content_type = reply
            .header("content-type")
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_string())
            .filter(|ct| ct.starts_with("image/") || ct.starts_with("video/"))
            .unwrap_or_else(|| mime_from_url(url, kind).to_string());
        Ok(FetchedAsset {
            content_type,
            bytes: reply.body,
        })
    }

    /// Current budget bookkeeping
    #[must_use]
    pub fn rate_limit(&self) -> RateLimitState {
        self.limiter.snapshot()
    }

    /// Drop all cached responses
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Number of cached responses
    pub async fn cache_len(&self) -> u64 {
        self.cache.len().await
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use chrono::Utc;
    use mediaref_store::ManualClock;

    const OK_BODY: &str = r#"{"total":1,"totalHits":1,"hits":[{"id":1,"pageURL":"p","tags":"t","webformatURL":"https://cdn.test/1.jpg","webformatWidth":640,"webformatHeight":480}]}"#;

    fn client_with(mock: MockTransport, limit: u32) -> (ProviderClient, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let config = ClientConfig::new("https://provider.test/api", "key").with_rate_limit(
            RateLimitPolicy {
                limit,
                window_secs: 60,
            },
        );
        (
            ProviderClient::new(config, Arc::new(mock), clock.clone()),
            clock,
        )
    }

    #[tokio::test]
    async fn second_identical_search_is_cached() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(ProviderReply::new(200, OK_BODY)));
        let (client, _clock) = client_with(mock, 10);

        let params = SearchParams::image("red bicycle");
        let first = client.search(&params).await.unwrap();
        let second = client.search(&params).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(client.rate_limit().remaining, 9);
    }

    #[tokio::test]
    async fn expired_cache_calls_again() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(2)
            .returning(|_| Ok(ProviderReply::new(200, OK_BODY)));
        let (client, clock) = client_with(mock, 10);

        let params = SearchParams::image("red bicycle");
        client.search(&params).await.unwrap();
        clock.advance(Duration::hours(25));
        client.search(&params).await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_budget_makes_no_call() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(ProviderReply::new(200, OK_BODY)));
        let (client, _clock) = client_with(mock, 1);

        client.search(&SearchParams::image("one")).await.unwrap();
        let err = client.search(&SearchParams::image("two")).await.unwrap_err();
        assert_eq!(err, ClientError::RateLimited { retry_after_secs: 60 });
    }

    #[tokio::test]
    async fn invalid_params_cost_nothing() {
        let mut mock = MockTransport::new();
        mock.expect_execute().never();
        let (client, _clock) = client_with(mock, 5);

        let err = client
            .search(&SearchParams::image("cat").with_page(0, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidParameters(_)));
        assert_eq!(client.rate_limit().remaining, 5);
    }

    async fn mapped_error(status: u16) -> ClientError {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .returning(move |_| Ok(ProviderReply::new(status, "nope")));
        let (client, _clock) = client_with(mock, 5);
        client.search(&SearchParams::image("x")).await.unwrap_err()
    }

    #[tokio::test]
    async fn status_mapping() {
        assert!(matches!(mapped_error(400).await, ClientError::InvalidParameters(_)));
        assert!(matches!(mapped_error(401).await, ClientError::ProviderUnauthorized(_)));
        assert!(matches!(mapped_error(403).await, ClientError::ProviderUnauthorized(_)));
        assert!(matches!(mapped_error(429).await, ClientError::RateLimited { .. }));
        assert!(matches!(
            mapped_error(503).await,
            ClientError::ProviderError { status: Some(503), .. }
        ));
    }

    #[tokio::test]
    async fn too_many_requests_blocks_followups() {
        let mut mock = MockTransport::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(ProviderReply::new(429, "slow down").with_header("X-RateLimit-Reset", "17"))
        });
        let (client, _clock) = client_with(mock, 50);

        let err = client.search(&SearchParams::image("a")).await.unwrap_err();
        assert_eq!(err, ClientError::RateLimited { retry_after_secs: 17 });
        let err = client.search(&SearchParams::image("b")).await.unwrap_err();
        assert_eq!(err, ClientError::RateLimited { retry_after_secs: 17 });
    }

    #[tokio::test]
    async fn headers_update_budget() {
        let mut mock = MockTransport::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(ProviderReply::new(200, OK_BODY)
                .with_header("X-RateLimit-Limit", "100")
                .with_header("X-RateLimit-Remaining", "3")
                .with_header("X-RateLimit-Reset", "30"))
        });
        let (client, _clock) = client_with(mock, 100);
        client.search(&SearchParams::image("x")).await.unwrap();
        assert_eq!(client.rate_limit().remaining, 3);
    }

    #[tokio::test]
    async fn request_shape() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .withf(|req| {
                req.url == "https://provider.test/api/videos/"
                    && req.query_value("q") == Some("ocean waves")
                    && req.query_value("key") == Some("key")
            })
            .times(1)
            .returning(|_| Ok(ProviderReply::new(200, r#"{"total":0,"totalHits":0,"hits":[]}"#)));
        let (client, _clock) = client_with(mock, 5);
        let response = client.search(&SearchParams::video("  ocean   waves ")).await.unwrap();
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn network_failure_is_provider_error() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Err(crate::error::TransportError::Network("connection reset".into())));
        let (client, _clock) = client_with(mock, 5);
        let err = client.search(&SearchParams::image("x")).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, ClientError::ProviderError { status: None, .. }));
    }

    #[tokio::test]
    async fn fetch_asset_content_type() {
        let mut mock = MockTransport::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(ProviderReply::new(200, vec![0xFF, 0xD8, 0xFF])
                .with_header("Content-Type", "image/jpeg; charset=binary"))
        });
        let (client, _clock) = client_with(mock, 5);
        let asset = client
            .fetch_asset("https://cdn.test/1.jpg", MediaKind::Image)
            .await
            .unwrap();
        assert_eq!(asset.content_type, "image/jpeg");
        assert_eq!(asset.bytes, vec![0xFF, 0xD8, 0xFF]);
        // Downloads are not charged
        assert_eq!(client.rate_limit().remaining, 5);
    }

    #[tokio::test]
    async fn fetch_asset_failure() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(ProviderReply::new(404, "")));
        let (client, _clock) = client_with(mock, 5);
        let err = client
            .fetch_asset("https://cdn.test/gone.mp4", MediaKind::Video)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ProviderError { status: Some(404), .. }));
    }

    #[test]
    fn endpoints() {
        let config = ClientConfig::new("https://provider.test/api/", "k");
        assert_eq!(config.endpoint(MediaKind::Image), "https://provider.test/api/");
        assert_eq!(config.endpoint(MediaKind::Video), "https://provider.test/api/videos/");
    }
}
