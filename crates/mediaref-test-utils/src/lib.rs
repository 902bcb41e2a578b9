//! Testing utilities for the mediaref workspace
//!
//! Scripted provider transport, canned provider bodies, and payload
//! generators shared by integration tests.

#![allow(missing_docs)]

use async_trait::async_trait;
use base64::Engine as _;
use chrono::{TimeZone, Utc};
use mediaref_client::{ProviderReply, ProviderRequest, Transport, TransportError};
use mediaref_store::{ManualClock, MediaKind};
use parking_lot::Mutex;
use std::sync::Arc;

type Matcher = Box<dyn Fn(&ProviderRequest) -> bool + Send + Sync>;
type Responder = Box<dyn Fn(&ProviderRequest) -> Result<ProviderReply, TransportError> + Send + Sync>;

struct Route {
    matcher: Matcher,
    responder: Responder,
}

/// Transport answering from a list of routes; first match wins.
/// Unmatched requests get a 404. Every request is recorded.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("routes", &self.routes.lock().len())
            .field("requests", &self.requests.lock().len())
            .finish()
    }
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer requests matching `matcher` with a fixed reply
    pub fn route<M>(&self, matcher: M, reply: ProviderReply)
    where
        M: Fn(&ProviderRequest) -> bool + Send + Sync + 'static,
    {
        self.route_with(matcher, move |_| Ok(reply.clone()));
    }

    /// Answer requests matching `matcher` by calling `responder`
    pub fn route_with<M, R>(&self, matcher: M, responder: R)
    where
        M: Fn(&ProviderRequest) -> bool + Send + Sync + 'static,
        R: Fn(&ProviderRequest) -> Result<ProviderReply, TransportError> + Send + Sync + 'static,
    {
        self.routes.lock().push(Route {
            matcher: Box::new(matcher),
            responder: Box::new(responder),
        });
    }

    /// Every request seen so far
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests whose URL contains `fragment`
    pub fn count_matching(&self, fragment: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: ProviderRequest) -> Result<ProviderReply, TransportError> {
        self.requests.lock().push(request.clone());
        let routes = self.routes.lock();
        match routes.iter().find(|route| (route.matcher)(&request)) {
            Some(route) => (route.responder)(&request),
            None => Ok(ProviderReply::new(404, format!("no route for {}", request.url))),
        }
    }
}

/// Matches search requests whose `q` equals `query`
pub fn query_is(query: &'static str) -> impl Fn(&ProviderRequest) -> bool + Send + Sync {
    move |req| req.query_value("q") == Some(query)
}

/// Matches requests to exactly `url`
pub fn url_is(url: &'static str) -> impl Fn(&ProviderRequest) -> bool + Send + Sync {
    move |req| req.url == url
}

/// Provider search body with one image hit per URL
pub fn image_search_body(asset_urls: &[&str]) -> String {
    let hits: Vec<_> = asset_urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            serde_json::json!({
                "id": i + 1,
                "pageURL": format!("https://provider.test/photos/{}", i + 1),
                "type": "photo",
                "tags": "fixture, test",
                "previewURL": format!("{url}.preview.jpg"),
                "webformatURL": url,
                "webformatWidth": 640,
                "webformatHeight": 427,
            })
        })
        .collect();
    serde_json::json!({ "total": hits.len(), "totalHits": hits.len(), "hits": hits }).to_string()
}

/// Provider search body with one video hit per URL
pub fn video_search_body(asset_urls: &[&str]) -> String {
    let hits: Vec<_> = asset_urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            serde_json::json!({
                "id": i + 100,
                "pageURL": format!("https://provider.test/videos/{}", i + 100),
                "tags": "fixture, clip",
                "duration": 9,
                "videos": {
                    "small": {
                        "url": url,
                        "width": 960,
                        "height": 540,
                        "thumbnail": format!("{url}.thumb.jpg"),
                    }
                }
            })
        })
        .collect();
    serde_json::json!({ "total": hits.len(), "totalHits": hits.len(), "hits": hits }).to_string()
}

/// Empty search page
pub fn empty_search_body() -> String {
    r#"{"total":0,"totalHits":0,"hits":[]}"#.to_string()
}

/// Deterministic pseudo-binary bytes
pub fn sample_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Valid inline `data:` payload whose base64 body is about `approx_len` chars
pub fn sample_payload(kind: MediaKind, approx_len: usize, seed: u8) -> String {
    let mime = match kind {
        MediaKind::Image => "image/png",
        MediaKind::Video => "video/mp4",
    };
    let bytes = sample_bytes(approx_len * 3 / 4 + 1, seed);
    let body = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{body}")
}

/// Clock pinned to a fixed instant
pub fn fixed_clock() -> Arc<ManualClock> {
    let start = Utc
        .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    Arc::new(ManualClock::new(start))
}
