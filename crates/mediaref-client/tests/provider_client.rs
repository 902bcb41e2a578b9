//! End-to-end client behavior over a scripted transport

use chrono::Duration;
use mediaref_client::{
    ClientConfig, ClientError, ProviderClient, ProviderReply, RateLimitPolicy, SearchParams,
};
use mediaref_test_utils::{
    fixed_clock, image_search_body, query_is, url_is, video_search_body, ScriptedTransport,
};
use mediaref_store::ManualClock;
use std::sync::Arc;

const BASE: &str = "https://provider.test/api";

fn client(transport: Arc<ScriptedTransport>, limit: u32) -> (ProviderClient, Arc<ManualClock>) {
    let clock = fixed_clock();
    let config = ClientConfig::new(BASE, "test-key").with_rate_limit(RateLimitPolicy {
        limit,
        window_secs: 60,
    });
    (ProviderClient::new(config, transport, clock.clone()), clock)
}

#[tokio::test]
async fn search_then_fetch_first_hit() {
    let transport = ScriptedTransport::new();
    transport.route(
        query_is("red bicycle"),
        ProviderReply::new(200, image_search_body(&["https://cdn.test/bike.jpg"])),
    );
    transport.route(
        url_is("https://cdn.test/bike.jpg"),
        ProviderReply::new(200, vec![1u8, 2, 3]).with_header("Content-Type", "image/jpeg"),
    );
    let (client, _clock) = client(transport.clone(), 10);

    let page = client.search(&SearchParams::image("red bicycle")).await.unwrap();
    let hit = page.first().unwrap();
    let asset = client.fetch_asset(&hit.asset_url, hit.kind).await.unwrap();

    assert_eq!(asset.content_type, "image/jpeg");
    assert_eq!(asset.bytes, vec![1, 2, 3]);
    assert_eq!(transport.request_count(), 2);
    assert_eq!(client.rate_limit().remaining, 9);
}

#[tokio::test]
async fn cache_is_shared_across_equivalent_queries() {
    let transport = ScriptedTransport::new();
    transport.route(
        query_is("ocean waves"),
        ProviderReply::new(200, video_search_body(&["https://cdn.test/waves.mp4"])),
    );
    let (client, clock) = client(transport.clone(), 10);

    client.search(&SearchParams::video("ocean waves")).await.unwrap();
    client.search(&SearchParams::video("  ocean   waves")).await.unwrap();
    client.search(&SearchParams::video("Ocean Waves")).await.unwrap();
    assert_eq!(transport.count_matching("/videos/"), 1);
    assert_eq!(client.cache_len().await, 1);

    clock.advance(Duration::hours(24) + Duration::seconds(1));
    client.search(&SearchParams::video("ocean waves")).await.unwrap();
    assert_eq!(transport.count_matching("/videos/"), 2);
}

#[tokio::test]
async fn budget_exhaustion_and_reset() {
    let transport = ScriptedTransport::new();
    transport.route_with(
        |_| true,
        |_| Ok(ProviderReply::new(200, image_search_body(&["https://cdn.test/a.jpg"]))),
    );
    let (client, clock) = client(transport.clone(), 3);

    for q in ["a", "b", "c"] {
        client.search(&SearchParams::image(q)).await.unwrap();
    }
    let err = client.search(&SearchParams::image("d")).await.unwrap_err();
    assert_eq!(err.retry_after_secs(), Some(60));
    assert_eq!(transport.request_count(), 3);

    // Cached answers still flow while the budget is empty
    client.search(&SearchParams::image("a")).await.unwrap();

    clock.advance(Duration::seconds(60));
    client.search(&SearchParams::image("d")).await.unwrap();
    assert_eq!(transport.request_count(), 4);
}

#[tokio::test]
async fn clear_cache_forces_refetch() {
    let transport = ScriptedTransport::new();
    transport.route(
        query_is("cat"),
        ProviderReply::new(200, image_search_body(&["https://cdn.test/cat.jpg"])),
    );
    let (client, _clock) = client(transport.clone(), 10);

    client.search(&SearchParams::image("cat")).await.unwrap();
    client.clear_cache().await;
    assert_eq!(client.cache_len().await, 0);
    client.search(&SearchParams::image("cat")).await.unwrap();
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let transport = ScriptedTransport::new();
    transport.route(query_is("flaky"), ProviderReply::new(502, "bad gateway"));
    let (client, _clock) = client(transport.clone(), 10);

    for _ in 0..2 {
        let err = client.search(&SearchParams::image("flaky")).await.unwrap_err();
        assert!(matches!(err, ClientError::ProviderError { status: Some(502), .. }));
    }
    assert_eq!(transport.request_count(), 2);
}
