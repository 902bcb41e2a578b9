//! Provider response shapes
//!
//! Raw provider JSON is parsed into private wire structs and immediately
//! normalized into [`SearchResponse`]; nothing downstream inspects raw
//! provider fields.

use crate::error::ClientError;
use mediaref_store::MediaKind;
use serde::{Deserialize, Serialize};

/// Version of the normalized response shape
pub const RESPONSE_SHAPE_VERSION: u32 = 1;

/// One normalized search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaHit {
    /// Provider id
    pub id: u64,
    /// Images or videos
    pub kind: MediaKind,
    /// Comma-separated provider tags
    pub tags: String,
    /// Human page for attribution
    pub page_url: String,
    /// Small preview rendition
    pub preview_url: Option<String>,
    /// Rendition to embed
    pub asset_url: String,
    /// Width of `asset_url`
    pub width: u32,
    /// Height of `asset_url`
    pub height: u32,
    /// Clip length (videos only)
    pub duration_secs: Option<u32>,
}

/// Normalized search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Shape version
    pub version: u32,
    /// Total matches known to the provider
    pub total: u64,
    /// Matches reachable through paging
    pub total_hits: u64,
    /// Hits on this page
    pub items: Vec<MediaHit>,
}

impl SearchResponse {
    /// First hit, if any
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&MediaHit> {
        self.items.first()
    }

    /// Check for an empty page
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Parse and normalize a provider body
    ///
    /// Hits without a usable rendition URL are dropped.
    ///
    /// # Errors
    /// Returns `ClientError::MalformedResponse` when the body is not the
    /// expected JSON shape
    pub fn from_provider_body(kind: MediaKind, body: &[u8]) -> Result<Self, ClientError> {
        let malformed = |e: serde_json::Error| ClientError::MalformedResponse(e.to_string());
        let (total, total_hits, items) = match kind {
            MediaKind::Image => {
                let raw: RawPage<RawImageHit> = serde_json::from_slice(body).map_err(malformed)?;
                let items = raw.hits.into_iter().filter_map(RawImageHit::normalize).collect::<Vec<_>>();
                (raw.total, raw.total_hits, items)
            }
            MediaKind::Video => {
                let raw: RawPage<RawVideoHit> = serde_json::from_slice(body).map_err(malformed)?;
                let items = raw.hits.into_iter().filter_map(RawVideoHit::normalize).collect::<Vec<_>>();
                (raw.total, raw.total_hits, items)
            }
        };
        Ok(Self {
            version: RESPONSE_SHAPE_VERSION,
            total,
            total_hits: total_hits.max(items.len() as u64),
            items,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPage<H> {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    total_hits: u64,
    #[serde(default = "Vec::new")]
    hits: Vec<H>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawImageHit {
    id: u64,
    #[serde(rename = "pageURL", default)]
    page_url: String,
    #[serde(default)]
    tags: String,
    #[serde(rename = "previewURL", default)]
    preview_url: Option<String>,
    #[serde(rename = "webformatURL", default)]
    webformat_url: Option<String>,
    #[serde(rename = "largeImageURL", default)]
    large_image_url: Option<String>,
    #[serde(default)]
    webformat_width: u32,
    #[serde(default)]
    webformat_height: u32,
    #[serde(default)]
    image_width: u32,
    #[serde(default)]
    image_height: u32,
}

impl RawImageHit {
    fn normalize(self) -> Option<MediaHit> {
        // Prefer the mid-size rendition, it keeps inline payloads small
        let (asset_url, width, height) = match (self.webformat_url, self.large_image_url) {
            (Some(url), _) if !url.is_empty() => (url, self.webformat_width, self.webformat_height),
            (_, Some(url)) if !url.is_empty() => (url, self.image_width, self.image_height),
            _ => return None,
        };
        Some(MediaHit {
            id: self.id,
            kind: MediaKind::Image,
            tags: self.tags,
            page_url: self.page_url,
            preview_url: self.preview_url.filter(|u| !u.is_empty()),
            asset_url,
            width,
            height,
            duration_secs: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawVideoHit {
    id: u64,
    #[serde(rename = "pageURL", default)]
    page_url: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    duration: Option<u32>,
    #[serde(default)]
    videos: RawRenditions,
}

#[derive(Debug, Default, Deserialize)]
struct RawRenditions {
    large: Option<RawRendition>,
    medium: Option<RawRendition>,
    small: Option<RawRendition>,
    tiny: Option<RawRendition>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRendition {
    #[serde(default)]
    url: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    thumbnail: Option<String>,
}

impl RawVideoHit {
    fn normalize(self) -> Option<MediaHit> {
        let renditions = self.videos;
        let preview_url = [&renditions.small, &renditions.tiny, &renditions.medium]
            .into_iter()
            .flatten()
            .find_map(|r| r.thumbnail.clone().filter(|t| !t.is_empty()));
        let chosen = [renditions.small, renditions.tiny, renditions.medium, renditions.large]
            .into_iter()
            .flatten()
            .find(|r| !r.url.is_empty())?;
        Some(MediaHit {
            id: self.id,
            kind: MediaKind::Video,
            tags: self.tags,
            page_url: self.page_url,
            preview_url,
            asset_url: chosen.url,
            width: chosen.width,
            height: chosen.height,
            duration_secs: self.duration,
        })
    }
}

/// Downloaded rendition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAsset {
    /// MIME type
    pub content_type: String,
    /// Raw bytes
    pub bytes: Vec<u8>,
}

/// Guess a MIME type from a URL extension
#[must_use]
pub fn mime_from_url(url: &str, kind: MediaKind) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => match kind {
            MediaKind::Image => "image/jpeg",
            MediaKind::Video => "video/mp4",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const IMAGE_BODY: &str = r#"{
        "total": 4692,
        "totalHits": 500,
        "hits": [
            {
                "id": 195893,
                "pageURL": "https://example.test/photos/bicycle-195893/",
                "type": "photo",
                "tags": "bicycle, red, street",
                "previewURL": "https://cdn.example.test/preview.jpg",
                "webformatURL": "https://cdn.example.test/640.jpg",
                "webformatWidth": 640,
                "webformatHeight": 360,
                "largeImageURL": "https://cdn.example.test/1280.jpg",
                "imageWidth": 4000,
                "imageHeight": 2250
            },
            { "id": 2, "tags": "broken" }
        ]
    }"#;

    const VIDEO_BODY: &str = r#"{
        "total": 10,
        "totalHits": 10,
        "hits": [
            {
                "id": 125,
                "pageURL": "https://example.test/videos/waves-125/",
                "tags": "waves, ocean",
                "duration": 12,
                "videos": {
                    "large": { "url": "https://cdn.example.test/large.mp4", "width": 1920, "height": 1080 },
                    "small": { "url": "https://cdn.example.test/small.mp4", "width": 640, "height": 360, "thumbnail": "https://cdn.example.test/small.jpg" },
                    "tiny": { "url": "", "width": 0, "height": 0 }
                }
            }
        ]
    }"#;

    #[test]
    fn normalizes_images() {
        let response = SearchResponse::from_provider_body(MediaKind::Image, IMAGE_BODY.as_bytes()).unwrap();
        assert_eq!(response.version, RESPONSE_SHAPE_VERSION);
        assert_eq!(response.total, 4692);
        assert_eq!(response.total_hits, 500);
        assert_eq!(response.items.len(), 1);

        let hit = response.first().unwrap();
        assert_eq!(hit.asset_url, "https://cdn.example.test/640.jpg");
        assert_eq!((hit.width, hit.height), (640, 360));
        assert_eq!(hit.preview_url.as_deref(), Some("https://cdn.example.test/preview.jpg"));
    }

    #[test]
    fn normalizes_videos() {
        let response = SearchResponse::from_provider_body(MediaKind::Video, VIDEO_BODY.as_bytes()).unwrap();
        let hit = response.first().unwrap();
        assert_eq!(hit.kind, MediaKind::Video);
        assert_eq!(hit.asset_url, "https://cdn.example.test/small.mp4");
        assert_eq!(hit.duration_secs, Some(12));
        assert_eq!(hit.preview_url.as_deref(), Some("https://cdn.example.test/small.jpg"));
    }

    #[test]
    fn rejects_malformed() {
        let err = SearchResponse::from_provider_body(MediaKind::Image, b"<html>").unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse(_)));
    }

    #[test]
    fn empty_page() {
        let response = SearchResponse::from_provider_body(MediaKind::Image, br#"{"total":0,"totalHits":0,"hits":[]}"#).unwrap();
        assert!(response.is_empty());
        assert!(response.first().is_none());
    }

    #[test]
    fn mime_guessing() {
        assert_eq!(mime_from_url("https://x/a.PNG?x=1", MediaKind::Image), "image/png");
        assert_eq!(mime_from_url("https://x/a.webm", MediaKind::Video), "video/webm");
        assert_eq!(mime_from_url("https://x/a", MediaKind::Video), "video/mp4");
        assert_eq!(mime_from_url("https://x/a", MediaKind::Image), "image/jpeg");
    }
}
