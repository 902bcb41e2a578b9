//! Search parameters
//!
//! [`SearchParams`] is validated locally and normalized into a stable cache
//! key before any network or budget is spent.

use crate::error::ClientError;
use mediaref_store::MediaKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest free-text query the provider accepts
pub const DEFAULT_MAX_QUERY_LEN: usize = 100;

/// Provider content categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Category {
    Backgrounds,
    Fashion,
    Nature,
    Science,
    Education,
    Feelings,
    Health,
    People,
    Religion,
    Places,
    Animals,
    Industry,
    Computer,
    Food,
    Sports,
    Transportation,
    Travel,
    Buildings,
    Business,
    Music,
}

impl Category {
    /// Every category
    pub const ALL: [Category; 20] = [
        Self::Backgrounds,
        Self::Fashion,
        Self::Nature,
        Self::Science,
        Self::Education,
        Self::Feelings,
        Self::Health,
        Self::People,
        Self::Religion,
        Self::Places,
        Self::Animals,
        Self::Industry,
        Self::Computer,
        Self::Food,
        Self::Sports,
        Self::Transportation,
        Self::Travel,
        Self::Buildings,
        Self::Business,
        Self::Music,
    ];

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backgrounds => "backgrounds",
            Self::Fashion => "fashion",
            Self::Nature => "nature",
            Self::Science => "science",
            Self::Education => "education",
            Self::Feelings => "feelings",
            Self::Health => "health",
            Self::People => "people",
            Self::Religion => "religion",
            Self::Places => "places",
            Self::Animals => "animals",
            Self::Industry => "industry",
            Self::Computer => "computer",
            Self::Food => "food",
            Self::Sports => "sports",
            Self::Transportation => "transportation",
            Self::Travel => "travel",
            Self::Buildings => "buildings",
            Self::Business => "business",
            Self::Music => "music",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ClientError::InvalidParameters(format!("unknown category: {s}")))
    }
}

/// Image rendition type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ImageType {
    #[default]
    All,
    Photo,
    Illustration,
    Vector,
}

/// Video rendition type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum VideoType {
    #[default]
    All,
    Film,
    Animation,
}

/// Image orientation filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Orientation {
    #[default]
    All,
    Horizontal,
    Vertical,
}

/// Result ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Most popular first
    #[default]
    Popular,
    /// Newest first
    Latest,
}

fn as_wire<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// One logical search query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchParams {
    /// Free-text query
    pub query: String,
    /// Images or videos
    pub kind: MediaKind,
    /// Category filter
    pub category: Option<Category>,
    /// Image type filter (images only)
    pub image_type: ImageType,
    /// Video type filter (videos only)
    pub video_type: VideoType,
    /// Orientation filter (images only)
    pub orientation: Orientation,
    /// Minimum width in pixels
    pub min_width: u32,
    /// Minimum height in pixels
    pub min_height: u32,
    /// Only safe-for-work results
    pub safe_search: bool,
    /// 1-based page
    pub page: u32,
    /// Results per page, 3..=200
    pub per_page: u32,
    /// Ordering
    pub order: Order,
}

impl SearchParams {
    /// Smallest page size the provider accepts
    pub const MIN_PER_PAGE: u32 = 3;
    /// Largest page size the provider accepts
    pub const MAX_PER_PAGE: u32 = 200;

    /// Query with defaults: first page of 3, safe search on, popular order
    #[must_use]
    pub fn new(query: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            query: query.into(),
            kind,
            category: None,
            image_type: ImageType::default(),
            video_type: VideoType::default(),
            orientation: Orientation::default(),
            min_width: 0,
            min_height: 0,
            safe_search: true,
            page: 1,
            per_page: Self::MIN_PER_PAGE,
            order: Order::default(),
        }
    }

    /// Image query
    #[inline]
    #[must_use]
    pub fn image(query: impl Into<String>) -> Self {
        Self::new(query, MediaKind::Image)
    }

    /// Video query
    #[inline]
    #[must_use]
    pub fn video(query: impl Into<String>) -> Self {
        Self::new(query, MediaKind::Video)
    }

    /// With category
    #[inline]
    #[must_use]
    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    /// With image type
    #[inline]
    #[must_use]
    pub fn with_image_type(mut self, image_type: ImageType) -> Self {
        self.image_type = image_type;
        self
    }

    /// With video type
    #[inline]
    #[must_use]
    pub fn with_video_type(mut self, video_type: VideoType) -> Self {
        self.video_type = video_type;
        self
    }

    /// With orientation
    #[inline]
    #[must_use]
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// With minimum dimensions
    #[inline]
    #[must_use]
    pub fn with_min_size(mut self, width: u32, height: u32) -> Self {
        self.min_width = width;
        self.min_height = height;
        self
    }

    /// With safe search flag
    #[inline]
    #[must_use]
    pub fn with_safe_search(mut self, safe: bool) -> Self {
        self.safe_search = safe;
        self
    }

    /// With pagination
    #[inline]
    #[must_use]
    pub fn with_page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    /// With ordering
    #[inline]
    #[must_use]
    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Trim, collapse whitespace and truncate the query to `max_len` chars,
    /// then validate
    ///
    /// # Errors
    /// Returns `ClientError::InvalidParameters` for an empty query, page 0,
    /// or a page size outside 3..=200
    pub fn normalized(&self, max_len: usize) -> Result<Self, ClientError> {
        let collapsed = self.query.split_whitespace().collect::<Vec<_>>().join(" ");
        let query: String = collapsed.chars().take(max_len).collect();
        let query = query.trim_end().to_string();

        if query.is_empty() {
            return Err(ClientError::InvalidParameters("empty query".into()));
        }
        if self.page == 0 {
            return Err(ClientError::InvalidParameters("page must be >= 1".into()));
        }
        if !(Self::MIN_PER_PAGE..=Self::MAX_PER_PAGE).contains(&self.per_page) {
            return Err(ClientError::InvalidParameters(format!(
                "per_page must be within {}..={}, got {}",
                Self::MIN_PER_PAGE,
                Self::MAX_PER_PAGE,
                self.per_page
            )));
        }

        Ok(Self {
            query,
            ..self.clone()
        })
    }

    /// Stable cache key for already-normalized params
    ///
    /// Queries differing only in case share a key.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let keyed = Self {
            query: self.query.to_lowercase(),
            ..self.clone()
        };
        serde_json::to_string(&keyed).unwrap_or_else(|_| format!("{keyed:?}"))
    }

    /// Provider query pairs
    #[must_use]
    pub fn to_query_pairs(&self, api_key: &str) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("key".to_string(), api_key.to_string()),
            ("q".to_string(), self.query.clone()),
        ];
        if let Some(category) = self.category {
            pairs.push(("category".into(), category.as_str().into()));
        }
        match self.kind {
            MediaKind::Image => {
                pairs.push(("image_type".into(), as_wire(&self.image_type)));
                pairs.push(("orientation".into(), as_wire(&self.orientation)));
            }
            MediaKind::Video => {
                pairs.push(("video_type".into(), as_wire(&self.video_type)));
            }
        }
        if self.min_width > 0 {
            pairs.push(("min_width".into(), self.min_width.to_string()));
        }
        if self.min_height > 0 {
            pairs.push(("min_height".into(), self.min_height.to_string()));
        }
        pairs.push(("safesearch".into(), self.safe_search.to_string()));
        pairs.push(("order".into(), as_wire(&self.order)));
        pairs.push(("page".into(), self.page.to_string()));
        pairs.push(("per_page".into(), self.per_page.to_string()));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_and_truncates() {
        let long = format!("  a   red\tbicycle {}", "x".repeat(200));
        let params = SearchParams::image(long).normalized(20).unwrap();
        assert_eq!(params.query, "a red bicycle xxxxxx");
        assert_eq!(params.query.chars().count(), 20);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let params = SearchParams::image("éééééé").normalized(3).unwrap();
        assert_eq!(params.query, "ééé");
    }

    #[test]
    fn rejects_invalid() {
        assert!(matches!(
            SearchParams::image("   ").normalized(100),
            Err(ClientError::InvalidParameters(_))
        ));
        assert!(SearchParams::image("cat").with_page(0, 10).normalized(100).is_err());
        assert!(SearchParams::image("cat").with_page(1, 2).normalized(100).is_err());
        assert!(SearchParams::image("cat").with_page(1, 201).normalized(100).is_err());
        assert!(SearchParams::image("cat").with_page(2, 200).normalized(100).is_ok());
    }

    #[test]
    fn cache_key_is_stable_and_case_insensitive() {
        let a = SearchParams::image("Red Bicycle").normalized(100).unwrap();
        let b = SearchParams::image("red  bicycle").normalized(100).unwrap();
        assert_eq!(a.cache_key(), b.cache_key());

        let c = SearchParams::video("red bicycle").normalized(100).unwrap();
        assert_ne!(a.cache_key(), c.cache_key());

        let d = a.clone().with_page(2, 3);
        assert_ne!(a.cache_key(), d.cache_key());
    }

    #[test]
    fn query_pairs_for_images() {
        let params = SearchParams::image("sunset")
            .with_category(Some(Category::Nature))
            .with_min_size(800, 600)
            .with_order(Order::Latest);
        let pairs = params.to_query_pairs("k");
        let get = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("key"), Some("k"));
        assert_eq!(get("q"), Some("sunset"));
        assert_eq!(get("category"), Some("nature"));
        assert_eq!(get("image_type"), Some("all"));
        assert_eq!(get("min_width"), Some("800"));
        assert_eq!(get("order"), Some("latest"));
        assert_eq!(get("safesearch"), Some("true"));
        assert_eq!(get("video_type"), None);
    }

    #[test]
    fn query_pairs_for_videos() {
        let pairs = SearchParams::video("waves")
            .with_video_type(VideoType::Film)
            .to_query_pairs("k");
        assert!(pairs.contains(&("video_type".to_string(), "film".to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "orientation"));
    }

    #[test]
    fn category_parse() {
        assert_eq!("animals".parse::<Category>().unwrap(), Category::Animals);
        assert!("dinosaurs".parse::<Category>().is_err());
    }
}
