//! Stored asset types
//!
//! - [`MediaKind`] selects the namespace (images vs videos)
//! - [`AssetToken`] is the opaque short identifier embedded in documents
//! - [`StoredAsset`] is the persisted blob + metadata

use crate::error::TokenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Asset class, one persistence namespace each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still images
    Image,
    /// Video clips
    Video,
}

impl MediaKind {
    /// Namespace name used by storage backends
    #[inline]
    #[must_use]
    pub fn namespace(self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Video => "videos",
        }
    }

    /// Token prefix for this kind
    #[inline]
    #[must_use]
    pub fn token_prefix(self) -> &'static str {
        match self {
            Self::Image => "img_",
            Self::Video => "vid_",
        }
    }

    /// Both kinds, image first
    pub const ALL: [MediaKind; 2] = [MediaKind::Image, MediaKind::Video];
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" | "images" | "img" => Ok(Self::Image),
            "video" | "videos" | "vid" => Ok(Self::Video),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// Opaque asset token (`img_<ulid>` / `vid_<ulid>`, lowercase)
///
/// Tokens are minted once per stored payload and never reused for a
/// different payload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetToken(String);

impl AssetToken {
    /// Length of every well-formed token
    pub const LEN: usize = 4 + 26;

    /// Mint a fresh token for `kind`
    #[must_use]
    pub fn mint(kind: MediaKind) -> Self {
        let body = Ulid::new().to_string().to_ascii_lowercase();
        Self(format!("{}{body}", kind.token_prefix()))
    }

    /// Parse and validate a token
    ///
    /// # Errors
    /// Returns [`TokenError`] on unknown prefix or non-ULID body
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let kind_ok = MediaKind::ALL
            .iter()
            .any(|k| raw.starts_with(k.token_prefix()));
        if !kind_ok {
            return Err(TokenError::UnknownPrefix(
                raw.chars().take(4).collect::<String>(),
            ));
        }
        let body = &raw[4..];
        if body.len() != 26 || Ulid::from_string(&body.to_ascii_uppercase()).is_err() {
            return Err(TokenError::MalformedBody(body.to_string()));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    /// Namespace this token lives in
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        if self.0.starts_with(MediaKind::Video.token_prefix()) {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    /// Token text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AssetToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AssetToken {
    type Error = TokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AssetToken> for String {
    fn from(token: AssetToken) -> Self {
        token.0
    }
}

/// blake3 digest of an inline payload, used for deduplication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadDigest([u8; 32]);

impl PayloadDigest {
    /// Hash a payload
    #[inline]
    #[must_use]
    pub fn of(payload: &str) -> Self {
        Self(*blake3::hash(payload.as_bytes()).as_bytes())
    }

    /// Hex form for logs
    #[inline]
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// A resolved asset held by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAsset {
    /// Key in the store
    pub token: AssetToken,
    /// Literal embeddable payload (data URI or URL)
    pub inline_payload: String,
    /// Optional preview URL or small data URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Natural-language description the asset was resolved from
    #[serde(default)]
    pub description: String,
    /// Insertion time, drives age eviction
    pub timestamp: DateTime<Utc>,
}

impl StoredAsset {
    /// Create a new asset record
    #[must_use]
    pub fn new(
        token: AssetToken,
        inline_payload: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            inline_payload: inline_payload.into(),
            thumbnail: None,
            description: String::new(),
            timestamp,
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With thumbnail
    #[inline]
    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    /// Digest of the inline payload
    #[inline]
    #[must_use]
    pub fn digest(&self) -> PayloadDigest {
        PayloadDigest::of(&self.inline_payload)
    }
}
