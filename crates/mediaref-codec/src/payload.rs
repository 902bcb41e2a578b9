//! Inline payloads and token references
//!
//! - Inline payload: `data:(image|video)/<subtype>;base64,<body>`
//! - Reference: `asset-ref://<token>`

use crate::error::{CodecError, CodecResult};
use base64::Engine as _;
use mediaref_store::{AssetToken, MediaKind};

/// Scheme prefix of a token reference
pub const REFERENCE_SCHEME: &str = "asset-ref://";

/// Shortest base64 body treated as worth compressing
pub const DEFAULT_MIN_INLINE_LEN: usize = 256;

/// Reference text for `token`
#[inline]
#[must_use]
pub fn reference_for(token: &AssetToken) -> String {
    format!("{REFERENCE_SCHEME}{token}")
}

/// Token named by a reference, if well-formed
#[must_use]
pub fn parse_reference(text: &str) -> Option<AssetToken> {
    text.strip_prefix(REFERENCE_SCHEME)
        .and_then(|raw| AssetToken::parse(raw).ok())
}

/// Borrowed view of a validated `data:` URI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlinePayload<'a> {
    /// Asset class from the MIME top-level type
    pub kind: MediaKind,
    /// Full MIME type, e.g. `image/png`
    pub mime: &'a str,
    /// Base64 body
    pub body: &'a str,
}

impl<'a> InlinePayload<'a> {
    /// Parse and validate a `data:` URI
    ///
    /// # Errors
    /// - `EmptyPayload` for empty input or an empty body
    /// - `MalformedPayload` for anything that is not a base64 image or
    ///   video data URI
    pub fn parse(text: &'a str) -> CodecResult<Self> {
        if text.is_empty() {
            return Err(CodecError::EmptyPayload);
        }
        let rest = text
            .strip_prefix("data:")
            .ok_or_else(|| CodecError::MalformedPayload("missing data: scheme".into()))?;
        let (mime, body) = rest
            .split_once(";base64,")
            .ok_or_else(|| CodecError::MalformedPayload("not base64 encoded".into()))?;
        let kind = match mime.split_once('/') {
            Some(("image", sub)) if !sub.is_empty() => MediaKind::Image,
            Some(("video", sub)) if !sub.is_empty() => MediaKind::Video,
            _ => {
                return Err(CodecError::MalformedPayload(format!(
                    "unsupported media type {mime}"
                )))
            }
        };
        if body.is_empty() {
            return Err(CodecError::EmptyPayload);
        }
        base64::engine::general_purpose::STANDARD
            .decode(body)
            .map_err(|e| CodecError::MalformedPayload(e.to_string()))?;
        Ok(Self { kind, mime, body })
    }

    /// Build a `data:` URI from raw bytes
    #[must_use]
    pub fn encode(mime: &str, bytes: &[u8]) -> String {
        format!(
            "data:{mime};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    /// Decoded body
    ///
    /// # Errors
    /// Returns `MalformedPayload` if the body does not decode
    pub fn decode(&self) -> CodecResult<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.body)
            .map_err(|e| CodecError::MalformedPayload(e.to_string()))
    }
}
