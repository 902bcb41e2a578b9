//! Fallback asset for references that no longer resolve
//!
//! A red dashed frame reading "missing asset" with the token underneath.
//! The output depends only on the token, so tests can assert the miss path
//! by exact comparison.

use crate::payload::InlinePayload;
use mediaref_store::AssetToken;

const MISSING_ATTR: &str = "data-missing-asset=\"";
const FALLBACK_MIME: &str = "image/svg+xml";

fn fallback_svg(token: &AssetToken) -> String {
    format!(
        concat!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="320" height="180" viewBox="0 0 320 180" "##,
            r##"data-missing-asset="{token}">"##,
            r##"<rect x="2" y="2" width="316" height="176" fill="#fff5f5" stroke="#d00000" "##,
            r##"stroke-width="4" stroke-dasharray="12 6"/>"##,
            r##"<text x="160" y="84" text-anchor="middle" font-family="monospace" font-size="18" "##,
            r##"fill="#d00000">missing asset</text>"##,
            r##"<text x="160" y="112" text-anchor="middle" font-family="monospace" font-size="11" "##,
            r##"fill="#900000">{token}</text></svg>"##
        ),
        token = token
    )
}

/// Deterministic stand-in payload for a token that did not resolve
#[must_use]
pub fn fallback_payload(token: &AssetToken) -> String {
    InlinePayload::encode(FALLBACK_MIME, fallback_svg(token).as_bytes())
}

/// Token encoded in a fallback payload, if `payload` is one
#[must_use]
pub fn fallback_token(payload: &str) -> Option<AssetToken> {
    let parsed = InlinePayload::parse(payload).ok()?;
    if parsed.mime != FALLBACK_MIME {
        return None;
    }
    let bytes = parsed.decode().ok()?;
    let svg = std::str::from_utf8(&bytes).ok()?;
    let start = svg.find(MISSING_ATTR)? + MISSING_ATTR.len();
    let len = svg[start..].find('"')?;
    let token = AssetToken::parse(&svg[start..start + len]).ok()?;
    (fallback_payload(&token) == payload).then_some(token)
}

/// Check whether `payload` is a fallback asset
#[inline]
#[must_use]
pub fn is_fallback_payload(payload: &str) -> bool {
    fallback_token(payload).is_some()
}
