//! Placeholder extraction
//!
//! Generated markup marks media to resolve with
//! `placeholder://image/<description>` or `placeholder://video/<description>`.
//! A description runs until a quote, `<`, `>`, `)` or line break, so markers
//! work inside attributes, CSS `url(...)` and plain text alike.

use mediaref_store::MediaKind;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Marker scheme
pub const MARKER_SCHEME: &str = "placeholder://";

/// Characters of context kept on each side of a marker
pub const CONTEXT_RADIUS: usize = 100;

/// One placeholder found in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderDescriptor {
    /// Unique id
    pub id: String,
    /// Asset class requested by the marker
    pub kind: MediaKind,
    /// Natural-language query
    pub description: String,
    /// Surrounding text, used for category inference
    pub context: String,
    /// Exact marker substring to replace
    pub marker: String,
}

impl PlaceholderDescriptor {
    /// Descriptor for a marker built from `kind` and `description`
    ///
    /// Used when placeholders come from somewhere other than a document scan.
    #[must_use]
    pub fn new(kind: MediaKind, description: impl Into<String>) -> Self {
        let description = description.into();
        let marker = format!(
            "{MARKER_SCHEME}{}/{}",
            marker_kind(kind),
            encode_description(&description)
        );
        Self {
            id: new_id(),
            kind,
            description,
            context: String::new(),
            marker,
        }
    }

    /// With context
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

fn new_id() -> String {
    format!("ph_{}", ulid::Ulid::new().to_string().to_ascii_lowercase())
}

fn marker_kind(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
    }
}

static MARKER: OnceCell<Result<Regex, String>> = OnceCell::new();

fn marker_regex() -> Option<&'static Regex> {
    let compiled = MARKER.get_or_init(|| {
        Regex::new(r#"placeholder://(image|video)/([^"'<>)\r\n]+)"#).map_err(|err| err.to_string())
    });
    match compiled {
        Ok(re) => Some(re),
        Err(msg) => {
            tracing::error!(target = "mediaref::queue", error = %msg, "marker regex init failed");
            None
        }
    }
}

/// Characters that would end a marker early or change how it decodes
const ESCAPED: [char; 11] = [' ', '"', '\'', '<', '>', ')', '%', '+', '\r', '\n', '\t'];

fn encode_description(description: &str) -> String {
    let mut out = String::with_capacity(description.len());
    for c in description.chars() {
        if ESCAPED.contains(&c) {
            out.push_str(&format!("%{:02X}", u32::from(c)));
        } else {
            out.push(c);
        }
    }
    out
}

/// Undo the escapes `encode_description` produces, leaving any other
/// `%` sequence as written
fn percent_decode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(at) = rest.find('%') {
        out.push_str(&rest[..at]);
        let escaped = rest
            .get(at + 1..at + 3)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .map(char::from)
            .filter(|c| ESCAPED.contains(c));
        match escaped {
            Some(c) => {
                out.push(c);
                rest = &rest[at + 3..];
            }
            None => {
                out.push('%');
                rest = &rest[at + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode `+` and percent escapes, then collapse whitespace
fn decode_description(raw: &str) -> String {
    percent_decode(&raw.replace('+', " "))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Up to `CONTEXT_RADIUS` characters either side of `start..end`
fn context_window(doc: &str, start: usize, end: usize) -> String {
    let before_start = doc[..start]
        .char_indices()
        .rev()
        .take(CONTEXT_RADIUS)
        .last()
        .map_or(start, |(i, _)| i);
    let after_end = doc[end..]
        .char_indices()
        .nth(CONTEXT_RADIUS)
        .map_or(doc.len(), |(i, _)| end + i);
    doc[before_start..after_end].to_string()
}

/// A marker occurrence in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerSpan<'d> {
    /// Byte offset of the marker
    pub offset: usize,
    /// Exact marker text
    pub marker: &'d str,
    /// Asset class
    pub kind: MediaKind,
    /// Undecoded description part
    pub raw_description: &'d str,
}

impl MarkerSpan<'_> {
    /// Exclusive end offset
    #[inline]
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.marker.len()
    }
}

/// Every marker occurrence in `doc`, in document order
///
/// Trailing whitespace before a terminator belongs to the text, not the
/// marker.
#[must_use]
pub fn marker_spans(doc: &str) -> Vec<MarkerSpan<'_>> {
    let Some(re) = marker_regex() else {
        return Vec::new();
    };
    re.captures_iter(doc)
        .filter_map(|caps| {
            let (whole, class, raw) = (caps.get(0)?, caps.get(1)?, caps.get(2)?);
            let kind = if class.as_str() == "video" {
                MediaKind::Video
            } else {
                MediaKind::Image
            };
            Some(MarkerSpan {
                offset: whole.start(),
                marker: whole.as_str().trim_end(),
                kind,
                raw_description: raw.as_str().trim_end(),
            })
        })
        .collect()
}

/// Find every placeholder marker in `doc`
///
/// Identical markers are reported once, at their first occurrence. Markers
/// whose description is blank are ignored.
#[must_use]
pub fn extract_placeholders(doc: &str) -> Vec<PlaceholderDescriptor> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for span in marker_spans(doc) {
        let description = decode_description(span.raw_description);
        if description.is_empty() || !seen.insert(span.marker) {
            continue;
        }
        found.push(PlaceholderDescriptor {
            id: new_id(),
            kind: span.kind,
            description,
            context: context_window(doc, span.offset, span.end()),
            marker: span.marker.to_string(),
        });
    }

    tracing::debug!(count = found.len(), "extracted placeholders");
    found
}
