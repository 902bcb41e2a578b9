//! Document tokenizer
//!
//! One pass over the document yields ordered, non-overlapping [`Span`]s for
//! inline payloads and token references. Rewriters splice by span instead of
//! repeated substring search, so a payload that happens to appear twice is
//! handled per occurrence.

use crate::payload::DEFAULT_MIN_INLINE_LEN;
use mediaref_store::{AssetToken, MediaKind};
use once_cell::sync::OnceCell;
use regex::Regex;

/// What a span covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanKind {
    /// `data:` URI with a body of at least the inline threshold
    InlinePayload {
        /// Asset class from the MIME type
        kind: MediaKind,
    },
    /// `asset-ref://<token>` with a well-formed token
    Reference {
        /// Referenced token
        token: AssetToken,
    },
}

/// Byte range of one match in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Byte offset of the first character
    pub offset: usize,
    /// Byte length
    pub len: usize,
    /// Match classification
    pub kind: SpanKind,
}

impl Span {
    /// Exclusive end offset
    #[inline]
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Matched text within `doc`
    #[inline]
    #[must_use]
    pub fn text<'d>(&self, doc: &'d str) -> &'d str {
        &doc[self.offset..self.end()]
    }
}

static INLINE_PAYLOAD: OnceCell<Result<Regex, String>> = OnceCell::new();
static REFERENCE: OnceCell<Result<Regex, String>> = OnceCell::new();

fn compiled(cell: &'static OnceCell<Result<Regex, String>>, pattern: &str) -> Option<&'static Regex> {
    match cell.get_or_init(|| Regex::new(pattern).map_err(|err| err.to_string())) {
        Ok(re) => Some(re),
        Err(msg) => {
            tracing::error!(target = "mediaref::codec", error = %msg, "tokenizer regex init failed");
            None
        }
    }
}

fn inline_payload_regex() -> Option<&'static Regex> {
    compiled(
        &INLINE_PAYLOAD,
        r"data:(image|video)/[A-Za-z0-9.+-]+;base64,([A-Za-z0-9+/]+={0,2})",
    )
}

/// Tokens are fixed width, so whatever text follows a reference is left alone
fn reference_regex() -> Option<&'static Regex> {
    compiled(
        &REFERENCE,
        r"asset-ref://((?:img|vid)_(?i:[0-9a-hjkmnp-tv-z]{26}))",
    )
}

/// Tokenize with the default inline threshold
#[must_use]
pub fn tokenize(doc: &str) -> Vec<Span> {
    tokenize_with(doc, DEFAULT_MIN_INLINE_LEN)
}

/// Tokenize, treating `data:` URIs with a body shorter than
/// `min_inline_len` as plain text
///
/// References whose token does not parse are plain text too.
#[must_use]
pub fn tokenize_with(doc: &str, min_inline_len: usize) -> Vec<Span> {
    let mut spans = Vec::new();

    if let Some(re) = inline_payload_regex() {
        for caps in re.captures_iter(doc) {
            let (Some(whole), Some(class), Some(body)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            if body.len() < min_inline_len {
                continue;
            }
            let kind = if class.as_str() == "video" {
                MediaKind::Video
            } else {
                MediaKind::Image
            };
            spans.push(Span {
                offset: whole.start(),
                len: whole.len(),
                kind: SpanKind::InlinePayload { kind },
            });
        }
    }

    if let Some(re) = reference_regex() {
        for caps in re.captures_iter(doc) {
            let (Some(whole), Some(raw)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if let Ok(token) = AssetToken::parse(raw.as_str()) {
                spans.push(Span {
                    offset: whole.start(),
                    len: whole.len(),
                    kind: SpanKind::Reference { token },
                });
            }
        }
    }

    spans.sort_by_key(|span| span.offset);
    spans
}

/// Rebuild `doc`, replacing each span for which `replace` returns `Some`
///
/// Spans must be ordered and non-overlapping, as [`tokenize`] returns them.
#[must_use]
pub fn splice<F>(doc: &str, spans: &[Span], mut replace: F) -> String
where
    F: FnMut(&Span, &str) -> Option<String>,
{
    let mut out = String::with_capacity(doc.len());
    let mut cursor = 0;
    for span in spans {
        if let Some(replacement) = replace(span, span.text(doc)) {
            out.push_str(&doc[cursor..span.offset]);
            out.push_str(&replacement);
            cursor = span.end();
        }
    }
    out.push_str(&doc[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn body(len: usize) -> String {
        "QUJD".repeat(len / 4)
    }

    #[test]
    fn finds_payloads_and_references() {
        let token = AssetToken::mint(MediaKind::Image);
        let payload = format!("data:video/mp4;base64,{}", body(300));
        let doc = format!(r#"<video src="{payload}"></video><img src="asset-ref://{token}">"#);

        let spans = tokenize(&doc);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text(&doc), payload);
        assert_eq!(spans[0].kind, SpanKind::InlinePayload { kind: MediaKind::Video });
        assert_eq!(spans[1].kind, SpanKind::Reference { token: token.clone() });
        assert_eq!(spans[1].text(&doc), format!("asset-ref://{token}"));
    }

    #[test]
    fn short_payloads_are_text() {
        let doc = format!("data:image/png;base64,{}", body(40));
        assert!(tokenize(&doc).is_empty());
        assert_eq!(tokenize_with(&doc, 8).len(), 1);
    }

    #[test]
    fn malformed_references_are_text() {
        assert!(tokenize("asset-ref://img_short").is_empty());
        assert!(tokenize("asset-ref://png_01hzzzzzzzzzzzzzzzzzzzzzzz").is_empty());
        // I, L, O and U are outside the ULID alphabet
        assert!(tokenize("asset-ref://img_01hzzzzzzzzzzzzzzzzzzzzzzu").is_empty());
    }

    #[test]
    fn references_end_after_the_token() {
        let token = AssetToken::mint(MediaKind::Video);
        let reference = format!("asset-ref://{token}");
        for suffix in ["_caption", "é", "z", "0", " ok", ""] {
            let doc = format!("{reference}{suffix}");
            let spans = tokenize(&doc);
            assert_eq!(spans.len(), 1, "suffix {suffix:?}");
            assert_eq!(spans[0].text(&doc), reference);
            assert_eq!(spans[0].kind, SpanKind::Reference { token: token.clone() });
        }
    }

    #[test]
    fn uppercase_tokens_are_recognized() {
        let token = AssetToken::mint(MediaKind::Image);
        let raw = format!("img_{}", token.as_str()[4..].to_ascii_uppercase());
        let spans = tokenize(&format!("asset-ref://{raw}"));
        assert_eq!(spans[0].kind, SpanKind::Reference { token });
    }

    #[test]
    fn splice_replaces_selected_spans() {
        let token = AssetToken::mint(MediaKind::Image);
        let doc = format!("a asset-ref://{token} b asset-ref://{token} c");
        let spans = tokenize(&doc);
        let mut seen = 0;
        let out = splice(&doc, &spans, |_, _| {
            seen += 1;
            (seen == 1).then(|| "X".to_string())
        });
        assert_eq!(out, format!("a X b asset-ref://{token} c"));
    }

    proptest! {
        #[test]
        fn tokenize_never_panics_and_spans_are_ordered(doc in "\\PC{0,400}") {
            let spans = tokenize_with(&doc, 4);
            let mut last_end = 0;
            for span in &spans {
                prop_assert!(span.offset >= last_end);
                prop_assert!(doc.is_char_boundary(span.offset));
                prop_assert!(doc.is_char_boundary(span.end()));
                last_end = span.end();
            }
        }
    }
}
