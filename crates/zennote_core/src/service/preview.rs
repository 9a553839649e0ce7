//! Plain-text projections of opaque rich note content.
//!
//! The store never interprets content when persisting it; these helpers are
//! read-only views for listings and for handing text to external services.

use once_cell::sync::Lazy;
use regex::Regex;

const PREVIEW_TEXT_CHARS: usize = 100;

static HIDDEN_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)\s*>").expect("valid hidden block regex")
});
static IMAGE_SRC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid image regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Preview projection of one note body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentPreview {
    pub preview_text: Option<String>,
    /// First embedded image source, e.g. a sketch data URL.
    pub preview_image: Option<String>,
}

/// Derives preview fields from HTML content.
///
/// Rules:
/// - `preview_image`: `src` of the first `<img>` tag.
/// - `preview_text`: tags removed, common entities decoded, whitespace
///   normalized, first 100 chars retained.
pub fn derive_content_preview(content: &str) -> ContentPreview {
    let preview_image = IMAGE_SRC_RE
        .captures(content)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|value| !value.is_empty());

    let text = plain_text(content);
    let preview_text = if text.is_empty() {
        None
    } else {
        Some(text.chars().take(PREVIEW_TEXT_CHARS).collect())
    };

    ContentPreview {
        preview_text,
        preview_image,
    }
}

/// Short plain-text preview, `None` when the content has no visible text.
pub fn derive_text_preview(content: &str) -> Option<String> {
    derive_content_preview(content).preview_text
}

/// Full visible text of HTML content on a single line.
pub fn plain_text(content: &str) -> String {
    let without_hidden = HIDDEN_BLOCK_RE.replace_all(content, " ");
    let without_tags = TAG_RE.replace_all(&without_hidden, " ");
    let decoded = decode_entities(&without_tags);
    WHITESPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entities(value: &str) -> String {
    // `&amp;` last so `&amp;lt;` stays the literal text `&lt;`.
    value
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::{derive_content_preview, derive_text_preview, plain_text};

    #[test]
    fn preview_strips_tags_and_decodes_entities() {
        let text = derive_text_preview("<h1>Plan</h1><p>Fish &amp; chips&nbsp;<b>now</b></p>")
            .expect("preview_text should exist");
        assert_eq!(text, "Plan Fish & chips now");
    }

    #[test]
    fn preview_limits_length_and_skips_empty_markup() {
        let long = format!("<p>{}</p>", "word ".repeat(60));
        let text = derive_text_preview(&long).expect("preview_text should exist");
        assert_eq!(text.chars().count(), 100);
        assert_eq!(derive_text_preview("<p> </p><br/>"), None);
    }

    #[test]
    fn preview_extracts_first_image_source() {
        let preview =
            derive_content_preview(r#"<p>x</p><img src="data:image/png;base64,AA"><img src='b.png'>"#);
        assert_eq!(
            preview.preview_image.as_deref(),
            Some("data:image/png;base64,AA")
        );
    }

    #[test]
    fn plain_text_drops_script_bodies() {
        assert_eq!(plain_text("a<script>alert(1)</script>b"), "a b");
        assert_eq!(plain_text("&amp;lt;"), "&lt;");
    }
}
