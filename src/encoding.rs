//! Character encoding detection and transcoding.
//!
//! Fetched text resources (stylesheets, `@import` targets) and local HTML
//! input arrive as bytes. The charset is taken from, in order: a byte order
//! mark, the `Content-Type` charset parameter, an in-document declaration
//! (`@charset` for CSS, `<meta>` for HTML), and finally UTF-8.

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use std::sync::LazyLock;

use crate::patterns::CSS_CHARSET;

/// Match `<meta charset="...">` tag
#[allow(clippy::expect_used)]
static CHARSET_META_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([^"'\s>;]+)"#).expect("valid regex")
});

/// Match `charset=...` inside a `Content-Type` value
#[allow(clippy::expect_used)]
static CONTENT_TYPE_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i);\s*charset\s*=\s*["']?([^"'\s;]+)"#).expect("valid regex")
});

/// Kind of document the bytes hold, which decides the in-document declaration to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    /// HTML document (`<meta charset>`).
    Html,
    /// CSS stylesheet (`@charset`).
    Css,
    /// Anything else; no in-document declaration.
    Plain,
}

/// Extract the charset parameter from a `Content-Type` header value.
#[must_use]
pub fn content_type_charset(content_type: &str) -> Option<&'static Encoding> {
    CONTENT_TYPE_CHARSET_RE
        .captures(content_type)
        .and_then(|c| c.get(1))
        .and_then(|m| Encoding::for_label(m.as_str().as_bytes()))
}

/// Detect character encoding from the in-document declaration.
///
/// Only examines the first 1024 bytes for performance.
#[must_use]
pub fn detect_declared_encoding(bytes: &[u8], kind: TextKind) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(1024)];
    let head_str = String::from_utf8_lossy(head);

    let charset = match kind {
        TextKind::Html => CHARSET_META_RE.captures(&head_str),
        TextKind::Css => CSS_CHARSET.captures(&head_str),
        TextKind::Plain => None,
    }?;
    charset
        .get(1)
        .and_then(|m| Encoding::for_label(m.as_str().as_bytes()))
}

/// Decode bytes to a UTF-8 string.
///
/// Uses lossy conversion to handle invalid sequences gracefully
/// (replacing them with U+FFFD). A BOM always wins and is stripped.
///
/// # Examples
///
/// ```
/// use collect_capture::encoding::{decode_text, TextKind};
///
/// let css = b"@charset \"ISO-8859-1\";\n.a::before{content:\"caf\xE9\"}";
/// let text = decode_text(css, None, TextKind::Css);
/// assert!(text.contains("caf\u{e9}"));
/// ```
#[must_use]
pub fn decode_text(bytes: &[u8], content_type: Option<&str>, kind: TextKind) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (decoded, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return decoded.into_owned();
    }

    let encoding = content_type
        .and_then(content_type_charset)
        .or_else(|| detect_declared_encoding(bytes, kind))
        .unwrap_or(UTF_8);

    if encoding == UTF_8 {
        // Fast path for UTF-8: just do lossy conversion
        return String::from_utf8_lossy(bytes).into_owned();
    }

    let (decoded, _encoding_used, _had_errors) = encoding.decode(bytes);
    decoded.into_owned()
}

/// Transcode HTML bytes to a UTF-8 string using its `<meta>` declaration.
#[must_use]
pub fn transcode_to_utf8(html: &[u8]) -> String {
    decode_text(html, None, TextKind::Html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_iso88591_from_meta_charset() {
        let html = br#"<html><head><meta charset="ISO-8859-1"></head><body>Test</body></html>"#;
        let encoding = detect_declared_encoding(html, TextKind::Html);
        // encoding_rs maps ISO-8859-1 to windows-1252 per WHATWG
        assert_eq!(encoding.map(Encoding::name), Some("windows-1252"));
    }

    #[test]
    fn detect_css_charset_rule() {
        let css = br#"@charset "windows-1251"; body { color: red }"#;
        let encoding = detect_declared_encoding(css, TextKind::Css);
        assert_eq!(encoding.map(Encoding::name), Some("windows-1251"));
    }

    #[test]
    fn plain_text_has_no_declaration() {
        assert!(detect_declared_encoding(b"@charset \"latin1\";", TextKind::Plain).is_none());
    }

    #[test]
    fn content_type_parameter_is_parsed() {
        let encoding = content_type_charset("text/css; charset=\"Shift_JIS\"");
        assert_eq!(encoding.map(Encoding::name), Some("Shift_JIS"));
        assert!(content_type_charset("text/css").is_none());
    }

    #[test]
    fn content_type_beats_declaration() {
        let css = b"@charset \"windows-1251\"; .a{content:\"\xE9\"}";
        let text = decode_text(css, Some("text/css; charset=iso-8859-1"), TextKind::Css);
        assert!(text.contains('\u{e9}'));
    }

    #[test]
    fn bom_beats_everything() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("caf\u{e9}".as_bytes());
        let text = decode_text(&bytes, Some("text/css; charset=windows-1252"), TextKind::Css);
        assert_eq!(text, "caf\u{e9}");
    }

    #[test]
    fn transcode_utf8_passthrough() {
        let html = b"<html><body>Hello, World!</body></html>";
        assert_eq!(transcode_to_utf8(html), "<html><body>Hello, World!</body></html>");
    }

    #[test]
    fn transcode_windows1252_to_utf8() {
        let html = b"<html><head><meta charset=\"windows-1252\"></head><body>\x93quoted\x94</body></html>";
        let result = transcode_to_utf8(html);
        assert!(result.contains("\u{201c}quoted\u{201d}"));
    }

    #[test]
    fn handle_invalid_utf8_gracefully() {
        let result = decode_text(b"ok \xFF\xFE\xFD", None, TextKind::Plain);
        assert!(result.starts_with("ok "));
        assert!(result.contains('\u{FFFD}'));
    }
}
