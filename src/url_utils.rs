//! URL Utility Functions
//!
//! Resolution of page-relative references against the page or stylesheet
//! URL, and classification of references that are already self-contained.

use url::Url;

/// Check if a string is a valid absolute http(s) URL.
///
/// # Returns
/// * `(is_absolute, parsed_url)` - Whether URL is absolute and the parsed URL if valid
#[must_use]
pub fn is_absolute_url(s: &str) -> (bool, Option<Url>) {
    let s = s.trim();

    if s.is_empty() {
        return (false, None);
    }

    // Must start with http:// or https://
    let lower = s.get(..8).map(str::to_ascii_lowercase).unwrap_or_default();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return (false, None);
    }

    match Url::parse(s) {
        Ok(url) if url.host().is_some() => (true, Some(url)),
        _ => (false, None),
    }
}

/// Whether a reference needs no network access: a `data:` URI or a
/// same-document `#fragment`.
#[must_use]
pub fn is_inline_reference(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with('#')
        || s.get(..5)
            .is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

/// Whether a reference is non-fetchable by design (`javascript:`, `mailto:`,
/// `tel:`, `about:`, `blob:`).
#[must_use]
pub fn is_special_scheme(s: &str) -> bool {
    const SPECIAL: &[&str] = &["javascript:", "mailto:", "tel:", "about:", "blob:"];
    let lower = s.trim_start().to_ascii_lowercase();
    SPECIAL.iter().any(|p| lower.starts_with(p))
}

/// Convert a relative or absolute URL to absolute form.
///
/// # Arguments
/// * `url_str` - The URL to resolve (can be relative, protocol-relative or absolute)
/// * `base` - The base URL for resolution
///
/// # Returns
/// * The absolute URL string, or the original if resolution fails
#[must_use]
pub fn create_absolute_url(url_str: &str, base: &Url) -> String {
    let url_str = url_str.trim();

    if url_str.is_empty() {
        return String::new();
    }

    // Preserve special URLs unchanged
    if is_inline_reference(url_str) || is_special_scheme(url_str) {
        return url_str.to_string();
    }

    // If already absolute, return as-is
    let (is_abs, _) = is_absolute_url(url_str);
    if is_abs {
        return url_str.to_string();
    }

    // Resolve relative (and protocol-relative) URL against base
    match base.join(url_str) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => url_str.to_string(),
    }
}

/// Resolve `url_str` against `base`, returning the parsed URL when the
/// result is a fetchable http(s) URL.
#[must_use]
pub fn resolve_fetchable(url_str: &str, base: &Url) -> Option<Url> {
    let url_str = url_str.trim();
    if url_str.is_empty() || is_inline_reference(url_str) || is_special_scheme(url_str) {
        return None;
    }
    let resolved = base.join(url_str).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

/// Whether a reference kept in a self-contained document is acceptable:
/// inline data, a fragment, a special scheme, or an absolute URL.
#[must_use]
pub fn is_self_contained_reference(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || is_inline_reference(s) || is_special_scheme(s) || is_absolute_url(s).0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://forum.example.com/t/topic/42").expect("valid base")
    }

    #[test]
    fn test_is_absolute_url() {
        assert!(is_absolute_url("https://example.com/a.png").0);
        assert!(is_absolute_url("HTTP://example.com").0);
        assert!(!is_absolute_url("/a.png").0);
        assert!(!is_absolute_url("//cdn.example.com/a.png").0);
        assert!(!is_absolute_url("data:image/png;base64,AA==").0);
        assert!(!is_absolute_url("").0);
    }

    #[test]
    fn test_create_absolute_url_relative() {
        assert_eq!(
            create_absolute_url("../img/a.png", &base()),
            "https://forum.example.com/t/img/a.png"
        );
        assert_eq!(
            create_absolute_url("/favicon.ico", &base()),
            "https://forum.example.com/favicon.ico"
        );
    }

    #[test]
    fn test_create_absolute_url_protocol_relative() {
        assert_eq!(
            create_absolute_url("//cdn.example.com/x.css", &base()),
            "https://cdn.example.com/x.css"
        );
    }

    #[test]
    fn test_create_absolute_url_preserves_special() {
        for s in ["data:text/css,a", "#top", "mailto:a@b.c", "javascript:void(0)"] {
            assert_eq!(create_absolute_url(s, &base()), s);
        }
    }

    #[test]
    fn test_resolve_fetchable() {
        assert_eq!(
            resolve_fetchable("a.png", &base()).map(|u| u.to_string()),
            Some("https://forum.example.com/t/topic/a.png".to_string())
        );
        assert!(resolve_fetchable("#frag", &base()).is_none());
        assert!(resolve_fetchable("data:image/gif;base64,R0", &base()).is_none());
        assert!(resolve_fetchable("ftp://x/y", &base()).is_none());
    }

    #[test]
    fn test_self_contained_reference() {
        assert!(is_self_contained_reference("data:image/png;base64,AA=="));
        assert!(is_self_contained_reference("https://example.com/x"));
        assert!(is_self_contained_reference("#x"));
        assert!(!is_self_contained_reference("img/x.png"));
        assert!(!is_self_contained_reference("//cdn.example.com/x.png"));
    }
}
