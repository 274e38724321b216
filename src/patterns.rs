//! Compiled regex patterns for CSS and inline-style processing.
//!
//! All patterns are compiled once at first use via `LazyLock`.

#![allow(clippy::expect_used)]

use std::sync::LazyLock;

use regex::Regex;

// =============================================================================
// Stylesheet Patterns
// =============================================================================

/// Matches a CSS `url(...)` reference.
///
/// Group 1 is the opening quote (possibly empty) so the closing quote must
/// match it; group 2 is the raw reference.
pub static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(['"]?)([^'")]+)['"]?\s*\)"#).expect("CSS_URL regex")
});

/// Matches an `@import` rule with either a bare string or `url()` target.
///
/// Group 1 is the import target, group 2 any trailing media query list.
pub static CSS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s+(?:url\(\s*)?['"]?([^'")\s;]+)['"]?\s*\)?([^;]*);"#)
        .expect("CSS_IMPORT regex")
});

/// Matches a leading `@charset "...";` rule.
pub static CSS_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*@charset\s+["']([^"']+)["']\s*;"#).expect("CSS_CHARSET regex")
});

// =============================================================================
// Inline Style Patterns
// =============================================================================

/// Matches a CSS pixel length such as `1200px` or `12.5px`.
pub static PX_LENGTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(-?\d+(?:\.\d+)?)px\s*$").expect("PX_LENGTH regex"));
