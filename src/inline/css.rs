//! Stylesheet text processing: `@import` flattening and `url()` rewriting.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::ops::Range;

use futures::future::{join_all, LocalBoxFuture};
use futures::FutureExt;
use log::debug;
use url::Url;

use crate::fetch::Fetcher;
use crate::patterns::{CSS_CHARSET, CSS_IMPORT, CSS_URL};
use crate::url_utils::{create_absolute_url, is_inline_reference, resolve_fetchable};

/// Upper bound on `@import` rules inlined for a single top-level stylesheet.
pub const MAX_INLINE_IMPORTS: usize = 64;

/// Rewrite each `url()` in `css` through `rewrite`, which receives the raw
/// (trimmed) reference and returns the replacement reference, or `None` to
/// keep the occurrence untouched.
fn map_css_urls<F>(css: &str, mut rewrite: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    CSS_URL
        .replace_all(css, |caps: &regex::Captures| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let raw = caps.get(2).map_or("", |m| m.as_str()).trim();
            if raw.is_empty() || is_inline_reference(raw) {
                return whole.to_string();
            }
            match rewrite(raw) {
                Some(new) => format!("url(\"{new}\")"),
                None => whole.to_string(),
            }
        })
        .into_owned()
}

/// Resolve every relative `url()` in `css` against `base`.
#[must_use]
pub fn absolutize_css_urls(css: &str, base: &Url) -> String {
    map_css_urls(css, |raw| Some(create_absolute_url(raw, base)))
}

/// Fetchable `url()` targets of `css`, resolved against `base`, deduplicated
/// in order of first appearance.
#[must_use]
pub fn collect_css_urls(css: &str, base: &Url) -> Vec<Url> {
    let mut seen = Vec::new();
    for caps in CSS_URL.captures_iter(css) {
        let raw = caps.get(2).map_or("", |m| m.as_str()).trim();
        if let Some(url) = resolve_fetchable(raw, base) {
            if !seen.contains(&url) {
                seen.push(url);
            }
        }
    }
    seen
}

/// Substitute `url()` targets with their inline data.
///
/// `inlined` maps absolute URLs to `data:` URIs. References without an entry
/// (failed fetches) are left as absolute URLs.
#[must_use]
pub fn rewrite_css_urls(css: &str, base: &Url, inlined: &HashMap<String, String>) -> String {
    map_css_urls(css, |raw| {
        let absolute = create_absolute_url(raw, base);
        Some(inlined.get(&absolute).cloned().unwrap_or(absolute))
    })
}

/// Drop a leading `@charset` rule; it is meaningless once the text is embedded.
#[must_use]
pub fn strip_charset_rule(css: &str) -> &str {
    match CSS_CHARSET.find(css) {
        Some(m) => &css[m.end()..],
        None => css,
    }
}

/// Keep `</style` sequences from terminating an embedding `<style>` element.
#[must_use]
pub fn escape_style_text(css: &str) -> String {
    css.replace("</style", "<\\/style")
        .replace("</STYLE", "<\\/STYLE")
}

/// One `@import` rule found in a stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRule {
    /// Byte span of the whole rule, including the trailing `;`.
    pub span: Range<usize>,
    /// Resolved target, `None` when it cannot be fetched.
    pub target: Option<Url>,
    /// Media query list following the target (may be empty).
    pub media: String,
}

/// Find the `@import` rules of a stylesheet.
#[must_use]
pub fn find_imports(css: &str, base: &Url) -> Vec<ImportRule> {
    CSS_IMPORT
        .captures_iter(css)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let raw = caps.get(1).map_or("", |m| m.as_str());
            let target = if raw.starts_with("data:") {
                Url::parse(raw).ok()
            } else {
                resolve_fetchable(raw, base)
            };
            Some(ImportRule {
                span: whole.range(),
                target,
                media: caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
            })
        })
        .collect()
}

/// Fetch `@import` targets recursively and substitute them into `css`.
///
/// All imports at one nesting level are fetched concurrently. Imports that
/// fail, that would recurse into an ancestor sheet, or that exceed
/// [`MAX_INLINE_IMPORTS`] are replaced with nothing. Relative `url()`s of
/// every sheet are resolved against that sheet's own URL first.
pub async fn inline_imports<F: Fetcher>(fetcher: &F, css: &str, sheet_url: &Url) -> String {
    let budget = Cell::new(MAX_INLINE_IMPORTS);
    resolve_level(
        fetcher,
        css.to_string(),
        sheet_url.clone(),
        vec![sheet_url.to_string()],
        &budget,
    )
    .await
}

fn resolve_level<'a, F: Fetcher>(
    fetcher: &'a F,
    css: String,
    base: Url,
    ancestors: Vec<String>,
    budget: &'a Cell<usize>,
) -> LocalBoxFuture<'a, String> {
    async move {
        let css = absolutize_css_urls(strip_charset_rule(&css), &base);
        let imports = find_imports(&css, &base);
        if imports.is_empty() {
            return css;
        }

        let fetches = imports.iter().map(|rule| {
            let ancestors = &ancestors;
            async move {
                let url = rule.target.as_ref()?;
                if ancestors.iter().any(|a| a == url.as_str()) {
                    debug!("Skipping cyclic @import of {url}");
                    return None;
                }
                if budget.get() == 0 {
                    debug!("Import limit reached, dropping {url}");
                    return None;
                }
                budget.set(budget.get() - 1);

                match fetcher.fetch_text(url).await {
                    Ok(text) => {
                        let mut chain = ancestors.clone();
                        chain.push(url.to_string());
                        Some(resolve_level(fetcher, text, url.clone(), chain, budget).await)
                    }
                    Err(e) => {
                        debug!("Failed to load @import {url}: {e}");
                        None
                    }
                }
            }
        });
        let bodies = join_all(fetches).await;

        let mut out = String::with_capacity(css.len());
        let mut last = 0;
        for (rule, body) in imports.iter().zip(bodies) {
            out.push_str(&css[last..rule.span.start]);
            if let Some(body) = body {
                if rule.media.is_empty() || rule.media.eq_ignore_ascii_case("all") {
                    out.push_str(&body);
                } else {
                    let _ = write!(out, "@media {} {{\n{}\n}}", rule.media, body);
                }
            }
            last = rule.span.end;
        }
        out.push_str(&css[last..]);
        out
    }
    .boxed_local()
}
