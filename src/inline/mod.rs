//! Resource inlining.
//!
//! Rewrites every external reference of the working clone into inline data.
//! Stages run in a fixed order; within a stage all fetches are issued
//! together, joined, and only then applied to the tree, so the result does
//! not depend on completion order. Identical URLs within a stage are
//! fetched once.
//!
//! 1. stylesheets (`<link rel=stylesheet>` to `<style>`, `@import` flattened)
//! 2. images (`<img>`, `<video poster>`, `<source srcset>`)
//! 3. `url()` in `<style>` text and `style` attributes
//! 4. canvases (replaced by an `<img>` of the live pixels)
//! 5. links (`<a>`, `<area>`, remaining `<link>`, SVG `<use>`/`<image>` and
//!    `<track>` references made absolute)

pub mod css;

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::future::Future;

use futures::future::join_all;
use log::{debug, info};
use url::Url;

use crate::dom::{all_elements, elements_by_tag, is_tag, live_counterpart, rel_contains, Document, NodeRef};
use crate::error::FetchError;
use crate::fetch::Fetcher;
use crate::page::LivePage;
use crate::session::{find_by_identity, identity_of};
use crate::url_utils::{create_absolute_url, is_inline_reference, resolve_fetchable};

/// Image attributes consulted for a source, in priority order.
const LAZY_SOURCE_ATTRS: &[&str] = &["data-src", "data-lazy-src"];

/// `(element, attribute)` references made absolute in the last stage. The
/// SVG entries also cover `xlink:href`, which shares the local name.
const ABSOLUTIZED_REFERENCES: &[(&str, &str)] = &[
    ("a", "href"),
    ("area", "href"),
    ("link", "href"),
    ("use", "href"),
    ("image", "href"),
    ("track", "src"),
];

/// Attributes removed from images once their source is settled.
const IMAGE_CLEANUP_ATTRS: &[&str] = &["srcset", "data-src", "data-lazy-src", "loading"];

/// Outcome counters for one inlining run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InlineReport {
    /// References replaced with inline data.
    pub inlined: usize,
    /// References whose fetch failed and fell back.
    pub failed: usize,
}

impl InlineReport {
    fn record<T>(&mut self, result: Option<&Result<T, FetchError>>) {
        match result {
            Some(Ok(_)) => self.inlined += 1,
            Some(Err(_)) | None => self.failed += 1,
        }
    }
}

/// Run `fetch` once per distinct URL, concurrently, and collect the results
/// keyed by URL string.
async fn fetch_unique<'a, Fut, G>(
    urls: impl IntoIterator<Item = &'a Url>,
    fetch: G,
) -> HashMap<String, Result<String, FetchError>>
where
    G: Fn(&'a Url) -> Fut,
    Fut: Future<Output = Result<String, FetchError>>,
{
    let mut seen = HashSet::new();
    let unique: Vec<&Url> = urls
        .into_iter()
        .filter(|u| seen.insert(u.as_str().to_string()))
        .collect();

    let results = join_all(unique.iter().map(|&u| fetch(u))).await;

    unique
        .into_iter()
        .zip(results)
        .map(|(url, result)| {
            if let Err(e) = &result {
                debug!("Failed to inline {url}: {e}");
            }
            (url.to_string(), result)
        })
        .collect()
}

/// Inline every external resource of `clone`.
pub async fn inline_resources<P, F>(clone: &Document, page: &P, fetcher: &F) -> InlineReport
where
    P: LivePage + ?Sized,
    F: Fetcher,
{
    let base = page.url().clone();
    let mut report = InlineReport::default();

    inline_stylesheets(clone, &base, fetcher, &mut report).await;
    inline_images(clone, &base, fetcher, &mut report).await;
    inline_css_urls(clone, &base, fetcher, &mut report).await;
    inline_canvases(clone, page, &mut report);
    absolutize_links(clone, &base);

    info!(
        "Inlined {} resources ({} fell back to absolute references)",
        report.inlined, report.failed
    );
    report
}

/// Stage 1: replace stylesheet links with `<style>` elements.
pub async fn inline_stylesheets<F: Fetcher>(
    clone: &Document,
    base: &Url,
    fetcher: &F,
    report: &mut InlineReport,
) {
    let links: Vec<(NodeRef, Url)> = elements_by_tag(clone, "link")
        .into_iter()
        .filter(|l| rel_contains(l, "stylesheet"))
        .filter_map(|l| {
            let href = l.attr("href")?;
            resolve_fetchable(&href, base).map(|url| (l, url))
        })
        .collect();
    if links.is_empty() {
        return;
    }

    let sheets = fetch_unique(links.iter().map(|(_, u)| u), |url| async move {
        let text = fetcher.fetch_text(url).await?;
        Ok::<_, FetchError>(css::inline_imports(fetcher, &text, url).await)
    })
    .await;

    for (link, url) in links {
        let result = sheets.get(url.as_str());
        report.record(result);
        match result {
            Some(Ok(text)) => {
                let media = link
                    .attr("media")
                    .map(|m| format!(r#" media="{}""#, escape_attr(&m)))
                    .unwrap_or_default();
                link.replace_with_html(format!(
                    "<style{media}>{}</style>",
                    css::escape_style_text(text)
                ));
            }
            _ => link.set_attr("href", url.as_str()),
        }
    }
}

/// Stage 2: inline image sources, video posters and `<source srcset>`.
pub async fn inline_images<F: Fetcher>(
    clone: &Document,
    base: &Url,
    fetcher: &F,
    report: &mut InlineReport,
) {
    let mut targets: Vec<(NodeRef, &'static str, Url)> = Vec::new();
    let mut images: Vec<NodeRef> = Vec::new();

    for img in elements_by_tag(clone, "img") {
        let Some(src) = image_source(&img) else {
            continue;
        };
        images.push(img);
        if let Some(url) = resolve_fetchable(&src, base) {
            targets.push((img, "src", url));
        } else if is_inline_reference(&src) {
            img.set_attr("src", &src);
        }
    }
    for video in elements_by_tag(clone, "video") {
        if let Some(url) = video.attr("poster").and_then(|p| resolve_fetchable(&p, base)) {
            targets.push((video, "poster", url));
        }
    }

    let mut sources: Vec<(NodeRef, Url)> = Vec::new();
    for source in elements_by_tag(clone, "source") {
        let Some(first) = source.attr("srcset").and_then(|s| first_srcset_candidate(&s)) else {
            continue;
        };
        if let Some(url) = resolve_fetchable(&first, base) {
            sources.push((source, url));
        } else if !is_inline_reference(&first) {
            source.remove_from_parent();
        }
    }

    let inlined = fetch_unique(
        targets.iter().map(|(_, _, u)| u).chain(sources.iter().map(|(_, u)| u)),
        |url| fetcher.fetch_data_uri(url),
    )
    .await;

    for (node, attr, url) in targets {
        let result = inlined.get(url.as_str());
        report.record(result);
        match result {
            Some(Ok(data)) => node.set_attr(attr, data),
            _ => node.set_attr(attr, url.as_str()),
        }
    }
    for img in images {
        img.remove_attrs(IMAGE_CLEANUP_ATTRS);
    }
    for (source, url) in sources {
        let result = inlined.get(url.as_str());
        report.record(result);
        match result {
            Some(Ok(data)) => source.set_attr("srcset", data),
            _ => source.remove_from_parent(),
        }
    }
}

/// Source an `<img>` actually displays: `src`, unless it is missing or a
/// `data:` placeholder and a lazy-loading attribute names the real image.
/// Images with neither fall back to their first `srcset` candidate.
fn image_source(img: &NodeRef) -> Option<String> {
    let src = img
        .attr("src")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let lazy = LAZY_SOURCE_ATTRS
        .iter()
        .find_map(|a| img.attr(a).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()));

    match (src, lazy) {
        (Some(src), Some(lazy)) if src.starts_with("data:") => Some(lazy),
        (Some(src), _) => Some(src),
        (None, Some(lazy)) => Some(lazy),
        (None, None) => img.attr("srcset").and_then(|s| first_srcset_candidate(&s)),
    }
}

/// First URL of a `srcset` list.
fn first_srcset_candidate(srcset: &str) -> Option<String> {
    let trimmed = srcset.trim_start();
    // data: URIs contain commas; take them whole up to the descriptor.
    let candidate = if trimmed.starts_with("data:") {
        trimmed.split_whitespace().next()
    } else {
        trimmed.split(',').next().and_then(|c| c.split_whitespace().next())
    };
    candidate.map(str::to_string).filter(|c| !c.is_empty())
}

/// Stage 3: inline `url()` references in `<style>` text and `style` attributes.
pub async fn inline_css_urls<F: Fetcher>(
    clone: &Document,
    base: &Url,
    fetcher: &F,
    report: &mut InlineReport,
) {
    let styles: Vec<(NodeRef, String)> = elements_by_tag(clone, "style")
        .into_iter()
        .map(|s| {
            let text = s.text().to_string();
            (s, text)
        })
        .collect();
    let attrs: Vec<(NodeRef, String)> = all_elements(clone)
        .into_iter()
        .filter_map(|el| el.attr("style").map(|s| (el, s.to_string())))
        .filter(|(_, s)| s.contains("url("))
        .collect();

    let urls: Vec<Url> = styles
        .iter()
        .chain(attrs.iter())
        .flat_map(|(_, text)| css::collect_css_urls(text, base))
        .collect();
    if urls.is_empty() {
        return;
    }

    let fetched = fetch_unique(urls.iter(), |url| fetcher.fetch_data_uri(url)).await;
    for result in fetched.values() {
        report.record(Some(result));
    }
    let inlined: HashMap<String, String> = fetched
        .into_iter()
        .filter_map(|(url, r)| r.ok().map(|data| (url, data)))
        .collect();

    for (style, text) in styles {
        let rewritten = css::rewrite_css_urls(&text, base, &inlined);
        if rewritten != text {
            style.set_text(rewritten);
        }
    }
    for (el, text) in attrs {
        el.set_attr("style", &css::rewrite_css_urls(&text, base, &inlined));
    }
}

/// Stage 4: replace canvases with an image of their live pixels.
///
/// Clone canvases carrying an identity are matched to the live canvas with
/// the same identity; untagged ones through the shared arena slot.
pub fn inline_canvases<P: LivePage + ?Sized>(clone: &Document, page: &P, report: &mut InlineReport) {
    let live = page.document();

    for canvas in elements_by_tag(clone, "canvas") {
        let source = match identity_of(&canvas) {
            Some(id) => find_by_identity(live, id).filter(|n| is_tag(n, "canvas")),
            None => live_counterpart(live, &canvas),
        };
        let Some(source) = source else {
            continue;
        };
        let Some(data) = page.canvas_snapshot(source.id) else {
            continue;
        };

        let mut img = format!(r#"<img src="{}""#, escape_attr(&data));
        for dim in ["width", "height"] {
            if let Some(v) = source.attr(dim) {
                let _ = write!(img, r#" {dim}="{}""#, escape_attr(&v));
            }
        }
        img.push('>');
        canvas.replace_with_html(img);
        report.inlined += 1;
    }
}

/// Stage 5: rewrite remaining navigational and non-inlined references to
/// absolute URLs.
pub fn absolutize_links(clone: &Document, base: &Url) {
    for &(tag, attr) in ABSOLUTIZED_REFERENCES {
        for el in elements_by_tag(clone, tag) {
            let Some(value) = el.attr(attr) else {
                continue;
            };
            let absolute = create_absolute_url(&value, base);
            if *absolute != *value {
                el.set_attr(attr, &absolute);
            }
        }
    }
}

/// Escape a value for a double-quoted HTML attribute.
fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
