//! # collect-capture
//!
//! Snapshot a live, rendered web page into a single self-contained HTML
//! document.
//!
//! Every stylesheet, image, font, canvas and favicon is embedded as inline
//! data, scripts and request triggers are stripped, and content that the page
//! only renders while it is on screen (virtual scrolling) is recovered and
//! merged back in.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use collect_capture::{capture_html, FetchConfig, HttpFetcher};
//!
//! # async fn run() -> collect_capture::Result<()> {
//! let html = r#"<html><head><title>Saved</title><link rel="stylesheet" href="/site.css"></head>
//! <body><img src="/logo.png"></body></html>"#;
//!
//! let fetcher = HttpFetcher::new(&FetchConfig::default())?;
//! let result = capture_html(html, "https://example.com/", &fetcher).await?;
//! println!("{}: {} bytes", result.title, result.html.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! - **Drive-through**: the page is scrolled top to bottom so lazy content
//!   renders; on virtual-rendering pages every element gets a session
//!   identity, visible elements are marked and removals are recorded.
//! - **Reconcile**: removed content that never came back is merged into a
//!   clone of the document, deduplicated by identity and content keys.
//! - **Sanitize**: scripts, frames and resource hints are removed and
//!   expanded panels are frozen open.
//! - **Gap cleaning**: empty placeholder containers are dropped.
//! - **Inline**: stylesheets (with nested `@import`s), images, CSS `url()`s
//!   and canvases become inline data; links become absolute.
//! - **Assemble**: session marks are stripped and the document serialized.
//!
//! Hosts drive real pages by implementing [`LivePage`]; [`StaticPage`] covers
//! HTML that is already rendered.

mod assemble;
mod capture;
mod error;
mod options;
mod patterns;
mod result;

/// DOM operations adapter over `dom_query`.
pub mod dom;

/// URL utilities for resolution and classification.
pub mod url_utils;

/// Character encoding detection and transcoding.
pub mod encoding;

/// Host page abstraction.
pub mod page;

/// Session identities and visibility marks.
pub mod session;

/// Drive-through pass and visibility marking.
pub mod driver;

/// Mutation tracking during the drive-through pass.
pub mod tracker;

/// Merging recovered content into the working clone.
pub mod reconcile;

/// Script and request-trigger removal, panel freezing.
pub mod sanitize;

/// Placeholder container removal.
pub mod gaps;

/// Resource retrieval.
pub mod fetch;

/// Resource inlining.
pub mod inline;

/// Layout-free host for already rendered HTML.
pub mod static_page;

/// Storage endpoint client.
pub mod client;

// Public API - re-exports
pub use assemble::{favicon_url, DOCTYPE};
pub use client::{SaveRequest, StorageClient};
pub use error::{Error, FetchError, Result};
pub use fetch::{FetchConfig, FetchedResource, Fetcher, HttpFetcher};
pub use options::{GapThresholds, Options};
pub use page::LivePage;
pub use result::{CaptureResult, CaptureStats};
pub use static_page::StaticPage;

/// Captures a live page using default options.
///
/// Fails only when the document cannot be enumerated (no root or no body).
/// Individual resource failures degrade to absolute references.
///
/// # Example
///
/// ```rust,no_run
/// use collect_capture::{capture, FetchConfig, HttpFetcher, StaticPage};
///
/// # async fn run() -> collect_capture::Result<()> {
/// let mut page = StaticPage::parse("<html><body><p>Hi</p></body></html>", "https://example.com/")?;
/// let fetcher = HttpFetcher::new(&FetchConfig::default())?;
/// let result = capture(&mut page, &fetcher).await?;
/// assert!(result.html.starts_with("<!DOCTYPE html>"));
/// # Ok(())
/// # }
/// ```
pub async fn capture<P, F>(page: &mut P, fetcher: &F) -> Result<CaptureResult>
where
    P: LivePage + ?Sized,
    F: Fetcher,
{
    capture_with_options(page, fetcher, &Options::default()).await
}

/// Captures a live page with custom options.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use collect_capture::{capture_with_options, FetchConfig, HttpFetcher, Options, StaticPage};
///
/// # async fn run() -> collect_capture::Result<()> {
/// let mut page = StaticPage::parse("<html><body></body></html>", "https://example.com/")?;
/// let fetcher = HttpFetcher::new(&FetchConfig::default())?;
/// let options = Options {
///     image_deadline: Duration::from_secs(2),
///     ..Options::default()
/// };
/// let result = capture_with_options(&mut page, &fetcher, &options).await?;
/// # Ok(())
/// # }
/// ```
pub async fn capture_with_options<P, F>(page: &mut P, fetcher: &F, options: &Options) -> Result<CaptureResult>
where
    P: LivePage + ?Sized,
    F: Fetcher,
{
    capture::capture_page(page, fetcher, options)
        .await
        .map(|(result, _)| result)
}

/// Captures a live page and returns per-stage counters alongside the result.
pub async fn capture_with_stats<P, F>(
    page: &mut P,
    fetcher: &F,
    options: &Options,
) -> Result<(CaptureResult, CaptureStats)>
where
    P: LivePage + ?Sized,
    F: Fetcher,
{
    capture::capture_page(page, fetcher, options).await
}

/// Captures an already rendered HTML document loaded from `url`.
///
/// Relative references resolve against `url`.
pub async fn capture_html<F: Fetcher>(html: &str, url: &str, fetcher: &F) -> Result<CaptureResult> {
    let mut page = StaticPage::parse(html, url)?;
    capture(&mut page, fetcher).await
}

/// Captures HTML bytes with automatic encoding detection.
///
/// The charset is taken from a BOM or `<meta charset>`, defaulting to UTF-8.
pub async fn capture_bytes<F: Fetcher>(html: &[u8], url: &str, fetcher: &F) -> Result<CaptureResult> {
    let mut page = StaticPage::from_bytes(html, url)?;
    capture(&mut page, fetcher).await
}
