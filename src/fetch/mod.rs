//! Resource retrieval.
//!
//! A [`Fetcher`] retrieves bytes for a URL through the page's own network
//! context. The provided methods turn those bytes into what the inliner
//! embeds: a base64 `data:` URI for binary resources, decoded text for
//! stylesheets. `data:` URLs are decoded locally and never reach
//! [`Fetcher::fetch`].

mod data_url;
mod http;

use base64::Engine;
use url::Url;

use crate::encoding::{decode_text, TextKind};
use crate::error::FetchError;

pub use data_url::decode_data_url;
pub use http::{FetchConfig, HttpFetcher};

/// Fallback media type when neither the response nor the URL tells us.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Bytes retrieved for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    /// Response body.
    pub bytes: Vec<u8>,
    /// `Content-Type` as reported by the server, if any.
    pub content_type: Option<String>,
}

impl FetchedResource {
    /// Create a new fetched resource.
    #[must_use]
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    /// Media type without parameters, falling back to a guess from the URL.
    #[must_use]
    pub fn media_type(&self, url: &Url) -> String {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .map_or_else(
                || guess_content_type(url.path()).to_string(),
                str::to_ascii_lowercase,
            )
    }

    /// Encode as a base64 `data:` URI.
    #[must_use]
    pub fn to_data_uri(&self, url: &Url) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{encoded}", self.media_type(url))
    }

    /// Decode the body as text.
    #[must_use]
    pub fn to_text(&self, kind: TextKind) -> String {
        decode_text(&self.bytes, self.content_type.as_deref(), kind)
    }
}

/// Media type guessed from a path's extension.
#[must_use]
pub fn guess_content_type(path: &str) -> &'static str {
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("bmp") => "image/bmp",
        Some("css") => "text/css",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Retrieves resources on behalf of the page.
///
/// Implementors only provide [`Fetcher::fetch`]; everything else is derived.
/// Futures are polled on the capture task and need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    /// Retrieve the body of an http(s) URL.
    async fn fetch(&self, url: &Url) -> Result<FetchedResource, FetchError>;

    /// Retrieve a URL, decoding `data:` URLs locally.
    async fn retrieve(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        match url.scheme() {
            "data" => decode_data_url(url.as_str()),
            "http" | "https" => self.fetch(url).await,
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Retrieve a URL as a base64 `data:` URI.
    async fn fetch_data_uri(&self, url: &Url) -> Result<String, FetchError> {
        if url.scheme() == "data" {
            return Ok(url.as_str().to_string());
        }
        let resource = self.retrieve(url).await?;
        Ok(resource.to_data_uri(url))
    }

    /// Retrieve a stylesheet as decoded text.
    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        let resource = self.retrieve(url).await?;
        Ok(resource.to_text(TextKind::Css))
    }
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    async fn fetch(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        (**self).fetch(url).await
    }
}
