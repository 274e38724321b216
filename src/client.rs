//! Client for the local storage endpoint that persists captures.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::result::CaptureResult;

/// Address of the storage endpoint when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3210";

/// Payload accepted by `POST /api/save`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    /// Page URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Favicon `data:` URI, may be empty.
    pub favicon: String,
    /// Self-contained document.
    pub html: String,
    /// Screenshot `data:` URI supplied by the caller, may be empty.
    pub screenshot: String,
    /// Browser bookmark this capture belongs to.
    pub bookmark_id: Option<String>,
}

impl SaveRequest {
    /// Build a request from a capture of `url`.
    #[must_use]
    pub fn from_capture(url: impl Into<String>, result: CaptureResult) -> Self {
        Self {
            url: url.into(),
            title: result.title,
            favicon: result.favicon,
            html: result.html,
            ..Self::default()
        }
    }

    /// Attach a screenshot `data:` URI.
    #[must_use]
    pub fn with_screenshot(mut self, screenshot: impl Into<String>) -> Self {
        self.screenshot = screenshot.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP client for the storage endpoint.
#[derive(Debug, Clone)]
pub struct StorageClient {
    client: reqwest::Client,
    base: Url,
}

impl StorageClient {
    /// Client for the endpoint at `base` (e.g. [`DEFAULT_ENDPOINT`]).
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base).map_err(|e| Error::Storage(format!("invalid endpoint {base}: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::Storage(format!("invalid endpoint path {path}: {e}")))
    }

    /// Store a capture and return its identifier.
    pub async fn save(&self, request: &SaveRequest) -> Result<String> {
        let url = self.endpoint("/api/save")?;
        debug!("Saving capture of {} to {url}", request.url);

        let response = self.client.post(url).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let reason = serde_json::from_str::<ErrorResponse>(&body)
                .map_or_else(|_| body.clone(), |e| e.error);
            return Err(Error::Storage(format!("{status}: {reason}")));
        }

        let saved: SaveResponse = serde_json::from_str(&body)?;
        info!("Saved capture of {} as {}", request.url, saved.id);
        Ok(saved.id)
    }

    /// Tell the endpoint a capture client is alive.
    pub async fn ping(&self) -> Result<()> {
        let url = self.endpoint("/api/extension/ping")?;
        let response = self.client.post(url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Storage(format!("ping returned {}", response.status())))
        }
    }
}
