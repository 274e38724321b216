use std::time::Duration;

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE, REFERER};
use url::Url;

use super::{FetchedResource, Fetcher};
use crate::error::FetchError;

/// Options for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// `Cookie` header of the page, so resources load with the page's session.
    pub cookie: Option<String>,
    /// `Referer` sent with every request, usually the page URL.
    pub referer: Option<String>,
    /// Timeout for individual resource loads.
    pub request_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("collect-capture/", env!("CARGO_PKG_VERSION")).to_string(),
            cookie: None,
            referer: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// [`Fetcher`] backed by a `reqwest` client carrying the page's credentials.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher from a configuration.
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.cookie {
            headers.insert(COOKIE, header_value(cookie)?);
        }
        if let Some(referer) = &config.referer {
            headers.insert(REFERER, header_value(referer)?);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                reason: format!("client build error: {e}"),
            })?;

        Ok(Self { client })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(value).map_err(|e| FetchError::Network {
        url: String::new(),
        reason: format!("invalid header value: {e}"),
    })
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        let network = |e: reqwest::Error| FetchError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        };

        debug!("Loading {url}");
        let response = self.client.get(url.clone()).send().await.map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let bytes = response.bytes().await.map_err(network)?;

        debug!("Successfully loaded {url} ({} bytes)", bytes.len());
        Ok(FetchedResource::new(bytes.to_vec(), content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = FetchConfig::default();
        assert!(config.user_agent.starts_with("collect-capture/"));
        assert!(config.cookie.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_invalid_cookie_header() {
        let config = FetchConfig {
            cookie: Some("a=b\nInjected: x".into()),
            ..FetchConfig::default()
        };
        assert!(HttpFetcher::new(&config).is_err());
    }

    #[test]
    fn builds_with_credentials() {
        let config = FetchConfig {
            cookie: Some("session=abc".into()),
            referer: Some("https://forum.example.com/t/1".into()),
            ..FetchConfig::default()
        };
        assert!(HttpFetcher::new(&config).is_ok());
    }
}
