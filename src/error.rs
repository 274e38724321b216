//! Error types for collect-capture.
//!
//! Capture either succeeds (possibly with some resources left un-inlined)
//! or fails outright with one of the structural [`Error`] variants.
//! Per-resource failures are reported through [`FetchError`] and are always
//! recovered inside the pipeline.

/// Error type for capture operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document has no root element to enumerate.
    #[error("Document root element is unreachable")]
    NoRoot,

    /// The document has no body element to drive or observe.
    #[error("Document has no body element")]
    NoBody,

    /// General capture failure.
    #[error("Capture failed: {0}")]
    Capture(String),

    /// The storage endpoint rejected a save request.
    #[error("Storage endpoint error: {0}")]
    Storage(String),

    /// A resource client could not be set up.
    #[error("Fetcher setup failed: {0}")]
    Fetch(#[from] FetchError),

    /// Transport failure talking to the storage endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response payload could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure retrieving a single resource.
///
/// Never escapes [`crate::capture`]; callers inside the pipeline fall back
/// to the original (absolute) reference or drop the element.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Server answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Connection, timeout or body read failure.
    #[error("network error for {url}: {reason}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying error message.
        reason: String,
    },

    /// Malformed `data:` URL.
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),

    /// URL scheme the fetcher cannot retrieve (e.g. `blob:`, `chrome:`).
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Result type alias for capture operations.
pub type Result<T> = std::result::Result<T, Error>;
