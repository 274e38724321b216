//! Result types for capture output.

use serde::{Deserialize, Serialize};

/// The terminal output of a capture.
///
/// `html` is a complete, self-contained document: every stylesheet, image
/// and canvas is embedded as inline data and no scripts remain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureResult {
    /// Page title as reported by the host.
    pub title: String,

    /// Favicon as an inline `data:` URI, or empty when none could be fetched.
    pub favicon: String,

    /// `<!DOCTYPE html>` followed by the serialized document root.
    pub html: String,
}

/// Counters collected while capturing, useful for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Whether a virtual-rendering container was detected.
    pub virtual_mode: bool,
    /// Scroll steps performed during the drive-through pass.
    pub scroll_steps: usize,
    /// Removed nodes that never came back before the pass ended.
    pub recoverable: usize,
    /// Recovered nodes merged into the working clone.
    pub reinserted: usize,
    /// Recovered nodes rejected as duplicates or orphans.
    pub rejected: usize,
    /// Placeholder containers removed across both gap passes.
    pub gaps_removed: usize,
    /// Resources embedded as inline data.
    pub inlined: usize,
    /// Resource fetches that failed and fell back.
    pub fetch_failures: usize,
}
