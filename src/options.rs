//! Configuration options for page capture.
//!
//! The `Options` struct controls the drive-through pass timing, the
//! virtual-rendering detection, and the placeholder heuristics used by the
//! gap cleaner.

use std::time::Duration;

/// Minimum "content weight" (text length + per-image weight) a child of the
/// virtual-rendering container needs to survive gap cleaning.
pub const MIN_CONTAINER_CHILD_WEIGHT: usize = 50;

/// Weight a single `<img>` contributes to a content-weight sum.
pub const IMAGE_WEIGHT: usize = 200;

/// Inline `height` (px) from which a container is considered a sized placeholder.
pub const MIN_PLACEHOLDER_HEIGHT_PX: f64 = 300.0;

/// Content weight per pixel of declared height below which a sized
/// container is treated as empty.
pub const MAX_PLACEHOLDER_DENSITY: f64 = 0.1;

/// Sized placeholders must have fewer descendant elements than this.
pub const MAX_PLACEHOLDER_DESCENDANTS: usize = 5;

/// Top padding/margin (px) above which an empty childless container is a spacer.
pub const MIN_SPACER_OFFSET_PX: f64 = 500.0;

/// Spacers must carry fewer text characters than this.
pub const MAX_SPACER_TEXT: usize = 10;

/// Inline `height`/`padding-top` (px) from which a recovered node's sizing
/// declaration is treated as a reserved-space hint and stripped.
pub const MIN_RESERVED_SPACE_PX: f64 = 100.0;

/// Placeholder heuristics used by the gap cleaner and the reconciler.
///
/// The defaults encode the DOM conventions of one virtual-scrolling forum
/// framework. Override them for pages with different spacer conventions.
#[derive(Debug, Clone, PartialEq)]
pub struct GapThresholds {
    /// See [`MIN_CONTAINER_CHILD_WEIGHT`].
    pub min_container_child_weight: usize,
    /// See [`IMAGE_WEIGHT`].
    pub image_weight: usize,
    /// See [`MIN_PLACEHOLDER_HEIGHT_PX`].
    pub min_placeholder_height_px: f64,
    /// See [`MAX_PLACEHOLDER_DENSITY`].
    pub max_placeholder_density: f64,
    /// See [`MAX_PLACEHOLDER_DESCENDANTS`].
    pub max_placeholder_descendants: usize,
    /// See [`MIN_SPACER_OFFSET_PX`].
    pub min_spacer_offset_px: f64,
    /// See [`MAX_SPACER_TEXT`].
    pub max_spacer_text: usize,
    /// See [`MIN_RESERVED_SPACE_PX`].
    pub min_reserved_space_px: f64,
}

impl Default for GapThresholds {
    fn default() -> Self {
        Self {
            min_container_child_weight: MIN_CONTAINER_CHILD_WEIGHT,
            image_weight: IMAGE_WEIGHT,
            min_placeholder_height_px: MIN_PLACEHOLDER_HEIGHT_PX,
            max_placeholder_density: MAX_PLACEHOLDER_DENSITY,
            max_placeholder_descendants: MAX_PLACEHOLDER_DESCENDANTS,
            min_spacer_offset_px: MIN_SPACER_OFFSET_PX,
            max_spacer_text: MAX_SPACER_TEXT,
            min_reserved_space_px: MIN_RESERVED_SPACE_PX,
        }
    }
}

/// Configuration options for page capture.
///
/// All fields are public for easy configuration. Use `Default::default()`
/// for standard settings.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use collect_capture::Options;
///
/// // Use defaults
/// let options = Options::default();
///
/// // Customize specific fields
/// let options = Options {
///     step_delay: Duration::from_millis(250),
///     business_keys: vec!["data-post-id".into(), "data-item-key".into()],
///     ..Options::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Options {
    /// Pause after each scroll step before marking visible nodes.
    ///
    /// Default: `120ms`
    pub step_delay: Duration,

    /// Pause after the initial scroll to the top of the page.
    ///
    /// Default: `300ms`
    pub initial_settle: Duration,

    /// Pause after restoring the original scroll position.
    ///
    /// Default: `200ms`
    pub restore_settle: Duration,

    /// Pause after the image wait, before the tree is cloned.
    ///
    /// Default: `200ms`
    pub final_settle: Duration,

    /// Upper bound on waiting for referenced images to finish loading.
    ///
    /// Expiry is not an error; still-loading images are captured best-effort.
    ///
    /// Default: `5000ms`
    pub image_deadline: Duration,

    /// Poll interval while waiting for images.
    ///
    /// Default: `300ms`
    pub image_poll: Duration,

    /// Selector identifying a virtual-rendering container.
    ///
    /// When it matches nothing, capture runs in the cheap scroll-and-wait
    /// mode without identity tagging or change tracking.
    ///
    /// Default: `".post-stream"`
    pub virtual_container: String,

    /// Selector for explicitly cloaked placeholders inside the container.
    ///
    /// Default: `".post-stream--cloaked"`
    pub cloaked_placeholder: String,

    /// Attributes carrying business identifiers used as content fingerprints
    /// in addition to the element `id`.
    ///
    /// Default: `["data-post-id"]`
    pub business_keys: Vec<String>,

    /// Placeholder heuristics.
    pub gaps: GapThresholds,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(120),
            initial_settle: Duration::from_millis(300),
            restore_settle: Duration::from_millis(200),
            final_settle: Duration::from_millis(200),
            image_deadline: Duration::from_millis(5000),
            image_poll: Duration::from_millis(300),
            virtual_container: ".post-stream".to_string(),
            cloaked_placeholder: ".post-stream--cloaked".to_string(),
            business_keys: vec!["data-post-id".to_string()],
            gaps: GapThresholds::default(),
        }
    }
}

impl Options {
    /// Sum of every fixed settle delay in one capture.
    #[must_use]
    pub fn fixed_settle(&self) -> Duration {
        self.initial_settle + self.restore_settle + self.final_settle
    }
}
