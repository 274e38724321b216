//! Host page abstraction.
//!
//! The engine never owns the live tree. A host (browser bridge, headless
//! renderer, test harness) implements [`LivePage`] to expose the rendered
//! document together with the layout, scrolling, style and mutation queries
//! the drive-through pass needs.

use tokio::sync::mpsc;
use url::Url;

use crate::dom::{Document, NodeId, NodeRef, Snapshot};

/// A rectangle in CSS pixels, relative to the viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Create a rectangle.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Whether the rectangle has no area at all (both sides zero).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }

    /// Whether a viewport-relative rectangle is at least partially on screen.
    #[must_use]
    pub fn intersects_viewport(&self, viewport: &Rect) -> bool {
        if self.is_empty() {
            return false;
        }
        !(self.bottom() < 0.0
            || self.y > viewport.height
            || self.right() < 0.0
            || self.x > viewport.width)
    }
}

/// The slice of computed style the sanitizer needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputedStyle {
    /// Computed `display`, e.g. `"block"` or `"none"`.
    pub display: String,
    /// Computed `visibility`, e.g. `"visible"` or `"hidden"`.
    pub visibility: String,
    /// Computed `max-height`, e.g. `"none"` or `"0px"`.
    pub max_height: String,
}

impl ComputedStyle {
    /// Rendered but clipped to zero height through `max-height`, the shape of
    /// a panel that page logic expanded or collapsed.
    #[must_use]
    pub fn is_collapsed_panel(&self) -> bool {
        self.display != "none" && self.visibility != "hidden" && self.max_height == "0px"
    }
}

/// A node the page detached, copied at the moment of removal.
#[derive(Debug, Clone)]
pub struct DetachedNode {
    /// Arena id of the node in the live document.
    pub id: NodeId,
    /// Deep copy of the node and its descendants.
    pub snapshot: Snapshot,
}

impl DetachedNode {
    /// Copy `node` as it is now.
    #[must_use]
    pub fn capture(node: &NodeRef) -> Self {
        Self {
            id: node.id,
            snapshot: Snapshot::of(node),
        }
    }
}

/// One batch of structural changes delivered by the host.
///
/// Removed subtrees are copied while the host reports the removal. Pages
/// that recycle nodes are free to empty or reuse them afterwards.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    /// Former parent of `removed` / new parent of `added`.
    pub target: NodeId,
    /// Nodes detached from `target`.
    pub removed: Vec<DetachedNode>,
    /// Nodes attached to `target`.
    pub added: Vec<NodeId>,
}

impl MutationRecord {
    /// Removal of `nodes` from `target`. Must be built before the page
    /// touches the nodes again.
    #[must_use]
    pub fn removal(target: NodeId, nodes: &[NodeRef]) -> Self {
        Self {
            target,
            removed: nodes.iter().map(DetachedNode::capture).collect(),
            added: Vec::new(),
        }
    }

    /// Attachment of `nodes` under `target`.
    #[must_use]
    pub fn insertion(target: NodeId, nodes: Vec<NodeId>) -> Self {
        Self {
            target,
            removed: Vec::new(),
            added: nodes,
        }
    }
}

/// Stream of mutation batches for a subscription.
///
/// Dropping the receiver ends the subscription.
pub type MutationStream = mpsc::UnboundedReceiver<MutationRecord>;

/// Sending half a host keeps for an open subscription.
pub type MutationSink = mpsc::UnboundedSender<MutationRecord>;

/// Open a subscription channel.
#[must_use]
pub fn mutation_channel() -> (MutationSink, MutationStream) {
    mpsc::unbounded_channel()
}

/// A live, rendered page driven by the capture engine.
///
/// All queries are synchronous: the host answers from its current layout.
/// Only [`LivePage::scroll_to`] lets the page react (render or discard
/// content), and any resulting structural change must be reported through
/// the active [`MutationStream`], removals via [`MutationRecord::removal`]
/// before the page reuses the detached nodes.
pub trait LivePage {
    /// The live document. Attributes may be written through it; structure
    /// is only changed by the page itself.
    fn document(&self) -> &Document;

    /// URL the page was loaded from; base for relative references.
    fn url(&self) -> &Url;

    /// Current document title.
    fn title(&self) -> String;

    /// Viewport size (`x`/`y` are zero).
    fn viewport(&self) -> Rect;

    /// Current vertical scroll offset.
    fn scroll_y(&self) -> f64;

    /// Total scrollable height of the body, `None` when there is no body.
    fn scroll_height(&self) -> Option<f64>;

    /// Scroll to a vertical offset.
    fn scroll_to(&mut self, y: f64);

    /// Viewport-relative bounding box of an element, `None` if not rendered.
    fn bounding_rect(&self, node: NodeId) -> Option<Rect>;

    /// Computed style of an element.
    fn computed_style(&self, node: NodeId) -> ComputedStyle;

    /// Whether every referenced image has finished loading or failed.
    fn images_settled(&self) -> bool;

    /// Pixel snapshot of a `<canvas>` as a `data:` URI.
    fn canvas_snapshot(&self, node: NodeId) -> Option<String>;

    /// Start reporting child-list changes in the subtree of `scope`.
    fn subscribe(&mut self, scope: NodeId) -> MutationStream;
}
