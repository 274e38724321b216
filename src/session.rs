//! Capture session state: node identities and visibility marks.
//!
//! Identities live in the `data-cc-id` attribute and come from a single
//! counter owned by [`CaptureSession`], so independent captures never share
//! state. Both attributes are stripped from the output by the assembler.

use crate::dom::{all_elements, element_descendants, Document, NodeRef};

/// Attribute carrying a node's session identity.
pub const IDENTITY_ATTR: &str = "data-cc-id";

/// Attribute set on nodes that have intersected the viewport.
pub const VISIBLE_ATTR: &str = "data-cc-visible";

/// Session identity of a node.
pub type Identity = u64;

/// Per-capture identity counter.
///
/// Identities are handed out in increasing order and never reused within a
/// session, so ascending identity order follows the order in which nodes
/// were first seen.
#[derive(Debug, Default)]
pub struct CaptureSession {
    next: Identity,
}

impl CaptureSession {
    /// New session starting at identity 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity the next tag will receive.
    #[must_use]
    pub fn peek(&self) -> Identity {
        self.next
    }

    fn allocate(&mut self) -> Identity {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Assign an identity to `node` unless it already carries one.
    ///
    /// Returns the node's identity either way.
    pub fn tag(&mut self, node: &NodeRef) -> Option<Identity> {
        if !node.is_element() {
            return None;
        }
        if let Some(id) = identity_of(node) {
            return Some(id);
        }
        let id = self.allocate();
        node.set_attr(IDENTITY_ATTR, &id.to_string());
        Some(id)
    }

    /// Tag `node` and every untagged element below it, in document order.
    ///
    /// Returns how many new identities were assigned.
    pub fn tag_subtree(&mut self, node: &NodeRef) -> usize {
        let mut assigned = 0;
        for el in std::iter::once(*node).chain(element_descendants(node)) {
            if el.is_element() && !el.has_attr(IDENTITY_ATTR) {
                self.tag(&el);
                assigned += 1;
            }
        }
        assigned
    }

    /// Tag every untagged element of the document, in document order.
    pub fn tag_document(&mut self, doc: &Document) -> usize {
        let mut assigned = 0;
        for el in all_elements(doc) {
            if !el.has_attr(IDENTITY_ATTR) {
                self.tag(&el);
                assigned += 1;
            }
        }
        assigned
    }
}

/// Parse a node's identity attribute.
#[must_use]
pub fn identity_of(node: &NodeRef) -> Option<Identity> {
    node.attr(IDENTITY_ATTR)
        .and_then(|v| v.trim().parse().ok())
}

/// Sort key used for ordered insertion: nodes without identity sort last.
#[must_use]
pub fn identity_sort_key(node: &NodeRef) -> Identity {
    identity_of(node).unwrap_or(Identity::MAX)
}

/// Whether the node has been marked visible.
#[inline]
#[must_use]
pub fn is_visible(node: &NodeRef) -> bool {
    node.has_attr(VISIBLE_ATTR)
}

/// Whether any element below `node` has been marked visible.
#[must_use]
pub fn has_visible_descendant(node: &NodeRef) -> bool {
    element_descendants(node).iter().any(is_visible)
}

/// Whether `node` or anything below it has been marked visible.
#[must_use]
pub fn touches_visible(node: &NodeRef) -> bool {
    is_visible(node) || has_visible_descendant(node)
}

/// Mark `node` and every tagged element below it visible.
///
/// Returns how many marks were newly set.
pub fn mark_visible_subtree(node: &NodeRef) -> usize {
    let mut marked = 0;
    for el in std::iter::once(*node).chain(element_descendants(node)) {
        if el.has_attr(IDENTITY_ATTR) && !is_visible(&el) {
            el.set_attr(VISIBLE_ATTR, "");
            marked += 1;
        }
    }
    marked
}

/// Find the element carrying `identity`, if it is attached to the document.
#[must_use]
pub fn find_by_identity(doc: &Document, identity: Identity) -> Option<NodeRef<'_>> {
    let selector = format!(r#"[{IDENTITY_ATTR}="{identity}"]"#);
    doc.select(&selector).nodes().first().copied()
}

/// Remove every session attribute from the document.
pub fn strip_session_attributes(doc: &Document) {
    for el in all_elements(doc) {
        el.remove_attr(IDENTITY_ATTR);
        el.remove_attr(VISIBLE_ATTR);
    }
}
