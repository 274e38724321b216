use crate::dom::all_elements;
use crate::page::LivePage;
use crate::session::{is_visible, mark_visible_subtree, CaptureSession};

/// Mark every element currently intersecting the viewport, and its subtree.
///
/// Elements that appeared since the last pass are tagged first so that the
/// whole document carries identities before any mark is set. Returns the
/// number of marks newly set.
pub fn mark_visible<P: LivePage + ?Sized>(page: &P, session: &mut CaptureSession) -> usize {
    let doc = page.document();
    session.tag_document(doc);
    let viewport = page.viewport();

    let mut marked = 0;
    for el in all_elements(doc) {
        if is_visible(&el) {
            continue;
        }
        let on_screen = page
            .bounding_rect(el.id)
            .is_some_and(|rect| rect.intersects_viewport(&viewport));
        if on_screen {
            marked += mark_visible_subtree(&el);
        }
    }
    marked
}
