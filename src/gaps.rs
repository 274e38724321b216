//! Placeholder removal for virtual-rendering pages.
//!
//! Virtual scrollers reserve space for unrendered content with empty,
//! explicitly sized containers. Three rules remove them; none ever touches an
//! element that was marked visible or contains a visible-marked element.

use log::debug;

use crate::dom::{all_elements, content_weight, element_descendants, is_tag, style_px, text_len, Document, NodeRef};
use crate::options::{GapThresholds, Options};
use crate::session::touches_visible;

/// Containers considered by the sized-placeholder and spacer rules.
const GAP_CONTAINER_TAGS: &[&str] = &["div", "section"];

fn is_gap_container(el: &NodeRef) -> bool {
    GAP_CONTAINER_TAGS.iter().any(|t| is_tag(el, t))
}

/// Run all three rules over `clone`; returns the number of elements removed.
pub fn remove_gaps(clone: &Document, options: &Options) -> usize {
    let removed = remove_stream_placeholders(clone, options)
        + remove_sized_placeholders(clone, &options.gaps)
        + remove_spacers(clone, &options.gaps);
    if removed > 0 {
        debug!("Removed {removed} placeholder elements");
    }
    removed
}

/// Rule 1: cloaked and near-empty direct children of the virtual container.
pub fn remove_stream_placeholders(clone: &Document, options: &Options) -> usize {
    let Some(container) = clone
        .try_select(&options.virtual_container)
        .and_then(|s| s.nodes().first().copied())
    else {
        return 0;
    };

    let mut doomed = Vec::new();
    for child in container.element_children() {
        if touches_visible(&child) {
            continue;
        }
        let cloaked = child.is(&options.cloaked_placeholder);
        if cloaked || content_weight(&child, options.gaps.image_weight) < options.gaps.min_container_child_weight {
            doomed.push(child);
        }
    }
    for el in &doomed {
        el.remove_from_parent();
    }
    doomed.len()
}

/// Rule 2: tall containers with almost no content.
pub fn remove_sized_placeholders(clone: &Document, gaps: &GapThresholds) -> usize {
    let mut removed = 0;
    for el in all_elements(clone).into_iter().filter(is_gap_container) {
        let Some(height) = style_px(&el, "height") else {
            continue;
        };
        if height < gaps.min_placeholder_height_px || touches_visible(&el) {
            continue;
        }
        let density = content_weight(&el, gaps.image_weight) as f64 / height;
        if density < gaps.max_placeholder_density
            && element_descendants(&el).len() < gaps.max_placeholder_descendants
        {
            el.remove_from_parent();
            removed += 1;
        }
    }
    removed
}

/// Rule 3: childless, textless containers pushed down by a large top offset.
pub fn remove_spacers(clone: &Document, gaps: &GapThresholds) -> usize {
    let mut removed = 0;
    for el in all_elements(clone).into_iter().filter(is_gap_container) {
        let offset = ["padding-top", "margin-top"]
            .iter()
            .filter_map(|p| style_px(&el, p))
            .fold(0.0_f64, f64::max);
        if offset <= gaps.min_spacer_offset_px || touches_visible(&el) {
            continue;
        }
        if el.element_children().is_empty() && text_len(&el) < gaps.max_spacer_text {
            el.remove_from_parent();
            removed += 1;
        }
    }
    removed
}
