//! Sanitization of the working clone.
//!
//! Two passes: expanded-but-collapsible panels are frozen open using the live
//! page's computed styles, then every element that would run code or trigger
//! network activity is removed.

use std::collections::HashMap;

use log::{debug, info};

use crate::dom::{
    all_elements, element_descendants, is_tag, live_counterpart, rel_contains, set_style_properties, Document, NodeRef,
};
use crate::page::LivePage;
use crate::session::{identity_of, Identity};

/// Elements removed wherever they appear.
const REMOVED_TAGS: &[&str] = &[
    "script", "noscript", "base", "iframe", "frame", "frameset", "embed", "object", "applet",
];

/// `rel` tokens of links that only exist to trigger requests.
const RESOURCE_HINT_RELS: &[&str] = &[
    "preload",
    "modulepreload",
    "prefetch",
    "preconnect",
    "dns-prefetch",
    "manifest",
    "prerender",
];

/// `http-equiv` values of meta tags that would interfere with a static copy.
const REMOVED_HTTP_EQUIV: &[&str] = &["content-security-policy", "refresh"];

/// Elements never frozen: document structure, void/form controls and SVG primitives.
const FREEZE_EXEMPT: &[&str] = &[
    "html", "head", "body", "meta", "link", "script", "style", "title", "br", "hr", "img",
    "input", "textarea", "select", "button", "svg", "path", "circle", "rect", "line",
    "polygon", "polyline", "defs", "g", "use", "symbol", "clippath", "mask",
];

/// Outcome counters for one sanitization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    /// Panels forced open.
    pub frozen: usize,
    /// Elements removed.
    pub removed: usize,
}

/// Freeze expanded panels, then strip dynamic elements.
pub fn sanitize<P: LivePage + ?Sized>(clone: &Document, page: &P) -> SanitizeReport {
    let report = SanitizeReport {
        frozen: freeze_expanded(clone, page),
        removed: strip_dynamic(clone),
    };
    info!(
        "Sanitized clone: {} panels frozen, {} elements removed",
        report.frozen, report.removed
    );
    report
}

/// Force open every clone element whose live counterpart is rendered but
/// clipped to `max-height: 0px`.
///
/// Clone elements are matched to live ones by identity, or through the
/// shared arena slot when untagged.
pub fn freeze_expanded<P: LivePage + ?Sized>(clone: &Document, page: &P) -> usize {
    let live = page.document();
    let by_identity: HashMap<Identity, NodeRef> = all_elements(live)
        .into_iter()
        .filter_map(|el| identity_of(&el).map(|id| (id, el)))
        .collect();

    let mut frozen = 0;
    for el in all_elements(clone) {
        if FREEZE_EXEMPT.iter().any(|t| is_tag(&el, t)) {
            continue;
        }
        let source = match identity_of(&el) {
            Some(id) => by_identity.get(&id).copied(),
            None => live_counterpart(live, &el),
        };
        let Some(source) = source else {
            continue;
        };
        if page.computed_style(source.id).is_collapsed_panel() {
            set_style_properties(
                &el,
                &[("max-height", "none !important"), ("overflow", "visible !important")],
            );
            frozen += 1;
        }
    }
    frozen
}

/// Remove scripts, frames, resource hints and other request triggers.
pub fn strip_dynamic(clone: &Document) -> usize {
    let mut removed = 0;
    for el in all_elements(clone) {
        if should_remove(&el) {
            el.remove_from_parent();
            removed += 1;
        }
    }

    for media in all_elements(clone)
        .into_iter()
        .filter(|el| is_tag(el, "video") || is_tag(el, "audio"))
    {
        media.remove_attr("src");
        for source in element_descendants(&media).into_iter().filter(|s| is_tag(s, "source")) {
            source.remove_from_parent();
            removed += 1;
        }
    }
    debug!("Removed {removed} dynamic elements");
    removed
}

fn should_remove(el: &NodeRef) -> bool {
    if REMOVED_TAGS.iter().any(|t| is_tag(el, t)) {
        return true;
    }
    if is_tag(el, "link") {
        return RESOURCE_HINT_RELS.iter().any(|r| rel_contains(el, r))
            || el.attr("as").is_some_and(|a| a.trim().eq_ignore_ascii_case("script"));
    }
    if is_tag(el, "meta") {
        return el.attr("http-equiv").is_some_and(|v| {
            REMOVED_HTTP_EQUIV
                .iter()
                .any(|h| v.trim().eq_ignore_ascii_case(h))
        });
    }
    false
}
