//! DOM Operations Adapter
//!
//! Small helpers over the `dom_query` crate shared by every pipeline stage:
//! document-order element walks, text weights, `rel` token checks and
//! inline `style` declaration editing.

// Re-export core types for external use
pub use dom_query::{Document, NodeId, NodeRef, Selection};

use crate::patterns::PX_LENGTH;

// === Parsing / Cloning ===

/// Parse HTML string into document
#[inline]
#[must_use]
pub fn parse(html: &str) -> Document {
    Document::from(html)
}

/// Deep-copy a document without going through the parser.
///
/// The copy keeps the source's arena layout: until either side is mutated,
/// a node id of the source names the same element in the copy.
#[must_use]
pub fn clone_document(doc: &Document) -> Document {
    doc.clone()
}

/// Deep copy of one element subtree, held outside any document.
///
/// Nodes are copied arena to arena, so elements that only parse inside a
/// specific parent (`<tr>`, `<td>`, `<option>`) survive the round trip.
#[derive(Clone)]
pub struct Snapshot {
    fragment: Document,
}

impl Snapshot {
    /// Copy `node` and its descendants as they are now.
    #[must_use]
    pub fn of(node: &NodeRef) -> Self {
        Self {
            fragment: node.to_fragment(),
        }
    }

    /// The copied element.
    #[must_use]
    pub fn root(&self) -> Option<NodeRef<'_>> {
        self.fragment.root().first_element_child()?.first_element_child()
    }

    /// Outer HTML of the copied element.
    #[must_use]
    pub fn html(&self) -> String {
        self.root().map(|n| n.html().to_string()).unwrap_or_default()
    }

    /// Insert a fresh copy into `parent`, before `before` when given, and
    /// return the inserted element. The snapshot itself is left untouched.
    pub fn insert_into<'a>(&self, parent: &NodeRef<'a>, before: Option<&NodeRef<'a>>) -> Option<NodeRef<'a>> {
        let working = self.fragment.clone();
        let source = working.root().first_element_child()?.first_element_child()?;
        Selection::from(*parent).append_selection(&Selection::from(source));
        let inserted = parent.last_child().filter(NodeRef::is_element)?;
        if let Some(sibling) = before {
            sibling.insert_before(&inserted);
        }
        Some(inserted)
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Snapshot").field(&self.html()).finish()
    }
}

// === Tag/Node Information ===

/// Check the tag name of an element node.
#[inline]
#[must_use]
pub fn is_tag(node: &NodeRef, tag: &str) -> bool {
    node.node_name().is_some_and(|t| t.eq_ignore_ascii_case(tag))
}

/// All element descendants of `node`, in document order, excluding `node`.
#[must_use]
pub fn element_descendants<'a>(node: &NodeRef<'a>) -> Vec<NodeRef<'a>> {
    node.descendants()
        .into_iter()
        .filter(NodeRef::is_element)
        .collect()
}

/// The document's root element (`<html>`), if any.
#[inline]
#[must_use]
pub fn root_element(doc: &Document) -> Option<NodeRef<'_>> {
    doc.root().first_element_child()
}

/// Look up a node by arena id. Detached nodes are still returned.
#[inline]
#[must_use]
pub fn node_by_id(doc: &Document, id: NodeId) -> Option<NodeRef<'_>> {
    doc.tree.get(&id)
}

/// Whether `node` is still reachable from the document root.
#[must_use]
pub fn is_attached(node: &NodeRef) -> bool {
    let mut current = *node;
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current.is_document()
}

/// Element of `live` in the same arena slot as `el` of a
/// [`clone_document`] copy, when it is still attached and has the same tag.
#[must_use]
pub fn live_counterpart<'a>(live: &'a Document, el: &NodeRef) -> Option<NodeRef<'a>> {
    let name = el.node_name()?;
    node_by_id(live, el.id).filter(|n| is_tag(n, &name) && is_attached(n))
}

/// Every element of the document, root first, in document order.
#[must_use]
pub fn all_elements(doc: &Document) -> Vec<NodeRef<'_>> {
    let Some(root) = root_element(doc) else {
        return Vec::new();
    };
    let mut out = vec![root];
    out.extend(element_descendants(&root));
    out
}

/// Every element with the given tag, in document order.
#[must_use]
pub fn elements_by_tag<'a>(doc: &'a Document, tag: &str) -> Vec<NodeRef<'a>> {
    all_elements(doc)
        .into_iter()
        .filter(|n| is_tag(n, tag))
        .collect()
}

// === Text Content ===

/// Length in characters of the trimmed text content.
#[must_use]
pub fn text_len(node: &NodeRef) -> usize {
    node.text().trim().chars().count()
}

/// Number of descendant elements with the given tag.
#[must_use]
pub fn count_descendants_by_tag(node: &NodeRef, tag: &str) -> usize {
    element_descendants(node)
        .iter()
        .filter(|n| is_tag(n, tag))
        .count()
}

/// Text length plus `image_weight` per descendant `<img>`.
#[must_use]
pub fn content_weight(node: &NodeRef, image_weight: usize) -> usize {
    text_len(node) + image_weight * count_descendants_by_tag(node, "img")
}

// === Attribute Operations ===

/// Get any attribute value
#[inline]
#[must_use]
pub fn get_attribute(node: &NodeRef, name: &str) -> Option<String> {
    node.attr(name).map(|s| s.to_string())
}

/// Whether a space-separated `rel` attribute contains `token` (ASCII case-insensitive).
#[must_use]
pub fn rel_contains(node: &NodeRef, token: &str) -> bool {
    node.attr("rel").is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|t| t.eq_ignore_ascii_case(token))
    })
}

// === Inline Style ===

/// Split a declaration block on `;` outside quotes and parentheses, so
/// `url("data:image/png;base64,...")` stays in one piece.
fn split_declarations(style: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;
    for (i, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                out.push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&style[start..]);
    out
}

/// Parse an inline `style` attribute into `(property, value)` pairs.
///
/// Property names are lowercased; values keep their original text
/// (including any `!important`).
#[must_use]
pub fn parse_style(style: &str) -> Vec<(String, String)> {
    split_declarations(style)
        .into_iter()
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim();
            if prop.is_empty() {
                return None;
            }
            Some((prop, value.to_string()))
        })
        .collect()
}

/// Serialize declarations back into a `style` attribute value.
#[must_use]
pub fn serialize_style(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(p, v)| format!("{p}: {v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Value of an inline style property, if declared.
#[must_use]
pub fn style_value(node: &NodeRef, prop: &str) -> Option<String> {
    let style = node.attr("style")?;
    parse_style(&style)
        .into_iter()
        .rev()
        .find(|(p, _)| p == prop)
        .map(|(_, v)| v)
}

/// Parse a `px` length, ignoring a trailing `!important`.
#[must_use]
pub fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim();
    let value = value
        .strip_suffix("!important")
        .map_or(value, str::trim_end);
    PX_LENGTH
        .captures(value)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Pixel value of an inline style property, if declared in `px`.
#[must_use]
pub fn style_px(node: &NodeRef, prop: &str) -> Option<f64> {
    style_value(node, prop).as_deref().and_then(parse_px)
}

/// Remove inline declarations for which `should_drop` returns true.
///
/// Returns the number of declarations removed. The attribute is removed
/// entirely when nothing remains.
pub fn remove_style_where<F>(node: &NodeRef, mut should_drop: F) -> usize
where
    F: FnMut(&str, &str) -> bool,
{
    let Some(style) = node.attr("style") else {
        return 0;
    };
    let decls = parse_style(&style);
    let before = decls.len();
    let kept: Vec<(String, String)> = decls.into_iter().filter(|(p, v)| !should_drop(p, v)).collect();
    let removed = before - kept.len();
    if removed > 0 {
        if kept.is_empty() {
            node.remove_attr("style");
        } else {
            node.set_attr("style", &serialize_style(&kept));
        }
    }
    removed
}

/// Set inline declarations, replacing any existing ones for the same property.
pub fn set_style_properties(node: &NodeRef, props: &[(&str, &str)]) {
    let mut decls = node
        .attr("style")
        .map(|s| parse_style(&s))
        .unwrap_or_default();
    decls.retain(|(p, _)| !props.iter().any(|(name, _)| p == name));
    decls.extend(props.iter().map(|(p, v)| ((*p).to_string(), (*v).to_string())));
    node.set_attr("style", &serialize_style(&decls));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_walk_in_document_order() {
        let doc = parse(r#"<div id="a"><p id="b">x</p><span id="c"></span></div>"#);
        let ids: Vec<String> = all_elements(&doc)
            .iter()
            .filter_map(|n| get_attribute(n, "id"))
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(is_tag(&all_elements(&doc)[0], "html"));
    }

    #[test]
    fn test_content_weight_counts_images() {
        let doc = parse(r#"<div id="w"> hello <img src="a.png"><img src="b.png"></div>"#);
        let div = doc.select("#w").nodes()[0];
        assert_eq!(text_len(&div), 5);
        assert_eq!(content_weight(&div, 200), 405);
    }

    #[test]
    fn test_rel_contains_tokens() {
        let doc = parse(r#"<link rel="Shortcut Icon" href="/f.ico">"#);
        let link = doc.select("link").nodes()[0];
        assert!(rel_contains(&link, "icon"));
        assert!(rel_contains(&link, "shortcut"));
        assert!(!rel_contains(&link, "stylesheet"));
    }

    #[test]
    fn test_parse_style_declarations() {
        let decls = parse_style("HEIGHT: 1200px;color:red; ;padding-top :40px !important");
        assert_eq!(
            decls,
            vec![
                ("height".to_string(), "1200px".to_string()),
                ("color".to_string(), "red".to_string()),
                ("padding-top".to_string(), "40px !important".to_string()),
            ]
        );

        let decls = parse_style(r#"background: url("data:image/gif;base64,R0=") no-repeat; content: ';'"#);
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].1, r#"url("data:image/gif;base64,R0=") no-repeat"#);
        assert_eq!(decls[1].1, "';'");
    }

    #[test]
    fn test_style_px_reads_pixels() {
        let doc = parse(r#"<div style="height: 640px; margin-top: 2em; padding-top: 700px !important"></div>"#);
        let div = doc.select("div").nodes()[0];
        assert_eq!(style_px(&div, "height"), Some(640.0));
        assert_eq!(style_px(&div, "margin-top"), None);
        assert_eq!(style_px(&div, "padding-top"), Some(700.0));
        assert_eq!(style_px(&div, "width"), None);
    }

    #[test]
    fn test_remove_style_where() {
        let doc = parse(r#"<div style="height: 900px; color: red"></div>"#);
        let div = doc.select("div").nodes()[0];
        let removed = remove_style_where(&div, |p, _| p == "height");
        assert_eq!(removed, 1);
        assert_eq!(get_attribute(&div, "style"), Some("color: red".to_string()));

        remove_style_where(&div, |_, _| true);
        assert!(!div.has_attr("style"));
    }

    #[test]
    fn test_set_style_properties_replaces() {
        let doc = parse(r#"<div style="max-height: 0px; color: red"></div>"#);
        let div = doc.select("div").nodes()[0];
        set_style_properties(&div, &[("max-height", "none !important")]);
        assert_eq!(
            get_attribute(&div, "style"),
            Some("color: red; max-height: none !important".to_string())
        );
    }

    #[test]
    fn test_detached_nodes_stay_readable() {
        let doc = parse(r#"<ul><li id="gone" data-x="1"><b>kept</b></li></ul>"#);
        let li = doc.select("#gone").nodes()[0];
        assert!(is_attached(&li));

        li.remove_from_parent();
        let again = node_by_id(&doc, li.id).expect("still in arena");
        assert!(!is_attached(&again));
        assert_eq!(get_attribute(&again, "data-x"), Some("1".to_string()));
        assert!(again.html().contains("<b>kept</b>"));
    }

    #[test]
    fn test_clone_document_is_independent() {
        let doc = parse(r#"<p class="x">one</p>"#);
        let copy = clone_document(&doc);
        copy.select("p").remove();
        assert!(doc.select("p.x").exists());
        assert!(copy.select("p").is_empty());
    }

    #[test]
    fn test_clone_document_keeps_host_built_structure() {
        // A <div> inside a <p> cannot come out of the parser, only out of
        // script. The copy must keep it as is.
        let doc = parse(r#"<p id="p">a</p><span id="after"></span>"#);
        let p = doc.select("#p").nodes()[0];
        let div = doc.tree.new_element("div");
        div.set_attr("id", "inner");
        p.append_child(&div);

        let copy = clone_document(&doc);
        assert_eq!(all_elements(&copy).len(), all_elements(&doc).len());
        assert_eq!(copy.select("#p > #inner").length(), 1);

        let after = copy.select("#after").nodes()[0];
        let live = live_counterpart(&doc, &after).expect("same slot");
        assert_eq!(get_attribute(&live, "id").as_deref(), Some("after"));
    }

    #[test]
    fn test_live_counterpart_requires_attached_same_tag() {
        let doc = parse(r#"<ul><li id="a">x</li></ul>"#);
        let copy = clone_document(&doc);
        let li = copy.select("#a").nodes()[0];
        assert!(live_counterpart(&doc, &li).is_some());

        doc.select("#a").nodes()[0].remove_from_parent();
        assert!(live_counterpart(&doc, &li).is_none());
    }

    #[test]
    fn test_snapshot_keeps_table_rows() {
        let doc = parse(r#"<table><tbody id="rows"><tr id="r1"><td>cell</td></tr></tbody></table>"#);
        let row = doc.select("#r1").nodes()[0];
        let snapshot = Snapshot::of(&row);

        row.remove_children();
        assert_eq!(snapshot.html(), r#"<tr id="r1"><td>cell</td></tr>"#);

        let target = parse(r#"<table><tbody id="rows"><tr id="r2"></tr></tbody></table>"#);
        let tbody = target.select("#rows").nodes()[0];
        let r2 = target.select("#r2").nodes()[0];
        let inserted = snapshot.insert_into(&tbody, Some(&r2)).expect("inserted");
        assert!(is_tag(&inserted, "tr"));
        assert_eq!(
            target.select("#rows").inner_html().to_string(),
            r#"<tr id="r1"><td>cell</td></tr><tr id="r2"></tr>"#
        );

        // The snapshot can be inserted again.
        assert!(snapshot.insert_into(&tbody, None).is_some());
        assert_eq!(target.select("#rows > tr").length(), 3);
    }
}
