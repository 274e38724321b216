//! Shared fixtures for integration tests: a scripted virtual-rendering page
//! and an in-memory fetcher.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use collect_capture::dom::{node_by_id, parse, style_value, Document, NodeId};
use collect_capture::page::{mutation_channel, ComputedStyle, MutationRecord, MutationSink, MutationStream, Rect};
use collect_capture::{FetchError, FetchedResource, Fetcher, LivePage};
use url::Url;

/// Something the page does on its own when scrolled far enough.
#[derive(Debug, Clone)]
pub enum Action {
    /// Detach the element matching the selector from its parent.
    Detach(&'static str),
    /// Detach the element, then empty it for reuse the way recycling lists do.
    Recycle(&'static str),
    /// Re-attach an element detached earlier under the same selector.
    Reattach(&'static str),
    /// Append markup to the element matching the selector.
    Append(&'static str, &'static str),
}

/// A page that renders and discards content as the viewport moves.
///
/// Elements are laid out by their `data-top`/`data-h` attributes (document
/// coordinates); elements without them are never on screen. Actions fire the
/// first time the scroll offset reaches their trigger and are reported on
/// the active subscription.
pub struct ScriptedPage {
    doc: Document,
    url: Url,
    viewport: Rect,
    height: f64,
    scroll: f64,
    script: Vec<(f64, Vec<Action>)>,
    fired: usize,
    sink: Option<MutationSink>,
    detached: HashMap<&'static str, (NodeId, NodeId)>,
    canvases: HashMap<String, String>,
    images_pending: bool,
    pub scrolls: Vec<f64>,
}

impl ScriptedPage {
    pub fn new(html: &str, height: f64) -> Self {
        Self {
            doc: parse(html),
            url: Url::parse("https://forum.example.com/t/topic/42").expect("valid url"),
            viewport: Rect::new(0.0, 0.0, 1000.0, 500.0),
            height,
            scroll: 0.0,
            script: Vec::new(),
            fired: 0,
            sink: None,
            detached: HashMap::new(),
            canvases: HashMap::new(),
            images_pending: false,
            scrolls: Vec::new(),
        }
    }

    /// Run `actions` once the scroll offset reaches `at`.
    pub fn on_scroll(mut self, at: f64, actions: Vec<Action>) -> Self {
        self.script.push((at, actions));
        self.script.sort_by(|a, b| a.0.total_cmp(&b.0));
        self
    }

    /// Pixels reported for the canvas with element id `id`.
    pub fn with_canvas(mut self, id: &str, data: &str) -> Self {
        self.canvases.insert(id.to_string(), data.to_string());
        self
    }

    /// Images never finish loading.
    pub fn images_never_settle(mut self) -> Self {
        self.images_pending = true;
        self
    }

    pub fn starting_at(mut self, y: f64) -> Self {
        self.scroll = y;
        self
    }

    pub fn scroll(&self) -> f64 {
        self.scroll
    }

    fn emit(&self, record: MutationRecord) {
        if let Some(sink) = &self.sink {
            let _ = sink.send(record);
        }
    }

    fn run(&mut self, action: &Action) {
        match action {
            Action::Detach(sel) | Action::Recycle(sel) => {
                let Some(node) = self.doc.select(sel).nodes().first().copied() else {
                    return;
                };
                let Some(parent) = node.parent() else {
                    return;
                };
                let (id, parent_id) = (node.id, parent.id);
                node.remove_from_parent();
                self.emit(MutationRecord::removal(parent_id, &[node]));
                if matches!(action, Action::Recycle(_)) {
                    node.remove_children();
                }
                self.detached.insert(*sel, (id, parent_id));
            }
            Action::Reattach(sel) => {
                let Some((id, parent_id)) = self.detached.remove(sel) else {
                    return;
                };
                let (Some(parent), Some(node)) = (node_by_id(&self.doc, parent_id), node_by_id(&self.doc, id)) else {
                    return;
                };
                parent.append_child(&node);
                self.emit(MutationRecord::insertion(parent_id, vec![id]));
            }
            Action::Append(sel, html) => {
                let Some(parent) = self.doc.select(sel).nodes().first().copied() else {
                    return;
                };
                let before: Vec<NodeId> = parent.element_children().iter().map(|c| c.id).collect();
                parent.append_html(*html);
                let added: Vec<NodeId> = parent
                    .element_children()
                    .iter()
                    .map(|c| c.id)
                    .filter(|id| !before.contains(id))
                    .collect();
                let target = parent.id;
                self.emit(MutationRecord::insertion(target, added));
            }
        }
    }

    fn inline(&self, node: NodeId, prop: &str) -> Option<String> {
        let el = node_by_id(&self.doc, node)?;
        let value = style_value(&el, prop)?;
        Some(value.trim().trim_end_matches("!important").trim().to_ascii_lowercase())
    }
}

impl LivePage for ScriptedPage {
    fn document(&self) -> &Document {
        &self.doc
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn title(&self) -> String {
        self.doc.select("title").text().trim().to_string()
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn scroll_y(&self) -> f64 {
        self.scroll
    }

    fn scroll_height(&self) -> Option<f64> {
        self.doc.body().map(|_| self.height)
    }

    fn scroll_to(&mut self, y: f64) {
        self.scroll = y;
        self.scrolls.push(y);
        while self.fired < self.script.len() && self.script[self.fired].0 <= y {
            let actions = self.script[self.fired].1.clone();
            self.fired += 1;
            for action in &actions {
                self.run(action);
            }
        }
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        let el = node_by_id(&self.doc, node)?;
        let top: f64 = el.attr("data-top")?.parse().ok()?;
        let h: f64 = el.attr("data-h")?.parse().ok()?;
        Some(Rect::new(0.0, top - self.scroll, self.viewport.width, h))
    }

    fn computed_style(&self, node: NodeId) -> ComputedStyle {
        ComputedStyle {
            display: self.inline(node, "display").unwrap_or_else(|| "block".into()),
            visibility: self.inline(node, "visibility").unwrap_or_else(|| "visible".into()),
            max_height: self.inline(node, "max-height").unwrap_or_else(|| "none".into()),
        }
    }

    fn images_settled(&self) -> bool {
        !self.images_pending
    }

    fn canvas_snapshot(&self, node: NodeId) -> Option<String> {
        let el = node_by_id(&self.doc, node)?;
        self.canvases.get(&*el.attr("id")?).cloned()
    }

    fn subscribe(&mut self, _scope: NodeId) -> MutationStream {
        let (sink, stream) = mutation_channel();
        self.sink = Some(sink);
        stream
    }
}

/// Serves resources from memory and records every request.
#[derive(Default)]
pub struct MapFetcher {
    resources: HashMap<String, FetchedResource>,
    requests: RefCell<Vec<String>>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: &[u8], content_type: &str) -> Self {
        self.resources.insert(
            url.to_string(),
            FetchedResource::new(body.to_vec(), Some(content_type.to_string())),
        );
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|u| *u == url).count()
    }
}

impl Fetcher for MapFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        self.requests.borrow_mut().push(url.to_string());
        self.resources.get(url.as_str()).cloned().ok_or_else(|| FetchError::Status {
            status: 404,
            url: url.to_string(),
        })
    }
}

/// Number of elements in `html` carrying `attr="value"`.
pub fn count_attr(html: &str, attr: &str, value: &str) -> usize {
    parse(html).select(&format!(r#"[{attr}="{value}"]"#)).length()
}
