//! A [`LivePage`] over already-rendered HTML.
//!
//! There is no layout engine behind it: every element reports an on-screen
//! box, computed style is read from inline `style` declarations, images are
//! always settled and the page never mutates. This is enough to snapshot
//! documents saved to disk or fetched without a browser.

use std::fmt;

use url::Url;

use crate::dom::{node_by_id, parse, style_value, Document, NodeId};
use crate::encoding::transcode_to_utf8;
use crate::error::{Error, Result};
use crate::page::{mutation_channel, ComputedStyle, LivePage, MutationStream, Rect};

const DEFAULT_VIEWPORT: Rect = Rect::new(0.0, 0.0, 1280.0, 800.0);

/// Static, layout-free host page.
pub struct StaticPage {
    doc: Document,
    url: Url,
    viewport: Rect,
    scroll_y: f64,
}

impl StaticPage {
    /// Wrap a parsed document loaded from `url`.
    #[must_use]
    pub fn new(doc: Document, url: Url) -> Self {
        Self {
            doc,
            url,
            viewport: DEFAULT_VIEWPORT,
            scroll_y: 0.0,
        }
    }

    /// Parse `html` as loaded from `url`.
    pub fn parse(html: &str, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::Capture(format!("invalid page URL {url}: {e}")))?;
        Ok(Self::new(parse(html), url))
    }

    /// Decode raw bytes (BOM, `<meta charset>`, UTF-8 fallback) and parse them.
    pub fn from_bytes(bytes: &[u8], url: &str) -> Result<Self> {
        Self::parse(&transcode_to_utf8(bytes), url)
    }

    /// Use a different viewport size.
    #[must_use]
    pub fn with_viewport(mut self, width: f64, height: f64) -> Self {
        self.viewport = Rect::new(0.0, 0.0, width, height);
        self
    }
}

impl fmt::Debug for StaticPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticPage")
            .field("url", &self.url.as_str())
            .field("viewport", &self.viewport)
            .field("scroll_y", &self.scroll_y)
            .finish_non_exhaustive()
    }
}

fn inline_style(doc: &Document, node: NodeId, prop: &str) -> Option<String> {
    let el = node_by_id(doc, node)?;
    let value = style_value(&el, prop)?;
    let value = value.trim();
    let value = value.strip_suffix("!important").map_or(value, str::trim_end);
    Some(value.to_ascii_lowercase())
}

impl LivePage for StaticPage {
    fn document(&self) -> &Document {
        &self.doc
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn title(&self) -> String {
        self.doc
            .select("title")
            .nodes()
            .first()
            .map(|t| t.text().trim().to_string())
            .unwrap_or_default()
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    fn scroll_height(&self) -> Option<f64> {
        self.doc.body().map(|_| self.viewport.height)
    }

    fn scroll_to(&mut self, y: f64) {
        self.scroll_y = y.max(0.0);
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        if inline_style(&self.doc, node, "display").as_deref() == Some("none") {
            return None;
        }
        node_by_id(&self.doc, node)
            .filter(|n| n.is_element())
            .map(|_| Rect::new(0.0, 0.0, self.viewport.width, 1.0))
    }

    fn computed_style(&self, node: NodeId) -> ComputedStyle {
        ComputedStyle {
            display: inline_style(&self.doc, node, "display").unwrap_or_else(|| "block".into()),
            visibility: inline_style(&self.doc, node, "visibility").unwrap_or_else(|| "visible".into()),
            max_height: inline_style(&self.doc, node, "max-height").unwrap_or_else(|| "none".into()),
        }
    }

    fn images_settled(&self) -> bool {
        true
    }

    fn canvas_snapshot(&self, _node: NodeId) -> Option<String> {
        None
    }

    fn subscribe(&mut self, _scope: NodeId) -> MutationStream {
        mutation_channel().1
    }
}
