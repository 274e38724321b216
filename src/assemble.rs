//! Final serialization and favicon resolution.

use log::debug;
use url::Url;

use crate::dom::{elements_by_tag, rel_contains, root_element, Document};
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::page::LivePage;
use crate::result::CaptureResult;
use crate::session::strip_session_attributes;

/// Document-type declaration prefixed to every capture.
pub const DOCTYPE: &str = "<!DOCTYPE html>\n";

/// Strip session attributes and serialize the clone with a doctype.
pub fn serialize(clone: &Document) -> Result<String> {
    strip_session_attributes(clone);
    let root = root_element(clone).ok_or(Error::NoRoot)?;
    Ok(format!("{DOCTYPE}{}", root.html()))
}

/// Favicon URL declared by the page, or the conventional `/favicon.ico`.
///
/// `rel~=icon` links win over `rel~=shortcut` ones; within each kind the
/// first in document order is used.
#[must_use]
pub fn favicon_url(doc: &Document, base: &Url) -> Option<Url> {
    let links = elements_by_tag(doc, "link");
    let declared = ["icon", "shortcut"].iter().find_map(|rel| {
        links
            .iter()
            .filter(|l| rel_contains(l, rel))
            .find_map(|l| l.attr("href").filter(|h| !h.trim().is_empty()))
    });
    match declared {
        Some(href) => base.join(href.trim()).ok(),
        None => base.join("/favicon.ico").ok(),
    }
}

/// Favicon as a `data:` URI, empty when it cannot be retrieved.
pub async fn resolve_favicon<F: Fetcher>(doc: &Document, base: &Url, fetcher: &F) -> String {
    let Some(url) = favicon_url(doc, base) else {
        return String::new();
    };
    match fetcher.fetch_data_uri(&url).await {
        Ok(data) => data,
        Err(e) => {
            debug!("No favicon: {e}");
            String::new()
        }
    }
}

/// Produce the capture result from the finished clone.
pub async fn assemble<P, F>(clone: &Document, page: &P, fetcher: &F) -> Result<CaptureResult>
where
    P: LivePage + ?Sized,
    F: Fetcher,
{
    let html = serialize(clone)?;
    let favicon = resolve_favicon(page.document(), page.url(), fetcher).await;
    Ok(CaptureResult {
        title: page.title(),
        favicon,
        html,
    })
}
