//! Capture pipeline.
//!
//! drive-through → clone → reconcile → sanitize → gaps → inline → gaps →
//! assemble. Reconciliation and gap cleaning only run when the page was
//! detected as virtually rendered.

use log::{debug, info};

use crate::assemble::assemble;
use crate::dom::{clone_document, root_element};
use crate::driver::drive;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::gaps::remove_gaps;
use crate::inline::inline_resources;
use crate::options::Options;
use crate::page::LivePage;
use crate::reconcile::Reconciler;
use crate::result::{CaptureResult, CaptureStats};
use crate::sanitize::sanitize;
use crate::session::CaptureSession;

/// Run the full pipeline over `page`, reporting what each stage did.
pub(crate) async fn capture_page<P, F>(
    page: &mut P,
    fetcher: &F,
    options: &Options,
) -> Result<(CaptureResult, CaptureStats)>
where
    P: LivePage + ?Sized,
    F: Fetcher,
{
    if root_element(page.document()).is_none() {
        return Err(Error::NoRoot);
    }
    if page.document().body().is_none() {
        return Err(Error::NoBody);
    }

    let mut session = CaptureSession::new();
    let pass = drive(page, &mut session, options).await?;
    let mut stats = CaptureStats {
        virtual_mode: pass.virtual_mode,
        scroll_steps: pass.steps,
        recoverable: pass.recoverable.len(),
        ..CaptureStats::default()
    };

    let page: &P = page;
    let clone = clone_document(page.document());

    if pass.virtual_mode {
        let reconciled = Reconciler::new(options).reconcile(&clone, &pass.recoverable);
        stats.reinserted = reconciled.inserted;
        stats.rejected = reconciled.rejected();
    }

    sanitize(&clone, page);

    if pass.virtual_mode {
        stats.gaps_removed += remove_gaps(&clone, options);
    }

    let inlined = inline_resources(&clone, page, fetcher).await;
    stats.inlined = inlined.inlined;
    stats.fetch_failures = inlined.failed;

    if pass.virtual_mode {
        stats.gaps_removed += remove_gaps(&clone, options);
    }

    let result = assemble(&clone, page, fetcher).await?;
    debug!("{stats:?}");
    info!(
        "Captured {:?}: {} bytes, {} resources inlined",
        result.title,
        result.html.len(),
        stats.inlined
    );
    Ok((result, stats))
}
