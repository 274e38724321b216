//! Drive-through pass.
//!
//! Scrolls the live page from top to bottom one viewport at a time so that
//! lazily rendered content materializes, marking what entered the viewport
//! and, on virtual-rendering pages, recording what the page discarded again.
//! The pass ends by restoring the scroll position and waiting (bounded) for
//! images to settle.

mod visibility;

use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::{sleep, Instant};

use crate::error::{Error, Result};
use crate::options::Options;
use crate::page::LivePage;
use crate::session::CaptureSession;
use crate::tracker::{ChangeTracker, RemovedRecord};

pub use visibility::mark_visible;

/// Whether the page carries the virtual-rendering container signature.
#[must_use]
pub fn detect_virtual_mode<P: LivePage + ?Sized>(page: &P, options: &Options) -> bool {
    page.document()
        .try_select(&options.virtual_container)
        .is_some_and(|s| s.exists())
}

/// Outcome of one drive-through pass.
#[derive(Debug, Clone, Default)]
pub struct DriveReport {
    /// Whether identity tagging and change tracking were active.
    pub virtual_mode: bool,
    /// Scroll positions visited.
    pub steps: usize,
    /// Visibility marks set.
    pub marked: usize,
    /// Removed content that never came back, in ascending identity order.
    pub recoverable: Vec<RemovedRecord>,
    /// Whether images settled before the deadline.
    pub images_settled: bool,
    /// Time spent in the pass.
    pub elapsed: Duration,
}

/// Run the drive-through pass over `page`.
///
/// The page height is read once up front, so content appended while
/// scrolling does not extend the pass. Fails only when the page has no body
/// to scroll.
pub async fn drive<P: LivePage + ?Sized>(
    page: &mut P,
    session: &mut CaptureSession,
    options: &Options,
) -> Result<DriveReport> {
    let started = Instant::now();
    let max_height = page.scroll_height().ok_or(Error::NoBody)?;

    let mut report = DriveReport {
        virtual_mode: detect_virtual_mode(page, options),
        ..DriveReport::default()
    };

    let mut tracker = None;
    if report.virtual_mode {
        let tagged = session.tag_document(page.document());
        debug!("Virtual rendering detected, tagged {tagged} elements");
        let mut t = ChangeTracker::new(options.business_keys.clone());
        t.start(page)?;
        tracker = Some(t);
    }

    let original_y = page.scroll_y();
    page.scroll_to(0.0);
    sleep(options.initial_settle).await;

    let step = page.viewport().height;
    let mut y = 0.0;
    loop {
        page.scroll_to(y);
        sleep(options.step_delay).await;
        report.steps += 1;

        if let Some(t) = tracker.as_mut() {
            t.drain(page.document(), session);
            report.marked += mark_visible(&*page, session);
        }

        if step <= 0.0 {
            break;
        }
        y += step;
        if y > max_height {
            break;
        }
    }

    if let Some(mut t) = tracker {
        t.drain(page.document(), session);
        report.marked += mark_visible(&*page, session);
        report.recoverable = t.stop(page.document(), session);
    }

    page.scroll_to(original_y);
    sleep(options.restore_settle).await;

    report.images_settled = wait_for_images(page, options).await;
    sleep(options.final_settle).await;

    report.elapsed = started.elapsed();
    info!(
        "Drive-through finished: {} steps, {} marked, {} recoverable in {:?}",
        report.steps,
        report.marked,
        report.recoverable.len(),
        report.elapsed
    );
    Ok(report)
}

/// Poll until images settle or the deadline passes.
async fn wait_for_images<P: LivePage + ?Sized>(page: &P, options: &Options) -> bool {
    let started = Instant::now();
    loop {
        if page.images_settled() {
            return true;
        }
        let elapsed = started.elapsed();
        if elapsed >= options.image_deadline {
            warn!("Images still loading after {:?}, continuing", options.image_deadline);
            return false;
        }
        sleep(options.image_poll.min(options.image_deadline - elapsed)).await;
    }
}
