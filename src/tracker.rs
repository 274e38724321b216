//! Change tracking during the drive-through pass.
//!
//! The tracker consumes the host's mutation stream and keeps the snapshot of
//! every visible, tagged element the page detaches, as copied by the host at
//! removal time. Elements that come back before the pass ends are dropped
//! from the recoverable set.

use std::collections::{BTreeMap, HashSet};

use log::{debug, trace};
use tokio::sync::mpsc::error::TryRecvError;

use crate::dom::{is_tag, node_by_id, Document, NodeRef, Snapshot};
use crate::error::{Error, Result};
use crate::page::{LivePage, MutationRecord, MutationStream};
use crate::reconcile::fingerprints_of;
use crate::session::{identity_of, is_visible, CaptureSession, Identity};

/// Elements whose removal is never recorded.
const IGNORED_TAGS: &[&str] = &["style", "script", "link"];

/// Lifecycle of a [`ChangeTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// Created, not yet subscribed.
    Idle,
    /// Subscribed and recording.
    Observing,
    /// Subscription closed; records handed out.
    Stopped,
}

/// Snapshot of an element detached by the page.
#[derive(Debug, Clone)]
pub struct RemovedRecord {
    /// Identity of the detached element.
    pub identity: Identity,
    /// Identity of the element it was detached from.
    pub parent_identity: Identity,
    /// Deep copy taken at detachment time.
    pub snapshot: Snapshot,
    /// Content fingerprints of the element and its descendants.
    pub fingerprints: Vec<String>,
}

/// Records content removed by virtual rendering.
#[derive(Debug)]
pub struct ChangeTracker {
    state: TrackerState,
    business_keys: Vec<String>,
    stream: Option<MutationStream>,
    removed: BTreeMap<Identity, RemovedRecord>,
    reattached: HashSet<Identity>,
}

impl ChangeTracker {
    /// New idle tracker fingerprinting with `business_keys` besides `id`.
    #[must_use]
    pub fn new(business_keys: Vec<String>) -> Self {
        Self {
            state: TrackerState::Idle,
            business_keys,
            stream: None,
            removed: BTreeMap::new(),
            reattached: HashSet::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Subscribe to structural changes below the page body.
    ///
    /// Starting twice is a no-op; a stopped tracker cannot be restarted.
    pub fn start<P: LivePage + ?Sized>(&mut self, page: &mut P) -> Result<()> {
        match self.state {
            TrackerState::Observing => return Ok(()),
            TrackerState::Stopped => {
                return Err(Error::Capture("change tracker already stopped".into()));
            }
            TrackerState::Idle => {}
        }
        let body = page.document().body().map(|b| b.id).ok_or(Error::NoBody)?;
        self.stream = Some(page.subscribe(body));
        self.state = TrackerState::Observing;
        debug!("Change tracking started");
        Ok(())
    }

    /// Process every mutation batch delivered so far.
    ///
    /// Returns the number of batches handled.
    pub fn drain(&mut self, doc: &Document, session: &mut CaptureSession) -> usize {
        let mut pending = Vec::new();
        if let Some(stream) = self.stream.as_mut() {
            loop {
                match stream.try_recv() {
                    Ok(record) => pending.push(record),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        debug!("Mutation stream closed by host");
                        break;
                    }
                }
            }
        }
        let handled = pending.len();
        for record in pending {
            self.apply(doc, session, record);
        }
        handled
    }

    /// Apply one mutation batch: removals first, then additions.
    pub fn apply(&mut self, doc: &Document, session: &mut CaptureSession, record: MutationRecord) {
        if self.state != TrackerState::Observing {
            return;
        }
        let parent_identity = node_by_id(doc, record.target).and_then(|p| identity_of(&p));

        for detached in record.removed {
            if let Some(removed) = self.record_removal(detached.snapshot, parent_identity) {
                trace!("Recorded removal of {}", removed.identity);
                self.reattached.remove(&removed.identity);
                self.removed.insert(removed.identity, removed);
            }
        }

        for id in &record.added {
            let Some(node) = node_by_id(doc, *id).filter(NodeRef::is_element) else {
                continue;
            };
            session.tag_subtree(&node);
            if let Some(identity) = identity_of(&node) {
                self.reattached.insert(identity);
            }
        }
    }

    fn record_removal(&self, snapshot: Snapshot, parent_identity: Option<Identity>) -> Option<RemovedRecord> {
        let (identity, fingerprints) = {
            let node = snapshot.root()?;
            if IGNORED_TAGS.iter().any(|t| is_tag(&node, t)) || !is_visible(&node) {
                return None;
            }
            (identity_of(&node)?, fingerprints_of(&node, &self.business_keys))
        };
        Some(RemovedRecord {
            identity,
            parent_identity: parent_identity?,
            snapshot,
            fingerprints,
        })
    }

    /// Process remaining batches, close the subscription and return the
    /// recoverable records in ascending identity order.
    pub fn stop(&mut self, doc: &Document, session: &mut CaptureSession) -> Vec<RemovedRecord> {
        if self.state == TrackerState::Observing {
            self.drain(doc, session);
        }
        self.stream = None;
        self.state = TrackerState::Stopped;

        let reattached = &self.reattached;
        let recoverable: Vec<RemovedRecord> = std::mem::take(&mut self.removed)
            .into_values()
            .filter(|r| !reattached.contains(&r.identity))
            .collect();
        debug!(
            "Change tracking stopped: {} recoverable, {} reattached",
            recoverable.len(),
            reattached.len()
        );
        recoverable
    }
}
