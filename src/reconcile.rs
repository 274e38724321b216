//! Merging recovered content back into the working clone.
//!
//! Records are grouped by former parent and inserted in ascending identity
//! order. A record is rejected when its identity is already present in the
//! clone, or when any of its content fingerprints (element `id` or a business
//! key, on the record or its descendants) is. Elements without fingerprints
//! can only be rejected by identity.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info};

use crate::dom::{all_elements, element_descendants, parse_px, remove_style_where, Document, NodeRef};
use crate::options::Options;
use crate::session::{find_by_identity, identity_of, identity_sort_key, Identity};
use crate::tracker::RemovedRecord;

/// Inline sizing properties used to reserve space for unrendered content.
const RESERVED_SPACE_PROPERTIES: &[&str] = &["height", "padding-top"];

/// Content fingerprints of `node` and its element descendants, in document
/// order: `id:<value>` for element ids, `<key>:<value>` for business keys.
#[must_use]
pub fn fingerprints_of(node: &NodeRef, business_keys: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for el in std::iter::once(*node).chain(element_descendants(node)) {
        push_fingerprints(&el, business_keys, &mut out);
    }
    out
}

fn push_fingerprints(el: &NodeRef, business_keys: &[String], out: &mut Vec<String>) {
    if let Some(id) = el.attr("id").filter(|v| !v.trim().is_empty()) {
        out.push(format!("id:{}", id.trim()));
    }
    for key in business_keys {
        if let Some(value) = el.attr(key).filter(|v| !v.trim().is_empty()) {
            out.push(format!("{key}:{}", value.trim()));
        }
    }
}

/// Fingerprints already present in the working clone.
#[derive(Debug, Default, Clone)]
pub struct FingerprintSet {
    keys: HashSet<String>,
}

impl FingerprintSet {
    /// Collect the fingerprints of every element in `doc`.
    #[must_use]
    pub fn from_document(doc: &Document, business_keys: &[String]) -> Self {
        let mut keys = Vec::new();
        for el in all_elements(doc) {
            push_fingerprints(&el, business_keys, &mut keys);
        }
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// First of `fingerprints` already present.
    #[must_use]
    pub fn find_any<'a>(&self, fingerprints: &'a [String]) -> Option<&'a str> {
        fingerprints
            .iter()
            .find(|f| self.keys.contains(f.as_str()))
            .map(String::as_str)
    }

    /// Register fingerprints of an inserted record.
    pub fn extend<'a>(&mut self, fingerprints: impl IntoIterator<Item = &'a String>) {
        self.keys.extend(fingerprints.into_iter().cloned());
    }
}

/// Outcome counters for one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records inserted into the clone.
    pub inserted: usize,
    /// Records whose identity was already present.
    pub duplicate_identity: usize,
    /// Records rejected by fingerprint.
    pub duplicate_content: usize,
    /// Records whose parent is not in the clone.
    pub orphaned: usize,
    /// Records whose snapshot does not hold the recorded element.
    pub malformed: usize,
}

impl ReconcileReport {
    /// Records not inserted for any reason.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.duplicate_identity + self.duplicate_content + self.orphaned + self.malformed
    }
}

/// Inserts recovered records into a working clone.
#[derive(Debug, Clone)]
pub struct Reconciler<'a> {
    business_keys: &'a [String],
    min_reserved_space_px: f64,
}

impl<'a> Reconciler<'a> {
    /// Reconciler using the fingerprint keys and spacer threshold of `options`.
    #[must_use]
    pub fn new(options: &'a Options) -> Self {
        Self {
            business_keys: &options.business_keys,
            min_reserved_space_px: options.gaps.min_reserved_space_px,
        }
    }

    /// Merge `records` into `clone`.
    ///
    /// Running it again with the same records inserts nothing.
    pub fn reconcile(&self, clone: &Document, records: &[RemovedRecord]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut fingerprints = FingerprintSet::from_document(clone, self.business_keys);

        let mut groups: BTreeMap<Identity, Vec<&RemovedRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.parent_identity).or_default().push(record);
        }

        for (parent_identity, mut group) in groups {
            let Some(parent) = find_by_identity(clone, parent_identity) else {
                debug!(
                    "Parent {parent_identity} not in clone, dropping {} records",
                    group.len()
                );
                report.orphaned += group.len();
                continue;
            };
            group.sort_by_key(|r| r.identity);

            for record in group {
                if find_by_identity(clone, record.identity).is_some() {
                    report.duplicate_identity += 1;
                    continue;
                }
                if let Some(seen) = fingerprints.find_any(&record.fingerprints) {
                    debug!("Rejecting {}: {seen} already present", record.identity);
                    report.duplicate_content += 1;
                    continue;
                }
                if record.snapshot.root().and_then(|n| identity_of(&n)) != Some(record.identity) {
                    report.malformed += 1;
                    continue;
                }
                let Some(inserted) = insert_ordered(&parent, record) else {
                    report.malformed += 1;
                    continue;
                };

                strip_reserved_space(&inserted, self.min_reserved_space_px);
                for child in inserted.element_children() {
                    strip_reserved_space(&child, self.min_reserved_space_px);
                }
                fingerprints.extend(&record.fingerprints);
                report.inserted += 1;
            }
        }

        info!(
            "Reconciled {} records ({} rejected)",
            report.inserted,
            report.rejected()
        );
        report
    }
}

/// Remove inline `height`/`padding-top` declarations of at least `min_px`.
pub fn strip_reserved_space(node: &NodeRef, min_px: f64) -> usize {
    remove_style_where(node, |prop, value| {
        RESERVED_SPACE_PROPERTIES.contains(&prop) && parse_px(value).is_some_and(|px| px >= min_px)
    })
}

/// Insert a copy of the record's snapshot into `parent` before the first
/// element child whose identity is greater than the record's, or at the end.
fn insert_ordered<'a>(parent: &NodeRef<'a>, record: &RemovedRecord) -> Option<NodeRef<'a>> {
    let next = parent
        .element_children()
        .into_iter()
        .find(|sibling| identity_sort_key(sibling) > record.identity);
    record.snapshot.insert_into(parent, next.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse, Snapshot};

    /// Record for the element with `identity` in `markup`, which is parsed as
    /// a whole document and tagged by the caller.
    fn record(identity: Identity, parent: Identity, markup: &str, keys: &[String]) -> RemovedRecord {
        let doc = parse(markup);
        let node = find_by_identity(&doc, identity).expect("tagged element");
        RemovedRecord {
            identity,
            parent_identity: parent,
            snapshot: Snapshot::of(&node),
            fingerprints: fingerprints_of(&node, keys),
        }
    }

    fn ids_in(doc: &Document, sel: &str) -> Vec<Identity> {
        doc.select(sel).nodes().iter().filter_map(identity_of).collect()
    }

    #[test]
    fn fingerprints_cover_descendants() {
        let doc = parse(r#"<article id="a" data-post-id="7"><div id="b"><span data-post-id=" 8 "></span></div></article>"#);
        let node = doc.select("article").nodes()[0];
        assert_eq!(
            fingerprints_of(&node, &["data-post-id".to_string()]),
            vec!["id:a", "data-post-id:7", "id:b", "data-post-id:8"]
        );
    }

    #[test]
    fn inserts_in_identity_order() {
        let options = Options::default();
        let keys = &options.business_keys;
        let clone = parse(
            r#"<div data-cc-id="1" id="s"><p data-cc-id="3">c</p><p data-cc-id="9">i</p><p>plain</p></div>"#,
        );
        let records = vec![
            record(12, 1, r#"<p data-cc-id="12">l</p>"#, keys),
            record(5, 1, r#"<p data-cc-id="5">e</p>"#, keys),
            record(2, 1, r#"<p data-cc-id="2">b</p>"#, keys),
        ];

        let report = Reconciler::new(&options).reconcile(&clone, &records);

        assert_eq!(report.inserted, 3);
        let order: Vec<String> = clone.select("#s > p").nodes().iter().map(|n| n.text().to_string()).collect();
        assert_eq!(order, vec!["b", "c", "e", "i", "l", "plain"]);
    }

    #[test]
    fn second_run_inserts_nothing() {
        let options = Options::default();
        let clone = parse(r#"<div data-cc-id="1" id="s"></div>"#);
        let records = vec![record(4, 1, r#"<p data-cc-id="4" data-post-id="4">x</p>"#, &options.business_keys)];
        let reconciler = Reconciler::new(&options);

        assert_eq!(reconciler.reconcile(&clone, &records).inserted, 1);
        let again = reconciler.reconcile(&clone, &records);
        assert_eq!(again.inserted, 0);
        assert_eq!(again.duplicate_identity, 1);
        assert_eq!(ids_in(&clone, "p"), vec![4]);
    }

    #[test]
    fn rejects_duplicate_content() {
        let options = Options::default();
        let clone = parse(r#"<div data-cc-id="1"><article data-cc-id="91" data-post-id="7">new</article></div>"#);
        let records = vec![
            record(40, 1, r#"<article data-cc-id="40" data-post-id="7">old</article>"#, &options.business_keys),
            record(41, 1, r#"<section data-cc-id="41"><div id="reply-3"></div></section>"#, &options.business_keys),
            record(42, 1, r#"<section data-cc-id="42"><div id="reply-3"></div></section>"#, &options.business_keys),
        ];

        let report = Reconciler::new(&options).reconcile(&clone, &records);

        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicate_content, 2);
        assert_eq!(clone.select(r#"[data-post-id="7"]"#).length(), 1);
        assert_eq!(clone.select("#reply-3").length(), 1);
    }

    #[test]
    fn drops_orphans() {
        let options = Options::default();
        let clone = parse(r#"<div data-cc-id="1"></div>"#);
        let records = vec![record(8, 77, r#"<p data-cc-id="8">x</p>"#, &[])];
        let report = Reconciler::new(&options).reconcile(&clone, &records);
        assert_eq!(report.orphaned, 1);
        assert!(clone.select("p").is_empty());
    }

    #[test]
    fn strips_reserved_space_on_root_and_children() {
        let options = Options::default();
        let clone = parse(r#"<div data-cc-id="1"></div>"#);
        let records = vec![record(
            2,
            1,
            r#"<div data-cc-id="2" style="height: 1400px; color: red"><div data-cc-id="3" style="padding-top: 600px"><div data-cc-id="4" style="height: 900px"></div></div><p data-cc-id="5" style="height: 40px"></p></div>"#,
            &[],
        )];

        Reconciler::new(&options).reconcile(&clone, &records);

        let style = |id: u64| {
            find_by_identity(&clone, id).and_then(|n| n.attr("style")).map(|s| s.to_string())
        };
        assert_eq!(style(2).as_deref(), Some("color: red"));
        assert_eq!(style(3), None);
        assert_eq!(style(4).as_deref(), Some("height: 900px"));
        assert_eq!(style(5).as_deref(), Some("height: 40px"));
    }

    #[test]
    fn unfingerprinted_recreations_slip_through() {
        // Content without an id or business key can only be matched by
        // identity, so a recreation under a new identity is inserted twice.
        let options = Options::default();
        let clone = parse(r#"<div data-cc-id="1"><p data-cc-id="90">same</p></div>"#);
        let records = vec![record(20, 1, r#"<p data-cc-id="20">same</p>"#, &options.business_keys)];

        let report = Reconciler::new(&options).reconcile(&clone, &records);

        assert_eq!(report.inserted, 1);
        assert_eq!(ids_in(&clone, "p"), vec![20, 90]);
    }

    #[test]
    fn recovers_table_rows() {
        let options = Options::default();
        let clone = parse(
            r#"<table><tbody data-cc-id="1"><tr data-cc-id="3" data-post-id="3"><td>kept</td></tr></tbody></table>"#,
        );
        let records = vec![record(
            2,
            1,
            r#"<table><tbody><tr data-cc-id="2" data-post-id="9"><td>recovered</td></tr></tbody></table>"#,
            &options.business_keys,
        )];

        let report = Reconciler::new(&options).reconcile(&clone, &records);

        assert_eq!(report.inserted, 1);
        assert_eq!(report.malformed, 0);
        assert_eq!(ids_in(&clone, "tbody > tr"), vec![2, 3]);
        assert_eq!(clone.select(r#"tr[data-post-id="9"] > td"#).text().to_string(), "recovered");
    }

    #[test]
    fn identity_inserted_by_an_earlier_group_is_not_repeated() {
        // Record 5 brings list 6 and item 7 back with it; the separate record
        // for item 7, grouped under parent 6, must not add a second copy.
        let options = Options::default();
        let clone = parse(r#"<div data-cc-id="1"></div>"#);
        let records = vec![
            record(7, 6, r#"<ul data-cc-id="6"><li data-cc-id="7">item</li></ul>"#, &options.business_keys),
            record(
                5,
                1,
                r#"<section data-cc-id="5"><ul data-cc-id="6"><li data-cc-id="7">item</li></ul></section>"#,
                &options.business_keys,
            ),
        ];

        let report = Reconciler::new(&options).reconcile(&clone, &records);

        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicate_identity, 1);
        assert_eq!(report.duplicate_content, 0);
        assert_eq!(ids_in(&clone, "li"), vec![7]);
    }

    #[test]
    fn snapshot_of_another_element_is_malformed() {
        let options = Options::default();
        let clone = parse(r#"<div data-cc-id="1"></div>"#);
        let mut wrong = record(4, 1, r#"<p data-cc-id="4">x</p>"#, &[]);
        wrong.identity = 8;

        let report = Reconciler::new(&options).reconcile(&clone, &[wrong]);

        assert_eq!(report.malformed, 1);
        assert!(clone.select("p").is_empty());
    }
}
