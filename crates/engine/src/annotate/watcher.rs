// Incremental annotation of inserted content.

use tracing::{debug, trace, warn};

use super::rule::MatchRule;
use super::scanner::{annotate_leaf, scan, ScanStats, SkipPolicy};
use crate::document::{ContentTree, NodeId, ObserverId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Subscription {
    observer: ObserverId,
    root: NodeId,
}

/// Holds at most one insertion subscription on a document subtree.
#[derive(Debug, Default)]
pub struct MutationWatcher {
    subscription: Option<Subscription>,
}

impl MutationWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to insertions under `root`, replacing any prior subscription.
    pub fn start<T: ContentTree + ?Sized>(&mut self, tree: &mut T, root: NodeId) {
        self.stop(tree);
        let observer = tree.observe(root);
        self.subscription = Some(Subscription { observer, root });
        trace!(root = %root, "mutation watcher started");
    }

    pub fn stop<T: ContentTree + ?Sized>(&mut self, tree: &mut T) {
        if let Some(subscription) = self.subscription.take() {
            tree.disconnect(subscription.observer);
            trace!(root = %subscription.root, "mutation watcher stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Annotate everything inserted since the last call.
    ///
    /// Inserted text leaves are checked and annotated on their own; inserted
    /// elements are scanned as subtrees. Records caused by this pass are
    /// dropped before returning.
    pub fn process_pending<T: ContentTree + ?Sized>(
        &mut self,
        tree: &mut T,
        rule: &MatchRule,
        policy: &SkipPolicy,
    ) -> ScanStats {
        let mut stats = ScanStats::default();
        let Some(subscription) = self.subscription else {
            return stats;
        };

        let records = tree.take_records(subscription.observer);
        if records.is_empty() {
            return stats;
        }

        for record in &records {
            for &added in &record.added {
                // Already removed again, or replaced earlier in this batch.
                if !tree.contains(subscription.root, added) {
                    continue;
                }
                if tree.is_text(added) {
                    let blank = !tree.text(added).is_some_and(|t| !t.trim().is_empty());
                    if blank || policy.should_skip(&*tree, added) {
                        continue;
                    }
                    stats.leaves_visited += 1;
                    match annotate_leaf(tree, added, rule) {
                        Ok(0) => {}
                        Ok(count) => {
                            stats.leaves_annotated += 1;
                            stats.annotations += count;
                        }
                        Err(error) => {
                            warn!(leaf = %added, error = %error, "failed to annotate inserted text")
                        }
                    }
                } else {
                    stats.merge(scan(tree, added, rule, policy));
                }
            }
        }

        let own = tree.take_records(subscription.observer);
        debug!(
            records = records.len(),
            annotations = stats.annotations,
            discarded = own.len(),
            "processed inserted content"
        );
        stats
    }
}
