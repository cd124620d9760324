// Build → observe → clear → rebuild cycle for one document.

use tracing::{debug, info, warn};

use super::rule::{self, MatchRule};
use super::scanner::{scan, ScanStats, SkipPolicy};
use super::watcher::MutationWatcher;
use super::ANNOTATION_CLASS;
use crate::document::{ContentTree, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No rule; nothing annotated or observed.
    Idle,
    /// Document scanned and watcher subscribed.
    Active,
}

#[derive(Debug, Default)]
pub struct AnnotationLifecycle {
    policy: SkipPolicy,
    rule: Option<MatchRule>,
    watcher: MutationWatcher,
}

impl AnnotationLifecycle {
    pub fn new(policy: SkipPolicy) -> Self {
        Self { policy, rule: None, watcher: MutationWatcher::new() }
    }

    pub fn state(&self) -> LifecycleState {
        if self.rule.is_some() && self.watcher.is_active() {
            LifecycleState::Active
        } else {
            LifecycleState::Idle
        }
    }

    pub fn rule(&self) -> Option<&MatchRule> {
        self.rule.as_ref()
    }

    pub fn policy(&self) -> &SkipPolicy {
        &self.policy
    }

    /// Build a rule from `terms`, scan the whole document and start watching.
    /// An empty term list leaves the lifecycle idle.
    pub fn initialize<T, S>(&mut self, tree: &mut T, root: NodeId, terms: &[S]) -> ScanStats
    where
        T: ContentTree + ?Sized,
        S: AsRef<str>,
    {
        let Some(rule) = rule::build(terms) else {
            self.watcher.stop(tree);
            self.rule = None;
            debug!("no usable terms; annotation idle");
            return ScanStats::default();
        };

        let stats = scan(tree, root, &rule, &self.policy);
        self.watcher.start(tree, root);
        info!(terms = rule.terms().len(), annotations = stats.annotations, "annotation active");
        self.rule = Some(rule);
        stats
    }

    /// Stop watching, revert every annotation, then initialize with `terms`.
    pub fn refresh<T, S>(&mut self, tree: &mut T, root: NodeId, terms: &[S]) -> ScanStats
    where
        T: ContentTree + ?Sized,
        S: AsRef<str>,
    {
        self.watcher.stop(tree);
        self.rule = None;
        let cleared = clear_annotations(tree, root);
        debug!(cleared, "annotations cleared for rebuild");
        self.initialize(tree, root, terms)
    }

    /// Annotate content inserted since the last pump.
    pub fn pump<T: ContentTree + ?Sized>(&mut self, tree: &mut T) -> ScanStats {
        match &self.rule {
            Some(rule) => self.watcher.process_pending(tree, rule, &self.policy),
            None => ScanStats::default(),
        }
    }

    /// Stop watching without touching existing annotations.
    pub fn teardown<T: ContentTree + ?Sized>(&mut self, tree: &mut T) {
        self.watcher.stop(tree);
        self.rule = None;
    }
}

/// Replace every annotation under `root` by a text node holding its exact
/// text. Adjacent text nodes are left split. Returns the number reverted.
pub fn clear_annotations<T: ContentTree + ?Sized>(tree: &mut T, root: NodeId) -> usize {
    let mut cleared = 0;
    for span in tree.find_by_class(root, ANNOTATION_CLASS) {
        if tree.parent(span).is_none() {
            continue;
        }
        let text = tree.text_content(span);
        let plain = tree.create_text(&text);
        if let Err(error) = tree.replace_with_nodes(span, &[plain]) {
            warn!(span = %span, error = %error, "failed to revert annotation");
            continue;
        }
        cleared += 1;
        if let Err(error) = tree.release(span) {
            warn!(span = %span, error = %error, "failed to release annotation");
        }
    }
    cleared
}
