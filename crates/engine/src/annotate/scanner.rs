// Subtree scanning: wrap rule matches found in text leaves.

use tracing::{debug, warn};

use super::rule::MatchRule;
use super::{ANNOTATION_CLASS, DEFAULT_OPAQUE_TAGS, RESERVED_CLASSES, TERM_ATTR};
use crate::document::{ContentTree, DocumentError, NodeId};

/// Which text leaves are off limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipPolicy {
    opaque_tags: Vec<String>,
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self { opaque_tags: DEFAULT_OPAQUE_TAGS.iter().map(|t| t.to_string()).collect() }
    }
}

impl SkipPolicy {
    /// Default opaque tags plus `extra`.
    pub fn with_extra_tags<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut policy = Self::default();
        for tag in extra {
            let tag = tag.as_ref().trim().to_ascii_lowercase();
            if !tag.is_empty() && !policy.opaque_tags.contains(&tag) {
                policy.opaque_tags.push(tag);
            }
        }
        policy
    }

    pub fn is_opaque(&self, tag: &str) -> bool {
        self.opaque_tags.iter().any(|t| t == tag)
    }

    /// True for detached leaves and leaves under an opaque element, an
    /// existing annotation, or a reserved overlay region.
    pub fn should_skip<T: ContentTree + ?Sized>(&self, tree: &T, leaf: NodeId) -> bool {
        let Some(mut cursor) = tree.parent(leaf) else {
            return true;
        };
        loop {
            if tree.tag_name(cursor).is_some_and(|tag| self.is_opaque(tag)) {
                return true;
            }
            if tree.has_class(cursor, ANNOTATION_CLASS)
                || RESERVED_CLASSES.iter().any(|class| tree.has_class(cursor, class))
            {
                return true;
            }
            match tree.parent(cursor) {
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub leaves_visited: usize,
    pub leaves_annotated: usize,
    pub annotations: usize,
}

impl ScanStats {
    pub fn merge(&mut self, other: ScanStats) {
        self.leaves_visited += other.leaves_visited;
        self.leaves_annotated += other.leaves_annotated;
        self.annotations += other.annotations;
    }
}

/// A run of leaf text: untouched, or one rule match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRun<'t> {
    Plain(&'t str),
    Annotated(&'t str),
}

/// Split `text` into alternating plain and annotated runs. Concatenating the
/// runs reproduces `text` exactly; empty plain runs are omitted.
pub fn split_runs<'t>(text: &'t str, rule: &MatchRule) -> Vec<TextRun<'t>> {
    let mut runs = Vec::new();
    let mut cursor = 0;
    for found in rule.find_iter(text) {
        if found.start > cursor {
            runs.push(TextRun::Plain(&text[cursor..found.start]));
        }
        runs.push(TextRun::Annotated(found.text));
        cursor = found.end;
    }
    if cursor < text.len() {
        runs.push(TextRun::Plain(&text[cursor..]));
    }
    runs
}

/// Annotate every eligible text leaf under `root`.
pub fn scan<T: ContentTree + ?Sized>(
    tree: &mut T,
    root: NodeId,
    rule: &MatchRule,
    policy: &SkipPolicy,
) -> ScanStats {
    let candidates: Vec<NodeId> = tree
        .text_leaves(root)
        .into_iter()
        .filter(|&leaf| tree.text(leaf).is_some_and(|t| !t.trim().is_empty()))
        .filter(|&leaf| !policy.should_skip(&*tree, leaf))
        .collect();

    let mut stats = ScanStats { leaves_visited: candidates.len(), ..ScanStats::default() };
    for leaf in candidates {
        match annotate_leaf(tree, leaf, rule) {
            Ok(0) => {}
            Ok(count) => {
                stats.leaves_annotated += 1;
                stats.annotations += count;
            }
            Err(error) => warn!(leaf = %leaf, error = %error, "failed to annotate text leaf"),
        }
    }
    debug!(
        visited = stats.leaves_visited,
        annotated = stats.leaves_annotated,
        annotations = stats.annotations,
        "scan complete"
    );
    stats
}

/// Replace one text leaf by its plain/annotated runs and release the leaf.
/// Returns the number of annotations created; a leaf without matches is left
/// untouched.
pub fn annotate_leaf<T: ContentTree + ?Sized>(
    tree: &mut T,
    leaf: NodeId,
    rule: &MatchRule,
) -> Result<usize, DocumentError> {
    let Some(text) = tree.text(leaf).map(str::to_string) else {
        return Ok(0);
    };
    let runs = split_runs(&text, rule);
    let count = runs.iter().filter(|run| matches!(run, TextRun::Annotated(_))).count();
    if count == 0 {
        return Ok(0);
    }

    let mut nodes = Vec::with_capacity(runs.len());
    for run in runs {
        match run {
            TextRun::Plain(plain) => nodes.push(tree.create_text(plain)),
            TextRun::Annotated(literal) => {
                let span = tree.create_element("span");
                tree.set_attribute(span, "class", ANNOTATION_CLASS)?;
                tree.set_attribute(span, TERM_ATTR, literal)?;
                let inner = tree.create_text(literal);
                tree.append_child(span, inner)?;
                nodes.push(span);
            }
        }
    }
    tree.replace_with_nodes(leaf, &nodes)?;
    tree.release(leaf)?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{collect_annotations, rule, POPUP_CLASS};
    use crate::document::Document;

    fn doc_with(text: &str) -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_element(root, "p").unwrap();
        doc.append_text(p, text).unwrap();
        (doc, root, p)
    }

    #[test]
    fn wraps_exactly_the_match() {
        let (mut doc, root, p) = doc_with("the cat sat");
        let rule = rule::build(&["cat"]).unwrap();
        let stats = scan(&mut doc, root, &rule, &SkipPolicy::default());

        assert_eq!(stats.annotations, 1);
        assert_eq!(
            doc.inner_html(p),
            "the <span class=\"termlight-highlight\" data-termlight-term=\"cat\">cat</span> sat"
        );
        let children = doc.children(p);
        assert_eq!(doc.text(children[0]), Some("the "));
        assert_eq!(doc.text(children[2]), Some(" sat"));
    }

    #[test]
    fn annotation_keeps_source_casing() {
        let (mut doc, root, _) = doc_with("Cat!");
        let rule = rule::build(&["cat"]).unwrap();
        scan(&mut doc, root, &rule, &SkipPolicy::default());
        let found = collect_annotations(&doc, root);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].matched_text, "Cat");
        assert_eq!(found[0].term_key, "Cat");
    }

    #[test]
    fn second_scan_changes_nothing() {
        let (mut doc, root, _) = doc_with("cat and dog and cat");
        let rule = rule::build(&["cat", "dog"]).unwrap();
        let first = scan(&mut doc, root, &rule, &SkipPolicy::default());
        let html = doc.inner_html(root);
        let second = scan(&mut doc, root, &rule, &SkipPolicy::default());

        assert_eq!(first.annotations, 3);
        assert_eq!(second.annotations, 0);
        assert_eq!(doc.inner_html(root), html);
    }

    #[test]
    fn skips_opaque_ancestors() {
        let mut doc = Document::new();
        let root = doc.root();
        let pre = doc.append_element(root, "pre").unwrap();
        let em = doc.append_element(pre, "em").unwrap();
        doc.append_text(em, "cat").unwrap();
        let script = doc.append_element(root, "script").unwrap();
        doc.append_text(script, "cat").unwrap();

        let rule = rule::build(&["cat"]).unwrap();
        let stats = scan(&mut doc, root, &rule, &SkipPolicy::default());
        assert_eq!(stats.annotations, 0);
    }

    #[test]
    fn extra_tags_extend_policy() {
        let mut doc = Document::new();
        let root = doc.root();
        let kbd = doc.append_element(root, "kbd").unwrap();
        doc.append_text(kbd, "cat").unwrap();

        let rule = rule::build(&["cat"]).unwrap();
        let policy = SkipPolicy::with_extra_tags(["KBD"]);
        assert!(policy.is_opaque("kbd"));
        assert_eq!(scan(&mut doc, root, &rule, &policy).annotations, 0);
        assert_eq!(scan(&mut doc, root, &rule, &SkipPolicy::default()).annotations, 1);
    }

    #[test]
    fn skips_reserved_regions() {
        let mut doc = Document::new();
        let root = doc.root();
        let popup = doc.append_element(root, "div").unwrap();
        doc.set_attribute(popup, "class", POPUP_CLASS).unwrap();
        let label = doc.append_element(popup, "label").unwrap();
        doc.append_text(label, "cat").unwrap();

        let rule = rule::build(&["cat"]).unwrap();
        assert_eq!(scan(&mut doc, root, &rule, &SkipPolicy::default()).annotations, 0);
    }

    #[test]
    fn blank_and_detached_leaves_are_ignored() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_text(root, "   ").unwrap();
        let detached = doc.create_text("cat");

        let rule = rule::build(&["cat"]).unwrap();
        let policy = SkipPolicy::default();
        assert!(policy.should_skip(&doc, detached));
        let stats = scan(&mut doc, root, &rule, &policy);
        assert_eq!(stats.leaves_visited, 0);
    }

    #[test]
    fn split_runs_preserve_every_character() {
        let rule = rule::build(&["ab"]).unwrap();
        let runs = split_runs("ab, ab ab", &rule);
        assert_eq!(
            runs,
            vec![
                TextRun::Annotated("ab"),
                TextRun::Plain(", "),
                TextRun::Annotated("ab"),
                TextRun::Plain(" "),
                TextRun::Annotated("ab"),
            ]
        );
    }

    #[test]
    fn unmatched_leaf_is_not_replaced() {
        let (mut doc, _, p) = doc_with("nothing here");
        let leaf = doc.children(p)[0];
        let rule = rule::build(&["cat"]).unwrap();
        assert_eq!(annotate_leaf(&mut doc, leaf, &rule), Ok(0));
        assert_eq!(doc.children(p), &[leaf]);
    }
}
