// Text annotation engine: rule building, subtree scanning, incremental
// watching, and the build/clear/rebuild lifecycle.

pub mod lifecycle;
pub mod rule;
pub mod scanner;
pub mod watcher;

use serde::Serialize;

use crate::document::{ContentTree, NodeId};

/// Class carried by every annotation span.
pub const ANNOTATION_CLASS: &str = "termlight-highlight";

/// Attribute holding the matched literal on an annotation span.
pub const TERM_ATTR: &str = "data-termlight-term";

/// Class of the entry/edit popup region.
pub const POPUP_CLASS: &str = "termlight-popup";

/// Class of the lookup tooltip region.
pub const TOOLTIP_CLASS: &str = "termlight-tooltip";

/// Regions owned by the engine's own UI; never annotated.
pub const RESERVED_CLASSES: &[&str] = &[POPUP_CLASS, TOOLTIP_CLASS];

/// Elements whose text is never annotated.
pub const DEFAULT_OPAQUE_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "canvas", "audio", "video", "object", "embed",
    "textarea", "input", "code", "pre", "svg",
];

/// An annotation as it appears in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub matched_text: String,
    pub term_key: String,
}

/// Every annotation under `root`, in document order.
pub fn collect_annotations<T: ContentTree + ?Sized>(tree: &T, root: NodeId) -> Vec<Annotation> {
    tree.find_by_class(root, ANNOTATION_CLASS)
        .into_iter()
        .map(|span| {
            let matched_text = tree.text_content(span);
            let term_key = tree
                .attribute(span, TERM_ATTR)
                .map(str::to_string)
                .unwrap_or_else(|| matched_text.clone());
            Annotation { matched_text, term_key }
        })
        .collect()
}

/// The annotation span enclosing `node`, if any.
pub fn enclosing_annotation<T: ContentTree + ?Sized>(tree: &T, node: NodeId) -> Option<NodeId> {
    tree.closest_with_class(node, ANNOTATION_CLASS)
}

/// Trimmed term literal of an annotation span: the term attribute, falling
/// back to its text content.
pub fn annotation_literal<T: ContentTree + ?Sized>(tree: &T, span: NodeId) -> Option<String> {
    let literal = match tree.attribute(span, TERM_ATTR) {
        Some(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => tree.text_content(span).trim().to_string(),
    };
    (!literal.is_empty()).then_some(literal)
}
