// Single-slot overlay state.
//
// At most one overlay is open. Each is mounted under the document root as a
// reserved region so the annotation engine never touches its text, and its
// action controls track an in-flight flag plus the label to restore.

use termlight_common::types::TermId;
use tracing::warn;

use super::placement::{OverlayGeometry, PlacementStyle, Rect};
use crate::annotate::{POPUP_CLASS, TOOLTIP_CLASS};
use crate::document::{ContentTree, DocumentError, NodeId};

pub const SAVE_LABEL: &str = "Save";
pub const SAVING_LABEL: &str = "Saving...";
pub const EDIT_LABEL: &str = "Edit";
pub const DELETE_LABEL: &str = "Delete";
pub const DELETING_LABEL: &str = "...";

const TOOLTIP_BELOW_CLASS: &str = "termlight-tooltip--below";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayContent {
    /// New term from the current selection.
    Entry { selected_text: String },
    /// Edit an existing term; inputs show current values as placeholders.
    Edit { term_id: TermId, original: String, translated: String },
    /// Translation shown for a clicked annotation.
    Lookup { term_id: TermId, original: String, translated: String },
}

impl OverlayContent {
    pub fn style(&self) -> PlacementStyle {
        match self {
            Self::Entry { .. } | Self::Edit { .. } => PlacementStyle::EntryPopup,
            Self::Lookup { .. } => PlacementStyle::LookupTooltip,
        }
    }

    fn region_class(&self) -> &'static str {
        match self {
            Self::Entry { .. } | Self::Edit { .. } => POPUP_CLASS,
            Self::Lookup { .. } => TOOLTIP_CLASS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayAction {
    Save,
    Edit,
    Delete,
}

/// A button: its current label, the label to restore, and whether a request
/// is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionControl {
    action: OverlayAction,
    idle_label: String,
    label: String,
    busy: bool,
    label_node: Option<NodeId>,
}

impl ActionControl {
    pub fn new(action: OverlayAction, label: &str) -> Self {
        Self {
            action,
            idle_label: label.to_string(),
            label: label.to_string(),
            busy: false,
            label_node: None,
        }
    }

    pub fn action(&self) -> OverlayAction {
        self.action
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Mark in flight. Returns false if a request is already running.
    pub fn begin(&mut self, busy_label: &str) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        self.label = busy_label.to_string();
        true
    }

    /// Re-enable and put the prior label back.
    pub fn restore(&mut self) {
        self.busy = false;
        self.label = self.idle_label.clone();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenOverlay {
    pub content: OverlayContent,
    pub geometry: OverlayGeometry,
    /// The rect the overlay was placed against, reused when a tooltip turns
    /// into an edit popup.
    pub anchor: Rect,
    pub node: NodeId,
    pub controls: Vec<ActionControl>,
}

impl OpenOverlay {
    pub fn control(&self, action: OverlayAction) -> Option<&ActionControl> {
        self.controls.iter().find(|c| c.action == action)
    }
}

#[derive(Debug, Default)]
pub struct OverlaySlot {
    current: Option<OpenOverlay>,
}

impl OverlaySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&OpenOverlay> {
        self.current.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// True when `node` lies inside the open overlay.
    pub fn contains<T: ContentTree + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        self.current.as_ref().is_some_and(|open| tree.contains(open.node, node))
    }

    /// Close whatever is open, then mount `content` under `parent`.
    pub fn open<T: ContentTree + ?Sized>(
        &mut self,
        tree: &mut T,
        parent: NodeId,
        content: OverlayContent,
        anchor: Rect,
        geometry: OverlayGeometry,
    ) -> Result<&OpenOverlay, DocumentError> {
        self.close(tree);
        let (node, controls) = mount(tree, &content, &geometry)?;
        tree.append_child(parent, node)?;
        Ok(self.current.insert(OpenOverlay { content, geometry, anchor, node, controls }))
    }

    /// Unmount and forget the open overlay.
    pub fn close<T: ContentTree + ?Sized>(&mut self, tree: &mut T) -> Option<OverlayContent> {
        let open = self.current.take()?;
        if tree.parent(open.node).is_some() {
            if let Err(error) = tree.remove(open.node) {
                warn!(error = %error, "failed to unmount overlay");
            }
        }
        if let Err(error) = tree.release(open.node) {
            warn!(error = %error, "failed to release overlay nodes");
        }
        Some(open.content)
    }

    /// Start a request on `action`. Returns false when nothing is open, the
    /// overlay has no such control, or a request is already in flight.
    pub fn begin_action<T: ContentTree + ?Sized>(
        &mut self,
        tree: &mut T,
        action: OverlayAction,
        busy_label: &str,
    ) -> bool {
        let Some(control) = self.control_mut(action) else {
            return false;
        };
        if !control.begin(busy_label) {
            return false;
        }
        let (node, label) = (control.label_node, control.label.clone());
        sync_label(tree, node, &label);
        true
    }

    /// Undo `begin_action` after a failed request; the overlay stays open.
    pub fn restore_action<T: ContentTree + ?Sized>(&mut self, tree: &mut T, action: OverlayAction) {
        if let Some(control) = self.control_mut(action) {
            control.restore();
            let (node, label) = (control.label_node, control.label.clone());
            sync_label(tree, node, &label);
        }
    }

    fn control_mut(&mut self, action: OverlayAction) -> Option<&mut ActionControl> {
        self.current.as_mut()?.controls.iter_mut().find(|c| c.action == action)
    }
}

fn sync_label<T: ContentTree + ?Sized>(tree: &mut T, node: Option<NodeId>, label: &str) {
    if let Some(node) = node {
        if let Err(error) = tree.set_text(node, label) {
            warn!(error = %error, "failed to update overlay control label");
        }
    }
}

fn mount<T: ContentTree + ?Sized>(
    tree: &mut T,
    content: &OverlayContent,
    geometry: &OverlayGeometry,
) -> Result<(NodeId, Vec<ActionControl>), DocumentError> {
    let region = tree.create_element("div");
    let mut class = content.region_class().to_string();
    if matches!(content, OverlayContent::Lookup { .. }) && geometry.placed_below {
        class.push(' ');
        class.push_str(TOOLTIP_BELOW_CLASS);
    }
    tree.set_attribute(region, "class", &class)?;
    tree.set_attribute(region, "style", &format!("top: {}px; left: {}px", geometry.top, geometry.left))?;

    let mut controls = Vec::new();
    match content {
        OverlayContent::Entry { selected_text } => {
            append_text_element(tree, region, "div", selected_text)?;
            append_input(tree, region, "translated", "Translation")?;
            controls.push(append_button(tree, region, OverlayAction::Save, SAVE_LABEL)?);
        }
        OverlayContent::Edit { original, translated, .. } => {
            append_text_element(tree, region, "div", "Edit translation")?;
            append_input(tree, region, "original", original)?;
            append_input(tree, region, "translated", translated)?;
            controls.push(append_button(tree, region, OverlayAction::Save, SAVE_LABEL)?);
        }
        OverlayContent::Lookup { original, translated, .. } => {
            append_text_element(tree, region, "span", original)?;
            append_text_element(tree, region, "div", translated)?;
            controls.push(append_button(tree, region, OverlayAction::Edit, EDIT_LABEL)?);
            controls.push(append_button(tree, region, OverlayAction::Delete, DELETE_LABEL)?);
        }
    }
    Ok((region, controls))
}

fn append_text_element<T: ContentTree + ?Sized>(
    tree: &mut T,
    parent: NodeId,
    tag: &str,
    text: &str,
) -> Result<NodeId, DocumentError> {
    let element = tree.create_element(tag);
    let inner = tree.create_text(text);
    tree.append_child(element, inner)?;
    tree.append_child(parent, element)?;
    Ok(element)
}

fn append_input<T: ContentTree + ?Sized>(
    tree: &mut T,
    parent: NodeId,
    name: &str,
    placeholder: &str,
) -> Result<NodeId, DocumentError> {
    let input = tree.create_element("input");
    tree.set_attribute(input, "name", name)?;
    tree.set_attribute(input, "placeholder", placeholder)?;
    tree.append_child(parent, input)?;
    Ok(input)
}

fn append_button<T: ContentTree + ?Sized>(
    tree: &mut T,
    parent: NodeId,
    action: OverlayAction,
    label: &str,
) -> Result<ActionControl, DocumentError> {
    let button = tree.create_element("button");
    let label_node = tree.create_text(label);
    tree.append_child(button, label_node)?;
    tree.append_child(parent, button)?;
    let mut control = ActionControl::new(action, label);
    control.label_node = Some(label_node);
    Ok(control)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn geometry() -> OverlayGeometry {
        OverlayGeometry { top: 10.0, left: 20.0, placed_below: true }
    }

    fn entry(text: &str) -> OverlayContent {
        OverlayContent::Entry { selected_text: text.into() }
    }

    #[test]
    fn opening_replaces_previous_overlay() {
        let mut doc = Document::new();
        let root = doc.root();
        let mut slot = OverlaySlot::new();

        let first = slot.open(&mut doc, root, entry("one"), Rect::default(), geometry()).unwrap().node;
        let second = slot.open(&mut doc, root, entry("two"), Rect::default(), geometry()).unwrap().node;

        assert!(!doc.is_attached(first));
        assert!(doc.is_attached(second));
        assert_eq!(doc.find_by_class(root, POPUP_CLASS), vec![second]);
    }

    #[test]
    fn mount_carries_position_and_class() {
        let mut doc = Document::new();
        let root = doc.root();
        let mut slot = OverlaySlot::new();
        let content = OverlayContent::Lookup {
            term_id: TermId::from("1"),
            original: "cat".into(),
            translated: "gato".into(),
        };
        let node = slot.open(&mut doc, root, content, Rect::default(), geometry()).unwrap().node;

        assert_eq!(doc.attribute(node, "style"), Some("top: 10px; left: 20px"));
        assert!(doc.has_class(node, TOOLTIP_CLASS));
        assert!(doc.has_class(node, TOOLTIP_BELOW_CLASS));
        assert_eq!(doc.text_content(node), "catgatoEditDelete");
    }

    #[test]
    fn busy_control_blocks_reentry_and_restores_label() {
        let mut doc = Document::new();
        let root = doc.root();
        let mut slot = OverlaySlot::new();
        let node = slot.open(&mut doc, root, entry("cat"), Rect::default(), geometry()).unwrap().node;

        assert!(slot.begin_action(&mut doc, OverlayAction::Save, SAVING_LABEL));
        assert!(!slot.begin_action(&mut doc, OverlayAction::Save, SAVING_LABEL));
        assert!(doc.text_content(node).ends_with(SAVING_LABEL));
        assert!(slot.current().unwrap().control(OverlayAction::Save).unwrap().is_busy());

        slot.restore_action(&mut doc, OverlayAction::Save);
        let control = slot.current().unwrap().control(OverlayAction::Save).unwrap();
        assert!(!control.is_busy());
        assert_eq!(control.label(), SAVE_LABEL);
        assert!(doc.text_content(node).ends_with(SAVE_LABEL));
    }

    #[test]
    fn missing_control_cannot_begin() {
        let mut doc = Document::new();
        let root = doc.root();
        let mut slot = OverlaySlot::new();
        assert!(!slot.begin_action(&mut doc, OverlayAction::Save, SAVING_LABEL));
        slot.open(&mut doc, root, entry("cat"), Rect::default(), geometry()).unwrap();
        assert!(!slot.begin_action(&mut doc, OverlayAction::Delete, DELETING_LABEL));
    }

    #[test]
    fn close_unmounts_and_returns_content() {
        let mut doc = Document::new();
        let root = doc.root();
        let mut slot = OverlaySlot::new();
        let node = slot.open(&mut doc, root, entry("cat"), Rect::default(), geometry()).unwrap().node;
        let inside = doc.children(node)[0];
        assert!(slot.contains(&doc, inside));

        assert_eq!(slot.close(&mut doc), Some(entry("cat")));
        assert!(!doc.is_attached(node));
        assert!(!slot.is_open());
        assert_eq!(slot.close(&mut doc), None);
    }

    #[test]
    fn reopening_reuses_released_nodes() {
        let mut doc = Document::new();
        let root = doc.root();
        let mut slot = OverlaySlot::new();
        slot.open(&mut doc, root, entry("cat"), Rect::default(), geometry()).unwrap();
        let open_count = doc.node_count();

        for _ in 0..50 {
            slot.open(&mut doc, root, entry("cat"), Rect::default(), geometry()).unwrap();
        }
        assert_eq!(doc.node_count(), open_count);

        slot.close(&mut doc);
        assert_eq!(doc.node_count(), 1);
    }
}
