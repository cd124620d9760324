// Hierarchical text document with child-list mutation records.
//
// `ContentTree` is the capability the annotation engine needs from a host
// document: walk text leaves, inspect ancestors, splice nodes, and subscribe to
// insertions. `Document` is the in-process implementation: a slot arena of
// nodes addressed by generational `NodeId`s. Detached nodes stay allocated
// until released; a released slot is reused under a new generation, so a stale
// id resolves to nothing instead of to the slot's next occupant.

pub mod markdown;
pub mod render;

use std::fmt;

use thiserror::Error;

/// Handle to a node in a [`ContentTree`]. Never resolves again once the node
/// is released, even after its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    slot: usize,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.slot
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.generation {
            0 => write!(f, "#{}", self.slot),
            generation => write!(f, "#{}v{generation}", self.slot),
        }
    }
}

/// Handle for one insertion subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// One child-list change: nodes added to and removed from `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("node {0} has no parent")]
    Detached(NodeId),

    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("node {0} is not a text node")]
    NotText(NodeId),

    #[error("inserting {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("node {reference} is not a child of {parent}")]
    NotAChild { parent: NodeId, reference: NodeId },

    #[error("node {0} is still attached")]
    Attached(NodeId),
}

/// Tree-and-mutation capability required by the annotation engine.
///
/// Any host exposing element/text nodes, parent links and a subtree-wide
/// insertion subscription can implement this.
pub trait ContentTree {
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> &[NodeId];

    /// Lower-case tag name, `None` for text nodes.
    fn tag_name(&self, node: NodeId) -> Option<&str>;

    /// Text value, `None` for elements.
    fn text(&self, node: NodeId) -> Option<&str>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    fn create_element(&mut self, tag: &str) -> NodeId;

    fn create_text(&mut self, text: &str) -> NodeId;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DocumentError>;

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DocumentError>;

    /// Append `child`, moving it out of its current parent if needed.
    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError>;

    /// Detach `node` from its parent.
    fn remove(&mut self, node: NodeId) -> Result<(), DocumentError>;

    /// Replace `node` in its parent with `replacements`, in order.
    fn replace_with_nodes(&mut self, node: NodeId, replacements: &[NodeId]) -> Result<(), DocumentError>;

    /// Free a detached node and everything under it. Returns the number of
    /// nodes freed; their ids stop resolving.
    fn release(&mut self, node: NodeId) -> Result<usize, DocumentError>;

    /// Start recording insertions anywhere under `root` (inclusive).
    fn observe(&mut self, root: NodeId) -> ObserverId;

    /// Stop recording and drop anything not yet taken.
    fn disconnect(&mut self, observer: ObserverId);

    /// Drain the records accumulated since the last call.
    fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord>;

    fn is_text(&self, node: NodeId) -> bool {
        self.text(node).is_some()
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.tag_name(node).is_some()
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    /// True when `node` is `ancestor` or lies beneath it.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Nearest inclusive ancestor carrying `class`.
    fn closest_with_class(&self, node: NodeId, class: &str) -> Option<NodeId> {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if self.has_class(current, class) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    /// Concatenated text of every leaf under `node`.
    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        for leaf in self.text_leaves(node) {
            if let Some(text) = self.text(leaf) {
                out.push_str(text);
            }
        }
        out
    }

    /// Text leaves under `root` in document order.
    fn text_leaves(&self, root: NodeId) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.is_text(node) {
                leaves.push(node);
                continue;
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        leaves
    }

    /// Elements under `root` (inclusive) carrying `class`, in document order.
    fn find_by_class(&self, root: NodeId, class: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.has_class(node, class) {
                found.push(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        found
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Element { tag: String, attrs: Vec<(String, String)> },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug)]
struct Observer {
    id: ObserverId,
    root: NodeId,
    records: Vec<MutationRecord>,
}

/// Arena-backed [`ContentTree`].
#[derive(Debug)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
    observers: Vec<Observer>,
    next_observer: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document rooted at a `body` element.
    pub fn new() -> Self {
        Self::with_root_tag("body")
    }

    pub fn with_root_tag(tag: &str) -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId { slot: 0, generation: 0 },
            observers: Vec::new(),
            next_observer: 1,
        };
        doc.root = doc.push_node(NodeData::Element { tag: tag.to_ascii_lowercase(), attrs: Vec::new() });
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Live nodes, attached or detached. Released nodes are not counted.
    pub fn node_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(self.root, node)
    }

    /// Attributes of an element in insertion order.
    pub fn attributes(&self, node: NodeId) -> &[(String, String)] {
        match self.get(node).map(|n| &n.data) {
            Some(NodeData::Element { attrs, .. }) => attrs,
            _ => &[],
        }
    }

    /// Create an element and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> Result<NodeId, DocumentError> {
        let node = self.create_element(tag);
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Create a text node and append it to `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, DocumentError> {
        let node = self.create_text(text);
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Insert `child` before `reference`, or at the end when `reference` is `None`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DocumentError> {
        self.check_insertable(parent, child)?;
        if let Some(reference) = reference {
            if self.node(reference)?.parent != Some(parent) || reference == child {
                return Err(DocumentError::NotAChild { parent, reference });
            }
        }

        self.detach_recorded(child);

        let siblings = &mut self.node_mut(parent)?.children;
        let index = reference
            .and_then(|r| siblings.iter().position(|&c| c == r))
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        self.record(parent, vec![child], Vec::new());
        Ok(())
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let node = Node { data, parent: None, children: Vec::new() };
        match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot];
                entry.node = Some(node);
                NodeId { slot, generation: entry.generation }
            }
            None => {
                let slot = self.slots.len();
                self.slots.push(Slot { generation: 0, node: Some(node) });
                NodeId { slot, generation: 0 }
            }
        }
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.slot)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.slot)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.node.as_mut())
    }

    fn node(&self, id: NodeId) -> Result<&Node, DocumentError> {
        self.get(id).ok_or(DocumentError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DocumentError> {
        self.get_mut(id).ok_or(DocumentError::UnknownNode(id))
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        let parent_node = self.node(parent)?;
        self.node(child)?;
        if !matches!(parent_node.data, NodeData::Element { .. }) {
            return Err(DocumentError::NotAnElement(parent));
        }
        if self.contains(child, parent) {
            return Err(DocumentError::Cycle { parent, child });
        }
        Ok(())
    }

    /// Unlink `node` from its parent, recording the removal.
    fn detach_recorded(&mut self, node: NodeId) {
        let Some(old_parent) = self.get_mut(node).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(parent) = self.get_mut(old_parent) {
            parent.children.retain(|&c| c != node);
        }
        self.record(old_parent, Vec::new(), vec![node]);
    }

    fn record(&mut self, target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        if self.observers.is_empty() {
            return;
        }
        let interested: Vec<usize> = self
            .observers
            .iter()
            .enumerate()
            .filter(|(_, observer)| self.contains(observer.root, target))
            .map(|(i, _)| i)
            .collect();
        for i in interested {
            self.observers[i].records.push(MutationRecord {
                target,
                added: added.clone(),
                removed: removed.clone(),
            });
        }
    }
}

impl ContentTree for Document {
    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match self.get(node).map(|n| &n.data) {
            Some(NodeData::Element { tag, .. }) => Some(tag),
            _ => None,
        }
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match self.get(node).map(|n| &n.data) {
            Some(NodeData::Text(text)) => Some(text),
            _ => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attributes(node).iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeData::Element { tag: tag.to_ascii_lowercase(), attrs: Vec::new() })
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeData::Text(text.to_string()))
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DocumentError> {
        match self.get_mut(node).map(|n| &mut n.data) {
            Some(NodeData::Element { attrs, .. }) => {
                match attrs.iter_mut().find(|(key, _)| key == name) {
                    Some(slot) => slot.1 = value.to_string(),
                    None => attrs.push((name.to_string(), value.to_string())),
                }
                Ok(())
            }
            Some(NodeData::Text(_)) => Err(DocumentError::NotAnElement(node)),
            None => Err(DocumentError::UnknownNode(node)),
        }
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DocumentError> {
        match self.get_mut(node).map(|n| &mut n.data) {
            Some(NodeData::Text(value)) => {
                *value = text.to_string();
                Ok(())
            }
            Some(NodeData::Element { .. }) => Err(DocumentError::NotText(node)),
            None => Err(DocumentError::UnknownNode(node)),
        }
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        self.insert_before(parent, child, None)
    }

    fn remove(&mut self, node: NodeId) -> Result<(), DocumentError> {
        if self.node(node)?.parent.is_none() {
            return Err(DocumentError::Detached(node));
        }
        self.detach_recorded(node);
        Ok(())
    }

    fn replace_with_nodes(&mut self, node: NodeId, replacements: &[NodeId]) -> Result<(), DocumentError> {
        let parent = self.node(node)?.parent.ok_or(DocumentError::Detached(node))?;
        for &replacement in replacements {
            if replacement == node {
                return Err(DocumentError::Cycle { parent, child: replacement });
            }
            self.check_insertable(parent, replacement)?;
        }

        for &replacement in replacements {
            self.detach_recorded(replacement);
        }

        let siblings = &mut self.node_mut(parent)?.children;
        let index = siblings
            .iter()
            .position(|&c| c == node)
            .ok_or(DocumentError::NotAChild { parent, reference: node })?;
        siblings.splice(index..=index, replacements.iter().copied());
        self.node_mut(node)?.parent = None;
        for &replacement in replacements {
            self.node_mut(replacement)?.parent = Some(parent);
        }
        self.record(parent, replacements.to_vec(), vec![node]);
        Ok(())
    }

    fn release(&mut self, node: NodeId) -> Result<usize, DocumentError> {
        if self.node(node)?.parent.is_some() || node == self.root {
            return Err(DocumentError::Attached(node));
        }

        let mut freed = 0;
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let children = match self.slots.get_mut(current.slot) {
                Some(entry) if entry.generation == current.generation => match entry.node.take() {
                    Some(removed) => {
                        entry.generation = entry.generation.wrapping_add(1);
                        removed.children
                    }
                    None => continue,
                },
                _ => continue,
            };
            self.free.push(current.slot);
            freed += 1;
            stack.extend(children);
        }
        Ok(freed)
    }

    fn observe(&mut self, root: NodeId) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push(Observer { id, root, records: Vec::new() });
        id
    }

    fn disconnect(&mut self, observer: ObserverId) {
        self.observers.retain(|o| o.id != observer);
    }

    fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .iter_mut()
            .find(|o| o.id == observer)
            .map(|o| std::mem::take(&mut o.records))
            .unwrap_or_default()
    }
}
