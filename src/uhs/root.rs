//! The root of a decoded hint tree.
//!
//! Besides holding the top-level children, the root owns the link
//! registry: every link-capable node created during a 9x parse is recorded
//! here under its id (its starting line index in the file), and link hunks
//! are resolved by lookup rather than traversal, which is also what keeps
//! mutually referencing links from recursing.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::uhs::node::{Node, NodeContent, NodeKind, SharedNode};

/// A node to hold all others, plus the id-to-node link registry.
#[derive(Debug)]
pub struct RootNode {
    node: SharedNode,
    links: HashMap<usize, SharedNode>,
}

impl RootNode {
    /// Creates an empty root with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        RootNode {
            node: Node::text(NodeKind::Root, title).shared(),
            links: HashMap::new(),
        }
    }

    /// The underlying root node. Cloning the handle is cheap.
    pub fn node(&self) -> SharedNode {
        self.node.clone()
    }

    pub fn title(&self) -> String {
        self.node
            .borrow()
            .content()
            .as_text()
            .unwrap_or_default()
            .to_string()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.node
            .borrow_mut()
            .set_content(NodeContent::Text(title.into()));
    }

    /// Makes a node available as a link target. Nodes without an id are
    /// not registered.
    pub fn register_link(&mut self, node: &SharedNode) {
        if let Some(id) = node.borrow().id() {
            self.links.insert(id, node.clone());
        }
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Looks up a link target by id.
    ///
    /// Callers always receive a group: a non-group target is wrapped
    /// transparently in a synthetic single-child container.
    pub fn resolve_link(&self, id: usize) -> Option<SharedNode> {
        let target = self.links.get(&id)?;
        if target.borrow().is_group() {
            Some(target.clone())
        } else {
            let mut wrapper = Node::text(NodeKind::Wrapper, "");
            wrapper.add_child(target.clone());
            Some(wrapper.shared())
        }
    }

    /// Appends a top-level child. The root is always fully "open", so its
    /// revealed count tracks the child count.
    pub fn add_child(&self, child: SharedNode) {
        let mut node = self.node.borrow_mut();
        node.add_child(child);
        let count = node.child_count();
        node.set_revealed_count(count);
    }

    /// Replaces the top-level children, keeping the root fully revealed.
    pub fn set_children(&self, children: Vec<SharedNode>) {
        let mut node = self.node.borrow_mut();
        node.set_children(children);
        let count = node.child_count();
        node.set_revealed_count(count);
    }

    /// Re-asserts the fully-revealed invariant after children were added
    /// through the shared node handle.
    pub(crate) fn sync_revealed(&self) {
        let mut node = self.node.borrow_mut();
        let count = node.child_count();
        node.set_revealed_count(count);
    }

    pub fn child_count(&self) -> usize {
        self.node.borrow().child_count()
    }

    pub fn child(&self, n: usize) -> Option<SharedNode> {
        self.node.borrow().child(n)
    }

    /// Writes an indented dump of the whole tree.
    pub fn write_tree<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.node.borrow().write_tree(out, "", "  ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_stays_fully_revealed() {
        let root = RootNode::new("title");
        for i in 0..3 {
            root.add_child(Node::text(NodeKind::Subject, format!("s{}", i)).shared());
        }
        assert_eq!(root.node().borrow().revealed_count(), 3);

        root.set_children(vec![Node::text(NodeKind::Subject, "only").shared()]);
        assert_eq!(root.node().borrow().revealed_count(), 1);
    }

    #[test]
    fn resolving_a_leaf_wraps_it_in_a_group() {
        let mut root = RootNode::new("title");
        let mut leaf = Node::text(NodeKind::Incentive, "Incentive: -");
        leaf.set_id(12);
        let leaf = leaf.shared();
        root.register_link(&leaf);

        let resolved = root.resolve_link(12).unwrap();
        let resolved = resolved.borrow();
        assert_eq!(resolved.kind(), NodeKind::Wrapper);
        assert_eq!(resolved.child_count(), 1);
        assert_eq!(
            resolved.child(0).unwrap().borrow().id(),
            Some(12)
        );
    }

    #[test]
    fn resolving_a_group_returns_it_directly() {
        let mut root = RootNode::new("title");
        let mut group = Node::text(NodeKind::Subject, "s");
        group.set_id(5);
        group.add_child(Node::text(NodeKind::Hint, "h").shared());
        let group = group.shared();
        root.register_link(&group);

        let resolved = root.resolve_link(5).unwrap();
        assert_eq!(resolved.borrow().kind(), NodeKind::Subject);
        assert!(root.resolve_link(99).is_none());
    }
}
