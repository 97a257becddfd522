//! The hint tree data model.
//!
//! A [`Node`] carries a kind tag, content (text, image bytes, or audio
//! bytes), an optional id (what link hunks target), and exactly one of
//! three shapes: a leaf, a link to another node's id, or a group of child
//! nodes (optionally with clickable hotspot geometry). The shapes are
//! mutually exclusive by construction: setting a link target drops any
//! children, and adding a child drops any link target.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::uhs::hotspot::HotSpotZone;

/// A shared handle to a node. The tree and the root's link registry both
/// hold these; the decoder is single-threaded, so `Rc<RefCell>` suffices.
pub type SharedNode = Rc<RefCell<Node>>;

/// Semantic role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Subject,
    Question,
    Hint,
    NestHint,
    Comment,
    CommentData,
    Credit,
    CreditData,
    Text,
    TextData,
    Link,
    HotSpot,
    Hyperpng,
    Hypergif,
    Overlay,
    Sound,
    SoundData,
    Blank,
    Version,
    VersionData,
    Info,
    InfoData,
    Incentive,
    IncentiveData,
    Unknown,
    /// Synthetic single-child container returned when a link resolves to a
    /// non-group node.
    Wrapper,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Root => "Root",
            NodeKind::Subject => "Subject",
            NodeKind::Question => "Question",
            NodeKind::Hint => "Hint",
            NodeKind::NestHint => "NestHint",
            NodeKind::Comment => "Comment",
            NodeKind::CommentData => "CommentData",
            NodeKind::Credit => "Credit",
            NodeKind::CreditData => "CreditData",
            NodeKind::Text => "Text",
            NodeKind::TextData => "TextData",
            NodeKind::Link => "Link",
            NodeKind::HotSpot => "HotSpot",
            NodeKind::Hyperpng => "Hyperpng",
            NodeKind::Hypergif => "Hypergif",
            NodeKind::Overlay => "Overlay",
            NodeKind::Sound => "Sound",
            NodeKind::SoundData => "SoundData",
            NodeKind::Blank => "Blank",
            NodeKind::Version => "Version",
            NodeKind::VersionData => "VersionData",
            NodeKind::Info => "Info",
            NodeKind::InfoData => "InfoData",
            NodeKind::Incentive => "Incentive",
            NodeKind::IncentiveData => "IncentiveData",
            NodeKind::Unknown => "Unknown",
            NodeKind::Wrapper => "Wrapper",
        }
    }
}

/// Node content; exactly one representation is populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeContent {
    Text(String),
    /// Raw image bytes from the file's binary section; empty when the
    /// referenced range could not be read.
    Image(Vec<u8>),
    /// Raw audio bytes (PCM WAV in files seen in the wild); empty when the
    /// referenced range could not be read.
    Audio(Vec<u8>),
}

impl NodeContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            NodeContent::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// The mutually exclusive structural states of a node.
#[derive(Debug)]
pub(crate) enum NodeShape {
    Leaf,
    Link {
        target: usize,
    },
    Group {
        children: Vec<SharedNode>,
        revealed: usize,
    },
    HotSpot {
        children: Vec<SharedNode>,
        zones: Vec<HotSpotZone>,
        revealed: usize,
    },
}

/// A container for hierarchical hint content.
#[derive(Debug)]
pub struct Node {
    kind: NodeKind,
    content: NodeContent,
    id: Option<usize>,
    pub(crate) shape: NodeShape,
}

impl Node {
    /// Creates a leaf node with text content.
    pub fn text(kind: NodeKind, content: impl Into<String>) -> Self {
        Node {
            kind,
            content: NodeContent::Text(content.into()),
            id: None,
            shape: NodeShape::Leaf,
        }
    }

    /// Creates a leaf node with image content.
    pub fn image(kind: NodeKind, bytes: Vec<u8>) -> Self {
        Node {
            kind,
            content: NodeContent::Image(bytes),
            id: None,
            shape: NodeShape::Leaf,
        }
    }

    /// Creates a leaf node with audio content.
    pub fn audio(kind: NodeKind, bytes: Vec<u8>) -> Self {
        Node {
            kind,
            content: NodeContent::Audio(bytes),
            id: None,
            shape: NodeShape::Leaf,
        }
    }

    /// Wraps a node in the shared handle the tree uses.
    pub fn shared(self) -> SharedNode {
        Rc::new(RefCell::new(self))
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    pub fn set_content(&mut self, content: NodeContent) {
        self.content = content;
    }

    /// This node's id, used by the root to resolve link targets.
    pub fn id(&self) -> Option<usize> {
        self.id
    }

    pub fn set_id(&mut self, id: usize) {
        self.id = Some(id);
    }

    pub fn is_link(&self) -> bool {
        matches!(self.shape, NodeShape::Link { .. })
    }

    pub fn link_target(&self) -> Option<usize> {
        match self.shape {
            NodeShape::Link { target } => Some(target),
            _ => None,
        }
    }

    /// Turns this node into a pure reference, dropping any children.
    /// Ignored on hotspot nodes, which are always groups.
    pub fn set_link_target(&mut self, target: usize) {
        if matches!(self.shape, NodeShape::HotSpot { .. }) {
            return;
        }
        self.shape = NodeShape::Link { target };
    }

    /// True if this node contains nested child nodes.
    pub fn is_group(&self) -> bool {
        match &self.shape {
            NodeShape::Group { .. } => true,
            NodeShape::HotSpot { children, .. } => !children.is_empty(),
            _ => false,
        }
    }

    pub fn children(&self) -> &[SharedNode] {
        match &self.shape {
            NodeShape::Group { children, .. } => children,
            NodeShape::HotSpot { children, .. } => children,
            _ => &[],
        }
    }

    pub fn child(&self, n: usize) -> Option<SharedNode> {
        self.children().get(n).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    /// Appends a child, converting a leaf or link node into a group.
    /// On hotspot nodes the child receives a default zone, keeping the
    /// geometry list in lockstep.
    pub fn add_child(&mut self, child: SharedNode) {
        match &mut self.shape {
            NodeShape::Group { children, .. } => children.push(child),
            NodeShape::HotSpot {
                children,
                zones,
                revealed,
            } => {
                children.push(child);
                zones.push(HotSpotZone::default());
                if *revealed < 1 {
                    *revealed = 1;
                }
            }
            _ => {
                self.shape = NodeShape::Group {
                    children: vec![child],
                    revealed: 1,
                };
            }
        }
    }

    /// Replaces the current children. An empty list reverts the node to a
    /// leaf; on hotspot nodes the new children receive default zones.
    pub fn set_children(&mut self, new_children: Vec<SharedNode>) {
        if new_children.is_empty() {
            self.remove_all_children();
            return;
        }
        match &mut self.shape {
            NodeShape::HotSpot {
                children,
                zones,
                revealed,
            } => {
                *zones = new_children
                    .iter()
                    .map(|_| HotSpotZone::default())
                    .collect();
                *children = new_children;
                *revealed = 1;
            }
            _ => {
                self.shape = NodeShape::Group {
                    children: new_children,
                    revealed: 1,
                };
            }
        }
    }

    pub fn remove_child(&mut self, n: usize) {
        match &mut self.shape {
            NodeShape::Group { children, revealed } => {
                if n >= children.len() {
                    return;
                }
                children.remove(n);
                *revealed = revealed.saturating_sub(1);
                if children.is_empty() {
                    self.shape = NodeShape::Leaf;
                }
            }
            NodeShape::HotSpot {
                children,
                zones,
                revealed,
            } => {
                if n >= children.len() {
                    return;
                }
                children.remove(n);
                zones.remove(n);
                *revealed = revealed.saturating_sub(1);
            }
            _ => {}
        }
    }

    pub fn remove_all_children(&mut self) {
        match &mut self.shape {
            NodeShape::Group { .. } => self.shape = NodeShape::Leaf,
            NodeShape::HotSpot {
                children,
                zones,
                revealed,
            } => {
                children.clear();
                zones.clear();
                *revealed = 0;
            }
            _ => {}
        }
    }

    /// The number of children currently disclosed to a consumer, or 0 when
    /// there are none.
    pub fn revealed_count(&self) -> usize {
        match &self.shape {
            NodeShape::Group { revealed, .. } => *revealed,
            NodeShape::HotSpot { revealed, .. } => *revealed,
            _ => 0,
        }
    }

    /// Sets the number of revealed children; out-of-range values
    /// (below 1 or above the child count) are ignored.
    pub fn set_revealed_count(&mut self, n: usize) {
        if n < 1 || n > self.child_count() {
            return;
        }
        match &mut self.shape {
            NodeShape::Group { revealed, .. } => *revealed = n,
            NodeShape::HotSpot { revealed, .. } => *revealed = n,
            _ => {}
        }
    }

    /// Recursively writes an indented dump of this node and its children.
    /// Ids render as `^id^:`, links as `(^Link to N^)`, and binary content
    /// as `^IMAGE^` / `^AUDIO^`.
    pub fn write_tree<W: Write>(&self, out: &mut W, indent: &str, spacer: &str) -> io::Result<()> {
        let id_str = match self.id {
            Some(id) => format!("^{}^: ", id),
            None => String::new(),
        };
        let link_str = match self.link_target() {
            Some(target) => format!(" (^Link to {}^)", target),
            None => String::new(),
        };
        match &self.content {
            NodeContent::Text(s) => writeln!(out, "{}{}{}{}", indent, id_str, s, link_str)?,
            NodeContent::Image(_) => writeln!(out, "{}{}^IMAGE^{}", indent, id_str, link_str)?,
            NodeContent::Audio(_) => writeln!(out, "{}{}^AUDIO^{}", indent, id_str, link_str)?,
        }
        let deeper = format!("{}{}", indent, spacer);
        for child in self.children() {
            child.borrow().write_tree(out, &deeper, spacer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adding_a_child_clears_a_link_target() {
        let mut node = Node::text(NodeKind::Link, "see also");
        node.set_link_target(42);
        assert_eq!(node.link_target(), Some(42));

        node.add_child(Node::text(NodeKind::Hint, "h").shared());
        assert_eq!(node.link_target(), None);
        assert!(node.is_group());
        assert_eq!(node.revealed_count(), 1);
    }

    #[test]
    fn setting_a_link_target_drops_children() {
        let mut node = Node::text(NodeKind::Hint, "q");
        node.add_child(Node::text(NodeKind::Hint, "h").shared());
        node.set_link_target(7);
        assert!(node.is_link());
        assert_eq!(node.child_count(), 0);
    }

    #[test]
    fn revealed_count_stays_in_range() {
        let mut node = Node::text(NodeKind::Hint, "q");
        for i in 0..3 {
            node.add_child(Node::text(NodeKind::Hint, format!("h{}", i)).shared());
        }
        assert_eq!(node.revealed_count(), 1);
        node.set_revealed_count(3);
        assert_eq!(node.revealed_count(), 3);
        node.set_revealed_count(0);
        assert_eq!(node.revealed_count(), 3);
        node.set_revealed_count(4);
        assert_eq!(node.revealed_count(), 3);
    }

    #[test]
    fn empty_group_reverts_to_leaf() {
        let mut node = Node::text(NodeKind::Subject, "s");
        node.add_child(Node::text(NodeKind::Hint, "h").shared());
        node.remove_child(0);
        assert!(!node.is_group());
        assert_eq!(node.revealed_count(), 0);
    }

    #[test]
    fn tree_dump_marks_ids_and_links() {
        let mut root = Node::text(NodeKind::Subject, "Puzzles");
        root.set_id(3);
        let mut link = Node::text(NodeKind::Link, "see also");
        link.set_link_target(9);
        root.add_child(link.shared());

        let mut buf = Vec::new();
        root.write_tree(&mut buf, "", "  ").unwrap();
        let dump = String::from_utf8(buf).unwrap();
        assert_eq!(dump, "^3^: Puzzles\n  see also (^Link to 9^)\n");
    }
}
