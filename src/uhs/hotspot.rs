//! Clickable-region support for image hunks.
//!
//! A hotspot node is a group whose children each own a [`HotSpotZone`]: a
//! clickable rectangle over the base image, plus the point at which the
//! child should be painted when the zone is clicked. The zone list stays
//! in lockstep with the child list under every mutation, and link targets
//! cannot be set on a hotspot node.

use crate::uhs::node::{Node, NodeKind, NodeShape, SharedNode};

/// Clickable rectangle and paint position for one hotspot child.
/// Position coordinates are -1 when the child has no paint position
/// (link regions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotSpotZone {
    pub zone_x: i32,
    pub zone_y: i32,
    pub zone_w: i32,
    pub zone_h: i32,
    pub pos_x: i32,
    pub pos_y: i32,
}

impl Default for HotSpotZone {
    fn default() -> Self {
        HotSpotZone {
            zone_x: 0,
            zone_y: 0,
            zone_w: 10,
            zone_h: 10,
            pos_x: -1,
            pos_y: -1,
        }
    }
}

impl Node {
    /// Creates an empty hotspot group with a text title.
    pub fn hotspot(kind: NodeKind, title: impl Into<String>) -> Self {
        let mut node = Node::text(kind, title);
        node.shape = NodeShape::HotSpot {
            children: Vec::new(),
            zones: Vec::new(),
            revealed: 0,
        };
        node
    }

    pub fn is_hotspot(&self) -> bool {
        matches!(self.shape, NodeShape::HotSpot { .. })
    }

    /// The zone of the nth child, or `None` off the end or on a
    /// non-hotspot node.
    pub fn zone(&self, n: usize) -> Option<HotSpotZone> {
        match &self.shape {
            NodeShape::HotSpot { zones, .. } => zones.get(n).copied(),
            _ => None,
        }
    }

    pub fn zone_count(&self) -> usize {
        match &self.shape {
            NodeShape::HotSpot { zones, .. } => zones.len(),
            _ => 0,
        }
    }

    /// Replaces the zone of the nth child; ignored off the end or on a
    /// non-hotspot node.
    pub fn set_zone(&mut self, n: usize, zone: HotSpotZone) {
        if let NodeShape::HotSpot { zones, .. } = &mut self.shape {
            if let Some(slot) = zones.get_mut(n) {
                *slot = zone;
            }
        }
    }

    /// Appends a child with its zone in one step.
    pub fn add_child_with_zone(&mut self, child: SharedNode, zone: HotSpotZone) {
        self.add_child(child);
        let last = self.child_count() - 1;
        self.set_zone(last, zone);
    }
}
