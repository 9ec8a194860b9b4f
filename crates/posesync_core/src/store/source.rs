//! # Bulk Source
//!
//! The columns a simulation group prepares before handing its nodes to the
//! engine in one bulk allocation.

use glam::{Quat, Vec3};

use crate::flags::SlotFlags;
use crate::node::NodeHandle;

/// Source entries for [`SlotStore::allocate_bulk`](super::SlotStore::allocate_bulk).
///
/// Entries without a node are bound to `anchor`.
#[derive(Clone)]
pub struct SlotSource {
    /// Flag byte per entry.
    pub flags: Vec<SlotFlags>,
    /// Initial local position per entry.
    pub init_local_positions: Vec<Vec3>,
    /// Initial local rotation per entry.
    pub init_local_rotations: Vec<Quat>,
    /// Node per entry.
    pub nodes: Vec<Option<NodeHandle>>,
    /// Placeholder node of the group, usually its center.
    pub anchor: NodeHandle,
}

impl std::fmt::Debug for SlotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotSource")
            .field("len", &self.len())
            .field("anchor", &self.anchor.name())
            .finish_non_exhaustive()
    }
}

impl SlotSource {
    /// Creates an empty source around `anchor`.
    #[must_use]
    pub fn new(anchor: NodeHandle) -> Self {
        Self {
            flags: Vec::new(),
            init_local_positions: Vec::new(),
            init_local_rotations: Vec::new(),
            nodes: Vec::new(),
            anchor,
        }
    }

    /// Appends an entry bound to `node`, using the node's current local pose
    /// as its initial pose.
    pub fn push_node(&mut self, node: NodeHandle, flags: SlotFlags) {
        let pose = node.read_pose();
        self.push(Some(node), flags, pose.local_position, pose.local_rotation);
    }

    /// Appends an entry.
    pub fn push(
        &mut self,
        node: Option<NodeHandle>,
        flags: SlotFlags,
        init_local_position: Vec3,
        init_local_rotation: Quat,
    ) {
        self.flags.push(flags);
        self.init_local_positions.push(init_local_position);
        self.init_local_rotations.push(init_local_rotation);
        self.nodes.push(node);
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Checks whether the source has no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Node for entry `i`, falling back to the anchor.
    #[must_use]
    pub fn node_or_anchor(&self, i: usize) -> NodeHandle {
        self.nodes
            .get(i)
            .and_then(Clone::clone)
            .unwrap_or_else(|| self.anchor.clone())
    }

    /// Asserts all source columns have the same length.
    ///
    /// # Panics
    ///
    /// Panics when the columns disagree.
    pub fn assert_consistent(&self) {
        let n = self.flags.len();
        assert!(
            self.init_local_positions.len() == n
                && self.init_local_rotations.len() == n
                && self.nodes.len() == n,
            "slot source columns differ in length"
        );
    }
}
