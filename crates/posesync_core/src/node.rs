//! # External Scene Nodes
//!
//! The engine never touches a host engine's transform API directly. Every
//! node it reads from or writes to is reached through [`SceneNode`], a small
//! capability trait the host implements for its own node type.
//!
//! Nodes are shared with worker threads, so implementations must be
//! `Send + Sync` and take `&self` for writes (interior mutability).

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use parking_lot::Mutex;

/// Full pose snapshot read from a node in one call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodePose {
    /// World-space position.
    pub world_position: Vec3,
    /// World-space rotation.
    pub world_rotation: Quat,
    /// Position relative to the parent.
    pub local_position: Vec3,
    /// Rotation relative to the parent.
    pub local_rotation: Quat,
    /// Scale relative to the parent.
    pub local_scale: Vec3,
    /// Local-to-world matrix.
    pub local_to_world: Mat4,
}

impl Default for NodePose {
    fn default() -> Self {
        Self {
            world_position: Vec3::ZERO,
            world_rotation: Quat::IDENTITY,
            local_position: Vec3::ZERO,
            local_rotation: Quat::IDENTITY,
            local_scale: Vec3::ONE,
            local_to_world: Mat4::IDENTITY,
        }
    }
}

/// Capability interface over one external scene-graph node.
pub trait SceneNode: Send + Sync {
    /// Human-readable name, used by the diagnostic dump.
    fn name(&self) -> &str;

    /// Returns false once the node has been destroyed on the host side.
    ///
    /// Workers skip invalid nodes silently.
    fn is_valid(&self) -> bool;

    /// Reads the node's current pose.
    fn read_pose(&self) -> NodePose;

    /// Sets the world-space position.
    fn set_world_position(&self, position: Vec3);

    /// Sets the world-space rotation.
    fn set_world_rotation(&self, rotation: Quat);

    /// Sets the parent-relative position.
    fn set_local_position(&self, position: Vec3);

    /// Sets the parent-relative rotation.
    fn set_local_rotation(&self, rotation: Quat);
}

/// Shared handle to an external node.
pub type NodeHandle = Arc<dyn SceneNode>;

// ============================================================================
// IN-MEMORY NODE
// ============================================================================

/// Which setter was called last on a [`MemoryNode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeWrite {
    /// `set_world_position`
    WorldPosition,
    /// `set_world_rotation`
    WorldRotation,
    /// `set_local_position`
    LocalPosition,
    /// `set_local_rotation`
    LocalRotation,
}

#[derive(Debug)]
struct MemoryNodeState {
    parent_to_world: Mat4,
    parent_rotation: Quat,
    local_position: Vec3,
    local_rotation: Quat,
    local_scale: Vec3,
    valid: bool,
    writes: Vec<NodeWrite>,
}

/// Standalone node living in memory, with a fixed parent frame.
///
/// Serves as the scene node for tooling, benchmarks and tests. The parent
/// frame is a plain matrix plus the rotation the host would report for it,
/// so sheared parents (non-uniform scale above a rotated child) can be
/// expressed. Every setter call is recorded.
#[derive(Debug)]
pub struct MemoryNode {
    name: String,
    state: Mutex<MemoryNodeState>,
}

impl MemoryNode {
    /// Creates a root node with the given local pose.
    #[must_use]
    pub fn new(name: impl Into<String>, position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self::with_parent(name, Mat4::IDENTITY, Quat::IDENTITY, position, rotation, scale)
    }

    /// Creates a node under a parent frame.
    ///
    /// # Arguments
    ///
    /// * `parent_to_world` - The parent's local-to-world matrix
    /// * `parent_rotation` - The parent's world rotation
    #[must_use]
    pub fn with_parent(
        name: impl Into<String>,
        parent_to_world: Mat4,
        parent_rotation: Quat,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryNodeState {
                parent_to_world,
                parent_rotation,
                local_position: position,
                local_rotation: rotation,
                local_scale: scale,
                valid: true,
                writes: Vec::new(),
            }),
        }
    }

    /// Creates a root node at `position` and wraps it in a handle.
    #[must_use]
    pub fn shared(name: impl Into<String>, position: Vec3) -> Arc<Self> {
        Arc::new(Self::new(name, position, Quat::IDENTITY, Vec3::ONE))
    }

    /// Marks the node destroyed (or alive again).
    pub fn set_valid(&self, valid: bool) {
        self.state.lock().valid = valid;
    }

    /// Overwrites the local pose without recording a write.
    pub fn place(&self, position: Vec3, rotation: Quat) {
        let mut state = self.state.lock();
        state.local_position = position;
        state.local_rotation = rotation;
    }

    /// All setter calls since creation (or the last [`MemoryNode::clear_writes`]).
    #[must_use]
    pub fn writes(&self) -> Vec<NodeWrite> {
        self.state.lock().writes.clone()
    }

    /// Number of setter calls recorded.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.lock().writes.len()
    }

    /// Forgets recorded writes.
    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }
}

impl SceneNode for MemoryNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_valid(&self) -> bool {
        self.state.lock().valid
    }

    fn read_pose(&self) -> NodePose {
        let state = self.state.lock();
        let local = Mat4::from_scale_rotation_translation(
            state.local_scale,
            state.local_rotation,
            state.local_position,
        );
        let local_to_world = state.parent_to_world * local;
        NodePose {
            world_position: local_to_world.w_axis.truncate(),
            world_rotation: state.parent_rotation * state.local_rotation,
            local_position: state.local_position,
            local_rotation: state.local_rotation,
            local_scale: state.local_scale,
            local_to_world,
        }
    }

    fn set_world_position(&self, position: Vec3) {
        let mut state = self.state.lock();
        state.local_position = state.parent_to_world.inverse().transform_point3(position);
        state.writes.push(NodeWrite::WorldPosition);
    }

    fn set_world_rotation(&self, rotation: Quat) {
        let mut state = self.state.lock();
        state.local_rotation = (state.parent_rotation.inverse() * rotation).normalize();
        state.writes.push(NodeWrite::WorldRotation);
    }

    fn set_local_position(&self, position: Vec3) {
        let mut state = self.state.lock();
        state.local_position = position;
        state.writes.push(NodeWrite::LocalPosition);
    }

    fn set_local_rotation(&self, rotation: Quat) {
        let mut state = self.state.lock();
        state.local_rotation = rotation;
        state.writes.push(NodeWrite::LocalRotation);
    }
}
