//! # Component Nodes
//!
//! A small store of auxiliary nodes, independent of the slot store, used to
//! watch the world position and scale of the nodes that own simulation
//! groups. A near-zero `min_scale` tells the owner to suspend the group.

use glam::Vec3;

use crate::config::ParConfig;
use crate::jobs::{par_for_each_lanes, Lanes};
use crate::math::{derive_world_scale, min_abs_axis};
use crate::node::NodeHandle;
use crate::store::{Chunk, ChunkAllocator, NodeBindingTable};

/// Last captured state of one component node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComponentPose {
    /// World position.
    pub position: Vec3,
    /// Smallest absolute world-scale axis.
    pub min_scale: f32,
}

impl Default for ComponentPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            min_scale: 1.0,
        }
    }
}

/// Index-stable store of component nodes.
#[derive(Debug, Default)]
pub struct ComponentNodeStore {
    allocator: ChunkAllocator,
    positions: Vec<Vec3>,
    min_scales: Vec<f32>,
    nodes: NodeBindingTable,
}

struct ComponentLanes<'a> {
    start: usize,
    positions: &'a mut [Vec3],
    min_scales: &'a mut [f32],
}

impl Lanes for ComponentLanes<'_> {
    fn len(&self) -> usize {
        self.positions.len()
    }

    fn split_at(self, mid: usize) -> (Self, Self) {
        let (p0, p1) = self.positions.split_at_mut(mid);
        let (s0, s1) = self.min_scales.split_at_mut(mid);
        (
            Self {
                start: self.start,
                positions: p0,
                min_scales: s0,
            },
            Self {
                start: self.start + mid,
                positions: p1,
                min_scales: s1,
            },
        )
    }
}

impl ComponentNodeStore {
    /// Creates an empty store with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            allocator: ChunkAllocator::new(),
            positions: Vec::with_capacity(capacity),
            min_scales: Vec::with_capacity(capacity),
            nodes: NodeBindingTable::with_capacity(capacity),
        }
    }

    /// Number of entries, removed ones included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Checks whether the store has no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Column names with length and capacity.
    #[must_use]
    pub fn summary(&self) -> [(&'static str, usize, usize); 2] {
        [
            ("position", self.positions.len(), self.positions.capacity()),
            ("min_scale", self.min_scales.len(), self.min_scales.capacity()),
        ]
    }

    /// Number of entries currently bound to a node.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.nodes.bound_count()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.allocator.clear();
        self.positions.clear();
        self.min_scales.clear();
        self.nodes.clear();
    }

    /// Registers `node` and returns its index.
    ///
    /// The entry starts at the origin with a min-scale of 1 until the next
    /// capture.
    pub fn add(&mut self, node: NodeHandle) -> usize {
        let index = self.allocator.allocate(1).start as usize;
        let len = self.allocator.len() as usize;
        let defaults = ComponentPose::default();
        self.positions.resize(len, defaults.position);
        self.min_scales.resize(len, defaults.min_scale);
        self.nodes.grow_to(len);

        self.positions[index] = defaults.position;
        self.min_scales[index] = defaults.min_scale;
        self.nodes.bind(index, Some(node));
        index
    }

    /// Releases the entry at `index`. Unknown or already released indices
    /// are ignored.
    pub fn remove(&mut self, index: usize) {
        if self.nodes.get(index).is_none() {
            return;
        }
        self.nodes.unbind(index);
        if let Ok(start) = u32::try_from(index) {
            self.allocator.free(Chunk::new(start, 1));
        }
    }

    /// Node registered at `index`.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<&NodeHandle> {
        self.nodes.get(index)
    }

    /// Last captured state of the entry at `index`.
    #[must_use]
    pub fn pose(&self, index: usize) -> Option<ComponentPose> {
        self.nodes.get(index)?;
        Some(ComponentPose {
            position: self.positions[index],
            min_scale: self.min_scales[index],
        })
    }

    /// Reads position and min-scale of every live node. Returns the number
    /// of nodes read.
    pub fn capture(&mut self, par: &ParConfig) -> usize {
        let nodes = &self.nodes;
        let lanes = ComponentLanes {
            start: 0,
            positions: &mut self.positions,
            min_scales: &mut self.min_scales,
        };
        let read = std::sync::atomic::AtomicUsize::new(0);

        par_for_each_lanes(lanes, par, &|lane: ComponentLanes<'_>| {
            let mut count = 0;
            for k in 0..lane.len() {
                let Some(node) = nodes.get(lane.start + k).filter(|n| n.is_valid()) else {
                    continue;
                };
                let pose = node.read_pose();
                lane.positions[k] = pose.world_position;
                lane.min_scales[k] =
                    min_abs_axis(derive_world_scale(pose.world_rotation, pose.local_to_world));
                count += 1;
            }
            read.fetch_add(count, std::sync::atomic::Ordering::Relaxed);
        });

        read.into_inner()
    }
}
