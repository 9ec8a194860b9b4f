//! # Slot Store
//!
//! Columnar pose storage addressed by stable slot indices.
//!
//! ## Layout
//!
//! ```text
//! index:     0    1    2    3    4    5 ...
//! flags:   [ E  | E  | 0  | 0  | Er | .. ]
//! team:    [ 3  | 3  | 0  | 0  | 1  | .. ]
//! pose...: [    |    |    |    |    | .. ]   one Vec per attribute
//! node:    [ a  | b  | -  | -  | c  | .. ]
//! ```
//!
//! Every column and the node binding table always have the same length, the
//! allocator's high-water mark. Removal tombstones slots in place; indices of
//! other slots never move. Tombstoned ranges go back on the allocator's free
//! list and are handed out again by later allocations.

mod binding;
mod chunk;
mod columns;
mod source;

pub use binding::NodeBindingTable;
pub use chunk::{Chunk, ChunkAllocator, Growth};
pub use columns::{LivePoseMut, SlotColumns, SlotRecord};
pub use source::SlotSource;

pub(crate) use columns::CaptureLanes;

use glam::Mat4;

use crate::flags::SlotFlags;
use crate::node::NodeHandle;
use crate::team::TeamId;

/// Slot columns, node bindings and the allocator that hands out their indices.
#[derive(Debug, Default)]
pub struct SlotStore {
    allocator: ChunkAllocator,
    columns: SlotColumns,
    bindings: NodeBindingTable,
}

impl SlotStore {
    /// Creates an empty store with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            allocator: ChunkAllocator::new(),
            columns: SlotColumns::with_capacity(capacity),
            bindings: NodeBindingTable::with_capacity(capacity),
        }
    }

    /// Number of slots, tombstones included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Checks whether the store has no slots.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The columns.
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &SlotColumns {
        &self.columns
    }

    /// The node bindings.
    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &NodeBindingTable {
        &self.bindings
    }

    /// The index allocator.
    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &ChunkAllocator {
        &self.allocator
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut SlotColumns, &NodeBindingTable) {
        (&mut self.columns, &self.bindings)
    }

    /// Drops every slot.
    pub fn clear(&mut self) {
        self.allocator.clear();
        self.columns.clear();
        self.bindings.clear();
    }

    /// Allocates and syncs every column to the new high-water mark.
    fn reserve_chunk(&mut self, count: u32) -> Chunk {
        let chunk = self.allocator.allocate(count);
        self.sync_lengths();
        chunk
    }

    fn sync_lengths(&mut self) {
        let len = self.allocator.len() as usize;
        self.columns.grow_to(len);
        self.bindings.grow_to(len);
    }

    // ========================================================================
    // ALLOCATION
    // ========================================================================

    /// Copies a prepared group into a new chunk.
    ///
    /// Flags and the initial pose come from `source`; the base pose is seeded
    /// from the initial pose; live pose and matrix start zeroed. Entries
    /// without a node are bound to the source's anchor.
    ///
    /// An empty source yields [`Chunk::INVALID`].
    ///
    /// # Panics
    ///
    /// Panics if the source columns differ in length.
    pub fn allocate_bulk(&mut self, source: &SlotSource, team: TeamId) -> Chunk {
        source.assert_consistent();
        let Ok(count) = u32::try_from(source.len()) else {
            panic!("slot source too large ({} entries)", source.len());
        };
        if count == 0 {
            return Chunk::INVALID;
        }

        let chunk = self.reserve_chunk(count);
        for (i, index) in chunk.range().enumerate() {
            let c = &mut self.columns;
            c.zero_slot(index);
            c.flags[index] = source.flags[i];
            c.init_local_position[index] = source.init_local_positions[i];
            c.init_local_rotation[index] = source.init_local_rotations[i];
            c.base_local_position[index] = source.init_local_positions[i];
            c.base_local_rotation[index] = source.init_local_rotations[i];
            c.team_id[index] = team;
            self.bindings.bind(index, Some(source.node_or_anchor(i)));
        }
        chunk
    }

    /// Reserves `count` zeroed slots of `team`, all bound to `placeholder`.
    ///
    /// The owner fills them later with [`SlotStore::set_one`]. A zero count
    /// yields [`Chunk::INVALID`].
    pub fn allocate_range(&mut self, count: u32, team: TeamId, placeholder: &NodeHandle) -> Chunk {
        if count == 0 {
            return Chunk::INVALID;
        }
        let chunk = self.reserve_chunk(count);
        for index in chunk.range() {
            self.columns.zero_slot(index);
            self.columns.team_id[index] = team;
            self.bindings.bind(index, Some(placeholder.clone()));
        }
        chunk
    }

    /// Allocates one slot bound to `node`, capturing its pose right away.
    pub fn allocate_one(&mut self, node: NodeHandle, flags: SlotFlags, team: TeamId) -> Chunk {
        let chunk = self.reserve_chunk(1);
        let index = chunk.start as usize;
        let pose = node.read_pose();
        self.columns.bind_pose(index, flags, team, &pose);
        self.columns.local_to_world[index] = Mat4::IDENTITY;
        self.bindings.bind(index, Some(node));
        chunk
    }

    // ========================================================================
    // SLOT EDITS
    // ========================================================================

    /// Rebinds slot `index` to `node` and recaptures its pose, or tombstones
    /// it when `node` is `None`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range, or if `node` is `Some` and the slot
    /// belongs to a removed range.
    pub fn set_one(&mut self, node: Option<NodeHandle>, flags: SlotFlags, index: usize, team: TeamId) {
        self.assert_index(index);
        match node {
            Some(node) => {
                self.assert_allocated(index);
                let pose = node.read_pose();
                self.columns.bind_pose(index, flags, team, &pose);
                self.bindings.bind(index, Some(node));
            }
            None => {
                self.columns.tombstone(index);
                self.bindings.unbind(index);
            }
        }
    }

    /// Copies every column value and the node binding from `from` to `to`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range or `to` belongs to a removed
    /// range.
    pub fn copy_slot(&mut self, from: usize, to: usize) {
        self.assert_index(from);
        self.assert_index(to);
        self.assert_allocated(to);
        self.columns.copy_slot(from, to);
        self.bindings.copy(from, to);
    }

    /// Tombstones every slot of `chunk` and returns the range to the free list.
    ///
    /// An invalid chunk is ignored.
    ///
    /// # Panics
    ///
    /// Panics if the chunk reaches past the end of the store.
    pub fn remove(&mut self, chunk: Chunk) {
        if !chunk.is_valid() {
            return;
        }
        self.assert_chunk(chunk);
        for index in chunk.range() {
            self.columns.tombstone(index);
            self.bindings.unbind(index);
        }
        self.allocator.free(chunk);
    }

    /// Grows `chunk` to `new_length` slots.
    ///
    /// Grown slots start zeroed with no team and are bound to the node of the
    /// chunk's first slot. When the chunk cannot grow in place its slots are
    /// moved to a new range and the old range is tombstoned.
    ///
    /// # Panics
    ///
    /// Panics if the chunk is invalid or out of range.
    pub fn expand(&mut self, chunk: Chunk, new_length: u32) -> Growth {
        assert!(chunk.is_valid(), "cannot expand an invalid chunk");
        self.assert_chunk(chunk);

        let front = self.bindings.get(chunk.start as usize).cloned();
        let growth = self.allocator.grow(chunk, new_length);
        self.sync_lengths();

        let grown = growth.chunk();
        if let Growth::Relocated { old, new } = growth {
            for i in 0..old.length as usize {
                let from = old.start as usize + i;
                let to = new.start as usize + i;
                self.columns.copy_slot(from, to);
                self.bindings.copy(from, to);
            }
            for index in old.range() {
                self.columns.tombstone(index);
                self.bindings.unbind(index);
            }
        }

        for index in (grown.start + chunk.length) as usize..grown.end() as usize {
            self.columns.zero_slot(index);
            self.bindings.bind(index, front.clone());
        }
        growth
    }

    /// Sets or clears the enable bit of every live slot in `chunk`.
    ///
    /// Tombstones and invalid chunks are left alone.
    ///
    /// # Panics
    ///
    /// Panics if the chunk reaches past the end of the store.
    pub fn enable_range(&mut self, chunk: Chunk, on: bool) {
        if !chunk.is_valid() {
            return;
        }
        self.assert_chunk(chunk);
        for flags in &mut self.columns.flags[chunk.range()] {
            if !flags.is_tombstone() {
                flags.set(SlotFlags::ENABLE, on);
            }
        }
    }

    /// Sets or clears the enable bit of one live slot.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn enable_one(&mut self, index: usize, on: bool) {
        self.assert_index(index);
        let flags = &mut self.columns.flags[index];
        if !flags.is_tombstone() {
            flags.set(SlotFlags::ENABLE, on);
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    /// Every column value of slot `index`.
    #[must_use]
    pub fn record(&self, index: usize) -> Option<SlotRecord> {
        (index < self.len()).then(|| self.columns.record(index))
    }

    /// Flags of slot `index`.
    #[must_use]
    pub fn flags(&self, index: usize) -> Option<SlotFlags> {
        self.columns.flags.get(index).copied()
    }

    /// Team of slot `index`.
    #[must_use]
    pub fn team_id(&self, index: usize) -> Option<TeamId> {
        self.columns.team_id.get(index).copied()
    }

    /// Node bound to slot `index`.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<&NodeHandle> {
        self.bindings.get(index)
    }

    /// Mutable live pose of slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn live_pose_mut(&mut self, index: usize) -> LivePoseMut<'_> {
        self.assert_index(index);
        self.columns.live_pose_mut(index)
    }

    /// Checks that every column and the binding table share one length.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        let len = self.allocator.len() as usize;
        self.bindings.len() == len && self.columns.column_lengths().iter().all(|&n| n == len)
    }

    fn assert_index(&self, index: usize) {
        assert!(
            index < self.len(),
            "slot index {index} out of range (len {})",
            self.len()
        );
    }

    fn assert_allocated(&self, index: usize) {
        assert!(
            !self.allocator.is_free(index as u32),
            "slot index {index} is not allocated (in a removed range)"
        );
    }

    fn assert_chunk(&self, chunk: Chunk) {
        assert!(
            chunk.end() as usize <= self.len(),
            "chunk {chunk:?} out of range (len {})",
            self.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{MemoryNode, SceneNode};
    use glam::{Quat, Vec3};
    use std::sync::Arc;

    fn node(name: &str, x: f32) -> NodeHandle {
        MemoryNode::shared(name, Vec3::new(x, 0.0, 0.0))
    }

    fn capture_enabled() -> SlotFlags {
        SlotFlags::from_bits(SlotFlags::CAPTURE | SlotFlags::ENABLE)
    }

    fn source_of(count: usize) -> SlotSource {
        let mut source = SlotSource::new(node("anchor", 0.0));
        for i in 0..count {
            source.push_node(node(&format!("n{i}"), i as f32), capture_enabled());
        }
        source
    }

    #[test]
    fn test_allocate_bulk_copies_source() {
        let mut store = SlotStore::with_capacity(16);
        let mut source = source_of(3);
        source.push(None, capture_enabled(), Vec3::ONE, Quat::IDENTITY);

        let chunk = store.allocate_bulk(&source, 3);
        assert_eq!(chunk, Chunk::new(0, 4));
        assert!(store.is_synchronized());

        let rec = store.record(2).unwrap();
        assert_eq!(rec.init_local_position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(rec.base_local_position, rec.init_local_position);
        assert_eq!(rec.world_position, Vec3::ZERO);
        assert_eq!(rec.team_id, 3);
        assert_eq!(store.node(3).unwrap().name(), "anchor");
    }

    #[test]
    fn test_allocate_range_binds_placeholder() {
        let mut store = SlotStore::default();
        let placeholder = node("center", 0.0);
        let chunk = store.allocate_range(3, 2, &placeholder);
        assert_eq!(chunk, Chunk::new(0, 3));
        for i in chunk.range() {
            assert!(store.flags(i).unwrap().is_tombstone());
            assert_eq!(store.team_id(i), Some(2));
            assert_eq!(store.node(i).unwrap().name(), "center");
        }
        assert_eq!(store.allocate_range(0, 2, &placeholder), Chunk::INVALID);
    }

    #[test]
    fn test_allocate_one_captures_pose() {
        let mut store = SlotStore::default();
        let n = node("single", 5.0);
        let chunk = store.allocate_one(n, capture_enabled(), 1);
        assert_eq!(chunk.length, 1);
        let rec = store.record(0).unwrap();
        assert_eq!(rec.world_position, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(rec.init_local_position, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(rec.local_to_world, Mat4::IDENTITY);
        assert_eq!(rec.local_scale, Vec3::ONE);
    }

    #[test]
    fn test_set_one_none_tombstones() {
        let mut store = SlotStore::default();
        let chunk = store.allocate_bulk(&source_of(2), 4);
        store.set_one(None, capture_enabled(), 1, 4);
        assert_eq!(store.len(), 2);
        assert!(store.flags(1).unwrap().is_tombstone());
        assert_eq!(store.team_id(1), Some(0));
        assert!(store.node(1).is_none());
        assert!(store.node(0).is_some());
        assert!(chunk.contains(1));
    }

    #[test]
    fn test_set_one_keeps_matrix() {
        let mut store = SlotStore::default();
        let _ = store.allocate_one(node("a", 0.0), capture_enabled(), 1);
        store.columns.local_to_world[0] = Mat4::from_scale(Vec3::splat(3.0));
        store.set_one(Some(node("b", 7.0)), capture_enabled(), 0, 2);
        let rec = store.record(0).unwrap();
        assert_eq!(rec.local_to_world, Mat4::from_scale(Vec3::splat(3.0)));
        assert_eq!(rec.local_position, Vec3::new(7.0, 0.0, 0.0));
        assert_eq!(rec.team_id, 2);
    }

    #[test]
    fn test_copy_slot_copies_binding() {
        let mut store = SlotStore::default();
        let _ = store.allocate_bulk(&source_of(3), 1);
        store.copy_slot(0, 2);
        assert_eq!(store.record(0), store.record(2));
        assert_eq!(store.node(2).unwrap().name(), "n0");
    }

    #[test]
    fn test_remove_then_reuse() {
        let mut store = SlotStore::default();
        let a = store.allocate_bulk(&source_of(3), 1);
        let _b = store.allocate_bulk(&source_of(2), 2);
        store.remove(a);
        for i in a.range() {
            assert!(store.flags(i).unwrap().is_tombstone());
            assert!(store.node(i).is_none());
        }

        let c = store.allocate_one(node("reuse", 9.0), capture_enabled(), 5);
        assert_eq!(c, Chunk::new(0, 1));
        assert_eq!(store.len(), 5);
        assert!(store.is_synchronized());
    }

    #[test]
    #[should_panic(expected = "not allocated")]
    fn test_set_one_into_removed_range_panics() {
        let mut store = SlotStore::default();
        let a = store.allocate_bulk(&source_of(3), 1);
        let _b = store.allocate_bulk(&source_of(2), 2);
        store.remove(a);
        store.set_one(Some(node("x", 1.0)), capture_enabled(), 0, 1);
    }

    #[test]
    #[should_panic(expected = "not allocated")]
    fn test_copy_into_removed_range_panics() {
        let mut store = SlotStore::default();
        let a = store.allocate_bulk(&source_of(2), 1);
        let _b = store.allocate_bulk(&source_of(2), 2);
        store.remove(a);
        store.copy_slot(2, 1);
    }

    #[test]
    fn test_set_one_none_on_removed_slot_is_allowed() {
        let mut store = SlotStore::default();
        let a = store.allocate_bulk(&source_of(2), 1);
        store.remove(a);
        store.set_one(None, SlotFlags::NONE, 0, 0);
        assert!(store.allocator().is_free(0));
        assert!(store.node(0).is_none());
    }

    #[test]
    fn test_remove_invalid_chunk_is_noop() {
        let mut store = SlotStore::default();
        let _ = store.allocate_bulk(&source_of(2), 1);
        store.remove(Chunk::INVALID);
        assert!(!store.flags(0).unwrap().is_tombstone());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_remove_out_of_range_panics() {
        let mut store = SlotStore::default();
        let _ = store.allocate_bulk(&source_of(2), 1);
        store.remove(Chunk::new(1, 4));
    }

    #[test]
    fn test_expand_in_place_binds_front_node() {
        let mut store = SlotStore::default();
        let chunk = store.allocate_bulk(&source_of(2), 1);
        let growth = store.expand(chunk, 4);
        assert_eq!(growth, Growth::InPlace(Chunk::new(0, 4)));
        assert_eq!(store.len(), 4);
        assert_eq!(store.node(3).unwrap().name(), "n0");
        assert!(store.flags(3).unwrap().is_tombstone());
        assert!(store.is_synchronized());
    }

    #[test]
    fn test_expand_relocates_content() {
        let mut store = SlotStore::default();
        let _a = store.allocate_bulk(&source_of(2), 1);
        let b = store.allocate_bulk(&source_of(3), 2);
        let _c = store.allocate_bulk(&source_of(1), 3);
        let before: Vec<_> = b.range().map(|i| store.record(i).unwrap()).collect();
        let names: Vec<_> = b.range().map(|i| store.node(i).unwrap().name().to_owned()).collect();

        let growth = store.expand(b, 5);
        let Growth::Relocated { old, new } = growth else {
            panic!("expected relocation, got {growth:?}");
        };
        assert_eq!(old, b);
        assert_eq!(new, Chunk::new(6, 5));
        for (i, (record, name)) in before.iter().zip(&names).enumerate() {
            let to = new.start as usize + i;
            assert_eq!(store.record(to).as_ref(), Some(record));
            assert_eq!(store.node(to).unwrap().name(), name.as_str());
        }
        for i in old.range() {
            assert!(store.flags(i).unwrap().is_tombstone());
            assert_eq!(store.team_id(i), Some(0));
            assert!(store.node(i).is_none());
        }
        assert_eq!(store.node(10).unwrap().name(), "n0");
    }

    #[test]
    fn test_enable_skips_tombstones() {
        let mut store = SlotStore::default();
        let chunk = store.allocate_bulk(&source_of(3), 1);
        store.set_one(None, SlotFlags::NONE, 1, 0);
        store.enable_range(chunk, false);
        assert!(!store.flags(0).unwrap().is_enabled());
        assert!(store.flags(1).unwrap().is_tombstone());

        store.enable_one(1, true);
        assert!(store.flags(1).unwrap().is_tombstone());
        store.enable_one(2, true);
        assert!(store.flags(2).unwrap().is_enabled());
    }

    #[test]
    fn test_live_pose_mut_edits_columns() {
        let mut store = SlotStore::default();
        let n: Arc<MemoryNode> = MemoryNode::shared("m", Vec3::ZERO);
        let _ = store.allocate_one(n.clone(), capture_enabled(), 1);
        *store.live_pose_mut(0).world_position = Vec3::splat(4.0);
        assert_eq!(store.record(0).unwrap().world_position, Vec3::splat(4.0));
        assert!(n.is_valid());
    }
}
