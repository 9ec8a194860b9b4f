//! # Slot Columns
//!
//! Struct-of-arrays storage: one `Vec` per slot attribute, all indexed by the
//! same slot index and always of identical length.

use bytemuck::Zeroable;
use glam::{Mat4, Quat, Vec3};

use crate::flags::SlotFlags;
use crate::math::derive_world_scale;
use crate::node::NodePose;
use crate::team::{TeamId, NO_TEAM};

/// Every column value of one slot, copied out.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlotRecord {
    /// Flag byte.
    pub flags: SlotFlags,
    /// Local position captured at bind time.
    pub init_local_position: Vec3,
    /// Local rotation captured at bind time.
    pub init_local_rotation: Quat,
    /// Local position of the last capture after a physics step.
    pub base_local_position: Vec3,
    /// Local rotation of the last capture after a physics step.
    pub base_local_rotation: Quat,
    /// Live world position.
    pub world_position: Vec3,
    /// Live world rotation.
    pub world_rotation: Quat,
    /// Live world scale, derived from the matrix.
    pub world_scale: Vec3,
    /// Live local position.
    pub local_position: Vec3,
    /// Live local rotation.
    pub local_rotation: Quat,
    /// Live local scale.
    pub local_scale: Vec3,
    /// Local-to-world matrix of the last capture.
    pub local_to_world: Mat4,
    /// Owning team.
    pub team_id: TeamId,
}

/// Mutable view of one slot's live pose, handed to the simulation step.
#[derive(Debug)]
pub struct LivePoseMut<'a> {
    /// Flag byte (read-only).
    pub flags: SlotFlags,
    /// Owning team (read-only).
    pub team_id: TeamId,
    /// World position.
    pub world_position: &'a mut Vec3,
    /// World rotation.
    pub world_rotation: &'a mut Quat,
    /// Local position.
    pub local_position: &'a mut Vec3,
    /// Local rotation.
    pub local_rotation: &'a mut Quat,
    /// World scale of the last capture (read-only).
    pub world_scale: Vec3,
    /// Local-to-world matrix of the last capture (read-only).
    pub local_to_world: Mat4,
}

/// The slot columns.
#[derive(Clone, Debug, Default)]
pub struct SlotColumns {
    pub(crate) flags: Vec<SlotFlags>,
    pub(crate) init_local_position: Vec<Vec3>,
    pub(crate) init_local_rotation: Vec<Quat>,
    pub(crate) base_local_position: Vec<Vec3>,
    pub(crate) base_local_rotation: Vec<Quat>,
    pub(crate) world_position: Vec<Vec3>,
    pub(crate) world_rotation: Vec<Quat>,
    pub(crate) world_scale: Vec<Vec3>,
    pub(crate) local_position: Vec<Vec3>,
    pub(crate) local_rotation: Vec<Quat>,
    pub(crate) local_scale: Vec<Vec3>,
    pub(crate) local_to_world: Vec<Mat4>,
    pub(crate) team_id: Vec<TeamId>,
}

/// Runs `$body` once per column, binding the column to `$col`.
macro_rules! for_each_column {
    ($self:expr, |$col:ident| $body:expr) => {{
        {
            let $col = &mut $self.flags;
            $body;
        }
        {
            let $col = &mut $self.init_local_position;
            $body;
        }
        {
            let $col = &mut $self.init_local_rotation;
            $body;
        }
        {
            let $col = &mut $self.base_local_position;
            $body;
        }
        {
            let $col = &mut $self.base_local_rotation;
            $body;
        }
        {
            let $col = &mut $self.world_position;
            $body;
        }
        {
            let $col = &mut $self.world_rotation;
            $body;
        }
        {
            let $col = &mut $self.world_scale;
            $body;
        }
        {
            let $col = &mut $self.local_position;
            $body;
        }
        {
            let $col = &mut $self.local_rotation;
            $body;
        }
        {
            let $col = &mut $self.local_scale;
            $body;
        }
        {
            let $col = &mut $self.local_to_world;
            $body;
        }
        {
            let $col = &mut $self.team_id;
            $body;
        }
    }};
}

impl SlotColumns {
    /// Creates empty columns with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut columns = Self::default();
        for_each_column!(columns, |col| col.reserve(capacity));
        columns
    }

    /// Number of slots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Checks whether there are no slots.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Reserved capacity of the flag column.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.flags.capacity()
    }

    /// Lengths of every column, for synchrony checks.
    #[must_use]
    pub fn column_lengths(&self) -> [usize; 13] {
        [
            self.flags.len(),
            self.init_local_position.len(),
            self.init_local_rotation.len(),
            self.base_local_position.len(),
            self.base_local_rotation.len(),
            self.world_position.len(),
            self.world_rotation.len(),
            self.world_scale.len(),
            self.local_position.len(),
            self.local_rotation.len(),
            self.local_scale.len(),
            self.local_to_world.len(),
            self.team_id.len(),
        ]
    }

    /// Column names with length and capacity, in declaration order.
    #[must_use]
    pub fn summary(&self) -> Vec<(&'static str, usize, usize)> {
        vec![
            ("flags", self.flags.len(), self.flags.capacity()),
            ("init_local_position", self.init_local_position.len(), self.init_local_position.capacity()),
            ("init_local_rotation", self.init_local_rotation.len(), self.init_local_rotation.capacity()),
            ("base_local_position", self.base_local_position.len(), self.base_local_position.capacity()),
            ("base_local_rotation", self.base_local_rotation.len(), self.base_local_rotation.capacity()),
            ("world_position", self.world_position.len(), self.world_position.capacity()),
            ("world_rotation", self.world_rotation.len(), self.world_rotation.capacity()),
            ("world_scale", self.world_scale.len(), self.world_scale.capacity()),
            ("local_position", self.local_position.len(), self.local_position.capacity()),
            ("local_rotation", self.local_rotation.len(), self.local_rotation.capacity()),
            ("local_scale", self.local_scale.len(), self.local_scale.capacity()),
            ("local_to_world", self.local_to_world.len(), self.local_to_world.capacity()),
            ("team_id", self.team_id.len(), self.team_id.capacity()),
        ]
    }

    /// Extends every column with zeroed values up to `len`.
    pub fn grow_to(&mut self, len: usize) {
        for_each_column!(self, |col| col.resize(len, Zeroable::zeroed()));
    }

    /// Removes every slot, keeping capacity.
    pub fn clear(&mut self) {
        for_each_column!(self, |col| col.clear());
    }

    /// Copies every column value of one slot.
    #[must_use]
    pub fn record(&self, i: usize) -> SlotRecord {
        SlotRecord {
            flags: self.flags[i],
            init_local_position: self.init_local_position[i],
            init_local_rotation: self.init_local_rotation[i],
            base_local_position: self.base_local_position[i],
            base_local_rotation: self.base_local_rotation[i],
            world_position: self.world_position[i],
            world_rotation: self.world_rotation[i],
            world_scale: self.world_scale[i],
            local_position: self.local_position[i],
            local_rotation: self.local_rotation[i],
            local_scale: self.local_scale[i],
            local_to_world: self.local_to_world[i],
            team_id: self.team_id[i],
        }
    }

    /// Copies every column value from slot `from` to slot `to`.
    pub fn copy_slot(&mut self, from: usize, to: usize) {
        for_each_column!(self, |col| col[to] = col[from]);
    }

    /// Zeroes every column value of slot `i`.
    pub fn zero_slot(&mut self, i: usize) {
        for_each_column!(self, |col| col[i] = Zeroable::zeroed());
    }

    /// Marks slot `i` removed. Pose values are left as they were.
    pub fn tombstone(&mut self, i: usize) {
        self.flags[i] = SlotFlags::NONE;
        self.team_id[i] = NO_TEAM;
    }

    /// Binds slot `i` to a freshly read node pose.
    ///
    /// The pose becomes the initial, base and live pose at once. The matrix
    /// column is left alone; it is only meaningful after a capture.
    pub fn bind_pose(&mut self, i: usize, flags: SlotFlags, team: TeamId, pose: &NodePose) {
        self.flags[i] = flags;
        self.init_local_position[i] = pose.local_position;
        self.init_local_rotation[i] = pose.local_rotation;
        self.base_local_position[i] = pose.local_position;
        self.base_local_rotation[i] = pose.local_rotation;
        self.world_position[i] = pose.world_position;
        self.world_rotation[i] = pose.world_rotation;
        self.world_scale[i] = derive_world_scale(pose.world_rotation, pose.local_to_world);
        self.local_position[i] = pose.local_position;
        self.local_rotation[i] = pose.local_rotation;
        self.local_scale[i] = pose.local_scale;
        self.team_id[i] = team;
    }

    /// Mutable live pose of slot `i`.
    pub fn live_pose_mut(&mut self, i: usize) -> LivePoseMut<'_> {
        LivePoseMut {
            flags: self.flags[i],
            team_id: self.team_id[i],
            world_position: &mut self.world_position[i],
            world_rotation: &mut self.world_rotation[i],
            local_position: &mut self.local_position[i],
            local_rotation: &mut self.local_rotation[i],
            world_scale: self.world_scale[i],
            local_to_world: self.local_to_world[i],
        }
    }

    /// Splits the columns into the parts capture writes and the parts it reads.
    pub(crate) fn capture_lanes(&mut self) -> (CaptureLanes<'_>, &[SlotFlags], &[TeamId]) {
        (
            CaptureLanes {
                start: 0,
                world_position: &mut self.world_position,
                world_rotation: &mut self.world_rotation,
                world_scale: &mut self.world_scale,
                local_position: &mut self.local_position,
                local_rotation: &mut self.local_rotation,
                local_scale: &mut self.local_scale,
                local_to_world: &mut self.local_to_world,
                base_local_position: &mut self.base_local_position,
                base_local_rotation: &mut self.base_local_rotation,
            },
            &self.flags,
            &self.team_id,
        )
    }
}

/// Disjoint mutable sub-slices of the columns written by capture.
///
/// `start` is the slot index of element 0 of every slice.
#[derive(Debug)]
pub(crate) struct CaptureLanes<'a> {
    pub(crate) start: usize,
    pub(crate) world_position: &'a mut [Vec3],
    pub(crate) world_rotation: &'a mut [Quat],
    pub(crate) world_scale: &'a mut [Vec3],
    pub(crate) local_position: &'a mut [Vec3],
    pub(crate) local_rotation: &'a mut [Quat],
    pub(crate) local_scale: &'a mut [Vec3],
    pub(crate) local_to_world: &'a mut [Mat4],
    pub(crate) base_local_position: &'a mut [Vec3],
    pub(crate) base_local_rotation: &'a mut [Quat],
}

impl crate::jobs::Lanes for CaptureLanes<'_> {
    fn len(&self) -> usize {
        self.world_position.len()
    }

    fn split_at(self, mid: usize) -> (Self, Self) {
        let (wp0, wp1) = self.world_position.split_at_mut(mid);
        let (wr0, wr1) = self.world_rotation.split_at_mut(mid);
        let (ws0, ws1) = self.world_scale.split_at_mut(mid);
        let (lp0, lp1) = self.local_position.split_at_mut(mid);
        let (lr0, lr1) = self.local_rotation.split_at_mut(mid);
        let (ls0, ls1) = self.local_scale.split_at_mut(mid);
        let (m0, m1) = self.local_to_world.split_at_mut(mid);
        let (bp0, bp1) = self.base_local_position.split_at_mut(mid);
        let (br0, br1) = self.base_local_rotation.split_at_mut(mid);
        (
            Self {
                start: self.start,
                world_position: wp0,
                world_rotation: wr0,
                world_scale: ws0,
                local_position: lp0,
                local_rotation: lr0,
                local_scale: ls0,
                local_to_world: m0,
                base_local_position: bp0,
                base_local_rotation: br0,
            },
            Self {
                start: self.start + mid,
                world_position: wp1,
                world_rotation: wr1,
                world_scale: ws1,
                local_position: lp1,
                local_rotation: lr1,
                local_scale: ls1,
                local_to_world: m1,
                base_local_position: bp1,
                base_local_rotation: br1,
            },
        )
    }
}
