//! # Slot Flags
//!
//! One byte per slot. Each bit gates an independent behavior of the
//! synchronization passes; a slot whose byte is zero is a tombstone.

use bytemuck::{Pod, Zeroable};

/// Per-slot flag byte.
///
/// `WORLD_ROTATION_WRITE` and `LOCAL_POSE_WRITE` are exclusive by convention
/// only: the owning feature sets exactly one of them at slot creation. Both
/// may coexist in the byte, in which case write-back takes the world-rotation
/// path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct SlotFlags(u8);

impl SlotFlags {
    /// Read the node's pose into the store during capture.
    pub const CAPTURE: u8 = 0x01;
    /// Write only the world rotation back to the node.
    pub const WORLD_ROTATION_WRITE: u8 = 0x02;
    /// Write the local position and rotation back to the node.
    pub const LOCAL_POSE_WRITE: u8 = 0x04;
    /// Restore the node to its initial pose when disabled.
    pub const RESTORE_ON_DISABLE: u8 = 0x08;
    /// Slot is currently eligible for capture and write-back.
    pub const ENABLE: u8 = 0x10;

    /// The tombstone value.
    pub const NONE: Self = Self(0);

    /// Creates flags from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Checks whether every bit of `mask` is set.
    #[inline]
    #[must_use]
    pub const fn is_set(self, mask: u8) -> bool {
        self.0 & mask == mask
    }

    /// Sets or clears the bits of `mask`.
    #[inline]
    pub fn set(&mut self, mask: u8, on: bool) {
        if on {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// Returns a copy with the bits of `mask` set.
    #[inline]
    #[must_use]
    pub const fn with(self, mask: u8) -> Self {
        Self(self.0 | mask)
    }

    /// A zero byte marks a removed slot.
    #[inline]
    #[must_use]
    pub const fn is_tombstone(self) -> bool {
        self.0 == 0
    }

    /// Capture bit.
    #[inline]
    #[must_use]
    pub const fn captures(self) -> bool {
        self.is_set(Self::CAPTURE)
    }

    /// World-rotation write-back bit.
    #[inline]
    #[must_use]
    pub const fn writes_world_rotation(self) -> bool {
        self.is_set(Self::WORLD_ROTATION_WRITE)
    }

    /// Local-pose write-back bit.
    #[inline]
    #[must_use]
    pub const fn writes_local_pose(self) -> bool {
        self.is_set(Self::LOCAL_POSE_WRITE)
    }

    /// Restore-on-disable bit.
    #[inline]
    #[must_use]
    pub const fn restores_on_disable(self) -> bool {
        self.is_set(Self::RESTORE_ON_DISABLE)
    }

    /// Enable bit.
    #[inline]
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        self.is_set(Self::ENABLE)
    }

    /// Compact form used by the diagnostic dump, e.g. `ERrW`.
    #[must_use]
    pub fn summary(self) -> String {
        let mut s = String::with_capacity(5);
        for (mask, c) in [
            (Self::ENABLE, 'E'),
            (Self::RESTORE_ON_DISABLE, 'R'),
            (Self::CAPTURE, 'r'),
            (Self::WORLD_ROTATION_WRITE, 'W'),
            (Self::LOCAL_POSE_WRITE, 'w'),
        ] {
            if self.is_set(mask) {
                s.push(c);
            }
        }
        s
    }
}
