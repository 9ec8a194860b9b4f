//! # Chunk Allocator
//!
//! Hands out contiguous index ranges over a set of parallel columns.
//!
//! Indices never move once handed out. Freed ranges go on a free list
//! (sorted, adjacent ranges merged) and are reused first-fit by later
//! allocations, so long-running stores do not leak tombstoned capacity.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

/// A contiguous half-open range `[start, start + length)` of slot indices.
///
/// A zero-length chunk is invalid; it is what every allocation returns when
/// the engine is not initialized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct Chunk {
    /// First index of the range.
    pub start: u32,
    /// Number of indices in the range.
    pub length: u32,
}

impl Chunk {
    /// The invalid chunk.
    pub const INVALID: Self = Self { start: 0, length: 0 };

    /// Creates a chunk.
    #[inline]
    #[must_use]
    pub const fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    /// Checks whether this chunk covers at least one index.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.length > 0
    }

    /// One past the last index.
    #[inline]
    #[must_use]
    pub const fn end(self) -> u32 {
        self.start + self.length
    }

    /// Checks whether `index` lies inside the chunk.
    #[inline]
    #[must_use]
    pub const fn contains(self, index: u32) -> bool {
        index >= self.start && index < self.end()
    }

    /// The chunk as a `usize` range, for slicing columns.
    #[inline]
    #[must_use]
    pub fn range(self) -> Range<usize> {
        self.start as usize..self.end() as usize
    }
}

/// Outcome of [`ChunkAllocator::grow`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Growth {
    /// The chunk kept its start; only its length changed.
    InPlace(Chunk),
    /// The chunk moved. The old range is already back on the free list.
    Relocated {
        /// Range before the move.
        old: Chunk,
        /// Range after the move.
        new: Chunk,
    },
}

impl Growth {
    /// The chunk after growth.
    #[inline]
    #[must_use]
    pub const fn chunk(self) -> Chunk {
        match self {
            Self::InPlace(chunk) | Self::Relocated { new: chunk, .. } => chunk,
        }
    }
}

/// Free-list range allocator.
///
/// `len` is the high-water mark: the length every column must have.
#[derive(Clone, Debug, Default)]
pub struct ChunkAllocator {
    /// Free ranges, sorted by start, never adjacent to each other.
    free: Vec<Chunk>,
    /// One past the highest index ever handed out.
    len: u32,
}

impl ChunkAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            free: Vec::new(),
            len: 0,
        }
    }

    /// Required column length.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// Checks whether nothing was ever allocated.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free ranges, sorted by start.
    #[inline]
    #[must_use]
    pub fn free_ranges(&self) -> &[Chunk] {
        &self.free
    }

    /// Checks whether `index` lies in a free range.
    #[must_use]
    pub fn is_free(&self, index: u32) -> bool {
        let pos = self.free.partition_point(|c| c.end() <= index);
        self.free.get(pos).is_some_and(|c| c.contains(index))
    }

    /// Forgets every allocation.
    pub fn clear(&mut self) {
        self.free.clear();
        self.len = 0;
    }

    /// Allocates `count` contiguous indices.
    ///
    /// Reuses the first free range large enough; otherwise extends a free
    /// range touching the tail, or appends at the tail.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero.
    pub fn allocate(&mut self, count: u32) -> Chunk {
        assert!(count > 0, "Chunk length must be greater than zero");

        if let Some(pos) = self.free.iter().position(|c| c.length >= count) {
            let range = &mut self.free[pos];
            let chunk = Chunk::new(range.start, count);
            range.start += count;
            range.length -= count;
            if range.length == 0 {
                self.free.remove(pos);
            }
            return chunk;
        }

        // A free range ending at the tail can be extended instead of wasted.
        if let Some(last) = self.free.last().copied() {
            if last.end() == self.len {
                self.free.pop();
                self.len = last.start + count;
                return Chunk::new(last.start, count);
            }
        }

        let chunk = Chunk::new(self.len, count);
        self.len += count;
        chunk
    }

    /// Returns a range to the free list.
    ///
    /// # Panics
    ///
    /// Panics if the chunk reaches past the high-water mark.
    pub fn free(&mut self, chunk: Chunk) {
        if !chunk.is_valid() {
            return;
        }
        assert!(
            chunk.end() <= self.len,
            "chunk {chunk:?} out of range (len {})",
            self.len
        );

        let pos = self.free.partition_point(|c| c.start < chunk.start);
        debug_assert!(
            pos == 0 || self.free[pos - 1].end() <= chunk.start,
            "double free of {chunk:?}"
        );
        debug_assert!(
            pos == self.free.len() || chunk.end() <= self.free[pos].start,
            "double free of {chunk:?}"
        );
        self.free.insert(pos, chunk);

        // Merge with the right neighbour, then the left one.
        if pos + 1 < self.free.len() && self.free[pos].end() == self.free[pos + 1].start {
            self.free[pos].length += self.free[pos + 1].length;
            self.free.remove(pos + 1);
        }
        if pos > 0 && self.free[pos - 1].end() == self.free[pos].start {
            self.free[pos - 1].length += self.free[pos].length;
            self.free.remove(pos);
        }
    }

    /// Grows `chunk` to `new_length` indices.
    ///
    /// Stays in place when the chunk ends at the tail or is followed by a
    /// free range with enough room. Otherwise a new range is allocated and
    /// the old one freed; the caller moves the contents.
    ///
    /// A `new_length` not larger than the current length is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if the chunk is invalid or reaches past the high-water mark.
    pub fn grow(&mut self, chunk: Chunk, new_length: u32) -> Growth {
        assert!(chunk.is_valid(), "cannot grow an invalid chunk");
        assert!(
            chunk.end() <= self.len,
            "chunk {chunk:?} out of range (len {})",
            self.len
        );

        if new_length <= chunk.length {
            return Growth::InPlace(chunk);
        }
        let extra = new_length - chunk.length;
        let grown = Chunk::new(chunk.start, new_length);

        if chunk.end() == self.len {
            self.len += extra;
            return Growth::InPlace(grown);
        }

        let pos = self.free.partition_point(|c| c.start < chunk.end());
        if let Some(next) = self.free.get(pos).copied() {
            if next.start == chunk.end() {
                if next.length >= extra {
                    let range = &mut self.free[pos];
                    range.start += extra;
                    range.length -= extra;
                    if range.length == 0 {
                        self.free.remove(pos);
                    }
                    return Growth::InPlace(grown);
                }
                if next.end() == self.len {
                    self.free.remove(pos);
                    self.len = grown.end();
                    return Growth::InPlace(grown);
                }
            }
        }

        // Allocate before freeing so the new range never overlaps the old one.
        let new = self.allocate(new_length);
        self.free(chunk);
        Growth::Relocated { old: chunk, new }
    }
}
