//! Flat node record and the predicate table consumed by partitioning.

use std::ops::{Index, IndexMut, Range};

use crate::util::BBox;

/// BVH node addressing the reference range `[start, start + size)`.
///
/// `left == right == 0` marks a leaf. Node 0 is always the root, so it can
/// never be anyone's child and 0 is free to act as the sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub bbox: BBox,
    pub start: usize,
    pub size: usize,
    pub left: usize,
    pub right: usize,
}

impl Node {
    pub fn new(bbox: BBox, start: usize, size: usize, left: usize, right: usize) -> Self {
        Self { bbox, start, size, left, right }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.left == 0 && self.right == 0
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.size
    }
}

/// Per-position flags for [`super::Bvh::partition`]. `true` keeps the
/// triangle at that position on the left side.
///
/// Sized to the BVH's triangle count and indexed by position in the
/// reference array, not by model triangle index. Partitioning takes the
/// table by value; it is dropped once the split is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    flags: Vec<bool>,
}

impl PartitionTable {
    /// All-false table of `len` entries.
    pub fn new(len: usize) -> Self {
        Self { flags: vec![false; len] }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    #[inline]
    pub fn set(&mut self, position: usize, left: bool) {
        self.flags[position] = left;
    }

    #[inline]
    pub fn as_slice(&self) -> &[bool] {
        &self.flags
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [bool] {
        &mut self.flags
    }

    #[inline]
    pub(crate) fn swap(&mut self, a: usize, b: usize) {
        self.flags.swap(a, b);
    }
}

impl From<Vec<bool>> for PartitionTable {
    fn from(flags: Vec<bool>) -> Self {
        Self { flags }
    }
}

impl Index<usize> for PartitionTable {
    type Output = bool;

    fn index(&self, position: usize) -> &bool {
        &self.flags[position]
    }
}

impl IndexMut<usize> for PartitionTable {
    fn index_mut(&mut self, position: usize) -> &mut bool {
        &mut self.flags[position]
    }
}
