//! # Block Side Module
//!
//! This module defines the six faces of a block and `FaceBits`, the 6-bit set used
//! both for occlusion masks (which neighbors are populated) and for face-visibility
//! masks (which faces are exposed).

use std::fmt;

use cgmath::{InnerSpace, Vector3};
use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::engine_state::voxels::position::BLOCK_SPACING;

/// Represents the six possible faces of a block.
///
/// Each variant's value is its bit index inside a `FaceBits` mask.
///
/// The order is: [LEFT, RIGHT, BOTTOM, TOP, BACK, FRONT]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, FromPrimitive)]
pub enum BlockSide {
    /// The left face (facing negative X)
    LEFT = 0,

    /// The right face (facing positive X)
    RIGHT = 1,

    /// The bottom face (facing negative Y)
    BOTTOM = 2,

    /// The top face (facing positive Y)
    TOP = 3,

    /// The back face (facing negative Z)
    BACK = 4,

    /// The front face (facing positive Z)
    FRONT = 5,
}

impl BlockSide {
    /// Returns all six block faces in bit order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::LEFT,
            BlockSide::RIGHT,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::BACK,
            BlockSide::FRONT,
        ]
    }

    /// Converts a bit index (0..6) back into a side.
    pub fn from_index(index: u8) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(index)
    }

    /// The face on the other side of the shared boundary.
    pub fn opposite(self) -> Self {
        match self {
            BlockSide::LEFT => BlockSide::RIGHT,
            BlockSide::RIGHT => BlockSide::LEFT,
            BlockSide::BOTTOM => BlockSide::TOP,
            BlockSide::TOP => BlockSide::BOTTOM,
            BlockSide::BACK => BlockSide::FRONT,
            BlockSide::FRONT => BlockSide::BACK,
        }
    }

    /// Lattice offset from a block to its neighbor across this face.
    pub fn offset(self) -> Vector3<i32> {
        self.unit() * BLOCK_SPACING
    }

    /// Outward unit normal of this face.
    pub fn normal(self) -> Vector3<f32> {
        let unit = self.unit();
        Vector3::new(unit.x as f32, unit.y as f32, unit.z as f32)
    }

    /// Whether this face points along the Y axis.
    pub fn is_vertical(self) -> bool {
        matches!(self, BlockSide::BOTTOM | BlockSide::TOP)
    }

    /// The single-bit mask of this face.
    pub fn bit(self) -> FaceBits {
        FaceBits(1 << self as u8)
    }

    fn unit(self) -> Vector3<i32> {
        match self {
            BlockSide::LEFT => Vector3::new(-1, 0, 0),
            BlockSide::RIGHT => Vector3::new(1, 0, 0),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::BACK => Vector3::new(0, 0, -1),
            BlockSide::FRONT => Vector3::new(0, 0, 1),
        }
    }
}

/// A set of block faces packed into the low six bits of a byte.
///
/// The same type carries two meanings in the engine: as an occlusion mask a set bit
/// means "the neighbor across this face is populated", as a face-visibility mask it
/// means "this face is exposed". `complement` converts one into the other.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct FaceBits(u8);

impl FaceBits {
    /// No faces.
    pub const NONE: FaceBits = FaceBits(0);
    /// All six faces.
    pub const ALL: FaceBits = FaceBits(0x3F);
    /// Number of distinct masks, i.e. the length of one optimizer sweep.
    pub const COMBINATIONS: u8 = 64;

    /// Builds a mask from raw bits, discarding anything above bit 5.
    pub const fn from_bits(bits: u8) -> Self {
        FaceBits(bits & 0x3F)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, side: BlockSide) -> bool {
        self.0 & side.bit().0 != 0
    }

    pub fn insert(&mut self, side: BlockSide) {
        self.0 |= side.bit().0;
    }

    pub fn remove(&mut self, side: BlockSide) {
        self.0 &= !side.bit().0;
    }

    /// Returns a copy with `side` set.
    pub fn with(mut self, side: BlockSide) -> Self {
        self.insert(side);
        self
    }

    /// The faces not in this set.
    pub fn complement(self) -> Self {
        FaceBits(!self.0 & Self::ALL.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether the two sets share at least one face.
    pub fn intersects(self, other: FaceBits) -> bool {
        self.0 & other.0 != 0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates over the set faces in bit order.
    pub fn iter(self) -> impl Iterator<Item = BlockSide> {
        (0..6u8)
            .filter(move |index| self.0 & (1 << index) != 0)
            .filter_map(BlockSide::from_index)
    }

    /// Determines which faces can be facing a viewer looking along `view_vec`.
    ///
    /// A face is kept unless its outward normal points away from the viewer by more
    /// than the tolerance angle, i.e. it is kept when
    /// `normal · view < sin(tolerance)`. A larger tolerance keeps more faces; at 45°
    /// the cutoff is 1/√2.
    ///
    /// # Arguments
    /// * `view_vec` - The viewing direction; normalised internally
    /// * `tolerance_deg` - The angular tolerance in degrees
    pub fn facing(view_vec: Vector3<f32>, tolerance_deg: f32) -> FaceBits {
        if view_vec.magnitude2() == 0.0 {
            return FaceBits::ALL;
        }
        let view_vec = view_vec.normalize();
        let cutoff = tolerance_deg.to_radians().sin();

        BlockSide::all()
            .into_iter()
            .filter(|side| side.normal().dot(view_vec) < cutoff)
            .fold(FaceBits::NONE, FaceBits::with)
    }
}

impl fmt::Debug for FaceBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaceBits({:06b})", self.0)
    }
}
