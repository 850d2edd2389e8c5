//! # Block Module
//!
//! This module provides the block record stored in the occlusion index, the face
//! enumeration and bit set, and texture identifiers.

use std::hash::{DefaultHasher, Hash, Hasher};

use block_side::FaceBits;
use texture::TextureId;

use super::position::Position;

pub mod block_side;
pub mod texture;

/// RGBA color, components in `0.0..=1.0`.
pub type Rgba = [f32; 4];

/// Represents a single block in the world.
///
/// Records are owned by the `SpatialOcclusionIndex`. They are never edited in place by
/// callers: changing the texture, color or solidity of a block means removing it and
/// inserting a new record. The index alone keeps `occlusion` and `id` current.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BlockRecord {
    /// Texture of all six faces.
    pub texture: TextureId,
    /// Tint color.
    pub color: Rgba,
    /// Solid blocks are terrain; non-solid blocks are fluid.
    pub solid: bool,
    /// Which face neighbors are currently populated.
    pub occlusion: FaceBits,
    /// Hash of solidity, texture, face mask and position. Changes whenever the
    /// occlusion mask changes.
    pub id: u64,
}

impl BlockRecord {
    /// Creates an unplaced record with an empty occlusion mask.
    pub fn new(texture: TextureId, color: Rgba, solid: bool) -> Self {
        BlockRecord {
            texture,
            color,
            solid,
            occlusion: FaceBits::NONE,
            id: 0,
        }
    }

    /// A solid block using the palette color of its texture.
    pub fn solid(texture: TextureId) -> Self {
        Self::new(texture, texture.base_color(), true)
    }

    /// A fluid block using the palette color of its texture.
    pub fn fluid(texture: TextureId) -> Self {
        Self::new(texture, texture.base_color(), false)
    }

    /// Faces not covered by a neighbor; this is the mask tuples are keyed by.
    pub fn visible_faces(&self) -> FaceBits {
        self.occlusion.complement()
    }

    /// Derives the unique id of this record at `position`.
    pub fn compute_id(&self, position: Position) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.solid.hash(&mut hasher);
        self.texture.hash(&mut hasher);
        self.visible_faces().hash(&mut hasher);
        position.hash(&mut hasher);
        hasher.finish()
    }
}
