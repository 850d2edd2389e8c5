//! # World Module
//!
//! This module provides the `World` struct, the single owner of all block data: the
//! occlusion index plus the chunk partition derived from it.
//!
//! ## Architecture
//!
//! Every mutation goes through `World`, which applies it to the index first and then
//! re-files every block whose face mask changed. Callers therefore never observe an
//! index and a partition that disagree.
//!
//! The world is not a global. The generator, the editor and the optimizer all receive
//! it by reference, and the engine shares it between threads behind one
//! `MtResource` lock.
//!
//! ## Performance Considerations
//!
//! - Insert and remove are O(1): one index update plus at most six reclassifications
//! - Texture listing is O(t) thanks to a per-texture reference count
//! - Full enumeration (`blocks`) sorts its output and is meant for persistence only

use std::collections::BTreeMap;

use log::debug;

use super::{
    block::{block_side::FaceBits, texture::TextureId, BlockRecord, Rgba},
    chunk::{partition::ChunkPartition, ChunkId},
    occlusion_index::SpatialOcclusionIndex,
    position::{grid_order, neighbor, snap_point, Position},
};

/// Which blocks an enumeration should return.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockFilter {
    All,
    Solid,
    Fluid,
}

impl BlockFilter {
    pub fn matches(self, record: &BlockRecord) -> bool {
        match self {
            BlockFilter::All => true,
            BlockFilter::Solid => record.solid,
            BlockFilter::Fluid => !record.solid,
        }
    }
}

/// The voxel world: block records, their occlusion links and their render tuples.
///
/// # Examples
///
/// ```
/// use block_world::engine_state::voxels::{block::texture::TextureId, world::World};
/// use cgmath::Point3;
///
/// let mut world = World::new();
/// let stone = TextureId::new("stone").unwrap();
/// world.insert_block(Point3::new(0, 0, 0), stone, [1.0; 4], true);
/// world.insert_block(Point3::new(2, 0, 0), stone, [1.0; 4], true);
///
/// let origin = world.query_occupancy(Point3::new(0, 0, 0)).unwrap();
/// assert_eq!(origin.occlusion.count(), 1);
/// ```
#[derive(Default, Debug, Clone)]
pub struct World {
    index: SpatialOcclusionIndex,
    partition: ChunkPartition,
    textures: BTreeMap<TextureId, usize>,
}

impl World {
    /// Creates a new, empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a block built from its parts.
    ///
    /// # Returns
    /// The occlusion mask of the new block
    pub fn insert_block(
        &mut self,
        position: Position,
        texture: TextureId,
        color: Rgba,
        solid: bool,
    ) -> FaceBits {
        self.insert(position, BlockRecord::new(texture, color, solid))
    }

    /// Places `record` at `position`, snapping the position onto the lattice.
    ///
    /// An occupied position is cleared first, so replacing a block is a remove followed
    /// by an insert and neighbor masks stay exact.
    ///
    /// # Returns
    /// The occlusion mask of the new block
    pub fn insert(&mut self, position: Position, record: BlockRecord) -> FaceBits {
        let position = snap_point(position);
        if self.index.query(position).is_some() {
            self.remove_block(position);
        }

        let own_mask = self.index.put(position, record);
        if let Some(stored) = self.index.query(position) {
            self.partition.add_block(position, stored);
        }
        *self.textures.entry(record.texture).or_insert(0) += 1;

        self.refile_neighbors(position, own_mask);
        own_mask
    }

    /// Removes the block at `position`.
    ///
    /// # Returns
    /// The removed record, or `None` if the position was empty
    pub fn remove_block(&mut self, position: Position) -> Option<BlockRecord> {
        let position = snap_point(position);
        let removed = self.index.remove(position)?;
        self.partition.remove_block(position);

        if let Some(count) = self.textures.get_mut(&removed.texture) {
            *count -= 1;
            if *count == 0 {
                self.textures.remove(&removed.texture);
            }
        }

        self.refile_neighbors(position, removed.occlusion);
        Some(removed)
    }

    fn refile_neighbors(&mut self, position: Position, sides: FaceBits) {
        for side in sides.iter() {
            let neighbor_position = neighbor(position, side);
            if let Some(record) = self.index.query(neighbor_position) {
                self.partition.reclassify(neighbor_position, record);
            }
        }
    }

    /// The block at `position`, if any. Off-lattice positions snap down as on insert.
    pub fn query_occupancy(&self, position: Position) -> Option<&BlockRecord> {
        self.index.query(snap_point(position))
    }

    pub fn is_populated(&self, position: Position, solid_only: bool) -> bool {
        self.index.is_populated(snap_point(position), solid_only)
    }

    /// All blocks matching `filter`, in grid order.
    pub fn blocks(&self, filter: BlockFilter) -> Vec<(Position, BlockRecord)> {
        let mut blocks: Vec<(Position, BlockRecord)> = self
            .index
            .iter()
            .filter(|(_, record)| filter.matches(record))
            .map(|(position, record)| (*position, *record))
            .collect();
        blocks.sort_by(|a, b| grid_order(&a.0, &b.0));
        blocks
    }

    /// Positions of the blocks matching `filter`, in grid order.
    pub fn positions(&self, filter: BlockFilter) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .index
            .populated_positions(move |record| filter.matches(record))
            .collect();
        positions.sort_by(grid_order);
        positions
    }

    /// Re-inserts a stream of blocks, e.g. from a level file.
    ///
    /// # Returns
    /// The number of blocks inserted
    pub fn insert_all<I>(&mut self, blocks: I) -> usize
    where
        I: IntoIterator<Item = (Position, BlockRecord)>,
    {
        let mut inserted = 0;
        for (position, record) in blocks {
            self.insert(position, record);
            inserted += 1;
        }
        debug!("Bulk inserted {} blocks", inserted);
        inserted
    }

    /// Removes every block.
    pub fn clear(&mut self) {
        self.index.clear();
        self.partition.clear();
        self.textures.clear();
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Every texture used by at least one block, in sorted order.
    pub fn textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.textures.keys().copied()
    }

    /// Ids of all populated chunks.
    pub fn chunk_ids(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.partition.chunk_ids().copied()
    }

    pub fn index(&self) -> &SpatialOcclusionIndex {
        &self.index
    }

    pub fn partition(&self) -> &ChunkPartition {
        &self.partition
    }

    /// Throws away all chunks and recomputes them from the index.
    pub fn rebuild_partition(&mut self) {
        self.partition.rebuild_from(&self.index);
    }
}
