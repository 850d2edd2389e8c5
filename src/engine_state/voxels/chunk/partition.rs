//! # Chunk Partition
//!
//! Sparse map of chunk id → `Chunk`. Chunks are created on first use and dropped when
//! their last block leaves, so the partition only ever holds populated regions.

use std::collections::HashMap;

use log::debug;

use super::{chunk_of, tuple::{Tuple, TupleKey}, Chunk, ChunkId};
use crate::engine_state::voxels::{
    block::{block_side::FaceBits, texture::TextureId, BlockRecord},
    occlusion_index::SpatialOcclusionIndex,
    position::Position,
};

/// Assigns every block of the world to a chunk and, inside it, to a tuple.
#[derive(Default, Debug, Clone)]
pub struct ChunkPartition {
    chunks: HashMap<ChunkId, Chunk>,
}

impl ChunkPartition {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_for(record: &BlockRecord) -> TupleKey {
        TupleKey::new(record.texture, record.visible_faces())
    }

    /// Adds (or re-files) the block at `position` under its current texture and face
    /// mask.
    pub fn add_block(&mut self, position: Position, record: &BlockRecord) {
        let id = chunk_of(position);
        self.chunks
            .entry(id)
            .or_insert_with(|| Chunk::new(id))
            .add_block(position, Self::key_for(record));
    }

    /// Moves the block at `position` to the tuple matching `record`.
    ///
    /// Call after the index changed the block's occlusion mask.
    pub fn reclassify(&mut self, position: Position, record: &BlockRecord) -> bool {
        self.chunks
            .get_mut(&chunk_of(position))
            .is_some_and(|chunk| chunk.reclassify(position, Self::key_for(record)))
    }

    pub fn remove_block(&mut self, position: Position) -> bool {
        let id = chunk_of(position);
        let Some(chunk) = self.chunks.get_mut(&id) else {
            return false;
        };
        let removed = chunk.remove_block(position);
        if chunk.is_empty() {
            self.chunks.remove(&id);
        }
        removed
    }

    pub fn get_tuple(
        &self,
        chunk_id: ChunkId,
        texture: TextureId,
        face_bits: FaceBits,
    ) -> Option<&Tuple> {
        self.chunks.get(&chunk_id)?.get_tuple(texture, face_bits)
    }

    pub fn chunk(&self, chunk_id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(&chunk_id)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn chunk_ids(&self) -> impl Iterator<Item = &ChunkId> {
        self.chunks.keys()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Discards every chunk and re-files all blocks of `index`.
    pub fn rebuild_from(&mut self, index: &SpatialOcclusionIndex) {
        self.chunks.clear();
        for (position, record) in index.iter() {
            self.add_block(*position, record);
        }
        debug!(
            "Rebuilt partition: {} blocks in {} chunks",
            index.len(),
            self.chunks.len()
        );
    }
}
