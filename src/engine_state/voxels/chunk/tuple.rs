//! # Tuple Module
//!
//! A tuple is a render batch: every block in it shares one texture and one
//! face-visibility mask, so the whole batch can be drawn with a single texture bind and
//! a single set of enabled faces.

use std::{cmp::Ordering, collections::HashMap};

use crate::engine_state::voxels::{
    block::{block_side::FaceBits, texture::TextureId},
    position::{grid_order, Position},
};

/// Identity of a tuple: texture first, then face mask.
///
/// The derived ordering is the ordering of tuple lists everywhere in the engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TupleKey {
    pub texture: TextureId,
    pub face_bits: FaceBits,
}

impl TupleKey {
    pub fn new(texture: TextureId, face_bits: FaceBits) -> Self {
        TupleKey { texture, face_bits }
    }
}

/// The fixed comparator for tuple lists: texture, then face mask.
pub const TUPLE_COMP: fn(&Tuple, &Tuple) -> Ordering = compare_tuples;

fn compare_tuples(a: &Tuple, b: &Tuple) -> Ordering {
    a.key.cmp(&b.key)
}

/// A batch of block positions sharing a texture and a face mask.
///
/// Blocks are referenced by position only; the records themselves stay in the
/// occlusion index. Insertion and removal are O(1): removal swaps the last block into
/// the freed slot.
#[derive(Clone, Debug)]
pub struct Tuple {
    key: TupleKey,
    blocks: Vec<Position>,
    slots: HashMap<Position, usize>,
}

impl Tuple {
    pub fn new(key: TupleKey) -> Self {
        Tuple {
            key,
            blocks: Vec::new(),
            slots: HashMap::new(),
        }
    }

    pub fn key(&self) -> TupleKey {
        self.key
    }

    pub fn texture(&self) -> TextureId {
        self.key.texture
    }

    pub fn face_bits(&self) -> FaceBits {
        self.key.face_bits
    }

    /// Block positions in batch order.
    pub fn blocks(&self) -> &[Position] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, position: Position) -> bool {
        self.slots.contains_key(&position)
    }

    /// Appends a block.
    ///
    /// # Returns
    /// `false` if the block was already in the batch
    pub fn push(&mut self, position: Position) -> bool {
        if self.slots.contains_key(&position) {
            return false;
        }
        self.slots.insert(position, self.blocks.len());
        self.blocks.push(position);
        true
    }

    /// Removes a block, moving the last block into its slot.
    pub fn remove(&mut self, position: Position) -> bool {
        let Some(slot) = self.slots.remove(&position) else {
            return false;
        };
        self.blocks.swap_remove(slot);
        if let Some(moved) = self.blocks.get(slot) {
            self.slots.insert(*moved, slot);
        }
        true
    }

    /// Appends every block of `positions` not already present.
    pub fn extend<I: IntoIterator<Item = Position>>(&mut self, positions: I) -> usize {
        positions
            .into_iter()
            .filter(|position| self.push(*position))
            .count()
    }

    /// Puts the blocks into grid order so batch contents are reproducible.
    pub fn sort_blocks(&mut self) {
        self.blocks.sort_by(grid_order);
        for (slot, position) in self.blocks.iter().enumerate() {
            self.slots.insert(*position, slot);
        }
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.blocks == other.blocks
    }
}
