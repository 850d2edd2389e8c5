//! # Spatial Occlusion Index
//!
//! A hash map from quantized position to `BlockRecord` that keeps every record's
//! occlusion mask in sync with its six face neighbors.
//!
//! ## Invariant
//!
//! For every populated position `p` and every side `s`, bit `s` of `p`'s mask is set
//! exactly when `p + s.offset()` is populated. `put` and `remove` update both the
//! affected record and the complementary bit of each neighbor, so the relation stays
//! symmetric after every call.
//!
//! ## Performance Considerations
//!
//! - `put`, `remove`, `query` and `is_populated` are O(1): at most seven hash lookups
//! - Record ids are recomputed only for records whose mask actually changed

use std::collections::HashMap;

use super::{
    block::{block_side::{BlockSide, FaceBits}, BlockRecord},
    position::{neighbor, Position},
};

/// Position → block map with bidirectional occlusion bookkeeping.
#[derive(Default, Debug, Clone)]
pub struct SpatialOcclusionIndex {
    records: HashMap<Position, BlockRecord>,
}

impl SpatialOcclusionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` at `position` and links it with its populated neighbors.
    ///
    /// The record's own mask is recomputed from scratch; any mask passed in is ignored.
    /// If `position` was already populated the old record is replaced without touching
    /// the neighbors on its behalf: their bits already say "populated", which stays true.
    ///
    /// # Returns
    /// The occlusion mask computed for the new record. Every side in it names a
    /// neighbor whose mask just gained the complementary bit.
    pub fn put(&mut self, position: Position, mut record: BlockRecord) -> FaceBits {
        let mut own_mask = FaceBits::NONE;

        for side in BlockSide::all() {
            if let Some(other) = self.records.get_mut(&neighbor(position, side)) {
                own_mask.insert(side);
                other.occlusion.insert(side.opposite());
                other.id = other.compute_id(neighbor(position, side));
            }
        }

        record.occlusion = own_mask;
        record.id = record.compute_id(position);
        self.records.insert(position, record);

        own_mask
    }

    /// Erases the record at `position` and unlinks it from its neighbors.
    ///
    /// # Returns
    /// The removed record, or `None` if the position was empty. The removed record's
    /// mask names every neighbor whose complementary bit was just cleared.
    pub fn remove(&mut self, position: Position) -> Option<BlockRecord> {
        let removed = self.records.remove(&position)?;

        for side in removed.occlusion.iter() {
            let neighbor_position = neighbor(position, side);
            if let Some(other) = self.records.get_mut(&neighbor_position) {
                other.occlusion.remove(side.opposite());
                other.id = other.compute_id(neighbor_position);
            }
        }

        Some(removed)
    }

    pub fn query(&self, position: Position) -> Option<&BlockRecord> {
        self.records.get(&position)
    }

    /// Whether `position` holds a block; with `solid_only` fluids do not count.
    pub fn is_populated(&self, position: Position, solid_only: bool) -> bool {
        self.records
            .get(&position)
            .is_some_and(|record| record.solid || !solid_only)
    }

    /// Positions whose records satisfy `predicate`, in no particular order.
    pub fn populated_positions<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = Position> + 'a
    where
        F: Fn(&BlockRecord) -> bool + 'a,
    {
        self.records
            .iter()
            .filter(move |(_, record)| predicate(record))
            .map(|(position, _)| *position)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Position, &BlockRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point3;

    use super::*;
    use crate::engine_state::voxels::block::texture::TextureId;

    fn stone() -> BlockRecord {
        BlockRecord::solid(TextureId::new("stone").unwrap())
    }

    #[test]
    fn adjacent_blocks_occlude_each_other() {
        let mut index = SpatialOcclusionIndex::new();
        let origin = Point3::new(0, 0, 0);
        let right = Point3::new(2, 0, 0);

        assert_eq!(index.put(origin, stone()), FaceBits::NONE);
        assert_eq!(index.put(right, stone()), BlockSide::LEFT.bit());

        assert_eq!(index.query(origin).unwrap().occlusion, BlockSide::RIGHT.bit());
        assert_eq!(index.query(right).unwrap().occlusion, BlockSide::LEFT.bit());

        assert!(index.remove(right).is_some());
        assert_eq!(index.query(origin).unwrap().occlusion, FaceBits::NONE);
        assert!(index.remove(right).is_none());
    }

    #[test]
    fn occlusion_stays_symmetric_under_random_edits() {
        let mut index = SpatialOcclusionIndex::new();
        let mut rng = fastrand::Rng::with_seed(7);

        for _ in 0..2000 {
            let position = Point3::new(
                rng.i32(-3..=3) * 2,
                rng.i32(-3..=3) * 2,
                rng.i32(-3..=3) * 2,
            );
            if rng.u8(..4) == 0 {
                index.remove(position);
            } else if index.query(position).is_none() {
                index.put(position, stone());
            }
        }

        for (position, record) in index.iter() {
            for side in BlockSide::all() {
                let populated = index.query(neighbor(*position, side)).is_some();
                assert_eq!(record.occlusion.contains(side), populated);
                if populated {
                    let other = index.query(neighbor(*position, side)).unwrap();
                    assert!(other.occlusion.contains(side.opposite()));
                }
            }
            assert_eq!(record.id, record.compute_id(*position));
        }
    }

    #[test]
    fn edge_neighbors_do_not_occlude() {
        let mut index = SpatialOcclusionIndex::new();
        index.put(Point3::new(0, 0, 0), stone());
        index.put(Point3::new(2, 2, 0), stone());
        assert_eq!(index.query(Point3::new(0, 0, 0)).unwrap().occlusion, FaceBits::NONE);
    }

    #[test]
    fn solid_only_ignores_fluid() {
        let mut index = SpatialOcclusionIndex::new();
        let water = Point3::new(0, 0, 0);
        index.put(water, BlockRecord::fluid(TextureId::fluid()));
        assert!(index.is_populated(water, false));
        assert!(!index.is_populated(water, true));
        assert_eq!(index.populated_positions(|record| !record.solid).count(), 1);
        assert_eq!(index.populated_positions(|record| record.solid).count(), 0);
    }

    #[test]
    fn overwrite_keeps_neighbor_links() {
        let mut index = SpatialOcclusionIndex::new();
        let origin = Point3::new(0, 0, 0);
        index.put(origin, stone());
        index.put(Point3::new(0, 2, 0), stone());
        index.put(origin, BlockRecord::fluid(TextureId::fluid()));

        assert_eq!(index.len(), 2);
        assert_eq!(index.query(origin).unwrap().occlusion, BlockSide::TOP.bit());
        assert!(!index.query(origin).unwrap().solid);
    }
}
