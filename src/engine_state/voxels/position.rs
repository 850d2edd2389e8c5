//! # Position Grid
//!
//! Quantization rules for the block lattice. A block occupies a 2×2×2 cube centered on
//! a point whose three coordinates are even integers, so every position handled by the
//! engine is a `Point3<i32>` with even components.

use std::cmp::Ordering;

use cgmath::{Point3, Vector3};

use super::block::block_side::BlockSide;

/// Distance between the centers of two face-adjacent blocks.
pub const BLOCK_SPACING: i32 = 2;

/// A quantized block position.
pub type Position = Point3<i32>;

/// Offsets to the 12 edge-adjacent neighbors (two axes changed by one block each).
pub const EDGE_OFFSETS: [[i32; 3]; 12] = [
    [-2, -2, 0],
    [-2, 2, 0],
    [2, -2, 0],
    [2, 2, 0],
    [-2, 0, -2],
    [-2, 0, 2],
    [2, 0, -2],
    [2, 0, 2],
    [0, -2, -2],
    [0, -2, 2],
    [0, 2, -2],
    [0, 2, 2],
];

/// Snaps a continuous coordinate to the nearest lattice value.
pub fn quantize(value: f32) -> i32 {
    (value / BLOCK_SPACING as f32).round() as i32 * BLOCK_SPACING
}

/// Snaps a continuous point to the nearest lattice position.
pub fn quantize_point(point: Point3<f32>) -> Position {
    Point3::new(quantize(point.x), quantize(point.y), quantize(point.z))
}

/// Snaps an integer coordinate down to the lattice.
pub fn snap(value: i32) -> i32 {
    value - value.rem_euclid(BLOCK_SPACING)
}

/// Snaps an integer point down to the lattice.
pub fn snap_point(point: Point3<i32>) -> Position {
    Point3::new(snap(point.x), snap(point.y), snap(point.z))
}

/// Whether every component lies on the lattice.
pub fn is_on_grid(position: Position) -> bool {
    position.x.rem_euclid(BLOCK_SPACING) == 0
        && position.y.rem_euclid(BLOCK_SPACING) == 0
        && position.z.rem_euclid(BLOCK_SPACING) == 0
}

/// The face-adjacent neighbor across `side`.
pub fn neighbor(position: Position, side: BlockSide) -> Position {
    position + side.offset()
}

/// The 18 positions sharing a face or an edge with `position`, faces first.
///
/// Edge neighbors take part in free-face search during random placement, never in
/// occlusion.
pub fn free_face_candidates(position: Position) -> impl Iterator<Item = Position> {
    let faces = BlockSide::all().into_iter().map(move |side| neighbor(position, side));
    let edges = EDGE_OFFSETS
        .into_iter()
        .map(move |[x, y, z]| position + Vector3::new(x, y, z));
    faces.chain(edges)
}

/// Center of the block in world space.
pub fn center(position: Position) -> Point3<f32> {
    Point3::new(position.x as f32, position.y as f32, position.z as f32)
}

/// Total order on positions (x, then y, then z) used wherever output must be
/// deterministic.
pub fn grid_order(a: &Position, b: &Position) -> Ordering {
    (a.x, a.y, a.z).cmp(&(b.x, b.y, b.z))
}

/// An axis-aligned box of lattice positions, bounds inclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GridBox {
    pub min: Position,
    pub max: Position,
}

impl GridBox {
    pub fn new(min: Position, max: Position) -> Self {
        GridBox { min, max }
    }

    pub fn contains(&self, position: Position) -> bool {
        (self.min.x..=self.max.x).contains(&position.x)
            && (self.min.y..=self.max.y).contains(&position.y)
            && (self.min.z..=self.max.z).contains(&position.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_rounds_to_nearest_even() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(0.9), 0);
        assert_eq!(quantize(1.2), 2);
        assert_eq!(quantize(-3.1), -4);
    }

    #[test]
    fn snap_goes_down_for_negative_odd_values() {
        assert_eq!(snap(3), 2);
        assert_eq!(snap(-3), -4);
        assert_eq!(snap(-4), -4);
        assert!(is_on_grid(snap_point(Point3::new(-7, 5, 1))));
        assert!(!is_on_grid(Point3::new(0, 1, 0)));
    }

    #[test]
    fn free_face_candidates_are_distinct_neighbors() {
        let origin = Point3::new(0, 0, 0);
        let candidates: Vec<Position> = free_face_candidates(origin).collect();
        assert_eq!(candidates.len(), 18);
        for candidate in &candidates {
            let delta = [candidate.x, candidate.y, candidate.z];
            let moved = delta.iter().filter(|d| **d != 0).count();
            assert!(moved == 1 || moved == 2);
            assert!(delta.iter().all(|d| d.abs() == 0 || d.abs() == 2));
        }
        let mut sorted = candidates.clone();
        sorted.sort_by(grid_order);
        sorted.dedup();
        assert_eq!(sorted.len(), 18);
    }

    #[test]
    fn grid_box_bounds_are_inclusive() {
        let bounds = GridBox::new(Point3::new(-2, 0, -2), Point3::new(2, 4, 2));
        assert!(bounds.contains(Point3::new(2, 4, -2)));
        assert!(!bounds.contains(Point3::new(4, 0, 0)));
    }
}
