//! # Camera State
//!
//! The optimizer only needs three facts about the camera: where it is, where it looks
//! and whether it is under a fluid surface. `Observer` carries exactly that and derives
//! the visibility inputs of a sweep from it:
//! - the coarse face mask of faces that can point toward the camera
//! - the fine per-block view-cone test
//! - the queue of visible chunks around the camera, nearest first
//!
//! Camera movement itself is out of scope; the owner of the `Observer` updates it.

use cgmath::{InnerSpace, Point3, Rad, Vector3};

use super::voxels::{
    block::block_side::FaceBits,
    chunk::{ChunkId, CHUNK_SPAN},
    position::{center, quantize_point, Position},
    world::World,
};

/// The viewpoint the optimizer batches for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observer {
    /// The camera's position in world space
    pub position: Point3<f32>,
    /// Normalized viewing direction
    pub front: Vector3<f32>,
    /// Whether the camera is inside a fluid; `EngineState` refreshes it from the world
    /// at the start of every sweep
    pub submerged: bool,
}

impl Observer {
    /// Creates an observer looking along `front` (normalised here).
    pub fn new(position: Point3<f32>, front: Vector3<f32>) -> Self {
        let front = if front.magnitude2() > 0.0 {
            front.normalize()
        } else {
            Vector3::new(0.0, 0.0, -1.0)
        };
        Observer {
            position,
            front,
            submerged: false,
        }
    }

    /// Creates an observer from yaw (around Y) and pitch (around X).
    ///
    /// Zero yaw and pitch look down negative Z.
    pub fn from_yaw_pitch<Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(
        position: Point3<f32>,
        yaw: Y,
        pitch: P,
    ) -> Self {
        let (yaw_sin, yaw_cos) = yaw.into().0.sin_cos();
        let (pitch_sin, pitch_cos) = pitch.into().0.sin_cos();
        Self::new(
            position,
            Vector3::new(-yaw_sin * pitch_cos, pitch_sin, -yaw_cos * pitch_cos),
        )
    }

    pub fn with_submerged(mut self, submerged: bool) -> Self {
        self.submerged = submerged;
        self
    }

    /// The lattice position of the block the camera is in.
    pub fn block_position(&self) -> Position {
        quantize_point(self.position)
    }

    /// Whether the block around the camera is a fluid.
    pub fn is_in_fluid(&self, world: &World) -> bool {
        world
            .query_occupancy(self.block_position())
            .is_some_and(|record| !record.solid)
    }

    /// The chunk the camera is in.
    pub fn chunk_position(&self) -> ChunkId {
        let span = CHUNK_SPAN as f32;
        Point3::new(
            (self.position.x / span).floor() as i32,
            (self.position.y / span).floor() as i32,
            (self.position.z / span).floor() as i32,
        )
    }

    /// Faces that may point toward the camera, given the angular tolerance in degrees.
    pub fn facing_mask(&self, tolerance_deg: f32) -> FaceBits {
        FaceBits::facing(self.front, tolerance_deg)
    }

    /// Fine visibility test for one block.
    ///
    /// Blocks within `near_distance` are always visible; anything else must lie within
    /// the view cone whose half-angle cosine is `cone_cos`.
    pub fn can_see(&self, position: Position, cone_cos: f32, near_distance: f32) -> bool {
        let to_block = center(position) - self.position;
        let distance2 = to_block.magnitude2();
        if distance2 <= near_distance * near_distance {
            return true;
        }
        to_block.dot(self.front) / distance2.sqrt() >= cone_cos
    }

    /// The populated chunks within `radius` chunks of the camera, nearest first.
    ///
    /// Ties are broken by chunk coordinates so the queue is deterministic.
    pub fn visible_chunks(&self, world: &World, radius: i32) -> Vec<ChunkId> {
        let here = self.chunk_position();
        let mut chunks: Vec<ChunkId> = world
            .chunk_ids()
            .filter(|id| {
                (id.x - here.x).abs() <= radius
                    && (id.y - here.y).abs() <= radius
                    && (id.z - here.z).abs() <= radius
            })
            .collect();
        chunks.sort_by_key(|id| {
            let offset = *id - here;
            let distance2 = offset.x * offset.x + offset.y * offset.y + offset.z * offset.z;
            (distance2, id.x, id.y, id.z)
        });
        chunks
    }
}

impl Default for Observer {
    fn default() -> Self {
        Observer::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, -1.0))
    }
}
