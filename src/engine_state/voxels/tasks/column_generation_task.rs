//! # Column Generation Task
//!
//! This module defines the `ColumnGenerationTask` which fills one vertical column of the
//! noise phase on a worker thread.
//!
//! The task samples the height function three times for its column (mid, top and
//! bottom height) and walks the column:
//! - boundary columns stack solid blocks from the mid height up toward the top height
//! - interior columns fill fluid from just below the mid height down toward the bottom
//!
//! The walk stops when the column's quota is met or shutdown is signalled. Nothing
//! touches the world on the worker; the result carries the blocks back and is applied by
//! the thread that holds the world.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use cgmath::Point3;
use noise::{Fbm, NoiseFn, Perlin};

use crate::engine_state::{
    task_management::task::{Task, TaskResult},
    voxels::{
        block::{texture::TextureId, BlockRecord},
        position::{GridBox, Position, BLOCK_SPACING},
        world::World,
    },
};

/// Offsets applied to the column coordinates for the top and bottom samples, so the
/// three samples are independent.
const TOP_SAMPLE_OFFSET: f64 = 1013.37;
const BOTTOM_SAMPLE_OFFSET: f64 = -2027.71;

/// State shared by every column of one generation run.
pub struct ColumnContext {
    pub noise: Fbm<Perlin>,
    /// Noise input units per block.
    pub noise_scale: f64,
    /// Maximum height deviation in blocks.
    pub height_amplitude: i32,
    pub seed: u64,
    pub spawn: GridBox,
    pub shutdown: Arc<AtomicBool>,
    pub progress: Arc<AtomicUsize>,
}

/// The three per-column heights, in blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnHeights {
    pub bottom: i32,
    pub mid: i32,
    pub top: i32,
}

impl ColumnHeights {
    /// Samples the heights of the column at block coordinates (`x`, `z`).
    ///
    /// `bottom < mid < top` always holds.
    pub fn sample(context: &ColumnContext, x: i32, z: i32) -> Self {
        let nx = x as f64 * context.noise_scale;
        let nz = z as f64 * context.noise_scale;
        let amplitude = context.height_amplitude as f64;
        let unit = |value: f64| ((value.clamp(-1.0, 1.0) + 1.0) / 2.0 * amplitude).round() as i32;

        let mid = (context.noise.get([nx, nz]).clamp(-1.0, 1.0) * amplitude).round() as i32;
        let top = mid + 1 + unit(context.noise.get([nx + TOP_SAMPLE_OFFSET, nz]));
        let bottom = mid - 1 - unit(context.noise.get([nx, nz + BOTTOM_SAMPLE_OFFSET]));
        ColumnHeights { bottom, mid, top }
    }
}

/// Fills one column of the noise phase.
pub struct ColumnGenerationTask {
    context: Arc<ColumnContext>,
    /// Column coordinates in blocks.
    x: i32,
    z: i32,
    quota: usize,
    boundary: bool,
}

impl ColumnGenerationTask {
    /// Creates a new column task.
    ///
    /// # Arguments
    /// * `context` - Noise, seed and signals shared by the run
    /// * `x`, `z` - Column coordinates in blocks
    /// * `quota` - Maximum number of blocks the column may place
    /// * `boundary` - Whether the column lies on the edge of the generated area
    pub fn new(context: Arc<ColumnContext>, x: i32, z: i32, quota: usize, boundary: bool) -> Self {
        ColumnGenerationTask {
            context,
            x,
            z,
            quota,
            boundary,
        }
    }

    fn column_seed(&self) -> u64 {
        let column = ((self.x as u32 as u64) << 32) | self.z as u32 as u64;
        self.context.seed ^ column.wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

impl Task for ColumnGenerationTask {
    fn process(&self) -> Box<dyn TaskResult + Send> {
        let mut blocks = Vec::with_capacity(self.quota);
        let heights = ColumnHeights::sample(&self.context, self.x, self.z);

        let levels: Vec<i32> = if self.boundary {
            (heights.mid..heights.top).collect()
        } else {
            (heights.bottom..heights.mid).rev().collect()
        };

        let mut rng = fastrand::Rng::with_seed(self.column_seed());
        let texture = if self.boundary {
            TextureId::random_solid(&mut rng)
        } else {
            TextureId::fluid()
        };

        for y in levels {
            if blocks.len() >= self.quota || self.context.shutdown.load(Ordering::Relaxed) {
                break;
            }
            let position = Point3::new(
                self.x * BLOCK_SPACING,
                y * BLOCK_SPACING,
                self.z * BLOCK_SPACING,
            );
            if self.context.spawn.contains(position) {
                continue;
            }
            let record = if self.boundary {
                BlockRecord::solid(texture)
            } else {
                BlockRecord::fluid(texture)
            };
            blocks.push((position, record));
        }

        Box::new(ColumnGenerationTaskResult {
            context: self.context.clone(),
            blocks,
        })
    }
}

/// The blocks of one column, waiting to be inserted.
pub struct ColumnGenerationTaskResult {
    context: Arc<ColumnContext>,
    blocks: Vec<(Position, BlockRecord)>,
}

impl TaskResult for ColumnGenerationTaskResult {
    /// Inserts the column's blocks, skipping occupied positions.
    fn handle_result(self: Box<Self>, world: &mut World) -> usize {
        let mut placed = 0;
        for (position, record) in self.blocks {
            if self.context.shutdown.load(Ordering::Relaxed) {
                break;
            }
            if world.is_populated(position, false) {
                continue;
            }
            world.insert(position, record);
            self.context.progress.fetch_add(1, Ordering::Relaxed);
            placed += 1;
        }
        placed
    }
}

#[cfg(test)]
mod tests {
    use noise::MultiFractal;

    use super::*;
    use crate::engine_state::voxels::world::BlockFilter;

    fn context(spawn: GridBox) -> Arc<ColumnContext> {
        Arc::new(ColumnContext {
            noise: Fbm::<Perlin>::new(7).set_octaves(4),
            noise_scale: 0.05,
            height_amplitude: 16,
            seed: 7,
            spawn,
            shutdown: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn far_spawn() -> GridBox {
        GridBox::new(Point3::new(1000, 1000, 1000), Point3::new(1002, 1002, 1002))
    }

    #[test]
    fn heights_are_ordered() {
        let context = context(far_spawn());
        for x in -10..10 {
            let heights = ColumnHeights::sample(&context, x, x * 3);
            assert!(heights.bottom < heights.mid && heights.mid < heights.top);
        }
    }

    #[test]
    fn boundary_columns_place_solids_above_mid() {
        let context = context(far_spawn());
        let heights = ColumnHeights::sample(&context, 3, -2);
        let task = ColumnGenerationTask::new(context.clone(), 3, -2, 100, true);

        let mut world = World::new();
        let placed = task.process().handle_result(&mut world);
        assert_eq!(placed as i32, heights.top - heights.mid);
        for (position, record) in world.blocks(BlockFilter::All) {
            assert!(record.solid);
            assert!(position.y >= heights.mid * BLOCK_SPACING);
        }
        assert_eq!(context.progress.load(Ordering::Relaxed), placed);
    }

    #[test]
    fn interior_columns_respect_quota_and_spawn() {
        let spawn = GridBox::new(Point3::new(-2, -1000, -2), Point3::new(2, 1000, 2));
        let context = context(spawn);
        let mut world = World::new();

        let blocked = ColumnGenerationTask::new(context.clone(), 0, 0, 5, false);
        assert_eq!(blocked.process().handle_result(&mut world), 0);

        let task = ColumnGenerationTask::new(context, 4, 0, 1, false);
        assert_eq!(task.process().handle_result(&mut world), 1);
        let (_, record) = world.blocks(BlockFilter::All)[0];
        assert!(!record.solid);
        assert_eq!(record.texture, TextureId::fluid());
    }

    #[test]
    fn shutdown_stops_the_column() {
        let context = context(far_spawn());
        context.shutdown.store(true, Ordering::Relaxed);
        let mut world = World::new();
        let task = ColumnGenerationTask::new(context, 1, 1, 10, true);
        assert_eq!(task.process().handle_result(&mut world), 0);
        assert!(world.is_empty());
    }
}
