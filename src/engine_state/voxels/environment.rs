//! # Block Environment
//!
//! The incremental render-batch optimizer. It harvests the tuples of the visible chunks
//! into two alternating buffers:
//! - **working**: the buffer the current sweep writes into
//! - **optimized**: the output of the last complete sweep, read by the renderer
//!
//! ## Sweeps
//!
//! A sweep visits all 64 face masks. Each call to `optimize_by_control` handles a fixed
//! number of them (`passes_per_call`, a power of two), so a sweep completes every
//! `64 / passes_per_call` calls and per-call cost stays bounded. The working buffer is
//! cleared when a sweep starts and the buffers are swapped when the cursor wraps.
//!
//! Two visibility filters are applied while harvesting:
//! 1. a coarse facing mask computed once per call; a face mask with no bit in it is
//!    skipped entirely
//! 2. a per-block view-cone test against the observer
//!
//! ## Buffer Ownership
//!
//! The buffers live in a two-slot array and `optimized` indexes the readable one, so a
//! swap is an index flip plus a generation bump. Whole lists change hands, never single
//! blocks. `swap` refuses to run while a sweep is in progress.
//!
//! Editor changes cannot wait for the next sweep: `apply_edit` patches the working
//! buffer, seeded from the published batches, and `push` publishes it right away.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{
    block::block_side::{BlockSide, FaceBits},
    chunk::{
        tuple::{Tuple, TupleKey},
        ChunkId,
    },
    position::{neighbor, Position},
    world::World,
};
use crate::engine_state::camera_state::Observer;

/// Upper bound for `passes_per_call`: one call per sweep.
pub const NUM_OF_PASSES_MAX: u8 = FaceBits::COMBINATIONS;

/// Tunables for the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Face masks handled per call. Normalised to a power of two in 1..=64.
    pub passes_per_call: u8,
    /// Facing tolerance in degrees when the observer is above the surface.
    pub surface_tolerance_deg: f32,
    /// Facing tolerance in degrees when the observer is submerged.
    pub submerged_tolerance_deg: f32,
    /// Half-angle of the view cone in degrees.
    pub view_cone_deg: f32,
    /// Blocks closer than this are visible regardless of the view cone.
    pub near_distance: f32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            passes_per_call: 8,
            surface_tolerance_deg: 30.0,
            submerged_tolerance_deg: 45.0,
            view_cone_deg: 70.0,
            near_distance: 8.0,
        }
    }
}

impl EnvironmentConfig {
    /// Rounds `passes_per_call` down to a power of two in 1..=64.
    pub fn normalized(mut self) -> Self {
        let requested = self.passes_per_call;
        let clamped = requested.clamp(1, NUM_OF_PASSES_MAX);
        let passes = 1u8 << (7 - clamped.leading_zeros());
        if passes != requested {
            warn!(
                "passes_per_call {} is not a power of two in 1..={}, using {}",
                requested, NUM_OF_PASSES_MAX, passes
            );
        }
        self.passes_per_call = passes;
        self
    }
}

/// Where the optimizer is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    /// No sweep running and no complete sweep published since the last push, pull or
    /// clear.
    Idle,
    /// A sweep is in progress; the cursor is the next face mask to visit.
    Optimizing { face_bits_cursor: u8 },
    /// The optimized buffer holds the output of a complete sweep.
    FullyOptimized,
}

/// The two visibility filters of one call, derived from the observer.
struct ViewFilter {
    /// Coarse filter: face masks without a bit in here are skipped.
    facing: FaceBits,
    cone_cos: f32,
    near: f32,
}

impl ViewFilter {
    fn new(config: &EnvironmentConfig, observer: &Observer) -> Self {
        let tolerance = if observer.submerged {
            config.submerged_tolerance_deg
        } else {
            config.surface_tolerance_deg
        };
        ViewFilter {
            facing: observer.facing_mask(tolerance),
            cone_cos: config.view_cone_deg.to_radians().cos(),
            near: config.near_distance,
        }
    }

    fn can_see(&self, observer: &Observer, position: Position) -> bool {
        observer.can_see(position, self.cone_cos, self.near)
    }
}

/// Double-buffered render batches for the visible part of the world.
#[derive(Debug, Clone)]
pub struct BlockEnvironment {
    config: EnvironmentConfig,
    buffers: [Vec<Tuple>; 2],
    optimized: usize,
    generation: u64,
    last_face_bits: u8,
    optimizing: bool,
    fully_optimized: bool,
}

impl Default for BlockEnvironment {
    fn default() -> Self {
        Self::new(EnvironmentConfig::default())
    }
}

impl BlockEnvironment {
    pub fn new(config: EnvironmentConfig) -> Self {
        BlockEnvironment {
            config: config.normalized(),
            buffers: [Vec::new(), Vec::new()],
            optimized: 0,
            generation: 0,
            last_face_bits: 0,
            optimizing: false,
            fully_optimized: false,
        }
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    fn working_index(&self) -> usize {
        1 - self.optimized
    }

    /// Runs one bounded slice of a sweep.
    ///
    /// # Arguments
    /// * `world` - The world to harvest tuples from
    /// * `visible` - The visible chunk queue, nearest first
    /// * `observer` - The viewpoint used by both visibility filters
    ///
    /// # Returns
    /// `true` if this call completed a sweep and published it
    pub fn optimize_by_control(
        &mut self,
        world: &World,
        visible: &[ChunkId],
        observer: &Observer,
    ) -> bool {
        if self.last_face_bits == 0 {
            let working = self.working_index();
            self.buffers[working].clear();
            self.optimizing = true;
        }

        let filter = ViewFilter::new(&self.config, observer);

        let start = self.last_face_bits;
        let end = start + self.config.passes_per_call;
        let mut harvested = 0;

        for bits in start..end {
            let face_bits = FaceBits::from_bits(bits);
            if !face_bits.intersects(filter.facing) {
                continue;
            }
            for texture in world.textures() {
                let blocks: Vec<_> = visible
                    .iter()
                    .filter_map(|chunk| world.partition().get_tuple(*chunk, texture, face_bits))
                    .flat_map(|tuple| tuple.blocks().iter().copied())
                    .filter(|position| filter.can_see(observer, *position))
                    .collect();
                if blocks.is_empty() {
                    continue;
                }
                harvested += blocks.len();
                self.merge_into_working(TupleKey::new(texture, face_bits), blocks);
            }
        }

        self.last_face_bits = end % FaceBits::COMBINATIONS;
        debug!(
            "Optimized face masks {}..{}: {} blocks harvested, cursor now {}",
            start, end, harvested, self.last_face_bits
        );

        if self.last_face_bits == 0 {
            self.optimizing = false;
            return self.swap();
        }
        false
    }

    /// Runs calls until the current sweep completes.
    pub fn optimize_all(&mut self, world: &World, visible: &[ChunkId], observer: &Observer) {
        while !self.optimize_by_control(world, visible, observer) {}
    }

    fn merge_into_working(&mut self, key: TupleKey, blocks: Vec<Position>) {
        let working = &mut self.buffers[1 - self.optimized];
        let slot = match working.binary_search_by_key(&key, Tuple::key) {
            Ok(slot) => slot,
            Err(slot) => {
                working.insert(slot, Tuple::new(key));
                slot
            }
        };
        let tuple = &mut working[slot];
        tuple.extend(blocks);
        tuple.sort_blocks();
    }

    /// Publishes the working buffer.
    ///
    /// # Returns
    /// `false` without touching the buffers if a sweep is in progress
    pub fn swap(&mut self) -> bool {
        if self.optimizing {
            warn!("Refusing to swap buffers in the middle of a sweep");
            return false;
        }
        self.optimized = self.working_index();
        self.generation += 1;
        self.fully_optimized = true;
        info!(
            "Sweep {} published: {} tuples, {} blocks",
            self.generation,
            self.optimized_tuples().len(),
            self.optimized_block_count()
        );
        true
    }

    /// Brings the working buffer up to date with an edit at `position`.
    ///
    /// The working buffer is reseeded from the last published batches and any sweep in
    /// progress is dropped, so the next call to `optimize_by_control` starts a fresh one.
    /// The edited block and its six face neighbors are then taken out of their old
    /// tuples and filed again under their current keys, if they still exist and pass
    /// both visibility filters. Follow with `push` to publish the result.
    pub fn apply_edit(&mut self, world: &World, position: Position, observer: &Observer) {
        if self.optimizing {
            debug!(
                "Edit at {:?} drops the sweep at face mask {}",
                position, self.last_face_bits
            );
        }
        let seed = self.buffers[self.optimized].clone();
        let working = self.working_index();
        self.buffers[working] = seed;
        self.last_face_bits = 0;
        self.optimizing = false;

        let filter = ViewFilter::new(&self.config, observer);
        let affected: Vec<Position> = std::iter::once(position)
            .chain(BlockSide::all().into_iter().map(|side| neighbor(position, side)))
            .collect();

        let buffer = &mut self.buffers[working];
        for tuple in buffer.iter_mut() {
            let mut removed = false;
            for block in &affected {
                removed |= tuple.remove(*block);
            }
            if removed {
                tuple.sort_blocks();
            }
        }
        buffer.retain(|tuple| !tuple.is_empty());

        for block in affected {
            let Some(record) = world.query_occupancy(block) else {
                continue;
            };
            let face_bits = record.visible_faces();
            if face_bits.intersects(filter.facing) && filter.can_see(observer, block) {
                self.merge_into_working(TupleKey::new(record.texture, face_bits), vec![block]);
            }
        }
    }

    /// Overwrites the optimized buffer with a copy of the working buffer.
    pub fn push(&mut self) {
        let working = self.buffers[self.working_index()].clone();
        self.buffers[self.optimized] = working;
        self.fully_optimized = false;
    }

    /// Copies optimized tuples whose key is missing from the working buffer into it.
    pub fn pull(&mut self) {
        let optimized = self.optimized;
        let [first, second] = &mut self.buffers;
        let (source, working) = if optimized == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        };

        for tuple in source {
            if let Err(slot) = working.binary_search_by_key(&tuple.key(), Tuple::key) {
                working.insert(slot, tuple.clone());
            }
        }
        self.fully_optimized = false;
    }

    /// Empties both buffers and restarts the sweep.
    pub fn clear(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clear();
        }
        self.last_face_bits = 0;
        self.optimizing = false;
        self.fully_optimized = false;
    }

    /// The render-consumable batches, sorted by texture then face mask.
    pub fn optimized_tuples(&self) -> &[Tuple] {
        &self.buffers[self.optimized]
    }

    pub fn working_tuples(&self) -> &[Tuple] {
        &self.buffers[self.working_index()]
    }

    pub fn optimized_block_count(&self) -> usize {
        self.optimized_tuples().iter().map(Tuple::len).sum()
    }

    pub fn is_fully_optimized(&self) -> bool {
        self.fully_optimized
    }

    pub fn is_optimizing(&self) -> bool {
        self.optimizing
    }

    /// Number of sweeps published so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> OptimizerState {
        if self.optimizing {
            OptimizerState::Optimizing {
                face_bits_cursor: self.last_face_bits,
            }
        } else if self.fully_optimized {
            OptimizerState::FullyOptimized
        } else {
            OptimizerState::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Point3, Vector3};

    use super::*;
    use crate::engine_state::voxels::block::texture::TextureId;

    fn scene() -> (World, Vec<ChunkId>, Observer) {
        let mut world = World::new();
        let stone = TextureId::new("stone").unwrap();
        let water = TextureId::new("water").unwrap();
        for x in 0..4 {
            world.insert_block(Point3::new(x * 2, 0, 0), stone, [0.5; 4], true);
            world.insert_block(Point3::new(x * 2, 2, 0), water, [0.2; 4], false);
        }
        world.insert_block(Point3::new(40, 0, 0), stone, [0.5; 4], true);

        let observer = Observer::new(Point3::new(4.0, 4.0, 30.0), Vector3::new(0.0, 0.0, -1.0));
        let visible = observer.visible_chunks(&world, 2);
        (world, visible, observer)
    }

    fn config(passes: u8) -> EnvironmentConfig {
        EnvironmentConfig {
            passes_per_call: passes,
            ..Default::default()
        }
    }

    #[test]
    fn sweep_publishes_on_the_last_call() {
        let (world, visible, observer) = scene();
        let mut environment = BlockEnvironment::new(config(8));

        for call in 1..=7 {
            assert!(!environment.optimize_by_control(&world, &visible, &observer));
            assert!(environment.optimized_tuples().is_empty(), "call {}", call);
            assert_eq!(
                environment.state(),
                OptimizerState::Optimizing {
                    face_bits_cursor: call * 8
                }
            );
        }
        assert!(environment.optimize_by_control(&world, &visible, &observer));
        assert_eq!(environment.state(), OptimizerState::FullyOptimized);
        assert_eq!(environment.generation(), 1);
        assert_eq!(environment.optimized_block_count(), world.len());
    }

    #[test]
    fn repeated_sweeps_are_stable() {
        let (world, visible, observer) = scene();
        let mut environment = BlockEnvironment::new(config(16));
        environment.optimize_all(&world, &visible, &observer);
        let first = environment.optimized_tuples().to_vec();

        for _ in 0..3 {
            environment.optimize_all(&world, &visible, &observer);
            assert_eq!(environment.optimized_tuples(), first.as_slice());
        }
        assert_eq!(environment.generation(), 4);

        let keys: Vec<TupleKey> = first.iter().map(Tuple::key).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn blocks_behind_the_observer_are_left_out() {
        let (world, visible, _) = scene();
        let observer = Observer::new(Point3::new(4.0, 4.0, 30.0), Vector3::new(0.0, 0.0, 1.0));
        let mut environment = BlockEnvironment::new(config(64));
        environment.optimize_all(&world, &visible, &observer);
        assert_eq!(environment.optimized_block_count(), 0);
    }

    #[test]
    fn swap_is_refused_mid_sweep() {
        let (world, visible, observer) = scene();
        let mut environment = BlockEnvironment::new(config(4));
        environment.optimize_by_control(&world, &visible, &observer);
        assert!(environment.is_optimizing());
        assert!(!environment.swap());
        assert_eq!(environment.generation(), 0);
    }

    #[test]
    fn push_publishes_partial_work() {
        let (world, visible, observer) = scene();
        let mut environment = BlockEnvironment::new(config(32));
        environment.optimize_by_control(&world, &visible, &observer);
        environment.push();
        assert_eq!(environment.optimized_tuples(), environment.working_tuples());
        assert!(!environment.is_fully_optimized());
    }

    #[test]
    fn pull_seeds_working_from_optimized() {
        let (world, visible, observer) = scene();
        let mut environment = BlockEnvironment::new(config(64));
        environment.optimize_all(&world, &visible, &observer);
        assert!(environment.working_tuples().is_empty());

        environment.pull();
        assert_eq!(environment.working_tuples(), environment.optimized_tuples());
        assert_eq!(environment.state(), OptimizerState::Idle);
    }

    #[test]
    fn clear_resets_everything() {
        let (world, visible, observer) = scene();
        let mut environment = BlockEnvironment::new(config(8));
        environment.optimize_all(&world, &visible, &observer);
        environment.optimize_by_control(&world, &visible, &observer);

        environment.clear();
        assert!(environment.optimized_tuples().is_empty());
        assert!(environment.working_tuples().is_empty());
        assert_eq!(environment.state(), OptimizerState::Idle);
    }

    #[test]
    fn edit_mid_sweep_republishes_the_last_sweep_with_the_edit() {
        let (mut world, visible, observer) = scene();
        let mut environment = BlockEnvironment::new(config(8));
        environment.optimize_all(&world, &visible, &observer);
        environment.optimize_by_control(&world, &visible, &observer);
        assert!(environment.is_optimizing());

        let stone = TextureId::new("stone").unwrap();
        world.insert_block(Point3::new(0, 4, 0), stone, [0.5; 4], true);
        environment.apply_edit(&world, Point3::new(0, 4, 0), &observer);
        environment.push();

        assert!(!environment.is_optimizing());
        assert_eq!(environment.optimized_block_count(), world.len());
        for position in [Point3::new(0, 4, 0), Point3::new(0, 2, 0)] {
            let record = world.query_occupancy(position).unwrap();
            let tuple = environment
                .optimized_tuples()
                .iter()
                .find(|tuple| tuple.contains(position))
                .unwrap();
            assert_eq!(tuple.key(), TupleKey::new(record.texture, record.visible_faces()));
        }

        world.remove_block(Point3::new(40, 0, 0));
        environment.apply_edit(&world, Point3::new(40, 0, 0), &observer);
        environment.push();
        assert_eq!(environment.optimized_block_count(), world.len());
        assert!(environment
            .optimized_tuples()
            .iter()
            .all(|tuple| !tuple.contains(Point3::new(40, 0, 0)) && !tuple.is_empty()));

        // The dropped sweep restarts and converges to the same batches.
        let published = environment.optimized_tuples().to_vec();
        environment.optimize_all(&world, &visible, &observer);
        assert_eq!(environment.optimized_tuples(), published.as_slice());
    }

    #[test]
    fn submerged_observer_uses_the_wider_tolerance() {
        let mut world = World::new();
        let stone = TextureId::new("stone").unwrap();
        // Covered on every side except RIGHT and BOTTOM.
        for position in [
            Point3::new(0, 0, 0),
            Point3::new(-2, 0, 0),
            Point3::new(0, 2, 0),
            Point3::new(0, 0, -2),
            Point3::new(0, 0, 2),
        ] {
            world.insert_block(position, stone, [0.5; 4], true);
        }

        // RIGHT is 53 degrees off the view direction: outside 30, inside 45.
        let surface = Observer::new(Point3::new(-24.0, 32.0, 0.0), Vector3::new(0.6, -0.8, 0.0));
        let submerged = surface.with_submerged(true);
        let visible = surface.visible_chunks(&world, 2);

        let mut environment = BlockEnvironment::new(config(64));
        environment.optimize_all(&world, &visible, &surface);
        let above = environment.optimized_block_count();
        environment.optimize_all(&world, &visible, &submerged);
        let below = environment.optimized_block_count();

        assert_eq!(above, 4);
        assert_eq!(below, 5);
    }

    #[test]
    fn pass_counts_are_normalised() {
        assert_eq!(config(10).normalized().passes_per_call, 8);
        assert_eq!(config(0).normalized().passes_per_call, 1);
        assert_eq!(config(200).normalized().passes_per_call, 64);
        assert_eq!(config(16).normalized().passes_per_call, 16);
    }
}
