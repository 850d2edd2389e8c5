//! # Engine State Module
//!
//! The coordinator that ties the voxel core together.
//!
//! ## Key Components
//!
//! * `EngineState` - Owns the shared world, the optimizer and the observer
//! * `camera_state` - The observer the optimizer batches for
//! * `config` - Serde-backed engine configuration
//! * `persistence` - Level save and load
//! * `task_management` - Worker pool used by the generator
//! * `voxels` - Blocks, chunks, the world, the optimizer and the generator
//!
//! ## Locking
//!
//! The world and the optimizer each live behind one `MtResource`. Lock order is always
//! world first, then optimizer. A background generation holds the world lock for its
//! whole run; the fixed-step `update` only ever *tries* the world lock and skips the tick
//! when it is busy, so the update loop never blocks on generation.

use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use log::{error, info, warn};

use crate::core::MtResource;
use camera_state::Observer;
use config::EngineConfig;
use persistence::LevelError;
use voxels::{
    block::{block_side::FaceBits, texture::TextureId, BlockRecord, Rgba},
    chunk::ChunkId,
    environment::BlockEnvironment,
    generator::{GenerationError, GenerationReport, RandomLevelGenerator},
    position::{snap_point, Position},
    world::World,
};

pub mod camera_state;
pub mod config;
pub mod persistence;
pub mod task_management;
pub mod voxels;

type GenerationHandle = JoinHandle<Result<GenerationReport, GenerationError>>;

/// What a call to `EngineState::update` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The world was locked by someone else; nothing ran.
    Skipped,
    /// One slice of a sweep ran.
    Progressed,
    /// The slice completed a sweep and published new batches.
    SweepCompleted,
}

/// The main state container of the engine.
///
/// # Examples
///
/// ```no_run
/// use block_world::engine_state::{config::EngineConfig, EngineState, TickOutcome};
///
/// let mut engine = EngineState::new(EngineConfig::default());
/// engine.start_generation(10_000, 7);
/// while engine.is_generating() || engine.update() != TickOutcome::SweepCompleted {
///     if let Some(report) = engine.poll_generation() {
///         println!("{:?}", report);
///     }
/// }
/// ```
pub struct EngineState {
    pub config: EngineConfig,
    /// The voxel world, shared with the generation thread
    pub world: MtResource<World>,
    /// The render-batch optimizer
    pub environment: MtResource<BlockEnvironment>,
    /// The viewpoint batches are built for
    pub observer: Observer,
    /// Visible chunk queue of the sweep in progress
    visible_chunks: Vec<ChunkId>,
    shutdown: Arc<AtomicBool>,
    progress: Arc<AtomicUsize>,
    generation: Option<GenerationHandle>,
}

impl EngineState {
    pub fn new(config: EngineConfig) -> Self {
        let environment = BlockEnvironment::new(config.environment);
        EngineState {
            config,
            world: MtResource::new(World::new()),
            environment: MtResource::new(environment),
            observer: Observer::default(),
            visible_chunks: Vec::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(AtomicUsize::new(0)),
            generation: None,
        }
    }

    /// Starts generating `number_of_blocks` blocks on a background thread.
    ///
    /// # Returns
    /// `false` if a generation is already running
    pub fn start_generation(&mut self, number_of_blocks: usize, seed: u64) -> bool {
        if self.generation.is_some() {
            warn!("A generation is already running");
            return false;
        }

        self.shutdown.store(false, Ordering::Relaxed);
        let world = self.world.clone();
        let mut generator = RandomLevelGenerator::with_signals(
            self.config.generator.clone(),
            self.shutdown.clone(),
            self.progress.clone(),
        );

        self.generation = Some(thread::spawn(move || {
            let mut world = world.get_mut();
            generator.generate(&mut world, number_of_blocks, seed)
        }));
        true
    }

    pub fn is_generating(&self) -> bool {
        self.generation.is_some()
    }

    /// Blocks placed so far by the running generation.
    pub fn generation_progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }

    /// Collects the generation result once the background thread is done.
    ///
    /// # Returns
    /// `None` while the generation runs, or if none was started
    pub fn poll_generation(&mut self) -> Option<Result<GenerationReport, GenerationError>> {
        if !self.generation.as_ref()?.is_finished() {
            return None;
        }
        self.join_generation()
    }

    /// Blocks until the running generation (if any) is done.
    pub fn wait_for_generation(&mut self) -> Option<Result<GenerationReport, GenerationError>> {
        self.join_generation()
    }

    fn join_generation(&mut self) -> Option<Result<GenerationReport, GenerationError>> {
        let handle = self.generation.take()?;
        match handle.join() {
            Ok(result) => {
                if let Err(e) = &result {
                    warn!("Generation rejected: {}", e);
                }
                Some(result)
            }
            Err(_) => {
                error!("Generation thread panicked");
                None
            }
        }
    }

    /// Runs one fixed-step tick of the optimizer.
    ///
    /// The visible chunk queue and the observer's submerged flag are refreshed whenever
    /// a new sweep starts and kept for the rest of it.
    pub fn update(&mut self) -> TickOutcome {
        let Some(world) = self.world.try_get() else {
            return TickOutcome::Skipped;
        };
        let mut environment = self.environment.get_mut();

        if !environment.is_optimizing() {
            self.observer.submerged = self.observer.is_in_fluid(&world);
            self.visible_chunks = self
                .observer
                .visible_chunks(&world, self.config.view_radius_chunks);
        }
        if environment.optimize_by_control(&world, &self.visible_chunks, &self.observer) {
            TickOutcome::SweepCompleted
        } else {
            TickOutcome::Progressed
        }
    }

    pub fn set_observer(&mut self, observer: Observer) {
        self.observer = observer;
    }

    /// Places a block and publishes batches that include it right away.
    pub fn insert_block(
        &self,
        position: Position,
        texture: TextureId,
        color: Rgba,
        solid: bool,
    ) -> FaceBits {
        let position = snap_point(position);
        let mut world = self.world.get_mut();
        let mask = world.insert_block(position, texture, color, solid);
        self.publish_edit(&world, position);
        mask
    }

    /// Removes a block and publishes batches without it right away.
    pub fn remove_block(&self, position: Position) -> Option<BlockRecord> {
        let position = snap_point(position);
        let mut world = self.world.get_mut();
        let removed = world.remove_block(position);
        if removed.is_some() {
            self.publish_edit(&world, position);
        }
        removed
    }

    fn publish_edit(&self, world: &World, position: Position) {
        let mut environment = self.environment.get_mut();
        environment.apply_edit(world, position, &self.observer);
        environment.push();
    }

    pub fn query_occupancy(&self, position: Position) -> Option<BlockRecord> {
        self.world.get().query_occupancy(position).copied()
    }

    /// Saves the world; the format follows the file extension.
    pub fn save_level(&self, path: impl AsRef<Path>) -> Result<(), LevelError> {
        persistence::save_level_file(&self.world.get(), path)
    }

    /// Replaces the world with the level at `path`.
    ///
    /// The world and the optimizer are cleared first. A level without blocks loads as
    /// an empty world; any other error leaves the world empty. On success one full sweep
    /// is run and pulled into the working buffer so batches are available immediately.
    ///
    /// # Returns
    /// The number of blocks loaded
    pub fn load_level(&mut self, path: impl AsRef<Path>) -> Result<usize, LevelError> {
        let path = path.as_ref();
        let mut world = self.world.get_mut();
        let mut environment = self.environment.get_mut();
        world.clear();
        environment.clear();

        let blocks = match persistence::read_level_file(path) {
            Ok(blocks) => blocks,
            Err(LevelError::NoBlocks) => {
                info!("{} holds no blocks, starting empty", path.display());
                return Ok(0);
            }
            Err(e) => {
                error!("Failed to load {}: {}", path.display(), e);
                return Err(e);
            }
        };

        let count = persistence::restore(&mut world, blocks);
        self.visible_chunks = self
            .observer
            .visible_chunks(&world, self.config.view_radius_chunks);
        environment.optimize_all(&world, &self.visible_chunks, &self.observer);
        environment.pull();
        info!("Loaded {} blocks from {}", count, path.display());
        Ok(count)
    }

    /// Signals shutdown and waits for a running generation to stop.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(Ok(report)) = self.join_generation() {
            info!("Generation stopped at {} blocks", report.total);
        }
    }
}

impl Drop for EngineState {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Point3, Vector3};

    use super::*;
    use crate::engine_state::voxels::{environment::EnvironmentConfig, generator::GeneratorConfig};

    fn engine() -> EngineState {
        let mut engine = EngineState::new(EngineConfig {
            generator: GeneratorConfig {
                worker_threads: Some(2),
                ..Default::default()
            },
            environment: EnvironmentConfig {
                passes_per_call: 16,
                view_cone_deg: 90.0,
                ..Default::default()
            },
            ..Default::default()
        });
        engine.set_observer(Observer::new(
            Point3::new(0.0, 60.0, 60.0),
            Vector3::new(0.0, -1.0, -1.0),
        ));
        engine
    }

    #[test]
    fn update_skips_while_generation_holds_the_world() {
        let mut engine = engine();
        let world = engine.world.clone();
        let guard = world.get_mut();
        assert_eq!(engine.update(), TickOutcome::Skipped);
        drop(guard);
        assert_eq!(engine.update(), TickOutcome::Progressed);
    }

    #[test]
    fn background_generation_reports_its_result() {
        let mut engine = engine();
        assert!(engine.start_generation(300, 4));
        assert!(!engine.start_generation(10, 4));

        let report = engine.wait_for_generation().unwrap().unwrap();
        assert_eq!(report.total, engine.world.get().len());
        assert_eq!(engine.generation_progress(), report.total);
        assert!(!engine.is_generating());

        let outcomes: Vec<TickOutcome> = (0..4).map(|_| engine.update()).collect();
        assert_eq!(outcomes[3], TickOutcome::SweepCompleted);
        assert!(engine.environment.get().is_fully_optimized());
    }

    #[test]
    fn editor_operations_publish_immediately() {
        let engine = engine();
        let stone = TextureId::new("stone").unwrap();
        engine.insert_block(Point3::new(0, 0, 0), stone, [1.0; 4], true);
        assert!(engine.query_occupancy(Point3::new(0, 0, 0)).is_some());
        assert!(!engine.environment.get().is_fully_optimized());

        assert!(engine.remove_block(Point3::new(0, 0, 0)).is_some());
        assert!(engine.remove_block(Point3::new(0, 0, 0)).is_none());
        assert!(engine.world.get().is_empty());
    }

    #[test]
    fn edit_after_a_mid_sweep_tick_is_published_with_the_last_sweep() {
        let mut engine = engine();
        let stone = TextureId::new("stone").unwrap();
        {
            let mut world = engine.world.get_mut();
            for x in 0..10 {
                world.insert_block(Point3::new(x * 2, 0, 0), stone, [1.0; 4], true);
            }
        }
        while engine.update() != TickOutcome::SweepCompleted {}
        assert_eq!(engine.environment.get().optimized_block_count(), 10);

        assert_eq!(engine.update(), TickOutcome::Progressed);
        engine.insert_block(Point3::new(0, 0, 4), stone, [1.0; 4], true);
        {
            let environment = engine.environment.get();
            assert_eq!(environment.optimized_block_count(), 11);
            assert!(environment
                .optimized_tuples()
                .iter()
                .any(|tuple| tuple.contains(Point3::new(0, 0, 4))));
        }

        engine.remove_block(Point3::new(0, 0, 0));
        let environment = engine.environment.get();
        assert_eq!(environment.optimized_block_count(), 10);
        let world = engine.world.get();
        for tuple in environment.optimized_tuples() {
            assert!(!tuple.contains(Point3::new(0, 0, 0)));
            for position in tuple.blocks() {
                let record = world.query_occupancy(*position).unwrap();
                assert_eq!(tuple.face_bits(), record.visible_faces());
            }
        }
    }

    #[test]
    fn failed_load_leaves_the_world_empty() {
        let mut engine = engine();
        let stone = TextureId::new("stone").unwrap();
        engine.insert_block(Point3::new(0, 0, 0), stone, [1.0; 4], true);

        let path = std::env::temp_dir().join("block-world-missing-level.json");
        assert!(matches!(engine.load_level(&path), Err(LevelError::Io(_))));
        assert!(engine.world.get().is_empty());
    }
}
