//! # Random Level Generator
//!
//! Populates a `World` with a requested number of blocks in three ordered phases:
//!
//! 1. **Noise phase** (`1 - random_fraction` of the budget): a square of columns around
//!    the origin, each filled by a `ColumnGenerationTask` on the worker pool. Boundary
//!    columns become solid walls above their mid height, interior columns become fluid
//!    below it.
//! 2. **Random phase** (the rest): seed-and-grow clusters of fluid, then of solid,
//!    with randomized batch sizes. See [`random_phase`].
//! 3. **Sealing phase**: free faces of every fluid block are closed with solids drawn
//!    from the budget held back for it, at most `sealing_share` of the random solids.
//!    See [`sealing`].
//!
//! Whatever the sealing phase leaves unused is spent on more solid clusters, so an
//! uncancelled run that does not starve places exactly the requested count.
//!
//! ## Failure Model
//!
//! Only a request that would push the world over `max_blocks` is an error, and it is
//! rejected before anything is placed. Starvation and cancellation shorten the run and
//! show up in the returned `GenerationReport`.
//!
//! ## Concurrency
//!
//! `generate` takes the world by `&mut`: the caller holds the single world lock for the
//! whole run. Workers only compute column contents; results are inserted on the calling
//! thread, so columns never race even though they share the index. Finished columns are
//! drained while the rest are still being published.

pub mod random_phase;
pub mod sealing;

use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use cgmath::Point3;
use log::{info, warn};
use noise::{Fbm, MultiFractal, Perlin};
use serde::{Deserialize, Serialize};

use super::{
    block::BlockRecord,
    position::{GridBox, Position, BLOCK_SPACING},
    tasks::column_generation_task::{ColumnContext, ColumnGenerationTask},
    world::{BlockFilter, World},
};
use crate::engine_state::task_management::TaskManager;

/// Tunables for the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Share of the budget left to the random phase.
    pub random_fraction: f64,
    /// Batch size skew: fluid batches are bounded by `batch_skew` of the remaining
    /// fluid budget, solid batches by `1 - batch_skew` of the remaining solid budget.
    pub batch_skew: f64,
    /// Share of the random-phase budget placed as fluid.
    pub fluid_fraction: f64,
    /// Attempts at finding a free seed position before a batch gives up.
    pub max_attempts: u32,
    /// Upper bound on the number of blocks in the world.
    pub max_blocks: usize,
    /// Chance that the sealing phase closes the top face of a fluid block.
    pub top_seal_chance: f64,
    /// Largest share of the random-phase solid budget held back for sealing.
    pub sealing_share: f64,
    /// Chance that cluster growth ignores candidates above and below.
    pub vertical_exclusion: f64,
    /// Target blocks per noise column.
    pub column_blocks: usize,
    /// Maximum height deviation of the terrain, in blocks.
    pub height_amplitude: i32,
    /// Noise input units per block.
    pub noise_scale: f64,
    pub octaves: usize,
    pub lacunarity: f64,
    pub persistence: f64,
    /// Corners of the spawn volume in world coordinates; nothing is generated inside.
    pub spawn_min: [i32; 3],
    pub spawn_max: [i32; 3],
    /// Worker count for the noise phase; the number of logical cores when `None`.
    pub worker_threads: Option<usize>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            random_fraction: 0.16,
            batch_skew: 0.67,
            fluid_fraction: 0.25,
            max_attempts: 1000,
            max_blocks: 4_000_000,
            top_seal_chance: 0.25,
            sealing_share: 0.5,
            vertical_exclusion: 2.0 / 3.0,
            column_blocks: 8,
            height_amplitude: 16,
            noise_scale: 0.05,
            octaves: 16,
            lacunarity: 2.0,
            persistence: 0.5,
            spawn_min: [-2, -2, -2],
            spawn_max: [2, 2, 2],
            worker_threads: None,
        }
    }
}

impl GeneratorConfig {
    pub fn spawn(&self) -> GridBox {
        GridBox::new(Point3::from(self.spawn_min), Point3::from(self.spawn_max))
    }
}

/// Errors that reject a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The world would exceed the block cap.
    TooManyBlocks {
        requested: usize,
        existing: usize,
        max: usize,
    },
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::TooManyBlocks {
                requested,
                existing,
                max,
            } => write!(
                f,
                "Cannot generate {} blocks: world already holds {} of at most {}",
                requested, existing, max
            ),
        }
    }
}

impl Error for GenerationError {}

/// What a generation run placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub requested: usize,
    pub noise: usize,
    pub random: usize,
    pub sealed: usize,
    pub total: usize,
    /// Whether the run stopped because shutdown was signalled.
    pub cancelled: bool,
}

/// Single-threaded placement shared by the random and sealing phases.
///
/// Every placement checks the shutdown flag, the spawn volume and occupancy, and bumps
/// the progress counter on success.
pub struct Placer<'a> {
    pub world: &'a mut World,
    pub spawn: GridBox,
    pub shutdown: &'a AtomicBool,
    pub progress: &'a AtomicUsize,
}

impl Placer<'_> {
    pub fn is_cancelled(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Whether a block may go at `position`.
    pub fn is_free(&self, position: Position) -> bool {
        !self.spawn.contains(position) && !self.world.is_populated(position, false)
    }

    /// Places `record` if the position is legal and shutdown has not been signalled.
    pub fn place(&mut self, position: Position, record: BlockRecord) -> bool {
        if self.is_cancelled() || !self.is_free(position) {
            return false;
        }
        self.world.insert(position, record);
        self.progress.fetch_add(1, Ordering::Relaxed);
        true
    }
}

/// Procedural population engine.
pub struct RandomLevelGenerator {
    config: GeneratorConfig,
    shutdown: Arc<AtomicBool>,
    progress: Arc<AtomicUsize>,
}

impl RandomLevelGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self::with_signals(
            config,
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicUsize::new(0)),
        )
    }

    /// Creates a generator observing an existing shutdown flag and progress counter.
    pub fn with_signals(
        config: GeneratorConfig,
        shutdown: Arc<AtomicBool>,
        progress: Arc<AtomicUsize>,
    ) -> Self {
        RandomLevelGenerator {
            config,
            shutdown,
            progress,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// The flag that cancels a running generation when set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// The counter of blocks placed by the current run.
    pub fn progress_handle(&self) -> Arc<AtomicUsize> {
        self.progress.clone()
    }

    /// Adds up to `number_of_blocks` blocks to `world`.
    ///
    /// # Arguments
    /// * `world` - The world to populate; held exclusively for the whole run
    /// * `number_of_blocks` - The block budget N
    /// * `seed` - Seed for the noise function and every random choice
    ///
    /// # Returns
    /// A report of the blocks placed per phase. The total is N unless the run starved
    /// or was cancelled.
    ///
    /// # Errors
    /// `GenerationError::TooManyBlocks` if the world could end up above the block cap;
    /// nothing is placed in that case.
    pub fn generate(
        &mut self,
        world: &mut World,
        number_of_blocks: usize,
        seed: u64,
    ) -> Result<GenerationReport, GenerationError> {
        let existing = world.len();
        if number_of_blocks > self.config.max_blocks.saturating_sub(existing) {
            return Err(GenerationError::TooManyBlocks {
                requested: number_of_blocks,
                existing,
                max: self.config.max_blocks,
            });
        }

        self.progress.store(0, Ordering::Relaxed);
        let mut report = GenerationReport {
            requested: number_of_blocks,
            ..Default::default()
        };
        if number_of_blocks == 0 {
            return Ok(report);
        }

        let noise_budget =
            ((1.0 - self.config.random_fraction) * number_of_blocks as f64).round() as usize;
        let noise_budget = noise_budget.min(number_of_blocks);
        let side = self.columns_per_side(noise_budget);

        info!(
            "Generating {} blocks (seed {}): noise phase over {}x{} columns",
            number_of_blocks, seed, side, side
        );
        report.noise = self.noise_phase(world, noise_budget, side, seed);

        let mut rng = fastrand::Rng::with_seed(seed);
        let bounds = self.random_bounds(side);
        let spawn = self.config.spawn();
        let mut placer = Placer {
            world,
            spawn,
            shutdown: &self.shutdown,
            progress: &self.progress,
        };

        let remaining = number_of_blocks - report.noise;
        let fluid_budget = (remaining as f64 * self.config.fluid_fraction).round() as usize;
        let solid_budget = remaining - fluid_budget;

        report.random +=
            random_phase::place_batches(&mut placer, &self.config, &mut rng, bounds, fluid_budget, false);

        let reserve_cap =
            (solid_budget as f64 * self.config.sealing_share.clamp(0.0, 1.0)).round() as usize;
        let reserve = sealing::sealing_demand(placer.world).min(reserve_cap);
        report.random += random_phase::place_batches(
            &mut placer,
            &self.config,
            &mut rng,
            bounds,
            solid_budget - reserve,
            true,
        );

        let placed = report.noise + report.random;
        report.sealed = sealing::seal_fluids(
            &mut placer,
            number_of_blocks - placed,
            &mut rng,
            self.config.top_seal_chance,
        );

        let leftover = number_of_blocks - placed - report.sealed;
        if leftover > 0 {
            report.random +=
                random_phase::place_batches(&mut placer, &self.config, &mut rng, bounds, leftover, true);
        }

        report.total = report.noise + report.random + report.sealed;
        report.cancelled = placer.is_cancelled();
        if report.cancelled {
            info!("Generation cancelled after {} blocks", report.total);
        } else if report.total < number_of_blocks {
            warn!(
                "Generation starved: placed {} of {} blocks",
                report.total, number_of_blocks
            );
        }
        info!(
            "Generated {} blocks (noise {}, random {}, sealing {}), {} fluid",
            report.total,
            report.noise,
            report.random,
            report.sealed,
            placer.world.positions(BlockFilter::Fluid).len()
        );
        Ok(report)
    }

    fn columns_per_side(&self, noise_budget: usize) -> i32 {
        let per_column = self.config.column_blocks.max(1) as f64;
        ((noise_budget as f64 / per_column).sqrt().ceil() as i32).max(1)
    }

    /// The box random placement draws seeds from: the noise square plus a margin,
    /// and the full terrain height.
    fn random_bounds(&self, side: i32) -> GridBox {
        let half = (side / 2 + 2) * BLOCK_SPACING;
        let height = (self.config.height_amplitude + 2) * BLOCK_SPACING;
        GridBox::new(
            Point3::new(-half, -height, -half),
            Point3::new(half, height, half),
        )
    }

    fn noise_phase(&self, world: &mut World, budget: usize, side: i32, seed: u64) -> usize {
        if budget == 0 || self.shutdown.load(Ordering::Relaxed) {
            return 0;
        }

        let noise = Fbm::<Perlin>::new(seed as u32)
            .set_octaves(self.config.octaves)
            .set_lacunarity(self.config.lacunarity)
            .set_persistence(self.config.persistence);
        let context = Arc::new(ColumnContext {
            noise,
            noise_scale: self.config.noise_scale,
            height_amplitude: self.config.height_amplitude,
            seed,
            spawn: self.config.spawn(),
            shutdown: self.shutdown.clone(),
            progress: self.progress.clone(),
        });

        let mut task_manager = match self.config.worker_threads {
            Some(workers) => TaskManager::new(workers),
            None => TaskManager::with_available_parallelism(),
        };

        let columns = (side * side) as usize;
        let base_quota = budget / columns;
        let extra = budget % columns;
        let mut placed = 0;
        for index in 0..columns {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            let (cx, cz) = ((index as i32) % side, (index as i32) / side);
            let boundary = cx == 0 || cz == 0 || cx == side - 1 || cz == side - 1;
            let quota = base_quota + usize::from(index < extra);
            if quota == 0 {
                continue;
            }
            task_manager.publish_task(Box::new(ColumnGenerationTask::new(
                context.clone(),
                cx - side / 2,
                cz - side / 2,
                quota,
                boundary,
            )));
            placed += task_manager.process_completed_tasks(world);
        }

        placed += task_manager.wait_for_completion(world);
        info!("Noise phase placed {} of {} blocks", placed, budget);
        placed
    }
}
