//! Seed-and-grow placement.
//!
//! A batch picks a random free seed position inside the bounds, places it, then keeps
//! adding blocks next to the cluster (faces and edges) until the batch size is reached
//! or the cluster is enclosed. Growth skips candidates above and below most of the
//! time, which spreads clusters out into layers.

use log::{debug, warn};

use super::{GeneratorConfig, Placer};
use crate::engine_state::voxels::{
    block::{texture::TextureId, BlockRecord},
    position::{free_face_candidates, GridBox, Position, BLOCK_SPACING},
};

/// Places up to `budget` blocks in randomly sized clusters.
///
/// Batch sizes are drawn from `1..=skew * remaining`, where the skew is
/// `1 - batch_skew` for solids and `batch_skew` for fluids. A batch that places nothing
/// ends the phase.
///
/// # Returns
/// The number of blocks placed, never more than `budget`
pub fn place_batches(
    placer: &mut Placer<'_>,
    config: &GeneratorConfig,
    rng: &mut fastrand::Rng,
    bounds: GridBox,
    budget: usize,
    solid: bool,
) -> usize {
    let skew = if solid {
        1.0 - config.batch_skew
    } else {
        config.batch_skew
    };

    let mut remaining = budget;
    let mut batches = 0;
    while remaining > 0 && !placer.is_cancelled() {
        let max_batch = ((remaining as f64 * skew) as usize).clamp(1, remaining);
        let size = rng.usize(1..=max_batch);
        let placed = grow_cluster(placer, config, rng, bounds, size, solid);
        if placed == 0 {
            if !placer.is_cancelled() {
                warn!(
                    "Random placement starved with {} {} blocks left",
                    remaining,
                    if solid { "solid" } else { "fluid" }
                );
            }
            break;
        }
        remaining -= placed;
        batches += 1;
    }

    debug!(
        "Placed {} of {} {} blocks in {} batches",
        budget - remaining,
        budget,
        if solid { "solid" } else { "fluid" },
        batches
    );
    budget - remaining
}

/// Grows one cluster of at most `size` blocks.
///
/// # Returns
/// The number of blocks placed; zero if no free seed position was found within
/// `max_attempts` tries
pub fn grow_cluster(
    placer: &mut Placer<'_>,
    config: &GeneratorConfig,
    rng: &mut fastrand::Rng,
    bounds: GridBox,
    size: usize,
    solid: bool,
) -> usize {
    let record = if solid {
        BlockRecord::solid(TextureId::random_solid(rng))
    } else {
        BlockRecord::fluid(TextureId::fluid())
    };

    let Some(seed) = random_free_position(placer, rng, bounds, config.max_attempts) else {
        return 0;
    };
    if !placer.place(seed, record) {
        return 0;
    }

    let mut cluster = vec![seed];
    while cluster.len() < size && !placer.is_cancelled() {
        let Some(next) = next_candidate(placer, config, rng, bounds, &cluster) else {
            break;
        };
        if !placer.place(next, record) {
            break;
        }
        cluster.push(next);
    }
    cluster.len()
}

fn random_free_position(
    placer: &Placer<'_>,
    rng: &mut fastrand::Rng,
    bounds: GridBox,
    max_attempts: u32,
) -> Option<Position> {
    let axis = |rng: &mut fastrand::Rng, min: i32, max: i32| {
        rng.i32(min / BLOCK_SPACING..=max / BLOCK_SPACING) * BLOCK_SPACING
    };
    for _ in 0..max_attempts {
        if placer.is_cancelled() {
            return None;
        }
        let position = Position::new(
            axis(rng, bounds.min.x, bounds.max.x),
            axis(rng, bounds.min.y, bounds.max.y),
            axis(rng, bounds.min.z, bounds.max.z),
        );
        if placer.is_free(position) {
            return Some(position);
        }
    }
    None
}

/// Picks a free spot next to the cluster, starting from its newest block.
fn next_candidate(
    placer: &Placer<'_>,
    config: &GeneratorConfig,
    rng: &mut fastrand::Rng,
    bounds: GridBox,
    cluster: &[Position],
) -> Option<Position> {
    for member in cluster.iter().rev() {
        let candidates: Vec<Position> = free_face_candidates(*member)
            .filter(|candidate| bounds.contains(*candidate) && placer.is_free(*candidate))
            .collect();
        if candidates.is_empty() {
            continue;
        }

        let level: Vec<Position> = candidates
            .iter()
            .copied()
            .filter(|candidate| candidate.y == member.y)
            .collect();
        let pool = if !level.is_empty() && rng.f64() < config.vertical_exclusion {
            level
        } else {
            candidates
        };
        return Some(pool[rng.usize(..pool.len())]);
    }
    None
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use cgmath::Point3;

    use super::*;
    use crate::engine_state::voxels::world::{BlockFilter, World};

    fn bounds(half: i32) -> GridBox {
        GridBox::new(Point3::new(-half, -half, -half), Point3::new(half, half, half))
    }

    fn no_spawn() -> GridBox {
        GridBox::new(Point3::new(1000, 1000, 1000), Point3::new(1000, 1000, 1000))
    }

    #[test]
    fn cluster_reaches_requested_size() {
        let mut world = World::new();
        let (shutdown, progress) = (AtomicBool::new(false), AtomicUsize::new(0));
        let mut placer = Placer {
            world: &mut world,
            spawn: no_spawn(),
            shutdown: &shutdown,
            progress: &progress,
        };
        let mut rng = fastrand::Rng::with_seed(5);
        let config = GeneratorConfig::default();

        assert_eq!(grow_cluster(&mut placer, &config, &mut rng, bounds(20), 30, false), 30);
        assert_eq!(world.positions(BlockFilter::Fluid).len(), 30);
    }

    #[test]
    fn full_vertical_exclusion_keeps_the_cluster_flat() {
        let mut world = World::new();
        let (shutdown, progress) = (AtomicBool::new(false), AtomicUsize::new(0));
        let mut placer = Placer {
            world: &mut world,
            spawn: no_spawn(),
            shutdown: &shutdown,
            progress: &progress,
        };
        let mut rng = fastrand::Rng::with_seed(8);
        let config = GeneratorConfig {
            vertical_exclusion: 1.0,
            ..Default::default()
        };

        grow_cluster(&mut placer, &config, &mut rng, bounds(40), 25, true);
        let positions = world.positions(BlockFilter::Solid);
        assert_eq!(positions.len(), 25);
        assert!(positions.iter().all(|p| p.y == positions[0].y));
    }

    #[test]
    fn batches_stop_when_starved() {
        let mut world = World::new();
        let (shutdown, progress) = (AtomicBool::new(false), AtomicUsize::new(0));
        let mut placer = Placer {
            world: &mut world,
            spawn: no_spawn(),
            shutdown: &shutdown,
            progress: &progress,
        };
        let mut rng = fastrand::Rng::with_seed(1);
        let config = GeneratorConfig {
            max_attempts: 50,
            ..Default::default()
        };

        // A 3x3x3 box holds 27 positions.
        let placed = place_batches(&mut placer, &config, &mut rng, bounds(2), 100, true);
        assert!(placed <= 27);
        assert_eq!(world.len(), placed);
    }
}
