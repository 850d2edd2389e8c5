//! Fluid sealing.
//!
//! Closes the open faces of fluid blocks with solids so no fluid has an exposed side.
//! The top face is only closed some of the time, which leaves visible fluid surfaces.

use log::debug;

use super::Placer;
use crate::engine_state::voxels::{
    block::{block_side::BlockSide, texture::TextureId, BlockRecord},
    position::neighbor,
    world::{BlockFilter, World},
};

/// The number of solids sealing would need if no top face were closed.
pub fn sealing_demand(world: &World) -> usize {
    world
        .index()
        .iter()
        .filter(|(_, record)| !record.solid)
        .map(|(_, record)| {
            let mut open = record.visible_faces();
            open.remove(BlockSide::TOP);
            open.count() as usize
        })
        .sum()
}

/// Seals every fluid block, in grid order, until `budget` solids are used.
///
/// # Arguments
/// * `placer` - Placement rules and the target world
/// * `budget` - Maximum number of solids to place
/// * `rng` - Source for the top-face decision and the seal textures
/// * `top_seal_chance` - Probability that an open top face is closed
///
/// # Returns
/// The number of solids placed
pub fn seal_fluids(
    placer: &mut Placer<'_>,
    budget: usize,
    rng: &mut fastrand::Rng,
    top_seal_chance: f64,
) -> usize {
    let mut sealed = 0;
    let fluids = placer.world.positions(BlockFilter::Fluid);

    'fluids: for fluid in &fluids {
        for side in BlockSide::all() {
            if sealed >= budget || placer.is_cancelled() {
                break 'fluids;
            }
            let target = neighbor(*fluid, side);
            if !placer.is_free(target) {
                continue;
            }
            if side == BlockSide::TOP && rng.f64() >= top_seal_chance {
                continue;
            }
            if placer.place(target, BlockRecord::solid(TextureId::random_solid(rng))) {
                sealed += 1;
            }
        }
    }

    debug!(
        "Sealed {} fluid faces across {} fluid blocks",
        sealed,
        fluids.len()
    );
    sealed
}
