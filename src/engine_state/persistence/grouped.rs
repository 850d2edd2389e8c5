//! Texture-grouped JSON level format.
//!
//! ```text
//! {
//!   "format": "block-world/grouped",
//!   "version": 1,
//!   "block_count": 3,
//!   "groups": [
//!     { "texture": "stone", "blocks": [ { "position": [0, 0, 0], "color": [..], "solid": true }, .. ] },
//!     ..
//!   ]
//! }
//! ```

use std::{
    collections::BTreeMap,
    io::{Read, Write},
};

use serde::{Deserialize, Serialize};

use super::{LevelError, SavedBlock};
use crate::engine_state::voxels::block::{texture::TextureId, Rgba};

pub const FORMAT_TAG: &str = "block-world/grouped";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct GroupedLevel {
    format: String,
    version: u32,
    block_count: usize,
    groups: Vec<TextureGroup>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextureGroup {
    texture: TextureId,
    blocks: Vec<GroupedBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GroupedBlock {
    position: [i32; 3],
    color: Rgba,
    solid: bool,
}

pub fn write<W: Write>(blocks: &[SavedBlock], writer: W) -> Result<(), LevelError> {
    let mut groups: BTreeMap<TextureId, Vec<GroupedBlock>> = BTreeMap::new();
    for block in blocks {
        groups.entry(block.texture).or_default().push(GroupedBlock {
            position: block.position,
            color: block.color,
            solid: block.solid,
        });
    }

    let level = GroupedLevel {
        format: FORMAT_TAG.to_string(),
        version: FORMAT_VERSION,
        block_count: blocks.len(),
        groups: groups
            .into_iter()
            .map(|(texture, blocks)| TextureGroup { texture, blocks })
            .collect(),
    };
    serde_json::to_writer(writer, &level).map_err(|e| LevelError::Serialize(e.to_string()))
}

pub fn read<R: Read>(reader: R) -> Result<Vec<SavedBlock>, LevelError> {
    let level: GroupedLevel =
        serde_json::from_reader(reader).map_err(|e| LevelError::Deserialize(e.to_string()))?;
    if level.format != FORMAT_TAG {
        return Err(LevelError::InvalidMagic);
    }
    if level.block_count == 0 {
        return Err(LevelError::NoBlocks);
    }

    let actual: usize = level.groups.iter().map(|group| group.blocks.len()).sum();
    if actual != level.block_count {
        return Err(LevelError::SizeMismatch {
            declared: level.block_count,
            actual,
        });
    }

    Ok(level
        .groups
        .into_iter()
        .flat_map(|group| {
            let texture = group.texture;
            group.blocks.into_iter().map(move |block| SavedBlock {
                position: block.position,
                texture,
                color: block.color,
                solid: block.solid,
            })
        })
        .collect())
}
