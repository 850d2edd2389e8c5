//! # Level Persistence
//!
//! Saves and restores the block content of a `World`. Only what cannot be derived is
//! stored: position, texture, color and the solid flag. Occlusion masks, ids and
//! chunks are rebuilt by re-inserting every block through the normal insert path.
//!
//! Two formats are supported:
//! - **Grouped** ([`grouped`]): JSON, blocks grouped by texture, no block cap
//! - **Legacy** ([`legacy`]): bincode, a fixed header then flat records, at most
//!   `legacy::MAX_LEGACY_BLOCKS` blocks
//!
//! Both loaders validate the declared block count against what the stream holds.
//! A declared count of zero is reported as `LevelError::NoBlocks`, which callers treat
//! as an empty level; any other error aborts the load.

pub mod grouped;
pub mod legacy;

use std::{
    error::Error,
    fmt,
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use cgmath::Point3;
use log::info;
use serde::{Deserialize, Serialize};

use crate::engine_state::voxels::{
    block::{texture::TextureId, BlockRecord, Rgba},
    position::Position,
    world::{BlockFilter, World},
};

/// Errors raised while saving or loading a level.
#[derive(Debug)]
pub enum LevelError {
    Io(io::Error),
    Serialize(String),
    Deserialize(String),
    /// The stream does not start with the expected format marker.
    InvalidMagic,
    /// The level declares no blocks.
    NoBlocks,
    /// The number of blocks in the stream differs from the declared count.
    SizeMismatch { declared: usize, actual: usize },
    /// The format cannot hold this many blocks.
    TooManyBlocks { count: usize, max: usize },
}

impl fmt::Display for LevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelError::Io(e) => write!(f, "I/O error: {}", e),
            LevelError::Serialize(e) => write!(f, "Failed to encode level: {}", e),
            LevelError::Deserialize(e) => write!(f, "Failed to decode level: {}", e),
            LevelError::InvalidMagic => write!(f, "Not a level file"),
            LevelError::NoBlocks => write!(f, "Level contains no blocks"),
            LevelError::SizeMismatch { declared, actual } => write!(
                f,
                "Level declares {} blocks but contains {}",
                declared, actual
            ),
            LevelError::TooManyBlocks { count, max } => write!(
                f,
                "{} blocks do not fit a format capped at {}",
                count, max
            ),
        }
    }
}

impl Error for LevelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LevelError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LevelError {
    fn from(e: io::Error) -> Self {
        LevelError::Io(e)
    }
}

/// On-disk level formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelFormat {
    Grouped,
    Legacy,
}

impl LevelFormat {
    /// Picks the format from a file extension: `.dat` is legacy, anything else grouped.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("dat") => LevelFormat::Legacy,
            _ => LevelFormat::Grouped,
        }
    }
}

/// The persisted fields of one block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedBlock {
    pub position: [i32; 3],
    pub texture: TextureId,
    pub color: Rgba,
    pub solid: bool,
}

impl SavedBlock {
    pub fn from_record(position: Position, record: &BlockRecord) -> Self {
        SavedBlock {
            position: position.into(),
            texture: record.texture,
            color: record.color,
            solid: record.solid,
        }
    }

    pub fn into_record(self) -> (Position, BlockRecord) {
        (
            Point3::from(self.position),
            BlockRecord::new(self.texture, self.color, self.solid),
        )
    }
}

/// Every block of `world`, in grid order.
pub fn snapshot(world: &World) -> Vec<SavedBlock> {
    world
        .blocks(BlockFilter::All)
        .iter()
        .map(|(position, record)| SavedBlock::from_record(*position, record))
        .collect()
}

/// Writes the blocks of `world` to `writer`.
pub fn save_level<W: Write>(world: &World, format: LevelFormat, writer: W) -> Result<(), LevelError> {
    let blocks = snapshot(world);
    match format {
        LevelFormat::Grouped => grouped::write(&blocks, writer),
        LevelFormat::Legacy => legacy::write(&blocks, writer),
    }
}

/// Reads and validates the blocks stored in `reader`.
pub fn read_level<R: Read>(format: LevelFormat, reader: R) -> Result<Vec<SavedBlock>, LevelError> {
    match format {
        LevelFormat::Grouped => grouped::read(reader),
        LevelFormat::Legacy => legacy::read(reader),
    }
}

/// Re-inserts saved blocks into `world`.
///
/// # Returns
/// The number of blocks inserted
pub fn restore(world: &mut World, blocks: Vec<SavedBlock>) -> usize {
    world.insert_all(blocks.into_iter().map(SavedBlock::into_record))
}

/// Saves `world` to the file at `path`, choosing the format from the extension.
pub fn save_level_file(world: &World, path: impl AsRef<Path>) -> Result<(), LevelError> {
    let path = path.as_ref();
    let format = LevelFormat::from_path(path);
    let mut writer = BufWriter::new(File::create(path)?);
    save_level(world, format, &mut writer)?;
    writer.flush()?;
    info!("Saved {} blocks to {} ({:?})", world.len(), path.display(), format);
    Ok(())
}

/// Reads the level file at `path`, choosing the format from the extension.
pub fn read_level_file(path: impl AsRef<Path>) -> Result<Vec<SavedBlock>, LevelError> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    read_level(LevelFormat::from_path(path), reader)
}
