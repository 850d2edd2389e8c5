//! Legacy binary level format.
//!
//! A fixed bincode header `{ magic: "DAT1", count: u32 }` followed by exactly `count`
//! flat block records. The header limits a level to `MAX_LEGACY_BLOCKS` blocks.
//! Anything after the last declared record is an error: whole records are a
//! `SizeMismatch`, a partial record is a decode failure.

use std::io::{self, Cursor, Read, Write};

use serde::{Deserialize, Serialize};

use super::{LevelError, SavedBlock};

pub const LEGACY_MAGIC: [u8; 4] = *b"DAT1";
pub const MAX_LEGACY_BLOCKS: usize = u16::MAX as usize;

#[derive(Debug, Serialize, Deserialize)]
struct LegacyHeader {
    magic: [u8; 4],
    count: u32,
}

pub fn write<W: Write>(blocks: &[SavedBlock], mut writer: W) -> Result<(), LevelError> {
    if blocks.len() > MAX_LEGACY_BLOCKS {
        return Err(LevelError::TooManyBlocks {
            count: blocks.len(),
            max: MAX_LEGACY_BLOCKS,
        });
    }

    let header = LegacyHeader {
        magic: LEGACY_MAGIC,
        count: blocks.len() as u32,
    };
    bincode::serialize_into(&mut writer, &header)
        .map_err(|e| LevelError::Serialize(e.to_string()))?;
    for block in blocks {
        bincode::serialize_into(&mut writer, block)
            .map_err(|e| LevelError::Serialize(e.to_string()))?;
    }
    Ok(())
}

/// Decodes one record, mapping a clean end of stream to `None`.
fn next_record<R: Read>(reader: &mut R) -> Result<Option<SavedBlock>, LevelError> {
    match bincode::deserialize_from(reader) {
        Ok(block) => Ok(Some(block)),
        Err(e) => match *e {
            bincode::ErrorKind::Io(ref io_error)
                if io_error.kind() == io::ErrorKind::UnexpectedEof =>
            {
                Ok(None)
            }
            other => Err(LevelError::Deserialize(other.to_string())),
        },
    }
}

pub fn read<R: Read>(mut reader: R) -> Result<Vec<SavedBlock>, LevelError> {
    let header: LegacyHeader = bincode::deserialize_from(&mut reader)
        .map_err(|e| LevelError::Deserialize(e.to_string()))?;
    if header.magic != LEGACY_MAGIC {
        return Err(LevelError::InvalidMagic);
    }

    let declared = header.count as usize;
    if declared == 0 {
        return Err(LevelError::NoBlocks);
    }
    if declared > MAX_LEGACY_BLOCKS {
        return Err(LevelError::TooManyBlocks {
            count: declared,
            max: MAX_LEGACY_BLOCKS,
        });
    }

    let mut blocks = Vec::with_capacity(declared);
    while blocks.len() < declared {
        match next_record(&mut reader)? {
            Some(block) => blocks.push(block),
            None => {
                return Err(LevelError::SizeMismatch {
                    declared,
                    actual: blocks.len(),
                })
            }
        }
    }

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest)?;
    let mut tail = Cursor::new(rest.as_slice());
    let mut trailing = 0;
    let mut partial = false;
    loop {
        let start = tail.position() as usize;
        if next_record(&mut tail)?.is_some() {
            trailing += 1;
        } else {
            partial = start < rest.len();
            break;
        }
    }

    if trailing > 0 {
        return Err(LevelError::SizeMismatch {
            declared,
            actual: declared + trailing,
        });
    }
    if partial {
        return Err(LevelError::Deserialize(format!(
            "{} stray bytes after block {}",
            rest.len(),
            declared
        )));
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::texture::TextureId;

    fn blocks(count: usize) -> Vec<SavedBlock> {
        (0..count)
            .map(|i| SavedBlock {
                position: [i as i32 * 2, 0, 0],
                texture: TextureId::new("brick").unwrap(),
                color: [0.7, 0.3, 0.2, 1.0],
                solid: true,
            })
            .collect()
    }

    fn encode_with_count(count: u32, records: &[SavedBlock]) -> Vec<u8> {
        let mut buffer = Vec::new();
        let header = LegacyHeader {
            magic: LEGACY_MAGIC,
            count,
        };
        bincode::serialize_into(&mut buffer, &header).unwrap();
        for record in records {
            bincode::serialize_into(&mut buffer, record).unwrap();
        }
        buffer
    }

    #[test]
    fn truncated_stream_is_a_size_mismatch() {
        let buffer = encode_with_count(5, &blocks(3));
        match read(Cursor::new(buffer)) {
            Err(LevelError::SizeMismatch { declared: 5, actual: 3 }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn trailing_records_are_a_size_mismatch() {
        let buffer = encode_with_count(2, &blocks(4));
        match read(Cursor::new(buffer)) {
            Err(LevelError::SizeMismatch { declared: 2, actual: 4 }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn partial_trailing_record_is_rejected() {
        let mut buffer = encode_with_count(2, &blocks(2));
        buffer.extend_from_slice(&[1, 2, 3]);
        match read(Cursor::new(buffer)) {
            Err(LevelError::Deserialize(message)) => assert!(message.contains("3 stray bytes")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn exact_stream_reads_back() {
        let buffer = encode_with_count(3, &blocks(3));
        assert_eq!(read(Cursor::new(buffer)).unwrap(), blocks(3));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut buffer = encode_with_count(1, &blocks(1));
        buffer[0] = b'X';
        assert!(matches!(read(Cursor::new(buffer)), Err(LevelError::InvalidMagic)));
    }

    #[test]
    fn zero_count_reports_no_blocks() {
        let buffer = encode_with_count(0, &[]);
        assert!(matches!(read(Cursor::new(buffer)), Err(LevelError::NoBlocks)));
    }

    #[test]
    fn writing_over_the_cap_fails_before_writing() {
        let mut buffer = Vec::new();
        let result = write(&blocks(MAX_LEGACY_BLOCKS + 1), &mut buffer);
        assert!(matches!(
            result,
            Err(LevelError::TooManyBlocks { count, max: MAX_LEGACY_BLOCKS }) if count == MAX_LEGACY_BLOCKS + 1
        ));
        assert!(buffer.is_empty());
    }
}
