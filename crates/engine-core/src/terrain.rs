//! Room terrain codec.
//!
//! A room is a 50x50 grid stored as one 2,500-character string, row-major
//! with index `y * 50 + x`. Each character encodes a tile bit mask through a
//! 62-symbol alphabet (`0-9`, `a-z`, `A-Z` for values 0..=61). Bit 0 marks a
//! wall, bit 1 a swamp; a tile may carry both, and wall dominates for
//! walkability.

use std::fmt;

use contracts::{ROOM_SIZE, TERRAIN_MASK_SWAMP, TERRAIN_MASK_WALL, TERRAIN_TILE_COUNT};

const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Highest mask value the alphabet can express; encode clamps above this.
pub const MAX_MASK: u8 = 61;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerrainError {
    /// Encoded string is not exactly one tile per character.
    BadLength { length: usize },
    /// Character outside the 62-symbol alphabet, with its byte offset.
    BadSymbol { index: usize, symbol: char },
    /// Coordinate outside 0..=49.
    OutOfRange { x: i64, y: i64 },
}

impl fmt::Display for TerrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadLength { length } => {
                write!(
                    f,
                    "terrain string has {length} characters, expected {TERRAIN_TILE_COUNT}"
                )
            }
            Self::BadSymbol { index, symbol } => {
                write!(f, "terrain symbol '{symbol}' at offset {index} is not in the alphabet")
            }
            Self::OutOfRange { x, y } => write!(f, "tile ({x}, {y}) is outside the room"),
        }
    }
}

impl std::error::Error for TerrainError {}

/// Decoded terrain for one room. Always exactly [`TERRAIN_TILE_COUNT`] masks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerrainGrid {
    tiles: Vec<u8>,
}

impl TerrainGrid {
    /// Builds a grid from raw masks; rejects anything but a full room.
    pub fn from_masks(tiles: Vec<u8>) -> Result<Self, TerrainError> {
        if tiles.len() != TERRAIN_TILE_COUNT {
            return Err(TerrainError::BadLength { length: tiles.len() });
        }
        Ok(Self { tiles })
    }

    /// All-plain grid, useful as a fixture base.
    pub fn open_field() -> Self {
        Self {
            tiles: vec![0; TERRAIN_TILE_COUNT],
        }
    }

    pub fn masks(&self) -> &[u8] {
        &self.tiles
    }

    pub fn set_mask(&mut self, x: i64, y: i64, mask: u8) -> Result<(), TerrainError> {
        let index = tile_index(x, y)?;
        self.tiles[index] = mask;
        Ok(())
    }

    pub fn mask_at(&self, x: i64, y: i64) -> Result<u8, TerrainError> {
        Ok(self.tiles[tile_index(x, y)?])
    }

    /// Mask lookup that treats everything outside the room as wall. Border
    /// neighbourhood checks use this instead of threading range errors.
    pub fn mask_or_wall(&self, x: i64, y: i64) -> u8 {
        match tile_index(x, y) {
            Ok(index) => self.tiles[index],
            Err(_) => TERRAIN_MASK_WALL,
        }
    }
}

fn tile_index(x: i64, y: i64) -> Result<usize, TerrainError> {
    if !(0..ROOM_SIZE).contains(&x) || !(0..ROOM_SIZE).contains(&y) {
        return Err(TerrainError::OutOfRange { x, y });
    }
    Ok((y * ROOM_SIZE + x) as usize)
}

fn symbol_value(symbol: char) -> Option<u8> {
    match symbol {
        '0'..='9' => Some(symbol as u8 - b'0'),
        'a'..='z' => Some(symbol as u8 - b'a' + 10),
        'A'..='Z' => Some(symbol as u8 - b'A' + 36),
        _ => None,
    }
}

/// Encodes a grid to its string form. Masks above [`MAX_MASK`] clamp to the
/// last symbol, so encoding never fails.
pub fn encode(grid: &TerrainGrid) -> String {
    grid.masks()
        .iter()
        .map(|mask| ALPHABET[(*mask).min(MAX_MASK) as usize] as char)
        .collect()
}

/// Decodes a full terrain string, validating length and every symbol.
pub fn decode(encoded: &str) -> Result<TerrainGrid, TerrainError> {
    if encoded.chars().count() != TERRAIN_TILE_COUNT {
        return Err(TerrainError::BadLength {
            length: encoded.chars().count(),
        });
    }
    let mut tiles = Vec::with_capacity(TERRAIN_TILE_COUNT);
    for (index, symbol) in encoded.char_indices() {
        match symbol_value(symbol) {
            Some(mask) => tiles.push(mask),
            None => return Err(TerrainError::BadSymbol { index, symbol }),
        }
    }
    TerrainGrid::from_masks(tiles)
}

/// Point lookup on the encoded form, without decoding the whole room.
pub fn tile_at(encoded: &str, x: i64, y: i64) -> Result<u8, TerrainError> {
    let index = tile_index(x, y)?;
    let bytes = encoded.as_bytes();
    if bytes.len() != TERRAIN_TILE_COUNT {
        return Err(TerrainError::BadLength { length: bytes.len() });
    }
    let symbol = bytes[index] as char;
    symbol_value(symbol).ok_or(TerrainError::BadSymbol { index, symbol })
}

pub fn is_wall(mask: u8) -> bool {
    mask & TERRAIN_MASK_WALL != 0
}

pub fn is_swamp(mask: u8) -> bool {
    mask & TERRAIN_MASK_SWAMP != 0
}

/// Tile census of one room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerrainCounts {
    pub plain: usize,
    pub wall: usize,
    pub swamp: usize,
}

/// Counts walkability classes over an encoded string. Wall+swamp tiles count
/// as wall, matching how movement treats them.
pub fn counts(encoded: &str) -> Result<TerrainCounts, TerrainError> {
    let grid = decode(encoded)?;
    let mut tally = TerrainCounts::default();
    for mask in grid.masks() {
        if is_wall(*mask) {
            tally.wall += 1;
        } else if is_swamp(*mask) {
            tally.swamp += 1;
        } else {
            tally.plain += 1;
        }
    }
    Ok(tally)
}
