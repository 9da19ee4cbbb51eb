//! A 16x16x16 cube of blocks and its packed byte-array form.
//!
//! Blocks are stored Y, Z, X major: `index = y * 256 + z * 16 + x`. On disk
//! the low 8 id bits go to `Blocks`, the high 4 bits to the `Add` nibble
//! array and the data value to the `Data` nibble array. Within a nibble
//! array an even index uses the low nibble of its byte, an odd index the
//! high nibble.

use crate::block::{Block, MAX_BLOCK_ID};
use strata_common::{Result, StrataError};

pub const SECTION_BLOCKS: usize = 4096;
pub const NIBBLE_BYTES: usize = SECTION_BLOCKS / 2;

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    blocks: Vec<Block>,
    sky_light: Vec<u8>,
    block_light: Vec<u8>,
}

/// Byte arrays of a packed section. `add` is `None` when every id fits in
/// 8 bits.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedSection {
    pub blocks: Vec<u8>,
    pub add: Option<Vec<u8>>,
    pub data: Vec<u8>,
}

pub fn index(x: usize, y: usize, z: usize) -> usize {
    (y << 8) | (z << 4) | x
}

pub fn get_nibble(array: &[u8], index: usize) -> u8 {
    let byte = array[index >> 1];
    if index & 1 == 0 {
        byte & 0x0F
    } else {
        byte >> 4
    }
}

/// ORs `value` into a zeroed nibble.
pub fn set_nibble(array: &mut [u8], index: usize, value: u8) {
    let shift = if index & 1 == 0 { 0 } else { 4 };
    array[index >> 1] |= (value & 0x0F) << shift;
}

impl Section {
    /// An all-air section with zero light.
    pub fn new() -> Self {
        Section {
            blocks: vec![Block::AIR; SECTION_BLOCKS],
            sky_light: vec![0; NIBBLE_BYTES],
            block_light: vec![0; NIBBLE_BYTES],
        }
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self> {
        if blocks.len() != SECTION_BLOCKS {
            return Err(StrataError::format(format!(
                "Section needs {} blocks, got {}",
                SECTION_BLOCKS,
                blocks.len()
            )));
        }
        blocks.iter().try_for_each(Block::check)?;
        Ok(Section {
            blocks,
            ..Section::new()
        })
    }

    /// Coordinates are local to the section and must be below 16.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Block {
        self.blocks[index(x, y, z)]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, block: Block) {
        self.blocks[index(x, y, z)] = block;
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(Block::is_air)
    }

    pub fn sky_light(&self) -> &[u8] {
        &self.sky_light
    }

    pub fn block_light(&self) -> &[u8] {
        &self.block_light
    }

    pub fn set_light(&mut self, sky_light: Vec<u8>, block_light: Vec<u8>) -> Result<()> {
        if sky_light.len() != NIBBLE_BYTES || block_light.len() != NIBBLE_BYTES {
            return Err(StrataError::format(format!(
                "Light arrays need {} bytes, got {} and {}",
                NIBBLE_BYTES,
                sky_light.len(),
                block_light.len()
            )));
        }
        self.sky_light = sky_light;
        self.block_light = block_light;
        Ok(())
    }

    pub fn pack(&self) -> PackedSection {
        let mut blocks = Vec::with_capacity(SECTION_BLOCKS);
        let mut add = vec![0u8; NIBBLE_BYTES];
        let mut data = vec![0u8; NIBBLE_BYTES];
        for (i, block) in self.blocks.iter().enumerate() {
            let id = block.id & MAX_BLOCK_ID;
            blocks.push((id & 0xFF) as u8);
            set_nibble(&mut add, i, (id >> 8) as u8);
            set_nibble(&mut data, i, block.data);
        }
        let add = if add.iter().any(|&b| b != 0) {
            Some(add)
        } else {
            None
        };
        PackedSection { blocks, add, data }
    }

    pub fn unpack(blocks: &[u8], add: Option<&[u8]>, data: &[u8]) -> Result<Self> {
        check_len("Blocks", blocks, SECTION_BLOCKS)?;
        check_len("Data", data, NIBBLE_BYTES)?;
        if let Some(add) = add {
            check_len("Add", add, NIBBLE_BYTES)?;
        }
        let blocks = (0..SECTION_BLOCKS)
            .map(|i| {
                let high = add.map_or(0, |add| get_nibble(add, i) as u16);
                Block::new(blocks[i] as u16 | (high << 8), get_nibble(data, i))
            })
            .collect();
        Section::from_blocks(blocks)
    }
}

impl Default for Section {
    fn default() -> Self {
        Section::new()
    }
}

fn check_len(name: &str, array: &[u8], expected: usize) -> Result<()> {
    if array.len() != expected {
        return Err(StrataError::format(format!(
            "Section array {} has {} bytes, expected {}",
            name,
            array.len(),
            expected
        )));
    }
    Ok(())
}
