use crate::block::Block;
use crate::section::Section;
use std::collections::BTreeMap;
use strata_common::{ChunkPos, Result, StrataError};
use strata_nbt::{List, TagKind};

pub const CHUNK_WIDTH: i32 = 16;
pub const CHUNK_HEIGHT: i32 = 256;
pub const COLUMNS: usize = 256;

/// A 16x256x16 column of blocks. Sections are created lazily, so a chunk
/// that was never written to holds no sections at all.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    x: i32,
    z: i32,
    sections: BTreeMap<i8, Section>,
    biomes: Option<Vec<u8>>,
    pub last_update: i64,
    pub light_populated: i8,
    pub terrain_populated: i8,
    pub inhabited_time: i64,
    pub entities: List,
    pub tile_entities: List,
}

impl Chunk {
    pub fn new(x: i32, z: i32) -> Self {
        Chunk {
            x,
            z,
            sections: BTreeMap::new(),
            biomes: None,
            last_update: 0,
            light_populated: 0,
            terrain_populated: 1,
            inhabited_time: 0,
            entities: List::empty(TagKind::End),
            tile_entities: List::empty(TagKind::End),
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn z(&self) -> i32 {
        self.z
    }

    pub fn pos(&self) -> ChunkPos {
        ChunkPos::new(self.x, self.z)
    }

    pub fn section(&self, y: i8) -> Option<&Section> {
        self.sections.get(&y)
    }

    pub fn sections(&self) -> impl Iterator<Item = (i8, &Section)> {
        self.sections.iter().map(|(&y, section)| (y, section))
    }

    pub fn insert_section(&mut self, y: i8, section: Section) {
        self.sections.insert(y, section);
    }

    /// Local block lookup. `None` means the section was never created,
    /// which reads as air.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Result<Option<Block>> {
        check_bounds(x, y, z)?;
        Ok(self
            .sections
            .get(&((y >> 4) as i8))
            .map(|section| section.get(x as usize, (y & 15) as usize, z as usize)))
    }

    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: Block) -> Result<()> {
        check_bounds(x, y, z)?;
        block.check()?;
        self.sections
            .entry((y >> 4) as i8)
            .or_default()
            .set(x as usize, (y & 15) as usize, z as usize, block);
        Ok(())
    }

    /// Height of the topmost non-air block of every column, `z * 16 + x`
    /// ordered; columns without one are 0.
    pub fn heightmap(&self) -> Vec<i32> {
        let mut heights = vec![0; COLUMNS];
        for z in 0..16 {
            for x in 0..16 {
                heights[z * 16 + x] = self.column_height(x, z);
            }
        }
        heights
    }

    fn column_height(&self, x: usize, z: usize) -> i32 {
        for (&section_y, section) in self.sections.range(0..16).rev() {
            for y in (0..16).rev() {
                if !section.get(x, y, z).is_air() {
                    return section_y as i32 * 16 + y as i32;
                }
            }
        }
        0
    }

    pub fn biomes(&self) -> Option<&[u8]> {
        self.biomes.as_deref()
    }

    pub fn biome(&self, x: i32, z: i32) -> Option<u8> {
        let index = column_index(x, z).ok()?;
        self.biomes.as_ref().map(|biomes| biomes[index])
    }

    pub fn fill_biome(&mut self, id: u8) {
        self.biomes = Some(vec![id; COLUMNS]);
    }

    /// Sets one column's biome. The first write fills every other column
    /// with `default`.
    pub fn set_biome(&mut self, x: i32, z: i32, id: u8, default: u8) -> Result<()> {
        let index = column_index(x, z)?;
        self.biomes.get_or_insert_with(|| vec![default; COLUMNS])[index] = id;
        Ok(())
    }

    pub fn set_biomes(&mut self, biomes: Option<Vec<u8>>) -> Result<()> {
        if let Some(biomes) = &biomes {
            if biomes.len() != COLUMNS {
                return Err(StrataError::format(format!(
                    "Biome array needs {} entries, got {}",
                    COLUMNS,
                    biomes.len()
                )));
            }
        }
        self.biomes = biomes;
        Ok(())
    }

    /// One row per z, `id` or `id:data` per block, columns separated by `|`.
    pub fn ascii_cross_section(&self, y: i32) -> Result<String> {
        let mut rows = Vec::with_capacity(16);
        for z in 0..CHUNK_WIDTH {
            let row = (0..CHUNK_WIDTH)
                .map(|x| {
                    self.get_block(x, y, z)
                        .map(|block| block.unwrap_or(Block::AIR).to_string())
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(row.join(" | "));
        }
        Ok(rows.join("\n"))
    }
}

/// Fails unless (x, y, z) are local block coordinates of a chunk.
pub fn check_bounds(x: i32, y: i32, z: i32) -> Result<()> {
    if !(0..CHUNK_WIDTH).contains(&x)
        || !(0..CHUNK_HEIGHT).contains(&y)
        || !(0..CHUNK_WIDTH).contains(&z)
    {
        return Err(StrataError::bounds(format!(
            "Block ({}, {}, {}) is outside the chunk",
            x, y, z
        )));
    }
    Ok(())
}

fn column_index(x: i32, z: i32) -> Result<usize> {
    if !(0..CHUNK_WIDTH).contains(&x) || !(0..CHUNK_WIDTH).contains(&z) {
        return Err(StrataError::bounds(format!(
            "Column ({}, {}) is outside the chunk",
            x, z
        )));
    }
    Ok((z * 16 + x) as usize)
}
