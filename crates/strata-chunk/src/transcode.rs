//! Conversion between a chunk and its tag tree.
//!
//! ```text
//! (root)
//!   DataVersion: Int
//!   Level: Compound
//!     xPos, zPos: Int
//!     LastUpdate: Long
//!     LightPopulated, TerrainPopulated, V: Byte
//!     InhabitedTime: Long
//!     HeightMap: IntArray[256]
//!     Sections: List<Compound { Y, Blocks, [Add], Data, SkyLight, BlockLight }>
//!     Entities, TileEntities: List
//!     [Biomes: ByteArray[256]]
//! ```

use crate::chunk::Chunk;
use crate::section::Section;
use log::debug;
use strata_common::{Result, StrataError};
use strata_nbt::{Compound, List, Tag, TagKind};

pub const DATA_VERSION: i32 = 169;
const FORMAT_VERSION: i8 = 1;

impl Chunk {
    pub fn to_tag(&self) -> Result<Tag> {
        let sections = self
            .sections()
            .map(|(y, section)| section_to_tag(y, section))
            .collect::<Vec<_>>();
        let sections = if sections.is_empty() {
            List::empty(TagKind::End)
        } else {
            List::new(TagKind::Compound, sections)?
        };

        let mut level = Compound::new();
        level.insert("xPos".to_string(), Tag::Int(self.x()));
        level.insert("zPos".to_string(), Tag::Int(self.z()));
        level.insert("LastUpdate".to_string(), Tag::Long(self.last_update));
        level.insert("LightPopulated".to_string(), Tag::Byte(self.light_populated));
        level.insert("TerrainPopulated".to_string(), Tag::Byte(self.terrain_populated));
        level.insert("V".to_string(), Tag::Byte(FORMAT_VERSION));
        level.insert("InhabitedTime".to_string(), Tag::Long(self.inhabited_time));
        level.insert("HeightMap".to_string(), Tag::IntArray(self.heightmap()));
        level.insert("Sections".to_string(), Tag::List(sections));
        level.insert("Entities".to_string(), Tag::List(self.entities.clone()));
        level.insert("TileEntities".to_string(), Tag::List(self.tile_entities.clone()));
        if let Some(biomes) = self.biomes() {
            level.insert("Biomes".to_string(), byte_array(biomes));
        }

        let mut root = Compound::new();
        root.insert("DataVersion".to_string(), Tag::Int(DATA_VERSION));
        root.insert("Level".to_string(), Tag::Compound(level));
        Ok(Tag::Compound(root))
    }

    pub fn from_tag(root: &Tag) -> Result<Chunk> {
        let root = root
            .as_compound()
            .ok_or_else(|| StrataError::format("Chunk root is not a compound"))?;
        let level = root
            .get("Level")
            .and_then(Tag::as_compound)
            .ok_or_else(|| StrataError::format("Chunk has no Level compound"))?;

        let x = required(level, "xPos", Tag::as_i32)?;
        let z = required(level, "zPos", Tag::as_i32)?;
        let mut chunk = Chunk::new(x, z);
        chunk.last_update = optional(level, "LastUpdate", Tag::as_i64, 0)?;
        chunk.light_populated = optional(level, "LightPopulated", Tag::as_i8, 0)?;
        chunk.terrain_populated = optional(level, "TerrainPopulated", Tag::as_i8, 1)?;
        chunk.inhabited_time = optional(level, "InhabitedTime", Tag::as_i64, 0)?;
        chunk.entities = optional_list(level, "Entities")?;
        chunk.tile_entities = optional_list(level, "TileEntities")?;

        if let Some(sections) = level.get("Sections") {
            let sections = sections
                .as_list()
                .ok_or_else(|| StrataError::format("Sections is not a list"))?;
            for section in sections.iter() {
                let (y, section) = section_from_tag(section)?;
                chunk.insert_section(y, section);
            }
        }

        let biomes = match level.get("Biomes") {
            Some(tag) => Some(tag),
            None => root.get("Biomes").inspect(|_| {
                debug!("Chunk ({}, {}) stores biomes outside its Level", x, z);
            }),
        };
        if let Some(biomes) = biomes {
            let biomes = biomes
                .as_byte_array()
                .ok_or_else(|| StrataError::format("Biomes is not a byte array"))?;
            chunk.set_biomes(Some(unsigned(biomes)))?;
        }

        Ok(chunk)
    }

    /// Unnamed root tag bytes, uncompressed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_tag()?.to_bytes("")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Chunk> {
        let (_, root) = Tag::from_bytes(bytes)?;
        Chunk::from_tag(&root)
    }
}

fn section_to_tag(y: i8, section: &Section) -> Tag {
    let packed = section.pack();
    let mut compound = Compound::new();
    compound.insert("Y".to_string(), Tag::Byte(y));
    compound.insert("Blocks".to_string(), byte_array(&packed.blocks));
    if let Some(add) = &packed.add {
        compound.insert("Add".to_string(), byte_array(add));
    }
    compound.insert("Data".to_string(), byte_array(&packed.data));
    compound.insert("SkyLight".to_string(), byte_array(section.sky_light()));
    compound.insert("BlockLight".to_string(), byte_array(section.block_light()));
    Tag::Compound(compound)
}

fn section_from_tag(tag: &Tag) -> Result<(i8, Section)> {
    let compound = tag
        .as_compound()
        .ok_or_else(|| StrataError::format("Section is not a compound"))?;
    let y = required(compound, "Y", Tag::as_i8)?;
    if !(0..16).contains(&y) {
        return Err(StrataError::format(format!(
            "Section Y {} is outside the chunk",
            y
        )));
    }
    let blocks = unsigned(required(compound, "Blocks", Tag::as_byte_array)?);
    let data = unsigned(required(compound, "Data", Tag::as_byte_array)?);
    let add = match compound.get("Add") {
        Some(tag) => Some(unsigned(
            tag.as_byte_array()
                .ok_or_else(|| StrataError::format("Add is not a byte array"))?,
        )),
        None => None,
    };

    let mut section = Section::unpack(&blocks, add.as_deref(), &data)?;
    let sky_light = compound.get("SkyLight").and_then(Tag::as_byte_array);
    let block_light = compound.get("BlockLight").and_then(Tag::as_byte_array);
    if let (Some(sky_light), Some(block_light)) = (sky_light, block_light) {
        section.set_light(unsigned(sky_light), unsigned(block_light))?;
    }
    Ok((y, section))
}

fn required<'a, T>(compound: &'a Compound, name: &str, get: fn(&'a Tag) -> Option<T>) -> Result<T> {
    compound
        .get(name)
        .and_then(get)
        .ok_or_else(|| StrataError::format(format!("Missing or mistyped {}", name)))
}

fn optional<'a, T>(
    compound: &'a Compound,
    name: &str,
    get: fn(&'a Tag) -> Option<T>,
    default: T,
) -> Result<T> {
    match compound.get(name) {
        Some(_) => required(compound, name, get),
        None => Ok(default),
    }
}

fn optional_list(compound: &Compound, name: &str) -> Result<List> {
    optional(compound, name, Tag::as_list, &List::empty(TagKind::End)).map(List::clone)
}

fn byte_array(bytes: &[u8]) -> Tag {
    Tag::ByteArray(bytes.iter().map(|&b| b as i8).collect())
}

fn unsigned(bytes: &[i8]) -> Vec<u8> {
    bytes.iter().map(|&b| b as u8).collect()
}
