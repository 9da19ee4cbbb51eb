mod common;

use assert_matches::assert_matches;
use common::*;
use flate2::Compression;
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Cursor;
use strata::nbt::{Compound, List, TagKind};
use strata::{Block, Chunk, ChunkPos, Level, RegionHeader, RegionPos, StrataError, Tag, WorldConfig};

#[test]
fn test_evicted_chunk_keeps_last_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let mut world = open_world(dir.path(), 2, 4);
    let a = ChunkPos::new(0, 0);
    let b = ChunkPos::new(1, 0);
    let c = ChunkPos::new(0, 1);

    // A exists on disk with an older state
    let (ax, az) = block_origin(a);
    world.set_block(ax, 10, az, Block::new(1, 0)).unwrap();
    world.flush_all().unwrap();
    world.set_block(ax, 10, az, Block::new(2, 3)).unwrap();

    world.chunk(b).unwrap();
    world.chunk(c).unwrap();
    assert!(!world.is_cached(a));
    assert_eq!(world.cached_chunks(), 2);

    let stored = world.read_chunk_from_disk(a).unwrap().unwrap();
    assert_eq!(stored.get_block(0, 10, 0).unwrap(), Some(Block::new(2, 3)));
}

#[test]
fn test_many_chunks_across_regions() {
    let dir = tempfile::tempdir().unwrap();
    let mut world = open_world(dir.path(), 3, 2);
    let positions: Vec<ChunkPos> = (-3..3)
        .flat_map(|x| [ChunkPos::new(x * 20, 0), ChunkPos::new(x * 20, -40)])
        .collect();

    for (i, &pos) in positions.iter().enumerate() {
        let (x, z) = block_origin(pos);
        world.set_block(x + 1, i as i32, z + 2, Block::new(i as u16 + 1, 0)).unwrap();
        assert!(world.cached_chunks() <= 3);
        assert!(world.cached_regions() <= 2);
    }
    world.close().unwrap();

    let mut world = open_world(dir.path(), 3, 2);
    for (i, &pos) in positions.iter().enumerate() {
        let (x, z) = block_origin(pos);
        assert_eq!(
            world.get_block(x + 1, i as i32, z + 2).unwrap(),
            Some(Block::new(i as u16 + 1, 0))
        );
    }
}

#[test]
fn test_growing_chunk_stays_readable() {
    let dir = tempfile::tempdir().unwrap();
    let mut world = open_world(dir.path(), 4, 1);

    // fill several sections with varied blocks so the chunk spans many sectors
    for round in 0..3 {
        for y in 0..(48 * (round + 1)) {
            for z in 0..16 {
                for x in 0..16 {
                    let id = ((x * 31 + z * 7 + y * 13 + round) % 4000) as u16;
                    world.set_block(x, y, z, Block::new(id, (y % 16) as u8)).unwrap();
                }
            }
        }
        world.set_block(16, 0, 0, Block::new(9, 0)).unwrap();
        world.flush_all().unwrap();
    }

    let chunk = world.read_chunk_from_disk(ChunkPos::new(0, 0)).unwrap().unwrap();
    assert_eq!(chunk.get_block(3, 100, 5).unwrap(), Some(Block::new(((3 * 31 + 5 * 7 + 100 * 13 + 2) % 4000) as u16, 4)));
    let neighbour = world.read_chunk_from_disk(ChunkPos::new(1, 0)).unwrap().unwrap();
    assert_eq!(neighbour.get_block(0, 0, 0).unwrap(), Some(Block::new(9, 0)));

    let path = world.region_path(RegionPos::new(0, 0));
    world.close().unwrap();
    let mut file = OpenOptions::new().read(true).write(true).open(path).unwrap();
    let mut header = RegionHeader::open(RegionPos::new(0, 0), &mut file).unwrap();
    assert_eq!(header.chunk_count().unwrap(), 2);
    header.pack().unwrap();
    assert_eq!(header.find_holes().unwrap(), BTreeSet::new());
    assert_eq!(
        header.file_sector_count().unwrap(),
        2 + header.sector_count().unwrap()
    );
    let bytes = header.read_chunk(0, 0).unwrap().unwrap();
    assert_eq!(Chunk::from_bytes(&bytes).unwrap(), chunk);
}

#[test]
fn test_region_relocation_keeps_neighbours() {
    let mut cursor = Cursor::new(Vec::new());
    let mut header = RegionHeader::open(RegionPos::new(0, 0), &mut cursor).unwrap();
    for x in 0..4 {
        header
            .write_chunk(x, 0, &noise(3000, x as u32), Compression::default())
            .unwrap();
    }
    for (x, len) in [(1, 9000), (3, 100), (0, 20000), (2, 5000)] {
        header
            .write_chunk(x, 0, &noise(len, 100 + x as u32), Compression::default())
            .unwrap();
    }
    for (x, len) in [(1, 9000), (3, 100), (0, 20000), (2, 5000)] {
        assert_eq!(
            header.read_chunk(x, 0).unwrap(),
            Some(noise(len, 100 + x as u32))
        );
    }
    assert_matches!(header.read_chunk(32, 0), Err(StrataError::Bounds(_)));
}

#[test]
fn test_oversized_chunk_is_rejected() {
    let mut cursor = Cursor::new(Vec::new());
    let mut header = RegionHeader::open(RegionPos::new(0, 0), &mut cursor).unwrap();
    let huge = noise(256 * 4096, 7);
    assert_matches!(
        header.write_chunk(0, 0, &huge, Compression::none()),
        Err(StrataError::Bounds(_))
    );
    assert_eq!(header.locate(0, 0).unwrap(), None);
}

#[test]
fn test_level_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = Compound::new();
    options.insert("LevelName".to_string(), Tag::String("integration".to_string()));

    let mut level = Level::open(dir.path(), Some(options), WorldConfig::default()).unwrap();
    level.overworld.fill_region(-2, 60, -2, 4, 2, 4, Block::new(3, 0)).unwrap();
    level.end.set_biome(0, 0, 9, 0).unwrap();
    {
        let chunk = level.overworld.chunk_mut(ChunkPos::new(-1, -1)).unwrap();
        let mut entity = Compound::new();
        entity.insert("id".to_string(), Tag::String("Cow".to_string()));
        chunk.entities = List::new(TagKind::Compound, vec![Tag::Compound(entity)]).unwrap();
    }
    level.close().unwrap();

    let mut level = Level::open(dir.path(), None, WorldConfig::default()).unwrap();
    assert_eq!(
        level.level_options().get("LevelName").and_then(Tag::as_string),
        Some("integration")
    );
    assert_eq!(level.overworld.get_block(-2, 61, -2).unwrap(), Some(Block::new(3, 0)));
    assert_eq!(level.overworld.get_block(1, 61, 1).unwrap(), Some(Block::new(3, 0)));
    assert_eq!(level.overworld.get_block(2, 61, 1).unwrap(), Some(Block::AIR));
    let chunk = level.overworld.chunk(ChunkPos::new(-1, -1)).unwrap();
    assert_eq!(chunk.entities.len(), 1);
    assert_eq!(chunk.heightmap()[15 * 16 + 15], 61);
    assert_eq!(
        level.end.chunk(ChunkPos::new(0, 0)).unwrap().biome(0, 0),
        Some(9)
    );
}
