#![allow(dead_code)]

use std::path::Path;
use strata::{ChunkPos, World, WorldConfig};

/// World over `dir` with small caches so tests hit eviction quickly.
pub fn open_world(dir: &Path, max_chunks: usize, max_regions: usize) -> World {
    let config = WorldConfig {
        max_chunks,
        max_regions,
        ..WorldConfig::default()
    };
    World::open(dir, config).expect("failed to open world")
}

/// First block column of a chunk, in global block coordinates.
pub fn block_origin(pos: ChunkPos) -> (i32, i32) {
    (pos.x * 16, pos.z * 16)
}

/// Deterministic bytes that zlib cannot shrink much.
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}
