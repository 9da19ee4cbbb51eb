use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, crate::error::StrataError>;

/// Chunks per region edge.
pub const REGION_CHUNKS: i32 = 32;

/// Global chunk coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        ChunkPos { x, z }
    }

    /// Chunk containing the global block column (x, z).
    pub fn from_block(x: i32, z: i32) -> Self {
        ChunkPos { x: x >> 4, z: z >> 4 }
    }

    pub fn region(&self) -> RegionPos {
        RegionPos {
            x: self.x >> 5,
            z: self.z >> 5,
        }
    }
}

/// Region coordinates; one region covers 32x32 chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub fn new(x: i32, z: i32) -> Self {
        RegionPos { x, z }
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!("r.{}.{}.{}", self.x, self.z, extension)
    }

    pub fn contains(&self, chunk: ChunkPos) -> bool {
        chunk.region() == *self
    }
}
