//! Storage engine for voxel world saves: NBT tags, sector-allocated region
//! files, chunk transcoding and a write-back chunk cache.

pub use strata_chunk as chunk;
pub use strata_common as common;
pub use strata_logger as logger;
pub use strata_nbt as nbt;
pub use strata_region as region;
pub use strata_world as world;

// Re-export commonly used items
pub use strata_chunk::{Block, Chunk};
pub use strata_common::{ChunkPos, RegionPos, Result, StrataError};
pub use strata_nbt::{NbtFile, Tag};
pub use strata_region::RegionHeader;
pub use strata_world::{Level, World, WorldConfig};
