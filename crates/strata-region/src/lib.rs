//! Region files: a two-sector location/timestamp header followed by chunk
//! payloads allocated in 4096-byte sectors.

pub mod guard;
pub mod header;
pub mod payload;
pub mod stream;

pub use guard::RetainPosition;
pub use header::{ChunkLocation, RegionHeader};
pub use stream::RegionStream;

/// minecraft uses 4096 bytes per sector
pub const SECTOR_BYTES: u64 = 4096;
/// location table + timestamp table
pub const HEADER_BYTES: u64 = 2 * SECTOR_BYTES;
/// 32x32 chunks per region
pub const SLOTS: usize = 1024;
/// Sector offsets are stored in 3 bytes.
pub const MAX_SECTOR_OFFSET: u32 = 0x00FF_FFFF;
