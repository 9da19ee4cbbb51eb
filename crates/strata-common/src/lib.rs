pub mod error;
pub mod types;

pub use error::StrataError;
pub use types::{ChunkPos, RegionPos, Result};
