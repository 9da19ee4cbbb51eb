use flate2::Compression;
use serde::{Deserialize, Serialize};
use strata_common::{Result, StrataError};

pub const DEFAULT_MAX_CHUNKS: usize = 32;
pub const DEFAULT_MAX_REGIONS: usize = 4;
pub const DEFAULT_REGION_EXTENSION: &str = "mca";
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Cache limits and on-disk options of a [`World`](crate::World).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Decoded chunks kept in memory before the least recently used one is
    /// written back and dropped.
    pub max_chunks: usize,
    /// Region files kept open at once.
    pub max_regions: usize,
    pub region_extension: String,
    /// zlib level, 0 to 9.
    pub compression_level: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            max_chunks: DEFAULT_MAX_CHUNKS,
            max_regions: DEFAULT_MAX_REGIONS,
            region_extension: DEFAULT_REGION_EXTENSION.to_string(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl WorldConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: WorldConfig = serde_json::from_str(json)
            .map_err(|e| StrataError::format(format!("Invalid world config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chunks == 0 || self.max_regions == 0 {
            return Err(StrataError::format(
                "World config needs room for at least one chunk and one region",
            ));
        }
        if self.compression_level > 9 {
            return Err(StrataError::format(format!(
                "Compression level {} is not in 0..=9",
                self.compression_level
            )));
        }
        if self.region_extension.is_empty() || self.region_extension.contains('/') {
            return Err(StrataError::format(format!(
                "Invalid region extension {:?}",
                self.region_extension
            )));
        }
        Ok(())
    }

    pub fn compression(&self) -> Compression {
        Compression::new(self.compression_level)
    }
}
