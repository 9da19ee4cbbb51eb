use std::fmt;
use strata_common::{Result, StrataError};

/// Highest id the packed section layout can hold (8 bits + 4 add bits).
pub const MAX_BLOCK_ID: u16 = 0x0FFF;
pub const MAX_BLOCK_DATA: u8 = 0x0F;

/// One voxel. Ids are opaque; only 0 (air) has a meaning here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Block {
    pub id: u16,
    pub data: u8,
}

impl Block {
    pub const AIR: Block = Block { id: 0, data: 0 };

    pub fn new(id: u16, data: u8) -> Self {
        Block { id, data }
    }

    pub fn is_air(&self) -> bool {
        self.id == 0
    }

    /// Fails for ids or data values that would be truncated when packed.
    pub fn check(&self) -> Result<()> {
        if self.id > MAX_BLOCK_ID || self.data > MAX_BLOCK_DATA {
            return Err(StrataError::bounds(format!(
                "Block {} does not fit in 12 id bits and 4 data bits",
                self
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.data == 0 {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{}:{}", self.id, self.data)
        }
    }
}
