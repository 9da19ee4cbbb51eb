//! Chunk model and its tag tree encoding.

pub mod block;
pub mod chunk;
pub mod section;
pub mod transcode;

pub use block::Block;
pub use chunk::Chunk;
pub use section::Section;
