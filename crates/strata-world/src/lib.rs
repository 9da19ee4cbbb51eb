//! Cached block access over region files, and the save directory around it.

pub mod config;
pub mod level;
pub mod lru;
pub mod world;

pub use config::WorldConfig;
pub use level::Level;
pub use world::World;
