//! Tileview Cache Library
//!
//! Tile pool with LRU eviction. Tiles are rendered on demand by a background
//! worker pool and kept resident up to a ceiling derived from the render
//! queue capacity.

pub mod cell;
pub mod config;
mod job;
pub mod lru;
pub mod pool;

pub use cell::{TileCell, TileState};
pub use config::PoolConfig;
pub use job::{TileEvent, TilePoolListener};
pub use lru::{LruArena, SlotId};
pub use pool::{CacheStats, TilePool};
