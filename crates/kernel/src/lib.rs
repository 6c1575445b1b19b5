//! World Kernel: authoritative tile world, player registry, action resolution.
//!
//! # Invariants
//! - `0 <= soil_level <= max_soil_level` holds for every tile after every resolution.
//! - Only `plant` sets a tree; only `dig` and `chop` clear one.
//! - All state mutations flow through [`World`]; callers only ever see shared references.
//! - Chunks are generated on first reference and never removed.

pub mod chunk;
pub mod config;
pub mod player;
pub mod resolve;
pub mod world;

pub use chunk::{Chunk, ChunkCoord, ChunkStore, Tile};
pub use config::{EdgeMode, GenerationPolicy, MAX_CHUNK_SIZE, WorldConfig, WorldConfigError};
pub use player::{Player, PlayerRegistry};
pub use resolve::resolve;
pub use world::{World, WorldEvent};
