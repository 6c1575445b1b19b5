use serde::{Deserialize, Serialize};

/// What happens when a move would cross the edge of `[0, world_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// The move is ignored.
    #[default]
    Clamp,
    /// The player reappears on the opposite edge.
    Wrap,
    /// There is no edge; spawn still happens inside `[0, world_size)`.
    Unbounded,
}

/// How a freshly referenced chunk is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPolicy {
    /// Every tile starts at `initial_soil_level` with no tree.
    #[default]
    Flat,
    /// Soil levels are hashed from the world seed and tile position, no trees.
    Seeded,
}

/// Tunables for the simulated world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Tiles per chunk edge.
    pub chunk_size: i32,
    pub max_soil_level: u8,
    /// Soil level used by [`GenerationPolicy::Flat`].
    pub initial_soil_level: u8,
    /// Spawn area edge length, and the world edge for `Clamp`/`Wrap`.
    pub world_size: i32,
    pub edges: EdgeMode,
    /// Seed for spawn placement, faction choice and seeded generation.
    pub seed: u64,
    pub generation: GenerationPolicy,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            max_soil_level: 10,
            initial_soil_level: 5,
            world_size: 50,
            edges: EdgeMode::Clamp,
            seed: 42,
            generation: GenerationPolicy::Flat,
        }
    }
}

/// Largest accepted `chunk_size`. Keeps a chunk's tile count well inside `usize`.
pub const MAX_CHUNK_SIZE: i32 = 1024;

/// A world configuration value that cannot be simulated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldConfigError {
    #[error("chunk_size must be in 1..={max}, got {0}", max = MAX_CHUNK_SIZE)]
    ChunkSize(i32),
    #[error("world_size must be positive, got {0}")]
    WorldSize(i32),
    #[error("initial_soil_level {initial} exceeds max_soil_level {max}")]
    InitialSoil { initial: u8, max: u8 },
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), WorldConfigError> {
        if !(1..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(WorldConfigError::ChunkSize(self.chunk_size));
        }
        if self.world_size <= 0 {
            return Err(WorldConfigError::WorldSize(self.world_size));
        }
        if self.initial_soil_level > self.max_soil_level {
            return Err(WorldConfigError::InitialSoil {
                initial: self.initial_soil_level,
                max: self.max_soil_level,
            });
        }
        Ok(())
    }
}
