use glam::IVec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{GenerationPolicy, WorldConfig};
use crate::world::splitmix64;

/// Smallest unit of terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    soil_level: u8,
    has_tree: bool,
}

impl Tile {
    pub fn new(soil_level: u8, has_tree: bool) -> Self {
        Self {
            soil_level,
            has_tree,
        }
    }

    pub fn soil_level(&self) -> u8 {
        self.soil_level
    }

    pub fn has_tree(&self) -> bool {
        self.has_tree
    }

    pub(crate) fn set_soil_level(&mut self, level: u8) {
        self.soil_level = level;
    }

    pub(crate) fn set_tree(&mut self, has_tree: bool) {
        self.has_tree = has_tree;
    }
}

/// Integer chunk coordinate: `floor(world / chunk_size)` on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk containing the given world position. Floors toward negative infinity.
    pub fn of(pos: IVec2, chunk_size: i32) -> Self {
        Self {
            x: pos.x.div_euclid(chunk_size),
            y: pos.y.div_euclid(chunk_size),
        }
    }

    /// World position of this chunk's (0, 0) tile.
    pub fn origin(self, chunk_size: i32) -> IVec2 {
        IVec2::new(self.x * chunk_size, self.y * chunk_size)
    }

    /// Chebyshev distance in chunk space.
    pub fn chebyshev(self, other: ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Tile position inside its chunk: `world mod chunk_size` (never negative).
pub fn local_coord(pos: IVec2, chunk_size: i32) -> IVec2 {
    IVec2::new(pos.x.rem_euclid(chunk_size), pos.y.rem_euclid(chunk_size))
}

/// Square grid of `size * size` tiles stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    size: i32,
    tiles: Vec<Tile>,
}

impl Chunk {
    fn filled(size: i32, tile: Tile) -> Self {
        let side = usize::try_from(size).unwrap_or(0);
        Self {
            size,
            tiles: vec![tile; side * side],
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    fn index(&self, local: IVec2) -> usize {
        debug_assert!(local.x >= 0 && local.x < self.size && local.y >= 0 && local.y < self.size);
        (local.y * self.size + local.x) as usize
    }

    pub fn tile(&self, local: IVec2) -> &Tile {
        &self.tiles[self.index(local)]
    }

    pub(crate) fn tile_mut(&mut self, local: IVec2) -> &mut Tile {
        let index = self.index(local);
        &mut self.tiles[index]
    }

    /// Tiles in row-major order (`y` outer, `x` inner).
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Rows of tiles, indexed `[y][x]`.
    pub fn rows(&self) -> Vec<Vec<Tile>> {
        self.tiles
            .chunks(self.size as usize)
            .map(<[Tile]>::to_vec)
            .collect()
    }

    /// Soil level of every tile, row-major. Used to detect changes between broadcasts.
    pub fn soil_levels(&self) -> Vec<u8> {
        self.tiles.iter().map(Tile::soil_level).collect()
    }
}

/// Sparse, lazily populated chunk grid.
///
/// Chunks are created on first reference and kept for the lifetime of the
/// store. Memory grows with the explored area; this is acceptable for bounded
/// or moderately sized worlds only.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    chunk_size: i32,
    generator: ChunkGenerator,
    /// BTreeMap for deterministic iteration order.
    chunks: BTreeMap<ChunkCoord, Chunk>,
}

impl ChunkStore {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            generator: ChunkGenerator {
                chunk_size: config.chunk_size,
                max_soil_level: config.max_soil_level,
                initial_soil_level: config.initial_soil_level,
                policy: config.generation,
                seed: config.seed,
            },
            chunks: BTreeMap::new(),
        }
    }

    pub fn chunk_size(&self) -> i32 {
        self.chunk_size
    }

    /// Split a world position into its chunk and local tile coordinate.
    pub fn locate(&self, pos: IVec2) -> (ChunkCoord, IVec2) {
        (
            ChunkCoord::of(pos, self.chunk_size),
            local_coord(pos, self.chunk_size),
        )
    }

    /// Return the chunk at `coord`, generating it first if it does not exist yet.
    pub fn get_or_create_chunk(&mut self, coord: ChunkCoord) -> &Chunk {
        self.chunk_entry(coord)
    }

    fn chunk_entry(&mut self, coord: ChunkCoord) -> &mut Chunk {
        let generator = &self.generator;
        self.chunks.entry(coord).or_insert_with(|| {
            tracing::trace!(x = coord.x, y = coord.y, "generating chunk");
            generator.generate(coord)
        })
    }

    /// Existing chunk at `coord`, without generating.
    pub fn get(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// Tile at a world position. Generates the backing chunk if needed.
    pub fn tile(&mut self, pos: IVec2) -> &Tile {
        self.tile_mut(pos)
    }

    pub(crate) fn tile_mut(&mut self, pos: IVec2) -> &mut Tile {
        let (coord, local) = self.locate(pos);
        self.chunk_entry(coord).tile_mut(local)
    }

    /// Tile at a world position if its chunk has already been generated.
    pub fn peek_tile(&self, pos: IVec2) -> Option<&Tile> {
        let (coord, local) = self.locate(pos);
        self.chunks.get(&coord).map(|chunk| chunk.tile(local))
    }

    /// Number of generated chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// All generated chunks in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&ChunkCoord, &Chunk)> {
        self.chunks.iter()
    }
}

/// Fills new chunks according to the configured [`GenerationPolicy`].
#[derive(Debug, Clone)]
struct ChunkGenerator {
    chunk_size: i32,
    max_soil_level: u8,
    initial_soil_level: u8,
    policy: GenerationPolicy,
    seed: u64,
}

impl ChunkGenerator {
    fn generate(&self, coord: ChunkCoord) -> Chunk {
        match self.policy {
            GenerationPolicy::Flat => {
                Chunk::filled(self.chunk_size, Tile::new(self.initial_soil_level, false))
            }
            GenerationPolicy::Seeded => {
                let mut chunk = Chunk::filled(self.chunk_size, Tile::new(0, false));
                let chunk_key = ((coord.x as u32 as u64) << 32) | coord.y as u32 as u64;
                let base = splitmix64(self.seed ^ splitmix64(chunk_key));
                let levels = u64::from(self.max_soil_level) + 1;
                for (i, tile) in chunk.tiles.iter_mut().enumerate() {
                    let h = splitmix64(base ^ i as u64);
                    tile.soil_level = (h % levels) as u8;
                }
                chunk
            }
        }
    }
}
