use furrow_common::{Faction, PlayerId, PlayerInput, TileActionKind};
use glam::IVec2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkCoord, ChunkStore, Tile};
use crate::config::WorldConfig;
use crate::player::{Player, PlayerRegistry};
use crate::resolve::resolve;

/// An event record produced by every mutation to the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// Player joined at the given position.
    Joined {
        id: PlayerId,
        position: IVec2,
        faction: Faction,
    },
    /// Player left. Carries its last position.
    Left { id: PlayerId, position: IVec2 },
    /// A move was applied.
    Moved { id: PlayerId, from: IVec2, to: IVec2 },
    /// A terrain action was applied to the tile at `position`.
    TileChanged {
        id: PlayerId,
        position: IVec2,
        action: TileActionKind,
        before: Tile,
        after: Tile,
    },
    /// Simulation advanced one tick.
    Stepped { tick: u64, seed: u64 },
}

/// The authoritative world: chunk store plus player registry.
///
/// One owner holds this value and is the only writer. Everyone else sees
/// shared references, so faction and soil rules cannot be bypassed.
#[derive(Debug, Clone)]
pub struct World {
    config: WorldConfig,
    chunks: ChunkStore,
    players: PlayerRegistry,
    tick: u64,
    /// Replay checksum chained through splitmix64 once per step. Folded into
    /// `state_hash` and `Stepped` events; no simulation decision reads it.
    seed: u64,
    /// Drives spawn placement and faction choice. Independent of `seed`, so
    /// spawns depend only on join order.
    rng: StdRng,
    /// Append-only event log of all mutations since the last drain.
    event_log: Vec<WorldEvent>,
}

impl World {
    /// Create an empty world at tick 0.
    pub fn new(config: WorldConfig) -> Self {
        Self {
            chunks: ChunkStore::new(&config),
            players: PlayerRegistry::new(),
            tick: 0,
            seed: config.seed,
            rng: StdRng::seed_from_u64(config.seed),
            event_log: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Current simulation tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    /// Add a player at a random spawn point with a random faction.
    pub fn join(&mut self, id: PlayerId) -> Player {
        if let Some(existing) = self.players.get(id) {
            return *existing;
        }
        let player = *self
            .players
            .add_player(id, self.config.world_size, &mut self.rng);
        self.record_join(&player);
        player
    }

    /// Add a player at a known position (scenarios, tests).
    pub fn join_at(&mut self, id: PlayerId, position: IVec2, faction: Faction) -> Player {
        let player = Player::new(id, position, faction);
        self.players.insert(player);
        self.record_join(&player);
        player
    }

    fn record_join(&mut self, player: &Player) {
        self.event_log.push(WorldEvent::Joined {
            id: player.id(),
            position: player.position(),
            faction: player.faction(),
        });
    }

    /// Remove a player. Removing an unknown player is a no-op.
    pub fn leave(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove_player(id)?;
        self.event_log.push(WorldEvent::Left {
            id,
            position: player.position(),
        });
        Some(player)
    }

    /// Resolve one input for one player. Unknown players are ignored.
    pub fn apply(&mut self, id: PlayerId, input: PlayerInput) -> bool {
        let Some(player) = self.players.get_mut(id) else {
            tracing::trace!(%id, "input for departed player discarded");
            return false;
        };
        let from = player.position();

        let event = match input {
            PlayerInput::Move(_) => {
                if !resolve(player, input, &mut self.chunks, &self.config) {
                    return false;
                }
                WorldEvent::Moved {
                    id,
                    from,
                    to: player.position(),
                }
            }
            PlayerInput::TileAction(action) => {
                let before = *self.chunks.tile(from);
                if !resolve(player, input, &mut self.chunks, &self.config) {
                    return false;
                }
                WorldEvent::TileChanged {
                    id,
                    position: from,
                    action,
                    before,
                    after: *self.chunks.tile(from),
                }
            }
        };
        tracing::trace!(?event, "resolved");
        self.event_log.push(event);
        true
    }

    /// Chunk at `coord`, generating it on first reference.
    pub fn chunk(&mut self, coord: ChunkCoord) -> &Chunk {
        self.chunks.get_or_create_chunk(coord)
    }

    /// Tile at a world position, generating its chunk on first reference.
    pub fn tile(&mut self, pos: IVec2) -> Tile {
        *self.chunks.tile(pos)
    }

    /// Generate every chunk within Chebyshev `radius` of `center`.
    pub fn materialize_window(&mut self, center: ChunkCoord, radius: i32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                self.chunks
                    .get_or_create_chunk(ChunkCoord::new(center.x + dx, center.y + dy));
            }
        }
    }

    /// Advance the simulation by one tick and chain the replay seed.
    pub fn step(&mut self) {
        self.tick += 1;
        self.seed = splitmix64(self.seed);
        self.event_log.push(WorldEvent::Stepped {
            tick: self.tick,
            seed: self.seed,
        });
    }

    /// Compute a deterministic hash of the world state for comparison.
    /// Uses canonical (BTreeMap) iteration order.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&mut h, &self.tick.to_le_bytes());
        mix(&mut h, &self.seed.to_le_bytes());
        for player in self.players.all_players() {
            mix(&mut h, player.id().0.as_bytes());
            mix(&mut h, &player.position().x.to_le_bytes());
            mix(&mut h, &player.position().y.to_le_bytes());
            mix(&mut h, &[player.faction() as u8]);
        }
        for (coord, chunk) in self.chunks.iter() {
            mix(&mut h, &coord.x.to_le_bytes());
            mix(&mut h, &coord.y.to_le_bytes());
            for tile in chunk.tiles() {
                mix(&mut h, &[tile.soil_level(), tile.has_tree() as u8]);
            }
        }
        h
    }
}

/// Splitmix64: a fast, high-quality deterministic PRNG step function.
pub(crate) fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
