use furrow_common::{Faction, PlayerId};
use furrow_kernel::World;

/// World inspector for developer tooling.
///
/// Provides read-only queries against the world state for logging and the CLI.
pub struct WorldInspector;

impl WorldInspector {
    /// Produce a summary of the world state.
    pub fn summary(world: &World) -> WorldSummary {
        let diggers = world
            .players()
            .all_players()
            .filter(|p| p.faction() == Faction::Digger)
            .count();
        let trees = world
            .chunks()
            .iter()
            .flat_map(|(_, chunk)| chunk.tiles())
            .filter(|t| t.has_tree())
            .count();
        WorldSummary {
            tick: world.tick(),
            seed: world.seed(),
            player_count: world.players().len(),
            diggers,
            restorers: world.players().len() - diggers,
            chunk_count: world.chunks().len(),
            trees,
            pending_events: world.events().len(),
        }
    }

    pub fn inspect_player(world: &World, id: PlayerId) -> Option<PlayerInfo> {
        world.player(id).map(|p| PlayerInfo {
            id,
            position: [p.position().x, p.position().y],
            faction: p.faction(),
        })
    }

    /// List all player IDs in the world.
    pub fn list_players(world: &World) -> Vec<PlayerId> {
        world.players().all_players().map(|p| p.id()).collect()
    }

    /// Count of generated tiles at each soil level, indexed by level.
    pub fn soil_histogram(world: &World) -> Vec<usize> {
        let mut histogram = vec![0; world.config().max_soil_level as usize + 1];
        for (_, chunk) in world.chunks().iter() {
            for tile in chunk.tiles() {
                histogram[tile.soil_level() as usize] += 1;
            }
        }
        histogram
    }
}

/// Summary of world state for the inspector.
#[derive(Debug, Clone)]
pub struct WorldSummary {
    pub tick: u64,
    pub seed: u64,
    pub player_count: usize,
    pub diggers: usize,
    pub restorers: usize,
    pub chunk_count: usize,
    pub trees: usize,
    pub pending_events: usize,
}

impl std::fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "World: tick={} seed={:#x} players={} (diggers={} restorers={}) chunks={} trees={} pending_events={}",
            self.tick,
            self.seed,
            self.player_count,
            self.diggers,
            self.restorers,
            self.chunk_count,
            self.trees,
            self.pending_events
        )
    }
}

/// Detailed info about a single player.
#[derive(Debug, Clone)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub position: [i32; 2],
    pub faction: Faction,
}

impl std::fmt::Display for PlayerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Player [{:.8}] {:?} at ({}, {})",
            &self.id.0.to_string()[..8],
            self.faction,
            self.position[0],
            self.position[1],
        )
    }
}
