use furrow_common::{Faction, PlayerId};
use glam::IVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A connected player.
///
/// Fields are read-only outside the kernel; positions only change through
/// the resolver, and a faction never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    id: PlayerId,
    position: IVec2,
    faction: Faction,
}

impl Player {
    pub fn new(id: PlayerId, position: IVec2, faction: Faction) -> Self {
        Self {
            id,
            position,
            faction,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn position(&self) -> IVec2 {
        self.position
    }

    pub fn faction(&self) -> Faction {
        self.faction
    }

    pub(crate) fn set_position(&mut self, position: IVec2) {
        self.position = position;
    }
}

/// Connected players keyed by connection identity.
#[derive(Debug, Clone, Default)]
pub struct PlayerRegistry {
    /// BTreeMap for deterministic iteration order.
    players: BTreeMap<PlayerId, Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player with a uniformly random spawn in `[0, spawn_extent)^2`
    /// and a uniformly random faction.
    ///
    /// Adding an id that is already registered returns the existing record.
    pub fn add_player<R: Rng>(
        &mut self,
        id: PlayerId,
        spawn_extent: i32,
        rng: &mut R,
    ) -> &Player {
        self.players.entry(id).or_insert_with(|| {
            let position = IVec2::new(
                rng.random_range(0..spawn_extent),
                rng.random_range(0..spawn_extent),
            );
            let faction = if rng.random_bool(0.5) {
                Faction::Digger
            } else {
                Faction::Restorer
            };
            Player::new(id, position, faction)
        })
    }

    /// Register a player with a known position and faction. Replaces any previous record.
    pub fn insert(&mut self, player: Player) -> Option<Player> {
        self.players.insert(player.id, player)
    }

    /// Remove a player. Removing an unknown id is a no-op.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        self.players.remove(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// Read-only view of every player, in canonical id order.
    pub fn all_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
