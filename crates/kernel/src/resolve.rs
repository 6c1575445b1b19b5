//! Action resolution: applies one queued input to one player.
//!
//! Invalid or precondition-failing inputs are not errors. They leave the
//! world untouched and report `false`.

use furrow_common::{Direction, Faction, PlayerInput, TileActionKind};
use glam::IVec2;

use crate::chunk::{ChunkStore, Tile};
use crate::config::{EdgeMode, WorldConfig};
use crate::player::Player;

/// Apply `input` to `player` and, for terrain actions, to the tile it stands on.
///
/// Returns whether anything changed. Only the acting player and the tile at
/// its current position are ever touched.
pub fn resolve(
    player: &mut Player,
    input: PlayerInput,
    chunks: &mut ChunkStore,
    config: &WorldConfig,
) -> bool {
    match input {
        PlayerInput::Move(direction) => match step(player.position(), direction, config) {
            Some(next) => {
                player.set_position(next);
                true
            }
            None => false,
        },
        PlayerInput::TileAction(kind) => {
            let tile = chunks.tile_mut(player.position());
            apply_tile_action(tile, player.faction(), kind, config.max_soil_level)
        }
    }
}

/// Destination of a one-tile move, or `None` if the edge rules forbid it.
fn step(from: IVec2, direction: Direction, config: &WorldConfig) -> Option<IVec2> {
    let candidate = from + direction.offset();
    let size = config.world_size;
    match config.edges {
        EdgeMode::Clamp => {
            let inside = (0..size).contains(&candidate.x) && (0..size).contains(&candidate.y);
            inside.then_some(candidate)
        }
        EdgeMode::Wrap => Some(IVec2::new(
            candidate.x.rem_euclid(size),
            candidate.y.rem_euclid(size),
        )),
        EdgeMode::Unbounded => Some(candidate),
    }
}

fn apply_tile_action(tile: &mut Tile, faction: Faction, kind: TileActionKind, max_soil: u8) -> bool {
    match (kind, faction) {
        (TileActionKind::Dig, Faction::Digger) if tile.soil_level() > 0 => {
            tile.set_soil_level(tile.soil_level() - 1);
            // Erosion uproots any standing tree.
            tile.set_tree(false);
            true
        }
        (TileActionKind::Fill, Faction::Restorer) if tile.soil_level() < max_soil => {
            tile.set_soil_level(tile.soil_level() + 1);
            true
        }
        (TileActionKind::Plant, Faction::Restorer)
            if tile.soil_level() == max_soil && !tile.has_tree() =>
        {
            tile.set_tree(true);
            true
        }
        (TileActionKind::Chop, Faction::Digger) if tile.has_tree() => {
            tile.set_tree(false);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use furrow_common::PlayerId;

    const MAX: u8 = 10;

    fn setup(faction: Faction, tile: Tile) -> (Player, ChunkStore, WorldConfig) {
        let config = WorldConfig::default();
        let mut chunks = ChunkStore::new(&config);
        *chunks.tile_mut(IVec2::new(3, 4)) = tile;
        let player = Player::new(PlayerId::new(), IVec2::new(3, 4), faction);
        (player, chunks, config)
    }

    fn act(faction: Faction, tile: Tile, kind: TileActionKind) -> (bool, Tile) {
        let (mut player, mut chunks, config) = setup(faction, tile);
        let applied = resolve(&mut player, PlayerInput::TileAction(kind), &mut chunks, &config);
        (applied, *chunks.tile(IVec2::new(3, 4)))
    }

    #[test]
    fn dig_lowers_soil() {
        let (ok, tile) = act(Faction::Digger, Tile::new(5, false), TileActionKind::Dig);
        assert!(ok);
        assert_eq!(tile.soil_level(), 4);
    }

    #[test]
    fn dig_uproots_tree() {
        let (ok, tile) = act(Faction::Digger, Tile::new(MAX, true), TileActionKind::Dig);
        assert!(ok);
        assert_eq!(tile.soil_level(), MAX - 1);
        assert!(!tile.has_tree());
    }

    #[test]
    fn dig_on_bare_rock_is_noop() {
        let (ok, tile) = act(Faction::Digger, Tile::new(0, false), TileActionKind::Dig);
        assert!(!ok);
        assert_eq!(tile, Tile::new(0, false));
    }

    #[test]
    fn fill_stops_at_max() {
        let (ok, tile) = act(Faction::Restorer, Tile::new(MAX - 1, false), TileActionKind::Fill);
        assert!(ok);
        assert_eq!(tile.soil_level(), MAX);
        let (ok, tile) = act(Faction::Restorer, Tile::new(MAX, false), TileActionKind::Fill);
        assert!(!ok);
        assert_eq!(tile.soil_level(), MAX);
    }

    #[test]
    fn plant_requires_full_soil_and_no_tree() {
        let (ok, tile) = act(Faction::Restorer, Tile::new(MAX, false), TileActionKind::Plant);
        assert!(ok && tile.has_tree());

        let (ok, tile) = act(Faction::Restorer, Tile::new(MAX - 1, false), TileActionKind::Plant);
        assert!(!ok && !tile.has_tree());

        let (ok, tile) = act(Faction::Restorer, Tile::new(MAX, true), TileActionKind::Plant);
        assert!(!ok && tile.has_tree());
    }

    #[test]
    fn chop_requires_tree() {
        let (ok, tile) = act(Faction::Digger, Tile::new(MAX, true), TileActionKind::Chop);
        assert!(ok);
        assert_eq!(tile, Tile::new(MAX, false));
        let (ok, _) = act(Faction::Digger, Tile::new(MAX, false), TileActionKind::Chop);
        assert!(!ok);
    }

    #[test]
    fn factions_cannot_use_each_others_actions() {
        let forbidden = [
            (Faction::Restorer, TileActionKind::Dig),
            (Faction::Restorer, TileActionKind::Chop),
            (Faction::Digger, TileActionKind::Fill),
            (Faction::Digger, TileActionKind::Plant),
        ];
        for tile in [Tile::new(0, false), Tile::new(5, true), Tile::new(MAX, false), Tile::new(MAX, true)] {
            for (faction, kind) in forbidden {
                let (ok, after) = act(faction, tile, kind);
                assert!(!ok, "{faction:?} {kind:?} on {tile:?}");
                assert_eq!(after, tile);
            }
        }
    }

    #[test]
    fn soil_stays_in_bounds_under_any_sequence() {
        let config = WorldConfig::default();
        let mut chunks = ChunkStore::new(&config);
        let mut digger = Player::new(PlayerId::new(), IVec2::ZERO, Faction::Digger);
        let mut restorer = Player::new(PlayerId::new(), IVec2::ZERO, Faction::Restorer);
        // Deterministic pseudo-random interleaving of digs and fills.
        let mut state = 0x2545_f491_4f6c_dd1du64;
        for _ in 0..2_000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            if state % 2 == 0 {
                resolve(&mut digger, PlayerInput::TileAction(TileActionKind::Dig), &mut chunks, &config);
            } else {
                resolve(&mut restorer, PlayerInput::TileAction(TileActionKind::Fill), &mut chunks, &config);
            }
            assert!(chunks.tile(IVec2::ZERO).soil_level() <= config.max_soil_level);
        }
    }

    #[test]
    fn clamped_move_ignored_at_edge() {
        let config = WorldConfig::default();
        let mut chunks = ChunkStore::new(&config);
        let mut player = Player::new(PlayerId::new(), IVec2::new(0, 49), Faction::Digger);
        assert!(!resolve(&mut player, PlayerInput::Move(Direction::Left), &mut chunks, &config));
        assert!(!resolve(&mut player, PlayerInput::Move(Direction::Down), &mut chunks, &config));
        assert_eq!(player.position(), IVec2::new(0, 49));
        assert!(resolve(&mut player, PlayerInput::Move(Direction::Up), &mut chunks, &config));
        assert_eq!(player.position(), IVec2::new(0, 48));
    }

    #[test]
    fn wrapped_move_crosses_edge() {
        let config = WorldConfig {
            edges: EdgeMode::Wrap,
            ..WorldConfig::default()
        };
        let mut chunks = ChunkStore::new(&config);
        let mut player = Player::new(PlayerId::new(), IVec2::new(0, 0), Faction::Digger);
        assert!(resolve(&mut player, PlayerInput::Move(Direction::Left), &mut chunks, &config));
        assert_eq!(player.position(), IVec2::new(49, 0));
    }

    #[test]
    fn unbounded_move_goes_negative() {
        let config = WorldConfig {
            edges: EdgeMode::Unbounded,
            ..WorldConfig::default()
        };
        let mut chunks = ChunkStore::new(&config);
        let mut player = Player::new(PlayerId::new(), IVec2::new(0, 0), Faction::Restorer);
        assert!(resolve(&mut player, PlayerInput::Move(Direction::Up), &mut chunks, &config));
        assert_eq!(player.position(), IVec2::new(0, -1));
        // Acting on a negative coordinate lands in chunk (0, -1).
        assert!(resolve(&mut player, PlayerInput::TileAction(TileActionKind::Fill), &mut chunks, &config));
        assert_eq!(chunks.tile(IVec2::new(0, -1)).soil_level(), 6);
    }

    #[test]
    fn moves_do_not_touch_chunks() {
        let config = WorldConfig::default();
        let mut chunks = ChunkStore::new(&config);
        let mut player = Player::new(PlayerId::new(), IVec2::new(10, 10), Faction::Digger);
        resolve(&mut player, PlayerInput::Move(Direction::Right), &mut chunks, &config);
        assert!(chunks.is_empty());
    }
}
