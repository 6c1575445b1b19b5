use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use furrow_common::PlayerId;
use furrow_kernel::{Chunk, ChunkCoord, Player, World};
use serde::{Deserialize, Serialize};

use crate::diff::soil_diffs;
use crate::payload::{ChunkView, DiffHint, InitPayload, PlayerView, TickPayload};
use crate::window::ChunkWindow;

/// Which part of the world each client receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityMode {
    /// Every client receives every player and every generated chunk.
    Global,
    /// Every client receives only its own chunk window.
    #[default]
    Scoped,
}

/// Visibility configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    pub mode: VisibilityMode,
    /// Edge length of the chunk window, in chunks. Must be odd.
    pub visible_chunks: i32,
    /// Attach soil-change hints to tick payloads.
    pub diff_hints: bool,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            mode: VisibilityMode::Scoped,
            visible_chunks: 3,
            diff_hints: true,
        }
    }
}

/// Largest accepted `visible_chunks`. Bounds the chunks generated per player per tick.
pub const MAX_VISIBLE_CHUNKS: i32 = 33;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VisibilityConfigError {
    #[error("visible_chunks must be an odd number in 1..={max}, got {0}", max = MAX_VISIBLE_CHUNKS)]
    VisibleChunks(i32),
}

impl VisibilityConfig {
    /// Chebyshev radius of the window around the viewer's chunk.
    pub fn radius(&self) -> i32 {
        self.visible_chunks / 2
    }

    pub fn validate(&self) -> Result<(), VisibilityConfigError> {
        if !(1..=MAX_VISIBLE_CHUNKS).contains(&self.visible_chunks) || self.visible_chunks % 2 == 0 {
            return Err(VisibilityConfigError::VisibleChunks(self.visible_chunks));
        }
        Ok(())
    }
}

/// Whose last-sent soil snapshot a diff is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Audience {
    Everyone,
    Player(PlayerId),
}

/// Builds join and tick payloads and remembers what was last sent for diff hints.
#[derive(Debug)]
pub struct VisibilityPolicy {
    config: VisibilityConfig,
    last_sent: HashMap<Audience, HashMap<ChunkCoord, Vec<u8>>>,
    /// Players who have received at least one global payload.
    global_recipients: HashSet<PlayerId>,
}

impl VisibilityPolicy {
    pub fn new(config: VisibilityConfig) -> Self {
        Self {
            config,
            last_sent: HashMap::new(),
            global_recipients: HashSet::new(),
        }
    }

    pub fn config(&self) -> &VisibilityConfig {
        &self.config
    }

    /// Join payload for a freshly joined player. Generates the chunk window
    /// around the spawn point.
    pub fn init_payload(&mut self, world: &mut World, player: &Player) -> InitPayload {
        let chunk_size = world.config().chunk_size;
        let window = ChunkWindow::around(player.position(), chunk_size, self.config.radius());
        world.materialize_window(window.center(), window.radius());
        let world: &World = world;

        let chunks = match self.config.mode {
            VisibilityMode::Global => None,
            VisibilityMode::Scoped => {
                let chunks = window_chunks(world, &window);
                if self.config.diff_hints {
                    self.diff_and_record(Audience::Player(player.id()), &chunks, chunk_size);
                }
                Some(views(&chunks))
            }
        };

        InitPayload {
            player: PlayerView::from(player),
            chunk_size,
            visible_chunks: self.config.visible_chunks,
            max_soil_level: world.config().max_soil_level,
            chunks,
        }
    }

    /// Drop any state kept for a departed player.
    pub fn forget(&mut self, id: PlayerId) {
        self.last_sent.remove(&Audience::Player(id));
        self.global_recipients.remove(&id);
    }

    /// Build one payload per connected player.
    ///
    /// Under global visibility every entry shares the same payload, except
    /// that a player's first one carries empty hints: it has no earlier
    /// snapshot for them to describe.
    pub fn broadcast(&mut self, world: &mut World) -> Vec<(PlayerId, Arc<TickPayload>)> {
        let _span = tracing::debug_span!("visibility", mode = ?self.config.mode).entered();
        match self.config.mode {
            VisibilityMode::Global => self.broadcast_global(world),
            VisibilityMode::Scoped => self.broadcast_scoped(world),
        }
    }

    fn broadcast_global(&mut self, world: &World) -> Vec<(PlayerId, Arc<TickPayload>)> {
        let chunk_size = world.config().chunk_size;
        let chunks: Vec<(ChunkCoord, &Chunk)> =
            world.chunks().iter().map(|(c, chunk)| (*c, chunk)).collect();
        let diffs = self
            .config
            .diff_hints
            .then(|| self.diff_and_record(Audience::Everyone, &chunks, chunk_size));

        let payload = Arc::new(TickPayload::Global {
            tick: world.tick(),
            players: world.players().all_players().map(PlayerView::from).collect(),
            chunks: views(&chunks),
            diffs,
        });
        let mut first_payload: Option<Arc<TickPayload>> = None;

        let mut out = Vec::with_capacity(world.players().len());
        for player in world.players().all_players() {
            let id = player.id();
            let shared = if self.global_recipients.insert(id) && self.config.diff_hints {
                let first = first_payload.get_or_insert_with(|| {
                    let mut fresh = TickPayload::clone(&payload);
                    if let TickPayload::Global { diffs, .. } = &mut fresh {
                        *diffs = Some(Vec::new());
                    }
                    Arc::new(fresh)
                });
                Arc::clone(first)
            } else {
                Arc::clone(&payload)
            };
            out.push((id, shared));
        }
        self.global_recipients.retain(|id| world.players().contains(*id));
        out
    }

    fn broadcast_scoped(&mut self, world: &mut World) -> Vec<(PlayerId, Arc<TickPayload>)> {
        let chunk_size = world.config().chunk_size;
        let radius = self.config.radius();
        let windows: Vec<(Player, ChunkWindow)> = world
            .players()
            .all_players()
            .map(|p| (*p, ChunkWindow::around(p.position(), chunk_size, radius)))
            .collect();
        for (_, window) in &windows {
            world.materialize_window(window.center(), window.radius());
        }
        let world: &World = world;
        self.last_sent.retain(|audience, _| match audience {
            Audience::Everyone => true,
            Audience::Player(id) => world.players().contains(*id),
        });

        let mut out = Vec::with_capacity(windows.len());
        for (player, window) in &windows {
            let chunks = window_chunks(world, window);
            let diffs = self
                .config
                .diff_hints
                .then(|| self.diff_and_record(Audience::Player(player.id()), &chunks, chunk_size));
            let visible_players = window
                .visible_players(player, world.players().all_players(), chunk_size)
                .into_iter()
                .map(PlayerView::from)
                .collect();
            let payload = TickPayload::Scoped {
                tick: world.tick(),
                player: PlayerView::from(player),
                visible_players,
                chunks: views(&chunks),
                diffs,
            };
            out.push((player.id(), Arc::new(payload)));
        }
        out
    }

    /// Diff `chunks` against what `audience` last received, then remember them.
    ///
    /// Chunks the audience has not seen before produce no hints.
    fn diff_and_record(
        &mut self,
        audience: Audience,
        chunks: &[(ChunkCoord, &Chunk)],
        chunk_size: i32,
    ) -> Vec<DiffHint> {
        let previous = self.last_sent.remove(&audience).unwrap_or_default();
        let mut current = HashMap::with_capacity(chunks.len());
        let mut diffs = Vec::new();
        for (coord, chunk) in chunks {
            let levels = chunk.soil_levels();
            if let Some(before) = previous.get(coord) {
                diffs.extend(soil_diffs(*coord, chunk_size, before, &levels));
            }
            current.insert(*coord, levels);
        }
        self.last_sent.insert(audience, current);
        diffs
    }
}

fn window_chunks<'w>(world: &'w World, window: &ChunkWindow) -> Vec<(ChunkCoord, &'w Chunk)> {
    window
        .coords()
        .filter_map(|c| world.chunks().get(c).map(|chunk| (c, chunk)))
        .collect()
}

fn views(chunks: &[(ChunkCoord, &Chunk)]) -> Vec<ChunkView> {
    chunks
        .iter()
        .map(|(coord, chunk)| ChunkView::new(*coord, chunk))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use furrow_common::{Direction, Faction, PlayerInput, TileActionKind};
    use furrow_kernel::{EdgeMode, WorldConfig};
    use glam::IVec2;

    fn world() -> World {
        World::new(WorldConfig {
            edges: EdgeMode::Unbounded,
            ..WorldConfig::default()
        })
    }

    fn scoped() -> VisibilityPolicy {
        VisibilityPolicy::new(VisibilityConfig::default())
    }

    fn global() -> VisibilityPolicy {
        VisibilityPolicy::new(VisibilityConfig {
            mode: VisibilityMode::Global,
            ..VisibilityConfig::default()
        })
    }

    #[test]
    fn config_requires_odd_window() {
        assert!(VisibilityConfig::default().validate().is_ok());
        for bad in [0, -3, 4, MAX_VISIBLE_CHUNKS + 2, 1001] {
            let config = VisibilityConfig {
                visible_chunks: bad,
                ..VisibilityConfig::default()
            };
            assert_eq!(config.validate(), Err(VisibilityConfigError::VisibleChunks(bad)));
        }
    }

    #[test]
    fn largest_window_is_accepted() {
        let config = VisibilityConfig {
            visible_chunks: MAX_VISIBLE_CHUNKS,
            ..VisibilityConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn init_payload_scoped_includes_window() {
        let mut w = world();
        let player = w.join_at(PlayerId::new(), IVec2::new(20, 20), Faction::Digger);
        let init = scoped().init_payload(&mut w, &player);
        assert_eq!(init.chunk_size, 16);
        assert_eq!(init.visible_chunks, 3);
        assert_eq!(init.max_soil_level, 10);
        assert_eq!(init.chunks.as_ref().map(Vec::len), Some(9));
        assert_eq!(w.chunks().len(), 9);
    }

    #[test]
    fn init_payload_global_warms_spawn_without_sending_chunks() {
        let mut w = world();
        let player = w.join_at(PlayerId::new(), IVec2::new(20, 20), Faction::Digger);
        let init = global().init_payload(&mut w, &player);
        assert!(init.chunks.is_none());
        assert_eq!(w.chunks().len(), 9);
    }

    #[test]
    fn scoped_bounds_chunks_and_players() {
        let mut w = world();
        let positions = [(0, 0), (15, 15), (30, -10), (47, 0), (-40, -40), (200, 3)];
        let ids: Vec<PlayerId> = positions
            .iter()
            .map(|&(x, y)| {
                let id = PlayerId::new();
                w.join_at(id, IVec2::new(x, y), Faction::Restorer);
                id
            })
            .collect();

        let mut policy = scoped();
        let payloads = policy.broadcast(&mut w);
        assert_eq!(payloads.len(), ids.len());

        for (id, payload) in &payloads {
            let TickPayload::Scoped {
                player,
                visible_players,
                chunks,
                ..
            } = payload.as_ref()
            else {
                panic!("expected scoped payload");
            };
            assert_eq!(player.id, *id);
            assert!(chunks.len() <= 9);
            let me = ChunkCoord::of(IVec2::new(player.x, player.y), 16);
            for chunk in chunks {
                assert!(me.chebyshev(chunk.coord()) <= 1);
            }
            for other in visible_players {
                assert_ne!(other.id, *id);
                assert!(me.chebyshev(ChunkCoord::of(IVec2::new(other.x, other.y), 16)) <= 1);
            }
        }

        // (0,0) sees (15,15) and (30,-10) but not (47,0), (-40,-40) or (200,3).
        let (_, first) = payloads.iter().find(|(id, _)| *id == ids[0]).unwrap();
        let TickPayload::Scoped { visible_players, .. } = first.as_ref() else {
            panic!("expected scoped payload");
        };
        let mut seen: Vec<PlayerId> = visible_players.iter().map(|p| p.id).collect();
        seen.sort();
        let mut expected = vec![ids[1], ids[2]];
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn global_shares_one_payload() {
        let mut w = world();
        for x in [0, 100] {
            w.join_at(PlayerId::new(), IVec2::new(x, 0), Faction::Digger);
        }
        w.tile(IVec2::new(0, 0));
        w.tile(IVec2::new(100, 0));

        let payloads = global().broadcast(&mut w);
        assert_eq!(payloads.len(), 2);
        assert!(Arc::ptr_eq(&payloads[0].1, &payloads[1].1));
        let TickPayload::Global { players, chunks, .. } = payloads[0].1.as_ref() else {
            panic!("expected global payload");
        };
        assert_eq!(players.len(), 2);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn diff_hints_report_dig_and_fill() {
        let mut w = world();
        let digger = w.join_at(PlayerId::new(), IVec2::new(1, 1), Faction::Digger);
        let restorer = w.join_at(PlayerId::new(), IVec2::new(2, 1), Faction::Restorer);

        let mut policy = scoped();
        policy.init_payload(&mut w, &digger);
        policy.init_payload(&mut w, &restorer);
        let first = policy.broadcast(&mut w);
        assert!(first.iter().all(|(_, p)| p.diffs() == Some(&[][..])));

        assert!(w.apply(digger.id(), PlayerInput::TileAction(TileActionKind::Dig)));
        assert!(w.apply(restorer.id(), PlayerInput::TileAction(TileActionKind::Fill)));
        let second = policy.broadcast(&mut w);
        for (_, payload) in &second {
            let mut diffs = payload.diffs().unwrap().to_vec();
            diffs.sort_by_key(|d| d.x);
            assert_eq!(
                diffs,
                vec![
                    DiffHint {
                        x: 1,
                        y: 1,
                        action: TileActionKind::Dig
                    },
                    DiffHint {
                        x: 2,
                        y: 1,
                        action: TileActionKind::Fill
                    },
                ]
            );
        }

        let third = policy.broadcast(&mut w);
        assert!(third.iter().all(|(_, p)| p.diffs() == Some(&[][..])));
    }

    #[test]
    fn global_diff_hints_report_dig_and_fill() {
        let mut w = world();
        let digger = w.join_at(PlayerId::new(), IVec2::new(1, 1), Faction::Digger);
        let restorer = w.join_at(PlayerId::new(), IVec2::new(2, 1), Faction::Restorer);
        let mut policy = global();
        policy.init_payload(&mut w, &digger);
        policy.init_payload(&mut w, &restorer);
        let first = policy.broadcast(&mut w);
        assert!(first.iter().all(|(_, p)| p.diffs() == Some(&[][..])));

        assert!(w.apply(digger.id(), PlayerInput::TileAction(TileActionKind::Dig)));
        let second = policy.broadcast(&mut w);
        assert!(Arc::ptr_eq(&second[0].1, &second[1].1));
        assert_eq!(
            second[0].1.diffs(),
            Some(
                &[DiffHint {
                    x: 1,
                    y: 1,
                    action: TileActionKind::Dig
                }][..]
            )
        );

        assert!(w.apply(restorer.id(), PlayerInput::TileAction(TileActionKind::Fill)));
        let third = policy.broadcast(&mut w);
        assert_eq!(
            third[0].1.diffs(),
            Some(
                &[DiffHint {
                    x: 2,
                    y: 1,
                    action: TileActionKind::Fill
                }][..]
            )
        );

        let fourth = policy.broadcast(&mut w);
        assert!(fourth.iter().all(|(_, p)| p.diffs() == Some(&[][..])));
    }

    #[test]
    fn global_late_joiner_gets_no_stale_hints() {
        let mut w = world();
        let digger = w.join_at(PlayerId::new(), IVec2::new(1, 1), Faction::Digger);
        let mut policy = global();
        policy.init_payload(&mut w, &digger);
        policy.broadcast(&mut w);

        assert!(w.apply(digger.id(), PlayerInput::TileAction(TileActionKind::Dig)));
        let late = w.join_at(PlayerId::new(), IVec2::new(3, 3), Faction::Restorer);
        assert!(policy.init_payload(&mut w, &late).chunks.is_none());

        let payloads = policy.broadcast(&mut w);
        let hints = |id: PlayerId| {
            let (_, payload) = payloads.iter().find(|(p, _)| *p == id).unwrap();
            payload.diffs().unwrap().len()
        };
        assert_eq!(hints(digger.id()), 1);
        assert_eq!(hints(late.id()), 0);

        // From then on both share one payload.
        let next = policy.broadcast(&mut w);
        assert!(Arc::ptr_eq(&next[0].1, &next[1].1));
    }

    #[test]
    fn newly_visible_chunks_produce_no_hints() {
        let mut w = world();
        let id = PlayerId::new();
        w.join_at(id, IVec2::new(15, 0), Faction::Digger);
        let mut policy = scoped();
        policy.broadcast(&mut w);

        // Crossing into chunk (1, 0) brings chunk column x = 2 into view.
        assert!(w.apply(id, PlayerInput::Move(Direction::Right)));
        let payloads = policy.broadcast(&mut w);
        assert_eq!(payloads[0].1.diffs(), Some(&[][..]));
        assert_eq!(payloads[0].1.chunks().len(), 9);
    }

    #[test]
    fn disabled_hints_are_omitted() {
        let mut w = world();
        w.join_at(PlayerId::new(), IVec2::ZERO, Faction::Digger);
        let mut policy = VisibilityPolicy::new(VisibilityConfig {
            diff_hints: false,
            ..VisibilityConfig::default()
        });
        let payloads = policy.broadcast(&mut w);
        assert!(payloads[0].1.diffs().is_none());
    }

    #[test]
    fn unvalidated_negative_window_sends_own_chunk() {
        let mut w = world();
        w.join_at(PlayerId::new(), IVec2::new(4, 4), Faction::Digger);
        let mut policy = VisibilityPolicy::new(VisibilityConfig {
            visible_chunks: -3,
            ..VisibilityConfig::default()
        });
        let payloads = policy.broadcast(&mut w);
        assert_eq!(payloads[0].1.chunks().len(), 1);
    }

    #[test]
    fn forget_drops_player_snapshot() {
        let mut w = world();
        let id = PlayerId::new();
        w.join_at(id, IVec2::ZERO, Faction::Digger);
        let mut policy = scoped();
        policy.broadcast(&mut w);
        assert!(policy.last_sent.contains_key(&Audience::Player(id)));
        policy.forget(id);
        assert!(!policy.last_sent.contains_key(&Audience::Player(id)));
    }
}
