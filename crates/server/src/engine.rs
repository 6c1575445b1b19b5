use std::sync::Arc;
use std::time::{Duration, Instant};

use furrow_common::{Faction, PlayerId};
use furrow_kernel::{Player, World, WorldConfig, WorldEvent};
use furrow_stream::{InitPayload, TickPayload, VisibilityConfig, VisibilityPolicy};
use furrow_tools::WorldInspector;
use glam::IVec2;

use crate::config::ServerConfig;
use crate::queue::{ActionQueue, QueuePolicy};
use crate::timer::TickTimer;

const TIMER_WINDOW: usize = 64;

/// Outcome of one tick.
#[derive(Debug)]
pub struct TickReport {
    /// Tick number after stepping.
    pub tick: u64,
    /// Entries drained from the queue.
    pub resolved: usize,
    /// Entries whose action took effect.
    pub applied: usize,
    /// Entries for players who left before the tick ran.
    pub discarded: usize,
    pub elapsed: Duration,
    /// One payload per connected player.
    pub broadcast: Vec<(PlayerId, Arc<TickPayload>)>,
}

/// Sole owner of the [`World`]. Joins, leaves and ticks all run through here,
/// one at a time, so clients only ever observe whole ticks.
#[derive(Debug)]
pub struct TickEngine {
    world: World,
    visibility: VisibilityPolicy,
    queue: Arc<ActionQueue>,
    timer: TickTimer,
}

impl TickEngine {
    pub fn new(
        world: WorldConfig,
        visibility: VisibilityConfig,
        policy: QueuePolicy,
        period: Duration,
    ) -> Self {
        Self {
            world: World::new(world),
            visibility: VisibilityPolicy::new(visibility),
            queue: Arc::new(ActionQueue::new(policy)),
            timer: TickTimer::new(period, TIMER_WINDOW),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.world.clone(),
            config.visibility.clone(),
            config.queue_policy,
            config.tick_period(),
        )
    }

    /// Handle for producers. Inputs enqueued here are consumed by the next tick.
    pub fn queue(&self) -> Arc<ActionQueue> {
        Arc::clone(&self.queue)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn timer(&self) -> &TickTimer {
        &self.timer
    }

    /// Register a player at a random spawn and build its join payload.
    pub fn join(&mut self, id: PlayerId) -> InitPayload {
        let player = self.world.join(id);
        self.welcome(player)
    }

    /// Register a player at a known position.
    pub fn join_at(&mut self, id: PlayerId, position: IVec2, faction: Faction) -> InitPayload {
        let player = self.world.join_at(id, position, faction);
        self.welcome(player)
    }

    fn welcome(&mut self, player: Player) -> InitPayload {
        tracing::info!(
            id = %player.id(),
            faction = ?player.faction(),
            x = player.position().x,
            y = player.position().y,
            "player joined"
        );
        self.visibility.init_payload(&mut self.world, &player)
    }

    /// Remove a player and anything pending for it. Idempotent.
    pub fn leave(&mut self, id: PlayerId) -> Option<Player> {
        self.queue.remove(id);
        self.visibility.forget(id);
        let player = self.world.leave(id)?;
        tracing::info!(%id, "player left");
        Some(player)
    }

    /// Run one tick: drain the queue, resolve every entry, step, then build
    /// the broadcast from the settled world.
    pub fn tick(&mut self) -> TickReport {
        let start = Instant::now();
        let span = tracing::info_span!("tick", tick = self.world.tick() + 1);
        let _guard = span.enter();

        let drained = self.queue.drain_all();
        let mut applied = 0;
        let mut discarded = 0;
        for (id, input) in &drained {
            if !self.world.players().contains(*id) {
                tracing::debug!(%id, ?input, "discarding input from departed player");
                discarded += 1;
                continue;
            }
            if self.world.apply(*id, *input) {
                applied += 1;
            }
        }
        self.world.step();

        let events = self.world.drain_events();
        let terrain = events
            .iter()
            .filter(|e| matches!(e, WorldEvent::TileChanged { .. }))
            .count();

        let broadcast = self.visibility.broadcast(&mut self.world);
        let elapsed = start.elapsed();
        if self.timer.record(elapsed) {
            tracing::warn!(?elapsed, period = ?self.timer.period(), "tick overran its period");
        }

        tracing::debug!(
            resolved = drained.len(),
            applied,
            discarded,
            terrain,
            recipients = broadcast.len(),
            ?elapsed,
            "{}",
            WorldInspector::summary(&self.world)
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            for id in WorldInspector::list_players(&self.world) {
                if let Some(info) = WorldInspector::inspect_player(&self.world, id) {
                    tracing::debug!("{info}");
                }
            }
        }

        TickReport {
            tick: self.world.tick(),
            resolved: drained.len(),
            applied,
            discarded,
            elapsed,
            broadcast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use furrow_common::{Direction, PlayerInput, TileActionKind};
    use furrow_kernel::{EdgeMode, Tile};
    use furrow_stream::VisibilityMode;

    const DIG: PlayerInput = PlayerInput::TileAction(TileActionKind::Dig);
    const FILL: PlayerInput = PlayerInput::TileAction(TileActionKind::Fill);
    const PLANT: PlayerInput = PlayerInput::TileAction(TileActionKind::Plant);
    const CHOP: PlayerInput = PlayerInput::TileAction(TileActionKind::Chop);

    fn engine(policy: QueuePolicy) -> TickEngine {
        TickEngine::new(
            WorldConfig::default(),
            VisibilityConfig::default(),
            policy,
            Duration::from_secs(1),
        )
    }

    fn tile(engine: &TickEngine, pos: IVec2) -> Tile {
        *engine.world().chunks().peek_tile(pos).unwrap()
    }

    #[test]
    fn join_sends_the_spawn_window() {
        let mut engine = engine(QueuePolicy::FirstWins);
        let init = engine.join(PlayerId::new());
        assert_eq!(init.chunk_size, 16);
        assert_eq!(init.visible_chunks, 3);
        assert_eq!(init.max_soil_level, 10);
        assert_eq!(init.chunks.as_ref().map(Vec::len), Some(9));
        assert!((0..50).contains(&init.player.x));
        assert!((0..50).contains(&init.player.y));
    }

    #[test]
    fn dig_fill_plant_chop_over_ticks() {
        let mut engine = engine(QueuePolicy::FirstWins);
        let queue = engine.queue();
        let origin = IVec2::new(3, 3);
        let digger = PlayerId::new();
        let restorer = PlayerId::new();
        engine.join_at(digger, origin, Faction::Digger);
        engine.join_at(restorer, origin, Faction::Restorer);

        for expected in (0..5).rev() {
            queue.enqueue(digger, DIG);
            assert_eq!(engine.tick().applied, 1);
            assert_eq!(tile(&engine, origin).soil_level(), expected);
        }
        queue.enqueue(digger, DIG);
        assert_eq!(engine.tick().applied, 0);
        assert_eq!(tile(&engine, origin).soil_level(), 0);

        for _ in 0..10 {
            queue.enqueue(restorer, FILL);
            engine.tick();
        }
        assert_eq!(tile(&engine, origin).soil_level(), 10);

        queue.enqueue(restorer, PLANT);
        assert_eq!(engine.tick().applied, 1);
        assert!(tile(&engine, origin).has_tree());

        queue.enqueue(digger, CHOP);
        assert_eq!(engine.tick().applied, 1);
        assert_eq!(tile(&engine, origin), Tile::new(10, false));
    }

    #[test]
    fn one_action_per_player_per_tick() {
        for (policy, expected) in [
            (QueuePolicy::FirstWins, IVec2::new(10, 9)),
            (QueuePolicy::LastWins, IVec2::new(9, 10)),
        ] {
            let mut engine = engine(policy);
            let id = PlayerId::new();
            engine.join_at(id, IVec2::new(10, 10), Faction::Digger);
            let queue = engine.queue();
            queue.enqueue(id, PlayerInput::Move(Direction::Up));
            queue.enqueue(id, PlayerInput::Move(Direction::Left));

            let report = engine.tick();
            assert_eq!(report.resolved, 1);
            assert_eq!(engine.world().player(id).unwrap().position(), expected);
        }
    }

    #[test]
    fn input_from_departed_player_is_discarded() {
        let mut engine = engine(QueuePolicy::FirstWins);
        let id = PlayerId::new();
        engine.join_at(id, IVec2::new(5, 5), Faction::Digger);
        // Enqueued straight into the shared queue after leave, as a racing
        // connection task would.
        engine.leave(id);
        engine.queue().enqueue(id, DIG);

        let report = engine.tick();
        assert_eq!(report.resolved, 1);
        assert_eq!(report.discarded, 1);
        assert_eq!(report.applied, 0);
        assert!(report.broadcast.is_empty());
        assert_eq!(tile(&engine, IVec2::new(5, 5)).soil_level(), 5);
    }

    #[test]
    fn leave_clears_pending_input_and_is_idempotent() {
        let mut engine = engine(QueuePolicy::FirstWins);
        let id = PlayerId::new();
        engine.join_at(id, IVec2::new(1, 1), Faction::Restorer);
        engine.queue().enqueue(id, FILL);

        assert!(engine.leave(id).is_some());
        assert!(engine.queue().is_empty());
        assert!(engine.leave(id).is_none());
    }

    #[test]
    fn broadcast_reflects_the_whole_tick() {
        let mut engine = TickEngine::new(
            WorldConfig {
                edges: EdgeMode::Unbounded,
                ..WorldConfig::default()
            },
            VisibilityConfig {
                mode: VisibilityMode::Scoped,
                ..VisibilityConfig::default()
            },
            QueuePolicy::FirstWins,
            Duration::from_secs(1),
        );
        let a = PlayerId::new();
        let b = PlayerId::new();
        engine.join_at(a, IVec2::new(15, 0), Faction::Digger);
        engine.join_at(b, IVec2::new(16, 0), Faction::Restorer);
        let queue = engine.queue();
        queue.enqueue(a, PlayerInput::Move(Direction::Right));
        queue.enqueue(b, PlayerInput::Move(Direction::Right));

        let report = engine.tick();
        assert_eq!(report.tick, 1);
        assert_eq!(report.broadcast.len(), 2);
        for (_, payload) in &report.broadcast {
            assert_eq!(payload.tick(), 1);
            let TickPayload::Scoped {
                player,
                visible_players,
                ..
            } = payload.as_ref()
            else {
                panic!("expected a scoped payload");
            };
            let mut xs: Vec<i32> = visible_players.iter().map(|p| p.x).collect();
            xs.push(player.x);
            xs.sort_unstable();
            assert_eq!(xs, vec![16, 17]);
        }
    }

    #[test]
    fn tick_times_are_recorded() {
        let mut engine = engine(QueuePolicy::FirstWins);
        engine.tick();
        engine.tick();
        assert_eq!(engine.timer().count(), 2);
        assert_eq!(engine.world().tick(), 2);
    }
}
