use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use furrow_common::{Direction, PlayerId, PlayerInput, TileActionKind};
use furrow_kernel::{GenerationPolicy, WorldConfig};
use furrow_server::{GameServer, QueuePolicy, ServerConfig, TickEngine};
use furrow_stream::{VisibilityConfig, VisibilityMode};
use furrow_tools::WorldInspector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "furrow", about = "Tick server for a shared dig-and-restore tile world")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and default settings
    Info,
    /// Run the TCP server until Ctrl-C
    Serve {
        /// JSON config file; missing fields take defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Address to listen on
        #[arg(short, long)]
        bind: Option<SocketAddr>,
        /// Tick period in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,
        /// Visibility mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Let a later input replace a pending one within a tick
        #[arg(long)]
        last_wins: bool,
    },
    /// Run a headless simulation with random inputs
    Simulate {
        /// Number of ticks to run
        #[arg(short, long, default_value = "100")]
        ticks: u64,
        /// Number of simulated players
        #[arg(short, long, default_value = "8")]
        players: usize,
        /// Seed for the world and the input generator
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Generate varied terrain instead of flat soil
        #[arg(long)]
        seeded_terrain: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Global,
    Scoped,
}

impl From<ModeArg> for VisibilityMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Global => VisibilityMode::Global,
            ModeArg::Scoped => VisibilityMode::Scoped,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            let config = ServerConfig::default();
            println!("furrow v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "world: chunk_size={} max_soil={} initial_soil={} world_size={} edges={:?}",
                config.world.chunk_size,
                config.world.max_soil_level,
                config.world.initial_soil_level,
                config.world.world_size,
                config.world.edges,
            );
            println!(
                "visibility: mode={:?} visible_chunks={}",
                config.visibility.mode, config.visibility.visible_chunks
            );
            println!(
                "server: bind={} tick_ms={} queue={:?}",
                config.bind_addr, config.tick_ms, config.queue_policy
            );
        }
        Commands::Serve {
            config,
            bind,
            tick_ms,
            mode,
            last_wins,
        } => {
            let mut config = match config {
                Some(path) => ServerConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => ServerConfig::default(),
            };
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(tick_ms) = tick_ms {
                config.tick_ms = tick_ms;
            }
            if let Some(mode) = mode {
                config.visibility.mode = mode.into();
            }
            if last_wins {
                config.queue_policy = QueuePolicy::LastWins;
            }
            config.validate()?;

            tokio::runtime::Runtime::new()?.block_on(serve(config))?;
        }
        Commands::Simulate {
            ticks,
            players,
            seed,
            seeded_terrain,
        } => {
            println!("Simulation: seed={seed}, players={players}, ticks={ticks}");
            let world = WorldConfig {
                seed,
                generation: if seeded_terrain {
                    GenerationPolicy::Seeded
                } else {
                    GenerationPolicy::Flat
                },
                ..WorldConfig::default()
            };

            let first = simulate(world.clone(), ticks, players, seed);
            let second = simulate(world, ticks, players, seed);

            let summary = WorldInspector::summary(first.world());
            println!("{summary}");
            println!(
                "soil histogram: {:?}",
                WorldInspector::soil_histogram(first.world())
            );
            println!(
                "timing: avg={:?} max={:?}",
                first.timer().average(),
                first.timer().max()
            );
            let (h1, h2) = (first.world().state_hash(), second.world().state_hash());
            println!("state hash: {h1:#018x}");
            println!("Replay: {}", if h1 == h2 { "OK" } else { "MISMATCH" });
        }
    }

    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let server = Arc::new(GameServer::new(config));
    let runner = Arc::clone(&server);
    let mut handle = tokio::spawn(async move { runner.run().await });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("listening for ctrl-c")?;
            tracing::info!("ctrl-c received");
            server.shutdown();
        }
        // The server only returns on its own if binding failed.
        result = &mut handle => {
            return Ok(result??);
        }
    }
    handle.await??;
    Ok(())
}

/// Drive an engine with pseudo-random inputs. Identical arguments give an
/// identical world.
fn simulate(world: WorldConfig, ticks: u64, players: usize, seed: u64) -> TickEngine {
    let mut engine = TickEngine::new(
        world,
        VisibilityConfig::default(),
        QueuePolicy::FirstWins,
        Duration::from_secs(1),
    );
    let mut rng = StdRng::seed_from_u64(seed);
    let ids: Vec<PlayerId> = (0..players)
        .map(|_| PlayerId::from_u128(rng.random()))
        .collect();
    for &id in &ids {
        engine.join(id);
    }

    let queue = engine.queue();
    for _ in 0..ticks {
        for &id in &ids {
            let input = if rng.random_bool(0.5) {
                PlayerInput::Move(Direction::ALL[rng.random_range(0..Direction::ALL.len())])
            } else {
                PlayerInput::TileAction(
                    TileActionKind::ALL[rng.random_range(0..TileActionKind::ALL.len())],
                )
            };
            queue.enqueue(id, input);
        }
        let report = engine.tick();
        tracing::debug!(
            tick = report.tick,
            applied = report.applied,
            "simulated tick"
        );
    }
    engine
}
