//! Server: action queue, fixed-rate tick engine and TCP transport.
//!
//! # Invariants
//! - Exactly one task owns the [`TickEngine`]; joins, leaves and ticks never interleave.
//! - A player has at most one pending input; the queue is drained whole once per tick.
//! - Every input of a tick is resolved before any payload of that tick is built.
//! - A slow client never delays a tick: its outbox is bounded and full outboxes drop frames.

pub mod config;
pub mod engine;
pub mod framing;
pub mod net;
pub mod protocol;
pub mod queue;
pub mod timer;

pub use config::{ConfigError, ServerConfig};
pub use engine::{TickEngine, TickReport};
pub use framing::{FrameConfig, FrameError, read_frame, write_frame};
pub use net::GameServer;
pub use protocol::{Outbound, ServerMessage};
pub use queue::{ActionQueue, QueuePolicy};
pub use timer::TickTimer;
