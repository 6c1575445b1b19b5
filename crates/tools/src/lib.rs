//! Developer Tooling: read-only world inspection for logs and the CLI.
//!
//! # Invariants
//! - Tools never mutate the world.

mod inspector;

pub use inspector::{PlayerInfo, WorldInspector, WorldSummary};
