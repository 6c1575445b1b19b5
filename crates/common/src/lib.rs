//! Shared types for the furrow world simulator.
//!
//! # Invariants
//! - Player inputs are a closed set; anything else is rejected at the input boundary.
//! - A player's faction never changes after it is assigned.

mod types;

pub use types::{Direction, Faction, PlayerId, PlayerInput, TileActionKind};
