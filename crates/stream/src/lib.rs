//! Visibility: decides which chunks and which other players each client learns about per tick.
//!
//! # Invariants
//! - Under scoped visibility a player never receives more than `visible_chunks^2` chunks.
//! - A player outside the Chebyshev chunk radius never appears in `visible_players`.
//! - Payloads are owned snapshots; building them never mutates players or tiles.

mod diff;
mod payload;
mod policy;
mod window;

pub use diff::soil_diffs;
pub use payload::{ChunkView, DiffHint, InitPayload, PlayerView, TickPayload};
pub use policy::{
    MAX_VISIBLE_CHUNKS, VisibilityConfig, VisibilityConfigError, VisibilityMode, VisibilityPolicy,
};
pub use window::ChunkWindow;
