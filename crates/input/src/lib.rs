//! Input boundary: client messages mapped to the closed [`PlayerInput`] set.
//!
//! # Invariants
//! - Only structural validation happens here; faction and soil rules belong to the resolver.
//! - Malformed or unrecognized messages are rejected, never partially applied.
//!
//! [`PlayerInput`]: furrow_common::PlayerInput

pub mod message;

pub use message::{ClientMessage, InputError, decode};
