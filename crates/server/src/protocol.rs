//! Server to client messages.
//!
//! ```json
//! { "type": "init", "player": {...}, "chunkSize": 16, ... }
//! { "type": "tick", "mode": "scoped", "tick": 12, ... }
//! ```

use furrow_stream::{InitPayload, TickPayload};
use serde::{Deserialize, Serialize};

/// Borrowed form used for encoding, so shared tick payloads are never cloned.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound<'a> {
    Init(&'a InitPayload),
    Tick(&'a TickPayload),
}

impl Outbound<'_> {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Owned form, as decoded by a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Init(InitPayload),
    Tick(TickPayload),
}

impl ServerMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
