use furrow_common::{Direction, PlayerInput, TileActionKind};
use serde::{Deserialize, Serialize};

/// A message as sent by a client.
///
/// ```json
/// { "type": "move", "direction": "up" }
/// { "type": "action", "action": "dig" }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Move { direction: Direction },
    Action { action: TileActionKind },
}

impl From<ClientMessage> for PlayerInput {
    fn from(message: ClientMessage) -> Self {
        match message {
            ClientMessage::Move { direction } => PlayerInput::Move(direction),
            ClientMessage::Action { action } => PlayerInput::TileAction(action),
        }
    }
}

impl From<PlayerInput> for ClientMessage {
    fn from(input: PlayerInput) -> Self {
        match input {
            PlayerInput::Move(direction) => ClientMessage::Move { direction },
            PlayerInput::TileAction(action) => ClientMessage::Action { action },
        }
    }
}

/// Why a client payload was rejected.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("malformed input: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode one client payload into a player input.
pub fn decode(bytes: &[u8]) -> Result<PlayerInput, InputError> {
    let message: ClientMessage = serde_json::from_slice(bytes)?;
    Ok(message.into())
}
