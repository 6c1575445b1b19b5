//! Owned snapshots pushed to clients. Field names follow the client wire format.

use furrow_common::{Faction, PlayerId, TileActionKind};
use furrow_kernel::{Chunk, ChunkCoord, Player, Tile};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub x: i32,
    pub y: i32,
    pub faction: Faction,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id(),
            x: player.position().x,
            y: player.position().y,
            faction: player.faction(),
        }
    }
}

/// A chunk's full tile grid, indexed `tiles[y][x]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkView {
    pub x: i32,
    pub y: i32,
    pub tiles: Vec<Vec<Tile>>,
}

impl ChunkView {
    pub fn new(coord: ChunkCoord, chunk: &Chunk) -> Self {
        Self {
            x: coord.x,
            y: coord.y,
            tiles: chunk.rows(),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        ChunkCoord::new(self.x, self.y)
    }
}

/// A tile whose soil level changed since the previous broadcast.
///
/// `action` is `Dig` when the level dropped and `Fill` when it rose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHint {
    pub x: i32,
    pub y: i32,
    pub action: TileActionKind,
}

/// Sent once when a player joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub player: PlayerView,
    pub chunk_size: i32,
    pub visible_chunks: i32,
    pub max_soil_level: u8,
    /// Initial chunk window, scoped visibility only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<ChunkView>>,
}

/// Per-tick state update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TickPayload {
    /// The whole world, identical for every recipient.
    Global {
        tick: u64,
        players: Vec<PlayerView>,
        chunks: Vec<ChunkView>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        diffs: Option<Vec<DiffHint>>,
    },
    /// The recipient's own window.
    #[serde(rename_all = "camelCase")]
    Scoped {
        tick: u64,
        player: PlayerView,
        visible_players: Vec<PlayerView>,
        chunks: Vec<ChunkView>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        diffs: Option<Vec<DiffHint>>,
    },
}

impl TickPayload {
    pub fn tick(&self) -> u64 {
        match self {
            Self::Global { tick, .. } | Self::Scoped { tick, .. } => *tick,
        }
    }

    pub fn chunks(&self) -> &[ChunkView] {
        match self {
            Self::Global { chunks, .. } | Self::Scoped { chunks, .. } => chunks,
        }
    }

    pub fn diffs(&self) -> Option<&[DiffHint]> {
        match self {
            Self::Global { diffs, .. } | Self::Scoped { diffs, .. } => diffs.as_deref(),
        }
    }
}
