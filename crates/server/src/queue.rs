use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use furrow_common::{PlayerId, PlayerInput};
use serde::{Deserialize, Serialize};

/// What happens when a player sends a second input within one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    /// Keep the first input; later ones are dropped until the next drain.
    #[default]
    FirstWins,
    /// Each input replaces the pending one.
    LastWins,
}

/// At most one pending input per player, shared between connection tasks
/// (producers) and the tick engine (single consumer).
#[derive(Debug, Default)]
pub struct ActionQueue {
    policy: QueuePolicy,
    pending: Mutex<BTreeMap<PlayerId, PlayerInput>>,
}

impl ActionQueue {
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            policy,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    /// Store `input` as `id`'s pending action. Returns `false` when the input
    /// was dropped under [`QueuePolicy::FirstWins`].
    pub fn enqueue(&self, id: PlayerId, input: PlayerInput) -> bool {
        let mut pending = self.lock();
        match self.policy {
            QueuePolicy::FirstWins => {
                if pending.contains_key(&id) {
                    return false;
                }
                pending.insert(id, input);
            }
            QueuePolicy::LastWins => {
                pending.insert(id, input);
            }
        }
        true
    }

    /// Remove and return every pending action, ordered by player id.
    pub fn drain_all(&self) -> Vec<(PlayerId, PlayerInput)> {
        std::mem::take(&mut *self.lock()).into_iter().collect()
    }

    /// Drop `id`'s pending action, if any.
    pub fn remove(&self, id: PlayerId) -> Option<PlayerInput> {
        self.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Every critical section leaves the map consistent, so a poisoned lock
    // still guards valid data.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<PlayerId, PlayerInput>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
