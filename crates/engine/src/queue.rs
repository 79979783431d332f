//! Tick-ordered action queue with identity deduplication.

use std::collections::{BTreeMap, HashSet};

use towers_types::{ActionKey, PlayerAction};

use crate::error::ActionError;

/// Pending actions keyed by tick; submission order is kept within a tick.
#[derive(Debug, Default, Clone)]
pub struct ActionQueue {
    pending: BTreeMap<u64, Vec<PlayerAction>>,
    seen: HashSet<ActionKey>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `action` unless its tick is already resolved or its identity was seen.
    pub fn push(&mut self, action: PlayerAction, current_tick: u64) -> Result<(), ActionError> {
        if action.tick < current_tick {
            return Err(ActionError::StaleTick {
                tick: action.tick,
                current: current_tick,
            });
        }
        let key = action.key();
        if !self.seen.insert(key) {
            return Err(ActionError::Duplicate { key });
        }
        self.pending.entry(action.tick).or_default().push(action);
        Ok(())
    }

    /// Remove and return every action scheduled at or before `tick`, in tick
    /// then submission order.
    pub fn drain_ready(&mut self, tick: u64) -> Vec<PlayerAction> {
        let later = self.pending.split_off(&tick.saturating_add(1));
        let ready = std::mem::replace(&mut self.pending, later);
        ready.into_values().flatten().collect()
    }

    /// Forget identities older than `tick`; those are rejected as stale anyway.
    pub fn prune(&mut self, tick: u64) {
        self.seen.retain(|key| key.tick >= tick);
    }

    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.seen.clear();
    }
}
