//! Per-user review state storage.

use std::time::Duration;

use moka::sync::Cache;

use crate::model::{ActivityId, UserId, WordId};

/// Progress of one user through one activity's selected words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewState {
    pub word_ids: Vec<WordId>,
    /// Index of the word on display. Always below `word_ids.len()` while
    /// the state is stored.
    pub cursor: usize,
}

/// Keyed storage for [`ReviewState`].
pub trait SessionStore: Send + Sync {
    fn get(&self, user_id: UserId, activity_id: ActivityId) -> Option<ReviewState>;
    fn put(&self, user_id: UserId, activity_id: ActivityId, state: ReviewState);
    fn remove(&self, user_id: UserId, activity_id: ActivityId);
}

/// In-memory store; sessions left alone for the idle period disappear.
pub struct MemorySessionStore {
    cache: Cache<(UserId, ActivityId), ReviewState>,
}

impl MemorySessionStore {
    pub fn new(idle: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(idle)
                .build(),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, user_id: UserId, activity_id: ActivityId) -> Option<ReviewState> {
        self.cache.get(&(user_id, activity_id))
    }

    fn put(&self, user_id: UserId, activity_id: ActivityId, state: ReviewState) {
        self.cache.insert((user_id, activity_id), state);
    }

    fn remove(&self, user_id: UserId, activity_id: ActivityId) {
        self.cache.invalidate(&(user_id, activity_id));
    }
}
