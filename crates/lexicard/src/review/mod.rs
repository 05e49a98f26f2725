//! Flashcard review sessions.

pub mod session;
pub mod store;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::model::{ActivityId, UserId};

pub use session::{Direction, Flashcard, ReviewSession, ReviewStep};
pub use store::{MemorySessionStore, ReviewState, SessionStore};

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("User {user_id} has no selected words in activity {activity_id}")]
    NothingToReview {
        user_id: UserId,
        activity_id: ActivityId,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
