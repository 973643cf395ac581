//! Subscriber store errors.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    /// The database file could not be created or opened.
    #[error("cannot open subscriber store: {0}")]
    Open(String),

    /// redb failed inside a transaction.
    #[error("subscriber store failure: {0}")]
    Storage(String),

    /// A stored record no longer decodes as a subscriber.
    #[error("subscriber record {id} is unreadable: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("cannot encode subscriber {id}: {reason}")]
    Encode { id: String, reason: String },
}

impl StateError {
    pub(crate) fn corrupt(id: &str, e: impl std::fmt::Display) -> Self {
        StateError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        }
    }
}
