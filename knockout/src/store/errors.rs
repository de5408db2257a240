//! Store error types.

use crate::bracket::models::{CategoryId, MatchId, ParticipantId, UnknownLabel};
use thiserror::Error;

/// Errors surfaced by a [`BracketRepository`](super::BracketRepository)
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),

    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    /// Category already holds matches (checked under the category lock)
    #[error("Category {0} already has matches")]
    CategoryNotEmpty(CategoryId),

    /// Category no longer accepts new matches
    #[error("Category {0} is closed for sign-up")]
    SignUpClosed(CategoryId),

    /// Match was completed by a concurrent writer
    #[error("Match {0} is already completed")]
    MatchAlreadyCompleted(MatchId),

    /// Match slots changed after the outcome was planned
    #[error("Match {0} changed since its result was planned")]
    MatchChanged(MatchId),

    /// Seed already held by another participant of the category
    #[error("Seed {seed} for participant {participant_id} is held by participant {holder}")]
    SeedTaken {
        participant_id: ParticipantId,
        seed: i32,
        holder: ParticipantId,
    },

    /// Stored row could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(#[from] UnknownLabel),

    /// Write payload is inconsistent (e.g. a relation index out of range)
    #[error("Invalid write: {0}")]
    InvalidWrite(String),

    /// Store could not commit the write; nothing was persisted
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the failure came from the store itself rather than the data
    ///
    /// Only these leave the store unchanged and may succeed on a plain retry.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(err) => !matches!(
                err,
                sqlx::Error::ColumnDecode { .. }
                    | sqlx::Error::ColumnNotFound(_)
                    | sqlx::Error::ColumnIndexOutOfBounds { .. }
                    | sqlx::Error::Decode(_)
                    | sqlx::Error::TypeNotFound { .. }
            ),
            StoreError::Unavailable(_) => true,
            _ => false,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
