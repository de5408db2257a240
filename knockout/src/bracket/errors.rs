//! Bracket error types.
//!
//! Every error maps onto one [`ErrorKind`] so callers can branch on the kind
//! without matching individual variants.

use super::models::{CategoryId, MatchId, ParticipantId};
use crate::store::StoreError;
use thiserror::Error;

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; rejected before any mutation
    Validation,
    /// Operation conflicts with the current state (or lost a race)
    StateConflict,
    /// Referenced entity does not exist
    NotFound,
    /// Store failed to commit; nothing was persisted and the caller may retry
    StorageFailure,
    /// Stored data or a write payload is inconsistent; retrying will not help
    Internal,
}

fn storage_kind(err: &StoreError) -> ErrorKind {
    if err.is_transient() {
        ErrorKind::StorageFailure
    } else {
        ErrorKind::Internal
    }
}

/// Layout validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("Layout contains no matches")]
    Empty,

    #[error("Match number {0} is used more than once")]
    DuplicateMatchNumber(i32),

    #[error("Match {match_number} has invalid round {round}")]
    InvalidRound { match_number: i32, round: i32 },

    #[error("Relation references unknown match number {0}")]
    UnknownMatchNumber(i32),

    #[error("Relation {source_match} -> {target_match} has invalid qualifier rank {rank}")]
    InvalidQualifierRank {
        source_match: i32,
        target_match: i32,
        rank: i32,
    },

    #[error("Match {match_number} has more than one outgoing relation for rank {rank}")]
    DuplicateQualifier { match_number: i32, rank: i32 },

    #[error("Relations form a cycle through matches {0:?}")]
    CyclicRelations(Vec<i32>),

    #[error("Participant {participant_id} appears more than once in match {match_number}")]
    DuplicateSlot {
        match_number: i32,
        participant_id: ParticipantId,
    },

    #[error("Participant {participant_id} has invalid seed {seed}")]
    InvalidSeed {
        participant_id: ParticipantId,
        seed: i32,
    },

    #[error("Seed {seed} is shared by participants {first} and {second}")]
    DuplicateSeed {
        seed: i32,
        first: ParticipantId,
        second: ParticipantId,
    },

    #[error("Participant {participant_id} is given conflicting seeds {first} and {second}")]
    ConflictingSeeds {
        participant_id: ParticipantId,
        first: i32,
        second: i32,
    },

    #[error("A bracket needs at least 2 entrants, got {0}")]
    TooFewEntrants(usize),
}

/// Bracket construction errors
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),

    #[error("Participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    #[error("Participant {participant_id} is not enrolled in category {category_id}")]
    ParticipantNotEnrolled {
        participant_id: ParticipantId,
        category_id: CategoryId,
    },

    #[error("Category {0} is not bracket-structured")]
    NotBracketCategory(CategoryId),

    #[error("Bracket already built for category {0}")]
    AlreadyBuilt(CategoryId),

    #[error("Seed {seed} for participant {participant_id} is already held by participant {holder}")]
    SeedTaken {
        participant_id: ParticipantId,
        seed: i32,
        holder: ParticipantId,
    },

    #[error("Storage error: {0}")]
    Storage(StoreError),
}

/// Match result errors
#[derive(Debug, Error)]
pub enum ResultError {
    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    #[error("Match {0} is not part of a bracket")]
    NotBracketMatch(MatchId),

    #[error("Match {0} is already completed")]
    AlreadyCompleted(MatchId),

    /// Another result added a slot to the match while this one was planned
    #[error("Match {0} changed while its result was being recorded")]
    MatchChanged(MatchId),

    #[error("Participant {participant_id} is not in match {match_id}")]
    WinnerNotInMatch {
        match_id: MatchId,
        participant_id: ParticipantId,
    },

    #[error("Storage error: {0}")]
    Storage(StoreError),
}

/// Seed registry, flat match and viewer errors
#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),

    #[error("Participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    #[error("Invalid seed {0}: seeds start at 1")]
    InvalidSeed(i32),

    #[error("No seed left to give participant {0}")]
    NoSeedAvailable(ParticipantId),

    #[error("Participant {0} is listed more than once")]
    DuplicateParticipant(ParticipantId),

    #[error("Category {0} no longer accepts matches")]
    SignUpClosed(CategoryId),

    #[error("Matches cannot be added to the bracket of category {0}")]
    BracketLocked(CategoryId),

    #[error("Storage error: {0}")]
    Storage(StoreError),
}

/// Result type for bracket construction
pub type BuildResult<T> = Result<T, BuildError>;

/// Result type for match results and advancement
pub type AdvanceResult<T> = Result<T, ResultError>;

/// Result type for category-level operations
pub type CategoryResult<T> = Result<T, CategoryError>;

impl From<StoreError> for BuildError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CategoryNotEmpty(id) => BuildError::AlreadyBuilt(id),
            StoreError::CategoryNotFound(id) => BuildError::CategoryNotFound(id),
            StoreError::SeedTaken {
                participant_id,
                seed,
                holder,
            } => BuildError::SeedTaken {
                participant_id,
                seed,
                holder,
            },
            other => BuildError::Storage(other),
        }
    }
}

impl From<StoreError> for ResultError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MatchAlreadyCompleted(id) => ResultError::AlreadyCompleted(id),
            StoreError::MatchNotFound(id) => ResultError::MatchNotFound(id),
            StoreError::MatchChanged(id) => ResultError::MatchChanged(id),
            other => ResultError::Storage(other),
        }
    }
}

impl From<StoreError> for CategoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SignUpClosed(id) => CategoryError::SignUpClosed(id),
            StoreError::CategoryNotFound(id) => CategoryError::CategoryNotFound(id),
            other => CategoryError::Storage(other),
        }
    }
}

impl BuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::Layout(_)
            | BuildError::ParticipantNotEnrolled { .. }
            | BuildError::SeedTaken { .. } => ErrorKind::Validation,
            BuildError::CategoryNotFound(_) | BuildError::ParticipantNotFound(_) => {
                ErrorKind::NotFound
            }
            BuildError::NotBracketCategory(_) | BuildError::AlreadyBuilt(_) => {
                ErrorKind::StateConflict
            }
            BuildError::Storage(err) => storage_kind(err),
        }
    }

    /// Whether the caller may retry the same call unchanged
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::StorageFailure
    }

    /// Get a client-safe error message that doesn't leak storage details
    pub fn client_message(&self) -> String {
        match self {
            BuildError::Storage(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl ResultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResultError::MatchNotFound(_) => ErrorKind::NotFound,
            ResultError::WinnerNotInMatch { .. } => ErrorKind::Validation,
            ResultError::NotBracketMatch(_)
            | ResultError::AlreadyCompleted(_)
            | ResultError::MatchChanged(_) => ErrorKind::StateConflict,
            ResultError::Storage(err) => storage_kind(err),
        }
    }

    /// Whether the caller may retry the same call unchanged
    ///
    /// A changed match is retryable too: the retry plans against the new slots.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResultError::MatchChanged(_)) || self.kind() == ErrorKind::StorageFailure
    }

    /// Get a client-safe error message that doesn't leak storage details
    pub fn client_message(&self) -> String {
        match self {
            ResultError::Storage(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl CategoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CategoryError::InvalidSeed(_) | CategoryError::DuplicateParticipant(_) => {
                ErrorKind::Validation
            }
            CategoryError::CategoryNotFound(_) | CategoryError::ParticipantNotFound(_) => {
                ErrorKind::NotFound
            }
            CategoryError::SignUpClosed(_)
            | CategoryError::BracketLocked(_)
            | CategoryError::NoSeedAvailable(_) => ErrorKind::StateConflict,
            CategoryError::Storage(err) => storage_kind(err),
        }
    }

    /// Whether the caller may retry the same call unchanged
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::StorageFailure
    }

    /// Get a client-safe error message that doesn't leak storage details
    pub fn client_message(&self) -> String {
        match self {
            CategoryError::Storage(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}
