//! Persistence boundary for the bracket engine.
//!
//! [`BracketRepository`] is the transactional seam the engine runs against.
//! Every write method is one atomic unit: it either commits completely or
//! leaves the store exactly as it was. Two implementations ship with the
//! crate:
//!
//! - [`MemoryStore`]: in-process, for tests and embedders without a database
//! - [`PgBracketStore`]: PostgreSQL through sqlx

use async_trait::async_trait;

use crate::bracket::models::{
    Category, CategoryId, CategoryParticipant, Enrollment, Match, MatchId, MatchRelation,
    MatchSlot, Participant, ParticipantId, ResultType, SlotId, SlotRole,
};

pub mod errors;
pub mod memory;
pub mod postgres;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgBracketStore;

/// Slot to create inside a new match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSlot {
    pub participant_id: ParticipantId,
    pub role: SlotRole,
    pub position: Option<String>,
}

/// Match to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatch {
    pub round: Option<i32>,
    pub match_number: Option<i32>,
    pub slots: Vec<NewSlot>,
}

/// Relation between two matches of a [`NewBracket`], by index into `matches`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewRelation {
    pub source: usize,
    pub target: usize,
    pub qualifier_rank: i32,
}

/// Complete bracket write for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBracket {
    /// Seeds to upsert for the category
    pub seeds: Vec<(ParticipantId, i32)>,
    pub matches: Vec<NewMatch>,
    pub relations: Vec<NewRelation>,
}

/// Everything needed to decide a match result
#[derive(Debug, Clone)]
pub struct MatchContext {
    pub fixture: Match,
    pub category: Category,
    /// Slots in creation order
    pub slots: Vec<MatchSlot>,
    /// Outgoing relations in creation order
    pub outgoing: Vec<MatchRelation>,
}

/// Rank and result to record on one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotResult {
    pub slot_id: SlotId,
    pub rank: i32,
    pub result_type: ResultType,
}

/// A participant moving into a downstream match
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Advancement {
    pub target_match_id: MatchId,
    pub participant_id: ParticipantId,
    pub qualifier_rank: i32,
}

/// Completed match write: status, ranks and advancement slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub match_id: MatchId,
    /// One entry per slot of the match
    pub results: Vec<SlotResult>,
    pub advancements: Vec<Advancement>,
}

/// Consistent read of one category's bracket
#[derive(Debug, Clone)]
pub struct CategorySnapshot {
    pub category: Category,
    pub matches: Vec<Match>,
    /// Slots of `matches`, in creation order
    pub slots: Vec<MatchSlot>,
    /// Relations whose target is one of `matches`, in creation order
    pub relations: Vec<MatchRelation>,
    /// Enrolled participants with their seeds
    pub enrolled: Vec<CategoryParticipant>,
    /// Participants occupying any slot of `matches`
    pub occupants: Vec<Participant>,
}

/// Trait for bracket repository operations
#[async_trait]
pub trait BracketRepository: Send + Sync {
    /// Find category by ID
    async fn get_category(&self, category_id: CategoryId) -> StoreResult<Option<Category>>;

    /// Find participant by ID
    async fn get_participant(
        &self,
        participant_id: ParticipantId,
    ) -> StoreResult<Option<Participant>>;

    /// Find a participant's enrollment in a category
    async fn get_enrollment(
        &self,
        participant_id: ParticipantId,
        category_id: CategoryId,
    ) -> StoreResult<Option<Enrollment>>;

    /// Number of matches in a category
    async fn count_matches(&self, category_id: CategoryId) -> StoreResult<u64>;

    /// Load a match with its category, slots and outgoing relations
    async fn load_match_context(&self, match_id: MatchId) -> StoreResult<Option<MatchContext>>;

    /// Load a consistent snapshot of a category's bracket
    async fn load_category_snapshot(
        &self,
        category_id: CategoryId,
    ) -> StoreResult<Option<CategorySnapshot>>;

    /// Set a participant's seed, enrolling them in the category if needed
    async fn upsert_seed(
        &self,
        participant_id: ParticipantId,
        category_id: CategoryId,
        seed: i32,
    ) -> StoreResult<()>;

    /// Write a whole bracket atomically
    ///
    /// Fails with `StoreError::CategoryNotEmpty` if the category already has
    /// matches. On success `can_sign_up` is cleared and the new match IDs are
    /// returned in `bracket.matches` order.
    async fn insert_bracket(
        &self,
        category_id: CategoryId,
        bracket: &NewBracket,
    ) -> StoreResult<Vec<MatchId>>;

    /// Add a match to a flat list
    ///
    /// Fails with `StoreError::SignUpClosed` if the category no longer accepts
    /// sign-ups. On success `is_bracket` is cleared.
    async fn insert_flat_match(
        &self,
        category_id: CategoryId,
        new_match: &NewMatch,
    ) -> StoreResult<MatchId>;

    /// Complete a match atomically
    ///
    /// Fails with `StoreError::MatchAlreadyCompleted` if the match is already
    /// completed, and with `StoreError::MatchChanged` if its slots are no longer
    /// exactly those ranked in `outcome.results`. Advancements whose participant already occupies the target
    /// match are skipped. Returns the advancements that inserted a slot.
    async fn commit_outcome(&self, outcome: &MatchOutcome) -> StoreResult<Vec<Advancement>>;
}
