//! Bracket graph and advancement engine.
//!
//! Matches are nodes, match relations are directed edges carrying the
//! finishing rank that advances along them. The [`BracketEngine`] builds a
//! category's graph from a [`BracketLayout`], records results and moves
//! qualifiers forward, and renders the graph by round.

pub mod engine;
pub mod errors;
pub mod graph;
pub mod layout;
pub mod locks;
pub mod models;
pub mod ranking;
pub mod seeds;
pub mod view;

pub use engine::{AdvancementReport, BracketEngine, BuildReport, FlatMatchRequest};
pub use errors::{
    AdvanceResult, BuildError, BuildResult, CategoryError, CategoryResult, ErrorKind, LayoutError,
    ResultError,
};
pub use graph::LayoutGraph;
pub use layout::{BracketLayout, MatchDescriptor, RelationDescriptor, SeededEntrant, SlotDescriptor};
pub use models::{
    Category, CategoryId, Match, MatchId, MatchRelation, MatchSlot, MatchStatus, Participant,
    ParticipantId, ResultType, SlotRole,
};
pub use seeds::SeedRegistry;
pub use view::{BracketView, MatchView, ParticipantView, RoundView, SlotView};
