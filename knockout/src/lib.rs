//! # Knockout
//!
//! Bracket graph and advancement engine for knockout tournaments.
//!
//! Participants are seeded into categories. A category's matches form a
//! directed acyclic graph: each match relation says which finishing rank of
//! its source match enters its target match. Recording a winner ranks the
//! match and advances qualifiers one edge downstream.
//!
//! ## Core Modules
//!
//! - [`bracket`]: Models, layout validation, the engine and the viewer
//! - [`store`]: Persistence boundary with in-memory and PostgreSQL stores
//! - [`db`]: PostgreSQL pool configuration and migrations
//!
//! ## Example
//!
//! ```
//! use knockout::{BracketEngine, BracketLayout, SeededEntrant, store::MemoryStore};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(MemoryStore::new());
//! let category = store.add_category("Open", 1).await;
//! let mut entrants = Vec::new();
//! for seed in 1..=4 {
//!     let id = store.add_participant(1, &format!("Player {seed}")).await;
//!     store.enroll(id, category, Some(seed)).await;
//!     entrants.push(SeededEntrant::new(id, seed));
//! }
//!
//! let engine = BracketEngine::new(store);
//! let layout = BracketLayout::single_elimination(&entrants).unwrap();
//! engine.build_bracket(category, &layout).await.unwrap();
//!
//! let view = engine.render_bracket(category).await.unwrap();
//! assert_eq!(view.rounds.len(), 2);
//! # }
//! ```

/// Bracket models, validation, engine and viewer.
pub mod bracket;
pub use bracket::{
    AdvancementReport, BracketEngine, BracketLayout, BracketView, BuildReport, ErrorKind,
    FlatMatchRequest, SeededEntrant,
};

/// Database pool and configuration.
pub mod db;

/// Persistence boundary.
pub mod store;
pub use store::{BracketRepository, MemoryStore, PgBracketStore};
