//! Bracket engine: construction, result recording and rendering.

use super::{
    errors::{
        AdvanceResult, BuildError, BuildResult, CategoryError, CategoryResult, ErrorKind,
        ResultError,
    },
    graph::LayoutGraph,
    layout::{BracketLayout, SeededEntrant},
    locks::KeyedLocks,
    models::{CategoryId, MatchId, MatchStatus, ParticipantId, SlotRole},
    ranking,
    seeds::SeedRegistry,
    view::BracketView,
};
use crate::store::{
    Advancement, BracketRepository, NewBracket, NewMatch, NewRelation, NewSlot,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};

/// Result of a successful bracket build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub category_id: CategoryId,
    /// `(layout match number, created match ID)` in layout order
    pub matches: Vec<(i32, MatchId)>,
}

impl BuildReport {
    /// Match ID created for a layout match number
    pub fn match_id(&self, match_number: i32) -> Option<MatchId> {
        self.matches
            .iter()
            .find(|(number, _)| *number == match_number)
            .map(|(_, id)| *id)
    }
}

/// Result of a successful `set_winner`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancementReport {
    pub match_id: MatchId,
    pub winner_id: ParticipantId,
    /// Edges that actually placed someone in a downstream match
    pub advanced: Vec<Advancement>,
}

/// Request to add a match to a flat (non-bracket) list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatMatchRequest {
    #[serde(default)]
    pub round: Option<i32>,
    #[serde(default)]
    pub match_number: Option<i32>,
    pub participant_ids: Vec<ParticipantId>,
}

/// Bracket engine
///
/// Writes to one match are serialized by a per-match lock and writes to one
/// category by a per-category lock. The store re-checks the same conditions
/// inside its transaction, so engines in different processes sharing one
/// database stay correct.
#[derive(Clone)]
pub struct BracketEngine {
    repo: Arc<dyn BracketRepository>,
    seeds: SeedRegistry,
    match_locks: KeyedLocks<MatchId>,
    category_locks: KeyedLocks<CategoryId>,
}

impl BracketEngine {
    /// Create a new engine over a repository
    pub fn new(repo: Arc<dyn BracketRepository>) -> Self {
        Self {
            seeds: SeedRegistry::new(Arc::clone(&repo)),
            repo,
            match_locks: KeyedLocks::new(),
            category_locks: KeyedLocks::new(),
        }
    }

    pub fn seeds(&self) -> &SeedRegistry {
        &self.seeds
    }

    /// Build a category's bracket from a layout
    ///
    /// The layout is validated completely before anything is written, and
    /// the write itself is all-or-nothing.
    ///
    /// # Arguments
    ///
    /// * `category_id` - Category to build into
    /// * `layout` - Matches, slots and relations keyed by match number
    ///
    /// # Errors
    ///
    /// * `BuildError::Layout` - Layout is malformed (dangling or cyclic relations, bad seeds)
    /// * `BuildError::CategoryNotFound` - Unknown category
    /// * `BuildError::NotBracketCategory` - Category holds a flat match list
    /// * `BuildError::AlreadyBuilt` - Category already has matches
    /// * `BuildError::ParticipantNotFound` - Slot references an unknown participant
    /// * `BuildError::ParticipantNotEnrolled` - Slot participant is not in the category
    /// * `BuildError::SeedTaken` - Layout seed is held by a participant outside the layout
    pub async fn build_bracket(
        &self,
        category_id: CategoryId,
        layout: &BracketLayout,
    ) -> BuildResult<BuildReport> {
        let graph = LayoutGraph::from_layout(layout)?;

        let _guard = self.category_locks.lock(category_id).await;
        log::debug!("Acquired build lock for category {}", category_id);

        let category = self
            .repo
            .get_category(category_id)
            .await?
            .ok_or(BuildError::CategoryNotFound(category_id))?;
        if !category.is_bracket {
            log::warn!("Rejected build: category {} is a flat list", category_id);
            return Err(BuildError::NotBracketCategory(category_id));
        }
        if self.repo.count_matches(category_id).await? > 0 {
            log::warn!("Rejected build: category {} already built", category_id);
            return Err(BuildError::AlreadyBuilt(category_id));
        }

        for &(participant_id, _) in graph.seeds() {
            if self.repo.get_participant(participant_id).await?.is_none() {
                return Err(BuildError::ParticipantNotFound(participant_id));
            }
            if self
                .repo
                .get_enrollment(participant_id, category_id)
                .await?
                .is_none()
            {
                return Err(BuildError::ParticipantNotEnrolled {
                    participant_id,
                    category_id,
                });
            }
        }

        let bracket = NewBracket {
            seeds: graph.seeds().to_vec(),
            matches: layout
                .matches
                .iter()
                .map(|m| NewMatch {
                    round: Some(m.round),
                    match_number: Some(m.match_number),
                    slots: m
                        .slots
                        .iter()
                        .map(|s| NewSlot {
                            participant_id: s.participant_id,
                            role: s.role,
                            position: s.position.clone(),
                        })
                        .collect(),
                })
                .collect(),
            relations: graph
                .edges()
                .iter()
                .map(|e| NewRelation {
                    source: e.source,
                    target: e.target,
                    qualifier_rank: e.qualifier_rank,
                })
                .collect(),
        };

        let ids = self
            .repo
            .insert_bracket(category_id, &bracket)
            .await
            .map_err(|e| {
                let err = BuildError::from(e);
                if err.kind() == ErrorKind::Validation {
                    log::warn!("Rejected build for category {}: {}", category_id, err);
                } else {
                    log::error!("Failed to write bracket for category {}: {}", category_id, err);
                }
                err
            })?;

        log::info!(
            "Built bracket for category {}: {} matches, {} relations",
            category_id,
            ids.len(),
            bracket.relations.len()
        );

        Ok(BuildReport {
            category_id,
            matches: layout
                .matches
                .iter()
                .map(|m| m.match_number)
                .zip(ids)
                .collect(),
        })
    }

    /// Record a match winner and advance qualifiers along outgoing relations
    ///
    /// # Errors
    ///
    /// * `ResultError::MatchNotFound` - Unknown match
    /// * `ResultError::NotBracketMatch` - Match belongs to a flat list
    /// * `ResultError::AlreadyCompleted` - Result already recorded
    /// * `ResultError::WinnerNotInMatch` - Winner has no slot in the match
    /// * `ResultError::MatchChanged` - A feeder placed someone in the match meanwhile
    pub async fn set_winner(
        &self,
        match_id: MatchId,
        winner_id: ParticipantId,
    ) -> AdvanceResult<AdvancementReport> {
        let _guard = self.match_locks.lock(match_id).await;
        log::debug!("Acquired result lock for match {}", match_id);

        let context = self
            .repo
            .load_match_context(match_id)
            .await?
            .ok_or(ResultError::MatchNotFound(match_id))?;

        if !context.category.is_bracket {
            log::warn!("Rejected result: match {} is not in a bracket", match_id);
            return Err(ResultError::NotBracketMatch(match_id));
        }
        if context.fixture.status == MatchStatus::Completed {
            log::warn!("Rejected result: match {} already completed", match_id);
            return Err(ResultError::AlreadyCompleted(match_id));
        }

        let outcome = ranking::plan_outcome(&context, winner_id)?;
        log::debug!(
            "Match {} plan: {} ranked slots, {} advancements",
            match_id,
            outcome.results.len(),
            outcome.advancements.len()
        );

        let advanced = self.repo.commit_outcome(&outcome).await.map_err(|e| {
            let err = ResultError::from(e);
            if err.kind() == ErrorKind::StateConflict {
                log::warn!("Rejected result for match {}: {}", match_id, err);
            } else {
                log::error!("Failed to record result for match {}: {}", match_id, err);
            }
            err
        })?;

        log::info!("Match {} won by participant {}", match_id, winner_id);
        for advancement in &advanced {
            log::info!(
                "Participant {} advanced from match {} to match {} (rank {})",
                advancement.participant_id,
                match_id,
                advancement.target_match_id,
                advancement.qualifier_rank
            );
        }

        Ok(AdvancementReport {
            match_id,
            winner_id,
            advanced,
        })
    }

    /// Render a category's bracket grouped by round
    pub async fn render_bracket(&self, category_id: CategoryId) -> CategoryResult<BracketView> {
        let snapshot = self
            .repo
            .load_category_snapshot(category_id)
            .await?
            .ok_or(CategoryError::CategoryNotFound(category_id))?;

        Ok(BracketView::from_snapshot(&snapshot))
    }

    /// Add a match to a category's flat list
    ///
    /// The category leaves bracket mode for good once this succeeds.
    ///
    /// # Errors
    ///
    /// * `CategoryError::DuplicateParticipant` - Participant listed twice
    /// * `CategoryError::CategoryNotFound` - Unknown category
    /// * `CategoryError::BracketLocked` - Category already has a built bracket
    /// * `CategoryError::SignUpClosed` - Category is closed
    /// * `CategoryError::ParticipantNotFound` - Unknown participant
    pub async fn create_flat_match(
        &self,
        category_id: CategoryId,
        request: FlatMatchRequest,
    ) -> CategoryResult<MatchId> {
        let mut listed = HashSet::with_capacity(request.participant_ids.len());
        if let Some(&dup) = request.participant_ids.iter().find(|&&id| !listed.insert(id)) {
            return Err(CategoryError::DuplicateParticipant(dup));
        }

        let _guard = self.category_locks.lock(category_id).await;

        let category = self
            .repo
            .get_category(category_id)
            .await?
            .ok_or(CategoryError::CategoryNotFound(category_id))?;
        if !category.can_sign_up {
            log::warn!("Rejected flat match: category {} is closed", category_id);
            return Err(if category.is_bracket {
                CategoryError::BracketLocked(category_id)
            } else {
                CategoryError::SignUpClosed(category_id)
            });
        }

        for &participant_id in &request.participant_ids {
            if self.repo.get_participant(participant_id).await?.is_none() {
                return Err(CategoryError::ParticipantNotFound(participant_id));
            }
        }

        let new_match = NewMatch {
            round: request.round,
            match_number: request.match_number,
            slots: request
                .participant_ids
                .iter()
                .map(|&participant_id| NewSlot {
                    participant_id,
                    role: SlotRole::Competitor,
                    position: None,
                })
                .collect(),
        };

        let match_id = self.repo.insert_flat_match(category_id, &new_match).await?;
        log::info!(
            "Added flat match {} to category {} with {} participants",
            match_id,
            category_id,
            new_match.slots.len()
        );
        Ok(match_id)
    }

    /// Enrolled participants of a category as seeded entrants
    ///
    /// Seeded participants come first by seed. Unseeded participants follow by
    /// ID and are given the seeds after the highest assigned one.
    ///
    /// # Errors
    ///
    /// * `CategoryError::CategoryNotFound` - Unknown category
    /// * `CategoryError::NoSeedAvailable` - Seeds after the highest one would overflow
    pub async fn entrants(&self, category_id: CategoryId) -> CategoryResult<Vec<SeededEntrant>> {
        let snapshot = self
            .repo
            .load_category_snapshot(category_id)
            .await?
            .ok_or(CategoryError::CategoryNotFound(category_id))?;

        let mut seeded: Vec<SeededEntrant> = snapshot
            .enrolled
            .iter()
            .filter_map(|e| e.seed.map(|seed| SeededEntrant::new(e.participant.id, seed)))
            .collect();
        seeded.sort_by_key(|e| (e.seed, e.participant_id));

        let mut unseeded: Vec<ParticipantId> = snapshot
            .enrolled
            .iter()
            .filter(|e| e.seed.is_none())
            .map(|e| e.participant.id)
            .collect();
        unseeded.sort_unstable();

        let mut next_seed = seeded.last().map_or(Some(1), |e| e.seed.checked_add(1));
        for participant_id in unseeded {
            let seed = next_seed.ok_or(CategoryError::NoSeedAvailable(participant_id))?;
            seeded.push(SeededEntrant::new(participant_id, seed));
            next_seed = seed.checked_add(1);
        }

        Ok(seeded)
    }
}
