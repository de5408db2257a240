//! In-memory [`BracketRepository`] implementation.
//!
//! All state sits behind one `RwLock`, so each write is atomic and every
//! read sees a consistent snapshot. Writes validate everything they touch
//! before mutating anything.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

use super::{
    Advancement, BracketRepository, CategorySnapshot, MatchContext, MatchOutcome, NewBracket,
    NewMatch, NewSlot, StoreError, StoreResult,
};
use crate::bracket::models::{
    Category, CategoryId, CategoryParticipant, ClubId, Enrollment, Match, MatchId, MatchRelation,
    MatchSlot, MatchStatus, Participant, ParticipantId, RelationId, SlotId, SlotRole,
};

#[derive(Default)]
struct MemoryState {
    categories: BTreeMap<CategoryId, Category>,
    participants: BTreeMap<ParticipantId, Participant>,
    enrollments: BTreeMap<(CategoryId, ParticipantId), Option<i32>>,
    matches: BTreeMap<MatchId, Match>,
    slots: BTreeMap<SlotId, MatchSlot>,
    relations: BTreeMap<RelationId, MatchRelation>,
    last_id: i64,
    fail_next_write: bool,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Consume the injected failure, if any
    fn check_write(&mut self) -> StoreResult<()> {
        if std::mem::take(&mut self.fail_next_write) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }

    fn has_slot(&self, match_id: MatchId, participant_id: ParticipantId) -> bool {
        self.slots
            .values()
            .any(|s| s.match_id == match_id && s.participant_id == participant_id)
    }

    fn push_match(&mut self, category_id: CategoryId, new_match: &NewMatch) -> MatchId {
        let match_id = self.next_id();
        self.matches.insert(
            match_id,
            Match {
                id: match_id,
                category_id,
                round: new_match.round,
                match_number: new_match.match_number,
                start_time: None,
                status: MatchStatus::Scheduled,
            },
        );
        for slot in &new_match.slots {
            self.push_slot(match_id, slot);
        }
        match_id
    }

    fn push_slot(&mut self, match_id: MatchId, slot: &NewSlot) -> SlotId {
        let slot_id = self.next_id();
        self.slots.insert(
            slot_id,
            MatchSlot {
                id: slot_id,
                match_id,
                participant_id: slot.participant_id,
                role: slot.role,
                position: slot.position.clone(),
                score: None,
                rank: None,
                result_type: None,
            },
        );
        slot_id
    }
}

/// In-process bracket store
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a category (bracket mode, open for sign-up)
    pub async fn add_category(&self, name: &str, order: i32) -> CategoryId {
        let mut state = self.state.write().await;
        let id = state.next_id();
        state.categories.insert(
            id,
            Category {
                id,
                name: name.to_string(),
                order,
                can_sign_up: true,
                is_bracket: true,
            },
        );
        id
    }

    /// Create a participant
    pub async fn add_participant(&self, club_id: ClubId, name: &str) -> ParticipantId {
        let mut state = self.state.write().await;
        let id = state.next_id();
        state.participants.insert(
            id,
            Participant {
                id,
                club_id,
                name: name.to_string(),
            },
        );
        id
    }

    /// Enroll a participant in a category
    pub async fn enroll(
        &self,
        participant_id: ParticipantId,
        category_id: CategoryId,
        seed: Option<i32>,
    ) {
        self.state
            .write()
            .await
            .enrollments
            .insert((category_id, participant_id), seed);
    }

    /// Overwrite a match status, bypassing the engine
    pub async fn set_match_status(&self, match_id: MatchId, status: MatchStatus) -> bool {
        match self.state.write().await.matches.get_mut(&match_id) {
            Some(m) => {
                m.status = status;
                true
            }
            None => false,
        }
    }

    /// Make the next write fail with `StoreError::Unavailable` without
    /// changing any state
    pub async fn fail_next_write(&self) {
        self.state.write().await.fail_next_write = true;
    }

    /// All slots of a match, in creation order
    pub async fn slots_of(&self, match_id: MatchId) -> Vec<MatchSlot> {
        self.state
            .read()
            .await
            .slots
            .values()
            .filter(|s| s.match_id == match_id)
            .cloned()
            .collect()
    }

    /// Find a match by ID
    pub async fn get_match(&self, match_id: MatchId) -> Option<Match> {
        self.state.read().await.matches.get(&match_id).cloned()
    }
}

#[async_trait]
impl BracketRepository for MemoryStore {
    async fn get_category(&self, category_id: CategoryId) -> StoreResult<Option<Category>> {
        Ok(self.state.read().await.categories.get(&category_id).cloned())
    }

    async fn get_participant(
        &self,
        participant_id: ParticipantId,
    ) -> StoreResult<Option<Participant>> {
        Ok(self
            .state
            .read()
            .await
            .participants
            .get(&participant_id)
            .cloned())
    }

    async fn get_enrollment(
        &self,
        participant_id: ParticipantId,
        category_id: CategoryId,
    ) -> StoreResult<Option<Enrollment>> {
        let state = self.state.read().await;
        Ok(state
            .enrollments
            .get(&(category_id, participant_id))
            .map(|&seed| Enrollment {
                participant_id,
                category_id,
                seed,
            }))
    }

    async fn count_matches(&self, category_id: CategoryId) -> StoreResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .matches
            .values()
            .filter(|m| m.category_id == category_id)
            .count() as u64)
    }

    async fn load_match_context(&self, match_id: MatchId) -> StoreResult<Option<MatchContext>> {
        let state = self.state.read().await;
        let Some(fixture) = state.matches.get(&match_id).cloned() else {
            return Ok(None);
        };
        let category = state
            .categories
            .get(&fixture.category_id)
            .cloned()
            .ok_or(StoreError::CategoryNotFound(fixture.category_id))?;

        let slots = state
            .slots
            .values()
            .filter(|s| s.match_id == match_id)
            .cloned()
            .collect();
        let outgoing = state
            .relations
            .values()
            .filter(|r| r.source_match_id == match_id)
            .copied()
            .collect();

        Ok(Some(MatchContext {
            fixture,
            category,
            slots,
            outgoing,
        }))
    }

    async fn load_category_snapshot(
        &self,
        category_id: CategoryId,
    ) -> StoreResult<Option<CategorySnapshot>> {
        let state = self.state.read().await;
        let Some(category) = state.categories.get(&category_id).cloned() else {
            return Ok(None);
        };

        let matches: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.category_id == category_id)
            .cloned()
            .collect();
        let match_ids: BTreeSet<MatchId> = matches.iter().map(|m| m.id).collect();

        let slots: Vec<MatchSlot> = state
            .slots
            .values()
            .filter(|s| match_ids.contains(&s.match_id))
            .cloned()
            .collect();
        let relations = state
            .relations
            .values()
            .filter(|r| match_ids.contains(&r.target_match_id))
            .copied()
            .collect();

        let enrolled = state
            .enrollments
            .range((category_id, ParticipantId::MIN)..=(category_id, ParticipantId::MAX))
            .filter_map(|(&(_, participant_id), &seed)| {
                state
                    .participants
                    .get(&participant_id)
                    .map(|p| CategoryParticipant {
                        participant: p.clone(),
                        seed,
                    })
            })
            .collect();

        let occupant_ids: BTreeSet<ParticipantId> =
            slots.iter().map(|s| s.participant_id).collect();
        let occupants = occupant_ids
            .iter()
            .filter_map(|id| state.participants.get(id).cloned())
            .collect();

        Ok(Some(CategorySnapshot {
            category,
            matches,
            slots,
            relations,
            enrolled,
            occupants,
        }))
    }

    async fn upsert_seed(
        &self,
        participant_id: ParticipantId,
        category_id: CategoryId,
        seed: i32,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check_write()?;
        state
            .enrollments
            .insert((category_id, participant_id), Some(seed));
        Ok(())
    }

    async fn insert_bracket(
        &self,
        category_id: CategoryId,
        bracket: &NewBracket,
    ) -> StoreResult<Vec<MatchId>> {
        let mut state = self.state.write().await;
        state.check_write()?;

        if !state.categories.contains_key(&category_id) {
            return Err(StoreError::CategoryNotFound(category_id));
        }
        if state.matches.values().any(|m| m.category_id == category_id) {
            return Err(StoreError::CategoryNotEmpty(category_id));
        }
        let count = bracket.matches.len();
        if let Some(rel) = bracket
            .relations
            .iter()
            .find(|r| r.source >= count || r.target >= count)
        {
            return Err(StoreError::InvalidWrite(format!(
                "relation {} -> {} outside {} matches",
                rel.source, rel.target, count
            )));
        }

        let seeded: BTreeSet<ParticipantId> = bracket.seeds.iter().map(|&(p, _)| p).collect();
        for &(participant_id, seed) in &bracket.seeds {
            let holder = state.enrollments.iter().find(|&(&(cid, pid), &held)| {
                cid == category_id && held == Some(seed) && !seeded.contains(&pid)
            });
            if let Some((&(_, holder), _)) = holder {
                return Err(StoreError::SeedTaken {
                    participant_id,
                    seed,
                    holder,
                });
            }
        }

        for &(participant_id, seed) in &bracket.seeds {
            state
                .enrollments
                .insert((category_id, participant_id), Some(seed));
        }

        let ids: Vec<MatchId> = bracket
            .matches
            .iter()
            .map(|m| state.push_match(category_id, m))
            .collect();

        for rel in &bracket.relations {
            let id = state.next_id();
            state.relations.insert(
                id,
                MatchRelation {
                    id,
                    source_match_id: ids[rel.source],
                    target_match_id: ids[rel.target],
                    qualifier_rank: rel.qualifier_rank,
                },
            );
        }

        if let Some(category) = state.categories.get_mut(&category_id) {
            category.can_sign_up = false;
        }

        Ok(ids)
    }

    async fn insert_flat_match(
        &self,
        category_id: CategoryId,
        new_match: &NewMatch,
    ) -> StoreResult<MatchId> {
        let mut state = self.state.write().await;
        state.check_write()?;

        let category = state
            .categories
            .get(&category_id)
            .ok_or(StoreError::CategoryNotFound(category_id))?;
        if !category.can_sign_up {
            return Err(StoreError::SignUpClosed(category_id));
        }

        let match_id = state.push_match(category_id, new_match);
        if let Some(category) = state.categories.get_mut(&category_id) {
            category.is_bracket = false;
        }
        Ok(match_id)
    }

    async fn commit_outcome(&self, outcome: &MatchOutcome) -> StoreResult<Vec<Advancement>> {
        let mut state = self.state.write().await;
        state.check_write()?;

        let fixture = state
            .matches
            .get(&outcome.match_id)
            .ok_or(StoreError::MatchNotFound(outcome.match_id))?;
        if fixture.status == MatchStatus::Completed {
            return Err(StoreError::MatchAlreadyCompleted(outcome.match_id));
        }
        for result in &outcome.results {
            match state.slots.get(&result.slot_id) {
                Some(slot) if slot.match_id == outcome.match_id => {}
                _ => {
                    return Err(StoreError::InvalidWrite(format!(
                        "slot {} does not belong to match {}",
                        result.slot_id, outcome.match_id
                    )));
                }
            }
        }
        let planned: BTreeSet<SlotId> = outcome.results.iter().map(|r| r.slot_id).collect();
        let current: BTreeSet<SlotId> = state
            .slots
            .values()
            .filter(|s| s.match_id == outcome.match_id)
            .map(|s| s.id)
            .collect();
        if planned != current {
            return Err(StoreError::MatchChanged(outcome.match_id));
        }
        if let Some(missing) = outcome
            .advancements
            .iter()
            .find(|a| !state.matches.contains_key(&a.target_match_id))
        {
            return Err(StoreError::MatchNotFound(missing.target_match_id));
        }

        if let Some(fixture) = state.matches.get_mut(&outcome.match_id) {
            fixture.status = MatchStatus::Completed;
        }
        for result in &outcome.results {
            if let Some(slot) = state.slots.get_mut(&result.slot_id) {
                slot.rank = Some(result.rank);
                slot.result_type = Some(result.result_type);
            }
        }

        let mut inserted = Vec::with_capacity(outcome.advancements.len());
        for advancement in &outcome.advancements {
            if state.has_slot(advancement.target_match_id, advancement.participant_id) {
                continue;
            }
            state.push_slot(
                advancement.target_match_id,
                &NewSlot {
                    participant_id: advancement.participant_id,
                    role: SlotRole::Competitor,
                    position: None,
                },
            );
            inserted.push(*advancement);
        }

        Ok(inserted)
    }
}
