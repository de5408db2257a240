//! Result planning for a single match.
//!
//! Pure functions: given a loaded [`MatchContext`] and a winner, decide every
//! rank, result type and advancement without touching the store.

use super::errors::{AdvanceResult, ResultError};
use super::models::{MatchSlot, ParticipantId, ResultType};
use crate::store::{Advancement, MatchContext, MatchOutcome, SlotResult};
use std::collections::HashSet;

/// Rank every slot of a match
///
/// The winner gets rank 1 and `Win`. The other slots get ranks 2, 3, ... in
/// slot creation order with `Loss`. Returns `None` if the winner has no slot.
///
/// Losers are not ordered by score. Creation order is the only tie-break.
pub fn rank_slots(slots: &[MatchSlot], winner: ParticipantId) -> Option<Vec<SlotResult>> {
    let winner_slot = slots.iter().find(|s| s.participant_id == winner)?;

    let mut results = Vec::with_capacity(slots.len());
    results.push(SlotResult {
        slot_id: winner_slot.id,
        rank: 1,
        result_type: ResultType::Win,
    });

    let mut next_rank = 2;
    for slot in slots.iter().filter(|s| s.id != winner_slot.id) {
        results.push(SlotResult {
            slot_id: slot.id,
            rank: next_rank,
            result_type: ResultType::Loss,
        });
        next_rank += 1;
    }

    Some(results)
}

/// Plan the complete outcome of `set_winner`
///
/// Each outgoing relation advances the participant holding its qualifier
/// rank. A relation whose rank nobody holds advances nobody. Repeated
/// `(target, participant)` pairs are planned once.
pub fn plan_outcome(context: &MatchContext, winner: ParticipantId) -> AdvanceResult<MatchOutcome> {
    let match_id = context.fixture.id;
    let results =
        rank_slots(&context.slots, winner).ok_or(ResultError::WinnerNotInMatch {
            match_id,
            participant_id: winner,
        })?;

    let mut seen = HashSet::new();
    let mut advancements = Vec::new();
    for relation in &context.outgoing {
        let holder = results
            .iter()
            .find(|r| r.rank == relation.qualifier_rank)
            .and_then(|r| context.slots.iter().find(|s| s.id == r.slot_id));

        let Some(slot) = holder else {
            log::debug!(
                "Match {} has no rank {} for relation {}",
                match_id,
                relation.qualifier_rank,
                relation.id
            );
            continue;
        };

        if seen.insert((relation.target_match_id, slot.participant_id)) {
            advancements.push(Advancement {
                target_match_id: relation.target_match_id,
                participant_id: slot.participant_id,
                qualifier_rank: relation.qualifier_rank,
            });
        }
    }

    Ok(MatchOutcome {
        match_id,
        results,
        advancements,
    })
}
