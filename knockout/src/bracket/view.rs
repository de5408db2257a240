//! Read-only projection of a category's bracket, grouped by round.

use super::models::{
    CategoryId, MatchId, MatchStatus, ParticipantId, ResultType, SlotRole,
};
use crate::store::CategorySnapshot;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One slot as rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotView {
    pub participant_id: ParticipantId,
    pub name: String,
    pub role: SlotRole,
    pub position: Option<String>,
    pub score: Option<f64>,
    /// Seed in the category, if any
    pub seed: Option<i32>,
    pub rank: Option<i32>,
    pub result_type: Option<ResultType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchView {
    pub id: MatchId,
    pub round: Option<i32>,
    pub match_number: Option<i32>,
    pub status: MatchStatus,
    /// Matches with an outgoing relation into this one
    pub source_ids: Vec<MatchId>,
    pub slots: Vec<SlotView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundView {
    /// `None` groups matches without a round (flat lists)
    pub round: Option<i32>,
    pub matches: Vec<MatchView>,
}

/// Enrolled participant with seed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub name: String,
    pub seed: Option<i32>,
}

/// Rendered bracket of one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketView {
    pub category_id: CategoryId,
    pub category_name: String,
    pub is_bracket: bool,
    /// Ascending by round
    pub rounds: Vec<RoundView>,
    /// Seeded participants by seed, then unseeded ones by ID
    pub participants: Vec<ParticipantView>,
}

impl BracketView {
    /// Project a snapshot into the view
    pub fn from_snapshot(snapshot: &CategorySnapshot) -> Self {
        let seeds: HashMap<ParticipantId, i32> = snapshot
            .enrolled
            .iter()
            .filter_map(|e| e.seed.map(|seed| (e.participant.id, seed)))
            .collect();
        let names: HashMap<ParticipantId, &str> = snapshot
            .occupants
            .iter()
            .map(|p| (p.id, p.name.as_str()))
            .chain(
                snapshot
                    .enrolled
                    .iter()
                    .map(|e| (e.participant.id, e.participant.name.as_str())),
            )
            .collect();

        let mut sources: HashMap<MatchId, Vec<MatchId>> = HashMap::new();
        let mut seen_edges = HashSet::new();
        for relation in &snapshot.relations {
            if seen_edges.insert((relation.source_match_id, relation.target_match_id)) {
                sources
                    .entry(relation.target_match_id)
                    .or_default()
                    .push(relation.source_match_id);
            }
        }

        let mut slots: HashMap<MatchId, Vec<SlotView>> = HashMap::new();
        for slot in &snapshot.slots {
            slots.entry(slot.match_id).or_default().push(SlotView {
                participant_id: slot.participant_id,
                name: names
                    .get(&slot.participant_id)
                    .map(|name| name.to_string())
                    .unwrap_or_default(),
                role: slot.role,
                position: slot.position.clone(),
                score: slot.score,
                seed: seeds.get(&slot.participant_id).copied(),
                rank: slot.rank,
                result_type: slot.result_type,
            });
        }

        let mut rounds: BTreeMap<Option<i32>, Vec<MatchView>> = BTreeMap::new();
        for m in &snapshot.matches {
            rounds.entry(m.round).or_default().push(MatchView {
                id: m.id,
                round: m.round,
                match_number: m.match_number,
                status: m.status,
                source_ids: sources.remove(&m.id).unwrap_or_default(),
                slots: slots.remove(&m.id).unwrap_or_default(),
            });
        }

        let rounds = rounds
            .into_iter()
            .map(|(round, mut matches)| {
                matches.sort_by_key(|m| (m.match_number, m.id));
                RoundView { round, matches }
            })
            .collect();

        let mut participants: Vec<ParticipantView> = snapshot
            .enrolled
            .iter()
            .map(|e| ParticipantView {
                id: e.participant.id,
                name: e.participant.name.clone(),
                seed: e.seed,
            })
            .collect();
        participants.sort_by_key(|p| (p.seed.is_none(), p.seed, p.id));

        Self {
            category_id: snapshot.category.id,
            category_name: snapshot.category.name.clone(),
            is_bracket: snapshot.category.is_bracket,
            rounds,
            participants,
        }
    }

    /// Find a match anywhere in the view
    pub fn find_match(&self, match_id: MatchId) -> Option<&MatchView> {
        self.rounds
            .iter()
            .flat_map(|r| r.matches.iter())
            .find(|m| m.id == match_id)
    }

    pub fn match_count(&self) -> usize {
        self.rounds.iter().map(|r| r.matches.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::models::{
        Category, CategoryParticipant, Match, MatchRelation, MatchSlot, Participant,
    };

    fn participant(id: ParticipantId, name: &str) -> Participant {
        Participant {
            id,
            club_id: 1,
            name: name.to_string(),
        }
    }

    fn fixture(id: MatchId, round: Option<i32>, number: Option<i32>) -> Match {
        Match {
            id,
            category_id: 1,
            round,
            match_number: number,
            start_time: None,
            status: MatchStatus::Scheduled,
        }
    }

    fn slot(id: i64, match_id: MatchId, participant_id: ParticipantId) -> MatchSlot {
        MatchSlot {
            id,
            match_id,
            participant_id,
            role: SlotRole::Competitor,
            position: None,
            score: Some(1.5),
            rank: None,
            result_type: None,
        }
    }

    fn relation(id: i64, source: MatchId, target: MatchId, rank: i32) -> MatchRelation {
        MatchRelation {
            id,
            source_match_id: source,
            target_match_id: target,
            qualifier_rank: rank,
        }
    }

    fn snapshot() -> CategorySnapshot {
        CategorySnapshot {
            category: Category {
                id: 1,
                name: "Open".to_string(),
                order: 0,
                can_sign_up: false,
                is_bracket: true,
            },
            // Stored out of round order on purpose
            matches: vec![
                fixture(30, Some(2), Some(3)),
                fixture(12, Some(1), Some(2)),
                fixture(11, Some(1), Some(1)),
            ],
            slots: vec![slot(1, 11, 100), slot(2, 11, 103), slot(3, 12, 101)],
            relations: vec![
                relation(1, 11, 30, 1),
                relation(2, 12, 30, 1),
                relation(3, 12, 30, 2),
            ],
            enrolled: vec![
                CategoryParticipant {
                    participant: participant(100, "Ana"),
                    seed: Some(1),
                },
                CategoryParticipant {
                    participant: participant(101, "Bo"),
                    seed: Some(2),
                },
                CategoryParticipant {
                    participant: participant(102, "Cy"),
                    seed: None,
                },
                CategoryParticipant {
                    participant: participant(103, "Di"),
                    seed: Some(4),
                },
            ],
            occupants: vec![
                participant(100, "Ana"),
                participant(101, "Bo"),
                participant(103, "Di"),
            ],
        }
    }

    #[test]
    fn test_rounds_ascending_and_matches_ordered() {
        let view = BracketView::from_snapshot(&snapshot());
        let rounds: Vec<Option<i32>> = view.rounds.iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![Some(1), Some(2)]);

        let first: Vec<MatchId> = view.rounds[0].matches.iter().map(|m| m.id).collect();
        assert_eq!(first, vec![11, 12]);
        assert_eq!(view.match_count(), 3);
    }

    #[test]
    fn test_source_ids_deduplicated() {
        let view = BracketView::from_snapshot(&snapshot());
        assert_eq!(view.find_match(30).unwrap().source_ids, vec![11, 12]);
        assert!(view.find_match(11).unwrap().source_ids.is_empty());
    }

    #[test]
    fn test_slots_carry_name_and_seed() {
        let view = BracketView::from_snapshot(&snapshot());
        let slots = &view.find_match(11).unwrap().slots;
        assert_eq!(slots[0].name, "Ana");
        assert_eq!(slots[0].seed, Some(1));
        assert_eq!(slots[1].name, "Di");
        assert_eq!(slots[1].seed, Some(4));
        assert_eq!(slots[0].score, Some(1.5));
    }

    #[test]
    fn test_participants_seeded_first() {
        let view = BracketView::from_snapshot(&snapshot());
        let order: Vec<ParticipantId> = view.participants.iter().map(|p| p.id).collect();
        assert_eq!(order, vec![100, 101, 103, 102]);
    }

    #[test]
    fn test_flat_matches_grouped_first() {
        let mut snap = snapshot();
        snap.matches.push(fixture(40, None, None));
        let view = BracketView::from_snapshot(&snap);
        assert_eq!(view.rounds[0].round, None);
        assert_eq!(view.rounds[0].matches[0].id, 40);
    }
}
