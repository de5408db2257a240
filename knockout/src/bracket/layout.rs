//! Declarative bracket layouts.
//!
//! A layout names matches by caller-chosen match numbers that are only
//! meaningful within one build call. Relations connect those numbers.

use super::errors::LayoutError;
use super::models::{ParticipantId, SlotRole};
use serde::{Deserialize, Serialize};

/// Participant placement inside a match descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDescriptor {
    pub participant_id: ParticipantId,
    /// Seed recorded for the participant in the category
    pub seed: i32,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub role: SlotRole,
}

/// One match of a layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDescriptor {
    pub round: i32,
    pub match_number: i32,
    #[serde(default)]
    pub slots: Vec<SlotDescriptor>,
}

/// Advancement edge between two match numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    pub source_match_number: i32,
    pub target_match_number: i32,
    #[serde(default = "default_qualifier_rank")]
    pub qualifier_rank: i32,
}

fn default_qualifier_rank() -> i32 {
    1
}

/// Complete bracket layout for one category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketLayout {
    pub matches: Vec<MatchDescriptor>,
    #[serde(default)]
    pub relations: Vec<RelationDescriptor>,
}

/// Entrant with a seed, input to [`BracketLayout::single_elimination`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededEntrant {
    pub participant_id: ParticipantId,
    pub seed: i32,
}

impl SeededEntrant {
    pub fn new(participant_id: ParticipantId, seed: i32) -> Self {
        Self {
            participant_id,
            seed,
        }
    }
}

/// A line of the bracket while rounds are being generated
#[derive(Clone, Copy)]
enum Line {
    /// Decided by the match with this number
    Played(i32),
    /// Entrant already placed on the line (first round, or advanced by a bye)
    Seated(SeededEntrant),
    Empty,
}

impl BracketLayout {
    /// Add a match
    pub fn with_match(mut self, round: i32, match_number: i32, slots: Vec<SlotDescriptor>) -> Self {
        self.matches.push(MatchDescriptor {
            round,
            match_number,
            slots,
        });
        self
    }

    /// Add a relation
    pub fn with_relation(mut self, source: i32, target: i32, qualifier_rank: i32) -> Self {
        self.relations.push(RelationDescriptor {
            source_match_number: source,
            target_match_number: target,
            qualifier_rank,
        });
        self
    }

    /// Number of distinct rounds in the layout
    pub fn round_count(&self) -> usize {
        let mut rounds: Vec<i32> = self.matches.iter().map(|m| m.round).collect();
        rounds.sort_unstable();
        rounds.dedup();
        rounds.len()
    }

    /// Generate a standard seeded single-elimination layout
    ///
    /// The field is padded to the next power of two and seeds are placed in
    /// standard order (for 8 lines: 1, 8, 4, 5, 2, 7, 3, 6). A first-round
    /// pairing with a single entrant is a bye: no match is emitted and the
    /// entrant is placed directly in the second-round match. Matches are
    /// numbered sequentially round by round, top to bottom.
    ///
    /// # Errors
    ///
    /// * `LayoutError::TooFewEntrants` - fewer than two entrants
    /// * `LayoutError::InvalidSeed` - a seed below 1
    /// * `LayoutError::DuplicateSeed` - two entrants share a seed
    pub fn single_elimination(entrants: &[SeededEntrant]) -> Result<Self, LayoutError> {
        if entrants.len() < 2 {
            return Err(LayoutError::TooFewEntrants(entrants.len()));
        }

        let mut seeded = entrants.to_vec();
        seeded.sort_by_key(|e| e.seed);

        if let Some(bad) = seeded.iter().find(|e| e.seed < 1) {
            return Err(LayoutError::InvalidSeed {
                participant_id: bad.participant_id,
                seed: bad.seed,
            });
        }
        if let Some(pair) = seeded.windows(2).find(|w| w[0].seed == w[1].seed) {
            return Err(LayoutError::DuplicateSeed {
                seed: pair[0].seed,
                first: pair[0].participant_id,
                second: pair[1].participant_id,
            });
        }

        let size = seeded.len().next_power_of_two();
        let total_rounds = size.trailing_zeros() as i32;

        // Placement order refers to strength rank (1-based index into `seeded`)
        let mut lines: Vec<Line> = seeded_order(size)
            .into_iter()
            .map(|rank| seeded.get(rank - 1).map_or(Line::Empty, |e| Line::Seated(*e)))
            .collect();

        let mut layout = BracketLayout::default();
        let mut next_number = 1;

        for round in 1..=total_rounds {
            let mut next_lines = Vec::with_capacity(lines.len() / 2);

            for pair in lines.chunks(2) {
                let (left, right) = (pair[0], pair[1]);

                // First-round byes skip the match entirely
                if round == 1 {
                    match (left, right) {
                        (Line::Seated(e), Line::Empty) | (Line::Empty, Line::Seated(e)) => {
                            next_lines.push(Line::Seated(e));
                            continue;
                        }
                        (Line::Empty, Line::Empty) => {
                            next_lines.push(Line::Empty);
                            continue;
                        }
                        _ => {}
                    }
                }

                let match_number = next_number;
                next_number += 1;

                let mut slots = Vec::new();
                for (index, line) in [left, right].into_iter().enumerate() {
                    match line {
                        Line::Seated(entrant) => slots.push(SlotDescriptor {
                            participant_id: entrant.participant_id,
                            seed: entrant.seed,
                            position: Some(format!("slot-{}", index + 1)),
                            role: SlotRole::Competitor,
                        }),
                        Line::Played(source) => {
                            layout.relations.push(RelationDescriptor {
                                source_match_number: source,
                                target_match_number: match_number,
                                qualifier_rank: 1,
                            });
                        }
                        Line::Empty => {}
                    }
                }

                layout.matches.push(MatchDescriptor {
                    round,
                    match_number,
                    slots,
                });
                next_lines.push(Line::Played(match_number));
            }

            lines = next_lines;
        }

        Ok(layout)
    }
}

/// Standard bracket placement order for `n` lines (`n` a power of two)
///
/// Seed `s` always meets seed `n + 1 - s` in the first round, and the top
/// two seeds can only meet in the final.
pub fn seeded_order(n: usize) -> Vec<usize> {
    if n <= 1 {
        return vec![1];
    }
    let previous = seeded_order(n / 2);
    let mut order = Vec::with_capacity(n);
    for seed in previous {
        order.push(seed);
        order.push(n + 1 - seed);
    }
    order
}
