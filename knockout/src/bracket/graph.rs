//! Structural validation of bracket layouts.
//!
//! Matches are addressed by index into the layout and relations form an
//! edge list over those indexes, so acyclicity is checked on the edge list
//! itself (Kahn's algorithm) rather than on any pointer structure.

use super::errors::LayoutError;
use super::layout::BracketLayout;
use super::models::ParticipantId;
use std::collections::{HashMap, HashSet, VecDeque};

/// Relation resolved to layout indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub qualifier_rank: i32,
}

/// Validated layout graph
#[derive(Debug, Clone)]
pub struct LayoutGraph {
    match_numbers: Vec<i32>,
    edges: Vec<Edge>,
    topological_order: Vec<usize>,
    seeds: Vec<(ParticipantId, i32)>,
}

impl LayoutGraph {
    /// Validate a layout and build its graph
    ///
    /// Checks run before anything is written:
    /// - at least one match, unique match numbers, rounds from 1
    /// - no participant twice in one match
    /// - seeds positive, one seed per participant, one participant per seed
    /// - relations reference known match numbers with rank >= 1
    /// - at most one outgoing relation per (source, rank)
    /// - relations are acyclic
    pub fn from_layout(layout: &BracketLayout) -> Result<Self, LayoutError> {
        if layout.matches.is_empty() {
            return Err(LayoutError::Empty);
        }

        let mut index: HashMap<i32, usize> = HashMap::with_capacity(layout.matches.len());
        for (i, m) in layout.matches.iter().enumerate() {
            if index.insert(m.match_number, i).is_some() {
                return Err(LayoutError::DuplicateMatchNumber(m.match_number));
            }
            if m.round < 1 {
                return Err(LayoutError::InvalidRound {
                    match_number: m.match_number,
                    round: m.round,
                });
            }
        }

        let seeds = collect_seeds(layout)?;

        let mut edges = Vec::with_capacity(layout.relations.len());
        let mut qualifiers: HashSet<(usize, i32)> = HashSet::new();
        for rel in &layout.relations {
            let source = *index
                .get(&rel.source_match_number)
                .ok_or(LayoutError::UnknownMatchNumber(rel.source_match_number))?;
            let target = *index
                .get(&rel.target_match_number)
                .ok_or(LayoutError::UnknownMatchNumber(rel.target_match_number))?;

            if rel.qualifier_rank < 1 {
                return Err(LayoutError::InvalidQualifierRank {
                    source_match: rel.source_match_number,
                    target_match: rel.target_match_number,
                    rank: rel.qualifier_rank,
                });
            }
            if !qualifiers.insert((source, rel.qualifier_rank)) {
                return Err(LayoutError::DuplicateQualifier {
                    match_number: rel.source_match_number,
                    rank: rel.qualifier_rank,
                });
            }

            edges.push(Edge {
                source,
                target,
                qualifier_rank: rel.qualifier_rank,
            });
        }

        let match_numbers: Vec<i32> = layout.matches.iter().map(|m| m.match_number).collect();
        let topological_order = topological_sort(match_numbers.len(), &edges).map_err(|stuck| {
            let mut cycle: Vec<i32> = stuck.into_iter().map(|i| match_numbers[i]).collect();
            cycle.sort_unstable();
            LayoutError::CyclicRelations(cycle)
        })?;

        Ok(Self {
            match_numbers,
            edges,
            topological_order,
            seeds,
        })
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Match indexes with every source before its targets
    pub fn topological_order(&self) -> &[usize] {
        &self.topological_order
    }

    /// Distinct `(participant, seed)` pairs in order of first appearance
    pub fn seeds(&self) -> &[(ParticipantId, i32)] {
        &self.seeds
    }

    /// Length (in edges) of the longest path through the relations
    pub fn longest_path(&self) -> usize {
        let mut depth = vec![0usize; self.match_numbers.len()];
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); self.match_numbers.len()];
        for edge in &self.edges {
            outgoing[edge.source].push(edge.target);
        }
        for &node in &self.topological_order {
            for &next in &outgoing[node] {
                depth[next] = depth[next].max(depth[node] + 1);
            }
        }
        depth.into_iter().max().unwrap_or(0)
    }
}

/// Kahn's algorithm over `count` nodes
///
/// Returns the nodes in topological order, or the nodes that could not be
/// ordered (every node on a cycle or downstream of one).
fn topological_sort(count: usize, edges: &[Edge]) -> Result<Vec<usize>, Vec<usize>> {
    let mut in_degree = vec![0usize; count];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); count];
    for edge in edges {
        in_degree[edge.target] += 1;
        outgoing[edge.source].push(edge.target);
    }

    let mut queue: VecDeque<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
    let mut ordered = Vec::with_capacity(count);

    while let Some(node) = queue.pop_front() {
        ordered.push(node);
        for &next in &outgoing[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if ordered.len() == count {
        Ok(ordered)
    } else {
        Err((0..count).filter(|&i| in_degree[i] > 0).collect())
    }
}

fn collect_seeds(layout: &BracketLayout) -> Result<Vec<(ParticipantId, i32)>, LayoutError> {
    let mut by_participant: HashMap<ParticipantId, i32> = HashMap::new();
    let mut by_seed: HashMap<i32, ParticipantId> = HashMap::new();
    let mut ordered = Vec::new();

    for m in &layout.matches {
        let mut in_match: HashSet<ParticipantId> = HashSet::with_capacity(m.slots.len());
        for slot in &m.slots {
            if !in_match.insert(slot.participant_id) {
                return Err(LayoutError::DuplicateSlot {
                    match_number: m.match_number,
                    participant_id: slot.participant_id,
                });
            }
            if slot.seed < 1 {
                return Err(LayoutError::InvalidSeed {
                    participant_id: slot.participant_id,
                    seed: slot.seed,
                });
            }

            match by_participant.get(&slot.participant_id) {
                Some(&seed) if seed != slot.seed => {
                    return Err(LayoutError::ConflictingSeeds {
                        participant_id: slot.participant_id,
                        first: seed,
                        second: slot.seed,
                    });
                }
                Some(_) => continue,
                None => {}
            }
            if let Some(&holder) = by_seed.get(&slot.seed) {
                return Err(LayoutError::DuplicateSeed {
                    seed: slot.seed,
                    first: holder,
                    second: slot.participant_id,
                });
            }

            by_participant.insert(slot.participant_id, slot.seed);
            by_seed.insert(slot.seed, slot.participant_id);
            ordered.push((slot.participant_id, slot.seed));
        }
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::layout::{SeededEntrant, SlotDescriptor};
    use crate::bracket::models::SlotRole;

    fn slot(participant_id: ParticipantId, seed: i32) -> SlotDescriptor {
        SlotDescriptor {
            participant_id,
            seed,
            position: None,
            role: SlotRole::Competitor,
        }
    }

    fn four_player_layout() -> BracketLayout {
        BracketLayout::default()
            .with_match(1, 1, vec![slot(1, 1), slot(4, 4)])
            .with_match(1, 2, vec![slot(2, 2), slot(3, 3)])
            .with_match(2, 3, vec![])
            .with_relation(1, 3, 1)
            .with_relation(2, 3, 1)
    }

    #[test]
    fn test_valid_layout() {
        let graph = LayoutGraph::from_layout(&four_player_layout()).unwrap();
        assert_eq!(graph.edges().len(), 2);
        assert_eq!(graph.longest_path(), 1);
        assert_eq!(graph.seeds(), &[(1, 1), (4, 4), (2, 2), (3, 3)]);

        let order = graph.topological_order();
        let pos = |i: usize| order.iter().position(|&n| n == i).unwrap();
        assert!(pos(0) < pos(2));
        assert!(pos(1) < pos(2));
    }

    #[test]
    fn test_empty_layout_rejected() {
        assert_eq!(
            LayoutGraph::from_layout(&BracketLayout::default()).unwrap_err(),
            LayoutError::Empty
        );
    }

    #[test]
    fn test_dangling_relation_rejected() {
        let layout = four_player_layout().with_relation(3, 9, 1);
        assert_eq!(
            LayoutGraph::from_layout(&layout).unwrap_err(),
            LayoutError::UnknownMatchNumber(9)
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let layout = BracketLayout::default()
            .with_match(1, 1, vec![])
            .with_match(2, 2, vec![])
            .with_match(3, 3, vec![])
            .with_relation(1, 2, 1)
            .with_relation(2, 3, 1)
            .with_relation(3, 2, 2);
        assert_eq!(
            LayoutGraph::from_layout(&layout).unwrap_err(),
            LayoutError::CyclicRelations(vec![2, 3])
        );
    }

    #[test]
    fn test_self_loop_rejected() {
        let layout = BracketLayout::default()
            .with_match(1, 1, vec![])
            .with_relation(1, 1, 1);
        assert_eq!(
            LayoutGraph::from_layout(&layout).unwrap_err(),
            LayoutError::CyclicRelations(vec![1])
        );
    }

    #[test]
    fn test_duplicate_match_number_rejected() {
        let layout = BracketLayout::default()
            .with_match(1, 1, vec![])
            .with_match(1, 1, vec![]);
        assert_eq!(
            LayoutGraph::from_layout(&layout).unwrap_err(),
            LayoutError::DuplicateMatchNumber(1)
        );
    }

    #[test]
    fn test_duplicate_qualifier_rejected() {
        let layout = four_player_layout()
            .with_match(2, 4, vec![])
            .with_relation(1, 4, 1);
        assert_eq!(
            LayoutGraph::from_layout(&layout).unwrap_err(),
            LayoutError::DuplicateQualifier {
                match_number: 1,
                rank: 1
            }
        );
    }

    #[test]
    fn test_runner_up_relation_allowed() {
        let layout = four_player_layout()
            .with_match(2, 4, vec![])
            .with_relation(1, 4, 2)
            .with_relation(2, 4, 2);
        let graph = LayoutGraph::from_layout(&layout).unwrap();
        assert_eq!(graph.edges().len(), 4);
    }

    #[test]
    fn test_invalid_qualifier_rank_rejected() {
        let layout = four_player_layout().with_relation(1, 3, 0);
        assert!(matches!(
            LayoutGraph::from_layout(&layout).unwrap_err(),
            LayoutError::InvalidQualifierRank { rank: 0, .. }
        ));
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let layout = BracketLayout::default().with_match(1, 1, vec![slot(1, 1), slot(1, 1)]);
        assert_eq!(
            LayoutGraph::from_layout(&layout).unwrap_err(),
            LayoutError::DuplicateSlot {
                match_number: 1,
                participant_id: 1
            }
        );
    }

    #[test]
    fn test_seed_conflicts_rejected() {
        let shared = BracketLayout::default().with_match(1, 1, vec![slot(1, 1), slot(2, 1)]);
        assert_eq!(
            LayoutGraph::from_layout(&shared).unwrap_err(),
            LayoutError::DuplicateSeed {
                seed: 1,
                first: 1,
                second: 2
            }
        );

        let conflicting = BracketLayout::default()
            .with_match(1, 1, vec![slot(1, 1)])
            .with_match(1, 2, vec![slot(1, 2)]);
        assert_eq!(
            LayoutGraph::from_layout(&conflicting).unwrap_err(),
            LayoutError::ConflictingSeeds {
                participant_id: 1,
                first: 1,
                second: 2
            }
        );
    }

    #[test]
    fn test_same_participant_same_seed_in_two_matches() {
        let layout = four_player_layout()
            .with_match(3, 4, vec![slot(1, 1)])
            .with_relation(3, 4, 1);
        let graph = LayoutGraph::from_layout(&layout).unwrap();
        assert_eq!(graph.seeds().len(), 4);
        assert_eq!(graph.longest_path(), 2);
    }

    #[test]
    fn test_generated_layout_longest_path() {
        let entrants: Vec<SeededEntrant> =
            (1..=13).map(|i| SeededEntrant::new(i, i as i32)).collect();
        let layout = BracketLayout::single_elimination(&entrants).unwrap();
        let graph = LayoutGraph::from_layout(&layout).unwrap();
        assert_eq!(layout.round_count(), 4);
        assert_eq!(graph.longest_path(), layout.round_count() - 1);
    }
}
