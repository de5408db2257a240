/// Property-based tests for layout validation and bracket play using proptest
///
/// These tests check graph invariants across randomly generated layouts and
/// randomly played brackets.
use knockout::bracket::{
    BracketEngine, BracketLayout, LayoutError, LayoutGraph, MatchStatus, ResultType, SeededEntrant,
};
use knockout::store::MemoryStore;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

fn entrants(count: usize) -> Vec<SeededEntrant> {
    (1..=count)
        .map(|i| SeededEntrant::new(1000 + i as i64, i as i32))
        .collect()
}

// Strategy for a random edge list over `nodes` matches (self-loops included)
fn edges_strategy(nodes: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..nodes, 0..nodes), 0..=nodes * 2)
}

// Reference cycle check: transitive closure by repeated relaxation
fn has_cycle(nodes: usize, edges: &[(usize, usize)]) -> bool {
    let mut reach = vec![vec![false; nodes]; nodes];
    for &(s, t) in edges {
        reach[s][t] = true;
    }
    for k in 0..nodes {
        for i in 0..nodes {
            if reach[i][k] {
                for j in 0..nodes {
                    if reach[k][j] {
                        reach[i][j] = true;
                    }
                }
            }
        }
    }
    (0..nodes).any(|i| reach[i][i])
}

// Layout with one match per node; each edge from a source gets the next rank
fn layout_from_edges(nodes: usize, edges: &[(usize, usize)]) -> BracketLayout {
    let mut layout = BracketLayout::default();
    for n in 0..nodes {
        layout = layout.with_match(1, n as i32 + 1, vec![]);
    }
    let mut next_rank: HashMap<usize, i32> = HashMap::new();
    for &(s, t) in edges {
        let rank = next_rank.entry(s).or_insert(0);
        *rank += 1;
        layout = layout.with_relation(s as i32 + 1, t as i32 + 1, *rank);
    }
    layout
}

proptest! {
    #[test]
    fn test_generated_bracket_is_valid(count in 2usize..=64) {
        let layout = BracketLayout::single_elimination(&entrants(count)).unwrap();
        let graph = LayoutGraph::from_layout(&layout).unwrap();

        // n entrants need n - 1 matches to eliminate everyone but one
        prop_assert_eq!(layout.matches.len(), count - 1);
        prop_assert_eq!(graph.longest_path(), layout.round_count() - 1);
        prop_assert_eq!(graph.seeds().len(), count);

        // Every match except the final feeds exactly one match
        let sources: HashSet<i32> =
            layout.relations.iter().map(|r| r.source_match_number).collect();
        prop_assert_eq!(sources.len(), layout.matches.len() - 1);
    }

    #[test]
    fn test_generated_bracket_has_two_entries_per_match(count in 2usize..=64) {
        let layout = BracketLayout::single_elimination(&entrants(count)).unwrap();
        for m in &layout.matches {
            let feeders = layout
                .relations
                .iter()
                .filter(|r| r.target_match_number == m.match_number)
                .count();
            prop_assert_eq!(m.slots.len() + feeders, 2);
        }
    }

    #[test]
    fn test_relations_accepted_iff_acyclic(
        (nodes, edges) in (1usize..=7).prop_flat_map(|n| (Just(n), edges_strategy(n)))
    ) {
        let layout = layout_from_edges(nodes, &edges);
        let result = LayoutGraph::from_layout(&layout);

        if has_cycle(nodes, &edges) {
            prop_assert!(
                matches!(result, Err(LayoutError::CyclicRelations(_))),
                "cyclic layout accepted: {:?}",
                edges
            );
        } else {
            let graph = result.unwrap();
            // Every edge goes forward in the topological order
            let order = graph.topological_order();
            let position: HashMap<usize, usize> =
                order.iter().enumerate().map(|(i, &n)| (n, i)).collect();
            for &(s, t) in &edges {
                prop_assert!(position[&s] < position[&t]);
            }
        }
    }

    #[test]
    fn test_random_play_yields_one_champion(
        count in 2usize..=20,
        picks in prop::collection::vec(any::<bool>(), 32)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (statuses, wins, losses, champions) = runtime.block_on(async {
            let store = Arc::new(MemoryStore::new());
            let category = store.add_category("Open", 1).await;
            let mut field = Vec::new();
            for seed in 1..=count {
                let id = store.add_participant(1, &format!("P{seed}")).await;
                store.enroll(id, category, None).await;
                field.push(SeededEntrant::new(id, seed as i32));
            }

            let engine = BracketEngine::new(store.clone());
            let layout = BracketLayout::single_elimination(&field).unwrap();
            let report = engine.build_bracket(category, &layout).await.unwrap();

            for (i, (_, match_id)) in report.matches.iter().enumerate() {
                let slots = store.slots_of(*match_id).await;
                let pick = usize::from(picks[i % picks.len()]);
                let winner = slots[pick.min(slots.len() - 1)].participant_id;
                engine.set_winner(*match_id, winner).await.unwrap();
            }

            let view = engine.render_bracket(category).await.unwrap();
            let all: Vec<_> = view.rounds.iter().flat_map(|r| r.matches.iter()).collect();
            let statuses: Vec<MatchStatus> = all.iter().map(|m| m.status).collect();
            let results: Vec<(i64, Option<ResultType>)> = all
                .iter()
                .flat_map(|m| m.slots.iter().map(|s| (s.participant_id, s.result_type)))
                .collect();

            let wins: HashSet<i64> = results
                .iter()
                .filter(|(_, r)| *r == Some(ResultType::Win))
                .map(|(id, _)| *id)
                .collect();
            let losses: Vec<i64> = results
                .iter()
                .filter(|(_, r)| *r == Some(ResultType::Loss))
                .map(|(id, _)| *id)
                .collect();
            let champions: Vec<i64> = wins
                .iter()
                .filter(|id| !losses.contains(id))
                .copied()
                .collect();
            (statuses, wins, losses, champions)
        });

        prop_assert!(statuses.iter().all(|s| *s == MatchStatus::Completed));
        prop_assert_eq!(losses.len(), count - 1);
        let distinct: HashSet<i64> = losses.iter().copied().collect();
        prop_assert_eq!(distinct.len(), count - 1);
        prop_assert!(!wins.is_empty());
        prop_assert_eq!(champions.len(), 1);
    }
}
