//! Property-based tests for the analysis pipeline invariants.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use proptest::prelude::*;

use nmjl_engine::game::constants::*;
use nmjl_engine::game::{full_tile_set, Tile};
use nmjl_engine::service::{
    AnalysisRequest, GameContext, GamePhase, HandAnalyzer, TileAction, VariationStore,
};
use nmjl_engine::EngineConfig;

fn store() -> Arc<VariationStore> {
    static STORE: OnceLock<Arc<VariationStore>> = OnceLock::new();
    STORE
        .get_or_init(|| Arc::new(VariationStore::builtin().expect("builtin corpus loads")))
        .clone()
}

fn analyzer() -> HandAnalyzer {
    HandAnalyzer::new(store(), EngineConfig::default())
}

/// Strategy: a legal hand of 0-14 tiles drawn from the full set.
fn hand_strategy() -> impl Strategy<Value = Vec<Tile>> {
    prop::sample::subsequence(full_tile_set(), 0..=HAND_TILE_COUNT).prop_shuffle()
}

fn phase_strategy() -> impl Strategy<Value = GamePhase> {
    prop_oneof![Just(GamePhase::Charleston), Just(GamePhase::Gameplay)]
}

fn context(phase: GamePhase, jokers: u8) -> GameContext {
    GameContext {
        phase,
        jokers_in_hand: jokers,
        wall_remaining: 60,
        ..GameContext::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // 1. matched + needed == 14, completion == matched / 14
    #[test]
    fn match_results_are_consistent(hand in hand_strategy()) {
        let request = AnalysisRequest::new(hand, GameContext::default()).unwrap();
        let result = analyzer().analyze(&request);
        for facts in &result.facts {
            for m in std::iter::once(&facts.best).chain(std::iter::once(&facts.worst)).chain(&facts.alternates) {
                prop_assert_eq!(m.tiles_matched as usize + m.tiles_needed as usize, HAND_TILE_COUNT);
                prop_assert_eq!(m.missing_tiles.len(), m.tiles_needed as usize);
                let expected = m.tiles_matched as f64 / HAND_TILE_COUNT as f64;
                prop_assert!((m.completion_ratio - expected).abs() < 1e-12);
            }
            prop_assert!(facts.best.tiles_matched >= facts.worst.tiles_matched);
        }
    }

    // 2. totalScore is exactly the sum of its bounded components
    #[test]
    fn score_components_stay_bounded(hand in hand_strategy(), phase in phase_strategy()) {
        let request = AnalysisRequest::new(hand, context(phase, 0)).unwrap();
        let result = analyzer().analyze(&request);
        for r in &result.top_patterns {
            prop_assert_eq!(r.total_score, r.current_tile_score + r.availability_score + r.priority_score);
            prop_assert!((0.0..=CURRENT_TILE_SCORE_MAX).contains(&r.current_tile_score));
            prop_assert!((0.0..=AVAILABILITY_SCORE_MAX).contains(&r.availability_score));
            prop_assert!((0.0..=PRIORITY_SCORE_MAX).contains(&r.priority_score));
        }
    }

    // 3. rankings are non-increasing by totalScore
    #[test]
    fn rankings_are_sorted(hand in hand_strategy()) {
        let request = AnalysisRequest::new(hand, GameContext::default()).unwrap();
        let result = analyzer().analyze(&request);
        for pair in result.top_patterns.windows(2) {
            prop_assert!(pair[0].total_score >= pair[1].total_score);
        }
    }

    // 4. cold and warm caches give structurally equal results
    #[test]
    fn cache_is_transparent(hand in hand_strategy(), phase in phase_strategy(), jokers in 0u8..3) {
        let a = analyzer();
        let request = AnalysisRequest::new(hand, context(phase, jokers)).unwrap();
        let cold = a.analyze(&request);
        let warm = a.analyze(&request);
        prop_assert_eq!(&cold, &warm);

        let fresh = analyzer().analyze(&request);
        prop_assert_eq!(&cold, &fresh);
    }

    // 5. Charleston always passes exactly three tiles when the hand allows it
    #[test]
    fn charleston_passes_three(hand in hand_strategy()) {
        let distinct: BTreeSet<Tile> = hand.iter().copied().filter(|t| !t.is_joker()).collect();
        let request = AnalysisRequest::new(hand, GameContext::charleston()).unwrap();
        let result = analyzer().analyze(&request);
        prop_assert_eq!(result.passes().count(), distinct.len().min(3));
    }

    // 6. jokers are never passed or discarded
    #[test]
    fn jokers_are_never_given_away(hand in hand_strategy(), phase in phase_strategy()) {
        let request = AnalysisRequest::new(hand, context(phase, 0)).unwrap();
        let result = analyzer().analyze(&request);
        for r in result.tile_recommendations.iter().filter(|r| r.tile.is_joker()) {
            prop_assert!(r.action != TileAction::Pass && r.action != TileAction::Discard);
        }
    }

    // 7. exactly one recommendation per distinct tile id
    #[test]
    fn one_recommendation_per_tile(hand in hand_strategy(), phase in phase_strategy()) {
        let distinct: BTreeSet<Tile> = hand.iter().copied().collect();
        let request = AnalysisRequest::new(hand, context(phase, 0)).unwrap();
        let result = analyzer().analyze(&request);
        let tiles: Vec<Tile> = result.tile_recommendations.iter().map(|r| r.tile).collect();
        prop_assert_eq!(tiles, distinct.into_iter().collect::<Vec<_>>());
        for r in &result.tile_recommendations {
            prop_assert!(r.confidence <= 100);
        }
    }

    // 8. joker allocation never exceeds availability or eligible positions
    #[test]
    fn joker_allocation_is_bounded(hand in hand_strategy(), jokers in 0u8..6) {
        let request = AnalysisRequest::new(hand, context(GamePhase::Gameplay, jokers)).unwrap();
        let result = analyzer().analyze(&request);
        for facts in &result.facts {
            let j = &facts.jokers;
            let allocated: u32 = j.allocations.iter().map(|a| a.jokers as u32).sum();
            prop_assert!(j.jokers_usable <= j.jokers_available);
            prop_assert_eq!(allocated, j.jokers_usable as u32);
            prop_assert_eq!(j.jokers_usable + j.jokers_to_complete, facts.best.tiles_needed);
            for a in &j.allocations {
                prop_assert!(a.jokers <= a.eligible_slots);
            }
        }
    }
}
