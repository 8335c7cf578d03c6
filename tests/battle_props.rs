use duelsync::{BattleResult, GameEngine, Snapshot, SquadEngine};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn same_seed_rolls_the_same_squad(seed in any::<u64>()) {
        let mut a = SquadEngine::ready_now();
        let mut b = SquadEngine::ready_now();
        a.init_with_seed(seed);
        b.init_with_seed(seed);
        prop_assert_eq!(a.squad(), b.squad());
        prop_assert_eq!(a.board_snapshot(), b.board_snapshot());
    }

    #[test]
    fn both_peers_reach_complementary_results(
        seed in any::<u64>(),
        round_seed in any::<u64>(),
        trained in 0usize..5,
    ) {
        let mut a = SquadEngine::ready_now();
        let mut b = SquadEngine::ready_now();
        a.init_with_seed(seed);
        b.init_with_seed(seed);
        // Diverge one board, as a shop phase would.
        b.train(trained);

        let a_board = a.board_snapshot();
        let b_board = b.board_snapshot();
        a.resolve_battle(b_board, round_seed);
        b.resolve_battle(a_board, round_seed);

        let expected = match a.results()[0] {
            BattleResult::Victory => BattleResult::Defeat,
            BattleResult::Defeat => BattleResult::Victory,
            BattleResult::Draw => BattleResult::Draw,
        };
        prop_assert_eq!(b.results()[0], expected);
    }

    #[test]
    fn resolution_is_deterministic(seed in any::<u64>(), round_seed in any::<u64>()) {
        let mut a = SquadEngine::ready_now();
        let mut b = SquadEngine::ready_now();
        a.init_with_seed(seed);
        b.init_with_seed(seed.wrapping_add(1));
        let opponent = b.board_snapshot();

        let mut a2 = SquadEngine::ready_now();
        a2.init_with_seed(seed);

        a.resolve_battle(opponent.clone(), round_seed);
        a2.resolve_battle(opponent, round_seed);
        prop_assert_eq!(a.results(), a2.results());
    }
}

#[test]
fn engine_starts_unready_and_unseeded() {
    let engine = SquadEngine::new();
    assert!(!engine.is_ready());
    assert_eq!(engine.current_round(), None);

    let mut engine = SquadEngine::new();
    engine.finish_loading();
    assert!(engine.is_ready());
    assert_eq!(engine.current_round(), None);
}

#[test]
fn init_seeds_the_first_round() {
    let mut engine = SquadEngine::ready_now();
    engine.init_with_seed(12345);
    assert_eq!(engine.current_round(), Some(1));
    assert_eq!(engine.squad().len(), 5);
}

#[test]
fn undecodable_opponent_snapshot_counts_as_an_empty_squad() {
    let mut engine = SquadEngine::ready_now();
    engine.init_with_seed(9);

    engine.resolve_battle(Snapshot(vec![1, 2, 3]), 109);
    // A populated squad routs an empty one, and the round still advances.
    assert_eq!(engine.results(), &[BattleResult::Victory]);
    assert_eq!(engine.current_round(), Some(2));
    assert_eq!(engine.seeds_used(), &[109]);
}
