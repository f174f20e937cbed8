//! Session flows driven through the registry, as the HTTP layer drives
//! them: open from a roster source, adjust scores, configure a slip,
//! override stakes and simulate the purchase.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use keiba::betting::allocation::{AllocationEngine, BudgetStatus};
use keiba::betting::combinations::{combination_count, CombinationGenerator, PoolSource};
use keiba::betting::BetRequest;
use keiba::config::{AppConfig, BettingConfig};
use keiba::data::{JsonFileRoster, RosterSource};
use keiba::ranking::{RankKey, RankingService};
use keiba::scoring::ScoreStore;
use keiba::session::SessionRegistry;
use keiba::types::{BetType, Combination, KeibaError, RaceMeta, Racecourse};

use crate::mock_roster::MockRoster;

fn race(number: u8) -> RaceMeta {
    RaceMeta::new(NaiveDate::from_ymd_opt(2026, 11, 29).unwrap(), Racecourse::Tokyo, number).unwrap()
}

/// Bases [85, 78, 70, 72, 65, 68].
fn six_runner_card() -> MockRoster {
    MockRoster::from_scores(&[
        (85, dec!(2.8)),
        (78, dec!(4.5)),
        (70, dec!(9.0)),
        (72, dec!(6.1)),
        (65, dec!(31.0)),
        (68, dec!(18.4)),
    ])
}

fn bet(bet_type: BetType, selection: Vec<u32>, budget: u64) -> BetRequest {
    BetRequest {
        bet_type,
        selection,
        budget,
        auto_allocate: true,
    }
}

async fn open(registry: &SessionRegistry, source: &dyn RosterSource, number: u8) -> uuid::Uuid {
    let meta = race(number);
    let roster = source.fetch_roster(&meta).await.unwrap();
    registry.open(meta, roster).await.unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_six_runner_trio_scenario() {
    let registry = SessionRegistry::new(&AppConfig::default());
    let source = six_runner_card();
    let id = open(&registry, &source, 11).await;
    assert_eq!(source.fetches(), vec!["20261129-Tokyo-11".to_string()]);

    let session = registry.get(id).await.unwrap();
    let mut session = session.lock().await;

    // No overlays yet: composite == base
    for entry in session.store().iter() {
        assert_eq!(entry.composite(), entry.competitor.base_score);
    }

    let ranking = session.ranking();
    let top: Vec<u32> = ranking.top_k(RankKey::Composite, 3).into_iter().collect();
    assert_eq!(top, vec![1, 2, 4]);

    let plan = session
        .configure_bet(bet(BetType::Trio, vec![1, 2, 3, 4, 5, 6], 1000), registry.planner())
        .unwrap();
    assert_eq!(plan.combination_count(), 20);
    assert!(plan.allocation.lines().iter().all(|l| l.amount == 50));
    assert_eq!(plan.allocation.remainder(), 0);
    assert_eq!(plan.reconcile().status, BudgetStatus::Balanced);
}

#[tokio::test]
async fn test_exacta_single_selection_falls_back() {
    let registry = SessionRegistry::new(&AppConfig::default());
    let id = open(&registry, &six_runner_card(), 9).await;
    let session = registry.get(id).await.unwrap();
    let mut session = session.lock().await;

    let plan = session
        .configure_bet(bet(BetType::Exacta, vec![5], 3000), registry.planner())
        .unwrap();
    assert_eq!(plan.pool.source, PoolSource::Fallback);
    assert_eq!(plan.pool.runners, vec![1, 2, 4, 3, 6, 5]);
    assert_eq!(plan.combination_count(), 30);

    // Order matters: both 1>2 and 2>1 are staked
    for runners in [vec![1, 2], vec![2, 1]] {
        let c = Combination::new(BetType::Exacta, runners).unwrap();
        assert_eq!(plan.allocation.amount(&c), Some(100));
    }
}

#[tokio::test]
async fn test_overlay_out_of_range_leaves_store_unchanged() {
    let registry = SessionRegistry::new(&AppConfig::default());
    let id = open(&registry, &six_runner_card(), 1).await;
    let session = registry.get(id).await.unwrap();
    let mut session = session.lock().await;

    session.set_overlay(2, 2, registry.planner()).unwrap();
    let before = session.store().snapshot();

    let err = session.set_overlay(2, 4, registry.planner()).unwrap_err();
    assert!(matches!(err, KeibaError::Range { field: "overlay", value: 4, .. }));
    assert_eq!(session.store().snapshot(), before);
    assert_eq!(session.store().composite(2).unwrap(), dec!(80));
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_composite_tracks_every_overlay_write() {
    let registry = SessionRegistry::new(&AppConfig::default());
    let id = open(&registry, &six_runner_card(), 2).await;
    let session = registry.get(id).await.unwrap();
    let mut session = session.lock().await;

    for delta in [-3i64, -1, 0, 2, 3] {
        for number in 1..=6 {
            session.set_overlay(number, delta, registry.planner()).unwrap();
            let entry = session.store().get(number).unwrap();
            assert_eq!(
                session.store().composite(number).unwrap(),
                entry.competitor.base_score + Decimal::from(delta)
            );
        }
    }

    // Back to zero restores the base score
    for number in 1..=6 {
        session.set_overlay(number, 0, registry.planner()).unwrap();
        let entry = session.store().get(number).unwrap();
        assert_eq!(entry.composite(), entry.competitor.base_score);
    }
}

#[test]
fn test_top_k_matches_rank_with_ties() {
    // 80, 80, 80, 75, 70: ranks 1, 1, 1, 4, 5
    let source = MockRoster::from_scores(&[
        (80, dec!(3.0)),
        (80, dec!(3.5)),
        (80, dec!(4.0)),
        (75, dec!(8.0)),
        (70, dec!(12.0)),
    ]);
    let roster = tokio_test::block_on(source.fetch_roster(&race(5))).unwrap();
    let store = ScoreStore::from_roster(roster).unwrap();
    let ranking = RankingService::new(&store);

    let ranks = ranking.dense_rank(RankKey::Composite);
    assert_eq!(ranks.values().copied().collect::<Vec<_>>(), vec![1, 1, 1, 4, 5]);
    assert_eq!(ranks, ranking.dense_rank(RankKey::Composite));

    for k in 0..=store.len() {
        let expected: Vec<u32> = ranks.iter().filter(|&(_, &r)| r <= k).map(|(&n, _)| n).collect();
        let top: Vec<u32> = ranking.top_k(RankKey::Composite, k).into_iter().collect();
        assert_eq!(top, expected, "k = {k}");
    }
    // k = 2 still pulls in the whole three-way tie
    assert_eq!(ranking.top_k(RankKey::Composite, 2).len(), 3);
}

#[test]
fn test_counts_and_split_over_pool_sizes() {
    let generator = CombinationGenerator::new(6);
    for n in 0..=7usize {
        let pool: Vec<u32> = (1..=n as u32).collect();
        let n = n as u64;
        let expected = [
            (BetType::Quinella, n * n.saturating_sub(1) / 2),
            (BetType::Wide, n * n.saturating_sub(1) / 2),
            (BetType::Exacta, n * n.saturating_sub(1)),
            (BetType::Trio, n * n.saturating_sub(1) * n.saturating_sub(2) / 6),
            (BetType::Trifecta, n * n.saturating_sub(1) * n.saturating_sub(2)),
        ];
        for (bet_type, count) in expected {
            let combos: Vec<_> = generator.generate(bet_type, &pool).collect();
            assert_eq!(combos.len() as u64, count, "{bet_type} over {n}");
            assert_eq!(combination_count(bet_type, n as usize), count);

            if !combos.is_empty() {
                let len = combos.len() as u64;
                let alloc = AllocationEngine::auto_allocate(1234, combos);
                assert!(alloc.lines().iter().all(|l| l.amount == 1234 / len));
                assert_eq!(alloc.total_spent() + alloc.remainder(), 1234);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Slip lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_manual_overrides_and_purchase() {
    let registry = SessionRegistry::new(&AppConfig::default());
    let id = open(&registry, &six_runner_card(), 11).await;
    let session = registry.get(id).await.unwrap();
    let mut session = session.lock().await;

    session
        .configure_bet(bet(BetType::Wide, vec![1, 2, 4], 1000), registry.planner())
        .unwrap();
    let view = session.plan().unwrap().view(50);
    assert_eq!(view.total_spent, 999);
    assert_eq!(view.remainder, 1);
    assert_eq!(view.warning.unwrap().delta, -1);

    let c14 = Combination::new(BetType::Wide, vec![4, 1]).unwrap();
    session.assign_remainder(&c14).unwrap();
    assert_eq!(session.plan().unwrap().reconcile().status, BudgetStatus::Balanced);

    // Over budget is reported, not corrected
    session.set_manual(&c14, 800).unwrap();
    let rec = session.plan().unwrap().reconcile();
    assert_eq!(rec.status, BudgetStatus::Over);
    assert_eq!(rec.delta, 800 + 333 + 333 - 1000);

    let err = session.set_manual(&c14, -5).unwrap_err();
    assert!(matches!(err, KeibaError::Range { field: "amount", .. }));

    let stranger = Combination::new(BetType::Wide, vec![3, 5]).unwrap();
    assert!(matches!(
        session.set_manual(&stranger, 100),
        Err(KeibaError::CombinationNotFound(_))
    ));

    let ticket = session.simulate_purchase().unwrap();
    assert!(ticket.simulated);
    assert_eq!(ticket.total, 1466);
    assert_eq!(ticket.race, "20261129-Tokyo-11");
    assert!(ticket.warning.is_some());
}

#[tokio::test]
async fn test_small_field_cannot_form_trifecta() {
    let registry = SessionRegistry::new(&AppConfig::default());
    let source = MockRoster::from_scores(&[(80, dec!(1.8)), (70, dec!(3.2))]);
    let id = open(&registry, &source, 3).await;
    let session = registry.get(id).await.unwrap();
    let mut session = session.lock().await;

    let err = session
        .configure_bet(bet(BetType::Trifecta, vec![], 1000), registry.planner())
        .unwrap_err();
    assert_eq!(
        err,
        KeibaError::InsufficientPool {
            bet_type: BetType::Trifecta,
            required: 3,
            available: 2,
        }
    );
    assert_eq!(session.plan().unwrap_err(), KeibaError::NoActiveBet);
}

#[tokio::test]
async fn test_fallback_size_from_config() {
    let cfg = AppConfig {
        betting: BettingConfig {
            fallback_pool_size: 4,
            ..BettingConfig::default()
        },
        ..AppConfig::default()
    };
    let registry = SessionRegistry::new(&cfg);
    let id = open(&registry, &six_runner_card(), 12).await;
    let session = registry.get(id).await.unwrap();
    let mut session = session.lock().await;

    let plan = session
        .configure_bet(bet(BetType::Trifecta, vec![], 2400), registry.planner())
        .unwrap();
    assert_eq!(plan.pool.runners, vec![1, 2, 4, 3]);
    assert_eq!(plan.combination_count(), 24);
    assert!(plan.allocation.lines().iter().all(|l| l.amount == 100));
}

// ---------------------------------------------------------------------------
// Sources & concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_source_error_propagates() {
    let source = six_runner_card();
    source.set_error("feed offline");
    let err = source.fetch_roster(&race(11)).await.unwrap_err();
    assert!(err.to_string().contains("feed offline"));
    assert!(source.fetches().is_empty());
}

#[tokio::test]
async fn test_session_from_json_file() {
    let dir = std::env::temp_dir().join(format!("keiba-it-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let meta = race(10);
    let json = r#"[
        {"number": 1, "name": "Do Deuce", "odds": 2.4, "popularity": 1, "base_score": 81.5},
        {"number": 2, "name": "Equinox", "odds": 3.1, "popularity": 2, "base_score": 83.0},
        {"number": 3, "name": "Liberty Island", "odds": 5.6, "popularity": 3, "base_score": 79.0}
    ]"#;
    std::fs::write(dir.join(format!("{}.json", meta.label())), json).unwrap();

    let source = JsonFileRoster::new(&dir);
    let roster = source.fetch_roster(&meta).await.unwrap();
    let registry = SessionRegistry::new(&AppConfig::default());
    let id = registry.open(meta, roster).await.unwrap();

    let session = registry.get(id).await.unwrap();
    let mut session = session.lock().await;
    assert_eq!(session.ranking().leaders(1), vec![2]);

    let plan = session
        .configure_bet(bet(BetType::Trio, vec![], 300), registry.planner())
        .unwrap();
    assert_eq!(plan.combination_count(), 1);
    assert_eq!(plan.allocation.total_spent(), 300);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let registry = Arc::new(SessionRegistry::new(&AppConfig::default()));
    let source = six_runner_card();
    let a = open(&registry, &source, 10).await;
    let b = open(&registry, &source, 11).await;

    let mut handles = Vec::new();
    for (id, delta) in [(a, 3i64), (b, -3)] {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let session = registry.get(id).await.unwrap();
            let mut session = session.lock().await;
            session.set_overlay(1, delta, registry.planner()).unwrap();
            session.set_mark(1, "◎").unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let composite = |id| {
        let registry = registry.clone();
        async move {
            let session = registry.get(id).await.unwrap();
            let session = session.lock().await;
            session.store().composite(1).unwrap()
        }
    };
    assert_eq!(composite(a).await, dec!(88));
    assert_eq!(composite(b).await, dec!(82));
    assert_eq!(registry.list().await.len(), 2);
}
