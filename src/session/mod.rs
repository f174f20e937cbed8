//! Race sessions.
//!
//! A `RaceSession` is the explicit context every operation runs against:
//! race metadata, the score store and the current bet slip. Nothing is
//! process-wide; the registry hands out one lock per session.

pub mod registry;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::betting::ticket::PurchaseTicket;
use crate::betting::{BetPlan, BetPlanner, BetRequest};
use crate::ranking::{Direction, HighlightRule, RankKey, RankedRow, RankingService};
use crate::scoring::ScoreStore;
use crate::types::{BetType, Combination, Competitor, KeibaError, Mark, Overlay, RaceMeta};

pub use registry::{SessionRegistry, SharedSession};

/// Listing entry for a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub race: String,
    pub runners: usize,
    pub bet_type: Option<BetType>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct RaceSession {
    id: Uuid,
    meta: RaceMeta,
    store: ScoreStore,
    slip: Option<BetPlan>,
    created_at: DateTime<Utc>,
}

impl RaceSession {
    /// Open a session for a race with the given roster.
    pub fn new(meta: RaceMeta, roster: Vec<Competitor>) -> Result<Self, KeibaError> {
        meta.validate()?;
        let store = ScoreStore::from_roster(roster)?;
        let session = Self {
            id: Uuid::new_v4(),
            meta,
            store,
            slip: None,
            created_at: Utc::now(),
        };
        info!(
            session_id = %session.id,
            race = %session.meta,
            runners = session.store.len(),
            "Session opened"
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn meta(&self) -> &RaceMeta {
        &self.meta
    }

    pub fn store(&self) -> &ScoreStore {
        &self.store
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            race: self.meta.label(),
            runners: self.store.len(),
            bet_type: self.slip.as_ref().map(|p| p.request.bet_type),
            created_at: self.created_at,
        }
    }

    /// Ranking over the current store state.
    pub fn ranking(&self) -> RankingService {
        RankingService::new(&self.store)
    }

    pub fn runner_table(
        &self,
        sort: RankKey,
        direction: Option<Direction>,
        rule: &HighlightRule,
    ) -> Vec<RankedRow> {
        self.ranking().table(sort, direction, rule)
    }

    /// A single runner's table row, profile included.
    pub fn runner(&self, number: u32, rule: &HighlightRule) -> Result<RankedRow, KeibaError> {
        self.runner_table(RankKey::Number, None, rule)
            .into_iter()
            .find(|row| row.number == number)
            .ok_or(KeibaError::CompetitorNotFound(number))
    }

    /// Set a runner's overlay. A slip built on the fallback pool is rebuilt
    /// if the composite leaders change as a result. If the rebuild fails
    /// the overlay is not applied and the slip is left as it was.
    pub fn set_overlay(
        &mut self,
        number: u32,
        delta: i64,
        planner: &BetPlanner,
    ) -> Result<Overlay, KeibaError> {
        let mut next = self.store.clone();
        let previous = next.set_overlay(number, delta)?;
        self.commit(next, planner)?;
        Ok(previous)
    }

    /// Return every overlay to zero. Marks are kept.
    pub fn reset_overlays(&mut self, planner: &BetPlanner) -> Result<(), KeibaError> {
        let mut next = self.store.clone();
        next.reset_overlays();
        self.commit(next, planner)
    }

    pub fn set_mark(&mut self, number: u32, symbol: &str) -> Result<Mark, KeibaError> {
        self.store.set_mark(number, symbol)
    }

    /// Replace the bet slip. On error the previous slip is kept.
    pub fn configure_bet(
        &mut self,
        request: BetRequest,
        planner: &BetPlanner,
    ) -> Result<&BetPlan, KeibaError> {
        let plan = planner.plan(request, &self.ranking())?;
        Ok(self.slip.insert(plan))
    }

    pub fn plan(&self) -> Result<&BetPlan, KeibaError> {
        self.slip.as_ref().ok_or(KeibaError::NoActiveBet)
    }

    fn plan_mut(&mut self) -> Result<&mut BetPlan, KeibaError> {
        self.slip.as_mut().ok_or(KeibaError::NoActiveBet)
    }

    pub fn set_manual(&mut self, combination: &Combination, amount: i64) -> Result<u64, KeibaError> {
        self.plan_mut()?.allocation.set_manual(combination, amount)
    }

    pub fn assign_remainder(&mut self, combination: &Combination) -> Result<u64, KeibaError> {
        self.plan_mut()?.allocation.assign_remainder(combination)
    }

    pub fn simulate_purchase(&self) -> Result<PurchaseTicket, KeibaError> {
        let plan = self.plan()?;
        Ok(PurchaseTicket::simulate(&self.meta, plan))
    }

    /// Swap in a changed store, rebuilding a fallback slip against it first.
    /// Nothing is written unless the rebuild succeeds.
    fn commit(&mut self, next: ScoreStore, planner: &BetPlanner) -> Result<(), KeibaError> {
        let rebuilt = match &self.slip {
            Some(plan) => planner.refresh(plan, &RankingService::new(&next))?,
            None => None,
        };
        self.store = next;
        if let Some(plan) = rebuilt {
            info!(session_id = %self.id, "Bet slip rebuilt after score change");
            self.slip = Some(plan);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betting::combinations::PoolSource;
    use crate::config::BettingConfig;
    use crate::data::sample_roster;
    use crate::types::Racecourse;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn make_session() -> RaceSession {
        let meta = RaceMeta::new(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(), Racecourse::Kyoto, 11).unwrap();
        RaceSession::new(meta, sample_roster()).unwrap()
    }

    fn planner() -> BetPlanner {
        BetPlanner::new(&BettingConfig::default())
    }

    fn request(bet_type: BetType, selection: Vec<u32>) -> BetRequest {
        BetRequest {
            bet_type,
            selection,
            budget: 1000,
            auto_allocate: true,
        }
    }

    #[test]
    fn test_no_bet_before_configuration() {
        let session = make_session();
        assert_eq!(session.plan().unwrap_err(), KeibaError::NoActiveBet);
        assert!(session.simulate_purchase().is_err());
    }

    #[test]
    fn test_overlay_flows_to_table() {
        let mut session = make_session();
        session.set_overlay(3, 3, &planner()).unwrap();
        let rows = session.runner_table(RankKey::Composite, None, &HighlightRule::default());
        // #3 moves to 73, above #4 (72)
        assert_eq!(rows[2].number, 3);
        assert_eq!(rows[2].composite, dec!(73));
        assert!(rows[2].highlighted);
        assert!(!rows[3].highlighted);
    }

    #[test]
    fn test_runner_row_carries_profile() {
        let mut session = make_session();
        session.set_overlay(4, -1, &planner()).unwrap();
        let row = session.runner(4, &HighlightRule::default()).unwrap();
        assert_eq!(row.composite, dec!(71));
        assert_eq!(row.profile.sex_age.as_deref(), Some("C5"));
        assert_eq!(row.profile.jockey.as_deref(), Some("Fukunaga"));
        assert_eq!(
            session.runner(9, &HighlightRule::default()).unwrap_err(),
            KeibaError::CompetitorNotFound(9)
        );
    }

    #[test]
    fn test_reset_overlays_restores_fallback_pool() {
        let mut session = make_session();
        let p = BetPlanner::new(&BettingConfig {
            fallback_pool_size: 3,
            ..BettingConfig::default()
        });
        session.set_overlay(3, 3, &p).unwrap();
        session.configure_bet(request(BetType::Trio, vec![]), &p).unwrap();
        assert_eq!(session.plan().unwrap().pool.runners, vec![1, 2, 3]);

        session.reset_overlays(&p).unwrap();
        assert_eq!(session.store().composite(3).unwrap(), dec!(70));
        assert_eq!(session.plan().unwrap().pool.runners, vec![1, 2, 4]);
    }

    #[test]
    fn test_failed_configure_keeps_previous_slip() {
        let mut session = make_session();
        let p = planner();
        session.configure_bet(request(BetType::Trio, vec![]), &p).unwrap();

        let err = session
            .configure_bet(request(BetType::Quinella, vec![1, 99]), &p)
            .unwrap_err();
        assert_eq!(err, KeibaError::CompetitorNotFound(99));
        assert_eq!(session.plan().unwrap().request.bet_type, BetType::Trio);
    }

    #[test]
    fn test_manual_override_survives_when_leaders_hold() {
        let mut session = make_session();
        let p = BetPlanner::new(&BettingConfig {
            fallback_pool_size: 2,
            ..BettingConfig::default()
        });
        session.configure_bet(request(BetType::Exacta, vec![]), &p).unwrap();
        let combo = Combination::new(BetType::Exacta, vec![1, 2]).unwrap();
        session.set_manual(&combo, 700).unwrap();

        session.set_overlay(5, 1, &p).unwrap();
        assert_eq!(session.plan().unwrap().allocation.amount(&combo), Some(700));

        // #2 (78 - 3) and #4 (72 + 3) tie at 75; the lower number keeps
        // its place, so the pool does not move.
        session.set_overlay(2, -3, &p).unwrap();
        session.set_overlay(4, 3, &p).unwrap();
        let plan = session.plan().unwrap();
        assert_eq!(plan.pool.runners, vec![1, 2]);
        assert_eq!(plan.allocation.amount(&combo), Some(700));
    }

    #[test]
    fn test_fallback_slip_follows_new_leaders() {
        let mut session = make_session();
        let p = BetPlanner::new(&BettingConfig {
            fallback_pool_size: 3,
            ..BettingConfig::default()
        });
        session.configure_bet(request(BetType::Trio, vec![]), &p).unwrap();
        assert_eq!(session.plan().unwrap().pool.runners, vec![1, 2, 4]);

        session.set_overlay(3, 3, &p).unwrap(); // 73 passes #4 (72)
        let plan = session.plan().unwrap();
        assert_eq!(plan.pool.source, PoolSource::Fallback);
        assert_eq!(plan.pool.runners, vec![1, 2, 3]);
    }

    #[test]
    fn test_overlay_rejected_when_slip_cannot_follow() {
        let mut session = make_session();
        session.configure_bet(request(BetType::Trifecta, vec![]), &planner()).unwrap();
        assert_eq!(session.plan().unwrap().combination_count(), 120);

        let narrow = BetPlanner::new(&BettingConfig {
            fallback_pool_size: 2,
            ..BettingConfig::default()
        });
        let err = session.set_overlay(3, 3, &narrow).unwrap_err();
        assert_eq!(
            err,
            KeibaError::InsufficientPool {
                bet_type: BetType::Trifecta,
                required: 3,
                available: 2,
            }
        );
        assert_eq!(session.store().composite(3).unwrap(), dec!(70));
        assert_eq!(session.plan().unwrap().pool.runners, vec![1, 2, 4, 3, 6, 5]);

        session.set_overlay(3, 3, &planner()).unwrap();
        assert!(session.reset_overlays(&narrow).is_err());
        assert_eq!(session.store().composite(3).unwrap(), dec!(73));
    }

    #[test]
    fn test_explicit_slip_untouched_by_overlay() {
        let mut session = make_session();
        let p = planner();
        session.configure_bet(request(BetType::Quinella, vec![5, 6]), &p).unwrap();
        let combo = Combination::new(BetType::Quinella, vec![5, 6]).unwrap();
        session.set_manual(&combo, 300).unwrap();

        session.set_overlay(5, 3, &p).unwrap();
        assert_eq!(session.plan().unwrap().allocation.amount(&combo), Some(300));
    }

    #[test]
    fn test_assign_remainder_and_purchase() {
        let mut session = make_session();
        let p = planner();
        session.configure_bet(request(BetType::Win, vec![1, 2, 4]), &p).unwrap();
        let combo = Combination::new(BetType::Win, vec![1]).unwrap();
        assert_eq!(session.assign_remainder(&combo).unwrap(), 1);

        let ticket = session.simulate_purchase().unwrap();
        assert_eq!(ticket.total, 1000);
        assert!(ticket.warning.is_none());
    }

    #[test]
    fn test_summary() {
        let mut session = make_session();
        assert!(session.summary().bet_type.is_none());
        session.configure_bet(request(BetType::Wide, vec![]), &planner()).unwrap();
        let summary = session.summary();
        assert_eq!(summary.runners, 6);
        assert_eq!(summary.bet_type, Some(BetType::Wide));
        assert_eq!(summary.race, "20261018-Kyoto-11");
    }
}
