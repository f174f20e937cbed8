//! Simulated purchase tickets.
//!
//! A ticket is a dry-run record of what would be bought from the current
//! plan. Nothing is sent anywhere.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

use super::allocation::{BudgetMismatchWarning, Reconciliation};
use super::BetPlan;
use crate::types::{BetType, RaceMeta};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketLine {
    pub combination: String,
    pub amount: u64,
}

/// Receipt returned by a simulated purchase.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseTicket {
    pub ticket_id: Uuid,
    pub race: String,
    pub bet_type: BetType,
    /// Only lines with a non-zero stake.
    pub lines: Vec<TicketLine>,
    pub total: u64,
    pub budget: u64,
    pub reconciliation: Reconciliation,
    pub warning: Option<BudgetMismatchWarning>,
    pub simulated: bool,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for PurchaseTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[SIMULATED] {} {} | {} lines | total {} / budget {} [{}]",
            self.race,
            self.bet_type,
            self.lines.len(),
            self.total,
            self.budget,
            self.ticket_id,
        )
    }
}

impl PurchaseTicket {
    /// Record a dry-run purchase of every staked line in `plan`.
    pub fn simulate(race: &RaceMeta, plan: &BetPlan) -> Self {
        let lines: Vec<TicketLine> = plan
            .allocation
            .lines()
            .iter()
            .filter(|l| l.amount > 0)
            .map(|l| TicketLine {
                combination: l.combination.to_string(),
                amount: l.amount,
            })
            .collect();
        let reconciliation = plan.reconcile();

        let ticket = PurchaseTicket {
            ticket_id: Uuid::new_v4(),
            race: race.label(),
            bet_type: plan.request.bet_type,
            total: lines.iter().map(|l| l.amount).sum(),
            lines,
            budget: reconciliation.budget,
            reconciliation,
            warning: reconciliation.warning(),
            simulated: true,
            timestamp: Utc::now(),
        };

        info!(
            ticket_id = %ticket.ticket_id,
            race = %ticket.race,
            bet_type = %ticket.bet_type,
            lines = ticket.lines.len(),
            total = ticket.total,
            "[SIMULATED] Purchase recorded"
        );
        if let Some(w) = &ticket.warning {
            warn!(ticket_id = %ticket.ticket_id, warning = %w, "Ticket does not match budget");
        }
        ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betting::{BetPlanner, BetRequest};
    use crate::config::BettingConfig;
    use crate::data::sample_roster;
    use crate::ranking::RankingService;
    use crate::scoring::ScoreStore;
    use crate::types::{Combination, Racecourse};
    use chrono::NaiveDate;

    fn make_plan(auto: bool) -> BetPlan {
        let store = ScoreStore::from_roster(sample_roster()).unwrap();
        BetPlanner::new(&BettingConfig::default())
            .plan(
                BetRequest {
                    bet_type: BetType::Quinella,
                    selection: vec![1, 2, 4],
                    budget: 1000,
                    auto_allocate: auto,
                },
                &RankingService::new(&store),
            )
            .unwrap()
    }

    fn race() -> RaceMeta {
        RaceMeta::new(NaiveDate::from_ymd_opt(2026, 12, 27).unwrap(), Racecourse::Nakayama, 11).unwrap()
    }

    #[test]
    fn test_ticket_from_auto_plan() {
        let plan = make_plan(true);
        let ticket = PurchaseTicket::simulate(&race(), &plan);
        assert!(ticket.simulated);
        assert_eq!(ticket.lines.len(), 3);
        assert_eq!(ticket.total, 999);
        assert_eq!(ticket.race, "20261227-Nakayama-11");
        // 1000 / 3 leaves 1 unallocated
        assert_eq!(ticket.warning.unwrap().delta, -1);
        assert!(ticket.to_string().starts_with("[SIMULATED]"));
    }

    #[test]
    fn test_ticket_skips_zero_lines() {
        let mut plan = make_plan(false);
        let combo = Combination::new(BetType::Quinella, vec![2, 1]).unwrap();
        plan.allocation.set_manual(&combo, 1000).unwrap();

        let ticket = PurchaseTicket::simulate(&race(), &plan);
        assert_eq!(
            ticket.lines,
            vec![TicketLine {
                combination: "1-2".to_string(),
                amount: 1000
            }]
        );
        assert!(ticket.warning.is_none());
    }
}
