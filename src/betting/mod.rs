//! Betting engine: pool selection, combination generation and stake
//! allocation.

pub mod allocation;
pub mod combinations;
pub mod ticket;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::BettingConfig;
use crate::ranking::RankingService;
use crate::types::{BetType, KeibaError};
use allocation::{Allocation, AllocationEngine, AllocationLine, BudgetMismatchWarning, Reconciliation};
use combinations::{combination_count, CombinationGenerator, CombinationPool, PoolSource};

// ---------------------------------------------------------------------------
// Request & plan
// ---------------------------------------------------------------------------

/// What the user asked for on the bet slip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetRequest {
    pub bet_type: BetType,
    /// Explicitly selected runners, in selection order.
    #[serde(default)]
    pub selection: Vec<u32>,
    pub budget: u64,
    /// Split the budget evenly; otherwise every line starts at zero.
    #[serde(default = "default_auto_allocate")]
    pub auto_allocate: bool,
}

fn default_auto_allocate() -> bool {
    true
}

/// A generated bet slip: the pool, the full combination set and its stakes.
#[derive(Debug, Clone)]
pub struct BetPlan {
    pub request: BetRequest,
    pub pool: CombinationPool,
    pub allocation: Allocation,
}

/// Display-ready summary of a plan. `lines` is truncated to the display cap;
/// the totals cover every combination.
#[derive(Debug, Clone, Serialize)]
pub struct PlanView {
    pub bet_type: BetType,
    pub pool: Vec<u32>,
    pub pool_source: PoolSource,
    pub combination_count: usize,
    pub lines: Vec<AllocationLine>,
    pub truncated: bool,
    pub budget: u64,
    pub total_spent: u64,
    pub remainder: u64,
    pub reconciliation: Reconciliation,
    pub warning: Option<BudgetMismatchWarning>,
}

impl BetPlan {
    pub fn combination_count(&self) -> usize {
        self.allocation.len()
    }

    pub fn reconcile(&self) -> Reconciliation {
        self.allocation.reconcile()
    }

    /// Summary with at most `cap` lines.
    pub fn view(&self, cap: usize) -> PlanView {
        let reconciliation = self.reconcile();
        let lines: Vec<AllocationLine> = self.allocation.lines().iter().take(cap).cloned().collect();
        PlanView {
            bet_type: self.request.bet_type,
            pool: self.pool.runners.clone(),
            pool_source: self.pool.source,
            combination_count: self.combination_count(),
            truncated: lines.len() < self.combination_count(),
            lines,
            budget: self.allocation.budget(),
            total_spent: self.allocation.total_spent(),
            remainder: self.allocation.remainder(),
            reconciliation,
            warning: reconciliation.warning(),
        }
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Pipelines pool selection → generation → allocation.
pub struct BetPlanner {
    generator: CombinationGenerator,
    min_budget: u64,
}

impl BetPlanner {
    pub fn new(cfg: &BettingConfig) -> Self {
        Self {
            generator: CombinationGenerator::new(cfg.fallback_pool_size),
            min_budget: cfg.min_budget,
        }
    }

    /// Build a plan from a request against the current ranking.
    ///
    /// Fails without side effects on a budget outside
    /// `min_budget..=Allocation::MAX_TOTAL`, an unknown runner in the
    /// selection, or a pool too small for the bet type.
    pub fn plan(&self, request: BetRequest, ranking: &RankingService) -> Result<BetPlan, KeibaError> {
        if !(self.min_budget..=Allocation::MAX_TOTAL).contains(&request.budget) {
            return Err(KeibaError::Range {
                field: "budget",
                value: i64::try_from(request.budget).unwrap_or(i64::MAX),
                bound: format!("{}..={}", self.min_budget, Allocation::MAX_TOTAL),
            });
        }

        let pool = self
            .generator
            .pool(request.bet_type, &request.selection, ranking)?;
        Ok(self.allocate(request, pool))
    }

    /// Rebuild a fallback-pool plan whose composite leaders have moved.
    ///
    /// Returns `None` when the plan is unaffected: explicit pools never
    /// change, and an unchanged fallback keeps its manual overrides.
    pub fn refresh(&self, plan: &BetPlan, ranking: &RankingService) -> Result<Option<BetPlan>, KeibaError> {
        if plan.pool.source != PoolSource::Fallback {
            return Ok(None);
        }
        let pool = self
            .generator
            .pool(plan.request.bet_type, &plan.request.selection, ranking)?;
        if pool == plan.pool {
            return Ok(None);
        }
        info!(
            bet_type = %plan.request.bet_type,
            old = ?plan.pool.runners,
            new = ?pool.runners,
            "Fallback pool changed, rebuilding allocation"
        );
        Ok(Some(self.allocate(plan.request.clone(), pool)))
    }

    fn allocate(&self, request: BetRequest, pool: CombinationPool) -> BetPlan {
        let combinations: Vec<_> = self
            .generator
            .generate(request.bet_type, &pool.runners)
            .collect();
        debug_assert_eq!(
            combinations.len() as u64,
            combination_count(request.bet_type, pool.len())
        );

        let allocation = if request.auto_allocate {
            AllocationEngine::auto_allocate(request.budget, combinations)
        } else {
            AllocationEngine::zeroed(request.budget, combinations)
        };

        info!(
            bet_type = %request.bet_type,
            pool = ?pool.runners,
            source = ?pool.source,
            combinations = allocation.len(),
            budget = request.budget,
            auto = request.auto_allocate,
            "Bet plan built"
        );
        if allocation.remainder() > 0 {
            warn!(
                remainder = allocation.remainder(),
                "Budget does not divide evenly; remainder left unallocated"
            );
        }

        BetPlan {
            request,
            pool,
            allocation,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
