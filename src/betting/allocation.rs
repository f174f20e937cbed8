//! Allocation engine: budget split, manual overrides, reconciliation.
//!
//! Amounts are whole currency units. The engine never reconciles on the
//! user's behalf: the floor-division remainder is reported, not placed,
//! and a spent/budget mismatch is surfaced as a warning.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

use crate::types::{Combination, KeibaError};

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// One combination and the stake placed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationLine {
    pub combination: Combination,
    pub amount: u64,
    /// Set once the user has overridden the automatic amount.
    pub manual: bool,
}

/// Stakes for the full combination set of one bet slip.
#[derive(Debug, Clone, Serialize)]
pub struct Allocation {
    budget: u64,
    lines: Vec<AllocationLine>,
    /// Left over from the automatic split, not yet placed anywhere.
    remainder: u64,
    #[serde(skip)]
    index: HashMap<Combination, usize>,
}

impl Allocation {
    /// Ceiling on the budget and on the sum of all stakes. Keeping both
    /// inside `i64` makes `spent - budget` exact.
    pub const MAX_TOTAL: u64 = i64::MAX as u64;

    fn build(budget: u64, combinations: Vec<Combination>, amount: u64, remainder: u64) -> Self {
        let index = combinations
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        let lines = combinations
            .into_iter()
            .map(|combination| AllocationLine {
                combination,
                amount,
                manual: false,
            })
            .collect();
        Self {
            budget,
            lines,
            remainder,
            index,
        }
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn remainder(&self) -> u64 {
        self.remainder
    }

    pub fn lines(&self) -> &[AllocationLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Current stake on a combination, if it belongs to this allocation.
    pub fn amount(&self, combination: &Combination) -> Option<u64> {
        self.index.get(combination).map(|&i| self.lines[i].amount)
    }

    /// Override the stake on one combination. Returns the previous amount.
    ///
    /// A negative amount, an unknown combination or a total above
    /// `MAX_TOTAL` leaves every line as it was. The override is not clamped
    /// to the budget.
    pub fn set_manual(&mut self, combination: &Combination, amount: i64) -> Result<u64, KeibaError> {
        if amount < 0 {
            return Err(KeibaError::Range {
                field: "amount",
                value: amount,
                bound: ">= 0".to_string(),
            });
        }
        let i = self.position(combination)?;
        let others = self.total_spent() - self.lines[i].amount;
        self.check_total(others, amount as u64, amount)?;
        let line = &mut self.lines[i];
        let previous = std::mem::replace(&mut line.amount, amount as u64);
        line.manual = true;
        debug!(
            combination = %combination,
            previous,
            amount,
            "Manual stake set"
        );
        Ok(previous)
    }

    /// Move the whole remainder onto a caller-chosen combination. Returns
    /// the amount moved.
    pub fn assign_remainder(&mut self, combination: &Combination) -> Result<u64, KeibaError> {
        let i = self.position(combination)?;
        self.check_total(
            self.total_spent(),
            self.remainder,
            i64::try_from(self.remainder).unwrap_or(i64::MAX),
        )?;
        let moved = std::mem::take(&mut self.remainder);
        self.lines[i].amount += moved;
        if moved > 0 {
            self.lines[i].manual = true;
        }
        debug!(combination = %combination, moved, "Remainder assigned");
        Ok(moved)
    }

    /// Sum of every line's stake.
    ///
    /// Writes through `set_manual` and `assign_remainder` keep this at or
    /// below `MAX_TOTAL`; the fold saturates rather than wrap.
    pub fn total_spent(&self) -> u64 {
        self.lines
            .iter()
            .try_fold(0u64, |acc, l| acc.checked_add(l.amount))
            .unwrap_or(u64::MAX)
    }

    /// Reject a write that would push the total past `MAX_TOTAL`.
    fn check_total(&self, base: u64, added: u64, value: i64) -> Result<(), KeibaError> {
        match base.checked_add(added) {
            Some(total) if total <= Self::MAX_TOTAL => Ok(()),
            _ => Err(KeibaError::Range {
                field: "amount",
                value,
                bound: format!("total stake <= {}", Self::MAX_TOTAL),
            }),
        }
    }

    pub fn reconcile(&self) -> Reconciliation {
        AllocationEngine::reconcile(self.total_spent(), self.budget)
    }

    fn position(&self, combination: &Combination) -> Result<usize, KeibaError> {
        self.index
            .get(combination)
            .copied()
            .ok_or_else(|| KeibaError::CombinationNotFound(combination.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Under,
    Balanced,
    Over,
}

/// Spent versus budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub spent: u64,
    pub budget: u64,
    pub status: BudgetStatus,
    /// `spent - budget`; negative when under budget.
    pub delta: i64,
}

impl Reconciliation {
    /// The non-fatal mismatch warning, if spent differs from budget.
    pub fn warning(&self) -> Option<BudgetMismatchWarning> {
        (self.status != BudgetStatus::Balanced).then_some(BudgetMismatchWarning {
            spent: self.spent,
            budget: self.budget,
            delta: self.delta,
        })
    }
}

/// Total allocated differs from the declared budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetMismatchWarning {
    pub spent: u64,
    pub budget: u64,
    pub delta: i64,
}

impl fmt::Display for BudgetMismatchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.delta < 0 {
            write!(
                f,
                "Allocated {} of budget {} ({} unallocated)",
                self.spent,
                self.budget,
                -self.delta
            )
        } else {
            write!(
                f,
                "Allocated {} against budget {} ({} over)",
                self.spent, self.budget, self.delta
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct AllocationEngine;

impl AllocationEngine {
    /// Split `budget` evenly with floor division. Every combination gets
    /// the same amount; `budget % n` is kept as the remainder.
    pub fn auto_allocate(budget: u64, combinations: Vec<Combination>) -> Allocation {
        let n = combinations.len() as u64;
        let (per_line, remainder) = if n == 0 {
            (0, budget)
        } else {
            (budget / n, budget % n)
        };
        info!(
            budget,
            combinations = n,
            per_line,
            remainder,
            "Budget split"
        );
        Allocation::build(budget, combinations, per_line, remainder)
    }

    /// Every combination at zero, for fully manual entry.
    pub fn zeroed(budget: u64, combinations: Vec<Combination>) -> Allocation {
        Allocation::build(budget, combinations, 0, 0)
    }

    /// Compare spent against budget. Reports only; never adjusts.
    ///
    /// `delta` is exact while both sides are within `Allocation::MAX_TOTAL`
    /// and saturates beyond it.
    pub fn reconcile(spent: u64, budget: u64) -> Reconciliation {
        let status = match spent.cmp(&budget) {
            std::cmp::Ordering::Less => BudgetStatus::Under,
            std::cmp::Ordering::Equal => BudgetStatus::Balanced,
            std::cmp::Ordering::Greater => BudgetStatus::Over,
        };
        Reconciliation {
            spent,
            budget,
            status,
            delta: i64::try_from(i128::from(spent) - i128::from(budget)).unwrap_or(if spent > budget {
                i64::MAX
            } else {
                i64::MIN
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
