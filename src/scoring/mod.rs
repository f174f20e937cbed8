//! Score store: base scores, overlays and marks per runner.
//!
//! The composite score is never stored. It is derived from the base score
//! and the overlay every time it is read, so there is nothing to invalidate
//! when either input changes.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::types::{Competitor, KeibaError, Mark, Overlay};

// ---------------------------------------------------------------------------
// Scored competitor
// ---------------------------------------------------------------------------

/// A runner together with the user's overlay and mark.
///
/// Overlay and mark live in the same entry as the base score, so a reader
/// always sees a consistent base + overlay pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCompetitor {
    pub competitor: Competitor,
    pub overlay: Overlay,
    pub mark: Mark,
}

impl ScoredCompetitor {
    fn new(competitor: Competitor) -> Self {
        Self {
            competitor,
            overlay: Overlay::ZERO,
            mark: Mark::Unset,
        }
    }

    pub fn number(&self) -> u32 {
        self.competitor.number
    }

    /// Base score plus overlay.
    pub fn composite(&self) -> Decimal {
        self.competitor.base_score + self.overlay.as_decimal()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Per-race store of scoring inputs, keyed by competitor number.
#[derive(Debug, Clone, Default)]
pub struct ScoreStore {
    entries: BTreeMap<u32, ScoredCompetitor>,
}

impl ScoreStore {
    /// Build a store from a roster. Competitor numbers must be unique.
    pub fn from_roster(roster: Vec<Competitor>) -> Result<Self, KeibaError> {
        let mut entries = BTreeMap::new();
        for competitor in roster {
            let number = competitor.number;
            if entries
                .insert(number, ScoredCompetitor::new(competitor))
                .is_some()
            {
                return Err(KeibaError::InvalidValue {
                    field: "roster",
                    value: format!("duplicate competitor number {number}"),
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, number: u32) -> bool {
        self.entries.contains_key(&number)
    }

    pub fn get(&self, number: u32) -> Result<&ScoredCompetitor, KeibaError> {
        self.entries
            .get(&number)
            .ok_or(KeibaError::CompetitorNotFound(number))
    }

    /// Entries in competitor-number order.
    pub fn iter(&self) -> impl Iterator<Item = &ScoredCompetitor> {
        self.entries.values()
    }

    /// Owned copy of every entry, for read-only consumers.
    pub fn snapshot(&self) -> Vec<ScoredCompetitor> {
        self.entries.values().cloned().collect()
    }

    /// Replace a runner's overlay. Returns the previous value.
    ///
    /// An out-of-range delta leaves the store untouched.
    pub fn set_overlay(&mut self, number: u32, delta: i64) -> Result<Overlay, KeibaError> {
        let overlay = Overlay::new(delta)?;
        let entry = self
            .entries
            .get_mut(&number)
            .ok_or(KeibaError::CompetitorNotFound(number))?;
        let previous = std::mem::replace(&mut entry.overlay, overlay);
        debug!(
            number,
            previous = %previous,
            overlay = %overlay,
            composite = %entry.composite(),
            "Overlay updated"
        );
        Ok(previous)
    }

    /// Replace a runner's mark from its symbol. Returns the previous mark.
    pub fn set_mark(&mut self, number: u32, symbol: &str) -> Result<Mark, KeibaError> {
        let mark: Mark = symbol.parse()?;
        let entry = self
            .entries
            .get_mut(&number)
            .ok_or(KeibaError::CompetitorNotFound(number))?;
        let previous = std::mem::replace(&mut entry.mark, mark);
        debug!(number, previous = %previous, mark = %mark, "Mark updated");
        Ok(previous)
    }

    /// Base score plus overlay for one runner.
    pub fn composite(&self, number: u32) -> Result<Decimal, KeibaError> {
        self.get(number).map(ScoredCompetitor::composite)
    }

    /// Return every overlay to zero. Marks are kept.
    pub fn reset_overlays(&mut self) {
        for entry in self.entries.values_mut() {
            entry.overlay = Overlay::ZERO;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
