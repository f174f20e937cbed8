//! Ranking service: ordered views, competition ranks and top-K sets.
//!
//! Works on an owned snapshot of the score store, so a ranking never
//! observes a half-applied mutation. Rebuild it after every change.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::scoring::{ScoreStore, ScoredCompetitor};
use crate::types::{CompetitorProfile, Mark, Overlay};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// What to rank runners by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankKey {
    /// Composite score, higher is better.
    Composite,
    /// Win odds, shorter is better.
    Odds,
    /// Declared popularity, 1 is best.
    Popularity,
    /// Competitor number.
    #[default]
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

impl Direction {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

impl RankKey {
    /// The direction in which "better" comes first for this key.
    pub fn natural_direction(&self) -> Direction {
        match self {
            RankKey::Composite => Direction::Descending,
            RankKey::Odds | RankKey::Popularity | RankKey::Number => Direction::Ascending,
        }
    }

    /// Ascending comparison of the raw key values.
    fn compare(&self, a: &ScoredCompetitor, b: &ScoredCompetitor) -> Ordering {
        match self {
            RankKey::Composite => a.composite().cmp(&b.composite()),
            RankKey::Odds => a.competitor.odds.cmp(&b.competitor.odds),
            RankKey::Popularity => a.competitor.popularity.cmp(&b.competitor.popularity),
            RankKey::Number => a.number().cmp(&b.number()),
        }
    }
}

impl std::str::FromStr for RankKey {
    type Err = crate::types::KeibaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "composite" | "score" => Ok(RankKey::Composite),
            "odds" => Ok(RankKey::Odds),
            "popularity" | "pop" => Ok(RankKey::Popularity),
            "number" | "no" => Ok(RankKey::Number),
            _ => Err(crate::types::KeibaError::InvalidValue {
                field: "sort",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Annotated table
// ---------------------------------------------------------------------------

/// Which composite ranks get flagged in the outbound table.
/// `None` switches a flag off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightRule {
    pub highlight_top: Option<usize>,
    pub emphasize_top: Option<usize>,
}

impl Default for HighlightRule {
    fn default() -> Self {
        Self {
            highlight_top: Some(3),
            emphasize_top: Some(6),
        }
    }
}

/// One row of the runner table handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    pub number: u32,
    pub name: String,
    pub mark: Mark,
    pub composite: Decimal,
    pub base_score: Decimal,
    pub overlay: Overlay,
    /// Competition rank by composite score
    pub score_rank: usize,
    pub odds: Decimal,
    pub popularity: u32,
    /// Inside the highlight band (top 3 by default)
    pub highlighted: bool,
    /// Inside the emphasis band (top 6 by default)
    pub emphasized: bool,
    pub profile: CompetitorProfile,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct RankingService {
    entries: Vec<ScoredCompetitor>,
}

impl RankingService {
    /// Snapshot the current store state.
    pub fn new(store: &ScoreStore) -> Self {
        Self {
            entries: store.snapshot(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, number: u32) -> bool {
        self.entries.iter().any(|e| e.number() == number)
    }

    /// Runners ordered by `key` in `direction`. Ties fall back to ascending
    /// competitor number regardless of direction.
    pub fn rank_by(&self, key: RankKey, direction: Direction) -> Vec<&ScoredCompetitor> {
        let mut ordered: Vec<&ScoredCompetitor> = self.entries.iter().collect();
        ordered.sort_by(|a, b| {
            direction
                .apply(key.compare(a, b))
                .then_with(|| a.number().cmp(&b.number()))
        });
        ordered
    }

    /// Competition ranking ("1224"): tied runners share a rank and the next
    /// distinct value is ranked one past the number of strictly better
    /// runners.
    pub fn dense_rank(&self, key: RankKey) -> BTreeMap<u32, usize> {
        let ordered = self.rank_by(key, key.natural_direction());
        let mut ranks = BTreeMap::new();
        let mut current = 0;
        for (position, entry) in ordered.iter().enumerate() {
            let tied = position > 0 && key.compare(ordered[position - 1], entry) == Ordering::Equal;
            if !tied {
                current = position + 1;
            }
            ranks.insert(entry.number(), current);
        }
        ranks
    }

    /// Runners whose competition rank is at most `k`. May hold more than `k`
    /// runners when the boundary is tied.
    pub fn top_k(&self, key: RankKey, k: usize) -> BTreeSet<u32> {
        self.dense_rank(key)
            .into_iter()
            .filter(|(_, rank)| *rank <= k)
            .map(|(number, _)| number)
            .collect()
    }

    /// The first `n` runners by composite score, best first.
    pub fn leaders(&self, n: usize) -> Vec<u32> {
        self.rank_by(RankKey::Composite, Direction::Descending)
            .into_iter()
            .take(n)
            .map(ScoredCompetitor::number)
            .collect()
    }

    /// Build the annotated runner table, sorted by `sort` in its natural
    /// direction unless `direction` overrides it.
    pub fn table(
        &self,
        sort: RankKey,
        direction: Option<Direction>,
        rule: &HighlightRule,
    ) -> Vec<RankedRow> {
        let ranks = self.dense_rank(RankKey::Composite);
        let in_band = |limit: Option<usize>, rank: usize| limit.is_some_and(|k| rank <= k);

        self.rank_by(sort, direction.unwrap_or_else(|| sort.natural_direction()))
            .into_iter()
            .map(|entry| {
                let score_rank = ranks.get(&entry.number()).copied().unwrap_or(0);
                RankedRow {
                    number: entry.number(),
                    name: entry.competitor.name.clone(),
                    mark: entry.mark,
                    composite: entry.composite(),
                    base_score: entry.competitor.base_score,
                    overlay: entry.overlay,
                    score_rank,
                    odds: entry.competitor.odds,
                    popularity: entry.competitor.popularity,
                    highlighted: in_band(rule.highlight_top, score_rank),
                    emphasized: in_band(rule.emphasize_top, score_rank),
                    profile: entry.competitor.profile.clone(),
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
