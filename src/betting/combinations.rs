//! Combination generation.
//!
//! One generic routine drives every bet type from its `BetShape`: arity-k
//! subsets for unordered types, arity-k arrangements for ordered ones.
//! Output is lexicographic over pool indices and produced lazily, so a
//! caller that only displays the first few lines never materialises the
//! rest.

use serde::Serialize;
use tracing::debug;

use crate::ranking::RankingService;
use crate::types::{BetType, Combination, KeibaError};

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Where a pool's runners came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolSource {
    /// The user's selection.
    Explicit,
    /// Top of the composite ranking.
    Fallback,
}

/// Ordered runner numbers combinations are drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinationPool {
    pub runners: Vec<u32>,
    pub source: PoolSource,
}

impl CombinationPool {
    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

pub struct CombinationGenerator {
    fallback_size: usize,
}

impl CombinationGenerator {
    pub fn new(fallback_size: usize) -> Self {
        Self { fallback_size }
    }

    /// Choose the pool for a bet type.
    ///
    /// The explicit selection is used when it holds at least `arity`
    /// distinct runners; otherwise the top `fallback_size` runners by
    /// composite score are used. Repeated numbers in the selection are
    /// dropped, keeping the first occurrence.
    pub fn pool(
        &self,
        bet_type: BetType,
        explicit: &[u32],
        fallback: &RankingService,
    ) -> Result<CombinationPool, KeibaError> {
        let arity = bet_type.arity();

        let mut selection: Vec<u32> = Vec::with_capacity(explicit.len());
        for &number in explicit {
            if !fallback.contains(number) {
                return Err(KeibaError::CompetitorNotFound(number));
            }
            if !selection.contains(&number) {
                selection.push(number);
            }
        }

        if selection.len() >= arity {
            return Ok(CombinationPool {
                runners: selection,
                source: PoolSource::Explicit,
            });
        }

        let leaders = fallback.leaders(self.fallback_size);
        if leaders.len() < arity {
            return Err(KeibaError::InsufficientPool {
                bet_type,
                required: arity,
                available: leaders.len(),
            });
        }

        debug!(
            bet_type = %bet_type,
            selected = selection.len(),
            arity,
            pool = ?leaders,
            "Selection too small, using composite leaders"
        );

        Ok(CombinationPool {
            runners: leaders,
            source: PoolSource::Fallback,
        })
    }

    /// Lazily enumerate every combination of `bet_type` over `pool`.
    pub fn generate<'a>(&self, bet_type: BetType, pool: &'a [u32]) -> Combinations<'a> {
        Combinations::new(bet_type, pool)
    }
}

/// Closed-form size of the combination set for a pool of `n` runners.
pub fn combination_count(bet_type: BetType, n: usize) -> u64 {
    let shape = bet_type.shape();
    let k = shape.arity;
    if k > n {
        return 0;
    }
    let arrangements: u64 = (0..k).map(|i| (n - i) as u64).product();
    if shape.ordered {
        arrangements
    } else {
        arrangements / (1..=k as u64).product::<u64>()
    }
}

// ---------------------------------------------------------------------------
// Iterator
// ---------------------------------------------------------------------------

/// Lazy combination sequence. Holds only the current index tuple.
#[derive(Debug, Clone)]
pub struct Combinations<'a> {
    bet_type: BetType,
    pool: &'a [u32],
    cursor: Option<Vec<usize>>,
}

impl<'a> Combinations<'a> {
    fn new(bet_type: BetType, pool: &'a [u32]) -> Self {
        let k = bet_type.arity();
        let cursor = (k <= pool.len()).then(|| (0..k).collect());
        Self {
            bet_type,
            pool,
            cursor,
        }
    }
}

impl Iterator for Combinations<'_> {
    type Item = Combination;

    fn next(&mut self) -> Option<Combination> {
        let current = self.cursor.take()?;
        let runners = current.iter().map(|&i| self.pool[i]).collect();
        let item = Combination::from_distinct(self.bet_type, runners);

        let n = self.pool.len();
        self.cursor = if self.bet_type.is_ordered() {
            next_arrangement(current, n)
        } else {
            next_subset(current, n)
        };
        Some(item)
    }
}

/// Next strictly increasing index tuple.
fn next_subset(mut idx: Vec<usize>, n: usize) -> Option<Vec<usize>> {
    let k = idx.len();
    for i in (0..k).rev() {
        if idx[i] < n - k + i {
            idx[i] += 1;
            for j in i + 1..k {
                idx[j] = idx[j - 1] + 1;
            }
            return Some(idx);
        }
    }
    None
}

/// Next index tuple with pairwise distinct entries.
fn next_arrangement(mut idx: Vec<usize>, n: usize) -> Option<Vec<usize>> {
    loop {
        let mut pos = idx.len();
        loop {
            if pos == 0 {
                return None;
            }
            pos -= 1;
            idx[pos] += 1;
            if idx[pos] < n {
                break;
            }
            idx[pos] = 0;
        }
        let distinct = idx
            .iter()
            .enumerate()
            .all(|(i, a)| !idx[..i].contains(a));
        if distinct {
            return Some(idx);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
