//! Mock roster source for integration testing.
//!
//! Provides a deterministic `RosterSource` that serves a fixed card per
//! race and counts fetches, all in-memory with no external dependencies.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

use keiba::data::RosterSource;
use keiba::types::{Competitor, CompetitorProfile, RaceMeta};

pub struct MockRoster {
    roster: Vec<Competitor>,
    fetches: Arc<Mutex<Vec<String>>>,
    /// If set, every fetch fails with this message.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockRoster {
    /// Card built from `(base score, odds)` pairs; numbers and popularity
    /// follow card order.
    pub fn from_scores(entries: &[(i64, Decimal)]) -> Self {
        let roster = entries
            .iter()
            .enumerate()
            .map(|(i, (base, odds))| Competitor {
                number: i as u32 + 1,
                name: format!("Mock Runner {}", i + 1),
                odds: *odds,
                popularity: i as u32 + 1,
                base_score: Decimal::from(*base),
                profile: CompetitorProfile::default(),
            })
            .collect();
        Self {
            roster,
            fetches: Arc::new(Mutex::new(Vec::new())),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Race labels fetched so far.
    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RosterSource for MockRoster {
    async fn fetch_roster(&self, race: &RaceMeta) -> Result<Vec<Competitor>> {
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(anyhow!(msg));
        }
        self.fetches.lock().unwrap().push(race.label());
        Ok(self.roster.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
