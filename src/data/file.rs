//! JSON roster files.
//!
//! `roster_path` may point at a single file (one card for every race) or
//! at a directory holding one `<race label>.json` per race, e.g.
//! `20261018-Kyoto-11.json`. Each file is a JSON array of competitors.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use super::RosterSource;
use crate::types::{Competitor, RaceMeta};

pub struct JsonFileRoster {
    path: PathBuf,
}

impl JsonFileRoster {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Resolve the file for a race.
    fn file_for(&self, race: &RaceMeta) -> PathBuf {
        if self.path.is_dir() {
            self.path.join(format!("{}.json", race.label()))
        } else {
            self.path.clone()
        }
    }
}

#[async_trait]
impl RosterSource for JsonFileRoster {
    async fn fetch_roster(&self, race: &RaceMeta) -> Result<Vec<Competitor>> {
        let path = self.file_for(race);
        let json = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read roster file: {}", path.display()))?;
        let roster: Vec<Competitor> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse roster file: {}", path.display()))?;
        info!(
            path = %path.display(),
            race = %race.label(),
            runners = roster.len(),
            "Roster loaded from file"
        );
        Ok(roster)
    }

    fn name(&self) -> &str {
        "file"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
