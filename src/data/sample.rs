//! Built-in six-runner card.
//!
//! Stands in for a real data feed during development and in tests. The
//! same card is returned for every race.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use super::RosterSource;
use crate::types::{Competitor, CompetitorProfile, RaceMeta};

pub struct SampleRoster;

#[async_trait]
impl RosterSource for SampleRoster {
    async fn fetch_roster(&self, race: &RaceMeta) -> Result<Vec<Competitor>> {
        let roster = sample_roster();
        debug!(race = %race.label(), runners = roster.len(), "Sample roster served");
        Ok(roster)
    }

    fn name(&self) -> &str {
        "sample"
    }
}

struct Row {
    name: &'static str,
    sex_age: &'static str,
    carried: u32,
    body: u32,
    distance: u32,
    style: &'static str,
    jockey: &'static str,
    trainer: &'static str,
    odds: (i64, u32),
    popularity: u32,
    base: i64,
    pedigree: &'static str,
    form: &'static str,
    track: &'static str,
}

const ROWS: &[Row] = &[
    Row { name: "Admire Terra", sex_age: "C4", carried: 57, body: 500, distance: 1800, style: "closer", jockey: "Kawada", trainer: "Fujisawa", odds: (32, 1), popularity: 1, base: 85, pedigree: "Sunday Silence", form: "1-2-1-2", track: "good" },
    Row { name: "Calandagan", sex_age: "G4", carried: 57, body: 502, distance: 2000, style: "stalker", jockey: "Barzalona", trainer: "Takagi", odds: (51, 1), popularity: 2, base: 78, pedigree: "Kingmambo", form: "0-1-1-3", track: "yielding" },
    Row { name: "Sample A", sex_age: "F3", carried: 54, body: 470, distance: 1600, style: "deep closer", jockey: "Take", trainer: "Ikee", odds: (125, 1), popularity: 4, base: 70, pedigree: "Mr. Prospector", form: "2-0-1-2", track: "soft" },
    Row { name: "Sample B", sex_age: "C5", carried: 56, body: 480, distance: 1800, style: "front runner", jockey: "Fukunaga", trainer: "Tomomichi", odds: (78, 1), popularity: 3, base: 72, pedigree: "Sunday Silence", form: "1-1-0-3", track: "good" },
    Row { name: "Sample C", sex_age: "C6", carried: 57, body: 488, distance: 2000, style: "stalker", jockey: "Yokoyama", trainer: "Tanaka", odds: (200, 1), popularity: 6, base: 65, pedigree: "Northern Dancer", form: "0-0-1-4", track: "good" },
    Row { name: "Sample D", sex_age: "F4", carried: 55, body: 472, distance: 1400, style: "closer", jockey: "Ikezoe", trainer: "Sato", odds: (150, 1), popularity: 5, base: 68, pedigree: "Mr. Prospector", form: "1-1-2-1", track: "yielding" },
];

/// The six-runner sample card, numbered 1–6 with frame = number.
pub fn sample_roster() -> Vec<Competitor> {
    ROWS.iter()
        .zip(1u32..)
        .map(|(row, number)| Competitor {
            number,
            name: row.name.to_string(),
            odds: Decimal::new(row.odds.0, row.odds.1),
            popularity: row.popularity,
            base_score: Decimal::from(row.base),
            profile: CompetitorProfile {
                frame: Some(number),
                sex_age: Some(row.sex_age.to_string()),
                carried_weight: Some(Decimal::from(row.carried)),
                last_body_weight: Some(row.body),
                distance: Some(row.distance),
                running_style: Some(row.style.to_string()),
                jockey: Some(row.jockey.to_string()),
                trainer: Some(row.trainer.to_string()),
                owner: None,
                breeder: None,
                pedigree: Some(row.pedigree.to_string()),
                recent_form: Some(row.form.to_string()),
                track_condition: Some(row.track.to_string()),
            },
        })
        .collect()
}
