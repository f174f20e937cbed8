//! Roster sources.
//!
//! Defines the `RosterSource` trait, the seam to whatever collaborator
//! acquires runner data, and provides a built-in sample card and a
//! JSON-file source.

pub mod file;
pub mod sample;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{DataConfig, RosterKind};
use crate::types::{Competitor, RaceMeta};

pub use file::JsonFileRoster;
pub use sample::{sample_roster, SampleRoster};

/// Abstraction over runner data acquisition.
///
/// Implementors return the runners for one race, in card order, with base
/// scores already computed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Fetch the runners for a race.
    async fn fetch_roster(&self, race: &RaceMeta) -> Result<Vec<Competitor>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Build the roster source selected in configuration.
pub fn build_source(cfg: &DataConfig) -> Box<dyn RosterSource> {
    match cfg.source {
        RosterKind::Sample => Box::new(SampleRoster),
        RosterKind::File => Box::new(JsonFileRoster::new(&cfg.roster_path)),
    }
}
