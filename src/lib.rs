pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::storage::LocalStorage;
pub use adapters::trengo::TrengoClient;
pub use config::{CampaignConfig, RelayConfig};
pub use core::{
    etl::{RelayEngine, RunOutcome},
    pipeline::CampaignPipeline,
    runner::CampaignRunner,
    scheduler::Scheduler,
};
pub use utils::error::{RelayError, Result};
