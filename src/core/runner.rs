use crate::adapters::build_source;
use crate::adapters::storage::LocalStorage;
use crate::adapters::trengo::TrengoClient;
use crate::config::{CampaignConfig, RelayConfig};
use crate::core::etl::{RelayEngine, RunOutcome};
use crate::core::pipeline::CampaignPipeline;
use crate::utils::error::Result;

/// Wires a campaign's source, the Trengo client and storage into an engine run.
#[derive(Debug, Clone)]
pub struct CampaignRunner {
    config: RelayConfig,
    dry_run: bool,
    monitor: bool,
}

impl CampaignRunner {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            dry_run: false,
            monitor: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_monitoring(mut self, monitor: bool) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn storage(&self) -> LocalStorage {
        LocalStorage::new(&self.config.output.path)
    }

    pub async fn run_campaign(&self, campaign: &CampaignConfig) -> Result<RunOutcome> {
        let storage = self.storage();
        let source = build_source(&self.config, campaign, storage.clone())?;
        let trengo = TrengoClient::new(&self.config.trengo)?;
        let pipeline =
            CampaignPipeline::new(campaign.clone(), source, trengo).with_dry_run(self.dry_run);

        RelayEngine::new_with_monitoring(pipeline, storage, self.monitor)
            .with_reports(self.config.output.write_reports)
            .run()
            .await
    }

    /// Runs campaigns one after another. A failing campaign does not stop the others.
    pub async fn run_all(&self, campaigns: &[&CampaignConfig]) -> Vec<(String, Result<RunOutcome>)> {
        let mut results = Vec::with_capacity(campaigns.len());
        for campaign in campaigns {
            let result = self.run_campaign(campaign).await;
            if let Err(e) = &result {
                tracing::error!(
                    "❌ Campaign '{}' failed: {} (Category: {:?}, Severity: {:?})",
                    campaign.name,
                    e,
                    e.category(),
                    e.severity()
                );
                tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            }
            results.push((campaign.name.clone(), result));
        }
        results
    }
}
