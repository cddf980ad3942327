use crate::core::{Pipeline, Storage};
use crate::domain::model::DeliveryReport;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use chrono::Utc;

/// Result of one engine run. `report_path` is set when a report was written.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: DeliveryReport,
    pub report_path: Option<String>,
}

pub struct RelayEngine<P: Pipeline, S: Storage> {
    pipeline: P,
    storage: S,
    write_reports: bool,
    monitor: SystemMonitor,
}

impl<P: Pipeline, S: Storage> RelayEngine<P, S> {
    pub fn new(pipeline: P, storage: S) -> Self {
        Self::new_with_monitoring(pipeline, storage, false)
    }

    pub fn new_with_monitoring(pipeline: P, storage: S, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            storage,
            write_reports: true,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn with_reports(mut self, write_reports: bool) -> Self {
        self.write_reports = write_reports;
        self
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        let name = self.pipeline.name().to_string();
        let started_at = Utc::now();
        tracing::info!("🚀 Starting campaign '{}'", name);
        self.monitor.log_stats("Start");

        // Extract
        let Some(extracted) = self.pipeline.extract().await? else {
            tracing::info!("💤 Campaign '{}': nothing to process", name);
            self.monitor.log_final_stats();
            let mut report = DeliveryReport::empty(&name, self.pipeline.dry_run());
            report.started_at = started_at;
            return Ok(RunOutcome {
                report,
                report_path: None,
            });
        };
        tracing::info!("📥 Extracted {} row(s) from {}", extracted.records.len(), extracted.origin);
        self.monitor.log_stats("Extract");

        // Transform
        let batch = self.pipeline.transform(extracted).await?;
        tracing::info!(
            "🔄 Prepared {} message(s), {} skipped, {} duplicate(s) removed",
            batch.dispatches.len(),
            batch.skipped.len(),
            batch.duplicates_removed
        );
        self.monitor.log_stats("Transform");

        // Load
        let mut report = self.pipeline.load(batch).await?;
        report.started_at = started_at;
        tracing::info!(
            "📤 Campaign '{}': {} sent, {} failed, {} skipped, {} merged",
            name,
            report.sent_count(),
            report.failed_count(),
            report.skipped_count(),
            report.merges.len()
        );
        self.monitor.log_stats("Load");

        let report_path = if self.write_reports {
            Some(self.write_report(&report).await?)
        } else {
            None
        };

        self.monitor.log_final_stats();
        Ok(RunOutcome { report, report_path })
    }

    async fn write_report(&self, report: &DeliveryReport) -> Result<String> {
        let path = report_path(report);
        let json = serde_json::to_vec_pretty(report)?;
        self.storage.write_file(&path, &json).await?;
        tracing::info!("📁 Report saved to: {}", path);
        Ok(path)
    }
}

pub fn report_path(report: &DeliveryReport) -> String {
    format!(
        "reports/{}_{}.json",
        report.campaign,
        report.started_at.format("%Y%m%d_%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use crate::domain::model::{
        Delivery, DeliveryOutcome, DispatchBatch, Extracted, Origin, Record,
    };
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StaticPipeline {
        rows: usize,
        dry_run: bool,
    }

    fn pipeline(rows: usize) -> StaticPipeline {
        StaticPipeline { rows, dry_run: false }
    }

    #[async_trait]
    impl Pipeline for StaticPipeline {
        fn name(&self) -> &str {
            "feedback"
        }

        fn dry_run(&self) -> bool {
            self.dry_run
        }

        async fn extract(&self) -> Result<Option<Extracted>> {
            if self.rows == 0 {
                return Ok(None);
            }
            Ok(Some(Extracted {
                origin: Origin::LocalFile {
                    path: "feedback.csv".to_string(),
                },
                columns: None,
                records: (1..=self.rows).map(Record::new).collect(),
            }))
        }

        async fn transform(&self, data: Extracted) -> Result<DispatchBatch> {
            Ok(DispatchBatch {
                origin: Some(data.origin),
                duplicates_removed: data.records.len() - 1,
                ..DispatchBatch::default()
            })
        }

        async fn load(&self, batch: DispatchBatch) -> Result<DeliveryReport> {
            let mut report = DeliveryReport::empty("feedback", false);
            report.origin = batch.origin;
            report.duplicates_removed = batch.duplicates_removed;
            report.deliveries.push(Delivery::new(
                1,
                "J. de Vries",
                Some("31612345678"),
                DeliveryOutcome::Sent { ticket_id: Some(7) },
            ));
            Ok(report)
        }
    }

    #[tokio::test]
    async fn test_run_writes_report() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let engine = RelayEngine::new(pipeline(3), storage.clone());

        let before = Utc::now();
        let outcome = engine.run().await.unwrap();
        assert!(outcome.report.started_at >= before);
        assert!(outcome.report.started_at <= outcome.report.finished_at);
        assert_eq!(outcome.report.sent_count(), 1);
        assert_eq!(outcome.report.duplicates_removed, 2);

        let path = outcome.report_path.unwrap();
        assert!(path.starts_with("reports/feedback_"));
        let written: serde_json::Value =
            serde_json::from_slice(&storage.read_file(&path).await.unwrap()).unwrap();
        assert_eq!(written["deliveries"][0]["status"], "sent");
        assert_eq!(written["deliveries"][0]["ticket_id"], 7);
        assert_eq!(written["origin"]["kind"], "local_file");
    }

    #[tokio::test]
    async fn test_nothing_to_process_writes_no_report() {
        let dir = TempDir::new().unwrap();
        let engine = RelayEngine::new(pipeline(0), LocalStorage::new(dir.path()));

        let outcome = engine.run().await.unwrap();
        assert!(outcome.report.is_empty());
        assert!(outcome.report_path.is_none());
        assert!(!dir.path().join("reports").exists());
    }

    #[tokio::test]
    async fn test_reports_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let engine =
            RelayEngine::new(pipeline(1), LocalStorage::new(dir.path())).with_reports(false);

        let outcome = engine.run().await.unwrap();
        assert!(outcome.report_path.is_none());
        assert_eq!(outcome.report.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_dry_run_is_reported_as_dry_run() {
        let dir = TempDir::new().unwrap();
        let engine = RelayEngine::new(
            StaticPipeline { rows: 0, dry_run: true },
            LocalStorage::new(dir.path()),
        );

        let outcome = engine.run().await.unwrap();
        assert!(outcome.report.dry_run);
        assert!(outcome.report.is_empty());
    }
}
