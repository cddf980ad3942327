use crate::config::{CampaignConfig, CampaignSchedule};
use crate::core::runner::CampaignRunner;
use crate::utils::error::{RelayError, Result};
use chrono::{DateTime, Local};
use std::future::Future;

struct ScheduledCampaign {
    campaign: CampaignConfig,
    schedule: CampaignSchedule,
    next_run: DateTime<Local>,
}

/// Next fire time strictly after `after`.
pub fn next_fire(schedule: &CampaignSchedule, after: DateTime<Local>) -> Option<DateTime<Local>> {
    match schedule {
        CampaignSchedule::Interval(every) => {
            let every = chrono::Duration::from_std(*every).ok()?;
            after.checked_add_signed(every)
        }
        CampaignSchedule::Cron(schedule) => schedule.after(&after).next(),
    }
}

/// Runs campaigns on their own schedules, one at a time, until `shutdown` resolves.
pub struct Scheduler {
    runner: CampaignRunner,
    entries: Vec<ScheduledCampaign>,
}

impl Scheduler {
    /// Interval campaigns are due immediately; cron campaigns at their next fire time.
    pub fn new(runner: CampaignRunner, campaigns: Vec<CampaignConfig>) -> Result<Self> {
        let now = Local::now();
        let mut entries = Vec::new();

        for campaign in campaigns {
            let Some(config) = &campaign.schedule else {
                tracing::warn!("⚠️ Campaign '{}' has no schedule, skipping", campaign.name);
                continue;
            };
            let schedule = config.parse()?;
            let next_run = match &schedule {
                CampaignSchedule::Interval(_) => now,
                CampaignSchedule::Cron(_) => next_fire(&schedule, now).ok_or_else(|| {
                    RelayError::config(format!("cron of campaign '{}' never fires", campaign.name))
                })?,
            };
            tracing::info!("⏰ Campaign '{}' first runs at {}", campaign.name, next_run.format("%Y-%m-%d %H:%M:%S"));
            entries.push(ScheduledCampaign {
                campaign,
                schedule,
                next_run,
            });
        }

        if entries.is_empty() {
            return Err(RelayError::config("no scheduled campaigns to run"));
        }
        Ok(Self { runner, entries })
    }

    pub fn campaign_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.campaign.name.as_str()).collect()
    }

    fn next_due(&self) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| entry.next_run)
            .map(|(i, _)| i)
    }

    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!("🗓️ Scheduler started for {} campaign(s)", self.entries.len());

        while let Some(index) = self.next_due() {
            let wait = (self.entries[index].next_run - Local::now())
                .to_std()
                .unwrap_or_default();

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("🛑 Shutdown requested, stopping scheduler");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {}
            }

            let entry = &self.entries[index];
            if let Err(e) = self.runner.run_campaign(&entry.campaign).await {
                tracing::error!("❌ Campaign '{}' failed: {}", entry.campaign.name, e);
                tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            }

            let entry = &mut self.entries[index];
            match next_fire(&entry.schedule, Local::now()) {
                Some(next) => {
                    tracing::info!("⏰ Campaign '{}' next runs at {}", entry.campaign.name, next.format("%Y-%m-%d %H:%M:%S"));
                    entry.next_run = next;
                }
                None => {
                    tracing::warn!("⚠️ Campaign '{}' has no further fire times", entry.campaign.name);
                    self.entries.remove(index);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};
    use std::time::Duration;

    #[test]
    fn test_interval_next_fire() {
        let schedule = CampaignSchedule::Interval(Duration::from_secs(30 * 60));
        let start = Local.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let next = next_fire(&schedule, start).unwrap();
        assert_eq!(next - start, chrono::Duration::minutes(30));
    }

    #[test]
    fn test_weekday_cron_skips_weekend() {
        let schedule = ScheduleConfig {
            interval_minutes: None,
            cron: Some("0 30 17 * * Mon-Fri".to_string()),
        }
        .parse()
        .unwrap();

        // Friday 2025-03-07 after the run: next is Monday 17:30.
        let friday_evening = Local.with_ymd_and_hms(2025, 3, 7, 18, 0, 0).unwrap();
        let next = next_fire(&schedule, friday_evening).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!((next.hour(), next.minute()), (17, 30));

        let friday_noon = Local.with_ymd_and_hms(2025, 3, 7, 12, 0, 0).unwrap();
        let next = next_fire(&schedule, friday_noon).unwrap();
        assert_eq!(next.day(), 7);
    }
}
