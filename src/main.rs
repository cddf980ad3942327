use clap::Parser;
use trengo_relay::config::cli::Command;
use trengo_relay::config::SourceConfig;
use trengo_relay::utils::error::ErrorSeverity;
use trengo_relay::utils::{logger, validation::Validate};
use trengo_relay::{CampaignRunner, CliConfig, RelayConfig, RelayError, Scheduler};

fn fail(e: &RelayError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    std::process::exit(e.severity().exit_code().max(1));
}

fn load_config(path: &str) -> RelayConfig {
    let config = RelayConfig::from_file(path).unwrap_or_else(|e| fail(&e));
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        fail(&e);
    }
    config
}

fn print_summary(config: &RelayConfig) {
    println!("✅ Configuration is valid ({} campaign(s))", config.campaigns.len());
    for campaign in &config.campaigns {
        let source = match &campaign.source {
            SourceConfig::Mailbox { sender, subject, .. } => format!("mailbox {} / '{}'", sender, subject),
            SourceConfig::Airtable { table, .. } => format!("airtable {}", table),
            SourceConfig::SharePoint { item_path, .. } => format!("sharepoint {}", item_path),
            SourceConfig::File { path } => format!("file {}", path),
        };
        let schedule = match &campaign.schedule {
            Some(s) => match (s.interval_minutes, s.cron.as_deref()) {
                (Some(minutes), _) => format!("every {} min", minutes),
                (_, Some(cron)) => format!("cron '{}'", cron),
                _ => "-".to_string(),
            },
            None => "-".to_string(),
        };
        println!(
            "  {} {:<28} template {:<8} {:<45} {}",
            if campaign.enabled { "●" } else { "○" },
            campaign.name,
            campaign.template_id,
            source,
            schedule
        );
    }
}

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    logger::init(cli.verbose, cli.log_json);

    tracing::info!("Starting trengo-relay");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }
    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let config = load_config(&cli.config);

    match cli.command {
        Command::Check => print_summary(&config),
        Command::Run { campaign, dry_run } => {
            let campaigns: Vec<_> = config
                .select_campaigns(campaign.as_deref())
                .unwrap_or_else(|e| fail(&e))
                .into_iter()
                .cloned()
                .collect();
            if campaigns.is_empty() {
                tracing::warn!("⚠️ No enabled campaigns to run");
                return;
            }
            if dry_run {
                tracing::info!("🧪 Dry run: nothing will be sent or acknowledged");
            }

            let runner = CampaignRunner::new(config)
                .with_dry_run(dry_run)
                .with_monitoring(cli.monitor);
            let results = runner.run_all(&campaigns.iter().collect::<Vec<_>>()).await;

            let mut worst: Option<ErrorSeverity> = None;
            for (name, result) in &results {
                match result {
                    Ok(outcome) => {
                        println!(
                            "✅ {}: {} sent, {} failed, {} skipped",
                            name,
                            outcome.report.sent_count(),
                            outcome.report.failed_count(),
                            outcome.report.skipped_count()
                        );
                        if let Some(path) = &outcome.report_path {
                            println!("📁 Report saved to: {}", path);
                        }
                    }
                    Err(e) => {
                        eprintln!("❌ {}: {}", name, e.user_friendly_message());
                        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
                        worst = worst.max(Some(e.severity()));
                    }
                }
            }

            if let Some(severity) = worst {
                let exit_code = severity.exit_code();
                if exit_code > 0 {
                    std::process::exit(exit_code);
                }
            }
        }
        Command::Schedule { campaign, dry_run } => {
            let campaigns: Vec<_> = config
                .select_campaigns(campaign.as_deref())
                .unwrap_or_else(|e| fail(&e))
                .into_iter()
                .cloned()
                .collect();

            let runner = CampaignRunner::new(config)
                .with_dry_run(dry_run)
                .with_monitoring(cli.monitor);
            let scheduler = Scheduler::new(runner, campaigns).unwrap_or_else(|e| fail(&e));
            tracing::info!("🗓️ Scheduling: {}", scheduler.campaign_names().join(", "));

            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("❌ Could not listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };
            if let Err(e) = scheduler.run_until(shutdown).await {
                fail(&e);
            }
        }
    }
}
