use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "trengo-relay")]
#[command(about = "Relays spreadsheet rows as WhatsApp template messages through Trengo")]
pub struct CliConfig {
    /// Path to the TOML campaign configuration
    #[arg(short, long, global = true, default_value = "relay.toml")]
    pub config: String,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[arg(long, global = true, help = "Log process CPU and memory per phase")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run enabled campaigns once and exit
    Run {
        /// Only run this campaign (also runs it when disabled)
        #[arg(long)]
        campaign: Option<String>,

        /// Format and log messages without sending or acknowledging anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Keep running campaigns on their configured schedules
    Schedule {
        #[arg(long)]
        campaign: Option<String>,

        #[arg(long)]
        dry_run: bool,
    },
    /// Validate the configuration and print a summary
    Check,
}
