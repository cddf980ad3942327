use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use trengo_relay::domain::services::{format_phone, plan_url, PhoneFormat};
use trengo_relay::utils::{logger, validation};
use trengo_relay::{RelayConfig, RelayError, Result, TrengoClient};

#[derive(Debug, Parser)]
#[command(name = "trengo-tools")]
#[command(about = "Operator helpers for the Trengo account behind trengo-relay")]
struct ToolsCli {
    #[arg(short, long, global = true, default_value = "relay.toml")]
    config: String,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Debug, Subcommand)]
enum ToolCommand {
    /// List ticket custom fields (ID, name, type, required)
    CustomFields {
        /// Also write the raw API response to this JSON file
        #[arg(long)]
        save: Option<String>,
    },
    /// Print the ticket count as counter-display JSON
    TicketCount,
    /// Send one template message
    SendTest {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        template: String,
        #[arg(long, default_value = "31")]
        country_code: String,
        /// Planregel; sets the plan URL custom field on the new ticket
        #[arg(long)]
        plan: Option<String>,
        #[arg(long, default_value_t = 618842)]
        plan_field_id: u64,
        #[arg(long, default_value = "https://fixzed.plannen.app/token/")]
        plan_base_url: String,
        #[arg(long, default_value = "fixzed")]
        plan_location: String,
        #[arg(long)]
        plan_email: Option<String>,
    },
}

async fn custom_fields(client: &TrengoClient, save: Option<String>) -> Result<()> {
    let listing = client.list_custom_fields().await?;

    println!("{:<10} {:<32} {:<12} Required", "ID", "Name", "Type");
    println!("{}", "-".repeat(64));
    for field in &listing.fields {
        println!(
            "{:<10} {:<32} {:<12} {}",
            field.id,
            field.name.as_deref().unwrap_or("-"),
            field.field_type.as_deref().unwrap_or("-"),
            if field.required { "yes" } else { "no" }
        );
    }
    println!("\n{} custom field(s)", listing.fields.len());

    if let Some(path) = save {
        std::fs::write(&path, serde_json::to_vec_pretty(&listing.raw)?)?;
        println!("📁 Saved to {}", path);
    }
    Ok(())
}

async fn send_test(client: &TrengoClient, command: ToolCommand) -> Result<()> {
    let ToolCommand::SendTest {
        phone,
        name,
        template,
        country_code,
        plan,
        plan_field_id,
        plan_base_url,
        plan_location,
        plan_email,
    } = command
    else {
        return Ok(());
    };

    let phone = format_phone(&Value::String(phone.clone()), PhoneFormat::International, &country_code)
        .ok_or_else(|| RelayError::validation(format!("'{}' is not a usable phone number", phone)))?;

    let sent = client.send_template(&phone, &template, &[name.clone()]).await?;
    println!("✅ Sent template {} to {} ({})", template, name, phone);

    match (plan, sent.ticket_id) {
        (Some(planregel), Some(ticket_id)) => {
            let email = plan_email
                .ok_or_else(|| RelayError::validation("--plan-email is required with --plan"))?;
            let url = plan_url(&plan_base_url, &plan_location, &email, &planregel);
            client.set_custom_field(ticket_id, plan_field_id, &url).await?;
            println!("🏷️ Ticket {}: plan URL {}", ticket_id, url);
        }
        (Some(_), None) => println!("⚠️ No ticket id in the response; plan URL not set"),
        (None, Some(ticket_id)) => println!("🎫 Ticket {}", ticket_id),
        (None, None) => {}
    }
    Ok(())
}

async fn run(cli: ToolsCli) -> Result<()> {
    let config = RelayConfig::from_file(&cli.config)?;
    validation::validate_secret("trengo.api_key", &config.trengo.api_key)?;
    validation::validate_url("trengo.base_url", &config.trengo.base_url)?;
    let client = TrengoClient::new(&config.trengo)?;

    match cli.command {
        ToolCommand::CustomFields { save } => custom_fields(&client, save).await,
        ToolCommand::TicketCount => {
            let count = client.count_tickets().await?;
            println!("{}", json!({ "count": count }));
            Ok(())
        }
        command @ ToolCommand::SendTest { .. } => send_test(&client, command).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = ToolsCli::parse();
    logger::init_cli_logger(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::error!("❌ {} (Category: {:?})", e, e.category());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
        std::process::exit(e.severity().exit_code().max(1));
    }
}
