// Adapters layer: concrete implementations for external systems (Trengo, Graph, Airtable, files, storage)

pub mod airtable;
pub mod file;
pub mod graph;
pub mod http;
pub mod ledger;
pub mod spreadsheet;
pub mod storage;
pub mod trengo;

use crate::config::{CampaignConfig, RelayConfig, SourceConfig};
use crate::domain::ports::RowSource;
use crate::utils::error::{RelayError, Result};
use airtable::AirtableSource;
use file::FileSource;
use graph::{GraphClient, MailboxSource, SharePointSource};
use storage::LocalStorage;

/// Builds the row source a campaign reads from.
pub fn build_source(
    config: &RelayConfig,
    campaign: &CampaignConfig,
    storage: LocalStorage,
) -> Result<Box<dyn RowSource>> {
    let missing = |section: &str| RelayError::MissingConfigError {
        field: format!("{} (needed by campaign '{}')", section, campaign.name),
    };

    let source: Box<dyn RowSource> = match &campaign.source {
        SourceConfig::Mailbox {
            sender,
            subject,
            attachment_extension,
        } => {
            let graph = config.graph.as_ref().ok_or_else(|| missing("graph"))?;
            Box::new(
                MailboxSource::new(
                    GraphClient::new(graph)?,
                    &campaign.name,
                    sender,
                    subject,
                    attachment_extension,
                    storage,
                )
                .with_archive(config.output.archive_attachments),
            )
        }
        SourceConfig::Airtable {
            table,
            view,
            delete_after_send,
        } => {
            let airtable = config.airtable.as_ref().ok_or_else(|| missing("airtable"))?;
            Box::new(
                AirtableSource::new(airtable, table)?
                    .with_view(view.clone())
                    .with_delete_after_send(*delete_after_send),
            )
        }
        SourceConfig::SharePoint { site_id, item_path } => {
            let graph = config.graph.as_ref().ok_or_else(|| missing("graph"))?;
            Box::new(SharePointSource::new(GraphClient::new(graph)?, site_id, item_path))
        }
        SourceConfig::File { path } => Box::new(FileSource::new(path.clone())),
    };

    tracing::debug!("🔌 Campaign '{}' reads from {}", campaign.name, source.describe());
    Ok(source)
}
