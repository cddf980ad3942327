use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type TicketId = u64;

/// One source row keyed by its column header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Provider record id (Airtable), used to acknowledge the row after sending.
    pub id: Option<String>,
    /// 1-based row number within the batch.
    pub index: usize,
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn new(index: usize) -> Self {
        Self {
            id: None,
            index,
            data: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_field(mut self, column: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(column.into(), value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&serde_json::Value> {
        self.data.get(column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    MailAttachment {
        message_id: String,
        attachment: String,
    },
    AirtableTable {
        table: String,
    },
    SharePointItem {
        item_path: String,
    },
    LocalFile {
        path: String,
    },
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::MailAttachment {
                message_id,
                attachment,
            } => write!(f, "attachment '{}' of message {}", attachment, message_id),
            Origin::AirtableTable { table } => write!(f, "Airtable table '{}'", table),
            Origin::SharePointItem { item_path } => write!(f, "SharePoint item '{}'", item_path),
            Origin::LocalFile { path } => write!(f, "file '{}'", path),
        }
    }
}

/// What a source produced in one poll.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub origin: Origin,
    /// Header row for tabular sources; `None` when rows carry their own keys.
    pub columns: Option<Vec<String>>,
    pub records: Vec<Record>,
}

/// A fully formatted outbound template message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dispatch {
    pub row: usize,
    pub record: Record,
    pub recipient_name: String,
    pub phone: String,
    pub params: Vec<String>,
    pub custom_fields: Vec<(u64, String)>,
    pub work_order: Option<String>,
    /// Rows dropped as duplicates of this one, acknowledged together with it.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub recipient_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchBatch {
    pub origin: Option<Origin>,
    pub dispatches: Vec<Dispatch>,
    pub skipped: Vec<SkippedRow>,
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent { ticket_id: Option<TicketId> },
    DryRun,
    Skipped { reason: String },
    Failed { ticket_id: Option<TicketId>, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub row: usize,
    pub recipient_name: String,
    pub phone: Option<String>,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
    /// Follow-up steps that failed after the message itself went out.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Delivery {
    pub fn new(row: usize, recipient_name: &str, phone: Option<&str>, outcome: DeliveryOutcome) -> Self {
        Self {
            row,
            recipient_name: recipient_name.to_string(),
            phone: phone.map(str::to_string),
            outcome,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeAction {
    pub work_order: String,
    pub source_ticket: TicketId,
    pub target_ticket: TicketId,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub campaign: String,
    pub origin: Option<Origin>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duplicates_removed: usize,
    pub deliveries: Vec<Delivery>,
    pub merges: Vec<MergeAction>,
}

impl DeliveryReport {
    pub fn empty(campaign: &str, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            campaign: campaign.to_string(),
            origin: None,
            dry_run,
            started_at: now,
            finished_at: now,
            duplicates_removed: 0,
            deliveries: Vec::new(),
            merges: Vec::new(),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|d| matches!(d.outcome, DeliveryOutcome::Sent { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|d| matches!(d.outcome, DeliveryOutcome::Failed { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|d| matches!(d.outcome, DeliveryOutcome::Skipped { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }
}
