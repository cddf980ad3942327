use crate::domain::services::{PhoneFormat, ValueFormat};
use crate::utils::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// One former standalone script: a source, a template, and how rows map onto it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub template_id: String,
    pub source: SourceConfig,
    #[serde(default = "default_name_column")]
    pub name_column: String,
    #[serde(default = "default_phone_column")]
    pub phone_column: String,
    #[serde(default)]
    pub phone_format: PhoneFormat,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Template parameters in `{{1}}`, `{{2}}`, ... order.
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldSpec>,
    #[serde(default)]
    pub dedupe_on: Vec<String>,
    /// Explicit header check; derived from the referenced columns when empty.
    #[serde(default)]
    pub required_columns: Vec<String>,
    pub work_order: Option<WorkOrderConfig>,
    pub schedule: Option<ScheduleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Newest unread mail from `sender` with exactly `subject`, first `.xlsx` attachment.
    Mailbox {
        sender: String,
        subject: String,
        #[serde(default = "default_attachment_extension")]
        attachment_extension: String,
    },
    Airtable {
        table: String,
        view: Option<String>,
        #[serde(default = "default_true")]
        delete_after_send: bool,
    },
    #[serde(rename = "sharepoint")]
    SharePoint { site_id: String, item_path: String },
    File { path: String },
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Mailbox { .. } => "mailbox",
            SourceConfig::Airtable { .. } => "airtable",
            SourceConfig::SharePoint { .. } => "sharepoint",
            SourceConfig::File { .. } => "file",
        }
    }

    /// Spreadsheet sources have a header row that can be checked up front.
    pub fn is_tabular(&self) -> bool {
        !matches!(self, SourceConfig::Airtable { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub column: String,
    #[serde(default)]
    pub format: ValueFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomFieldSpec {
    Column {
        field_id: u64,
        column: String,
        #[serde(default)]
        format: ValueFormat,
    },
    PlanUrl {
        field_id: u64,
        base_url: String,
        #[serde(default = "default_plan_location")]
        location: String,
        email: String,
        column: String,
    },
}

impl CustomFieldSpec {
    pub fn field_id(&self) -> u64 {
        match self {
            CustomFieldSpec::Column { field_id, .. } | CustomFieldSpec::PlanUrl { field_id, .. } => {
                *field_id
            }
        }
    }

    pub fn column(&self) -> &str {
        match self {
            CustomFieldSpec::Column { column, .. } | CustomFieldSpec::PlanUrl { column, .. } => column,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrderConfig {
    pub column: String,
    #[serde(default = "default_true")]
    pub merge_open_tickets: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub interval_minutes: Option<u64>,
    /// Seconds-first cron expression, e.g. `0 30 17 * * Mon-Fri`.
    pub cron: Option<String>,
}

#[derive(Debug, Clone)]
pub enum CampaignSchedule {
    Interval(Duration),
    Cron(Box<cron::Schedule>),
}

impl ScheduleConfig {
    pub fn parse(&self) -> Result<CampaignSchedule> {
        match (self.interval_minutes, self.cron.as_deref()) {
            (Some(_), Some(_)) => Err(RelayError::ConfigValidationError {
                field: "schedule".to_string(),
                message: "set either interval_minutes or cron, not both".to_string(),
            }),
            (None, None) => Err(RelayError::ConfigValidationError {
                field: "schedule".to_string(),
                message: "set interval_minutes or cron".to_string(),
            }),
            (Some(0), None) => Err(RelayError::InvalidConfigValueError {
                field: "schedule.interval_minutes".to_string(),
                value: "0".to_string(),
                reason: "Value must be at least 1".to_string(),
            }),
            (Some(minutes), None) => Ok(CampaignSchedule::Interval(Duration::from_secs(minutes * 60))),
            (None, Some(expr)) => cron::Schedule::from_str(expr)
                .map(|s| CampaignSchedule::Cron(Box::new(s)))
                .map_err(|e| RelayError::InvalidConfigValueError {
                    field: "schedule.cron".to_string(),
                    value: expr.to_string(),
                    reason: format!("invalid cron: {}", e),
                }),
        }
    }
}

impl CampaignConfig {
    /// Columns a spreadsheet must carry for this campaign, in first-mention order.
    pub fn effective_required_columns(&self) -> Vec<String> {
        if !self.required_columns.is_empty() {
            return self.required_columns.clone();
        }

        let mut columns: Vec<String> = Vec::new();
        let mut push = |column: &str| {
            if !column.is_empty() && !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        };

        push(&self.name_column);
        push(&self.phone_column);
        for param in &self.params {
            push(&param.column);
        }
        for field in &self.custom_fields {
            push(field.column());
        }
        if let Some(work_order) = &self.work_order {
            push(&work_order.column);
        }
        for key in &self.dedupe_on {
            push(key);
        }
        columns
    }
}

fn default_true() -> bool {
    true
}

fn default_name_column() -> String {
    "Naam bewoner".to_string()
}

fn default_phone_column() -> String {
    "Mobielnummer".to_string()
}

fn default_country_code() -> String {
    "31".to_string()
}

fn default_attachment_extension() -> String {
    "xlsx".to_string()
}

fn default_plan_location() -> String {
    "fixzed".to_string()
}
