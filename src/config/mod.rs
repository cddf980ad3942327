pub mod campaign;
#[cfg(feature = "cli")]
pub mod cli;

pub use campaign::{
    CampaignConfig, CampaignSchedule, CustomFieldSpec, ParamSpec, ScheduleConfig, SourceConfig,
    WorkOrderConfig,
};

use crate::utils::error::{RelayError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TRENGO_URL: &str = "https://app.trengo.com/api/v2";
pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_LOGIN_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_AIRTABLE_URL: &str = "https://api.airtable.com/v0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub trengo: TrengoConfig,
    pub graph: Option<GraphConfig>,
    pub airtable: Option<AirtableConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub campaigns: Vec<CampaignConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrengoConfig {
    pub api_key: String,
    #[serde(default = "default_trengo_url")]
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
}

/// Microsoft Graph access for the Outlook mailbox and SharePoint sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_graph_url")]
    pub base_url: String,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirtableConfig {
    pub api_key: String,
    pub base_id: String,
    #[serde(default = "default_airtable_url")]
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: String,
    #[serde(default = "default_true")]
    pub write_reports: bool,
    #[serde(default)]
    pub archive_attachments: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            write_reports: true,
            archive_attachments: false,
        }
    }
}

impl RelayConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RelayError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RelayError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value. Unset variables stay literal so
    /// validation can name them.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| RelayError::config(format!("env placeholder pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn campaign(&self, name: &str) -> Option<&CampaignConfig> {
        self.campaigns.iter().find(|c| c.name == name)
    }

    pub fn enabled_campaigns(&self) -> impl Iterator<Item = &CampaignConfig> {
        self.campaigns.iter().filter(|c| c.enabled)
    }

    /// Campaign by name, or every enabled campaign when `name` is `None`.
    pub fn select_campaigns(&self, name: Option<&str>) -> Result<Vec<&CampaignConfig>> {
        match name {
            Some(name) => self
                .campaign(name)
                .map(|c| vec![c])
                .ok_or_else(|| RelayError::InvalidConfigValueError {
                    field: "campaign".to_string(),
                    value: name.to_string(),
                    reason: format!(
                        "Unknown campaign. Configured: {}",
                        self.campaigns
                            .iter()
                            .map(|c| c.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                }),
            None => Ok(self.enabled_campaigns().collect()),
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_secret("trengo.api_key", &self.trengo.api_key)?;
        validation::validate_url("trengo.base_url", &self.trengo.base_url)?;

        if let Some(graph) = &self.graph {
            validation::validate_non_empty_string("graph.tenant_id", &graph.tenant_id)?;
            validation::validate_non_empty_string("graph.client_id", &graph.client_id)?;
            validation::validate_secret("graph.client_secret", &graph.client_secret)?;
            validation::validate_non_empty_string("graph.username", &graph.username)?;
            validation::validate_secret("graph.password", &graph.password)?;
            validation::validate_url("graph.base_url", &graph.base_url)?;
            validation::validate_url("graph.login_url", &graph.login_url)?;
        }

        if let Some(airtable) = &self.airtable {
            validation::validate_secret("airtable.api_key", &airtable.api_key)?;
            validation::validate_non_empty_string("airtable.base_id", &airtable.base_id)?;
            validation::validate_url("airtable.base_url", &airtable.base_url)?;
        }

        validation::validate_path("output.path", &self.output.path)?;

        if self.campaigns.is_empty() {
            return Err(RelayError::ConfigValidationError {
                field: "campaigns".to_string(),
                message: "at least one [[campaigns]] entry is required".to_string(),
            });
        }
        validation::validate_unique("campaigns.name", self.campaigns.iter().map(|c| c.name.as_str()))?;

        for campaign in &self.campaigns {
            self.validate_campaign(campaign)?;
        }

        Ok(())
    }

    fn validate_campaign(&self, campaign: &CampaignConfig) -> Result<()> {
        let field = |name: &str| format!("campaigns[{}].{}", campaign.name, name);

        validation::validate_non_empty_string("campaigns.name", &campaign.name)?;
        validation::validate_non_empty_string(&field("template_id"), &campaign.template_id)?;
        validation::validate_non_empty_string(&field("phone_column"), &campaign.phone_column)?;
        validation::validate_non_empty_string(&field("country_code"), &campaign.country_code)?;

        for param in &campaign.params {
            validation::validate_non_empty_string(&field("params.column"), &param.column)?;
        }

        for custom_field in &campaign.custom_fields {
            validation::validate_positive_number(&field("custom_fields.field_id"), custom_field.field_id(), 1)?;
            validation::validate_non_empty_string(&field("custom_fields.column"), custom_field.column())?;
            if let CustomFieldSpec::PlanUrl { base_url, email, .. } = custom_field {
                validation::validate_url(&field("custom_fields.base_url"), base_url)?;
                validation::validate_non_empty_string(&field("custom_fields.email"), email)?;
            }
        }

        match &campaign.source {
            SourceConfig::Mailbox { sender, subject, .. } => {
                validation::validate_required_field(&field("source (mailbox needs [graph])"), &self.graph)?;
                validation::validate_non_empty_string(&field("source.sender"), sender)?;
                validation::validate_non_empty_string(&field("source.subject"), subject)?;
            }
            SourceConfig::Airtable { table, .. } => {
                validation::validate_required_field(&field("source (airtable needs [airtable])"), &self.airtable)?;
                validation::validate_non_empty_string(&field("source.table"), table)?;
            }
            SourceConfig::SharePoint { site_id, item_path } => {
                validation::validate_required_field(&field("source (sharepoint needs [graph])"), &self.graph)?;
                validation::validate_non_empty_string(&field("source.site_id"), site_id)?;
                validation::validate_file_extension(&field("source.item_path"), item_path, &["xlsx", "csv"])?;
            }
            SourceConfig::File { path } => {
                validation::validate_path(&field("source.path"), path)?;
                validation::validate_file_extension(&field("source.path"), path, &["xlsx", "csv"])?;
            }
        }

        if let Some(schedule) = &campaign.schedule {
            schedule.parse().map_err(|e| RelayError::ConfigValidationError {
                field: field("schedule"),
                message: e.to_string(),
            })?;
        }

        Ok(())
    }
}

impl Validate for RelayConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

fn default_true() -> bool {
    true
}

fn default_trengo_url() -> String {
    DEFAULT_TRENGO_URL.to_string()
}

fn default_graph_url() -> String {
    DEFAULT_GRAPH_URL.to_string()
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}

fn default_airtable_url() -> String {
    DEFAULT_AIRTABLE_URL.to_string()
}

fn default_output_path() -> String {
    "./relay-output".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::{PhoneFormat, ValueFormat};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_CONFIG: &str = r#"
[trengo]
api_key = "trengo-key"

[graph]
tenant_id = "tenant"
client_id = "client"
client_secret = "secret"
username = "planning@example.nl"
password = "hunter2"

[airtable]
api_key = "airtable-key"
base_id = "appBASE"

[output]
path = "./out"

[[campaigns]]
name = "prewonen-bevestiging"
template_id = "101"
dedupe_on = ["Naam bewoner", "Datum bezoek", "DP Nummer"]
schedule = { cron = "0 30 17 * * Mon-Fri" }

[campaigns.source]
type = "mailbox"
sender = "export@woningcorporatie.nl"
subject = "Planning bevestiging"

[[campaigns.params]]
column = "Naam bewoner"

[[campaigns.params]]
column = "Datum bezoek"
format = "date_short"

[[campaigns]]
name = "vesteda-herinnering-1h"
template_id = "202"
phone_format = "international"
schedule = { interval_minutes = 30 }

[campaigns.source]
type = "airtable"
table = "V1H"

[[campaigns.params]]
column = "Naam bewoner"

[[campaigns]]
name = "automatisch-plannen"
template_id = "303"
phone_format = "as_is"
enabled = false

[campaigns.source]
type = "file"
path = "planning.xlsx"

[[campaigns.params]]
column = "Naam bewoner"

[[campaigns.custom_fields]]
kind = "plan_url"
field_id = 618842
base_url = "https://fixzed.plannen.app/token/"
email = "planning@example.nl"
column = "Planregel"

[[campaigns.custom_fields]]
kind = "column"
field_id = 618194
column = "Werkbonnummer"

[campaigns.work_order]
column = "Werkbonnummer"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = RelayConfig::from_toml_str(FULL_CONFIG).unwrap();
        config.validate().unwrap();

        assert_eq!(config.trengo.base_url, DEFAULT_TRENGO_URL);
        assert_eq!(config.campaigns.len(), 3);
        assert_eq!(config.enabled_campaigns().count(), 2);

        let bevestiging = config.campaign("prewonen-bevestiging").unwrap();
        assert_eq!(bevestiging.source.kind(), "mailbox");
        assert_eq!(bevestiging.params[1].format, ValueFormat::DateShort);
        assert_eq!(bevestiging.phone_format, PhoneFormat::International);
        assert_eq!(bevestiging.name_column, "Naam bewoner");

        let airtable = config.campaign("vesteda-herinnering-1h").unwrap();
        assert!(matches!(
            airtable.source,
            SourceConfig::Airtable { delete_after_send: true, .. }
        ));

        let plannen = config.campaign("automatisch-plannen").unwrap();
        assert!(!plannen.enabled);
        assert_eq!(plannen.custom_fields[0].field_id(), 618842);
        assert!(matches!(
            &plannen.custom_fields[0],
            CustomFieldSpec::PlanUrl { location, .. } if location == "fixzed"
        ));
        assert_eq!(
            plannen.effective_required_columns(),
            vec!["Naam bewoner", "Mobielnummer", "Planregel", "Werkbonnummer"]
        );
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("RELAY_TEST_TRENGO_KEY", "from-env");

        let content = r#"
[trengo]
api_key = "${RELAY_TEST_TRENGO_KEY}"

[[campaigns]]
name = "feedback"
template_id = "${RELAY_TEST_UNSET_TEMPLATE}"

[campaigns.source]
type = "file"
path = "feedback.csv"
"#;

        let config = RelayConfig::from_toml_str(content).unwrap();
        assert_eq!(config.trengo.api_key, "from-env");
        assert_eq!(config.campaigns[0].template_id, "${RELAY_TEST_UNSET_TEMPLATE}");
        assert!(config.validate().is_err());

        std::env::remove_var("RELAY_TEST_TRENGO_KEY");
    }

    #[test]
    fn test_mailbox_campaign_requires_graph_section() {
        let content = r#"
[trengo]
api_key = "key"

[[campaigns]]
name = "feedback"
template_id = "1"

[campaigns.source]
type = "mailbox"
sender = "a@b.nl"
subject = "Feedback"
"#;
        let config = RelayConfig::from_toml_str(content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, RelayError::MissingConfigError { .. }));
    }

    #[test]
    fn test_duplicate_campaign_names_rejected() {
        let content = r#"
[trengo]
api_key = "key"

[[campaigns]]
name = "same"
template_id = "1"
source = { type = "file", path = "a.csv" }

[[campaigns]]
name = "same"
template_id = "2"
source = { type = "file", path = "b.csv" }
"#;
        let config = RelayConfig::from_toml_str(content).unwrap();
        assert!(config.validate().is_err());
        assert!(config.select_campaigns(Some("missing")).is_err());
        assert_eq!(config.select_campaigns(None).unwrap().len(), 2);
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(FULL_CONFIG.as_bytes()).unwrap();

        let config = RelayConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.output.path, "./out");
        assert!(config.output.write_reports);
    }
}
