use crate::adapters::http::{build_client, ensure_success, join_url};
use crate::adapters::ledger::ProcessedLedger;
use crate::adapters::spreadsheet::{parse_sheet, SheetFormat};
use crate::config::GraphConfig;
use crate::domain::model::{Extracted, Origin};
use crate::domain::ports::{RowSource, Storage};
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

const MAIL_SCOPES: &[&str] = &["Mail.Read", "Mail.ReadWrite", "User.Read"];
const FILE_SCOPES: &[&str] = &["Files.Read.All", "Sites.Read.All", "User.Read"];
const SCOPE_PREFIX: &str = "https://graph.microsoft.com/";

/// Microsoft Graph access with a delegated (resource owner password) token.
pub struct GraphClient {
    client: Client,
    base_url: String,
    login_url: String,
    tenant_id: String,
    client_id: String,
    client_secret: SecretString,
    username: String,
    password: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailMessage {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(rename = "hasAttachments", default)]
    pub has_attachments: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailAttachment {
    pub name: String,
    #[serde(rename = "contentBytes")]
    pub content_bytes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl GraphClient {
    pub fn new(config: &GraphConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            base_url: config.base_url.clone(),
            login_url: config.login_url.clone(),
            tenant_id: config.tenant_id.clone(),
            client_id: config.client_id.clone(),
            client_secret: SecretString::from(config.client_secret.clone()),
            username: config.username.clone(),
            password: SecretString::from(config.password.clone()),
        })
    }

    pub async fn access_token(&self, scopes: &[&str]) -> Result<SecretString> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_url.trim_end_matches('/'),
            self.tenant_id
        );
        let scope = scopes
            .iter()
            .map(|s| format!("{}{}", SCOPE_PREFIX, s))
            .collect::<Vec<_>>()
            .join(" ");

        tracing::debug!("🔐 Requesting Graph token for {}", self.username);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("username", self.username.as_str()),
                ("password", self.password.expose_secret()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: TokenResponse = response.json().await.map_err(|e| RelayError::AuthError {
            message: format!("token endpoint returned {} with unreadable body: {}", status, e),
        })?;

        match body.access_token {
            Some(token) if status.is_success() => Ok(SecretString::from(token)),
            _ => Err(RelayError::AuthError {
                message: format!(
                    "{}: {}",
                    body.error.unwrap_or_else(|| status.to_string()),
                    body.error_description.unwrap_or_default()
                ),
            }),
        }
    }

    fn request(&self, method: Method, path: &str, token: &SecretString) -> RequestBuilder {
        self.client
            .request(method, join_url(&self.base_url, path))
            .bearer_auth(token.expose_secret())
    }

    /// Cheap call that fails fast when the token lacks mailbox permissions.
    pub async fn verify_mail_access(&self, token: &SecretString) -> Result<()> {
        let response = self
            .request(Method::GET, "me/messages", token)
            .query(&[("$top", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::AuthError {
                message: format!("mailbox permission check failed ({}): {}", status, body),
            });
        }
        tracing::debug!("✅ Mailbox permissions verified");
        Ok(())
    }

    pub async fn unread_messages(
        &self,
        token: &SecretString,
        sender: &str,
        subject: &str,
    ) -> Result<Vec<MailMessage>> {
        let filter = format!(
            "from/emailAddress/address eq '{}' and subject eq '{}' and isRead eq false",
            odata_quote(sender),
            odata_quote(subject)
        );
        let response = self
            .request(Method::GET, "me/messages", token)
            .query(&[
                ("$filter", filter.as_str()),
                ("$select", "id,subject,hasAttachments"),
            ])
            .send()
            .await?;
        let response = ensure_success("/me/messages", response).await?;
        let messages: Collection<MailMessage> = response.json().await?;
        Ok(messages.value)
    }

    pub async fn message_attachments(
        &self,
        token: &SecretString,
        message_id: &str,
    ) -> Result<Vec<MailAttachment>> {
        let path = format!("me/messages/{}/attachments", message_id);
        let response = self.request(Method::GET, &path, token).send().await?;
        let response = ensure_success(&format!("/{}", path), response).await?;
        let attachments: Collection<MailAttachment> = response.json().await?;
        Ok(attachments.value)
    }

    pub async fn mark_read(&self, token: &SecretString, message_id: &str) -> Result<()> {
        let path = format!("me/messages/{}", message_id);
        let response = self
            .request(Method::PATCH, &path, token)
            .json(&json!({ "isRead": true }))
            .send()
            .await?;
        ensure_success(&format!("/{}", path), response).await?;
        Ok(())
    }

    pub async fn download_drive_item(
        &self,
        token: &SecretString,
        site_id: &str,
        item_path: &str,
    ) -> Result<Vec<u8>> {
        let path = format!(
            "sites/{}/drive/root:/{}:/content",
            site_id,
            item_path.trim_start_matches('/')
        );
        let response = self.request(Method::GET, &path, token).send().await?;
        let response = ensure_success(&format!("/{}", path), response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

fn odata_quote(value: &str) -> String {
    value.replace('\'', "''")
}

/// Spreadsheet attachments from unread mail of one sender/subject pair.
pub struct MailboxSource<S: Storage> {
    graph: GraphClient,
    campaign: String,
    sender: String,
    subject: String,
    extension: String,
    storage: S,
    archive_attachments: bool,
}

impl<S: Storage> MailboxSource<S> {
    pub fn new(
        graph: GraphClient,
        campaign: &str,
        sender: &str,
        subject: &str,
        extension: &str,
        storage: S,
    ) -> Self {
        Self {
            graph,
            campaign: campaign.to_string(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
            storage,
            archive_attachments: false,
        }
    }

    pub fn with_archive(mut self, enabled: bool) -> Self {
        self.archive_attachments = enabled;
        self
    }

    fn wanted(&self, attachment: &MailAttachment) -> bool {
        attachment
            .name
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", self.extension))
            && attachment.content_bytes.is_some()
    }

    async fn mark_read_or_warn(&self, token: &SecretString, message_id: &str) {
        if let Err(e) = self.graph.mark_read(token, message_id).await {
            tracing::warn!("⚠️ Could not mark message {} as read: {}", message_id, e);
        }
    }
}

#[async_trait]
impl<S: Storage + 'static> RowSource for MailboxSource<S> {
    fn describe(&self) -> String {
        format!("mailbox ({} / '{}')", self.sender, self.subject)
    }

    async fn fetch(&self) -> Result<Option<Extracted>> {
        let token = self.graph.access_token(MAIL_SCOPES).await?;
        self.graph.verify_mail_access(&token).await?;

        let messages = self
            .graph
            .unread_messages(&token, &self.sender, &self.subject)
            .await?;
        if messages.is_empty() {
            tracing::info!("📭 No unread messages from {} with subject '{}'", self.sender, self.subject);
            return Ok(None);
        }
        tracing::info!("📬 Found {} unread message(s)", messages.len());

        let ledger_path = ProcessedLedger::path_for(&self.campaign);
        let ledger = ProcessedLedger::load(&self.storage, &ledger_path).await?;

        for message in messages {
            if ledger.contains(&message.id) {
                tracing::warn!("⏭️ Message {} was already processed, marking read again", message.id);
                self.mark_read_or_warn(&token, &message.id).await;
                continue;
            }
            if !message.has_attachments {
                tracing::debug!("Message {} has no attachments", message.id);
                continue;
            }

            let attachments = match self.graph.message_attachments(&token, &message.id).await {
                Ok(attachments) => attachments,
                Err(e) => {
                    tracing::warn!("⚠️ Could not fetch attachments of {}: {}", message.id, e);
                    continue;
                }
            };

            let Some(attachment) = attachments.into_iter().find(|a| self.wanted(a)) else {
                tracing::debug!("Message {} has no .{} attachment", message.id, self.extension);
                continue;
            };
            let encoded = attachment.content_bytes.as_deref().unwrap_or_default();
            let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
            tracing::info!("📎 Downloaded '{}' ({} bytes)", attachment.name, bytes.len());

            if self.archive_attachments {
                let archived = format!(
                    "downloads/{}_{}",
                    chrono::Local::now().format("%Y%m%d_%H%M%S"),
                    attachment.name
                );
                self.storage.write_file(&archived, &bytes).await?;
                tracing::debug!("💾 Archived attachment to {}", archived);
            }

            let format = SheetFormat::from_name(&attachment.name).unwrap_or(SheetFormat::Xlsx);
            let table = parse_sheet(&bytes, format)?;
            return Ok(Some(Extracted {
                origin: Origin::MailAttachment {
                    message_id: message.id,
                    attachment: attachment.name,
                },
                columns: Some(table.columns),
                records: table.records,
            }));
        }

        tracing::info!("📭 No unprocessed .{} attachment found", self.extension);
        Ok(None)
    }

    async fn commit(&self, origin: &Origin) -> Result<()> {
        let Origin::MailAttachment { message_id, .. } = origin else {
            return Ok(());
        };

        let ledger_path = ProcessedLedger::path_for(&self.campaign);
        let mut ledger = ProcessedLedger::load(&self.storage, &ledger_path).await?;
        ledger.record(message_id);
        ledger.save(&self.storage).await?;

        match self.graph.access_token(MAIL_SCOPES).await {
            Ok(token) => self.mark_read_or_warn(&token, message_id).await,
            Err(e) => tracing::warn!("⚠️ Could not mark message {} as read: {}", message_id, e),
        }
        Ok(())
    }
}

/// One workbook stored in a SharePoint document library.
pub struct SharePointSource {
    graph: GraphClient,
    site_id: String,
    item_path: String,
}

impl SharePointSource {
    pub fn new(graph: GraphClient, site_id: &str, item_path: &str) -> Self {
        Self {
            graph,
            site_id: site_id.to_string(),
            item_path: item_path.to_string(),
        }
    }
}

#[async_trait]
impl RowSource for SharePointSource {
    fn describe(&self) -> String {
        format!("sharepoint ({})", self.item_path)
    }

    async fn fetch(&self) -> Result<Option<Extracted>> {
        let token = self.graph.access_token(FILE_SCOPES).await?;
        let bytes = self
            .graph
            .download_drive_item(&token, &self.site_id, &self.item_path)
            .await?;
        tracing::info!("📥 Downloaded SharePoint item '{}' ({} bytes)", self.item_path, bytes.len());

        let format = SheetFormat::from_name(&self.item_path).unwrap_or(SheetFormat::Xlsx);
        let table = parse_sheet(&bytes, format)?;
        Ok(Some(Extracted {
            origin: Origin::SharePointItem {
                item_path: self.item_path.clone(),
            },
            columns: Some(table.columns),
            records: table.records,
        }))
    }
}
