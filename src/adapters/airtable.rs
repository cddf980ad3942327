use crate::adapters::http::{build_client, ensure_success, join_url};
use crate::config::AirtableConfig;
use crate::domain::model::{Extracted, Origin, Record};
use crate::domain::ports::RowSource;
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;

/// Rows of one Airtable table. Each sent row is deleted so it is not picked up again.
pub struct AirtableSource {
    client: Client,
    base_url: String,
    base_id: String,
    api_key: SecretString,
    table: String,
    view: Option<String>,
    delete_after_send: bool,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<AirtableRecord>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AirtableRecord {
    id: String,
    #[serde(default)]
    fields: HashMap<String, serde_json::Value>,
}

impl AirtableSource {
    pub fn new(config: &AirtableConfig, table: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            base_url: config.base_url.clone(),
            base_id: config.base_id.clone(),
            api_key: SecretString::from(config.api_key.clone()),
            table: table.to_string(),
            view: None,
            delete_after_send: true,
        })
    }

    pub fn with_view(mut self, view: Option<String>) -> Self {
        self.view = view;
        self
    }

    pub fn with_delete_after_send(mut self, delete: bool) -> Self {
        self.delete_after_send = delete;
        self
    }

    fn table_path(&self) -> String {
        format!("{}/{}", self.base_id, self.table)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, join_url(&self.base_url, path))
            .bearer_auth(self.api_key.expose_secret())
    }

    async fn list_page(&self, offset: Option<&str>) -> Result<ListResponse> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(view) = self.view.as_deref() {
            query.push(("view", view));
        }
        if let Some(offset) = offset {
            query.push(("offset", offset));
        }

        let path = self.table_path();
        let response = self.request(Method::GET, &path).query(&query).send().await?;
        let response = ensure_success(&format!("/{}", path), response).await?;
        Ok(response.json().await?)
    }

    pub async fn delete_record(&self, record_id: &str) -> Result<()> {
        let path = format!("{}/{}", self.table_path(), record_id);
        let response = self.request(Method::DELETE, &path).send().await?;
        ensure_success(&format!("/{}", path), response).await?;
        tracing::info!("🗑️ Deleted Airtable record {}", record_id);
        Ok(())
    }
}

#[async_trait]
impl RowSource for AirtableSource {
    fn describe(&self) -> String {
        format!("airtable ({})", self.table)
    }

    async fn fetch(&self) -> Result<Option<Extracted>> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page = self.list_page(offset.as_deref()).await?;
            for item in page.records {
                let mut record = Record::new(records.len() + 1).with_id(item.id);
                record.data = item.fields;
                records.push(record);
            }
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        if records.is_empty() {
            tracing::info!("📭 Airtable table '{}' has no records", self.table);
            return Ok(None);
        }
        tracing::info!("📥 Fetched {} record(s) from Airtable table '{}'", records.len(), self.table);

        Ok(Some(Extracted {
            origin: Origin::AirtableTable {
                table: self.table.clone(),
            },
            columns: None,
            records,
        }))
    }

    async fn acknowledge(&self, record: &Record) -> Result<()> {
        if !self.delete_after_send {
            return Ok(());
        }
        match record.id.as_deref() {
            Some(id) => self.delete_record(id).await,
            None => Err(RelayError::processing(format!(
                "row {} has no Airtable record id",
                record.index
            ))),
        }
    }
}
