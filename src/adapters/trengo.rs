use crate::adapters::http::{build_client, ensure_success, join_url};
use crate::config::TrengoConfig;
use crate::domain::model::TicketId;
use crate::utils::error::Result;
use reqwest::{header, Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Thin client for the Trengo REST API (v2).
pub struct TrengoClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Debug, Clone)]
pub struct TemplateSent {
    pub ticket_id: Option<TicketId>,
    pub response: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFieldInfo {
    pub id: u64,
    #[serde(alias = "title")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    #[serde(default, alias = "is_required")]
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct CustomFieldListing {
    pub fields: Vec<CustomFieldInfo>,
    pub raw: Value,
}

impl TrengoClient {
    pub fn new(config: &TrengoConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            base_url: config.base_url.clone(),
            api_key: SecretString::from(config.api_key.clone()),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, join_url(&self.base_url, path))
            .bearer_auth(self.api_key.expose_secret())
            .header(header::ACCEPT, "application/json")
    }

    /// Starts a WhatsApp conversation from an approved template (HSM).
    pub async fn send_template(
        &self,
        phone: &str,
        template_id: &str,
        params: &[String],
    ) -> Result<TemplateSent> {
        let payload = template_payload(phone, template_id, params);
        tracing::debug!("📤 POST /wa_sessions {}", payload);

        let response = self
            .request(Method::POST, "wa_sessions")
            .json(&payload)
            .send()
            .await?;
        let response = ensure_success("/wa_sessions", response).await?;
        let body: Value = response.json().await?;
        tracing::debug!("📥 Trengo response: {}", body);

        Ok(TemplateSent {
            ticket_id: ticket_id_from(&body),
            response: body,
        })
    }

    pub async fn set_custom_field(&self, ticket_id: TicketId, field_id: u64, value: &str) -> Result<()> {
        let path = format!("tickets/{}/custom_fields", ticket_id);
        let response = self
            .request(Method::POST, &path)
            .json(&json!({ "custom_field_id": field_id, "value": value }))
            .send()
            .await?;
        ensure_success(&format!("/{}", path), response).await?;
        Ok(())
    }

    /// Open tickets whose searchable content matches `term` (a work-order number).
    pub async fn find_open_tickets(&self, term: &str) -> Result<Vec<TicketId>> {
        let response = self
            .request(Method::GET, "tickets")
            .query(&[("status", "OPEN"), ("term", term)])
            .send()
            .await?;
        let response = ensure_success("/tickets", response).await?;
        let body: Value = response.json().await?;

        Ok(data_items(&body)
            .iter()
            .filter_map(|ticket| id_from(ticket.get("id")))
            .collect())
    }

    /// Folds `source` into `target`; `source` is closed by Trengo.
    pub async fn merge_tickets(&self, source: TicketId, target: TicketId) -> Result<()> {
        let response = self
            .request(Method::POST, "tickets/merge")
            .json(&json!({ "source_ticket_id": source, "target_ticket_id": target }))
            .send()
            .await?;
        ensure_success("/tickets/merge", response).await?;
        Ok(())
    }

    pub async fn list_custom_fields(&self) -> Result<CustomFieldListing> {
        let response = self.request(Method::GET, "custom_fields").send().await?;
        let response = ensure_success("/custom_fields", response).await?;
        let raw: Value = response.json().await?;

        let fields = data_items(&raw)
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect();
        Ok(CustomFieldListing { fields, raw })
    }

    /// Total ticket count, from pagination metadata when Trengo provides it.
    pub async fn count_tickets(&self) -> Result<u64> {
        let response = self.request(Method::GET, "tickets").send().await?;
        let response = ensure_success("/tickets", response).await?;
        let body: Value = response.json().await?;

        let total = body
            .pointer("/meta/total")
            .and_then(Value::as_u64)
            .unwrap_or(data_items(&body).len() as u64);
        Ok(total)
    }
}

pub fn template_payload(phone: &str, template_id: &str, params: &[String]) -> Value {
    let hsm_id = template_id
        .trim()
        .parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(template_id.to_string()));

    let params: Vec<Value> = params
        .iter()
        .enumerate()
        .map(|(i, value)| {
            json!({
                "type": "body",
                "key": format!("{{{{{}}}}}", i + 1),
                "value": value,
            })
        })
        .collect();

    json!({
        "recipient_phone_number": phone,
        "hsm_id": hsm_id,
        "params": params,
    })
}

fn ticket_id_from(body: &Value) -> Option<TicketId> {
    id_from(body.pointer("/message/ticket_id"))
}

fn id_from(value: Option<&Value>) -> Option<TicketId> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn data_items(body: &Value) -> &[Value] {
    body.get("data")
        .and_then(Value::as_array)
        .or_else(|| body.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
}
