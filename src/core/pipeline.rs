use crate::adapters::trengo::TrengoClient;
use crate::config::{CampaignConfig, CustomFieldSpec};
use crate::core::{Pipeline, RowSource};
use crate::domain::model::{
    Delivery, DeliveryOutcome, DeliveryReport, Dispatch, DispatchBatch, Extracted, MergeAction,
    Record, SkippedRow, TicketId,
};
use crate::domain::services::{
    cell_text, dedupe, duplicates_removed, format_phone, format_value, plan_url, Unique,
};
use crate::utils::error::{RelayError, Result};
use chrono::Utc;
use serde_json::Value;

/// One campaign: rows from its source, formatted into template messages, sent through Trengo.
pub struct CampaignPipeline {
    campaign: CampaignConfig,
    source: Box<dyn RowSource>,
    trengo: TrengoClient,
    dry_run: bool,
}

impl CampaignPipeline {
    pub fn new(campaign: CampaignConfig, source: Box<dyn RowSource>, trengo: TrengoClient) -> Self {
        Self {
            campaign,
            source,
            trengo,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn campaign(&self) -> &CampaignConfig {
        &self.campaign
    }

    fn check_columns(&self, columns: &[String]) -> Result<()> {
        let missing: Vec<String> = self
            .campaign
            .effective_required_columns()
            .into_iter()
            .filter(|required| !columns.iter().any(|c| c == required))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RelayError::validation(format!(
                "missing column(s) {}; available: {}",
                missing.join(", "),
                columns.join(", ")
            )))
        }
    }

    /// Formats one row, or explains why it cannot be sent.
    pub fn build_dispatch(&self, record: Record) -> std::result::Result<Dispatch, SkippedRow> {
        let campaign = &self.campaign;
        let null = Value::Null;
        let column = |name: &str| record.get(name).unwrap_or(&null);

        let recipient_name = cell_text(column(&campaign.name_column));
        let Some(phone) = format_phone(column(&campaign.phone_column), campaign.phone_format, &campaign.country_code)
        else {
            return Err(SkippedRow {
                row: record.index,
                recipient_name,
                reason: format!("no usable phone number in '{}'", campaign.phone_column),
            });
        };

        let params = campaign
            .params
            .iter()
            .map(|spec| format_value(column(&spec.column), spec.format))
            .collect();

        let mut custom_fields = Vec::new();
        for spec in &campaign.custom_fields {
            let value = match spec {
                CustomFieldSpec::Column { column: name, format, .. } => format_value(column(name), *format),
                CustomFieldSpec::PlanUrl {
                    base_url,
                    location,
                    email,
                    column: name,
                    ..
                } => {
                    let planregel = cell_text(column(name));
                    if planregel.is_empty() {
                        String::new()
                    } else {
                        plan_url(base_url, location, email, &planregel)
                    }
                }
            };
            if value.is_empty() {
                tracing::debug!("Row {}: custom field {} has no value", record.index, spec.field_id());
                continue;
            }
            custom_fields.push((spec.field_id(), value));
        }

        let work_order = campaign
            .work_order
            .as_ref()
            .map(|wo| cell_text(column(&wo.column)))
            .filter(|value| !value.is_empty());

        Ok(Dispatch {
            row: record.index,
            recipient_name,
            phone,
            params,
            custom_fields,
            work_order,
            record,
            duplicates: Vec::new(),
        })
    }

    /// Sends one dispatch and runs the follow-up steps. Only the send itself can fail the row.
    async fn deliver(&self, dispatch: &Dispatch, merges: &mut Vec<MergeAction>) -> Delivery {
        let sent = match self
            .trengo
            .send_template(&dispatch.phone, &self.campaign.template_id, &dispatch.params)
            .await
        {
            Ok(sent) => sent,
            Err(e) => {
                tracing::error!("❌ Row {} ({}): send failed: {}", dispatch.row, dispatch.recipient_name, e);
                return Delivery::new(
                    dispatch.row,
                    &dispatch.recipient_name,
                    Some(&dispatch.phone),
                    DeliveryOutcome::Failed {
                        ticket_id: None,
                        error: e.to_string(),
                    },
                );
            }
        };

        tracing::info!(
            "✅ Row {}: sent to {} ({}), ticket {:?}",
            dispatch.row,
            dispatch.recipient_name,
            dispatch.phone,
            sent.ticket_id
        );
        let mut delivery = Delivery::new(
            dispatch.row,
            &dispatch.recipient_name,
            Some(&dispatch.phone),
            DeliveryOutcome::Sent {
                ticket_id: sent.ticket_id,
            },
        );

        match sent.ticket_id {
            Some(ticket_id) => {
                self.apply_custom_fields(ticket_id, dispatch, &mut delivery).await;
                self.merge_work_order(ticket_id, dispatch, &mut delivery, merges).await;
            }
            None if !dispatch.custom_fields.is_empty() || dispatch.work_order.is_some() => {
                let warning = "Trengo returned no ticket id; custom fields and merge skipped".to_string();
                tracing::warn!("⚠️ Row {}: {}", dispatch.row, warning);
                delivery.warnings.push(warning);
            }
            None => {}
        }

        for record in std::iter::once(&dispatch.record).chain(&dispatch.duplicates) {
            if let Err(e) = self.source.acknowledge(record).await {
                let warning = format!("acknowledging source row {} failed: {}", record.index, e);
                tracing::warn!("⚠️ Row {}: {}", dispatch.row, warning);
                delivery.warnings.push(warning);
            }
        }

        delivery
    }

    async fn apply_custom_fields(&self, ticket_id: TicketId, dispatch: &Dispatch, delivery: &mut Delivery) {
        for (field_id, value) in &dispatch.custom_fields {
            match self.trengo.set_custom_field(ticket_id, *field_id, value).await {
                Ok(()) => tracing::debug!("🏷️ Ticket {}: field {} = {}", ticket_id, field_id, value),
                Err(e) => {
                    let warning = format!("custom field {} not set: {}", field_id, e);
                    tracing::warn!("⚠️ Ticket {}: {}", ticket_id, warning);
                    delivery.warnings.push(warning);
                }
            }
        }
    }

    /// Merges the new ticket into the single other open ticket for the same work order.
    async fn merge_work_order(
        &self,
        ticket_id: TicketId,
        dispatch: &Dispatch,
        delivery: &mut Delivery,
        merges: &mut Vec<MergeAction>,
    ) {
        let enabled = self
            .campaign
            .work_order
            .as_ref()
            .map(|wo| wo.merge_open_tickets)
            .unwrap_or(false);
        let Some(work_order) = dispatch.work_order.as_deref().filter(|_| enabled) else {
            return;
        };

        let others: Vec<TicketId> = match self.trengo.find_open_tickets(work_order).await {
            Ok(tickets) => tickets.into_iter().filter(|t| *t != ticket_id).collect(),
            Err(e) => {
                let warning = format!("open ticket search for work order {} failed: {}", work_order, e);
                tracing::warn!("⚠️ {}", warning);
                delivery.warnings.push(warning);
                return;
            }
        };

        match others.as_slice() {
            [] => tracing::debug!("No other open ticket for work order {}", work_order),
            [target] => match self.trengo.merge_tickets(ticket_id, *target).await {
                Ok(()) => {
                    tracing::info!("🔗 Merged ticket {} into {} (work order {})", ticket_id, target, work_order);
                    merges.push(MergeAction {
                        work_order: work_order.to_string(),
                        source_ticket: ticket_id,
                        target_ticket: *target,
                    });
                }
                Err(e) => {
                    let warning = format!("merge into ticket {} failed: {}", target, e);
                    tracing::warn!("⚠️ {}", warning);
                    delivery.warnings.push(warning);
                }
            },
            many => {
                let warning = format!(
                    "work order {} matches {} open tickets ({:?}); not merging",
                    work_order,
                    many.len(),
                    many
                );
                tracing::warn!("⚠️ {}", warning);
                delivery.warnings.push(warning);
            }
        }
    }
}

#[async_trait::async_trait]
impl Pipeline for CampaignPipeline {
    fn name(&self) -> &str {
        &self.campaign.name
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }

    async fn extract(&self) -> Result<Option<Extracted>> {
        tracing::debug!("Polling {}", self.source.describe());
        self.source.fetch().await
    }

    async fn transform(&self, data: Extracted) -> Result<DispatchBatch> {
        if self.campaign.source.is_tabular() {
            if let Some(columns) = &data.columns {
                self.check_columns(columns)?;
            }
        }

        let unique = dedupe(data.records, &self.campaign.dedupe_on);
        let removed = duplicates_removed(&unique);
        if removed > 0 {
            tracing::info!("🧹 Removed {} duplicate row(s)", removed);
        }

        let mut batch = DispatchBatch {
            origin: Some(data.origin),
            duplicates_removed: removed,
            ..DispatchBatch::default()
        };
        for Unique { record, duplicates } in unique {
            match self.build_dispatch(record) {
                Ok(dispatch) => batch.dispatches.push(Dispatch { duplicates, ..dispatch }),
                Err(skipped) => {
                    tracing::warn!("⏭️ Row {} ({}): {}", skipped.row, skipped.recipient_name, skipped.reason);
                    batch.skipped.push(skipped);
                }
            }
        }

        Ok(batch)
    }

    async fn load(&self, batch: DispatchBatch) -> Result<DeliveryReport> {
        if !self.dry_run {
            if let Some(origin) = &batch.origin {
                self.source.commit(origin).await?;
            }
        }

        let mut report = DeliveryReport::empty(&self.campaign.name, self.dry_run);
        report.origin = batch.origin;
        report.duplicates_removed = batch.duplicates_removed;

        for skipped in batch.skipped {
            report.deliveries.push(Delivery::new(
                skipped.row,
                &skipped.recipient_name,
                None,
                DeliveryOutcome::Skipped { reason: skipped.reason },
            ));
        }

        for dispatch in &batch.dispatches {
            if self.dry_run {
                tracing::info!(
                    "🧪 [dry-run] Row {}: template {} to {} ({}) params {:?} fields {:?}",
                    dispatch.row,
                    self.campaign.template_id,
                    dispatch.recipient_name,
                    dispatch.phone,
                    dispatch.params,
                    dispatch.custom_fields
                );
                report.deliveries.push(Delivery::new(
                    dispatch.row,
                    &dispatch.recipient_name,
                    Some(&dispatch.phone),
                    DeliveryOutcome::DryRun,
                ));
                continue;
            }

            let delivery = self.deliver(dispatch, &mut report.merges).await;
            report.deliveries.push(delivery);
        }

        report.deliveries.sort_by_key(|d| d.row);
        report.finished_at = Utc::now();
        Ok(report)
    }
}
