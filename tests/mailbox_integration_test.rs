use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use serde_json::json;
use tempfile::TempDir;
use trengo_relay::utils::error::ErrorCategory;
use trengo_relay::utils::validation::Validate;
use trengo_relay::{CampaignRunner, RelayConfig};

const ATTACHMENT_CSV: &str = "\
Naam bewoner,Mobielnummer,Datum bezoek
J. de Vries,0612345678,2025-03-03
";

fn relay_config(server: &MockServer, dir: &TempDir) -> RelayConfig {
    let content = format!(
        r#"
[trengo]
api_key = "trengo-test-key"
base_url = '{trengo}'

[graph]
tenant_id = "tenant"
client_id = "client"
client_secret = "secret"
username = "planning@example.nl"
password = "hunter2"
base_url = '{graph}'
login_url = '{login}'

[output]
path = '{output}'
archive_attachments = true

[[campaigns]]
name = "herinnering"
template_id = "202"

[campaigns.source]
type = "mailbox"
sender = "export@woningcorporatie.nl"
subject = "Planning herinnering"
attachment_extension = "csv"

[[campaigns.params]]
column = "Naam bewoner"

[[campaigns.params]]
column = "Datum bezoek"
format = "date_short"
"#,
        trengo = server.url("/api/v2"),
        graph = server.url("/v1.0"),
        login = server.base_url(),
        output = dir.path().to_string_lossy(),
    );
    let config = RelayConfig::from_toml_str(&content).unwrap();
    config.validate().unwrap();
    config
}

fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/tenant/oauth2/v2.0/token")
            .body_contains("grant_type=password")
            .body_contains("username=planning%40example.nl");
        then.status(200)
            .json_body(json!({"access_token": "graph-token", "token_type": "Bearer"}));
    })
}

fn mock_probe(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET)
            .path("/v1.0/me/messages")
            .query_param("$top", "1")
            .header("authorization", "Bearer graph-token");
        then.status(200).json_body(json!({"value": []}));
    })
}

fn mock_search(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET)
            .path("/v1.0/me/messages")
            .query_param(
                "$filter",
                "from/emailAddress/address eq 'export@woningcorporatie.nl' and subject eq 'Planning herinnering' and isRead eq false",
            )
            .query_param("$select", "id,subject,hasAttachments");
        then.status(200).json_body(json!({
            "value": [
                {"id": "MSG0", "subject": "Planning herinnering", "hasAttachments": false},
                {"id": "MSG1", "subject": "Planning herinnering", "hasAttachments": true}
            ]
        }));
    })
}

fn mock_attachments(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/v1.0/me/messages/MSG1/attachments");
        then.status(200).json_body(json!({
            "value": [
                {"name": "toelichting.txt", "contentBytes": STANDARD.encode("zie bijlage")},
                {"name": "Planning.CSV", "contentBytes": STANDARD.encode(ATTACHMENT_CSV)}
            ]
        }));
    })
}

fn mock_mark_read(server: &MockServer, status: u16) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(PATCH)
            .path("/v1.0/me/messages/MSG1")
            .json_body(json!({"isRead": true}));
        then.status(status).body("");
    })
}

fn mock_send(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/v2/wa_sessions")
            .json_body(json!({
                "recipient_phone_number": "31612345678",
                "hsm_id": 202,
                "params": [
                    {"type": "body", "key": "{{1}}", "value": "J. de Vries"},
                    {"type": "body", "key": "{{2}}", "value": "3 mrt 25"}
                ]
            }));
        then.status(200).json_body(json!({"message": {"ticket_id": 9001}}));
    })
}

#[tokio::test]
async fn test_mailbox_attachment_is_sent_once() -> Result<()> {
    let dir = TempDir::new()?;
    let server = MockServer::start();

    let token = mock_token(&server);
    let probe = mock_probe(&server);
    let search = mock_search(&server);
    let attachments = mock_attachments(&server);
    // Marking read fails; the ledger must still prevent a second send.
    let mark_read = mock_mark_read(&server, 503);
    let send = mock_send(&server);

    let config = relay_config(&server, &dir);
    let campaign = config.campaign("herinnering").unwrap().clone();
    let runner = CampaignRunner::new(config);

    let first = runner.run_campaign(&campaign).await?;
    assert_eq!(first.report.sent_count(), 1);
    assert!(first.report_path.is_some());

    let second = runner.run_campaign(&campaign).await?;
    assert!(second.report.is_empty());
    assert!(second.report_path.is_none());

    // Committing the first batch requests its own token.
    token.assert_hits(3);
    probe.assert_hits(2);
    search.assert_hits(2);
    attachments.assert_hits(1);
    mark_read.assert_hits(2);
    send.assert_hits(1);

    let downloads: Vec<_> = std::fs::read_dir(dir.path().join("downloads"))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(downloads.len(), 1);
    assert!(downloads[0].ends_with("_Planning.CSV"));
    assert!(dir.path().join("state/herinnering_processed.json").exists());

    Ok(())
}

#[tokio::test]
async fn test_dry_run_leaves_the_mail_unread() -> Result<()> {
    let dir = TempDir::new()?;
    let server = MockServer::start();

    mock_token(&server);
    mock_probe(&server);
    mock_search(&server);
    mock_attachments(&server);
    let mark_read = mock_mark_read(&server, 200);
    let send = mock_send(&server);

    let config = relay_config(&server, &dir);
    let campaign = config.campaign("herinnering").unwrap().clone();

    let rehearsal = CampaignRunner::new(config.clone())
        .with_dry_run(true)
        .run_campaign(&campaign)
        .await?;
    assert!(rehearsal.report.dry_run);
    assert_eq!(rehearsal.report.deliveries.len(), 1);
    mark_read.assert_hits(0);
    send.assert_hits(0);
    assert!(!dir.path().join("state/herinnering_processed.json").exists());

    // The message is still there for the real run.
    let real = CampaignRunner::new(config).run_campaign(&campaign).await?;
    assert_eq!(real.report.sent_count(), 1);
    mark_read.assert_hits(1);
    send.assert_hits(1);
    assert!(dir.path().join("state/herinnering_processed.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_no_unread_mail_is_a_quiet_run() -> Result<()> {
    let dir = TempDir::new()?;
    let server = MockServer::start();

    mock_token(&server);
    mock_probe(&server);
    server.mock(|when, then| {
        when.method(GET)
            .path("/v1.0/me/messages")
            .query_param("$select", "id,subject,hasAttachments");
        then.status(200).json_body(json!({"value": []}));
    });
    let send = server.mock(|when, then| {
        when.method(POST).path("/api/v2/wa_sessions");
        then.status(200).json_body(json!({}));
    });

    let config = relay_config(&server, &dir);
    let campaign = config.campaign("herinnering").unwrap().clone();
    let outcome = CampaignRunner::new(config).run_campaign(&campaign).await?;

    assert!(outcome.report.is_empty());
    assert!(outcome.report_path.is_none());
    send.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_rejected_credentials_fail_the_campaign() -> Result<()> {
    let dir = TempDir::new()?;
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path("/tenant/oauth2/v2.0/token");
        then.status(400).json_body(json!({
            "error": "invalid_grant",
            "error_description": "AADSTS50126: Error validating credentials"
        }));
    });

    let config = relay_config(&server, &dir);
    let campaign = config.campaign("herinnering").unwrap().clone();
    let err = CampaignRunner::new(config)
        .run_campaign(&campaign)
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Authentication);
    assert_eq!(err.severity().exit_code(), 1);
    Ok(())
}
