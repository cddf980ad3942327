use httpmock::prelude::*;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use trengo_relay::config::TrengoConfig;
use trengo_relay::{RelayError, TrengoClient};

fn client(server: &MockServer) -> TrengoClient {
    TrengoClient::new(&TrengoConfig {
        api_key: "trengo-test-key".to_string(),
        base_url: server.url("/api/v2"),
        timeout_seconds: Some(5),
    })
    .unwrap()
}

#[tokio::test]
async fn test_list_custom_fields() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v2/custom_fields")
            .header("accept", "application/json")
            .header("authorization", "Bearer trengo-test-key");
        then.status(200).json_body(json!({
            "data": [
                {"id": 618842, "title": "Plan URL", "type": "TEXT", "is_required": false},
                {"id": 613776, "name": "Locatie", "type": "TEXT", "required": true},
                {"title": "broken entry without id"}
            ],
            "meta": {"total": 3}
        }));
    });

    let listing = client(&server).list_custom_fields().await.unwrap();
    mock.assert();

    assert_eq!(listing.fields.len(), 2);
    assert_eq!(listing.fields[0].id, 618842);
    assert_eq!(listing.fields[0].name.as_deref(), Some("Plan URL"));
    assert!(listing.fields[1].required);
    assert_eq!(listing.raw["meta"]["total"], 3);
}

#[tokio::test]
async fn test_count_tickets_prefers_meta_total() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v2/tickets");
        then.status(200).json_body(json!({
            "data": [{"id": 1}, {"id": 2}],
            "meta": {"total": 1284, "per_page": 2}
        }));
    });
    assert_eq!(client(&server).count_tickets().await.unwrap(), 1284);

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v2/tickets");
        then.status(200).json_body(json!({"data": [{"id": 1}, {"id": 2}, {"id": 3}]}));
    });
    assert_eq!(client(&server).count_tickets().await.unwrap(), 3);
}

#[tokio::test]
async fn test_merge_and_custom_field_calls() {
    let server = MockServer::start();
    let merge = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v2/tickets/merge")
            .json_body(json!({"source_ticket_id": 12, "target_ticket_id": 7}));
        then.status(200).json_body(json!({}));
    });
    let field = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v2/tickets/12/custom_fields")
            .json_body(json!({"custom_field_id": 618194, "value": "88001"}));
        then.status(200).json_body(json!({}));
    });

    let trengo = client(&server);
    assert_ok!(trengo.merge_tickets(12, 7).await);
    assert_ok!(trengo.set_custom_field(12, 618194, "88001").await);
    merge.assert();
    field.assert();
}

#[tokio::test]
async fn test_unauthorized_send_is_api_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v2/wa_sessions");
        then.status(401).json_body(json!({"message": "Unauthenticated."}));
    });

    let result = client(&server)
        .send_template("31612345678", "101", &["J. de Vries".to_string()])
        .await;
    let err = assert_err!(result);
    match err {
        RelayError::ApiError { endpoint, status, body } => {
            assert_eq!(endpoint, "/wa_sessions");
            assert_eq!(status, 401);
            assert!(body.contains("Unauthenticated"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_open_ticket_search_parses_ids() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v2/tickets")
            .query_param("status", "OPEN")
            .query_param("term", "88001");
        then.status(200)
            .json_body(json!({"data": [{"id": 10}, {"id": "11"}, {"subject": "no id"}]}));
    });

    let tickets = client(&server).find_open_tickets("88001").await.unwrap();
    assert_eq!(tickets, vec![10, 11]);
}
