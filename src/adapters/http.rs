use crate::utils::error::{RelayError, Result};
use reqwest::{Client, Response};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

pub fn build_client(timeout_seconds: Option<u64>) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(
            timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        ))
        .user_agent(concat!("trengo-relay/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Turns a non-2xx response into `RelayError::ApiError` carrying the body text.
pub async fn ensure_success(endpoint: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!("❌ {} returned {}: {}", endpoint, status, body);
    Err(RelayError::ApiError {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}

pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://app.trengo.com/api/v2/", "/wa_sessions"),
            "https://app.trengo.com/api/v2/wa_sessions"
        );
        assert_eq!(join_url("http://127.0.0.1:9000", "tickets/1"), "http://127.0.0.1:9000/tickets/1");
    }
}
