//! Response helpers shared by the HTTP adapters.

use std::time::Duration;

use modelforge_core::provider::Provider;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::ProviderError;

/// Build the client every adapter uses; one per adapter so connections pool.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Ensure the response has a success status code. A 402 becomes
/// [`ProviderError::QuotaExceeded`]; any other failure carries the status and
/// body text.
pub(crate) async fn ensure_success(
    provider: Provider,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    if status == StatusCode::PAYMENT_REQUIRED {
        return Err(ProviderError::QuotaExceeded { provider, body });
    }
    Err(ProviderError::Api {
        provider,
        status: status.as_u16(),
        body,
    })
}

/// Parse a successful response body as untyped JSON.
pub(crate) async fn parse_json(
    provider: Provider,
    response: reqwest::Response,
) -> Result<Value, ProviderError> {
    let response = ensure_success(provider, response).await?;
    Ok(response.json::<Value>().await?)
}

/// Read a task identifier that may arrive as a string or a number.
pub(crate) fn id_from(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Join a base URL and a path without doubling the slash.
pub(crate) fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn id_accepts_strings_and_numbers() {
        assert_eq!(id_from(Some(&json!("abc"))), Some("abc".into()));
        assert_eq!(id_from(Some(&json!(42))), Some("42".into()));
        assert_eq!(id_from(Some(&json!(""))), None);
        assert_eq!(id_from(Some(&json!(null))), None);
        assert_eq!(id_from(None), None);
    }

    #[test]
    fn join_trims_slashes() {
        assert_eq!(join("http://h/", "/tasks"), "http://h/tasks");
        assert_eq!(join("http://h", "tasks/1"), "http://h/tasks/1");
    }
}
