use anyhow::{Context, Result};
use std::time::Duration;

/// Validate that a resolved endpoint URL uses HTTPS.
///
/// Every source that allows endpoint overrides calls this before sending
/// credentials. Plain HTTP is accepted only for loopback hosts.
pub fn validate_endpoint(url: &str, provider_name: &str) -> Result<()> {
    if url.starts_with("https://") {
        return Ok(());
    }
    if let Some(rest) = url.strip_prefix("http://") {
        let host = rest.split(['/', ':']).next().unwrap_or_default();
        if host == "127.0.0.1" || host == "localhost" {
            return Ok(());
        }
    }
    anyhow::bail!(
        "{}: endpoint must use HTTPS, got: {}",
        provider_name,
        url
    );
}

/// HTTP client with the configured request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Turn auth failures and other non-2xx responses into errors.
pub async fn ensure_success(
    response: reqwest::Response,
    provider_name: &str,
    credential_hint: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        anyhow::bail!(
            "{}: unauthorized (HTTP {}) - check {}",
            provider_name,
            status.as_u16(),
            credential_hint
        );
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("{}: not found (HTTP 404) - check the account or project id: {}", provider_name, body);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("{}: HTTP {}: {}", provider_name, status.as_u16(), body);
    }
    Ok(response)
}
