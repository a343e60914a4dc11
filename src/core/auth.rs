use anyhow::{Context, Result};
use std::time::Duration;

use crate::core::process::{require_binary, run_command};

const GCLOUD_TIMEOUT: Duration = Duration::from_secs(20);

/// Environment variable holding a pre-minted OAuth access token for Google APIs.
pub const ENV_GCP_ACCESS_TOKEN: &str = "GCP_ACCESS_TOKEN";

/// Access token for Google Cloud APIs.
///
/// Uses `explicit` when present (from `GCP_ACCESS_TOKEN` or the secret
/// store); otherwise asks `gcloud` for the active account's token.
pub async fn gcp_access_token(explicit: Option<&str>) -> Result<String> {
    if let Some(token) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }

    require_binary("gcloud", "set GCP_ACCESS_TOKEN or install the Google Cloud SDK")?;
    let token = run_command(
        "gcloud",
        &["auth".to_string(), "print-access-token".to_string()],
        GCLOUD_TIMEOUT,
    )
    .await
    .context("Failed to obtain an access token from gcloud")?;

    if token.is_empty() {
        anyhow::bail!("gcloud returned an empty access token");
    }
    Ok(token)
}

/// `Authorization` header value for a bearer token.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_token_wins() {
        let token = gcp_access_token(Some("ya29.abc")).await.unwrap();
        assert_eq!(token, "ya29.abc");
    }

    #[tokio::test]
    async fn explicit_token_is_trimmed() {
        let token = gcp_access_token(Some("  ya29.abc\n")).await.unwrap();
        assert_eq!(token, "ya29.abc");
    }

    #[test]
    fn bearer_header() {
        assert_eq!(bearer("tok"), "Bearer tok");
    }
}
