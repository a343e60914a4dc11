use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::auth::{bearer, gcp_access_token, ENV_GCP_ACCESS_TOKEN};
use crate::core::providers::fetch::{ensure_success, http_client, validate_endpoint};

pub const SECRET_MANAGER_ENDPOINT: &str = "https://secretmanager.googleapis.com";

/// Named secret lookup.
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn get(&self, name: &str) -> Result<String>;
}

#[derive(Deserialize)]
struct SecretPayload {
    data: String,
}

#[derive(Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

/// Latest version of secrets in a Google Secret Manager project.
pub struct GcpSecretManager {
    project: String,
    endpoint: String,
    client: reqwest::Client,
}

impl GcpSecretManager {
    pub fn new(project: String, endpoint: Option<&str>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint
            .unwrap_or(SECRET_MANAGER_ENDPOINT)
            .trim_end_matches('/')
            .to_string();
        validate_endpoint(&endpoint, "Secret Manager")?;
        Ok(Self {
            project,
            endpoint,
            client: http_client(timeout)?,
        })
    }
}

fn decode_payload(data: &str) -> Result<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .context("Failed to base64 decode secret payload")?;
    let value = String::from_utf8(bytes).context("Secret payload is not UTF-8")?;
    Ok(value.trim().to_string())
}

#[async_trait]
impl SecretSource for GcpSecretManager {
    async fn get(&self, name: &str) -> Result<String> {
        // The token itself can only come from the environment or gcloud.
        let token = gcp_access_token(env_var(ENV_GCP_ACCESS_TOKEN).as_deref()).await?;
        let url = format!(
            "{}/v1/projects/{}/secrets/{}/versions/latest:access",
            self.endpoint, self.project, name
        );
        debug!(secret = name, "Accessing secret");
        let response = self
            .client
            .get(&url)
            .header("Authorization", bearer(&token))
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to request secret {}", name))?;
        let response = ensure_success(response, "Secret Manager", ENV_GCP_ACCESS_TOKEN).await?;
        let body: AccessSecretVersionResponse = response
            .json()
            .await
            .context("Failed to parse secret access response")?;
        decode_payload(&body.payload.data)
    }
}

/// Non-empty environment variable.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolves named configuration values: secret store first, then the
/// environment variable of the same name.
pub struct ValueResolver {
    store: Option<Box<dyn SecretSource>>,
}

impl ValueResolver {
    pub fn env_only() -> Self {
        Self { store: None }
    }

    pub fn with_store(store: Box<dyn SecretSource>) -> Self {
        Self { store: Some(store) }
    }

    /// A store failure is logged and the environment is used instead.
    pub async fn get(&self, name: &str) -> Option<String> {
        if let Some(store) = &self.store {
            match store.get(name).await {
                Ok(value) if !value.is_empty() => return Some(value),
                Ok(_) => warn!(secret = name, "Secret is empty; falling back to environment"),
                Err(e) => warn!(
                    secret = name,
                    error = %format!("{:#}", e),
                    "Secret store lookup failed; falling back to environment"
                ),
            }
        }
        env_var(name)
    }

    /// First of `names` that resolves.
    pub async fn get_any(&self, names: &[&str]) -> Option<String> {
        for name in names {
            if let Some(value) = self.get(name).await {
                return Some(value);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FailingStore;

    #[async_trait]
    impl SecretSource for FailingStore {
        async fn get(&self, name: &str) -> Result<String> {
            anyhow::bail!("permission denied on {}", name)
        }
    }

    struct FixedStore(&'static str);

    #[async_trait]
    impl SecretSource for FixedStore {
        async fn get(&self, _name: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn decode_payload_trims_newline() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("https://hooks.slack.com/x\n");
        assert_eq!(decode_payload(&encoded).unwrap(), "https://hooks.slack.com/x");
    }

    #[test]
    fn decode_payload_rejects_invalid_base64() {
        assert!(decode_payload("!!!").is_err());
    }

    #[tokio::test]
    #[serial]
    async fn store_failure_falls_back_to_env() {
        std::env::set_var("COSTWATCH_TEST_SECRET", "from-env");
        let resolver = ValueResolver::with_store(Box::new(FailingStore));
        let value = resolver.get("COSTWATCH_TEST_SECRET").await;
        std::env::remove_var("COSTWATCH_TEST_SECRET");
        assert_eq!(value.as_deref(), Some("from-env"));
    }

    #[tokio::test]
    #[serial]
    async fn store_value_wins_over_env() {
        std::env::set_var("COSTWATCH_TEST_SECRET", "from-env");
        let resolver = ValueResolver::with_store(Box::new(FixedStore("from-store")));
        let value = resolver.get("COSTWATCH_TEST_SECRET").await;
        std::env::remove_var("COSTWATCH_TEST_SECRET");
        assert_eq!(value.as_deref(), Some("from-store"));
    }

    #[tokio::test]
    #[serial]
    async fn empty_store_value_falls_back() {
        std::env::set_var("COSTWATCH_TEST_SECRET", "from-env");
        let resolver = ValueResolver::with_store(Box::new(FixedStore("")));
        let value = resolver.get("COSTWATCH_TEST_SECRET").await;
        std::env::remove_var("COSTWATCH_TEST_SECRET");
        assert_eq!(value.as_deref(), Some("from-env"));
    }

    #[tokio::test]
    #[serial]
    async fn blank_env_is_missing() {
        std::env::set_var("COSTWATCH_TEST_SECRET", "   ");
        let value = ValueResolver::env_only().get("COSTWATCH_TEST_SECRET").await;
        std::env::remove_var("COSTWATCH_TEST_SECRET");
        assert!(value.is_none());
    }

    #[tokio::test]
    #[serial]
    async fn get_any_takes_first_present() {
        std::env::remove_var("COSTWATCH_TEST_A");
        std::env::set_var("COSTWATCH_TEST_B", "b");
        let value = ValueResolver::env_only()
            .get_any(&["COSTWATCH_TEST_A", "COSTWATCH_TEST_B"])
            .await;
        std::env::remove_var("COSTWATCH_TEST_B");
        assert_eq!(value.as_deref(), Some("b"));
    }

    #[tokio::test]
    #[serial]
    async fn secret_manager_reads_latest_version() {
        let server = MockServer::start().await;
        let encoded = base64::engine::general_purpose::STANDARD.encode("hook-url");
        Mock::given(method("GET"))
            .and(path(
                "/v1/projects/ops/secrets/SLACK_WEBHOOK_URL/versions/latest:access",
            ))
            .and(header("authorization", "Bearer sm-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "projects/1/secrets/SLACK_WEBHOOK_URL/versions/3",
                "payload": { "data": encoded }
            })))
            .mount(&server)
            .await;

        std::env::set_var(ENV_GCP_ACCESS_TOKEN, "sm-token");
        let store =
            GcpSecretManager::new("ops".into(), Some(&server.uri()), Duration::from_secs(5)).unwrap();
        let value = store.get("SLACK_WEBHOOK_URL").await;
        std::env::remove_var(ENV_GCP_ACCESS_TOKEN);
        assert_eq!(value.unwrap(), "hook-url");
    }

    #[tokio::test]
    #[serial]
    async fn secret_manager_denied_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        std::env::set_var(ENV_GCP_ACCESS_TOKEN, "sm-token");
        let store =
            GcpSecretManager::new("ops".into(), Some(&server.uri()), Duration::from_secs(5)).unwrap();
        let result = store.get("SLACK_WEBHOOK_URL").await;
        std::env::remove_var(ENV_GCP_ACCESS_TOKEN);
        assert!(result.is_err());
    }
}
