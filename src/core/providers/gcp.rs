use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::auth::{bearer, gcp_access_token};
use crate::core::cost::normalizer::CostSource;
use crate::core::models::window::DayWindow;
use crate::core::providers::fetch::{ensure_success, http_client, validate_endpoint};
use crate::core::providers::{BillingSource, Provider};

pub const DEFAULT_ENDPOINT: &str = "https://cloudbilling.googleapis.com";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BillingInfo {
    #[serde(default)]
    billing_account_name: String,
    #[serde(default)]
    billing_enabled: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CostAmount {
    amount: String,
    #[allow(dead_code)]
    currency_code: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CostResponse {
    cost_amount: Option<CostAmount>,
}

/// Daily cost of a project's billing account from the Cloud Billing API.
pub struct GcpBilling {
    project_id: String,
    access_token: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl GcpBilling {
    pub fn new(
        project_id: String,
        access_token: Option<String>,
        endpoint: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = endpoint
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string();
        validate_endpoint(&endpoint, Provider::Gcp.display_name())?;
        Ok(Self {
            project_id,
            access_token,
            endpoint,
            client: http_client(timeout)?,
        })
    }

    async fn billing_account(&self, token: &str) -> Result<String> {
        let url = format!("{}/v1/projects/{}/billingInfo", self.endpoint, self.project_id);
        debug!(url = %url, "Fetching project billing info");
        let response = self
            .client
            .get(&url)
            .header("Authorization", bearer(token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to Cloud Billing API")?;
        let response = ensure_success(response, "GCP", Provider::Gcp.auth_hint()).await?;
        let info: BillingInfo = response
            .json()
            .await
            .context("Failed to parse billing info response")?;

        if !info.billing_enabled || info.billing_account_name.is_empty() {
            anyhow::bail!("Billing is not enabled for project {}", self.project_id);
        }
        Ok(info.billing_account_name)
    }
}

#[async_trait]
impl BillingSource for GcpBilling {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    async fn fetch(&self, window: &DayWindow) -> Result<CostSource> {
        let token = gcp_access_token(self.access_token.as_deref()).await?;
        let account = self.billing_account(&token).await?;

        let (start, end) = window.rfc3339_bounds();
        info!(account = %account, start = %start, end = %end, "Querying GCP billing account cost");
        let url = format!("{}/v1/{}/costs", self.endpoint, account);
        let response = self
            .client
            .get(&url)
            .query(&[("startTime", start.as_str()), ("endTime", end.as_str())])
            .header("Authorization", bearer(&token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to Cloud Billing API")?;
        let response = ensure_success(response, "GCP", Provider::Gcp.auth_hint()).await?;
        let data: CostResponse = response
            .json()
            .await
            .context("Failed to parse billing cost response")?;

        let amount = data
            .cost_amount
            .context("Billing cost response has no costAmount")?
            .amount;
        Ok(CostSource::DirectCost { amount })
    }
}
