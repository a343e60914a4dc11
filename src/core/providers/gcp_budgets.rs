use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::auth::{bearer, gcp_access_token};
use crate::core::cost::normalizer::CostSource;
use crate::core::models::budget::{Money, RawBudget};
use crate::core::models::window::DayWindow;
use crate::core::providers::fetch::{ensure_success, http_client, validate_endpoint};
use crate::core::providers::{BillingSource, Provider};

pub const DEFAULT_ENDPOINT: &str = "https://billingbudgets.googleapis.com";

/// Guard against a server that keeps handing back page tokens.
const MAX_PAGES: usize = 50;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BudgetAmount {
    specified_amount: Option<Money>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BudgetRaw {
    #[serde(default)]
    name: String,
    display_name: Option<String>,
    amount: Option<BudgetAmount>,
    actual_spend: Option<Money>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BudgetsPage {
    #[serde(default)]
    budgets: Vec<BudgetRaw>,
    next_page_token: Option<String>,
}

fn into_raw_budget(raw: BudgetRaw) -> RawBudget {
    let name = raw
        .display_name
        .filter(|n| !n.is_empty())
        .unwrap_or(raw.name);
    RawBudget {
        name,
        specified_amount: raw.amount.and_then(|a| a.specified_amount),
        actual_spend: raw.actual_spend,
    }
}

/// Budgets of a billing account with their current spend.
pub struct GcpBudgets {
    billing_account_id: String,
    access_token: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl GcpBudgets {
    pub fn new(
        billing_account_id: String,
        access_token: Option<String>,
        endpoint: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = endpoint
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string();
        validate_endpoint(&endpoint, Provider::GcpBudgets.display_name())?;
        Ok(Self {
            billing_account_id: billing_account_id
                .trim_start_matches("billingAccounts/")
                .to_string(),
            access_token,
            endpoint,
            client: http_client(timeout)?,
        })
    }

    async fn fetch_page(&self, token: &str, page_token: Option<&str>) -> Result<BudgetsPage> {
        let url = format!(
            "{}/v1/billingAccounts/{}/budgets",
            self.endpoint, self.billing_account_id
        );
        let mut request = self
            .client
            .get(&url)
            .header("Authorization", bearer(token))
            .header("Accept", "application/json");
        if let Some(page_token) = page_token {
            request = request.query(&[("pageToken", page_token)]);
        }
        debug!(url = %url, page_token = ?page_token, "Fetching budgets page");

        let response = request
            .send()
            .await
            .context("Failed to send request to Billing Budgets API")?;
        let response =
            ensure_success(response, "GCP Budgets", Provider::GcpBudgets.auth_hint()).await?;
        response
            .json()
            .await
            .context("Failed to parse budgets response")
    }
}

#[async_trait]
impl BillingSource for GcpBudgets {
    fn provider(&self) -> Provider {
        Provider::GcpBudgets
    }

    async fn fetch(&self, _window: &DayWindow) -> Result<CostSource> {
        let token = gcp_access_token(self.access_token.as_deref()).await?;
        info!(account = %self.billing_account_id, "Listing GCP budgets");

        let mut budgets = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let page = self.fetch_page(&token, page_token.as_deref()).await?;
            budgets.extend(page.budgets.into_iter().map(into_raw_budget));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => return Ok(CostSource::BudgetList(budgets)),
            }
        }
        anyhow::bail!("Budgets listing exceeded {} pages", MAX_PAGES)
    }

    async fn describe_account(&self) -> Option<String> {
        Some(format!("Billing account {}", self.billing_account_id))
    }
}
