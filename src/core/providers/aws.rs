use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::cost::normalizer::CostSource;
use crate::core::models::window::DayWindow;
use crate::core::process::{require_binary, run_command};
use crate::core::providers::{BillingSource, Provider};

/// Cost Explorer only serves us-east-1.
const CE_REGION: &str = "us-east-1";
const COST_METRIC: &str = "UnblendedCost";

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MetricValue {
    amount: String,
    #[allow(dead_code)]
    unit: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultByTime {
    #[serde(default)]
    total: HashMap<String, MetricValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CostAndUsageResponse {
    #[serde(default)]
    results_by_time: Vec<ResultByTime>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    account: String,
}

/// Daily unblended cost via `aws ce get-cost-and-usage`.
pub struct AwsCostExplorer {
    profile: Option<String>,
    timeout: Duration,
}

impl AwsCostExplorer {
    pub fn new(profile: Option<String>, timeout: Duration) -> Self {
        Self { profile, timeout }
    }

    fn profile_args(&self) -> Vec<String> {
        match &self.profile {
            Some(profile) => vec!["--profile".to_string(), profile.clone()],
            None => Vec::new(),
        }
    }

    fn cost_args(&self, window: &DayWindow) -> Vec<String> {
        let mut args = vec![
            "ce".to_string(),
            "get-cost-and-usage".to_string(),
            "--time-period".to_string(),
            format!(
                "Start={},End={}",
                window.start.format("%Y-%m-%d"),
                window.end.format("%Y-%m-%d")
            ),
            "--granularity".to_string(),
            "DAILY".to_string(),
            "--metrics".to_string(),
            COST_METRIC.to_string(),
            "--region".to_string(),
            CE_REGION.to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        args.extend(self.profile_args());
        args
    }

    async fn account_id(&self) -> Result<String> {
        let mut args = vec![
            "sts".to_string(),
            "get-caller-identity".to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        args.extend(self.profile_args());
        let stdout = run_command("aws", &args, self.timeout).await?;
        let identity: CallerIdentity =
            serde_json::from_str(&stdout).context("Failed to parse sts get-caller-identity output")?;
        Ok(identity.account)
    }
}

/// Pull the first day's unblended cost amount out of the CLI output.
fn parse_cost_output(stdout: &str) -> Result<String> {
    let response: CostAndUsageResponse =
        serde_json::from_str(stdout).context("Failed to parse Cost Explorer response")?;
    let first = response
        .results_by_time
        .into_iter()
        .next()
        .context("Cost Explorer returned no ResultsByTime entries")?;
    let mut total = first.total;
    let metric = total
        .remove(COST_METRIC)
        .with_context(|| format!("Cost Explorer response is missing {}", COST_METRIC))?;
    Ok(metric.amount)
}

#[async_trait]
impl BillingSource for AwsCostExplorer {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    async fn fetch(&self, window: &DayWindow) -> Result<CostSource> {
        require_binary("aws", Provider::Aws.auth_hint())?;
        info!(start = %window.start, end = %window.end, "Querying AWS Cost Explorer");
        let stdout = run_command("aws", &self.cost_args(window), self.timeout)
            .await
            .context("Failed to query AWS Cost Explorer")?;
        let amount = parse_cost_output(&stdout)?;
        Ok(CostSource::DirectCost { amount })
    }

    async fn describe_account(&self) -> Option<String> {
        match self.account_id().await {
            Ok(id) => Some(format!("AWS Account ({})", id)),
            Err(e) => {
                debug!(error = %format!("{:#}", e), "Could not resolve AWS account id");
                None
            }
        }
    }
}
