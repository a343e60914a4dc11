pub mod aws;
pub mod digitalocean;
pub mod fetch;
pub mod gcp;
pub mod gcp_budgets;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::config::{CheckConfig, ProviderCredentials};
use crate::core::cost::normalizer::CostSource;
use crate::core::models::window::DayWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Aws,
    Gcp,
    GcpBudgets,
    DigitalOcean,
}

impl Provider {
    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "aws" => Some(Self::Aws),
            "gcp" => Some(Self::Gcp),
            "gcp_budgets" | "gcp-budgets" | "gcpbudgets" => Some(Self::GcpBudgets),
            "digitalocean" | "digital_ocean" | "digital-ocean" | "do" => Some(Self::DigitalOcean),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::GcpBudgets => "gcp_budgets",
            Self::DigitalOcean => "digitalocean",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Aws => "AWS",
            Self::Gcp => "GCP",
            Self::GcpBudgets => "GCP Budgets",
            Self::DigitalOcean => "DigitalOcean",
        }
    }

    pub fn all() -> &'static [Provider] {
        &[
            Provider::Aws,
            Provider::Gcp,
            Provider::GcpBudgets,
            Provider::DigitalOcean,
        ]
    }

    /// Whether the cost is computed locally rather than reported.
    pub fn is_estimated(&self) -> bool {
        matches!(self, Self::DigitalOcean)
    }

    /// Environment variable holding the threshold for this provider.
    pub fn threshold_env(&self) -> &'static str {
        match self {
            Self::DigitalOcean => "DO_COST_THRESHOLD",
            _ => "THRESHOLD",
        }
    }

    pub fn auth_hint(&self) -> &'static str {
        match self {
            Self::Aws => "aws CLI credentials (AWS_PROFILE)",
            Self::Gcp => "PROJECT_ID + GCP_ACCESS_TOKEN or gcloud",
            Self::GcpBudgets => "BILLING_ACCOUNT_ID + GCP_ACCESS_TOKEN or gcloud",
            Self::DigitalOcean => "DO_API_TOKEN",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// A provider billing surface queried once per check.
#[async_trait]
pub trait BillingSource: Send + Sync {
    fn provider(&self) -> Provider;

    /// Cost data for the given day.
    async fn fetch(&self, window: &DayWindow) -> anyhow::Result<CostSource>;

    /// Provider-derived account label, used when none is configured.
    async fn describe_account(&self) -> Option<String> {
        None
    }
}

/// Build the billing source matching the resolved credentials.
pub fn build_source(config: &CheckConfig) -> anyhow::Result<Box<dyn BillingSource>> {
    let source: Box<dyn BillingSource> = match &config.credentials {
        ProviderCredentials::Aws { profile } => Box::new(aws::AwsCostExplorer::new(
            profile.clone(),
            config.request_timeout,
        )),
        ProviderCredentials::Gcp {
            project_id,
            access_token,
            endpoint,
        } => Box::new(gcp::GcpBilling::new(
            project_id.clone(),
            access_token.clone(),
            endpoint.as_deref(),
            config.request_timeout,
        )?),
        ProviderCredentials::GcpBudgets {
            billing_account_id,
            access_token,
            endpoint,
        } => Box::new(gcp_budgets::GcpBudgets::new(
            billing_account_id.clone(),
            access_token.clone(),
            endpoint.as_deref(),
            config.request_timeout,
        )?),
        ProviderCredentials::DigitalOcean {
            api_token,
            endpoint,
        } => Box::new(digitalocean::DigitalOceanInventory::new(
            api_token.clone(),
            endpoint.as_deref(),
            config.request_timeout,
            config.rate_limit_delay,
        )?),
    };
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_id_round_trips_every_provider() {
        for p in Provider::all() {
            assert_eq!(Provider::from_id(p.id()), Some(*p));
        }
    }

    #[test]
    fn from_id_accepts_aliases() {
        assert_eq!(Provider::from_id("gcp-budgets"), Some(Provider::GcpBudgets));
        assert_eq!(Provider::from_id("DigitalOcean"), Some(Provider::DigitalOcean));
        assert_eq!(Provider::from_id("do"), Some(Provider::DigitalOcean));
        assert_eq!(Provider::from_id("azure"), None);
    }

    #[test]
    fn threshold_env_per_provider() {
        assert_eq!(Provider::DigitalOcean.threshold_env(), "DO_COST_THRESHOLD");
        assert_eq!(Provider::Aws.threshold_env(), "THRESHOLD");
        assert_eq!(Provider::Gcp.threshold_env(), "THRESHOLD");
    }

    #[test]
    fn only_digitalocean_is_estimated() {
        let estimated: Vec<_> = Provider::all().iter().filter(|p| p.is_estimated()).collect();
        assert_eq!(estimated, vec![&Provider::DigitalOcean]);
    }
}
