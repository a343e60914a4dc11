use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::core::auth::ENV_GCP_ACCESS_TOKEN;
use crate::core::cost::threshold::default_threshold;
use crate::core::error::CheckError;
use crate::core::providers::Provider;
use crate::core::secrets::{env_var, GcpSecretManager, ValueResolver};

pub const ENV_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";
pub const ENV_PROVIDER: &str = "COSTWATCH_PROVIDER";
pub const ENV_SECRET_PROJECT: &str = "COSTWATCH_SECRET_PROJECT";
pub const ENV_SECRET_MANAGER_ENDPOINT: &str = "SECRET_MANAGER_ENDPOINT";
pub const ENV_ACCOUNT_NAME: &str = "ACCOUNT_NAME";
pub const ENV_AWS_PROFILE: &str = "AWS_PROFILE";
pub const ENV_PROJECT_ID: &str = "PROJECT_ID";
pub const ENV_PROJECT_NAME: &str = "PROJECT_NAME";
pub const ENV_BILLING_ACCOUNT_ID: &str = "BILLING_ACCOUNT_ID";
pub const ENV_GCP_BILLING_ENDPOINT: &str = "GCP_BILLING_ENDPOINT";
pub const ENV_GCP_BUDGETS_ENDPOINT: &str = "GCP_BUDGETS_ENDPOINT";
pub const ENV_DO_API_TOKEN: &str = "DO_API_TOKEN";
pub const ENV_DO_ACCOUNT_NAME: &str = "DO_ACCOUNT_NAME";
pub const ENV_DO_API_ENDPOINT: &str = "DO_API_ENDPOINT";

const DEFAULT_DO_ACCOUNT_LABEL: &str = "DigitalOcean Account";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Provider checked when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Decimal>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Pause between consecutive inventory requests.
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
    /// Google Cloud project whose Secret Manager holds credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_project: Option<String>,
}

fn default_request_timeout_secs() -> u64 {
    10
}
fn default_rate_limit_delay_ms() -> u64 {
    500
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: None,
            threshold: None,
            request_timeout_secs: default_request_timeout_secs(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            secret_project: None,
        }
    }
}

/// Human-readable account labels per provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Accounts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp_budgets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digitalocean: Option<String>,
}

impl Accounts {
    pub fn label_for(&self, provider: Provider) -> Option<String> {
        match provider {
            Provider::Aws => self.aws.clone(),
            Provider::Gcp => self.gcp.clone(),
            Provider::GcpBudgets => self.gcp_budgets.clone(),
            Provider::DigitalOcean => self.digitalocean.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub accounts: Accounts,
}

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("costwatch").join("config.toml")
    }

    /// Load config from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Serialize and write this config to `path`, creating parent dirs.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.request_timeout_secs)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.settings.rate_limit_delay_ms)
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if let Some(id) = &self.settings.provider {
            if Provider::from_id(id).is_none() {
                issues.push(format!("Unknown provider ID: '{}'", id));
            }
        }
        if let Some(threshold) = self.settings.threshold {
            if threshold.is_sign_negative() && !threshold.is_zero() {
                issues.push(format!("Invalid threshold: {} (must be >= 0)", threshold));
            }
        }
        if self.settings.request_timeout_secs == 0 {
            issues.push("Invalid request_timeout_secs: 0 (must be > 0)".to_string());
        }
        issues
    }

    /// Secret store configured in settings or the environment, if any.
    pub fn value_resolver(&self) -> anyhow::Result<ValueResolver> {
        let project = env_var(ENV_SECRET_PROJECT).or_else(|| self.settings.secret_project.clone());
        match project {
            Some(project) => {
                let endpoint = env_var(ENV_SECRET_MANAGER_ENDPOINT);
                let store =
                    GcpSecretManager::new(project, endpoint.as_deref(), self.request_timeout())?;
                Ok(ValueResolver::with_store(Box::new(store)))
            }
            None => Ok(ValueResolver::env_only()),
        }
    }
}

/// Pick the provider: command line, then `COSTWATCH_PROVIDER`, then the file.
pub fn select_provider(flag: Option<&str>, app: &AppConfig) -> Result<Provider, CheckError> {
    let id = flag
        .map(str::to_string)
        .or_else(|| env_var(ENV_PROVIDER))
        .or_else(|| app.settings.provider.clone())
        .ok_or_else(|| {
            CheckError::configuration(format!(
                "No provider selected (use --provider, {} or settings.provider)",
                ENV_PROVIDER
            ))
        })?;
    Provider::from_id(&id)
        .ok_or_else(|| CheckError::configuration(format!("Unknown provider: '{}'", id)))
}

/// Parse a threshold value; `origin` names where it came from.
pub fn parse_threshold(raw: &str, origin: &str) -> Result<Decimal, CheckError> {
    let value = Decimal::from_str(raw.trim()).map_err(|_| {
        CheckError::configuration(format!("{} is not a decimal number: '{}'", origin, raw))
    })?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(CheckError::configuration(format!(
            "{} must not be negative: '{}'",
            origin, raw
        )));
    }
    Ok(value)
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CheckOverrides {
    pub threshold: Option<String>,
    /// Print the message instead of posting it; no webhook is needed.
    pub dry_run: bool,
}

/// Provider-specific credentials and identifiers.
#[derive(Clone)]
pub enum ProviderCredentials {
    Aws {
        profile: Option<String>,
    },
    Gcp {
        project_id: String,
        access_token: Option<String>,
        endpoint: Option<String>,
    },
    GcpBudgets {
        billing_account_id: String,
        access_token: Option<String>,
        endpoint: Option<String>,
    },
    DigitalOcean {
        api_token: String,
        endpoint: Option<String>,
    },
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |t: &Option<String>| t.as_ref().map(|_| "<redacted>");
        match self {
            Self::Aws { profile } => f.debug_struct("Aws").field("profile", profile).finish(),
            Self::Gcp {
                project_id,
                access_token,
                endpoint,
            } => f
                .debug_struct("Gcp")
                .field("project_id", project_id)
                .field("access_token", &redacted(access_token))
                .field("endpoint", endpoint)
                .finish(),
            Self::GcpBudgets {
                billing_account_id,
                access_token,
                endpoint,
            } => f
                .debug_struct("GcpBudgets")
                .field("billing_account_id", billing_account_id)
                .field("access_token", &redacted(access_token))
                .field("endpoint", endpoint)
                .finish(),
            Self::DigitalOcean { endpoint, .. } => f
                .debug_struct("DigitalOcean")
                .field("api_token", &"<redacted>")
                .field("endpoint", endpoint)
                .finish(),
        }
    }
}

/// Everything a check needs, resolved once at the start of an invocation.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub provider: Provider,
    pub webhook_url: String,
    pub threshold: Decimal,
    /// Configured label; the billing source may supply one when absent.
    pub account_label: Option<String>,
    pub credentials: ProviderCredentials,
    pub request_timeout: Duration,
    pub rate_limit_delay: Duration,
}

fn required(value: Option<String>, name: &str, provider: Provider) -> Result<String, CheckError> {
    value.ok_or_else(|| {
        CheckError::configuration(format!(
            "{} is not set (required for {})",
            name,
            provider.display_name()
        ))
    })
}

impl CheckConfig {
    /// Resolve configuration for `provider`. Precedence: command line, then
    /// secret store / environment, then the config file, then defaults.
    pub async fn resolve(
        provider: Provider,
        app: &AppConfig,
        resolver: &ValueResolver,
        webhook_url: Option<String>,
        overrides: &CheckOverrides,
    ) -> Result<Self, CheckError> {
        // Empty in dry-run mode when nothing is configured.
        let webhook_url = match webhook_url {
            Some(url) => url,
            None if overrides.dry_run => String::new(),
            None => {
                return Err(CheckError::configuration(format!(
                    "{} is not set",
                    ENV_WEBHOOK_URL
                )))
            }
        };

        let threshold = match &overrides.threshold {
            Some(raw) => parse_threshold(raw, "--threshold")?,
            None => match resolver.get(provider.threshold_env()).await {
                Some(raw) => parse_threshold(&raw, provider.threshold_env())?,
                None => app.settings.threshold.unwrap_or_else(default_threshold),
            },
        };
        if threshold.is_sign_negative() && !threshold.is_zero() {
            return Err(CheckError::configuration(format!(
                "threshold must not be negative: {}",
                threshold
            )));
        }

        let file_label = app.accounts.label_for(provider);
        let (credentials, account_label) = match provider {
            Provider::Aws => {
                let label = resolver.get(ENV_ACCOUNT_NAME).await.or(file_label);
                let profile = env_var(ENV_AWS_PROFILE);
                (ProviderCredentials::Aws { profile }, label)
            }
            Provider::Gcp => {
                let project_id = required(resolver.get(ENV_PROJECT_ID).await, ENV_PROJECT_ID, provider)?;
                let label = resolver
                    .get(ENV_PROJECT_NAME)
                    .await
                    .or(file_label)
                    .unwrap_or_else(|| project_id.clone());
                let credentials = ProviderCredentials::Gcp {
                    project_id,
                    access_token: resolver.get(ENV_GCP_ACCESS_TOKEN).await,
                    endpoint: env_var(ENV_GCP_BILLING_ENDPOINT),
                };
                (credentials, Some(label))
            }
            Provider::GcpBudgets => {
                let billing_account_id = required(
                    resolver.get(ENV_BILLING_ACCOUNT_ID).await,
                    ENV_BILLING_ACCOUNT_ID,
                    provider,
                )?;
                let label = resolver.get(ENV_ACCOUNT_NAME).await.or(file_label);
                let credentials = ProviderCredentials::GcpBudgets {
                    billing_account_id,
                    access_token: resolver.get(ENV_GCP_ACCESS_TOKEN).await,
                    endpoint: env_var(ENV_GCP_BUDGETS_ENDPOINT),
                };
                (credentials, label)
            }
            Provider::DigitalOcean => {
                let api_token =
                    required(resolver.get(ENV_DO_API_TOKEN).await, ENV_DO_API_TOKEN, provider)?;
                let label = resolver
                    .get(ENV_DO_ACCOUNT_NAME)
                    .await
                    .or(file_label)
                    .unwrap_or_else(|| DEFAULT_DO_ACCOUNT_LABEL.to_string());
                let credentials = ProviderCredentials::DigitalOcean {
                    api_token,
                    endpoint: env_var(ENV_DO_API_ENDPOINT),
                };
                (credentials, Some(label))
            }
        };

        Ok(Self {
            provider,
            webhook_url,
            threshold,
            account_label,
            credentials,
            request_timeout: app.request_timeout(),
            rate_limit_delay: app.rate_limit_delay(),
        })
    }
}
