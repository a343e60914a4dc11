use thiserror::Error;

use crate::core::notify::DeliveryError;

/// Everything that can fail a cost check. None of these are retried; the
/// next scheduled invocation is the retry.
#[derive(Error, Debug)]
pub enum CheckError {
    /// A required credential, webhook or identifier is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The billing API failed or returned data we could not use.
    #[error("Failed to acquire billing data: {0:#}")]
    Acquisition(anyhow::Error),
    /// The notification sink rejected the report.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl CheckError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn acquisition(message: impl std::fmt::Display) -> Self {
        Self::Acquisition(anyhow::anyhow!("{}", message))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Acquisition(_) => "acquisition",
            Self::Delivery(_) => "delivery",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn acquisition_display_includes_context_chain() {
        let err: anyhow::Result<()> = Err(anyhow::anyhow!("connection refused"));
        let err = err.context("Failed to reach Cost Explorer").unwrap_err();
        let check = CheckError::Acquisition(err);
        let msg = check.to_string();
        assert!(msg.contains("Failed to reach Cost Explorer"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn delivery_error_is_transparent() {
        let check = CheckError::from(DeliveryError::Status { status: 404 });
        assert_eq!(check.to_string(), "Webhook returned HTTP 404");
        assert_eq!(check.kind(), "delivery");
    }

    #[test]
    fn configuration_kind() {
        let check = CheckError::configuration("SLACK_WEBHOOK_URL is not set");
        assert_eq!(check.kind(), "configuration");
        assert_eq!(
            check.to_string(),
            "Configuration error: SLACK_WEBHOOK_URL is not set"
        );
    }
}
