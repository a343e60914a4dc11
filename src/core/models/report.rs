use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Every billing surface we poll reports in US dollars.
pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownItem {
    pub category: String,
    pub amount: Decimal,
}

/// Normalized cost for one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub date: NaiveDate,
    pub total_cost: Decimal,
    pub currency: String,
    /// Per-category amounts, present only for estimated costs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<BreakdownItem>>,
}

impl CostReport {
    /// A report carrying a single provider-reported figure.
    pub fn single(date: NaiveDate, total_cost: Decimal) -> Self {
        Self {
            date,
            total_cost,
            currency: DEFAULT_CURRENCY.to_string(),
            breakdown: None,
        }
    }
}
