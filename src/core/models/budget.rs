use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fixed-point currency amount as returned by Google APIs
/// (`google.type.Money`): whole `units` as a string plus `nanos`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub currency_code: Option<String>,
    pub units: Option<String>,
    pub nanos: Option<i64>,
}

/// A budget as read from the billing API, before decomposition.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBudget {
    pub name: String,
    pub specified_amount: Option<Money>,
    pub actual_spend: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetEntry {
    pub name: String,
    pub specified_amount: Decimal,
    pub currency: String,
    pub actual_spend: Decimal,
}
