use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::core::cost::pricing;
use crate::core::error::CheckError;
use crate::core::models::budget::{BudgetEntry, Money, RawBudget};
use crate::core::models::inventory::ResourceInventory;
use crate::core::models::report::{BreakdownItem, CostReport, DEFAULT_CURRENCY};

/// Decimal places kept for every normalized amount.
pub const AMOUNT_SCALE: u32 = 6;

const NANOS_PER_UNIT: i64 = 1_000_000_000;

/// What a billing source hands back for the queried day.
#[derive(Debug, Clone, PartialEq)]
pub enum CostSource {
    /// A cost figure reported directly by the provider, as a decimal string.
    DirectCost { amount: String },
    /// Named budgets with units/nanos spend amounts.
    BudgetList(Vec<RawBudget>),
    /// Resources to price locally.
    EstimatedFromInventory(ResourceInventory),
}

/// Cost data reduced to comparable decimals.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedCost {
    Report {
        report: CostReport,
        inventory: Option<ResourceInventory>,
    },
    Budgets {
        date: NaiveDate,
        entries: Vec<BudgetEntry>,
    },
}

impl NormalizedCost {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Report { report, .. } => report.date,
            Self::Budgets { date, .. } => *date,
        }
    }

    /// Headline figure: the report total, or the summed spend across budgets.
    pub fn total_cost(&self) -> Decimal {
        match self {
            Self::Report { report, .. } => report.total_cost,
            Self::Budgets { entries, .. } => entries.iter().map(|e| e.actual_spend).sum(),
        }
    }
}

/// Round half away from zero to [`AMOUNT_SCALE`] places.
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse a provider-reported amount. Accepts plain and scientific notation;
/// rejects negatives.
pub fn parse_amount(raw: &str) -> Result<Decimal, CheckError> {
    let trimmed = raw.trim();
    let amount = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| CheckError::acquisition(format!("Unparseable cost amount: '{}'", raw)))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(CheckError::acquisition(format!(
            "Negative cost amount: '{}'",
            raw
        )));
    }
    Ok(amount)
}

/// Reconstruct `units + nanos / 1e9`. A missing amount is zero.
pub fn money_to_decimal(money: Option<&Money>) -> Result<Decimal, CheckError> {
    let Some(money) = money else {
        return Ok(Decimal::ZERO);
    };

    let units_raw = money.units.as_deref().unwrap_or("0");
    let units = units_raw.trim().parse::<i64>().map_err(|_| {
        CheckError::acquisition(format!("Invalid units in money amount: '{}'", units_raw))
    })?;

    let nanos = money.nanos.unwrap_or(0);
    if !(0..NANOS_PER_UNIT).contains(&nanos) {
        return Err(CheckError::acquisition(format!(
            "Nanos out of range [0, 1e9): {}",
            nanos
        )));
    }

    Ok(Decimal::from(units) + Decimal::new(nanos, 9))
}

/// Price an inventory for one day. Each breakdown entry is rounded on its
/// own, so the entries may not add up to the rounded total exactly.
pub fn estimate_daily_cost(inventory: &ResourceInventory, date: NaiveDate) -> CostReport {
    let droplet_cost: Decimal = inventory
        .droplets
        .iter()
        .map(|d| pricing::droplet_daily_cost(d.hourly_price))
        .sum();

    let volume_cost: Decimal = inventory
        .volumes
        .iter()
        .map(|v| pricing::volume_daily_cost(v.size_gigabytes))
        .sum();

    let database_cost = pricing::database_daily_cost() * Decimal::from(inventory.databases.len());

    let breakdown = vec![
        BreakdownItem {
            category: "Droplets".to_string(),
            amount: round_amount(droplet_cost),
        },
        BreakdownItem {
            category: "Volumes".to_string(),
            amount: round_amount(volume_cost),
        },
        BreakdownItem {
            category: "Databases".to_string(),
            amount: round_amount(database_cost),
        },
    ];

    CostReport {
        date,
        total_cost: round_amount(droplet_cost + volume_cost + database_cost),
        currency: DEFAULT_CURRENCY.to_string(),
        breakdown: Some(breakdown),
    }
}

fn normalize_budget(raw: &RawBudget) -> Result<BudgetEntry, CheckError> {
    let currency = raw
        .specified_amount
        .as_ref()
        .and_then(|m| m.currency_code.clone())
        .or_else(|| raw.actual_spend.as_ref().and_then(|m| m.currency_code.clone()))
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    Ok(BudgetEntry {
        name: raw.name.clone(),
        specified_amount: money_to_decimal(raw.specified_amount.as_ref())?,
        currency,
        actual_spend: money_to_decimal(raw.actual_spend.as_ref())?,
    })
}

/// Reduce a cost source to decimals for the day being reported.
pub fn normalize(source: CostSource, date: NaiveDate) -> Result<NormalizedCost, CheckError> {
    match source {
        CostSource::DirectCost { amount } => {
            let total = parse_amount(&amount)?;
            Ok(NormalizedCost::Report {
                report: CostReport::single(date, total),
                inventory: None,
            })
        }
        CostSource::BudgetList(budgets) => {
            let entries = budgets
                .iter()
                .map(normalize_budget)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(NormalizedCost::Budgets { date, entries })
        }
        CostSource::EstimatedFromInventory(inventory) => {
            let report = estimate_daily_cost(&inventory, date);
            Ok(NormalizedCost::Report {
                report,
                inventory: Some(inventory),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::formatter::format_cost;
    use crate::core::models::inventory::{Database, Droplet, Volume};

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn droplet(name: &str, size: &str) -> Droplet {
        Droplet {
            id: 1,
            name: name.to_string(),
            size_slug: size.to_string(),
            region: "nyc3".to_string(),
            hourly_price: pricing::droplet_hourly_price(size),
        }
    }

    fn money(units: Option<&str>, nanos: Option<i64>) -> Money {
        Money {
            currency_code: Some("USD".to_string()),
            units: units.map(str::to_string),
            nanos,
        }
    }

    #[test]
    fn parse_amount_plain() {
        assert_eq!(parse_amount("0.05").unwrap(), d("0.05"));
        assert_eq!(parse_amount(" 12.3456789 ").unwrap(), d("12.3456789"));
    }

    #[test]
    fn parse_amount_scientific() {
        assert_eq!(parse_amount("1.5e-5").unwrap(), d("0.000015"));
    }

    #[test]
    fn parse_amount_rejects_garbage() {
        let err = parse_amount("n/a").unwrap_err();
        assert!(matches!(err, CheckError::Acquisition(_)));
        assert!(err.to_string().contains("Unparseable"));
    }

    #[test]
    fn parse_amount_rejects_negative() {
        assert!(parse_amount("-0.01").is_err());
        assert_eq!(parse_amount("-0").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn parse_format_is_idempotent_under_reparse() {
        for raw in ["0", "0.1", "0.0000005", "1.23456789", "123456.9999995", "7"] {
            let once = format_cost(parse_amount(raw).unwrap());
            let twice = format_cost(parse_amount(&once).unwrap());
            assert_eq!(once, twice, "input {}", raw);
        }
    }

    #[test]
    fn money_units_and_nanos() {
        let m = money(Some("3"), Some(500_000_000));
        assert_eq!(money_to_decimal(Some(&m)).unwrap(), d("3.5"));
    }

    #[test]
    fn money_missing_parts_default_to_zero() {
        assert_eq!(money_to_decimal(None).unwrap(), Decimal::ZERO);
        let m = money(None, Some(50_000_000));
        assert_eq!(money_to_decimal(Some(&m)).unwrap(), d("0.05"));
        let m = money(Some("2"), None);
        assert_eq!(money_to_decimal(Some(&m)).unwrap(), d("2"));
    }

    #[test]
    fn money_rejects_out_of_range_nanos() {
        let m = money(Some("1"), Some(1_000_000_000));
        assert!(money_to_decimal(Some(&m)).is_err());
        let m = money(Some("1"), Some(-1));
        assert!(money_to_decimal(Some(&m)).is_err());
    }

    #[test]
    fn money_rejects_bad_units() {
        let m = money(Some("three"), None);
        let err = money_to_decimal(Some(&m)).unwrap_err();
        assert!(err.to_string().contains("three"));
    }

    #[test]
    fn estimate_single_droplet_and_volume() {
        let inventory = ResourceInventory {
            droplets: vec![droplet("web-1", "s-1vcpu-1gb")],
            volumes: vec![Volume {
                name: "data".into(),
                size_gigabytes: 100,
            }],
            databases: vec![],
        };
        let report = estimate_daily_cost(&inventory, date());
        let breakdown = report.breakdown.unwrap();
        assert_eq!(breakdown[0].category, "Droplets");
        assert_eq!(breakdown[0].amount, d("0.168"));
        assert_eq!(breakdown[1].category, "Volumes");
        assert_eq!(breakdown[1].amount, d("0.333333"));
        assert_eq!(breakdown[2].category, "Databases");
        assert_eq!(breakdown[2].amount, Decimal::ZERO);
        assert_eq!(report.total_cost, d("0.501333"));
    }

    #[test]
    fn estimate_databases_are_flat_rate() {
        let inventory = ResourceInventory {
            databases: (0..3)
                .map(|i| Database {
                    name: format!("db-{}", i),
                })
                .collect(),
            ..Default::default()
        };
        let report = estimate_daily_cost(&inventory, date());
        assert_eq!(report.total_cost, d("1.5"));
    }

    #[test]
    fn estimate_rounds_components_independently() {
        // Each volume costs 0.0333333..., three of them round to 0.1 as a
        // group but the droplet term stays exact.
        let inventory = ResourceInventory {
            droplets: vec![droplet("a", "s-1vcpu-2gb")],
            volumes: (0..3)
                .map(|i| Volume {
                    name: format!("v{}", i),
                    size_gigabytes: 10,
                })
                .collect(),
            databases: vec![],
        };
        let report = estimate_daily_cost(&inventory, date());
        let breakdown = report.breakdown.unwrap();
        assert_eq!(breakdown[0].amount, d("0.36"));
        assert_eq!(breakdown[1].amount, d("0.1"));
        assert_eq!(report.total_cost, d("0.46"));
    }

    #[test]
    fn normalize_direct_cost() {
        let n = normalize(
            CostSource::DirectCost {
                amount: "0.05".into(),
            },
            date(),
        )
        .unwrap();
        match n {
            NormalizedCost::Report { report, inventory } => {
                assert_eq!(report.total_cost, d("0.05"));
                assert!(report.breakdown.is_none());
                assert!(inventory.is_none());
                assert_eq!(report.currency, "USD");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn normalize_budget_list() {
        let budgets = vec![
            RawBudget {
                name: "dev".into(),
                specified_amount: Some(money(Some("10"), None)),
                actual_spend: Some(money(Some("0"), Some(50_000_000))),
            },
            RawBudget {
                name: "prod".into(),
                specified_amount: Some(money(Some("5"), None)),
                actual_spend: None,
            },
        ];
        let n = normalize(CostSource::BudgetList(budgets), date()).unwrap();
        assert_eq!(n.date(), date());
        assert_eq!(n.total_cost(), d("0.05"));
        match n {
            NormalizedCost::Budgets { entries, .. } => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].specified_amount, d("10"));
                assert_eq!(entries[1].actual_spend, Decimal::ZERO);
                assert_eq!(entries[1].currency, "USD");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn normalize_keeps_inventory_for_estimates() {
        let inventory = ResourceInventory {
            droplets: vec![droplet("web", "unknown-size")],
            ..Default::default()
        };
        let n = normalize(
            CostSource::EstimatedFromInventory(inventory.clone()),
            date(),
        )
        .unwrap();
        match n {
            NormalizedCost::Report {
                report,
                inventory: Some(kept),
            } => {
                assert_eq!(kept, inventory);
                assert_eq!(report.total_cost, d("0.168"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
