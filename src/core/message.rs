use crate::core::cost::normalizer::NormalizedCost;
use crate::core::cost::pricing::droplet_daily_cost;
use crate::core::cost::threshold::{Evaluation, ThresholdEvaluation};
use crate::core::error::CheckError;
use crate::core::formatter::{format_cost, format_item_price, format_threshold};
use crate::core::models::budget::BudgetEntry;
use crate::core::models::inventory::ResourceInventory;
use crate::core::models::report::CostReport;
use crate::core::providers::Provider;

pub const VERDICT_WITHIN: &str = "✅ Cost is within the threshold.";
pub const VERDICT_EXCEEDED: &str = "⚠️ Cost exceeds the threshold!";

/// Prefix of every error notification.
pub const FAILURE_MARKER: &str = "❌";
const FAILURE_TITLE: &str = "Cost check failed";

const DROPLET_SAMPLE: usize = 3;

const REMEDIATION: &[&str] = &[
    "Delete unused resources",
    "Downsize over-provisioned droplets",
    "Consider reserved capacity",
];

pub fn verdict_line(exceeded: bool) -> &'static str {
    if exceeded {
        VERDICT_EXCEEDED
    } else {
        VERDICT_WITHIN
    }
}

fn header(provider: Provider, date: &str, account_label: &str) -> Vec<String> {
    vec![
        format!("📊 *{} cost check ({})*", provider.display_name(), date),
        format!("- Account: {}", account_label),
    ]
}

fn threshold_line(threshold: &ThresholdEvaluation) -> String {
    format!("- Threshold: {} USD", format_threshold(threshold.threshold))
}

fn breakdown_section(report: &CostReport) -> Vec<String> {
    let Some(items) = &report.breakdown else {
        return Vec::new();
    };
    let mut lines = vec![String::new(), "*Cost breakdown*".to_string()];
    for item in items {
        lines.push(format!(
            "- {}: {} {}",
            item.category,
            format_cost(item.amount),
            report.currency
        ));
    }
    lines
}

fn inventory_section(inventory: &ResourceInventory) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "*Resources*".to_string(),
        format!("- Droplets: {}", inventory.droplets.len()),
        format!("- Databases: {}", inventory.databases.len()),
        format!(
            "- Volumes: {} ({} GB total)",
            inventory.volumes.len(),
            inventory.total_volume_gb()
        ),
    ];

    if !inventory.droplets.is_empty() {
        lines.push(String::new());
        lines.push("*Droplets*".to_string());
        for droplet in inventory.droplets.iter().take(DROPLET_SAMPLE) {
            lines.push(format!(
                "- {}: {} ({}) - {}/day",
                droplet.name,
                droplet.size_slug,
                droplet.region,
                format_item_price(droplet_daily_cost(droplet.hourly_price))
            ));
        }
        let overflow = inventory.droplets.len().saturating_sub(DROPLET_SAMPLE);
        if overflow > 0 {
            lines.push(format!("...and {} more droplets", overflow));
        }
    }
    lines
}

fn budget_line(entry: &BudgetEntry, evaluation: Option<&ThresholdEvaluation>) -> String {
    let marker = match evaluation {
        Some(e) if e.exceeded => "⚠️",
        _ => "✅",
    };
    format!(
        "- {} {}: {} / {} {}",
        marker,
        entry.name,
        format_cost(entry.actual_spend),
        format_cost(entry.specified_amount),
        entry.currency
    )
}

/// Render a successful check as a Slack message.
///
/// Layout:
/// ```text
/// 📊 *DigitalOcean cost check (2024-05-01)*
/// - Account: DigitalOcean Account
/// - Estimated daily cost: *0.501333* USD
/// - Threshold: 0.1 USD
///
/// *Cost breakdown*
/// - Droplets: 0.168000 USD
/// ...
///
/// ⚠️ Cost exceeds the threshold!
/// ```
pub fn render_report(
    provider: Provider,
    account_label: &str,
    cost: &NormalizedCost,
    evaluation: &Evaluation,
) -> String {
    let date = cost.date().format("%Y-%m-%d").to_string();
    let mut lines = header(provider, &date, account_label);
    let mut remediation = false;

    match cost {
        NormalizedCost::Report { report, inventory } => {
            let label = if provider.is_estimated() {
                "Estimated daily cost"
            } else {
                "Daily cost"
            };
            lines.push(format!(
                "- {}: *{}* {}",
                label,
                format_cost(report.total_cost),
                report.currency
            ));
            lines.push(threshold_line(&evaluation.overall));
            lines.extend(breakdown_section(report));
            if let Some(inventory) = inventory {
                lines.extend(inventory_section(inventory));
                remediation = evaluation.overall.exceeded;
            }
        }
        NormalizedCost::Budgets { entries, .. } => {
            lines.push(threshold_line(&evaluation.overall));
            lines.push(String::new());
            lines.push("*Budgets*".to_string());
            if entries.is_empty() {
                lines.push("- No budgets found".to_string());
            }
            for (i, entry) in entries.iter().enumerate() {
                lines.push(budget_line(entry, evaluation.per_budget.get(i)));
            }
        }
    }

    lines.push(String::new());
    lines.push(verdict_line(evaluation.overall.exceeded).to_string());

    if remediation {
        lines.push(String::new());
        lines.push("*Cost reduction ideas*".to_string());
        lines.extend(REMEDIATION.iter().map(|r| format!("- {}", r)));
    }

    lines.join("\n")
}

/// Render an error notification.
pub fn render_failure(provider: Option<Provider>, error: &CheckError) -> String {
    let scope = match provider {
        Some(p) => format!(" ({})", p.display_name()),
        None => String::new(),
    };
    format!("{} *{}{}*\n```{}```", FAILURE_MARKER, FAILURE_TITLE, scope, error)
}
