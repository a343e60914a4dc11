use colored::{control, Colorize};

use crate::core::formatter::format_cost;
use crate::core::pipeline::InvocationResult;

const LABEL_WIDTH: usize = 9;

fn row(label: &str, value: impl std::fmt::Display) -> String {
    format!("  {:<width$} {}", label, value, width = LABEL_WIDTH)
}

/// Render a check outcome as a colored (or plain) string.
///
/// Layout:
/// ```text
///  DigitalOcean (2024-05-01)
///   Cost      0.501333 USD
///   Result    Over threshold
/// ```
pub fn render_result(result: &InvocationResult, use_color: bool) -> String {
    control::set_override(use_color);

    let name = result
        .provider
        .map(|p| p.display_name())
        .unwrap_or("Cost check");
    let header = match result.date {
        Some(date) => format!(" {} ({})", name, date.format("%Y-%m-%d")),
        None => format!(" {}", name),
    };

    let mut lines = vec![header.bold().to_string()];

    if let Some(cost) = result.cost {
        lines.push(row("Cost", format!("{} USD", format_cost(cost))));
    }

    let verdict = match (result.success, result.exceeded) {
        (false, _) => "Failed".red().bold(),
        (true, Some(true)) => "Over threshold".yellow().bold(),
        (true, _) => "Within threshold".green(),
    };
    lines.push(row("Result", verdict));

    if let Some(err) = &result.error {
        lines.push(row("Error", err.red()));
    }

    lines.join("\n")
}
