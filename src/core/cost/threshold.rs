use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::cost::normalizer::NormalizedCost;

/// 0.1 USD.
pub fn default_threshold() -> Decimal {
    Decimal::new(1, 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdEvaluation {
    pub threshold: Decimal,
    pub exceeded: bool,
}

/// Strict comparison: a cost equal to the threshold is within bounds.
pub fn evaluate(cost: Decimal, threshold: Decimal) -> ThresholdEvaluation {
    ThresholdEvaluation {
        threshold,
        exceeded: cost > threshold,
    }
}

/// Verdict for a whole check, with per-budget detail on the budget path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub overall: ThresholdEvaluation,
    /// One entry per budget, in budget order. Empty for single figures.
    pub per_budget: Vec<ThresholdEvaluation>,
}

/// Budgets are judged one by one; the check is exceeded if any of them is.
pub fn evaluate_normalized(cost: &NormalizedCost, threshold: Decimal) -> Evaluation {
    match cost {
        NormalizedCost::Report { report, .. } => Evaluation {
            overall: evaluate(report.total_cost, threshold),
            per_budget: Vec::new(),
        },
        NormalizedCost::Budgets { entries, .. } => {
            let per_budget: Vec<ThresholdEvaluation> = entries
                .iter()
                .map(|e| evaluate(e.actual_spend, threshold))
                .collect();
            let exceeded = per_budget.iter().any(|e| e.exceeded);
            Evaluation {
                overall: ThresholdEvaluation {
                    threshold,
                    exceeded,
                },
                per_budget,
            }
        }
    }
}
