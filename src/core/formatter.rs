use rust_decimal::{Decimal, RoundingStrategy};

/// Returns `amount` with exactly `places` decimals, rounding half away from
/// zero and padding with zeros.
pub fn format_fixed(amount: Decimal, places: u32) -> String {
    let mut rounded = amount.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(places);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded.to_string()
}

/// Headline and breakdown figures: "0.501333".
pub fn format_cost(amount: Decimal) -> String {
    format_fixed(amount, 6)
}

/// Per-item daily price: "0.1680".
pub fn format_item_price(amount: Decimal) -> String {
    format_fixed(amount, 4)
}

/// Threshold as configured, without trailing zeros: "0.1".
pub fn format_threshold(threshold: Decimal) -> String {
    threshold.normalize().to_string()
}
