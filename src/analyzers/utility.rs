/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sum divided by count, or 0.0 when there is nothing to divide by.
pub fn safe_div(sum: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Rounds to `decimals` places for presentation, halves toward +infinity
/// (`-0.125` to 2 places is `-0.12`).
///
/// This is the only place analyzer output gets rounded.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    round_half_up(value * factor) / factor
}

/// Nearest integer, with halves going toward +infinity.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
