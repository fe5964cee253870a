/// Computes the arithmetic mean of a slice of values. Returns `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Percentage change of `current` relative to `baseline`.
///
/// Undefined (`None`) when the baseline is zero or either side is not finite.
pub fn pct_change(current: f64, baseline: f64) -> Option<f64> {
    if baseline == 0.0 || !baseline.is_finite() || !current.is_finite() {
        return None;
    }
    Some((current - baseline) / baseline * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
    }

    #[test]
    fn test_pct_change() {
        assert!((pct_change(110.0, 100.0).unwrap() - 10.0).abs() < 1e-9);
        assert!((pct_change(40.0, 50.0).unwrap() + 20.0).abs() < 1e-9);
        assert_eq!(pct_change(5.0, 0.0), None);
        assert_eq!(pct_change(5.0, f64::NAN), None);
        assert_eq!(pct_change(f64::NAN, 5.0), None);
    }
}
