use crate::schema::MonthKey;

/// Markup factor used when neither the supplier nor the parameter store has one.
pub const DEFAULT_FACTOR: f64 = 1.70;

/// Raw factors above this are read as "times 100" entries (170 means 1.70).
pub const FACTOR_SCALE_THRESHOLD: f64 = 10.0;

/// Parameter-store key holding the global default markup factor.
pub const DEFAULT_FACTOR_PARAM: &str = "factor_utilidad_default";

/// Normalizes a supplier markup factor to its decimal form.
///
/// A missing `raw` takes the fallback's place. Non-finite or non-positive
/// values resolve to the fallback. The fallback is already in decimal form and
/// is not rescaled; an unusable fallback is replaced by [`DEFAULT_FACTOR`].
///
/// The `> 10` scale detection is a legacy data-entry convenience: factors are
/// stored without a unit, so magnitude is the only hint. It is not idempotent
/// above 10, so apply it once, to raw stored values only; see [`ensure_factor`].
pub fn normalize_factor(raw: Option<f64>, fallback: f64) -> f64 {
    raw.and_then(scale_factor)
        .unwrap_or_else(|| ensure_factor(fallback, DEFAULT_FACTOR))
}

fn scale_factor(value: f64) -> Option<f64> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    let scaled = if value > FACTOR_SCALE_THRESHOLD {
        value / 100.0
    } else {
        value
    };

    scaled.is_normal().then_some(scaled)
}

/// Keeps a factor that was already normalized. An unusable value takes the
/// fallback, and an unusable fallback takes [`DEFAULT_FACTOR`].
pub fn ensure_factor(factor: f64, fallback: f64) -> f64 {
    [factor, fallback]
        .into_iter()
        .find(|f| f.is_normal() && *f > 0.0)
        .unwrap_or(DEFAULT_FACTOR)
}

/// Resolves the global default factor from the optional stored parameter.
pub fn resolve_default_factor(param: Option<f64>) -> f64 {
    normalize_factor(param, DEFAULT_FACTOR)
}

/// Rescales non-negative weights so they sum to 1.
///
/// Negative and NaN entries count as 0. When everything is 0 the divisor
/// falls back to 1 and the output is all zeros.
pub fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let safe: Vec<f64> = weights
        .iter()
        .map(|w| if w.is_nan() { 0.0 } else { w.max(0.0) })
        .collect();

    let sum: f64 = safe.iter().sum();
    let divisor = if sum == 0.0 { 1.0 } else { sum };

    safe.iter().map(|w| w / divisor).collect()
}

/// Non-finite amounts count as zero.
pub fn sanitize_amount(amount: f64) -> f64 {
    if amount.is_finite() {
        amount
    } else {
        0.0
    }
}

/// Parses a money string typed in either `12,345.67` or `12345,67` style.
///
/// Whitespace is dropped. A single comma without a dot is a decimal
/// separator; every other comma is a thousands separator. Anything that does
/// not parse to a finite number yields 0.
pub fn parse_money(input: &str) -> f64 {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return 0.0;
    }

    let has_dot = compact.contains('.');
    let commas = compact.matches(',').count();

    let normalized = if !has_dot && commas == 1 {
        compact.replace(',', ".")
    } else {
        compact.replace(',', "")
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Every month from `start` to `end`, both inclusive. Empty when `end < start`.
pub fn month_range(start: MonthKey, end: MonthKey) -> Vec<MonthKey> {
    let count = start.months_until(&end) + 1;
    (0..count.max(0)).map(|i| start.add_months(i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_normalize_factor() {
        assert!((normalize_factor(Some(170.0), DEFAULT_FACTOR) - 1.70).abs() < 1e-12);
        assert!((normalize_factor(Some(1.70), DEFAULT_FACTOR) - 1.70).abs() < 1e-12);
        assert!((normalize_factor(Some(182.0), DEFAULT_FACTOR) - 1.82).abs() < 1e-12);
        assert_eq!(normalize_factor(Some(10.0), DEFAULT_FACTOR), 10.0);

        assert_eq!(normalize_factor(Some(0.0), 2.5), 2.5);
        assert_eq!(normalize_factor(Some(-5.0), 2.5), 2.5);
        assert_eq!(normalize_factor(Some(f64::NAN), 2.5), 2.5);
        assert_eq!(normalize_factor(Some(f64::INFINITY), 2.5), 2.5);
        assert_eq!(normalize_factor(None, 2.5), 2.5);
    }

    #[test]
    fn test_normalize_factor_never_returns_unusable_fallback() {
        assert_eq!(normalize_factor(None, 0.0), DEFAULT_FACTOR);
        assert_eq!(normalize_factor(Some(-1.0), f64::NAN), DEFAULT_FACTOR);
        assert_eq!(normalize_factor(Some(f64::MIN_POSITIVE / 4.0), 3.0), 3.0);
    }

    #[test]
    fn test_normalize_factor_scales_raw_value_only() {
        assert!((normalize_factor(Some(1500.0), DEFAULT_FACTOR) - 15.0).abs() < 1e-12);
        assert_eq!(normalize_factor(Some(0.0), 15.0), 15.0);
        assert_eq!(normalize_factor(None, 15.0), 15.0);
    }

    #[test]
    fn test_ensure_factor_does_not_rescale() {
        assert_eq!(ensure_factor(15.0, DEFAULT_FACTOR), 15.0);
        assert_eq!(ensure_factor(1.82, DEFAULT_FACTOR), 1.82);
        assert_eq!(ensure_factor(0.0, 2.5), 2.5);
        assert_eq!(ensure_factor(f64::NAN, f64::NAN), DEFAULT_FACTOR);
    }

    #[test]
    fn test_resolve_default_factor() {
        assert_eq!(resolve_default_factor(None), DEFAULT_FACTOR);
        assert!((resolve_default_factor(Some(165.0)) - 1.65).abs() < 1e-12);
        assert_eq!(resolve_default_factor(Some(-3.0)), DEFAULT_FACTOR);
    }

    #[test]
    fn test_normalize_weights_scale_invariant() {
        let a = normalize_weights(&[2.0, 3.0, 5.0]);
        let b = normalize_weights(&[20.0, 30.0, 50.0]);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
        assert!((a[0] - 0.2).abs() < 1e-12);
        assert!((a[1] - 0.3).abs() < 1e-12);
        assert!((a[2] - 0.5).abs() < 1e-12);

        let again = normalize_weights(&a);
        for (x, y) in a.iter().zip(again.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_normalize_weights_zero_and_negative() {
        assert_eq!(normalize_weights(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
        assert_eq!(normalize_weights(&[-1.0, f64::NAN, 4.0]), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("12,345.67"), 12345.67);
        assert_eq!(parse_money("12 345,67"), 12345.67);
        assert_eq!(parse_money("1,234,567"), 1234567.0);
        assert_eq!(parse_money(" 250 "), 250.0);
        assert_eq!(parse_money(""), 0.0);
        assert_eq!(parse_money("abc"), 0.0);
        assert_eq!(parse_money("inf"), 0.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(727.3049, 2), 727.3);
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(-2.5, 0), -3.0);
    }

    #[test]
    fn test_month_range() {
        let months = month_range(month("2023-11"), month("2024-02"));
        let labels: Vec<String> = months.iter().map(|m| m.to_string()).collect();
        assert_eq!(labels, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);

        assert_eq!(month_range(month("2024-02"), month("2024-02")).len(), 1);
        assert!(month_range(month("2024-03"), month("2024-02")).is_empty());
    }
}
