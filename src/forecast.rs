//! Monthly sales forecasters.
//!
//! Every method takes consecutive monthly totals (oldest first, possibly
//! empty) and returns exactly `horizon` future values. None of them fail:
//! missing history degrades to zero forecasts.

use crate::schema::{ForecastMethod, ForecastWeights};

/// Number of trailing months averaged by [`forecast_avg6m`].
pub const MOVING_AVERAGE_WINDOW: usize = 6;

/// Smoothing constant used by [`forecast_exp`].
pub const SMOOTHING_ALPHA: f64 = 0.5;

/// Mean of the last six months (fewer if the series is shorter), flat across
/// the horizon.
pub fn forecast_avg6m(series: &[f64], horizon: usize) -> Vec<f64> {
    let start = series.len().saturating_sub(MOVING_AVERAGE_WINDOW);
    let window = &series[start..];
    let mean = if window.is_empty() {
        0.0
    } else {
        window.iter().sum::<f64>() / window.len() as f64
    };
    vec![mean; horizon]
}

/// Ordinary least squares line over t = 1..n, extrapolated to n + k.
///
/// Fewer than two points carry no slope, so the moving average is used
/// instead. The extrapolation is not clamped and may go negative.
pub fn forecast_trend(series: &[f64], horizon: usize) -> Vec<f64> {
    let n = series.len();
    if n < 2 {
        return forecast_avg6m(series, horizon);
    }

    let (mut sum_t, mut sum_y, mut sum_tt, mut sum_ty) = (0.0, 0.0, 0.0, 0.0);
    for (i, &y) in series.iter().enumerate() {
        let t = (i + 1) as f64;
        sum_t += t;
        sum_y += y;
        sum_tt += t * t;
        sum_ty += t * y;
    }

    let nf = n as f64;
    let denom = nf * sum_tt - sum_t * sum_t;
    let denom = if denom == 0.0 { 1.0 } else { denom };
    let slope = (nf * sum_ty - sum_t * sum_y) / denom;
    let intercept = (sum_y - slope * sum_t) / nf;

    (1..=horizon)
        .map(|k| intercept + slope * (nf + k as f64))
        .collect()
}

/// Simple exponential smoothing with alpha 0.5, flat across the horizon.
pub fn forecast_exp(series: &[f64], horizon: usize) -> Vec<f64> {
    forecast_exp_with_alpha(series, horizon, SMOOTHING_ALPHA)
}

/// Same recurrence as [`forecast_exp`] with a caller-chosen alpha.
pub fn forecast_exp_with_alpha(series: &[f64], horizon: usize, alpha: f64) -> Vec<f64> {
    let Some((&first, rest)) = series.split_first() else {
        return vec![0.0; horizon];
    };

    let level = rest
        .iter()
        .fold(first, |s, &y| alpha * y + (1.0 - alpha) * s);

    vec![level; horizon]
}

/// Blends the three base methods with normalized `weights`.
pub fn forecast_weighted(series: &[f64], horizon: usize, weights: &ForecastWeights) -> Vec<f64> {
    let p = weights.normalized();
    let avg = forecast_avg6m(series, horizon);
    let trend = forecast_trend(series, horizon);
    let exp = forecast_exp(series, horizon);

    avg.iter()
        .zip(trend.iter())
        .zip(exp.iter())
        .map(|((a, b), c)| p.avg6 * a + p.trend * b + p.exp * c)
        .collect()
}

/// Runs `method` over `series`. `weights` is only read by the weighted blend.
pub fn forecast(
    method: ForecastMethod,
    series: &[f64],
    horizon: usize,
    weights: &ForecastWeights,
) -> Vec<f64> {
    match method {
        ForecastMethod::MovingAverage6 => forecast_avg6m(series, horizon),
        ForecastMethod::Trend => forecast_trend(series, horizon),
        ForecastMethod::Exponential => forecast_exp(series, horizon),
        ForecastMethod::Weighted => forecast_weighted(series, horizon, weights),
    }
}

/// First forecast step, or 0 when the horizon produced nothing usable.
pub fn forecast_next(method: ForecastMethod, series: &[f64], weights: &ForecastWeights) -> f64 {
    forecast(method, series, 1, weights)
        .first()
        .copied()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAMP: [f64; 6] = [1000.0, 1100.0, 1200.0, 1300.0, 1400.0, 1500.0];

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_avg6m_uses_trailing_six() {
        let series = [100.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let out = forecast_avg6m(&series, 3);
        assert_eq!(out.len(), 3);
        for v in out {
            assert_close(v, 3.5, 1e-12);
        }

        assert_eq!(forecast_avg6m(&[10.0, 20.0], 2), vec![15.0, 15.0]);
        assert_eq!(forecast_avg6m(&[], 4), vec![0.0; 4]);
    }

    #[test]
    fn test_trend_closed_form() {
        let out = forecast_trend(&[10.0, 20.0, 30.0], 2);
        assert_close(out[0], 40.0, 1e-9);
        assert_close(out[1], 50.0, 1e-9);

        let ramp = forecast_trend(&RAMP, 1);
        assert_close(ramp[0], 1600.0, 1e-9);
    }

    #[test]
    fn test_trend_short_series_falls_back() {
        assert_eq!(forecast_trend(&[42.0], 2), vec![42.0, 42.0]);
        assert_eq!(forecast_trend(&[], 1), vec![0.0]);
    }

    #[test]
    fn test_trend_is_not_clamped() {
        let out = forecast_trend(&[300.0, 200.0, 100.0], 2);
        assert_close(out[0], 0.0, 1e-9);
        assert_close(out[1], -100.0, 1e-9);
    }

    #[test]
    fn test_exp_smoothing() {
        assert_eq!(forecast_exp(&[100.0], 3), vec![100.0; 3]);
        assert_eq!(forecast_exp(&[100.0, 200.0], 1), vec![150.0]);
        assert_eq!(forecast_exp(&[], 2), vec![0.0, 0.0]);

        let level = forecast_exp(&RAMP, 1)[0];
        assert_close(level, 1403.125, 1e-9);
    }

    #[test]
    fn test_exp_with_custom_alpha() {
        let out = forecast_exp_with_alpha(&[100.0, 200.0], 1, 0.25);
        assert_close(out[0], 125.0, 1e-12);
    }

    #[test]
    fn test_weighted_matches_single_method_weights() {
        let series = [5.0, 9.0, 4.0, 12.0, 7.0, 3.0, 11.0];
        for horizon in 1..=4 {
            let only_avg = forecast_weighted(&series, horizon, &ForecastWeights::new(1.0, 0.0, 0.0));
            assert_eq!(only_avg, forecast_avg6m(&series, horizon));

            let only_exp = forecast_weighted(&series, horizon, &ForecastWeights::new(0.0, 0.0, 7.0));
            assert_eq!(only_exp, forecast_exp(&series, horizon));
        }
    }

    #[test]
    fn test_weighted_default_blend() {
        let out = forecast_weighted(&RAMP, 1, &ForecastWeights::default());
        // 0.2 * 1250 + 0.3 * 1600 + 0.5 * 1403.125
        assert_close(out[0], 1431.5625, 1e-9);
    }

    #[test]
    fn test_weighted_zero_weights_yield_zero() {
        let out = forecast_weighted(&RAMP, 2, &ForecastWeights::new(0.0, 0.0, 0.0));
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn test_every_method_honours_horizon() {
        let weights = ForecastWeights::default();
        for method in ForecastMethod::ALL {
            for series in [&[][..], &[7.0][..], &RAMP[..]] {
                assert_eq!(forecast(method, series, 5, &weights).len(), 5);
            }
        }
    }

    #[test]
    fn test_forecast_next_on_empty_series() {
        for method in ForecastMethod::ALL {
            assert_eq!(forecast_next(method, &[], &ForecastWeights::default()), 0.0);
        }
    }
}
