//! Series analytics: currency conversion, smoothing, range filters, returns and
//! rolling volatility.
//!
//! Outputs are aligned with the input series: one value per point, `None` where the
//! lookback is not yet available.

use crate::domain::{PricePoint, Series};
use crate::error::AnalyticsError;
use chrono::{DateTime, Utc};

const HOURS_PER_YEAR: f64 = 365.0 * 24.0;

fn check_window(name: &'static str, value: usize) -> Result<(), AnalyticsError> {
    if value < 1 {
        return Err(AnalyticsError::InvalidWindow { name, value });
    }
    Ok(())
}

/// Multiply every price by `rate`.
pub fn convert_currency(series: &Series, rate: f64) -> Result<Series, AnalyticsError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(AnalyticsError::InvalidRate(rate));
    }
    let points = series
        .points()
        .iter()
        .map(|p| PricePoint::new(p.timestamp, p.price * rate))
        .collect();
    Ok(Series::new(series.asset_id.clone(), points))
}

/// Trailing rolling mean over `window` points. The first points average what is
/// available (minimum one observation).
pub fn smooth(series: &Series, window: usize) -> Result<Series, AnalyticsError> {
    check_window("window", window)?;
    let prices = series.prices();
    let mut sum = 0.0;
    let points = series
        .points()
        .iter()
        .enumerate()
        .map(|(i, p)| {
            sum += prices[i];
            if i >= window {
                sum -= prices[i - window];
            }
            let n = (i + 1).min(window);
            PricePoint::new(p.timestamp, sum / n as f64)
        })
        .collect();
    Ok(Series::new(series.asset_id.clone(), points))
}

/// Points with `start <= timestamp <= end`.
pub fn filter_range(series: &Series, start: DateTime<Utc>, end: DateTime<Utc>) -> Series {
    let points = series
        .points()
        .iter()
        .filter(|p| p.timestamp >= start && p.timestamp <= end)
        .copied()
        .collect();
    Series::new(series.asset_id.clone(), points)
}

/// Simple returns `p[t] / p[t - periods] - 1`; `None` for the first `periods` points.
pub fn returns(series: &Series, periods: usize) -> Result<Vec<Option<f64>>, AnalyticsError> {
    check_window("periods", periods)?;
    let prices = series.prices();
    Ok((0..prices.len())
        .map(|i| {
            let base = prices[i.checked_sub(periods)?];
            (base != 0.0).then(|| prices[i] / base - 1.0)
        })
        .collect())
}

/// Rolling sample standard deviation of `returns` over `window` values.
///
/// A window containing a missing value yields `None`, as do windows of one value.
/// With `annualize`, values are scaled by `sqrt(8760 / freq_hours)`.
pub fn rolling_volatility(
    returns: &[Option<f64>],
    window: usize,
    annualize: bool,
    freq_hours: usize,
) -> Result<Vec<Option<f64>>, AnalyticsError> {
    check_window("window", window)?;
    check_window("freq_hours", freq_hours)?;
    let factor = if annualize {
        (HOURS_PER_YEAR / freq_hours as f64).sqrt()
    } else {
        1.0
    };

    Ok((0..returns.len())
        .map(|i| {
            if window < 2 || i + 1 < window {
                return None;
            }
            let values: Option<Vec<f64>> = returns[i + 1 - window..=i].iter().copied().collect();
            let values = values?;
            let mean = values.iter().sum::<f64>() / window as f64;
            let var =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
            Some(var.sqrt() * factor)
        })
        .collect())
}
