//! Seasonal auto-selected ARIMA back-end.
//!
//! Order selection:
//! 1. `d ∈ {0, 1}`: difference once when the lag-1 autocorrelation indicates a unit root.
//! 2. `D ∈ {0, 1}`: difference seasonally (period 24) when at least three seasons are
//!    available and the lag-24 autocorrelation of the differenced series is strong.
//! 3. `p ∈ 0..=max_p`, `P ∈ {0, 1}`: every AR candidate is fitted by least squares on
//!    a common sample and the lowest AIC wins. An intercept (drift) is included while
//!    `d + D < 2`.
//!
//! Forecasts are produced recursively on the differenced scale and integrated back.

use super::backend::ForecastBackend;
use super::resample::future_hours;
use crate::domain::{PricePoint, Series};
use crate::error::ForecastError;
use tracing::debug;

const MODEL: &str = "auto_arima";
const UNIT_ROOT_ACF: f64 = 0.9;
const SEASONAL_ACF: f64 = 0.64;
const MIN_FIT_ROWS: usize = 8;

/// Auto-ARIMA with a fixed seasonal period.
#[derive(Debug, Clone)]
pub struct AutoArima {
    season: usize,
    max_p: usize,
}

impl Default for AutoArima {
    fn default() -> Self {
        Self {
            season: 24,
            max_p: 3,
        }
    }
}

/// Selected model orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub intercept: bool,
}

impl std::fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ARIMA({},{},0)({},{},0)",
            self.p, self.d, self.seasonal_p, self.seasonal_d
        )
    }
}

/// A fitted AR model on the differenced series.
#[derive(Debug, Clone)]
struct ArFit {
    order: ArimaOrder,
    coef: Vec<f64>,
    aic: f64,
}

impl AutoArima {
    pub fn new(season: usize, max_p: usize) -> Self {
        Self {
            season: season.max(2),
            max_p,
        }
    }

    /// Fit `y` and forecast `horizon` steps. Returns the predictions and the chosen order.
    pub fn forecast_values(
        &self,
        y: &[f64],
        horizon: usize,
    ) -> Result<(Vec<f64>, ArimaOrder), ForecastError> {
        if y.len() < 2 {
            return Err(ForecastError::Model {
                model: MODEL,
                message: format!("needs at least 2 points, got {}", y.len()),
            });
        }
        let s = self.season;

        let d = usize::from(y.len() > 3 && autocorrelation(y, 1) > UNIT_ROOT_ACF);
        let w = if d == 1 { difference(y, 1) } else { y.to_vec() };

        let seasonal_d = usize::from(w.len() >= 3 * s && autocorrelation(&w, s) > SEASONAL_ACF);
        let z = if seasonal_d == 1 { difference(&w, s) } else { w.clone() };

        let intercept = d + seasonal_d < 2;
        let fit = self.select(&z, d, seasonal_d, intercept);
        debug!(order = %fit.order, aic = fit.aic, "auto ARIMA order selected");

        // Recursive forecast on the differenced scale.
        let mut hist = z;
        for _ in 0..horizon {
            let next = predict_next(&hist, &fit.order, &fit.coef, s);
            hist.push(next);
        }
        let z_hat = hist.split_off(hist.len() - horizon);

        // Undo the seasonal difference, then the ordinary one.
        let w_hat = if seasonal_d == 1 {
            let mut ext = w;
            for &v in &z_hat {
                let back = ext[ext.len() - s];
                ext.push(v + back);
            }
            ext.split_off(ext.len() - horizon)
        } else {
            z_hat
        };
        let y_hat = if d == 1 {
            let mut prev = y[y.len() - 1];
            w_hat
                .into_iter()
                .map(|v| {
                    prev += v;
                    prev
                })
                .collect()
        } else {
            w_hat
        };

        if y_hat.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::Model {
                model: MODEL,
                message: format!("{} produced non-finite forecasts", fit.order),
            });
        }
        Ok((y_hat, fit.order))
    }

    /// Choose `p` and `P` by AIC on a common estimation sample.
    fn select(&self, z: &[f64], d: usize, seasonal_d: usize, intercept: bool) -> ArFit {
        let s = self.season;
        let max_p = (0..=self.max_p)
            .rev()
            .find(|&p| z.len() >= p + MIN_FIT_ROWS)
            .unwrap_or(0);
        let seasonal_allowed = z.len() >= 2 * s + MIN_FIT_ROWS;
        let start = if seasonal_allowed { max_p.max(s) } else { max_p };

        let mut best: Option<ArFit> = None;
        if z.len() >= start + MIN_FIT_ROWS {
            for p in 0..=max_p {
                for seasonal_p in 0..=usize::from(seasonal_allowed) {
                    let order = ArimaOrder {
                        p,
                        d,
                        seasonal_p,
                        seasonal_d,
                        intercept,
                    };
                    let Some(fit) = fit_ar(z, order, s, start) else {
                        continue;
                    };
                    if best.as_ref().map_or(true, |b| fit.aic < b.aic) {
                        best = Some(fit);
                    }
                }
            }
        }

        // Too little data for any candidate: drift (or random walk) on the differences.
        best.unwrap_or_else(|| {
            let mean = if z.is_empty() {
                0.0
            } else {
                z.iter().sum::<f64>() / z.len() as f64
            };
            ArFit {
                order: ArimaOrder {
                    p: 0,
                    d,
                    seasonal_p: 0,
                    seasonal_d,
                    intercept,
                },
                coef: if intercept { vec![mean] } else { Vec::new() },
                aic: f64::INFINITY,
            }
        })
    }
}

impl ForecastBackend for AutoArima {
    fn name(&self) -> &'static str {
        MODEL
    }

    fn fit_and_predict(&self, series: &Series, horizon: usize) -> Result<Series, ForecastError> {
        let last = series.last().ok_or_else(|| ForecastError::Model {
            model: MODEL,
            message: "empty series".into(),
        })?;
        let (values, _) = self.forecast_values(&series.prices(), horizon)?;
        let points = future_hours(last.timestamp, horizon)
            .into_iter()
            .zip(values)
            .map(|(ts, price)| PricePoint::new(ts, price))
            .collect();
        Ok(Series::new(series.asset_id.clone(), points))
    }
}

// ── Estimation helpers ──────────────────────────────────────────────

fn difference(y: &[f64], lag: usize) -> Vec<f64> {
    (lag..y.len()).map(|t| y[t] - y[t - lag]).collect()
}

/// Sample autocorrelation at `lag`; 0 for degenerate inputs.
fn autocorrelation(x: &[f64], lag: usize) -> f64 {
    let n = x.len();
    if n <= lag + 1 {
        return 0.0;
    }
    let mean = x.iter().sum::<f64>() / n as f64;
    let denom: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    let num: f64 = (lag..n).map(|t| (x[t] - mean) * (x[t - lag] - mean)).sum();
    num / denom
}

/// Regressor row for predicting `z[t]`.
fn regressors(z: &[f64], t: usize, order: &ArimaOrder, s: usize) -> Vec<f64> {
    let mut row = Vec::with_capacity(order.p + order.seasonal_p + 1);
    if order.intercept {
        row.push(1.0);
    }
    for lag in 1..=order.p {
        row.push(z[t - lag]);
    }
    if order.seasonal_p == 1 {
        row.push(z[t - s]);
    }
    row
}

fn predict_next(hist: &[f64], order: &ArimaOrder, coef: &[f64], s: usize) -> f64 {
    if coef.is_empty() {
        return 0.0;
    }
    regressors(hist, hist.len(), order, s)
        .iter()
        .zip(coef)
        .map(|(x, b)| x * b)
        .sum()
}

/// Least-squares AR fit on rows `start..z.len()`. `None` when singular.
fn fit_ar(z: &[f64], order: ArimaOrder, s: usize, start: usize) -> Option<ArFit> {
    let k = usize::from(order.intercept) + order.p + order.seasonal_p;
    let m = z.len().checked_sub(start)?;
    if m < k + 2 {
        return None;
    }

    let coef = if k == 0 {
        Vec::new()
    } else {
        let mut xtx = vec![vec![0.0; k]; k];
        let mut xty = vec![0.0; k];
        for t in start..z.len() {
            let x = regressors(z, t, &order, s);
            for i in 0..k {
                xty[i] += x[i] * z[t];
                for j in 0..k {
                    xtx[i][j] += x[i] * x[j];
                }
            }
        }
        solve(xtx, xty)?
    };

    let rss: f64 = (start..z.len())
        .map(|t| {
            let fitted = predict_next(&z[..t], &order, &coef, s);
            (z[t] - fitted).powi(2)
        })
        .sum();
    let aic = m as f64 * (rss / m as f64).max(1e-12).ln() + 2.0 * k as f64;

    Some(ArFit { order, coef, aic })
}

/// Solve `a · x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-10 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for c in col..n {
                a[row][c] -= factor * a[col][c];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|c| a[row][c] * x[c]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn hourly(values: &[f64]) -> Series {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Series::new(
            "bitcoin",
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| PricePoint::new(start + Duration::hours(i as i64), v))
                .collect(),
        )
    }

    #[test]
    fn solve_small_system() {
        let x = solve(vec![vec![2.0, 1.0], vec![1.0, 3.0]], vec![5.0, 10.0]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn singular_system_is_rejected() {
        assert!(solve(vec![vec![1.0, 2.0], vec![2.0, 4.0]], vec![1.0, 2.0]).is_none());
    }

    #[test]
    fn constant_series_forecasts_constant() {
        let (values, order) = AutoArima::default().forecast_values(&[42.0; 30], 5).unwrap();
        assert_eq!(order.d, 0);
        for v in values {
            assert!((v - 42.0).abs() < 1e-9);
        }
    }

    #[test]
    fn linear_trend_is_extrapolated() {
        let y: Vec<f64> = (0..40).map(|i| 10.0 + 0.5 * i as f64).collect();
        let (values, order) = AutoArima::default().forecast_values(&y, 3).unwrap();
        assert_eq!(order.d, 1);
        for (h, v) in values.iter().enumerate() {
            let expected = 10.0 + 0.5 * (40 + h) as f64;
            assert!((v - expected).abs() < 1e-6, "step {h}: {v} vs {expected}");
        }
    }

    #[test]
    fn daily_seasonality_is_repeated() {
        let pattern: Vec<f64> = (0..24)
            .map(|h| 100.0 + 10.0 * (h as f64 * std::f64::consts::TAU / 24.0).sin())
            .collect();
        let y: Vec<f64> = pattern.iter().cycle().take(24 * 4).copied().collect();

        let (values, order) = AutoArima::default().forecast_values(&y, 24).unwrap();
        assert_eq!(order.seasonal_d, 1);
        for (v, expected) in values.iter().zip(&pattern) {
            assert!((v - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn short_series_still_forecasts() {
        let out = AutoArima::default()
            .fit_and_predict(&hourly(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), 4)
            .unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.prices().iter().all(|v| v.is_finite()));
    }
}
