//! Damped additive-trend exponential smoothing (Holt, damped).
//!
//! Level/trend recursions:
//!
//! ```text
//! l_t = α·y_t + (1 − α)·(l_{t−1} + φ·b_{t−1})
//! b_t = β·(l_t − l_{t−1}) + (1 − β)·φ·b_{t−1}
//! ŷ_{t+h} = l_t + (φ + φ² + … + φ^h)·b_t
//! ```
//!
//! Parameters are chosen by grid search over the one-step-ahead squared error.

use super::backend::ForecastBackend;
use super::resample::future_hours;
use crate::domain::{PricePoint, Series};
use crate::error::ForecastError;
use tracing::debug;

const MODEL: &str = "damped_holt";

/// Damped Holt model with its parameter search grid.
#[derive(Debug, Clone)]
pub struct DampedHolt {
    alphas: Vec<f64>,
    betas: Vec<f64>,
    phis: Vec<f64>,
}

impl Default for DampedHolt {
    fn default() -> Self {
        Self {
            alphas: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 0.99],
            betas: vec![0.01, 0.05, 0.1, 0.2, 0.3],
            phis: vec![0.8, 0.85, 0.9, 0.95, 0.98],
        }
    }
}

/// Final smoothing state after a fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoltState {
    pub alpha: f64,
    pub beta: f64,
    pub phi: f64,
    pub level: f64,
    pub trend: f64,
    pub sse: f64,
}

impl HoltState {
    /// Predict `horizon` steps ahead.
    pub fn predict(&self, horizon: usize) -> Vec<f64> {
        let mut damp = 0.0;
        let mut factor = 1.0;
        (0..horizon)
            .map(|_| {
                factor *= self.phi;
                damp += factor;
                self.level + damp * self.trend
            })
            .collect()
    }
}

impl DampedHolt {
    /// Run the recursions for one parameter set.
    fn run(y: &[f64], alpha: f64, beta: f64, phi: f64) -> HoltState {
        let mut level = y[0];
        let mut trend = y[1] - y[0];
        let mut sse = 0.0;
        for &obs in &y[1..] {
            let predicted = level + phi * trend;
            let err = obs - predicted;
            sse += err * err;
            let prev_level = level;
            level = alpha * obs + (1.0 - alpha) * predicted;
            trend = beta * (level - prev_level) + (1.0 - beta) * phi * trend;
        }
        HoltState {
            alpha,
            beta,
            phi,
            level,
            trend,
            sse,
        }
    }

    /// Fit the best parameters on `y`.
    pub fn fit(&self, y: &[f64]) -> Result<HoltState, ForecastError> {
        if y.len() < 2 {
            return Err(ForecastError::Model {
                model: MODEL,
                message: format!("needs at least 2 points, got {}", y.len()),
            });
        }

        let mut best: Option<HoltState> = None;
        for &alpha in &self.alphas {
            for &beta in &self.betas {
                for &phi in &self.phis {
                    let state = Self::run(y, alpha, beta, phi);
                    if !state.sse.is_finite() {
                        continue;
                    }
                    if best.map_or(true, |b| state.sse < b.sse) {
                        best = Some(state);
                    }
                }
            }
        }

        best.ok_or_else(|| ForecastError::Model {
            model: MODEL,
            message: "no parameter set produced a finite fit".into(),
        })
    }
}

impl ForecastBackend for DampedHolt {
    fn name(&self) -> &'static str {
        MODEL
    }

    fn fit_and_predict(&self, series: &Series, horizon: usize) -> Result<Series, ForecastError> {
        let last = series.last().ok_or_else(|| ForecastError::Model {
            model: MODEL,
            message: "empty series".into(),
        })?;
        let state = self.fit(&series.prices())?;
        debug!(
            alpha = state.alpha,
            beta = state.beta,
            phi = state.phi,
            sse = state.sse,
            "damped Holt fitted"
        );

        let points = future_hours(last.timestamp, horizon)
            .into_iter()
            .zip(state.predict(horizon))
            .map(|(ts, price)| PricePoint::new(ts, price))
            .collect();
        Ok(Series::new(series.asset_id.clone(), points))
    }
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
    fn constant_series_forecasts_constant() {
        let out = DampedHolt::default()
            .fit_and_predict(&hourly(&[50.0; 12]), 4)
            .unwrap();
        for price in out.prices() {
            assert!((price - 50.0).abs() < 1e-9);
        }
    }

    #[test]
    fn upward_trend_is_damped_but_rising() {
        let values: Vec<f64> = (0..30).map(|i| 100.0 + 2.0 * i as f64).collect();
        let out = DampedHolt::default().fit_and_predict(&hourly(&values), 6).unwrap();
        let prices = out.prices();

        assert!(prices[0] > 157.0);
        for w in prices.windows(2) {
            let step = w[1] - w[0];
            assert!(step > 0.0);
            assert!(step < 2.0 + 1e-9);
        }
    }

    #[test]
    fn timestamps_follow_last_point() {
        let series = hourly(&[1.0, 2.0, 3.0]);
        let out = DampedHolt::default().fit_and_predict(&series, 2).unwrap();
        let last = series.last().unwrap().timestamp;
        assert_eq!(
            out.timestamps(),
            vec![last + Duration::hours(1), last + Duration::hours(2)]
        );
    }

    #[test]
    fn too_short_series_is_an_error() {
        assert!(DampedHolt::default().fit(&[1.0]).is_err());
    }
}
