//! Forecasting back-ends.
//!
//! A back-end fits a regular hourly series and predicts `horizon` further hours.
//! The back-end is chosen once at startup and injected into the forecaster:
//! the seasonal auto-ARIMA back-end when it is compiled in (`seasonal-arima`
//! feature), damped Holt smoothing otherwise.

use super::holt::DampedHolt;
use crate::config::BackendPreference;
use crate::domain::Series;
use crate::error::ForecastError;
use tracing::{info, warn};

/// Strategy interface shared by every forecasting model.
pub trait ForecastBackend: Send + Sync {
    /// Model name reported with each forecast.
    fn name(&self) -> &'static str;

    /// Fit `series` (one point per hour, ascending) and return `horizon` predicted
    /// points at the hours following its last point.
    fn fit_and_predict(&self, series: &Series, horizon: usize) -> Result<Series, ForecastError>;
}

/// Pick the back-end for this process.
pub fn select_backend(preference: BackendPreference) -> Box<dyn ForecastBackend> {
    let backend = match preference {
        BackendPreference::Holt => Box::new(DampedHolt::default()) as Box<dyn ForecastBackend>,
        BackendPreference::Auto => preferred_backend().unwrap_or_else(|| {
            warn!("seasonal ARIMA back-end not compiled in, using damped Holt smoothing");
            Box::new(DampedHolt::default())
        }),
    };
    info!(backend = backend.name(), "forecast back-end selected");
    backend
}

#[cfg(feature = "seasonal-arima")]
fn preferred_backend() -> Option<Box<dyn ForecastBackend>> {
    Some(Box::new(super::arima::AutoArima::default()))
}

#[cfg(not(feature = "seasonal-arima"))]
fn preferred_backend() -> Option<Box<dyn ForecastBackend>> {
    None
}
