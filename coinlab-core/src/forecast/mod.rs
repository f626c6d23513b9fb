//! Forecaster: history → hourly series → model → cached forecast.
//!
//! Pipeline per request:
//! 1. Load the asset's full history from the store.
//! 2. Resample to one point per hour (last value at or before each hour, forward-filled).
//! 3. Fewer than `min_points` hourly points: repeat the last price (`flat_line`).
//!    `min_points` is never below [`MIN_MODEL_POINTS`].
//!    Otherwise run the back-end chosen at startup.
//! 4. Memoize by `(asset, horizon)` until [`Forecaster::clear_cache`].
//!
//! Unknown assets (no stored rows) are retried once with the default asset.

#[cfg(feature = "seasonal-arima")]
pub mod arima;
pub mod backend;
pub mod cache;
pub mod holt;
pub mod resample;

pub use backend::{select_backend, ForecastBackend};
pub use cache::ForecastCache;
pub use resample::{future_hours, resample_hourly};

use crate::config::PipelineConfig;
use crate::domain::{normalize_asset_id, Forecast, PricePoint, Series};
use crate::error::ForecastError;
use crate::store::PartitionedStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_HORIZON: usize = 24;
pub const FLAT_LINE_MODEL: &str = "flat_line";
/// Fewest hourly points any back-end can fit.
pub const MIN_MODEL_POINTS: usize = 2;

/// Produces and caches forecasts for stored assets.
pub struct Forecaster {
    store: Arc<PartitionedStore>,
    backend: Box<dyn ForecastBackend>,
    cache: ForecastCache,
    default_asset: String,
    min_points: usize,
}

impl Forecaster {
    pub fn new(
        store: Arc<PartitionedStore>,
        backend: Box<dyn ForecastBackend>,
        default_asset: impl Into<String>,
        cache_size: usize,
        min_points: usize,
    ) -> Self {
        Self {
            store,
            backend,
            cache: ForecastCache::new(cache_size),
            default_asset: default_asset.into(),
            min_points: min_points.max(MIN_MODEL_POINTS),
        }
    }

    pub fn from_config(config: &PipelineConfig, store: Arc<PartitionedStore>) -> Self {
        Self::new(
            store,
            select_backend(config.backend),
            config.default_asset.clone(),
            config.forecast_cache_size,
            config.min_forecast_points,
        )
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn default_asset(&self) -> &str {
        &self.default_asset
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Forecast `horizon` hourly prices for `asset_id`.
    ///
    /// The id is trimmed and lowercased; an empty `asset_id` means the default asset.
    /// When the asset has no stored data and is not the default, the default asset's
    /// forecast is returned instead.
    pub fn forecast(
        &self,
        asset_id: &str,
        horizon: usize,
    ) -> Result<Arc<Forecast>, ForecastError> {
        if horizon == 0 {
            return Err(ForecastError::InvalidHorizon);
        }
        let requested = normalize_asset_id(asset_id);
        let asset_id = if requested.is_empty() {
            self.default_asset.as_str()
        } else {
            requested.as_str()
        };

        match self.cached_forecast(asset_id, horizon) {
            Err(e) if e.is_no_data() && asset_id != self.default_asset => {
                warn!(
                    asset = asset_id,
                    default = %self.default_asset,
                    error = %e,
                    "no data for asset, falling back to default"
                );
                self.cached_forecast(&self.default_asset, horizon)
            }
            other => other,
        }
    }

    /// Drop every memoized forecast. Called after each successful ingestion.
    pub fn clear_cache(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        debug!(dropped, "forecast cache cleared");
    }

    fn cached_forecast(
        &self,
        asset_id: &str,
        horizon: usize,
    ) -> Result<Arc<Forecast>, ForecastError> {
        if let Some(hit) = self.cache.get(asset_id, horizon) {
            debug!(asset = asset_id, horizon, "forecast cache hit");
            return Ok(hit);
        }
        let generation = self.cache.generation();
        let forecast = Arc::new(self.compute(asset_id, horizon)?);
        if !self
            .cache
            .put(asset_id, horizon, Arc::clone(&forecast), generation)
        {
            debug!(asset = asset_id, horizon, "cache cleared during fit, result not cached");
        }
        Ok(forecast)
    }

    fn compute(&self, asset_id: &str, horizon: usize) -> Result<Forecast, ForecastError> {
        let history = self.store.load_history(asset_id, None)?;
        let hourly = resample_hourly(&history);

        let (model, predicted) = if hourly.len() < self.min_points {
            info!(
                asset = asset_id,
                points = hourly.len(),
                min_points = self.min_points,
                "series too short, using flat-line forecast"
            );
            (FLAT_LINE_MODEL, flat_line(&hourly, horizon)?)
        } else {
            let predicted = self.backend.fit_and_predict(&hourly, horizon)?;
            (self.backend.name(), predicted)
        };

        if predicted.len() != horizon {
            return Err(ForecastError::Model {
                model: self.backend.name(),
                message: format!("expected {horizon} points, got {}", predicted.len()),
            });
        }

        info!(
            asset = asset_id,
            horizon,
            model,
            history = history.len(),
            hourly = hourly.len(),
            "forecast computed"
        );
        Ok(Forecast {
            asset_id: asset_id.to_string(),
            model: model.to_string(),
            prices: predicted.prices(),
            timestamps: predicted.timestamps(),
        })
    }
}

/// Repeat the last price `horizon` times at the following hours.
fn flat_line(hourly: &Series, horizon: usize) -> Result<Series, ForecastError> {
    let last = hourly.last().ok_or_else(|| ForecastError::Model {
        model: FLAT_LINE_MODEL,
        message: "empty series".into(),
    })?;
    let points = future_hours(last.timestamp, horizon)
        .into_iter()
        .map(|ts| PricePoint::new(ts, last.price))
        .collect();
    Ok(Series::new(hourly.asset_id.clone(), points))
}
