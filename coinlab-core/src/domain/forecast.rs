//! Forecast — a fixed-horizon prediction for one asset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Predicted prices and their hourly timestamps.
///
/// `prices.len() == timestamps.len() == horizon` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Asset whose history produced the prediction (the default asset after a fallback).
    pub asset_id: String,
    /// Name of the model that produced the values (`flat_line` for short series).
    pub model: String,
    pub prices: Vec<f64>,
    pub timestamps: Vec<DateTime<Utc>>,
}

impl Forecast {
    pub fn horizon(&self) -> usize {
        self.prices.len()
    }

    /// Pairs of (timestamp, price).
    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Utc>, &f64)> {
        self.timestamps.iter().zip(self.prices.iter())
    }
}
