//! Observation — one quote for one asset at one instant.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical form of an asset id: trimmed and lowercased.
pub fn normalize_asset_id(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// A single price quote captured by the fetcher.
///
/// Observations are written once to the store and once to the audit log and are
/// never mutated afterwards. All observations of one fetch share a capture timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub asset_id: String,
    pub price: f64,
    pub pct_change_24h: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ObservationError {
    #[error("empty asset id")]
    EmptyAsset,

    #[error("price for '{asset}' must be positive and finite, got {price}")]
    InvalidPrice { asset: String, price: f64 },

    #[error("24h change for '{asset}' is not finite")]
    InvalidChange { asset: String },
}

impl Observation {
    /// Build an observation, enforcing `price > 0` and finite values.
    pub fn new(
        timestamp: DateTime<Utc>,
        asset_id: impl Into<String>,
        price: f64,
        pct_change_24h: f64,
    ) -> Result<Self, ObservationError> {
        let asset_id = asset_id.into();
        if asset_id.is_empty() {
            return Err(ObservationError::EmptyAsset);
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(ObservationError::InvalidPrice {
                asset: asset_id,
                price,
            });
        }
        if !pct_change_24h.is_finite() {
            return Err(ObservationError::InvalidChange { asset: asset_id });
        }
        Ok(Self {
            timestamp,
            asset_id,
            price,
            pct_change_24h,
        })
    }

    /// UTC calendar day this observation belongs to (its partition key).
    pub fn partition_day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}
