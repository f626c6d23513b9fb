//! Series — the per-asset, time-ordered view reconstructed at read time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One (timestamp, price) pair of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Time-ordered price series for one asset.
///
/// Points are sorted ascending by timestamp. Equal timestamps keep their load order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub asset_id: String,
    points: Vec<PricePoint>,
}

impl Series {
    /// Build a series, sorting points by timestamp (stable).
    pub fn new(asset_id: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self {
            asset_id: asset_id.into(),
            points,
        }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<PricePoint> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    /// Keep only points with `timestamp >= max(timestamp) - window` (boundary inclusive).
    pub fn clip_to_window(mut self, window: Duration) -> Self {
        if let Some(latest) = self.points.last().map(|p| p.timestamp) {
            let cutoff = latest - window;
            self.points.retain(|p| p.timestamp >= cutoff);
        }
        self
    }
}
