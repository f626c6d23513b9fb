//! Store reader: one logical dataset over all day partitions.

use super::schema::{dataframe_to_points, COL_ASSET, COL_PRICE, COL_TS};
use super::PartitionedStore;
use crate::domain::{PricePoint, Series};
use crate::error::StoreError;
use chrono::Duration;
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

impl PartitionedStore {
    /// Load the time-ordered series of `asset_id` across every partition.
    ///
    /// With `window`, only points with `timestamp >= latest - window` are kept.
    ///
    /// Errors: `NotFound` when no partitions exist, `EmptyResult` when none of them
    /// holds a row for `asset_id`.
    pub fn load_history(
        &self,
        asset_id: &str,
        window: Option<Duration>,
    ) -> Result<Series, StoreError> {
        let partitions = self.partitions()?;

        let mut points: Vec<PricePoint> = Vec::new();
        let mut failures = 0usize;
        let mut last_error = None;
        for (day, path) in &partitions {
            match scan_asset(path, asset_id) {
                Ok(mut found) => {
                    debug!(partition = %day, asset = asset_id, rows = found.len(), "scanned");
                    points.append(&mut found);
                }
                Err(e) => {
                    warn!(partition = %day, error = %e, "skipping unreadable partition");
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if points.is_empty() {
            // Every partition failed: surface the fault instead of "no data".
            if failures == partitions.len() {
                if let Some(e) = last_error {
                    return Err(e);
                }
            }
            return Err(StoreError::EmptyResult {
                asset: asset_id.to_string(),
            });
        }

        let series = Series::new(asset_id, points);
        Ok(match window {
            Some(window) => series.clip_to_window(window),
            None => series,
        })
    }
}

/// Lazily scan one partition, pushing the asset predicate down into the reader.
fn scan_asset(path: &Path, asset_id: &str) -> Result<Vec<PricePoint>, StoreError> {
    let df = LazyFrame::scan_parquet(path, Default::default())
        .map_err(|e| StoreError::Parquet(format!("scan: {e}")))?
        .filter(col(COL_ASSET).eq(lit(asset_id)))
        .select([col(COL_TS), col(COL_PRICE)])
        .collect()
        .map_err(|e| StoreError::Parquet(format!("collect: {e}")))?;
    dataframe_to_points(&df)
}
