//! Day-partitioned Parquet store.
//!
//! Layout: `{root}/{YYYY-MM-DD}/quotes.parquet`
//!
//! - Appends are read-merge-rewrite: the whole partition is rewritten to a `.tmp`
//!   file and atomically renamed into place, so readers see either the old or the
//!   new file, never a half-written one.
//! - Appends are serialized by an internal mutex (single writer).
//! - Reads scan every partition lazily with a predicate on the asset column.
//! - Partitions that fail to decode during a merge are quarantined
//!   (`quotes.parquet.quarantined`) instead of blocking ingestion.

pub mod reader;
pub mod schema;
pub mod writer;

use crate::error::StoreError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub use schema::QuoteSchema;

pub const PARTITION_FILE: &str = "quotes.parquet";
const PARTITION_DATE_FORMAT: &str = "%Y-%m-%d";

/// The partitioned observation store.
#[derive(Debug)]
pub struct PartitionedStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

/// Row counts for one day partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionStatus {
    pub day: NaiveDate,
    pub rows: usize,
    pub rows_per_asset: BTreeMap<String, usize>,
}

impl PartitionedStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one day: `{root}/{YYYY-MM-DD}/`
    fn partition_dir(&self, day: NaiveDate) -> PathBuf {
        self.root.join(day.format(PARTITION_DATE_FORMAT).to_string())
    }

    /// Parquet file of one day: `{root}/{YYYY-MM-DD}/quotes.parquet`
    pub fn partition_path(&self, day: NaiveDate) -> PathBuf {
        self.partition_dir(day).join(PARTITION_FILE)
    }

    /// All existing partitions, ascending by day.
    ///
    /// Directories whose name is not a date (e.g. `logs/`) and days without a
    /// partition file are ignored. Fails with `NotFound` when there are none.
    pub fn partitions(&self) -> Result<Vec<(NaiveDate, PathBuf)>, StoreError> {
        let not_found = || StoreError::NotFound {
            root: self.root.clone(),
        };
        if !self.root.is_dir() {
            return Err(not_found());
        }

        let entries =
            fs::read_dir(&self.root).map_err(|e| StoreError::Read(format!("read dir: {e}")))?;

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Read(format!("dir entry: {e}")))?;
            let name = entry.file_name();
            let Some(day) = name
                .to_str()
                .and_then(|s| NaiveDate::parse_from_str(s, PARTITION_DATE_FORMAT).ok())
            else {
                continue;
            };
            let path = entry.path().join(PARTITION_FILE);
            if path.is_file() {
                found.push((day, path));
            }
        }

        if found.is_empty() {
            return Err(not_found());
        }
        found.sort_by_key(|(day, _)| *day);
        Ok(found)
    }

    /// Per-day row counts, ascending by day.
    pub fn status(&self) -> Result<Vec<PartitionStatus>, StoreError> {
        self.partitions()?
            .into_iter()
            .map(|(day, path)| {
                let rows = schema::dataframe_to_observations(&schema::read_parquet(&path)?)?;
                let mut rows_per_asset = BTreeMap::new();
                for row in &rows {
                    *rows_per_asset.entry(row.asset_id.clone()).or_insert(0) += 1;
                }
                Ok(PartitionStatus {
                    day,
                    rows: rows.len(),
                    rows_per_asset,
                })
            })
            .collect()
    }
}
