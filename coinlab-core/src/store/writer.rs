//! Store writer: read-merge-rewrite append into day partitions.

use super::schema::{conform, observations_to_dataframe, read_parquet, write_parquet};
use super::PartitionedStore;
use crate::domain::Observation;
use crate::error::StoreError;
use chrono::{NaiveDate, Utc};
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::PoisonError;
use tracing::{debug, info, warn};

impl PartitionedStore {
    /// Append observations to their day partitions.
    ///
    /// Not idempotent: appending the same batch twice stores its rows twice.
    /// A live batch shares one capture timestamp and lands in a single partition;
    /// a batch spanning several UTC days is split so every partition only holds
    /// rows of its own day.
    pub fn append(&self, observations: &[Observation]) -> Result<(), StoreError> {
        if observations.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut by_day: BTreeMap<NaiveDate, Vec<&Observation>> = BTreeMap::new();
        for obs in observations {
            by_day.entry(obs.partition_day()).or_default().push(obs);
        }

        for (day, rows) in &by_day {
            let total = self.rewrite_partition(*day, rows)?;
            info!(
                partition = %day,
                appended = rows.len(),
                total,
                "partition rewritten"
            );
        }
        Ok(())
    }

    /// Merge `rows` into the partition of `day`. Returns the partition's new row count.
    fn rewrite_partition(&self, day: NaiveDate, rows: &[&Observation]) -> Result<usize, StoreError> {
        let dir = self.partition_dir(day);
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Write(format!("failed to create dir: {e}")))?;

        let path = self.partition_path(day);
        let fresh = observations_to_dataframe(rows)?;

        let mut merged = match load_existing(&path)? {
            Some(existing) => conform(existing)?
                .vstack(&fresh)
                .map_err(|e| StoreError::Write(format!("merge: {e}")))?,
            None => fresh,
        };

        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&mut merged, &tmp_path)?;

        // Atomic rename
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Write(format!("atomic rename failed: {e}"))
        })?;

        Ok(merged.height())
    }
}

/// Read the current partition, if any.
///
/// A file that opens but does not decode as a partition is moved aside under a
/// unique `*.quarantined` name and treated as absent. Any other read failure is
/// returned so a healthy partition is never hidden.
fn load_existing(path: &Path) -> Result<Option<DataFrame>, StoreError> {
    let len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(None),
    };
    if len == 0 {
        debug!(path = %path.display(), "empty partition file, writing fresh");
        return Ok(None);
    }

    match read_parquet(path) {
        Ok(df) => Ok(Some(df)),
        Err(e) if e.is_corrupt_file() => {
            let quarantine = quarantine_path(path);
            warn!(
                path = %path.display(),
                quarantine = %quarantine.display(),
                error = %e,
                "quarantining unreadable partition"
            );
            fs::rename(path, &quarantine)
                .map_err(|e| StoreError::Write(format!("quarantine failed: {e}")))?;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// `quotes.parquet.<utc stamp>.quarantined`, with a counter if that name is taken.
fn quarantine_path(path: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6f");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut candidate = path.with_file_name(format!("{name}.{stamp}.quarantined"));
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{name}.{stamp}-{n}.quarantined"));
        n += 1;
    }
    candidate
}
