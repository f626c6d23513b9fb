//! Newline-delimited JSON audit log of every fetched observation.
//!
//! One record per line: `{"ts": "<RFC 3339>", "coin": "...", "price": ..., "pct": ...}`.
//! The file is opened in append mode; a torn trailing write can only damage the last
//! line. The pipeline never reads this file back.

use crate::domain::Observation;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Serialize)]
struct AuditRecord<'a> {
    ts: String,
    coin: &'a str,
    price: f64,
    pct: f64,
}

impl<'a> From<&'a Observation> for AuditRecord<'a> {
    fn from(obs: &'a Observation) -> Self {
        Self {
            ts: obs.timestamp.to_rfc3339(),
            coin: &obs.asset_id,
            price: obs.price,
            pct: obs.pct_change_24h,
        }
    }
}

/// Append-only audit log.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line per observation.
    pub fn append(&self, observations: &[Observation]) -> io::Result<()> {
        if observations.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut out = BufWriter::new(file);
        for obs in observations {
            serde_json::to_writer(&mut out, &AuditRecord::from(obs))?;
            out.write_all(b"\n")?;
        }
        out.flush()?;

        debug!(
            path = %self.path.display(),
            records = observations.len(),
            "audit records appended"
        );
        Ok(())
    }
}
