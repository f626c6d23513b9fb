//! Structured error types for the pipeline.
//!
//! These are designed to be displayable in CLI output and mappable by a serving
//! layer: anything where `is_no_data()` is true means "nothing stored yet" rather
//! than a fault.

use std::path::PathBuf;
use thiserror::Error;

/// A single failed call to the upstream price API. Retried by the fetcher.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransientFetchError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("upstream returned HTTP {status}")]
    Status { status: u16 },

    #[error("response could not be decoded: {0}")]
    Decode(String),
}

/// Failures of the ingestion path (fetch → store → audit).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("upstream fetch failed after {attempts} attempt(s): {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: TransientFetchError,
    },

    #[error("upstream response contained none of the requested assets: {}", .requested.join(","))]
    NoUsableData { requested: Vec<String> },

    #[error("could not build HTTP client: {0}")]
    Client(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("audit log write failed: {0}")]
    Audit(#[from] std::io::Error),
}

/// Failures of the partitioned store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no partitions under {} yet; run a fetch first", .root.display())]
    NotFound { root: PathBuf },

    #[error("no data for asset '{asset}'")]
    EmptyResult { asset: String },

    #[error("partition write failed: {0}")]
    Write(String),

    #[error("partition read failed: {0}")]
    Read(String),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("schema mismatch: {0}")]
    Schema(String),
}

impl StoreError {
    /// True for "nothing stored yet" conditions (NotFound / EmptyResult).
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::EmptyResult { .. })
    }

    /// True when a file was opened but its contents could not be decoded as a
    /// partition. I/O failures are not corruption.
    pub fn is_corrupt_file(&self) -> bool {
        matches!(self, Self::Parquet(_) | Self::Schema(_))
    }
}

/// Failures of the forecaster.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("horizon must be at least 1")]
    InvalidHorizon,

    #[error("model '{model}' failed: {message}")]
    Model { model: &'static str, message: String },
}

impl ForecastError {
    /// True when the underlying cause is missing data rather than a fault.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_no_data())
    }
}

/// Invalid arguments to the series analytics helpers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalyticsError {
    #[error("{name} must be at least 1, got {value}")]
    InvalidWindow { name: &'static str, value: usize },

    #[error("conversion rate must be finite and positive, got {0}")]
    InvalidRate(f64),
}

/// Failures starting the periodic scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler interval must be non-zero")]
    ZeroInterval,

    #[error("could not spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),
}
