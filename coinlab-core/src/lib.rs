//! CoinLab Core — crypto quote ingestion, partitioned storage and forecasting.
//!
//! This crate contains the whole pipeline:
//! - Fetcher: batched upstream quotes with linear back-off retry
//! - Day-partitioned Parquet store (atomic read-merge-rewrite, lazy scans)
//! - NDJSON audit log of every fetched observation
//! - Forecaster: hourly resampling, short-series guard, pluggable back-ends, LRU cache
//! - Scheduler and composition root for the periodic ingestion loop
//! - Series analytics helpers

pub mod analytics;
pub mod audit;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod forecast;
pub mod pipeline;
pub mod scheduler;
pub mod store;

pub use config::PipelineConfig;
pub use domain::{Forecast, Observation, PricePoint, Series};
pub use error::{ForecastError, IngestError, StoreError};
pub use forecast::Forecaster;
pub use pipeline::{IngestOutcome, Pipeline};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use store::PartitionedStore;
