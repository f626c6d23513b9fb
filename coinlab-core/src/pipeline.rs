//! Composition root: wires store, fetcher, audit log and forecaster together.

use crate::audit::AuditLog;
use crate::config::PipelineConfig;
use crate::domain::Observation;
use crate::error::IngestError;
use crate::fetcher::{FetchSettings, HttpTransport, PriceFetcher, QuoteTransport, Sleeper};
use crate::forecast::Forecaster;
use crate::store::PartitionedStore;
use std::sync::{Arc, Mutex, TryLockError};
use tracing::{info, warn};

/// Result of one ingestion attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// A batch was stored; the forecast cache was cleared.
    Ingested(Vec<Observation>),
    /// Another ingestion was still in flight.
    Skipped,
}

/// The assembled pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<PartitionedStore>,
    fetcher: PriceFetcher,
    forecaster: Forecaster,
    ingest_guard: Mutex<()>,
}

impl Pipeline {
    /// Build the production pipeline with the HTTP transport.
    pub fn from_config(config: PipelineConfig) -> Result<Self, IngestError> {
        let transport = HttpTransport::new(config.timeout())?;
        Ok(Self::with_transport(config, Box::new(transport), None))
    }

    /// Build a pipeline around a custom transport and, optionally, back-off sleeper.
    pub fn with_transport(
        config: PipelineConfig,
        transport: Box<dyn QuoteTransport>,
        sleeper: Option<Box<dyn Sleeper>>,
    ) -> Self {
        let store = Arc::new(PartitionedStore::new(config.parquet_root()));
        let audit = AuditLog::new(config.audit_path());

        let mut fetcher = PriceFetcher::new(
            FetchSettings::from_config(&config),
            transport,
            Arc::clone(&store),
            audit,
        );
        if let Some(sleeper) = sleeper {
            fetcher = fetcher.with_sleeper(sleeper);
        }
        let forecaster = Forecaster::from_config(&config, Arc::clone(&store));

        info!(
            assets = %config.assets.join(","),
            currency = %config.currency,
            data_dir = %config.data_dir.display(),
            backend = forecaster.backend_name(),
            "pipeline ready"
        );
        Self {
            config,
            store,
            fetcher,
            forecaster,
            ingest_guard: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &PartitionedStore {
        &self.store
    }

    pub fn forecaster(&self) -> &Forecaster {
        &self.forecaster
    }

    /// One ingestion cycle: fetch, persist, then invalidate cached forecasts.
    ///
    /// Overlapping calls are coalesced: if a cycle is already running this returns
    /// `Skipped` immediately.
    pub fn run_ingestion(&self) -> Result<IngestOutcome, IngestError> {
        let _guard = match self.ingest_guard.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                warn!("ingestion already in progress, skipping tick");
                return Ok(IngestOutcome::Skipped);
            }
        };

        let batch = self.fetcher.fetch_prices()?;
        self.forecaster.clear_cache();
        Ok(IngestOutcome::Ingested(batch))
    }
}
