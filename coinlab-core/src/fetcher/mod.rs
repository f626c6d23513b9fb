//! Price fetcher: one batched upstream call per tick, retried with linear back-off.
//!
//! On success the batch is appended to the partitioned store and then to the audit
//! log before it is returned. Assets missing from the response are skipped with a
//! warning; a response with none of them is fatal for the tick.

pub mod retry;
pub mod transport;

pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use transport::{simple_price_url, HttpTransport, QuotePayload, QuoteTransport};

use crate::audit::AuditLog;
use crate::config::PipelineConfig;
use crate::domain::Observation;
use crate::error::IngestError;
use crate::store::PartitionedStore;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// What to fetch and how hard to try.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    pub assets: Vec<String>,
    pub currency: String,
    pub api_base: String,
    pub retry: RetryPolicy,
}

impl FetchSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            assets: config.assets.clone(),
            currency: config.currency.clone(),
            api_base: config.api_base.clone(),
            retry: RetryPolicy::new(config.max_retries, config.backoff()),
        }
    }
}

/// Fetches quotes and hands them to the store and the audit log.
pub struct PriceFetcher {
    settings: FetchSettings,
    transport: Box<dyn QuoteTransport>,
    sleeper: Box<dyn Sleeper>,
    store: Arc<PartitionedStore>,
    audit: AuditLog,
}

impl PriceFetcher {
    pub fn new(
        settings: FetchSettings,
        transport: Box<dyn QuoteTransport>,
        store: Arc<PartitionedStore>,
        audit: AuditLog,
    ) -> Self {
        Self {
            settings,
            transport,
            sleeper: Box::new(ThreadSleeper),
            store,
            audit,
        }
    }

    /// Replace the back-off sleeper.
    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Fetch one batch, persist it and return it.
    ///
    /// All observations share the capture timestamp of the successful response.
    pub fn fetch_prices(&self) -> Result<Vec<Observation>, IngestError> {
        let url = simple_price_url(
            &self.settings.api_base,
            &self.settings.assets,
            &self.settings.currency,
        );
        let payload = self.get_with_retry(&url)?;
        let captured_at = Utc::now();

        let batch = self.parse_payload(&payload, captured_at)?;

        self.store.append(&batch)?;
        info!(
            rows = batch.len(),
            root = %self.store.root().display(),
            "fetched prices"
        );

        self.audit.append(&batch)?;
        info!(rows = batch.len(), path = %self.audit.path().display(), "audit log appended");

        Ok(batch)
    }

    fn get_with_retry(&self, url: &str) -> Result<QuotePayload, IngestError> {
        let policy = self.settings.retry;
        let mut attempt = 1;
        loop {
            match self.transport.get(url) {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        transport = self.transport.name(),
                        error = %e,
                        "upstream attempt failed"
                    );
                    match policy.delay_after(attempt) {
                        Some(delay) => self.sleeper.sleep(delay),
                        None => {
                            return Err(IngestError::Fetch {
                                attempts: attempt,
                                source: e,
                            })
                        }
                    }
                }
            }
            attempt += 1;
        }
    }

    /// Turn the payload into observations, skipping missing or malformed assets.
    fn parse_payload(
        &self,
        payload: &QuotePayload,
        captured_at: DateTime<Utc>,
    ) -> Result<Vec<Observation>, IngestError> {
        let currency = &self.settings.currency;
        let change_key = format!("{currency}_24h_change");

        let mut batch = Vec::with_capacity(self.settings.assets.len());
        for asset in &self.settings.assets {
            let Some(fields) = payload
                .get(asset)
                .and_then(Value::as_object)
                .filter(|f| !f.is_empty())
            else {
                warn!(asset = %asset, "asset missing in API response");
                continue;
            };
            let (Some(price), Some(pct)) = (field(fields, currency), field(fields, &change_key))
            else {
                warn!(asset = %asset, currency = %currency, "asset entry lacks price fields");
                continue;
            };
            match Observation::new(captured_at, asset.clone(), price, pct) {
                Ok(obs) => batch.push(obs),
                Err(e) => warn!(asset = %asset, error = %e, "rejecting quote"),
            }
        }

        if batch.is_empty() {
            return Err(IngestError::NoUsableData {
                requested: self.settings.assets.clone(),
            });
        }
        Ok(batch)
    }
}

/// A numeric field; null, missing and non-numeric values all read as absent.
fn field(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    fields.get(key).and_then(Value::as_f64)
}
