//! Shared fixtures: scripted upstream transport, recording sleeper, config builder.

#![allow(dead_code)]

use coinlab_core::config::PipelineConfig;
use coinlab_core::error::TransientFetchError;
use coinlab_core::fetcher::{QuotePayload, QuoteTransport, Sleeper};
use serde_json::json;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ──────────────────────────────────────────────
// Transport
// ──────────────────────────────────────────────

/// Replays a fixed sequence of responses; the last one repeats once the script ends.
#[derive(Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Result<QuotePayload, TransientFetchError>>>>,
    last: Arc<Mutex<Option<Result<QuotePayload, TransientFetchError>>>>,
    calls: Arc<AtomicUsize>,
    urls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<QuotePayload, TransientFetchError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            last: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
            urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always(response: Result<QuotePayload, TransientFetchError>) -> Self {
        Self::new(vec![response])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl QuoteTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    fn get(&self, url: &str) -> Result<QuotePayload, TransientFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(response) = next {
            *last = Some(response);
        }
        last.clone()
            .unwrap_or_else(|| Err(TransientFetchError::Network("empty script".into())))
    }
}

// ──────────────────────────────────────────────
// Sleeper
// ──────────────────────────────────────────────

/// Records requested back-off delays instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

// ──────────────────────────────────────────────
// Payloads and config
// ──────────────────────────────────────────────

/// `{asset: {"usd": price, "usd_24h_change": pct}}` for each entry.
pub fn payload(quotes: &[(&str, f64, f64)]) -> QuotePayload {
    quotes
        .iter()
        .map(|&(asset, price, pct)| {
            let fields = json!({ "usd": price, "usd_24h_change": pct });
            (asset.to_string(), fields)
        })
        .collect()
}

/// Default config rooted at `data_dir`, with back-off 2 s and 3 attempts.
pub fn test_config(data_dir: &Path, assets: &[&str]) -> PipelineConfig {
    PipelineConfig {
        assets: assets.iter().map(|a| a.to_string()).collect(),
        data_dir: data_dir.to_path_buf(),
        max_retries: 3,
        backoff_secs: 2,
        ..PipelineConfig::default()
    }
}
