//! Upstream price API transport.
//!
//! The `QuoteTransport` trait abstracts the single HTTP GET per fetch cycle so the
//! retry and validation logic can be exercised without the network.

use crate::error::{IngestError, TransientFetchError};
use std::collections::HashMap;
use std::time::Duration;

/// Decoded `simple/price` response: asset id → entry.
///
/// Entries are left untyped so one malformed asset cannot fail the whole body. An
/// entry is normally an object with `<currency>` (price) and `<currency>_24h_change`.
pub type QuotePayload = HashMap<String, serde_json::Value>;

/// One request to the upstream API. Implementations never retry on their own.
pub trait QuoteTransport: Send + Sync {
    /// Human-readable name of this transport.
    fn name(&self) -> &str;

    /// GET `url` and decode the body.
    fn get(&self, url: &str) -> Result<QuotePayload, TransientFetchError>;
}

/// Build the batched request URL for `assets` quoted in `currency`.
pub fn simple_price_url(api_base: &str, assets: &[String], currency: &str) -> String {
    format!(
        "{}/simple/price?ids={}&vs_currencies={}&include_24hr_change=true",
        api_base.trim_end_matches('/'),
        assets.join(","),
        currency
    )
}

/// Blocking reqwest transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, IngestError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("coinlab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl QuoteTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    fn get(&self, url: &str) -> Result<QuotePayload, TransientFetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| TransientFetchError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransientFetchError::Status {
                status: status.as_u16(),
            });
        }

        resp.json::<QuotePayload>()
            .map_err(|e| TransientFetchError::Decode(e.to_string()))
    }
}
