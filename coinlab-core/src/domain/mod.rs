//! Domain types for CoinLab

pub mod forecast;
pub mod observation;
pub mod series;

pub use forecast::Forecast;
pub use observation::{normalize_asset_id, Observation, ObservationError};
pub use series::{PricePoint, Series};
