//! Property tests for hourly resampling.
//!
//! Uses proptest to verify:
//! 1. Exactly one point per hour from the first covered hour to the last observation's hour
//! 2. Timestamps are hour-aligned and strictly increasing
//! 3. Forward fill never invents prices
//! 4. Each hour label carries the last observation at or before it

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use proptest::prelude::*;

use coinlab_core::forecast::resample::{ceil_hour, floor_hour, resample_hourly};
use coinlab_core::{PricePoint, Series};

// ── Strategies (proptest) ────────────────────────────────────────────

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

/// Up to 60 observations spread over ~3 days, offsets in seconds.
fn arb_series() -> impl Strategy<Value = Series> {
    prop::collection::vec((0i64..260_000, 1.0..100_000.0_f64), 1..60).prop_map(|raw| {
        let points = raw
            .into_iter()
            .map(|(secs, price)| PricePoint::new(base() + Duration::seconds(secs), price))
            .collect();
        Series::new("bitcoin", points)
    })
}

proptest! {
    #[test]
    fn one_point_per_hour(series in arb_series()) {
        let hourly = resample_hourly(&series);
        let last_ts = series.last().unwrap().timestamp;
        let mut first = ceil_hour(series.first().unwrap().timestamp);
        let mut last = floor_hour(last_ts);
        if first > last {
            first = ceil_hour(last_ts);
            last = first;
        }
        let expected = (last - first).num_hours() as usize + 1;

        prop_assert_eq!(hourly.len(), expected);
        prop_assert_eq!(hourly.first().unwrap().timestamp, first);
        prop_assert_eq!(hourly.last().unwrap().timestamp, last);
    }

    #[test]
    fn timestamps_are_aligned_and_increasing(series in arb_series()) {
        let hourly = resample_hourly(&series);
        for p in hourly.points() {
            prop_assert_eq!(p.timestamp.minute(), 0);
            prop_assert_eq!(p.timestamp.second(), 0);
        }
        for pair in hourly.points().windows(2) {
            prop_assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::hours(1));
        }
    }

    #[test]
    fn forward_fill_never_invents_prices(series in arb_series()) {
        let inputs = series.prices();
        for p in resample_hourly(&series).points() {
            prop_assert!(inputs.contains(&p.price));
        }
    }

    #[test]
    fn each_hour_takes_latest_observation(series in arb_series()) {
        for p in resample_hourly(&series).points() {
            let latest = series
                .points()
                .iter()
                .filter(|o| o.timestamp <= p.timestamp)
                .last()
                .map(|o| o.price);
            prop_assert_eq!(Some(p.price), latest);
        }
    }
}
