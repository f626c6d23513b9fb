//! Hourly resampling with forward fill.

use crate::domain::{PricePoint, Series};
use chrono::{DateTime, Duration, DurationRound, Utc};

/// Truncate an instant to the start of its UTC hour.
pub fn floor_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::hours(1)).unwrap_or(ts)
}

/// The first whole UTC hour at or after `ts`.
pub fn ceil_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    let floor = floor_hour(ts);
    if floor == ts {
        ts
    } else {
        floor + Duration::hours(1)
    }
}

/// `horizon` hourly timestamps starting one hour after `last`.
pub fn future_hours(last: DateTime<Utc>, horizon: usize) -> Vec<DateTime<Utc>> {
    (1..=horizon as i64)
        .map(|h| last + Duration::hours(h))
        .collect()
}

/// Resample to exactly one point per hour.
///
/// The value at hour label `h` is the last observation with `ts <= h`; hours with
/// no new observation repeat the previous label's price. The grid starts at the
/// first hour that has an observation at or before it and ends at the last
/// observation's hour.
///
/// When every observation lies strictly inside one hour there is no such label
/// in range, and the result is the single point at the end of that hour.
pub fn resample_hourly(series: &Series) -> Series {
    let points = series.points();
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Series::new(series.asset_id.clone(), Vec::new());
    };

    let start = ceil_hour(first.timestamp);
    let end = floor_hour(last.timestamp);
    if start > end {
        let label = ceil_hour(last.timestamp);
        return Series::new(
            series.asset_id.clone(),
            vec![PricePoint::new(label, last.price)],
        );
    }

    let mut label = start;
    let mut idx = 0;
    let mut current: Option<f64> = None;
    let mut out = Vec::new();

    while label <= end {
        while idx < points.len() && points[idx].timestamp <= label {
            current = Some(points[idx].price);
            idx += 1;
        }
        if let Some(price) = current {
            out.push(PricePoint::new(label, price));
        }
        label += Duration::hours(1);
    }

    Series::new(series.asset_id.clone(), out)
}
