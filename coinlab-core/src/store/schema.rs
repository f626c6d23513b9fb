//! Partition file schema and Parquet I/O helpers.
//!
//! Every partition file has exactly these columns:
//!
//! | column  | type                     |
//! |---------|--------------------------|
//! | `ts`    | Datetime(µs), UTC-naive  |
//! | `coin`  | String                   |
//! | `price` | Float64                  |
//! | `pct`   | Float64                  |

use crate::domain::{Observation, PricePoint};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use std::fs;
use std::path::Path;

pub const COL_TS: &str = "ts";
pub const COL_ASSET: &str = "coin";
pub const COL_PRICE: &str = "price";
pub const COL_PCT: &str = "pct";

/// Expected schema for quote partitions.
pub struct QuoteSchema;

impl QuoteSchema {
    /// Storage type of the `ts` column.
    pub fn ts_dtype() -> DataType {
        DataType::Datetime(TimeUnit::Microseconds, None)
    }

    /// Validate that `df` carries every column with a compatible type.
    pub fn validate(df: &DataFrame) -> Result<(), StoreError> {
        let ts = column(df, COL_TS)?;
        if !matches!(ts.dtype(), DataType::Datetime(_, _)) {
            return Err(StoreError::Schema(format!(
                "column '{COL_TS}' has type {:?}, expected datetime",
                ts.dtype()
            )));
        }
        expect_dtype(df, COL_ASSET, &DataType::String)?;
        expect_dtype(df, COL_PRICE, &DataType::Float64)?;
        expect_dtype(df, COL_PCT, &DataType::Float64)?;
        Ok(())
    }
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, StoreError> {
    df.column(name)
        .map_err(|_| StoreError::Schema(format!("missing column '{name}'")))
}

fn expect_dtype(df: &DataFrame, name: &str, expected: &DataType) -> Result<(), StoreError> {
    let actual = column(df, name)?.dtype();
    if actual != expected {
        return Err(StoreError::Schema(format!(
            "column '{name}' has type {actual:?}, expected {expected:?}"
        )));
    }
    Ok(())
}

// ── Conversions ─────────────────────────────────────────────────────

/// Convert observations to a partition DataFrame.
pub fn observations_to_dataframe(rows: &[&Observation]) -> Result<DataFrame, StoreError> {
    let ts: Vec<i64> = rows.iter().map(|o| o.timestamp.timestamp_micros()).collect();
    let coins: Vec<&str> = rows.iter().map(|o| o.asset_id.as_str()).collect();
    let prices: Vec<f64> = rows.iter().map(|o| o.price).collect();
    let pcts: Vec<f64> = rows.iter().map(|o| o.pct_change_24h).collect();

    DataFrame::new(vec![
        Column::new(COL_TS.into(), ts)
            .cast(&QuoteSchema::ts_dtype())
            .map_err(|e| StoreError::Parquet(format!("ts cast: {e}")))?,
        Column::new(COL_ASSET.into(), coins),
        Column::new(COL_PRICE.into(), prices),
        Column::new(COL_PCT.into(), pcts),
    ])
    .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

/// Raw `ts` values as UTC epoch microseconds, whatever the stored unit or zone.
///
/// Datetime columns hold UTC epoch values physically, so the zone only affects
/// display and the unit is rescaled by integer arithmetic.
fn ts_micros(df: &DataFrame) -> Result<Vec<Option<i64>>, StoreError> {
    let ts = column(df, COL_TS)?;
    let to_micros: fn(i64) -> i64 = match ts.dtype() {
        DataType::Datetime(TimeUnit::Nanoseconds, _) => |v| v.div_euclid(1_000),
        DataType::Datetime(TimeUnit::Microseconds, _) => |v| v,
        DataType::Datetime(TimeUnit::Milliseconds, _) => |v| v.saturating_mul(1_000),
        other => {
            return Err(StoreError::Schema(format!(
                "column '{COL_TS}' has type {other:?}, expected datetime"
            )))
        }
    };
    let physical = ts
        .cast(&DataType::Int64)
        .map_err(|e| StoreError::Parquet(format!("ts column: {e}")))?;
    let ca = physical
        .i64()
        .map_err(|e| StoreError::Parquet(format!("ts column type: {e}")))?;
    Ok(ca.into_iter().map(|v| v.map(to_micros)).collect())
}

/// Timestamps of `df` as UTC instants.
fn timestamps(df: &DataFrame) -> Result<Vec<Option<DateTime<Utc>>>, StoreError> {
    Ok(ts_micros(df)?
        .into_iter()
        .map(|v| v.and_then(DateTime::<Utc>::from_timestamp_micros))
        .collect())
}

/// Bring a validated partition frame to the exact storage layout: canonical column
/// order and a naive-UTC microsecond `ts`. Frames written by other tools can then
/// be stacked with freshly converted rows.
pub fn conform(df: DataFrame) -> Result<DataFrame, StoreError> {
    let mut df = df
        .select([COL_TS, COL_ASSET, COL_PRICE, COL_PCT])
        .map_err(|e| StoreError::Schema(format!("select columns: {e}")))?;
    if column(&df, COL_TS)?.dtype() == &QuoteSchema::ts_dtype() {
        return Ok(df);
    }
    let ts = Column::new(COL_TS.into(), ts_micros(&df)?)
        .cast(&QuoteSchema::ts_dtype())
        .map_err(|e| StoreError::Parquet(format!("ts cast: {e}")))?;
    df.with_column(ts)
        .map_err(|e| StoreError::Parquet(format!("replace ts: {e}")))?;
    Ok(df)
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, StoreError> {
    let ca = column(df, name)?
        .f64()
        .map_err(|e| StoreError::Parquet(format!("{name} column type: {e}")))?;
    Ok(ca.into_iter().collect())
}

/// Convert a partition DataFrame back to observations. Rows with null keys are dropped.
pub fn dataframe_to_observations(df: &DataFrame) -> Result<Vec<Observation>, StoreError> {
    let ts = timestamps(df)?;
    let coins = column(df, COL_ASSET)?
        .str()
        .map_err(|e| StoreError::Parquet(format!("coin column type: {e}")))?;
    let prices = f64_column(df, COL_PRICE)?;
    let pcts = f64_column(df, COL_PCT)?;

    let mut out = Vec::with_capacity(df.height());
    for (i, coin) in coins.into_iter().enumerate() {
        let (Some(timestamp), Some(coin), Some(price)) = (ts[i], coin, prices[i]) else {
            continue;
        };
        out.push(Observation {
            timestamp,
            asset_id: coin.to_string(),
            price,
            pct_change_24h: pcts[i].unwrap_or(f64::NAN),
        });
    }
    Ok(out)
}

/// Convert a `(ts, price)` DataFrame to price points. Rows with nulls are dropped.
pub fn dataframe_to_points(df: &DataFrame) -> Result<Vec<PricePoint>, StoreError> {
    let ts = timestamps(df)?;
    let prices = f64_column(df, COL_PRICE)?;
    Ok(ts
        .into_iter()
        .zip(prices)
        .filter_map(|(t, p)| Some(PricePoint::new(t?, p?)))
        .collect())
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

/// Write a DataFrame to a Parquet file and flush it to disk.
pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), StoreError> {
    let mut file =
        fs::File::create(path).map_err(|e| StoreError::Write(format!("create file: {e}")))?;
    ParquetWriter::new(&mut file)
        .finish(df)
        .map_err(|e| StoreError::Write(format!("write parquet: {e}")))?;
    file.sync_all()
        .map_err(|e| StoreError::Write(format!("sync: {e}")))?;
    Ok(())
}

/// Read a whole partition file and validate its schema.
pub fn read_parquet(path: &Path) -> Result<DataFrame, StoreError> {
    let file = fs::File::open(path).map_err(|e| StoreError::Read(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::Parquet(format!("read: {e}")))?;
    QuoteSchema::validate(&df)?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn obs(asset: &str, hour: u32, price: f64) -> Observation {
        Observation::new(
            Utc.with_ymd_and_hms(2025, 3, 9, hour, 15, 0).unwrap(),
            asset,
            price,
            0.5,
        )
        .unwrap()
    }

    #[test]
    fn dataframe_has_expected_schema() {
        let rows = [obs("bitcoin", 1, 10.0), obs("ethereum", 1, 2.0)];
        let refs: Vec<&Observation> = rows.iter().collect();
        let df = observations_to_dataframe(&refs).unwrap();

        assert_eq!(df.height(), 2);
        assert!(QuoteSchema::validate(&df).is_ok());
        assert_eq!(
            df.column(COL_TS).unwrap().dtype(),
            &QuoteSchema::ts_dtype()
        );
    }

    #[test]
    fn conversion_preserves_microsecond_timestamps() {
        let rows = [obs("bitcoin", 4, 123.25)];
        let refs: Vec<&Observation> = rows.iter().collect();
        let df = observations_to_dataframe(&refs).unwrap();

        let back = dataframe_to_observations(&df).unwrap();
        assert_eq!(back, rows.to_vec());
    }

    fn frame_with_ts_unit(unit: TimeUnit, micros: i64) -> DataFrame {
        let raw = match unit {
            TimeUnit::Nanoseconds => micros * 1_000,
            TimeUnit::Microseconds => micros,
            TimeUnit::Milliseconds => micros / 1_000,
        };
        DataFrame::new(vec![
            Column::new(COL_PRICE.into(), vec![7.5]),
            Column::new(COL_ASSET.into(), vec!["bitcoin"]),
            Column::new(COL_TS.into(), vec![raw])
                .cast(&DataType::Datetime(unit, None))
                .unwrap(),
            Column::new(COL_PCT.into(), vec![0.0]),
        ])
        .unwrap()
    }

    #[test]
    fn conform_rescales_foreign_timestamp_units() {
        let at = obs("bitcoin", 2, 7.5).timestamp;
        for unit in [TimeUnit::Nanoseconds, TimeUnit::Milliseconds] {
            let df = conform(frame_with_ts_unit(unit, at.timestamp_micros())).unwrap();

            assert_eq!(
                df.get_column_names_str(),
                vec![COL_TS, COL_ASSET, COL_PRICE, COL_PCT]
            );
            assert_eq!(df.column(COL_TS).unwrap().dtype(), &QuoteSchema::ts_dtype());
            assert_eq!(dataframe_to_observations(&df).unwrap()[0].timestamp, at);
        }
    }

    #[test]
    fn validate_rejects_missing_column() {
        let df = DataFrame::new(vec![
            Column::new(COL_ASSET.into(), vec!["bitcoin"]),
            Column::new(COL_PRICE.into(), vec![1.0]),
        ])
        .unwrap();
        assert!(matches!(
            QuoteSchema::validate(&df),
            Err(StoreError::Schema(_))
        ));
    }

    #[test]
    fn validate_rejects_wrong_type() {
        let df = DataFrame::new(vec![
            Column::new(COL_TS.into(), vec![0i64])
                .cast(&QuoteSchema::ts_dtype())
                .unwrap(),
            Column::new(COL_ASSET.into(), vec!["bitcoin"]),
            Column::new(COL_PRICE.into(), vec!["not_a_number"]),
            Column::new(COL_PCT.into(), vec![0.0]),
        ])
        .unwrap();
        assert!(matches!(
            QuoteSchema::validate(&df),
            Err(StoreError::Schema(_))
        ));
    }
}
