//! Integration tests for the day-partitioned store.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::fs;

use coinlab_core::error::StoreError;
use coinlab_core::store::{PartitionedStore, PARTITION_FILE};
use coinlab_core::Observation;

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, day, hour, minute, 0).unwrap()
}

fn obs(asset: &str, ts: DateTime<Utc>, price: f64) -> Observation {
    Observation::new(ts, asset, price, 0.0).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
}

#[test]
fn two_batches_merge_into_one_partition() {
    let dir = tempfile::tempdir().unwrap();
    let store = PartitionedStore::new(dir.path());
    let a = vec![obs("bitcoin", at(3, 1, 0), 1.0), obs("ethereum", at(3, 1, 0), 10.0)];
    let b = vec![obs("bitcoin", at(3, 2, 0), 2.0), obs("ethereum", at(3, 2, 0), 20.0)];

    store.append(&a).unwrap();
    store.append(&b).unwrap();

    let partitions = store.partitions().unwrap();
    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].0, day(3));

    let status = store.status().unwrap();
    assert_eq!(status[0].rows, 4);
    assert_eq!(status[0].rows_per_asset["bitcoin"], 2);
    assert_eq!(status[0].rows_per_asset["ethereum"], 2);

    assert_eq!(store.load_history("bitcoin", None).unwrap().prices(), vec![1.0, 2.0]);
    assert_eq!(
        store.load_history("ethereum", None).unwrap().prices(),
        vec![10.0, 20.0]
    );
    // No temp file left behind.
    assert!(!store
        .partition_path(day(3))
        .with_extension("parquet.tmp")
        .exists());
}

#[test]
fn batches_land_in_their_utc_day() {
    let dir = tempfile::tempdir().unwrap();
    let store = PartitionedStore::new(dir.path());

    store.append(&[obs("bitcoin", at(4, 23, 59), 1.0)]).unwrap();
    store.append(&[obs("bitcoin", at(5, 0, 1), 2.0)]).unwrap();

    let days: Vec<NaiveDate> = store.partitions().unwrap().into_iter().map(|(d, _)| d).collect();
    assert_eq!(days, vec![day(4), day(5)]);
    assert!(dir.path().join("2025-08-04").join(PARTITION_FILE).is_file());
    assert!(dir.path().join("2025-08-05").join(PARTITION_FILE).is_file());

    let series = store.load_history("bitcoin", None).unwrap();
    assert_eq!(series.prices(), vec![1.0, 2.0]);
}

#[test]
fn window_keeps_boundary_point() {
    let dir = tempfile::tempdir().unwrap();
    let store = PartitionedStore::new(dir.path());
    let start = at(10, 0, 0);
    let batch: Vec<Observation> = (0..48)
        .map(|h| obs("bitcoin", start + Duration::hours(h), 100.0 + h as f64))
        .collect();
    store.append(&batch).unwrap();

    let full = store.load_history("bitcoin", None).unwrap();
    assert_eq!(full.len(), 48);

    let clipped = store
        .load_history("bitcoin", Some(Duration::hours(12)))
        .unwrap();
    assert_eq!(clipped.len(), 13);
    assert_eq!(clipped.first().unwrap().timestamp, start + Duration::hours(35));
    assert_eq!(clipped.last().unwrap().timestamp, start + Duration::hours(47));
}

#[test]
fn no_partitions_versus_unknown_asset() {
    let dir = tempfile::tempdir().unwrap();
    let store = PartitionedStore::new(dir.path());

    assert!(matches!(
        store.load_history("bitcoin", None),
        Err(StoreError::NotFound { .. })
    ));

    store.append(&[obs("bitcoin", at(1, 0, 0), 1.0)]).unwrap();
    assert!(matches!(
        store.load_history("ethereum", None),
        Err(StoreError::EmptyResult { .. })
    ));
}

#[test]
fn unreadable_partition_is_skipped_by_reader() {
    let dir = tempfile::tempdir().unwrap();
    let store = PartitionedStore::new(dir.path());
    store.append(&[obs("bitcoin", at(6, 12, 0), 5.0)]).unwrap();

    let broken = dir.path().join("2025-08-07");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join(PARTITION_FILE), b"not parquet").unwrap();

    let series = store.load_history("bitcoin", None).unwrap();
    assert_eq!(series.prices(), vec![5.0]);
}

#[test]
fn corrupt_partition_is_quarantined_on_append() {
    let dir = tempfile::tempdir().unwrap();
    let store = PartitionedStore::new(dir.path());
    let path = store.partition_path(day(8));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"garbage").unwrap();

    store.append(&[obs("bitcoin", at(8, 9, 0), 7.0)]).unwrap();

    let quarantined: Vec<_> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("quotes.parquet.") && name.ends_with(".quarantined"))
        .collect();
    assert_eq!(quarantined.len(), 1);
    assert_eq!(store.load_history("bitcoin", None).unwrap().prices(), vec![7.0]);
}
