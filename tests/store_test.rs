//! Integration tests for the time-series store

use std::sync::Arc;
use tickseries::services::{PublishDispatcher, SaveOutcome, TimeSeriesStore};
use tickseries::types::*;
use tickseries::StoreError;

const EPOCH: i64 = 1_483_228_800;

fn ts(score: i64) -> i64 {
    EPOCH + score * 300
}

fn empty_store() -> Arc<TimeSeriesStore> {
    TimeSeriesStore::new(PublishDispatcher::default())
}

fn close_price() -> SeriesKey {
    SeriesKey::raw("ETH_BTC", "binance", CLOSE_PRICE).unwrap()
}

#[test]
fn test_save_and_query_single_point() {
    let store = empty_store();
    let key = close_price();

    let outcome = store.save(&key, ts(100), 0.5).unwrap();
    assert!(outcome.is_inserted());

    let result = store.query(&key, ts(100), 0, 0);
    assert_eq!(result.count, 1);
    assert_eq!(result.scores, vec![100]);
    assert_eq!(result.values, vec![SeriesValue::Scalar(0.5)]);
    assert_eq!(result.earliest_timestamp, Some(ts(100)));
    assert_eq!(result.latest_timestamp, Some(ts(100)));
    assert_eq!(result.key, "ETH_BTC:binance:price:close_price");
}

#[test]
fn test_raw_save_lands_in_closing_bucket() {
    let store = empty_store();
    let key = close_price();
    let timestamp = ts(100) - 10;

    store.save(&key, timestamp, 1.0).unwrap();
    assert!(store.contains(&key, 100));
    assert!(!store.contains(&key, 99));
    assert!(store.clock().window(100).contains(timestamp));

    let result = store.query(&key, timestamp, 0, 0);
    assert_eq!(result.scores, vec![100]);
}

#[test]
fn test_resave_same_value_is_unchanged() {
    let store = empty_store();
    let key = close_price();

    store.save(&key, ts(7), 2.0).unwrap();
    assert_eq!(store.save(&key, ts(7), 2.0).unwrap(), SaveOutcome::Unchanged);
    assert_eq!(store.len(&key), 1);
}

#[test]
fn test_conflicting_value_is_rejected() {
    let store = empty_store();
    let key = close_price();

    store.save(&key, ts(7), 2.0).unwrap();
    match store.save(&key, ts(7), 3.0) {
        Err(StoreError::DuplicateScore { score, .. }) => assert_eq!(score, 7),
        other => panic!("expected DuplicateScore, got {:?}", other),
    }
    assert_eq!(store.get(&key, 7), Some(SeriesValue::Scalar(2.0)));
}

#[test]
fn test_query_window_bounds() {
    let store = empty_store();
    let key = close_price();
    for score in 10..=14 {
        store.save_at_score(&key, score, score as f64).unwrap();
    }

    let behind = store.query_score(&key, 12, 0, 2);
    assert_eq!(behind.scores, vec![10, 11, 12]);
    assert_eq!(behind.scalars(), vec![10.0, 11.0, 12.0]);

    let ahead = store.query(&key, ts(12), 1, 0);
    assert_eq!(ahead.scores, vec![12, 13]);

    let outside = store.query_score(&key, 30, 0, 5);
    assert!(outside.is_empty());
    assert_eq!(outside.earliest_timestamp, None);
}

#[test]
fn test_run_deserialized_query() {
    let store = empty_store();
    let key = close_price();
    for score in 1..=4 {
        store.save_at_score(&key, score, 1.0).unwrap();
    }

    let json = serde_json::json!({
        "key": {
            "ticker": "ETH_BTC",
            "exchange": "binance",
            "series_class": "price",
            "index": "close_price"
        },
        "timestamp": ts(4),
        "periodsRange": 2
    });
    let query: SeriesQuery = serde_json::from_value(json).unwrap();
    let result = store.run(&query);
    assert_eq!(result.scores, vec![2, 3, 4]);
}

#[test]
fn test_incomplete_key_and_undefined_value() {
    let store = empty_store();

    let no_ticker = SeriesKey::new("", "binance", SeriesClass::Price, CLOSE_PRICE);
    assert!(matches!(
        store.save(&no_ticker, ts(1), 1.0),
        Err(StoreError::IncompleteKey(_))
    ));

    let no_index = SeriesKey::new("ETH_BTC", "binance", SeriesClass::Price, "");
    assert!(matches!(
        store.save(&no_index, ts(1), 1.0),
        Err(StoreError::IncompleteKey(_))
    ));

    assert!(matches!(
        store.save(&close_price(), ts(1), f64::NAN),
        Err(StoreError::IncompleteKey(_))
    ));
    assert!(store.keys().is_empty());
}

#[test]
fn test_indicator_rejects_unaligned_timestamp() {
    let store = empty_store();
    let key = close_price().derive(SeriesClass::Momentum, CLOSE_PRICE, 10);

    assert!(matches!(
        store.save(&key, ts(100) + 1, 1.0),
        Err(StoreError::UnalignedTimestamp { .. })
    ));
    assert!(store.save(&key, ts(100), 1.0).unwrap().is_inserted());
}

#[test]
fn test_restore_does_not_notify() {
    let store = empty_store();
    let key = close_price();

    assert!(store.restore(&key, 5, 1.0).unwrap());
    assert!(!store.restore(&key, 5, 1.0).unwrap());
    assert_eq!(store.latest(&key).map(|p| p.score), Some(5));
}

#[test]
fn test_query_is_deterministic() {
    let store = empty_store();
    let key = close_price();
    for score in [5, 3, 9, 1] {
        store.save_at_score(&key, score, score as f64).unwrap();
    }

    let first = store.query_score(&key, 9, 0, 10);
    let second = store.query_score(&key, 9, 0, 10);
    assert_eq!(first, second);
    assert_eq!(first.scores, vec![1, 3, 5, 9]);
}
