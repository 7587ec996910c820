//! Integration tests for the save -> dispatch -> indicator cascade

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tickseries::config::IndicatorConfig;
use tickseries::services::{
    build_registry, Notification, PublishDispatcher, SaveOutcome, Subscriber, SubscriberRegistry,
    TimeSeriesStore,
};
use tickseries::types::*;
use tickseries::{Result, StoreError};

const EPOCH: i64 = 1_483_228_800;

fn indicator_config(horizons: Vec<u32>) -> IndicatorConfig {
    IndicatorConfig {
        horizons,
        ..IndicatorConfig::default()
    }
}

fn pipeline_store() -> Arc<TimeSeriesStore> {
    let registry = build_registry(&indicator_config(vec![1, 2])).unwrap();
    TimeSeriesStore::new(PublishDispatcher::new(registry))
}

fn close_price() -> SeriesKey {
    SeriesKey::raw("ETH_BTC", "binance", CLOSE_PRICE).unwrap()
}

/// Rising prices up to score 20, then flat at 100 through score 25.
fn seed_value(score: i64) -> f64 {
    if score <= 20 {
        score as f64 * 10.0
    } else {
        100.0
    }
}

fn seed(store: &TimeSeriesStore) {
    for score in 1..=25 {
        store
            .save_at_score(&close_price(), score, seed_value(score))
            .unwrap();
    }
}

#[test]
fn test_close_price_cascades_into_indicators() {
    let store = pipeline_store();
    seed(&store);
    let close = close_price();

    let momentum_10 = close.derive(SeriesClass::Momentum, CLOSE_PRICE, 10);
    let momentum_20 = close.derive(SeriesClass::Momentum, CLOSE_PRICE, 20);
    assert_eq!(store.get(&momentum_10, 25), Some(SeriesValue::Scalar(-50.0)));
    assert_eq!(store.get(&momentum_20, 25), Some(SeriesValue::Scalar(50.0)));

    let bands = close.derive(SeriesClass::Bbands, CLOSE_PRICE, 2);
    let value = store.get(&bands, 25).unwrap();
    let bands = value.as_bands().unwrap();
    assert!(bands.lower <= bands.middle && bands.middle <= bands.upper);

    // A one-point deviation is degenerate.
    let single = close.derive(SeriesClass::Bbands, CLOSE_PRICE, 1);
    assert_eq!(store.len(&single), 0);

    let rsi = close.derive(SeriesClass::Rsi, CLOSE_PRICE, 14);
    assert!(store.contains(&rsi, 25));
}

#[test]
fn test_timestamp_saves_cascade_like_score_saves() {
    let store = pipeline_store();
    let close = close_price();
    for score in 1..=25 {
        store
            .save(&close, EPOCH + score * 300, seed_value(score))
            .unwrap();
    }

    let momentum_10 = close.derive(SeriesClass::Momentum, CLOSE_PRICE, 10);
    let momentum_20 = close.derive(SeriesClass::Momentum, CLOSE_PRICE, 20);
    assert_eq!(store.get(&momentum_10, 25), Some(SeriesValue::Scalar(-50.0)));
    assert_eq!(store.get(&momentum_20, 25), Some(SeriesValue::Scalar(50.0)));

    let reference = pipeline_store();
    seed(&reference);
    assert_eq!(store.keys(), reference.keys());
}

#[test]
fn test_ema_weights_recent_points_unlike_sma() {
    let registry = build_registry(&IndicatorConfig {
        horizons: vec![1],
        sma_multipliers: vec![4],
        ema_multipliers: vec![4],
        ..IndicatorConfig::default()
    })
    .unwrap();
    let store = TimeSeriesStore::new(PublishDispatcher::new(registry));
    let close = close_price();
    for score in 1..=7 {
        store.save_at_score(&close, score, 1.0).unwrap();
    }
    store.save_at_score(&close, 8, 10.0).unwrap();

    let sma = close.derive(SeriesClass::Sma, CLOSE_PRICE, 4);
    let ema = close.derive(SeriesClass::Ema, CLOSE_PRICE, 4);
    let sma = store.get(&sma, 8).unwrap().as_f64().unwrap();
    let ema = store.get(&ema, 8).unwrap().as_f64().unwrap();
    assert!((sma - 3.25).abs() < 1e-9);
    assert!((ema - 4.6).abs() < 1e-9);
    assert!(ema > sma);
}

#[test]
fn test_indicators_skip_insufficient_history() {
    let store = pipeline_store();
    store.save_at_score(&close_price(), 1, 10.0).unwrap();

    // One point: no momentum, no bands.
    let keys = store.keys();
    assert_eq!(keys, vec![close_price()]);
}

#[test]
fn test_other_index_is_ignored() {
    let store = pipeline_store();
    let open = SeriesKey::raw("ETH_BTC", "binance", "open_price").unwrap();

    match store.save_at_score(&open, 1, 10.0).unwrap() {
        SaveOutcome::Inserted(report) => {
            assert_eq!(report.delivered, 0);
            assert_eq!(report.ignored, 5);
            assert_eq!(report.failed, 0);
        }
        SaveOutcome::Unchanged => panic!("expected a fresh insert"),
    }
    assert_eq!(store.keys(), vec![open]);
}

#[test]
fn test_close_price_is_delivered_to_every_indicator() {
    let store = pipeline_store();
    match store.save_at_score(&close_price(), 1, 10.0).unwrap() {
        SaveOutcome::Inserted(report) => assert_eq!(report.delivered, 5),
        SaveOutcome::Unchanged => panic!("expected a fresh insert"),
    }
}

#[test]
fn test_squeeze_signal_fires_once_for_flat_horizon() {
    let registry = build_registry(&indicator_config(vec![2, 3])).unwrap();
    let store = TimeSeriesStore::new(PublishDispatcher::new(registry));
    let close = close_price();
    // Rising through score 23, then two equal closes.
    for score in 1..=25 {
        let value = if score <= 23 { score as f64 * 10.0 } else { 100.0 };
        store.save_at_score(&close, score, value).unwrap();
    }

    let narrow = close.derive(SeriesClass::Signal, "bbands", 2);
    let result = store.query_score(&narrow, 25, 0, 25);
    assert_eq!(result.scores, vec![25]);
    let signal = result.values[0].as_signal().unwrap();
    assert_eq!(signal.trend, Trend::Bullish);
    assert_eq!(signal.periods, 2);
    assert_eq!(signal.value, 0.0);

    let wide = close.derive(SeriesClass::Signal, "bbands", 3);
    assert_eq!(store.len(&wide), 0);
    let bands = close.derive(SeriesClass::Bbands, CLOSE_PRICE, 3);
    assert!(store.get(&bands, 25).unwrap().as_bands().unwrap().width() > 5.0);
}

#[test]
fn test_resave_does_not_recascade() {
    let store = pipeline_store();
    seed(&store);
    let keys_before = store.keys();

    let outcome = store.save_at_score(&close_price(), 25, 100.0).unwrap();
    assert_eq!(outcome, SaveOutcome::Unchanged);
    assert_eq!(store.keys(), keys_before);
}

#[test]
fn test_cascade_is_deterministic() {
    let first = pipeline_store();
    let second = pipeline_store();
    seed(&first);
    seed(&second);

    let keys = first.keys();
    assert_eq!(keys, second.keys());
    for key in keys {
        assert_eq!(
            first.query_score(&key, 25, 0, 25),
            second.query_score(&key, 25, 0, 25)
        );
    }
}

struct Failing;

impl Subscriber for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn watches(&self) -> &[SeriesClass] {
        &[SeriesClass::Price]
    }

    fn outputs(&self) -> &[SeriesClass] {
        &[SeriesClass::Momentum]
    }

    fn handle(&self, _store: &TimeSeriesStore, note: &Notification) -> Result<()> {
        Err(StoreError::Consistency(format!("refusing {}", note.key)))
    }
}

struct Panicking;

impl Subscriber for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }

    fn watches(&self) -> &[SeriesClass] {
        &[SeriesClass::Price]
    }

    fn outputs(&self) -> &[SeriesClass] {
        &[SeriesClass::Ema]
    }

    fn handle(&self, _store: &TimeSeriesStore, _note: &Notification) -> Result<()> {
        panic!("subscriber blew up");
    }
}

#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
}

impl Subscriber for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    fn watches(&self) -> &[SeriesClass] {
        &[SeriesClass::Price]
    }

    fn outputs(&self) -> &[SeriesClass] {
        &[SeriesClass::Sma]
    }

    fn handle(&self, _store: &TimeSeriesStore, _note: &Notification) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Watches momentum and writes price, closing a loop with [`Failing`].
struct Echo;

impl Subscriber for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn watches(&self) -> &[SeriesClass] {
        &[SeriesClass::Momentum]
    }

    fn outputs(&self) -> &[SeriesClass] {
        &[SeriesClass::Price]
    }

    fn handle(&self, _store: &TimeSeriesStore, _note: &Notification) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_failing_subscribers_do_not_undo_save() {
    let counting = Arc::new(Counting::default());
    let mut registry = SubscriberRegistry::new();
    registry.register(Arc::new(Failing)).unwrap();
    registry.register(Arc::new(Panicking)).unwrap();
    registry.register(counting.clone()).unwrap();
    let store = TimeSeriesStore::new(PublishDispatcher::new(registry));

    let outcome = store.save_at_score(&close_price(), 3, 1.5).unwrap();
    match outcome {
        SaveOutcome::Inserted(report) => {
            assert_eq!(report.failed, 2);
            assert_eq!(report.delivered, 1);
        }
        SaveOutcome::Unchanged => panic!("expected a fresh insert"),
    }
    assert_eq!(store.get(&close_price(), 3), Some(SeriesValue::Scalar(1.5)));
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

    // The store keeps accepting writes after a panic.
    store.save_at_score(&close_price(), 4, 1.5).unwrap();
    assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_concurrent_saves_insert_once() {
    let counting = Arc::new(Counting::default());
    let mut registry = SubscriberRegistry::new();
    registry.register(counting.clone()).unwrap();
    let store = TimeSeriesStore::new(PublishDispatcher::new(registry));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || store.save_at_score(&close_price(), 42, i as f64))
        })
        .collect();
    let outcomes: Vec<Result<SaveOutcome>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let inserted = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(SaveOutcome::Inserted(_))))
        .count();
    assert_eq!(inserted, 1);
    for outcome in &outcomes {
        assert!(matches!(
            outcome,
            Ok(SaveOutcome::Inserted(_))
                | Ok(SaveOutcome::Unchanged)
                | Err(StoreError::DuplicateScore { .. })
        ));
    }
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.len(&close_price()), 1);
}

#[test]
fn test_registry_rejects_cycles() {
    let mut registry = SubscriberRegistry::new();
    registry.register(Arc::new(Failing)).unwrap();

    let err = registry.register(Arc::new(Echo)).unwrap_err();
    assert!(matches!(err, StoreError::Registry(_)));
    assert_eq!(registry.subscriptions().len(), 1);
    assert!(registry.subscribers_for(SeriesClass::Momentum).is_empty());
}

#[test]
fn test_registry_rejects_duplicate_names() {
    let mut registry = SubscriberRegistry::new();
    registry.register(Arc::new(Failing)).unwrap();
    assert!(matches!(
        registry.register(Arc::new(Failing)),
        Err(StoreError::Registry(_))
    ));
}

#[test]
fn test_invalid_horizon_fails_startup() {
    let result = build_registry(&indicator_config(vec![0]));
    assert!(matches!(result, Err(StoreError::InvalidHorizon { .. })));
}

#[test]
fn test_default_registry_layout() {
    let registry = build_registry(&IndicatorConfig::default()).unwrap();
    let names: Vec<&str> = registry
        .subscriptions()
        .iter()
        .map(|s| s.subscriber.as_str())
        .collect();
    assert_eq!(names, vec!["momentum", "bbands", "sma", "ema", "rsi"]);
    for subscription in registry.subscriptions() {
        assert_eq!(subscription.watches, vec![SeriesClass::Price]);
        assert_eq!(subscription.index.as_deref(), Some(CLOSE_PRICE));
    }
}
