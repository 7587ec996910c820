//! Publish/subscribe dispatch of store writes.
//!
//! The registry is a static table from [`SeriesClass`] to the subscribers
//! watching it, built once at startup. Each save notifies every subscriber
//! of the written key's class at most once; failures and panics are logged
//! and contained.

use crate::error::{Result, StoreError};
use crate::services::store::TimeSeriesStore;
use crate::types::{SeriesClass, SeriesKey, SeriesValue};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// Event delivered to subscribers after a point is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub key: SeriesKey,
    pub score: i64,
    pub timestamp: i64,
    pub value: SeriesValue,
}

impl Notification {
    /// Channel name, `{ticker}:{exchange}:{series_class}:{index}`.
    pub fn topic(&self) -> String {
        self.key.topic()
    }
}

/// A reactive consumer of store writes.
///
/// Subscribers recompute from the store's current state, never from the
/// notification payload alone, and only write their own output classes.
pub trait Subscriber: Send + Sync {
    /// Unique name, used in logs and the registry.
    fn name(&self) -> &str;

    /// Classes whose writes wake this subscriber.
    fn watches(&self) -> &[SeriesClass];

    /// Only notifications for this index are delivered, when set.
    fn index_filter(&self) -> Option<&str> {
        None
    }

    /// Classes this subscriber writes.
    fn outputs(&self) -> &[SeriesClass];

    fn handle(&self, store: &TimeSeriesStore, note: &Notification) -> Result<()>;
}

/// Static description of one registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub subscriber: String,
    pub watches: Vec<SeriesClass>,
    pub index: Option<String>,
}

/// Class to subscriber table.
#[derive(Default)]
pub struct SubscriberRegistry {
    table: HashMap<SeriesClass, Vec<Arc<dyn Subscriber>>>,
    subscriptions: Vec<Subscription>,
    edges: HashMap<SeriesClass, BTreeSet<SeriesClass>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for every class it watches.
    ///
    /// Rejects duplicate names and registrations that would let a write
    /// cascade back into a class it came from.
    pub fn register(&mut self, subscriber: Arc<dyn Subscriber>) -> Result<()> {
        let name = subscriber.name().to_string();
        if self.subscriptions.iter().any(|s| s.subscriber == name) {
            return Err(StoreError::Registry(format!("{} is already registered", name)));
        }
        if subscriber.watches().is_empty() {
            return Err(StoreError::Registry(format!("{} watches no series class", name)));
        }

        let mut edges = self.edges.clone();
        for watched in subscriber.watches() {
            edges
                .entry(*watched)
                .or_default()
                .extend(subscriber.outputs().iter().copied());
        }
        if let Some(class) = find_cycle(&edges) {
            return Err(StoreError::Registry(format!(
                "{} would create a notification cycle through {}",
                name, class
            )));
        }
        self.edges = edges;

        let watches: Vec<SeriesClass> = subscriber
            .watches()
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for class in &watches {
            self.table.entry(*class).or_default().push(subscriber.clone());
        }
        self.subscriptions.push(Subscription {
            subscriber: name,
            watches,
            index: subscriber.index_filter().map(str::to_string),
        });
        Ok(())
    }

    pub fn subscribers_for(&self, class: SeriesClass) -> &[Arc<dyn Subscriber>] {
        self.table.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

/// Depth-first search for a class reachable from itself.
fn find_cycle(edges: &HashMap<SeriesClass, BTreeSet<SeriesClass>>) -> Option<SeriesClass> {
    fn visit(
        class: SeriesClass,
        edges: &HashMap<SeriesClass, BTreeSet<SeriesClass>>,
        path: &mut HashSet<SeriesClass>,
        done: &mut HashSet<SeriesClass>,
    ) -> Option<SeriesClass> {
        if path.contains(&class) {
            return Some(class);
        }
        if done.contains(&class) {
            return None;
        }
        path.insert(class);
        for next in edges.get(&class).into_iter().flatten() {
            if let Some(found) = visit(*next, edges, path, done) {
                return Some(found);
            }
        }
        path.remove(&class);
        done.insert(class);
        None
    }

    let mut done = HashSet::new();
    edges
        .keys()
        .find_map(|class| visit(*class, edges, &mut HashSet::new(), &mut done))
}

/// Counts from one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub ignored: usize,
    pub failed: usize,
}

/// Delivers notifications to registered subscribers.
#[derive(Default)]
pub struct PublishDispatcher {
    registry: SubscriberRegistry,
}

impl PublishDispatcher {
    pub fn new(registry: SubscriberRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Deliver `note` to each subscriber of its class, synchronously.
    pub fn notify(&self, store: &TimeSeriesStore, note: &Notification) -> DispatchReport {
        let mut report = DispatchReport::default();

        for subscriber in self.registry.subscribers_for(note.key.series_class) {
            if let Some(index) = subscriber.index_filter() {
                if index != note.key.index {
                    debug!(
                        "{}: index {} is not `{}` ...ignoring...",
                        subscriber.name(),
                        note.key.index,
                        index
                    );
                    report.ignored += 1;
                    continue;
                }
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| subscriber.handle(store, note)));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    let failure = StoreError::Subscriber {
                        name: subscriber.name().to_string(),
                        message: e.to_string(),
                    };
                    error!("{} on {} score {}", failure, note.topic(), note.score);
                    report.failed += 1;
                }
                Err(payload) => {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "panic".to_string());
                    error!(
                        "Subscriber {} panicked on {} score {}: {}",
                        subscriber.name(),
                        note.topic(),
                        note.score,
                        message
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}
