//! Tickseries - score-indexed market time-series store with indicator cascades

pub mod config;
pub mod error;
pub mod services;
pub mod types;

pub use error::{Result, StoreError};
pub use services::{
    build_registry, GapRepairer, IngestService, PublishDispatcher, SaveOutcome, Subscriber,
    SubscriberRegistry, TimeSeriesStore,
};
pub use types::*;
