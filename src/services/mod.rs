pub mod dispatcher;
pub mod gap_repair;
pub mod history;
pub mod ingest;
pub mod redis_mirror;
pub mod resample;
pub mod store;
pub mod subscribers;

pub use dispatcher::{
    DispatchReport, Notification, PublishDispatcher, Subscriber, SubscriberRegistry, Subscription,
};
pub use gap_repair::{spawn_repair_job, GapRepairer};
pub use history::{RecordSource, SqliteHistory, TickHistory};
pub use ingest::IngestService;
pub use redis_mirror::RedisMirror;
pub use store::{CommittedPoint, SaveOutcome, TimeSeriesStore};
pub use subscribers::{build_registry, Indicator, IndicatorSubscriber};
