use thiserror::Error;

/// Errors raised by the store, the dispatch pipeline and gap repair.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Required key fields or the value are missing. Not retried.
    #[error("Incomplete key: {0}")]
    IncompleteKey(String),

    /// A different value already exists at this score.
    #[error("Duplicate score {score} for {key}")]
    DuplicateScore { key: String, score: i64 },

    #[error("Invalid horizon {horizon} for periods {periods}: {reason}")]
    InvalidHorizon {
        horizon: u32,
        periods: u32,
        reason: String,
    },

    #[error("Timestamp {timestamp} for {key} is not aligned to the 5-minute quantum")]
    UnalignedTimestamp { key: String, timestamp: i64 },

    #[error("Unknown series class: {0}")]
    UnknownSeriesClass(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Store contents contradict an operation's precondition.
    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Cannot repair {0}: only price and volume series are repairable")]
    UnsupportedRepair(String),

    /// A subscriber failed while handling a notification. Logged, never
    /// propagated to the triggering save.
    #[error("Subscriber {name} failed: {message}")]
    Subscriber { name: String, message: String },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
