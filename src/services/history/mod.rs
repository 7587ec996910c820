//! Raw tick history readers.
//!
//! [`TickHistory`] is the in-process companion store holding fine-grained
//! ticks; [`SqliteHistory`] is the bulk historical archive consulted when the
//! companion store has a hole.

pub mod sqlite;
pub mod ticks;

pub use sqlite::SqliteHistory;
pub use ticks::TickHistory;

use crate::error::Result;
use crate::types::{RawRecord, Stream, TimeWindow};

/// Reader of raw records for one instrument stream.
pub trait RecordSource: Send + Sync {
    fn name(&self) -> &str;

    /// Records inside `window`, ordered by timestamp.
    fn fetch_raw_records(
        &self,
        ticker: &str,
        exchange: &str,
        stream: Stream,
        window: TimeWindow,
    ) -> Result<Vec<RawRecord>>;
}
