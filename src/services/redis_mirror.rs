//! Write-through Redis mirror of the store.
//!
//! Each series is a sorted set at its store key with members
//! `"{json value}:{score}"` scored by the integer score.

use crate::error::{Result, StoreError};
use crate::services::store::{CommittedPoint, TimeSeriesStore};
use crate::types::{SeriesKey, SeriesValue};
use redis::aio::ConnectionManager;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Redis persistence for committed points.
#[derive(Clone)]
pub struct RedisMirror {
    conn: ConnectionManager,
}

impl RedisMirror {
    /// Connect to Redis at `redis_url`.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("RedisMirror connected to Redis at {}", redis_url);
        Ok(Self { conn })
    }

    /// Forward committed points to Redis until the store drops its sender.
    pub fn spawn(self, mut rx: mpsc::UnboundedReceiver<CommittedPoint>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut conn = self.conn.clone();
            while let Some(point) = rx.recv().await {
                let member = match encode_member(&point.value, point.score) {
                    Ok(member) => member,
                    Err(e) => {
                        error!("Failed to encode {} score {}: {}", point.key, point.score, e);
                        continue;
                    }
                };
                if let Err(e) = redis::cmd("ZADD")
                    .arg(point.key.to_string())
                    .arg(point.score)
                    .arg(member)
                    .query_async::<_, i64>(&mut conn)
                    .await
                {
                    error!("Failed to mirror {} score {}: {}", point.key, point.score, e);
                }
            }
            debug!("RedisMirror stopped");
        })
    }

    /// Load one series into `store` without notifying subscribers.
    pub async fn load_series(&self, store: &TimeSeriesStore, key: &SeriesKey) -> Result<usize> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = redis::cmd("ZRANGE")
            .arg(key.to_string())
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;

        let mut loaded = 0;
        for member in members {
            match decode_member(&member) {
                Ok((score, value)) => match store.restore(key, score, value) {
                    Ok(true) => loaded += 1,
                    Ok(false) => {}
                    Err(e) => warn!("Skipping {} member {}: {}", key, member, e),
                },
                Err(e) => warn!("Skipping {} member {}: {}", key, member, e),
            }
        }
        Ok(loaded)
    }

    /// Load every series found in Redis.
    pub async fn load_all(&self, store: &TimeSeriesStore) -> Result<usize> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg("*:*:*:*")
            .query_async(&mut conn)
            .await?;

        let mut loaded = 0;
        let mut series = 0;
        for raw_key in keys {
            let Ok(key) = SeriesKey::parse(&raw_key) else {
                debug!("Ignoring non-series key {}", raw_key);
                continue;
            };
            loaded += self.load_series(store, &key).await?;
            series += 1;
        }

        if loaded > 0 {
            info!("Loaded {} points across {} series from Redis", loaded, series);
        }
        Ok(loaded)
    }
}

/// Sorted-set member for a value at a score.
pub fn encode_member(value: &SeriesValue, score: i64) -> Result<String> {
    Ok(format!("{}:{}", serde_json::to_string(value)?, score))
}

/// Inverse of [`encode_member`].
pub fn decode_member(member: &str) -> Result<(i64, SeriesValue)> {
    let (value, score) = member
        .rsplit_once(':')
        .ok_or_else(|| StoreError::InvalidKey(format!("malformed member `{}`", member)))?;
    let score = score
        .parse()
        .map_err(|_| StoreError::InvalidKey(format!("malformed score in `{}`", member)))?;
    Ok((score, serde_json::from_str(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BandsValue, SignalEvent, Trend};

    #[test]
    fn test_scalar_member() {
        let member = encode_member(&SeriesValue::Scalar(0.5), 155_773).unwrap();
        assert_eq!(member, "0.5:155773");
        assert_eq!(decode_member(&member).unwrap(), (155_773, SeriesValue::Scalar(0.5)));
    }

    #[test]
    fn test_structured_members() {
        let bands = SeriesValue::Bands(BandsValue {
            upper: 3.0,
            middle: 2.0,
            lower: 1.0,
        });
        let signal = SeriesValue::Signal(SignalEvent {
            indicator: "bbands".to_string(),
            trend: Trend::Bullish,
            periods: 12,
            value: 1.5,
            threshold: 5.0,
        });
        for value in [bands, signal] {
            let member = encode_member(&value, 42).unwrap();
            assert_eq!(decode_member(&member).unwrap(), (42, value));
        }
    }

    #[test]
    fn test_malformed_member() {
        assert!(decode_member("no-score").is_err());
        assert!(decode_member("1.0:abc").is_err());
    }
}
