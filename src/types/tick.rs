use crate::types::Stream;
use serde::{Deserialize, Serialize};

/// A raw observation as returned by history readers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    pub value: f64,
}

/// A raw price or volume tick for one instrument on one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub ticker: String,
    pub exchange: String,
    pub stream: Stream,
    pub value: f64,
    pub timestamp: i64,
}

impl Tick {
    pub fn record(&self) -> RawRecord {
        RawRecord {
            timestamp: self.timestamp,
            value: self.value,
        }
    }
}

/// Message shape published by exchange pollers.
///
/// ```json
/// {"source": "binance", "category": "price", "symbol": "ETH/BTC", "value": 0.071, "timestamp": 1522066118.23}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct QueueItem {
    pub source: String,
    pub category: String,
    pub symbol: String,
    pub value: f64,
    pub timestamp: f64,
}

impl QueueItem {
    /// Convert into a tick; `None` for unknown categories or malformed symbols.
    pub fn into_tick(self) -> Option<Tick> {
        let stream = match self.category.as_str() {
            "price" => Stream::Price,
            "volume" => Stream::Volume,
            _ => return None,
        };
        let (base, counter) = self.symbol.split_once('/')?;
        if base.is_empty() || counter.is_empty() || self.source.is_empty() {
            return None;
        }
        Some(Tick {
            ticker: format!("{}_{}", base, counter),
            exchange: self.source,
            stream,
            value: self.value,
            timestamp: self.timestamp as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_item_into_tick() {
        let item: QueueItem = serde_json::from_str(
            r#"{"source":"poloniex","category":"price","symbol":"LTC/BTC","value":0.0123,"timestamp":1522066118.23}"#,
        )
        .unwrap();
        let tick = item.into_tick().unwrap();
        assert_eq!(tick.ticker, "LTC_BTC");
        assert_eq!(tick.exchange, "poloniex");
        assert_eq!(tick.stream, Stream::Price);
        assert_eq!(tick.timestamp, 1522066118);
    }

    #[test]
    fn test_queue_item_rejects_unknown_category() {
        let item = QueueItem {
            source: "binance".to_string(),
            category: "orderbook".to_string(),
            symbol: "ETH/BTC".to_string(),
            value: 1.0,
            timestamp: 0.0,
        };
        assert!(item.into_tick().is_none());
    }

    #[test]
    fn test_queue_item_rejects_bad_symbol() {
        let item = QueueItem {
            source: "binance".to_string(),
            category: "volume".to_string(),
            symbol: "ETHBTC".to_string(),
            value: 1.0,
            timestamp: 0.0,
        };
        assert!(item.into_tick().is_none());
    }
}
