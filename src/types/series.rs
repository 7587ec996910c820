use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Indexes resampled from raw price ticks.
pub const PRICE_INDEXES: [&str; 7] = [
    "open_price",
    "high_price",
    "low_price",
    "close_price",
    "midpoint_price",
    "mean_price",
    "price_variance",
];

/// Indexes resampled from raw volume ticks.
pub const VOLUME_INDEXES: [&str; 4] = ["open_volume", "high_volume", "low_volume", "close_volume"];

pub const CLOSE_PRICE: &str = "close_price";
pub const CLOSE_VOLUME: &str = "close_volume";

/// Logical type of a series. Closed registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesClass {
    Price,
    Volume,
    Momentum,
    Bbands,
    Sma,
    Ema,
    Rsi,
    Signal,
}

impl SeriesClass {
    pub const ALL: [SeriesClass; 8] = [
        Self::Price,
        Self::Volume,
        Self::Momentum,
        Self::Bbands,
        Self::Sma,
        Self::Ema,
        Self::Rsi,
        Self::Signal,
    ];

    /// Parse from the key segment.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "price" => Some(Self::Price),
            "volume" => Some(Self::Volume),
            "momentum" => Some(Self::Momentum),
            "bbands" => Some(Self::Bbands),
            "sma" => Some(Self::Sma),
            "ema" => Some(Self::Ema),
            "rsi" => Some(Self::Rsi),
            "signal" => Some(Self::Signal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Volume => "volume",
            Self::Momentum => "momentum",
            Self::Bbands => "bbands",
            Self::Sma => "sma",
            Self::Ema => "ema",
            Self::Rsi => "rsi",
            Self::Signal => "signal",
        }
    }

    /// Raw classes hold resampled tick data; everything else is derived.
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Price | Self::Volume)
    }

    /// Derived classes require 5-minute aligned timestamps.
    pub fn is_indicator(&self) -> bool {
        !self.is_raw()
    }

    /// Raw tick stream an index of this class is resampled from.
    pub fn stream(&self) -> Option<Stream> {
        match self {
            Self::Price => Some(Stream::Price),
            Self::Volume => Some(Stream::Volume),
            _ => None,
        }
    }

    /// Known indexes for raw classes; `None` for derived classes.
    pub fn indexes(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Price => Some(&PRICE_INDEXES),
            Self::Volume => Some(&VOLUME_INDEXES),
            _ => None,
        }
    }
}

impl fmt::Display for SeriesClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw tick stream of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Price,
    Volume,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Volume => "volume",
        }
    }

    pub fn series_class(&self) -> SeriesClass {
        match self {
            Self::Price => SeriesClass::Price,
            Self::Volume => SeriesClass::Volume,
        }
    }

    /// Stream an index name belongs to, if it is a raw index.
    pub fn for_index(index: &str) -> Option<Self> {
        if PRICE_INDEXES.contains(&index) {
            Some(Self::Price)
        } else if VOLUME_INDEXES.contains(&index) {
            Some(Self::Volume)
        } else {
            None
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one logical series.
///
/// Store key format: `{ticker}:{exchange}:{series_class}:{index}[:{suffix}]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub ticker: String,
    pub exchange: String,
    pub series_class: SeriesClass,
    pub index: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl SeriesKey {
    pub fn new(
        ticker: impl Into<String>,
        exchange: impl Into<String>,
        series_class: SeriesClass,
        index: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            exchange: exchange.into(),
            series_class,
            index: index.into(),
            suffix: None,
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Convenience for a raw price/volume series.
    pub fn raw(ticker: &str, exchange: &str, index: &str) -> Result<Self> {
        let stream = Stream::for_index(index)
            .ok_or_else(|| StoreError::InvalidKey(format!("unknown raw index `{}`", index)))?;
        Ok(Self::new(ticker, exchange, stream.series_class(), index))
    }

    /// Same key with another class, index and suffix; used by subscribers to
    /// derive their output key from the upstream key.
    pub fn derive(&self, series_class: SeriesClass, index: &str, suffix: impl fmt::Display) -> Self {
        Self {
            ticker: self.ticker.clone(),
            exchange: self.exchange.clone(),
            series_class,
            index: index.to_string(),
            suffix: Some(suffix.to_string()),
        }
    }

    /// Reject keys missing ticker, exchange or index, or whose fields
    /// contain the `:` separator.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            self.ticker.as_str(),
            self.exchange.as_str(),
            self.index.as_str(),
            self.suffix.as_deref().unwrap_or_default(),
        ];
        if fields.iter().any(|field| field.contains(':')) {
            return Err(StoreError::InvalidKey(self.to_string()));
        }

        let missing: Vec<&str> = [
            ("ticker", self.ticker.trim().is_empty()),
            ("exchange", self.exchange.trim().is_empty()),
            ("index", self.index.trim().is_empty()),
        ]
        .into_iter()
        .filter_map(|(field, empty)| empty.then_some(field))
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(StoreError::IncompleteKey(format!(
                "missing {} for {}",
                missing.join(", "),
                self
            )))
        }
    }

    /// Notification topic: the store key without its suffix.
    pub fn topic(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.ticker, self.exchange, self.series_class, self.index
        )
    }

    /// Parse a store key.
    pub fn parse(key: &str) -> Result<Self> {
        let parts: Vec<&str> = key.splitn(5, ':').collect();
        if parts.len() < 4 {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let series_class = SeriesClass::from_str(parts[2])
            .ok_or_else(|| StoreError::UnknownSeriesClass(parts[2].to_string()))?;
        let parsed = Self {
            ticker: parts[0].to_string(),
            exchange: parts[1].to_string(),
            series_class,
            index: parts[3].to_string(),
            suffix: parts.get(4).map(|s| s.to_string()),
        };
        parsed.validate()?;
        Ok(parsed)
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.topic())?;
        if let Some(ref suffix) = self.suffix {
            write!(f, ":{}", suffix)?;
        }
        Ok(())
    }
}
