use std::env;
use std::str::FromStr;

/// A ticker/exchange pair kept healed by the periodic repair job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedPair {
    pub ticker: String,
    pub exchange: String,
}

impl WatchedPair {
    /// Parse `TICKER@exchange`.
    pub fn parse(s: &str) -> Option<Self> {
        let (ticker, exchange) = s.trim().split_once('@')?;
        if ticker.is_empty() || exchange.is_empty() {
            return None;
        }
        Some(Self {
            ticker: ticker.to_string(),
            exchange: exchange.to_string(),
        })
    }
}

/// Indicator pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    /// Horizons in 5-minute periods (default 1h, 4h, 24h).
    pub horizons: Vec<u32>,
    /// Band width below which a squeeze signal is emitted.
    pub squeeze_threshold: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Periods per horizon for simple moving averages.
    pub sma_multipliers: Vec<u32>,
    /// Periods per horizon for exponential moving averages.
    pub ema_multipliers: Vec<u32>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            horizons: vec![12, 48, 288],
            squeeze_threshold: 5.0,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            sma_multipliers: vec![20, 50],
            ema_multipliers: vec![20, 50],
        }
    }
}

/// Gap repair job configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairConfig {
    /// Seconds between repair runs.
    pub interval_secs: u64,
    /// Number of scores behind the latest closed bucket to scan.
    pub lookback_scores: i64,
    pub watched_pairs: Vec<WatchedPair>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            interval_secs: 900,
            lookback_scores: 288,
            watched_pairs: Vec::new(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis URL for the write-through mirror.
    pub redis_url: Option<String>,
    /// SQLite database holding bulk price/volume history.
    pub history_db_path: Option<String>,
    /// Upper bound for one ingest cascade (ms).
    pub cascade_timeout_ms: u64,
    /// Capacity of the ingest channel.
    pub ingest_buffer: usize,
    pub indicators: IndicatorConfig,
    pub repair: RepairConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let indicator_defaults = IndicatorConfig::default();
        let repair_defaults = RepairConfig::default();

        Self {
            redis_url: env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            history_db_path: env::var("HISTORY_DB_PATH").ok().filter(|s| !s.is_empty()),
            cascade_timeout_ms: parse_var("CASCADE_TIMEOUT_MS").unwrap_or(5_000),
            ingest_buffer: parse_var("INGEST_BUFFER").unwrap_or(4096),
            indicators: IndicatorConfig {
                horizons: list_var("HORIZONS").unwrap_or(indicator_defaults.horizons),
                squeeze_threshold: parse_var("BBANDS_SQUEEZE_THRESHOLD")
                    .unwrap_or(indicator_defaults.squeeze_threshold),
                rsi_oversold: parse_var("RSI_OVERSOLD").unwrap_or(indicator_defaults.rsi_oversold),
                rsi_overbought: parse_var("RSI_OVERBOUGHT")
                    .unwrap_or(indicator_defaults.rsi_overbought),
                sma_multipliers: list_var("SMA_MULTIPLIERS")
                    .unwrap_or(indicator_defaults.sma_multipliers),
                ema_multipliers: list_var("EMA_MULTIPLIERS")
                    .unwrap_or(indicator_defaults.ema_multipliers),
            },
            repair: RepairConfig {
                interval_secs: parse_var("REPAIR_INTERVAL_SECS")
                    .unwrap_or(repair_defaults.interval_secs),
                lookback_scores: parse_var("REPAIR_LOOKBACK_SCORES")
                    .unwrap_or(repair_defaults.lookback_scores),
                watched_pairs: env::var("WATCHED_PAIRS")
                    .ok()
                    .map(|s| parse_pairs(&s))
                    .unwrap_or_default(),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn list_var<T: FromStr>(name: &str) -> Option<Vec<T>> {
    env::var(name).ok().and_then(|v| parse_list(&v))
}

/// Parse a comma separated list; `None` if any entry is malformed or the list is empty.
fn parse_list<T: FromStr>(s: &str) -> Option<Vec<T>> {
    let items: Option<Vec<T>> = s
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse().ok())
        .collect();
    items.filter(|items| !items.is_empty())
}

/// Parse `TICKER@exchange,TICKER@exchange`, skipping malformed entries.
fn parse_pairs(s: &str) -> Vec<WatchedPair> {
    s.split(',').filter_map(WatchedPair::parse).collect()
}
