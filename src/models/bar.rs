use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV bar after cleaning.
///
/// Within a series, timestamps are strictly increasing and unique, and
/// all numeric fields are finite. The loader enforces both; everything
/// downstream relies on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(datetime: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self { datetime, open, high, low, close, volume }
    }

    /// All five numeric fields finite and volume non-negative.
    pub fn is_valid(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
            && self.volume >= 0.0
    }
}

/// Ordered sequence of bars for one timeframe. Read-only after load.
pub type Series = Vec<Bar>;
