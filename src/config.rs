use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

// ================================================================================================
// Column Mappings
// ================================================================================================

/// Names of the source columns holding price data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceColumns {
    /// Trading day of the observation.
    pub date: String,
    /// Closing price of the trading day.
    pub close: String,
}

impl Default for PriceColumns {
    fn default() -> Self {
        Self {
            date: "Date".to_string(),
            close: "Close".to_string(),
        }
    }
}

impl PriceColumns {
    pub fn with_date(self, date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..self
        }
    }

    pub fn with_close(self, close: impl Into<String>) -> Self {
        Self {
            close: close.into(),
            ..self
        }
    }
}

/// Names of the source columns holding news data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewsColumns {
    /// Publication timestamp, possibly finer than a day.
    pub date: String,
    /// Free-text headline.
    pub headline: String,
    /// Publisher name. `None` when the source has no such column.
    pub publisher: Option<String>,
}

impl Default for NewsColumns {
    fn default() -> Self {
        Self {
            date: "Date".to_string(),
            headline: "headline".to_string(),
            publisher: Some("publisher".to_string()),
        }
    }
}

impl NewsColumns {
    pub fn with_date(self, date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..self
        }
    }

    pub fn with_headline(self, headline: impl Into<String>) -> Self {
        Self {
            headline: headline.into(),
            ..self
        }
    }

    pub fn with_publisher(self, publisher: Option<String>) -> Self {
        Self { publisher, ..self }
    }
}

// ================================================================================================
// Time Handling
// ================================================================================================

/// Timezone handling for timestamps read from text.
///
/// Timestamps carrying an explicit offset are converted directly. Naive timestamps are
/// interpreted in `source` and then converted. All frames store UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimezoneConfig {
    pub source: Tz,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            source: chrono_tz::Etc::GMT,
        }
    }
}

impl TimezoneConfig {
    pub fn with_source(self, source: Tz) -> Self {
        Self { source }
    }
}

// ================================================================================================
// Pipeline Configuration
// ================================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationConfig {
    pub prices: PriceColumns,
    pub news: NewsColumns,
    pub timezone: TimezoneConfig,
}

impl CorrelationConfig {
    pub fn with_prices(self, prices: PriceColumns) -> Self {
        Self { prices, ..self }
    }

    pub fn with_news(self, news: NewsColumns) -> Self {
        Self { news, ..self }
    }

    pub fn with_timezone(self, timezone: TimezoneConfig) -> Self {
        Self { timezone, ..self }
    }
}
