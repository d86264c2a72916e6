// 1. Traits
pub use crate::frame::{ExprExt, Frame, ToSchema};
pub use crate::sentiment::PolarityScorer;

// 2. The Pipeline
pub use crate::correlation::{
    CorrelationReport, DailyAggregate, JoinedCol, JoinedRecord, JoinedTable,
    SentimentCorrelator, process_stock_data,
};

// 3. Typed Frames
pub use crate::data::news::{NewsCol, NewsFeed, NewsRecord};
pub use crate::data::price::{PriceCol, PriceRecord, PriceSeries};

// 4. Indicators & Analysis
pub use crate::data::indicator::{EmaWindow, MacdParams, RsiWindow, SmaWindow, TechnicalIndicator};
pub use crate::eda::{DataQuality, NewsAnalyzer, PublisherCount, data_quality_check};
pub use crate::math::stats::{Summary, pearson};
pub use crate::sentiment::{SentimentLabel, VaderScorer};

// 5. Configuration
pub use crate::config::{CorrelationConfig, NewsColumns, PriceColumns, TimezoneConfig};

// 6. Errors
pub use crate::error::{
    DataError, IoError, NewsQuantError, NewsQuantResult, ParseError, SchemaError,
};

// 7. Loading
pub use crate::io::{load_news, load_prices, read_csv, read_csv_from_reader};
