use std::{path::Path, str::FromStr, sync::Arc};

use chrono::NaiveDate;
use polars::{
    frame::DataFrame,
    prelude::{
        Column, DataType, Field, IntoLazy, PlSmallStr, Schema, SchemaRef, SortMultipleOptions,
        col, len, lit,
    },
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tracing::{debug, info, warn};

use crate::{
    config::CorrelationConfig,
    data::{
        news::{FLOORED_DATE, NewsCol, NewsFeed},
        price::{PriceCol, PriceSeries},
        time::micros_to_utc,
    },
    error::{DataError, NewsQuantError, NewsQuantResult, polars_err},
    frame::{
        ExprExt, Frame, ToSchema, f64_values, micros_values, require_column, str_values,
        utc_datetime,
    },
    io::load_prices,
    math::stats::pearson_pairs,
    sentiment::{PolarityScorer, SentimentLabel, bounded_polarity},
};

/// Keep price order, then news order, among rows of the same day through the join.
const PRICE_ROW: &str = "price_row";
const NEWS_ROW: &str = "news_row";

const HEADLINE_COUNT: &str = "headline_count";

/// Columns of a [`JoinedTable`], in output order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum JoinedCol {
    Date,
    Close,
    Headline,
    Polarity,
    Sentiment,
    DailyReturn,
    AverageSentiment,
}

impl From<JoinedCol> for PlSmallStr {
    fn from(value: JoinedCol) -> Self {
        value.as_str().into()
    }
}

impl JoinedCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRecord {
    pub date: NaiveDate,
    pub close: f64,
    pub headline: String,
    pub polarity: f64,
    pub sentiment: SentimentLabel,
    /// Undefined for the first row of the joined series.
    pub daily_return: Option<f64>,
    pub average_sentiment: f64,
}

/// Mean polarity of all joined headlines sharing a date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub average_sentiment: f64,
    pub headline_count: usize,
}

/// Prices and headlines matched on trading day, annotated with sentiment and returns.
///
/// Rows are ordered by date. Within a date, rows follow the price series first and the
/// news feed second.
#[derive(Debug, Clone)]
pub struct JoinedTable {
    df: DataFrame,
}

impl Frame for JoinedTable {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl ToSchema for JoinedTable {
    fn to_schema() -> SchemaRef {
        let fields: Vec<Field> = JoinedCol::iter()
            .map(|col| {
                let dtype = match col {
                    JoinedCol::Date => utc_datetime(),
                    JoinedCol::Headline | JoinedCol::Sentiment => DataType::String,
                    JoinedCol::Close
                    | JoinedCol::Polarity
                    | JoinedCol::DailyReturn
                    | JoinedCol::AverageSentiment => DataType::Float64,
                };
                Field::new(col.into(), dtype)
            })
            .collect();

        Arc::new(Schema::from_iter(fields))
    }
}

impl Default for JoinedTable {
    fn default() -> Self {
        Self {
            df: DataFrame::empty_with_schema(&Self::to_schema()),
        }
    }
}

impl JoinedTable {
    pub fn records(&self) -> NewsQuantResult<Vec<JoinedRecord>> {
        let dates = micros_values(self.column(JoinedCol::Date)?)?;
        let closes = f64_values(self.column(JoinedCol::Close)?)?;
        let headlines = str_values(self.column(JoinedCol::Headline)?)?;
        let polarities = f64_values(self.column(JoinedCol::Polarity)?)?;
        let labels = str_values(self.column(JoinedCol::Sentiment)?)?;
        let returns = f64_values(self.column(JoinedCol::DailyReturn)?)?;
        let averages = f64_values(self.column(JoinedCol::AverageSentiment)?)?;

        (0..self.df.height())
            .map(|i| -> NewsQuantResult<JoinedRecord> {
                let label = labels[i].ok_or_else(|| invariant("sentiment label is null"))?;
                Ok(JoinedRecord {
                    date: to_day(dates[i])?,
                    close: closes[i].ok_or_else(|| invariant("close price is null"))?,
                    headline: headlines[i]
                        .ok_or_else(|| invariant("headline is null"))?
                        .to_string(),
                    polarity: polarities[i].ok_or_else(|| invariant("polarity is null"))?,
                    sentiment: SentimentLabel::from_str(label)
                        .map_err(|_| invariant("unknown sentiment label"))?,
                    daily_return: returns[i],
                    average_sentiment: averages[i]
                        .ok_or_else(|| invariant("average sentiment is null"))?,
                })
            })
            .collect()
    }

    /// One row per joined date, in date order.
    pub fn daily_aggregates(&self) -> NewsQuantResult<Vec<DailyAggregate>> {
        let out = self
            .df
            .clone()
            .lazy()
            .group_by_stable([col(JoinedCol::Date)])
            .agg([
                col(JoinedCol::Polarity)
                    .mean()
                    .alias(JoinedCol::AverageSentiment.as_str()),
                len().cast(DataType::UInt64).alias(HEADLINE_COUNT),
            ])
            .sort([JoinedCol::Date], SortMultipleOptions::default())
            .collect()
            .map_err(|e| polars_err("aggregating daily sentiment", e))?;

        let dates = micros_values(require_column(&out, JoinedCol::Date.as_str())?)?;
        let averages = f64_values(require_column(&out, JoinedCol::AverageSentiment.as_str())?)?;
        let counts: Vec<Option<u64>> = require_column(&out, HEADLINE_COUNT)?
            .u64()
            .map_err(|e| polars_err("reading headline counts", e))?
            .into_iter()
            .collect();

        dates
            .into_iter()
            .zip(averages)
            .zip(counts)
            .map(|((date, avg), count)| -> NewsQuantResult<DailyAggregate> {
                Ok(DailyAggregate {
                    date: to_day(date)?,
                    average_sentiment: avg.ok_or_else(|| invariant("daily mean is null"))?,
                    headline_count: count.ok_or_else(|| invariant("daily count is null"))?
                        as usize,
                })
            })
            .collect()
    }

    fn column(&self, col: JoinedCol) -> NewsQuantResult<&Column> {
        require_column(&self.df, col.as_str())
    }
}

/// Outcome of one correlation run.
#[derive(Debug, Clone)]
pub struct CorrelationReport {
    /// Pearson correlation of average sentiment and daily return. `None` when fewer than
    /// two complete pairs exist or either side is constant.
    pub correlation: Option<f64>,
    /// Number of rows the coefficient was computed on.
    pub pairs: usize,
    pub joined: JoinedTable,
}

/// Aligns prices and news by trading day and correlates sentiment with returns.
#[derive(Debug, Clone)]
pub struct SentimentCorrelator<S> {
    scorer: S,
}

impl<S: PolarityScorer> SentimentCorrelator<S> {
    pub fn new(scorer: S) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    #[tracing::instrument(skip_all, fields(prices = prices.len(), headlines = news.len()))]
    pub fn correlate(
        &self,
        prices: &PriceSeries,
        news: &NewsFeed,
    ) -> NewsQuantResult<CorrelationReport> {
        let news_days = news
            .floored_to_day()?
            .with_row_index(NEWS_ROW.into(), None)
            .map_err(convert_err)?
            .lazy()
            .select([col(FLOORED_DATE), col(NewsCol::Headline), col(NEWS_ROW)]);

        let mut joined = prices
            .as_df()
            .with_row_index(PRICE_ROW.into(), None)
            .map_err(convert_err)?
            .lazy()
            .inner_join(news_days, col(PriceCol::Date), col(FLOORED_DATE))
            .sort(
                [PriceCol::Date.as_str(), PRICE_ROW, NEWS_ROW],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .collect()
            .map_err(convert_err)?;
        debug!(rows = joined.height(), "Joined prices with news");

        let headlines = require_column(&joined, NewsCol::Headline.as_str())?;
        let polarities: Vec<f64> = str_values(headlines)?
            .into_iter()
            .map(|h| bounded_polarity(h.map_or(0.0, |text| self.scorer.polarity(text))))
            .collect();
        debug!(scored = polarities.len(), "Scored headlines");

        joined
            .with_column(Column::new(JoinedCol::Polarity.name(), polarities))
            .map_err(convert_err)?;

        let close = col(PriceCol::Close);
        let polarity = col(JoinedCol::Polarity);
        let df = joined
            .lazy()
            .select([
                col(PriceCol::Date).alias(JoinedCol::Date.as_str()),
                close.clone().alias(JoinedCol::Close.as_str()),
                col(NewsCol::Headline).alias(JoinedCol::Headline.as_str()),
                polarity.clone(),
                SentimentLabel::expr(polarity.clone()).alias(JoinedCol::Sentiment.as_str()),
                (close.clone().safe_div(close.shift(lit(1)), Some(f64::NAN)) - lit(1.0))
                    .alias(JoinedCol::DailyReturn.as_str()),
                polarity
                    .mean()
                    .over([col(PriceCol::Date)])
                    .alias(JoinedCol::AverageSentiment.as_str()),
            ])
            .collect()
            .map_err(convert_err)?;
        let joined = JoinedTable { df };

        if joined.is_empty() {
            warn!("No trading day has both a price and a headline");
        }

        let averages = f64_values(joined.column(JoinedCol::AverageSentiment)?)?;
        let returns = f64_values(joined.column(JoinedCol::DailyReturn)?)?;
        let (correlation, pairs) = pearson_pairs(averages.into_iter().zip(returns));

        match correlation {
            Some(r) => info!(correlation = r, pairs, "Sentiment-return correlation computed"),
            None => warn!(pairs, "Correlation undefined: too few pairs or zero variance"),
        }

        Ok(CorrelationReport {
            correlation,
            pairs,
            joined,
        })
    }
}

/// Loads the price file at `stock_path` and correlates it with `news`.
#[tracing::instrument(skip_all, fields(stock = %stock_path.as_ref().display()))]
pub fn process_stock_data<P, S>(
    stock_path: P,
    news: &NewsFeed,
    scorer: S,
    config: &CorrelationConfig,
) -> NewsQuantResult<CorrelationReport>
where
    P: AsRef<Path>,
    S: PolarityScorer,
{
    let prices = load_prices(stock_path.as_ref(), &config.prices, &config.timezone)?;
    SentimentCorrelator::new(scorer).correlate(&prices, news)
}

fn to_day(micros: Option<i64>) -> NewsQuantResult<NaiveDate> {
    micros
        .and_then(micros_to_utc)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| invariant("joined date is null or out of range"))
}

fn invariant(msg: &str) -> NewsQuantError {
    DataError::InvariantViolation(msg.to_string()).into()
}

fn convert_err(e: polars::error::PolarsError) -> NewsQuantError {
    polars_err("correlating sentiment with returns", e)
}
