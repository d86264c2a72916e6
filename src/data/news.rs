use std::sync::Arc;

use chrono::{DateTime, Utc};
use polars::{
    frame::DataFrame,
    prelude::{
        Column, DataType, Expr, Field, IntoLazy, PlSmallStr, Schema, SchemaRef, col, lit,
    },
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tracing::debug;

use crate::{
    config::{NewsColumns, TimezoneConfig},
    data::{
        price::timestamp_micros,
        time::micros_to_utc,
    },
    error::{DataError, NewsQuantError, NewsQuantResult, SchemaError, polars_err},
    frame::{
        Frame, ToSchema, datetime_column, micros_values, null_value, require_column, str_values,
        utc_datetime,
    },
};

/// Canonical columns of a [`NewsFeed`].
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
pub enum NewsCol {
    /// Publication time in UTC, at the precision of the source.
    Timestamp,
    /// Free-text headline.
    Headline,
    /// Publisher name. Only present when the source provides it.
    Publisher,
}

impl From<NewsCol> for PlSmallStr {
    fn from(value: NewsCol) -> Self {
        value.as_str().into()
    }
}

impl NewsCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub timestamp: DateTime<Utc>,
    pub headline: String,
    pub publisher: Option<String>,
}

/// A pre-loaded set of news headlines.
///
/// Timestamps keep their original precision. Consumers that need calendar days call
/// [`NewsFeed::floored_to_day`], which works on a copy.
#[derive(Debug, Clone)]
pub struct NewsFeed {
    df: DataFrame,
}

impl Frame for NewsFeed {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl ToSchema for NewsFeed {
    fn to_schema() -> SchemaRef {
        let fields: Vec<Field> = NewsCol::iter()
            .map(|col| {
                let dtype = match col {
                    NewsCol::Timestamp => utc_datetime(),
                    NewsCol::Headline | NewsCol::Publisher => DataType::String,
                };
                Field::new(col.into(), dtype)
            })
            .collect();

        Arc::new(Schema::from_iter(fields))
    }
}

impl Default for NewsFeed {
    fn default() -> Self {
        Self {
            df: DataFrame::empty_with_schema(&Self::to_schema()),
        }
    }
}

impl NewsFeed {
    pub fn from_records<I>(records: I) -> NewsQuantResult<Self>
    where
        I: IntoIterator<Item = NewsRecord>,
    {
        let mut timestamps = Vec::new();
        let mut headlines = Vec::new();
        let mut publishers = Vec::new();
        for r in records {
            timestamps.push(Some(r.timestamp.timestamp_micros()));
            headlines.push(r.headline);
            publishers.push(r.publisher);
        }

        let columns = vec![
            datetime_column(NewsCol::Timestamp.as_str(), timestamps)?,
            Column::new(NewsCol::Headline.name(), headlines),
            Column::new(NewsCol::Publisher.name(), publishers),
        ];
        let df = DataFrame::new(columns).map_err(convert_err)?;
        Ok(Self { df })
    }

    /// Builds a feed from a raw frame.
    ///
    /// The publisher column is optional: when configured but absent it is skipped.
    pub fn from_frame(
        df: &DataFrame,
        columns: &NewsColumns,
        tz: &TimezoneConfig,
    ) -> NewsQuantResult<Self> {
        let date_col = require_column(df, &columns.date)?;
        let headline_col = require_column(df, &columns.headline)?;

        let timestamps = timestamp_micros(date_col, &columns.date, tz)?
            .into_iter()
            .map(Some)
            .collect();
        let headlines = required_strings(headline_col, &columns.headline)?;

        let mut out = vec![
            datetime_column(NewsCol::Timestamp.as_str(), timestamps)?,
            Column::new(NewsCol::Headline.name(), headlines),
        ];

        if let Some(name) = &columns.publisher {
            match df.column(name) {
                Ok(publisher) => {
                    let publishers: Vec<Option<String>> = str_values(publisher)?
                        .into_iter()
                        .map(|p| p.map(str::to_string))
                        .collect();
                    out.push(Column::new(NewsCol::Publisher.name(), publishers));
                }
                Err(_) => debug!(column = %name, "Publisher column not present; skipping"),
            }
        }

        let df = DataFrame::new(out).map_err(convert_err)?;
        Ok(Self { df })
    }

    pub fn has_publisher(&self) -> bool {
        self.df.column(NewsCol::Publisher.as_str()).is_ok()
    }

    pub fn records(&self) -> NewsQuantResult<Vec<NewsRecord>> {
        let timestamps = micros_values(self.column(NewsCol::Timestamp)?)?;
        let headlines = str_values(self.column(NewsCol::Headline)?)?;
        let publishers = if self.has_publisher() {
            str_values(self.column(NewsCol::Publisher)?)?
        } else {
            vec![None; self.df.height()]
        };

        timestamps
            .into_iter()
            .zip(headlines)
            .zip(publishers)
            .map(|((ts, headline), publisher)| -> NewsQuantResult<NewsRecord> {
                let timestamp = ts
                    .and_then(micros_to_utc)
                    .ok_or_else(|| invariant("news timestamp is null or out of range"))?;
                let headline = headline.ok_or_else(|| invariant("headline is null"))?;
                Ok(NewsRecord {
                    timestamp,
                    headline: headline.to_string(),
                    publisher: publisher.map(str::to_string),
                })
            })
            .collect()
    }

    /// Returns a copy of the feed whose timestamps are truncated to midnight UTC.
    ///
    /// The copy's temporal column is named `date`; the other columns are unchanged.
    pub fn floored_to_day(&self) -> NewsQuantResult<DataFrame> {
        let mut exprs: Vec<Expr> = vec![
            col(NewsCol::Timestamp)
                .dt()
                .truncate(lit("1d"))
                .alias(FLOORED_DATE),
        ];
        exprs.extend(
            self.df
                .get_column_names()
                .into_iter()
                .filter(|name| name.as_str() != NewsCol::Timestamp.as_str())
                .map(|name| col(name.clone())),
        );

        self.df
            .clone()
            .lazy()
            .select(exprs)
            .collect()
            .map_err(convert_err)
    }

    pub(crate) fn column(&self, col: NewsCol) -> NewsQuantResult<&Column> {
        self.df.column(col.as_str()).map_err(|_| {
            SchemaError::MissingColumn {
                column: col.to_string(),
                available: self
                    .df
                    .get_column_names()
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            }
            .into()
        })
    }
}

/// Name of the day-truncated column produced by [`NewsFeed::floored_to_day`].
pub const FLOORED_DATE: &str = "date";

fn required_strings(column: &Column, name: &str) -> NewsQuantResult<Vec<String>> {
    match column.dtype() {
        DataType::String => str_values(column)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.map(str::to_string)
                    .ok_or_else(|| null_value(name, row))
            })
            .collect(),
        other => Err(SchemaError::UnexpectedType {
            column: name.to_string(),
            dtype: other.to_string(),
        }
        .into()),
    }
}

fn invariant(msg: &str) -> NewsQuantError {
    DataError::InvariantViolation(msg.to_string()).into()
}

fn convert_err(e: polars::error::PolarsError) -> NewsQuantError {
    polars_err("building news feed", e)
}
