use std::sync::Arc;

use chrono::NaiveDate;
use polars::{
    frame::DataFrame,
    prelude::{
        Column, DataType, Field, IntoLazy, PlSmallStr, Schema, SchemaRef, SortMultipleOptions,
        TimeUnit, col, lit,
    },
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tracing::warn;

use crate::{
    config::{PriceColumns, TimezoneConfig},
    data::{
        indicator::{TechnicalIndicator, compute_indicators},
        time::{day_to_micros, localize_naive_micros, micros_to_utc, parse_utc_cell},
    },
    error::{DataError, NewsQuantError, NewsQuantResult, SchemaError, polars_err},
    frame::{
        Frame, ToSchema, datetime_column, f64_values, micros_values, null_value,
        parse_f64_column, require_column, str_values, utc_datetime,
    },
};

/// Canonical columns of a [`PriceSeries`].
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
pub enum PriceCol {
    /// Trading day, midnight UTC.
    Date,
    /// Closing price of the trading day.
    Close,
}

impl From<PriceCol> for PlSmallStr {
    fn from(value: PriceCol) -> Self {
        value.as_str().into()
    }
}

impl PriceCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// One trading day of a price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closing prices, sorted by date, dates normalized to midnight UTC.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    df: DataFrame,
}

impl Frame for PriceSeries {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl ToSchema for PriceSeries {
    fn to_schema() -> SchemaRef {
        let fields: Vec<Field> = PriceCol::iter()
            .map(|col| {
                let dtype = match col {
                    PriceCol::Date => utc_datetime(),
                    PriceCol::Close => DataType::Float64,
                };
                Field::new(col.into(), dtype)
            })
            .collect();

        Arc::new(Schema::from_iter(fields))
    }
}

impl Default for PriceSeries {
    fn default() -> Self {
        Self {
            df: DataFrame::empty_with_schema(&Self::to_schema()),
        }
    }
}

impl PriceSeries {
    pub fn from_records<I>(records: I) -> NewsQuantResult<Self>
    where
        I: IntoIterator<Item = PriceRecord>,
    {
        let (dates, closes): (Vec<_>, Vec<_>) = records
            .into_iter()
            .map(|r| (Some(day_to_micros(r.date)), r.close))
            .unzip();
        Self::assemble(dates, closes)
    }

    /// Builds a series from a raw frame.
    ///
    /// The date column may be textual or temporal. Values without a zone (text, `Date` or
    /// naive `Datetime`) are read as wall-clock time in `tz.source`. Every value is converted
    /// to UTC and then truncated to the calendar day.
    pub fn from_frame(
        df: &DataFrame,
        columns: &PriceColumns,
        tz: &TimezoneConfig,
    ) -> NewsQuantResult<Self> {
        let date_col = require_column(df, &columns.date)?;
        let close_col = require_column(df, &columns.close)?;

        let dates = timestamp_micros(date_col, &columns.date, tz)?
            .into_iter()
            .map(Some)
            .collect();
        let closes = parse_f64_column(close_col, &columns.close)?;

        Self::assemble(dates, closes)
    }

    pub fn records(&self) -> NewsQuantResult<Vec<PriceRecord>> {
        let dates = micros_values(self.df.column(PriceCol::Date.as_str()).map_err(convert_err)?)?;
        let closes = f64_values(self.df.column(PriceCol::Close.as_str()).map_err(convert_err)?)?;

        dates
            .into_iter()
            .zip(closes)
            .map(|(date, close)| -> NewsQuantResult<PriceRecord> {
                let date = date
                    .and_then(micros_to_utc)
                    .ok_or_else(|| invariant("price date is null or out of range"))?
                    .date_naive();
                let close = close.ok_or_else(|| invariant("close price is null"))?;
                Ok(PriceRecord { date, close })
            })
            .collect()
    }

    /// Appends one column per indicator, keeping every row.
    pub fn with_indicators(&self, indicators: &[TechnicalIndicator]) -> NewsQuantResult<DataFrame> {
        compute_indicators(self, indicators)
    }

    fn assemble(dates: Vec<Option<i64>>, closes: Vec<f64>) -> NewsQuantResult<Self> {
        let df = DataFrame::new(vec![
            datetime_column(PriceCol::Date.as_str(), dates)?,
            Column::new(PriceCol::Close.name(), closes),
        ])
        .map_err(convert_err)?
        .lazy()
        .with_column(col(PriceCol::Date).dt().truncate(lit("1d")))
        .sort(
            [PriceCol::Date],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()
        .map_err(convert_err)?;

        let distinct = df
            .column(PriceCol::Date.as_str())
            .and_then(|c| c.as_materialized_series().n_unique())
            .map_err(convert_err)?;
        if distinct != df.height() {
            warn!(
                rows = df.height(),
                distinct_dates = distinct,
                "Price series contains duplicate dates"
            );
        }

        Ok(Self { df })
    }
}

/// Reads a date column into epoch microseconds (UTC), parsing text when needed.
/// Zone-less values are wall-clock time in `tz.source`.
pub(crate) fn timestamp_micros(
    column: &Column,
    name: &str,
    tz: &TimezoneConfig,
) -> NewsQuantResult<Vec<i64>> {
    match column.dtype() {
        DataType::String => str_values(column)?
            .into_iter()
            .enumerate()
            .map(|(row, cell)| -> NewsQuantResult<i64> {
                let raw = cell.ok_or_else(|| null_value(name, row))?;
                Ok(parse_utc_cell(raw, tz.source, name, row)?.timestamp_micros())
            })
            .collect(),
        DataType::Datetime(_, Some(_)) => micros_values(column)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| v.ok_or_else(|| null_value(name, row)))
            .collect(),
        DataType::Datetime(_, None) | DataType::Date => {
            let naive = column
                .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
                .map_err(convert_err)?;
            naive
                .datetime()
                .map_err(convert_err)?
                .physical()
                .into_iter()
                .enumerate()
                .map(|(row, v)| -> NewsQuantResult<i64> {
                    let us = v.ok_or_else(|| null_value(name, row))?;
                    localize_naive_micros(us, tz.source, name, row)
                })
                .collect()
        }
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
    polars_err("building price series", e)
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;
    use crate::error::ParseError;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn from_frame_normalizes_and_sorts() {
        let raw = df!(
            "Date" => ["2020-05-26", "2020-05-22T00:00:00", "2020-05-25 16:00:00"],
            "Close" => ["103", "100", "101"],
            "Volume" => ["1", "2", "3"]
        )
        .expect("frame");

        let series = PriceSeries::from_frame(
            &raw,
            &PriceColumns::default(),
            &TimezoneConfig::default(),
        )
        .expect("series");

        let records = series.records().expect("records");
        assert_eq!(
            records,
            vec![
                PriceRecord { date: ymd(2020, 5, 22), close: 100.0 },
                PriceRecord { date: ymd(2020, 5, 25), close: 101.0 },
                PriceRecord { date: ymd(2020, 5, 26), close: 103.0 },
            ]
        );
        assert_eq!(series.as_df().width(), 2, "Only canonical columns are kept");
    }

    #[test]
    fn schema_matches_canonical_definition() {
        let series = PriceSeries::from_records([PriceRecord {
            date: ymd(2020, 5, 22),
            close: 100.0,
        }])
        .expect("series");

        let expected = PriceSeries::to_schema();
        for (name, dtype) in expected.iter() {
            let actual = series.as_df().column(name.as_str()).expect("column");
            assert_eq!(actual.dtype(), dtype, "Type mismatch for '{name}'");
        }
    }

    #[test]
    fn missing_close_is_schema_error() {
        let raw = df!("Date" => ["2020-05-22"], "Open" => [1.0]).expect("frame");
        let err = PriceSeries::from_frame(&raw, &PriceColumns::default(), &TimezoneConfig::default())
            .unwrap_err();
        assert!(
            matches!(err, NewsQuantError::Schema(SchemaError::MissingColumn { ref column, .. }) if column == "Close"),
            "Unexpected error: {err:?}"
        );
    }

    #[test]
    fn malformed_date_is_parse_error() {
        let raw = df!("Date" => ["2020-05-22", "not a date"], "Close" => [1.0, 2.0]).expect("frame");
        let err = PriceSeries::from_frame(&raw, &PriceColumns::default(), &TimezoneConfig::default())
            .unwrap_err();
        assert!(
            matches!(err, NewsQuantError::Parse(ParseError::InvalidDate { row: 1, .. })),
            "Unexpected error: {err:?}"
        );
    }

    #[test]
    fn naive_datetime_column_uses_source_timezone() {
        let tz = TimezoneConfig::default().with_source(chrono_tz::Asia::Tokyo);
        let wall = ymd(2020, 5, 22).and_hms_opt(3, 0, 0).expect("time");

        let text = df!("Date" => ["2020-05-22 03:00:00"], "Close" => [1.0]).expect("frame");
        let naive_dates = Column::new("Date".into(), [wall.and_utc().timestamp_micros()])
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
            .expect("naive datetime");
        let temporal = DataFrame::new(vec![naive_dates, Column::new("Close".into(), [1.0])])
            .expect("frame");

        let from_text = PriceSeries::from_frame(&text, &PriceColumns::default(), &tz)
            .expect("text series")
            .records()
            .expect("records");
        let from_temporal = PriceSeries::from_frame(&temporal, &PriceColumns::default(), &tz)
            .expect("temporal series")
            .records()
            .expect("records");

        assert_eq!(from_text[0].date, ymd(2020, 5, 21), "03:00 in Tokyo is the prior UTC day");
        assert_eq!(from_text, from_temporal, "Text and naive datetime must agree");
    }

    #[test]
    fn zoned_datetime_column_keeps_its_instant() {
        let tz = TimezoneConfig::default().with_source(chrono_tz::Asia::Tokyo);
        let instant = ymd(2020, 5, 22).and_hms_opt(3, 0, 0).expect("time");
        let dates = Column::new("Date".into(), [instant.and_utc().timestamp_micros()])
            .cast(&utc_datetime())
            .expect("utc datetime");
        let raw = DataFrame::new(vec![dates, Column::new("Close".into(), [1.0])]).expect("frame");

        let records = PriceSeries::from_frame(&raw, &PriceColumns::default(), &tz)
            .expect("series")
            .records()
            .expect("records");
        assert_eq!(records[0].date, ymd(2020, 5, 22));
    }

    #[test]
    fn empty_series_is_valid() {
        let series = PriceSeries::from_records(Vec::new()).expect("series");
        assert!(series.is_empty());
        assert!(series.records().expect("records").is_empty());
    }
}
