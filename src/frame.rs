use polars::{
    frame::DataFrame,
    prelude::{Column, DataType, Expr, SchemaRef, TimeUnit, TimeZone, lit, when},
};

use crate::error::{NewsQuantError, NewsQuantResult, ParseError, SchemaError, polars_err};

// ================================================================================================
// Traits
// ================================================================================================

/// Common interface of the typed frames (prices, news, joined table).
pub trait Frame {
    /// Access the underlying DataFrame.
    fn as_df(&self) -> &DataFrame;

    fn len(&self) -> usize {
        self.as_df().height()
    }

    fn is_empty(&self) -> bool {
        self.as_df().height() == 0
    }
}

pub trait ToSchema {
    /// Returns the canonical schema for this frame type.
    fn to_schema() -> SchemaRef;
}

pub trait ExprExt {
    /// Safely divides two expressions, protecting against division-by-zero.
    ///
    /// If the denominator is zero, returns `fallback` (default: `f64::INFINITY`).
    fn safe_div(self, other: Expr, fallback: Option<f64>) -> Expr;
}

impl ExprExt for Expr {
    fn safe_div(self, other: Expr, fallback: Option<f64>) -> Expr {
        let fallback_val = fallback.unwrap_or(f64::INFINITY);
        when(other.clone().eq(lit(0.0)))
            .then(lit(fallback_val))
            .otherwise(self / other)
    }
}

// ================================================================================================
// Column Helpers
// ================================================================================================

/// Every timestamp stored by this crate uses this dtype.
pub(crate) fn utc_datetime() -> DataType {
    DataType::Datetime(TimeUnit::Microseconds, Some(TimeZone::UTC))
}

pub(crate) fn require_column<'a>(df: &'a DataFrame, name: &str) -> NewsQuantResult<&'a Column> {
    df.column(name).map_err(|_| {
        SchemaError::MissingColumn {
            column: name.to_string(),
            available: df
                .get_column_names()
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
        .into()
    })
}

/// Builds a UTC datetime column from epoch microseconds.
pub(crate) fn datetime_column(name: &str, micros: Vec<Option<i64>>) -> NewsQuantResult<Column> {
    Column::new(name.into(), micros)
        .cast(&utc_datetime())
        .map_err(|e| polars_err("building datetime column", e))
}

/// Reads a datetime column as epoch microseconds in UTC.
pub(crate) fn micros_values(column: &Column) -> NewsQuantResult<Vec<Option<i64>>> {
    let cast = column
        .cast(&utc_datetime())
        .map_err(|e| polars_err("casting to UTC datetime", e))?;
    let values = cast
        .datetime()
        .map_err(|e| polars_err("reading datetime column", e))?
        .physical()
        .into_iter()
        .collect();
    Ok(values)
}

pub(crate) fn f64_values(column: &Column) -> NewsQuantResult<Vec<Option<f64>>> {
    let values = column
        .f64()
        .map_err(|e| polars_err("reading float column", e))?
        .into_iter()
        .collect();
    Ok(values)
}

pub(crate) fn str_values(column: &Column) -> NewsQuantResult<Vec<Option<&str>>> {
    let values = column
        .str()
        .map_err(|e| polars_err("reading string column", e))?
        .into_iter()
        .collect();
    Ok(values)
}

/// Reads a column holding prices, either numeric or textual.
pub(crate) fn parse_f64_column(column: &Column, name: &str) -> NewsQuantResult<Vec<f64>> {
    match column.dtype() {
        DataType::String => str_values(column)?
            .into_iter()
            .enumerate()
            .map(|(row, cell)| -> NewsQuantResult<f64> {
                let raw = cell.ok_or_else(|| null_value(name, row))?;
                raw.trim().parse::<f64>().map_err(|_| {
                    NewsQuantError::from(ParseError::InvalidNumber {
                        column: name.to_string(),
                        row,
                        value: raw.to_string(),
                    })
                })
            })
            .collect(),
        DataType::Float64
        | DataType::Float32
        | DataType::Int64
        | DataType::Int32
        | DataType::UInt64
        | DataType::UInt32 => {
            let cast = column
                .cast(&DataType::Float64)
                .map_err(|e| polars_err("casting to Float64", e))?;
            f64_values(&cast)?
                .into_iter()
                .enumerate()
                .map(|(row, v)| v.ok_or_else(|| null_value(name, row)))
                .collect()
        }
        other => Err(SchemaError::UnexpectedType {
            column: name.to_string(),
            dtype: other.to_string(),
        }
        .into()),
    }
}

pub(crate) fn null_value(column: &str, row: usize) -> NewsQuantError {
    ParseError::NullValue {
        column: column.to_string(),
        row,
    }
    .into()
}
