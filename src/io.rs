use std::{
    io::{Cursor, Read},
    path::Path,
};

use polars::{
    frame::DataFrame,
    prelude::{CsvReadOptions, LazyCsvReader, LazyFileListReader, PlPath, SerReader},
};
use tracing::debug;

use crate::{
    config::{NewsColumns, PriceColumns, TimezoneConfig},
    data::{news::NewsFeed, price::PriceSeries},
    error::{IoError, NewsQuantResult},
};

/// Reads a headered CSV file with every column as `String`.
///
/// Typing is left to [`PriceSeries::from_frame`] and [`NewsFeed::from_frame`], which
/// report unparseable cells with their row and value.
pub fn read_csv(path: impl AsRef<Path>) -> NewsQuantResult<DataFrame> {
    let path = path.as_ref();
    std::fs::metadata(path).map_err(IoError::from)?;

    let location = path
        .to_str()
        .ok_or_else(|| IoError::ReaderCreation(format!("non UTF-8 path: {}", path.display())))?;

    let df = LazyCsvReader::new(PlPath::new(location))
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
        .map_err(|e| IoError::ReaderCreation(format!("{}: {e}", path.display())))?
        .collect()
        .map_err(|e| IoError::ReadFailed(format!("{}: {e}", path.display())))?;

    debug!(path = %path.display(), rows = df.height(), columns = df.width(), "Read CSV");
    Ok(df)
}

/// Same as [`read_csv`] for in-memory or streamed input.
pub fn read_csv_from_reader<R: Read>(mut reader: R) -> NewsQuantResult<DataFrame> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).map_err(IoError::from)?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(buf))
        .finish()
        .map_err(|e| IoError::ReadFailed(e.to_string()))?;
    Ok(df)
}

#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_prices(
    path: impl AsRef<Path>,
    columns: &PriceColumns,
    tz: &TimezoneConfig,
) -> NewsQuantResult<PriceSeries> {
    PriceSeries::from_frame(&read_csv(path)?, columns, tz)
}

#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_news(
    path: impl AsRef<Path>,
    columns: &NewsColumns,
    tz: &TimezoneConfig,
) -> NewsQuantResult<NewsFeed> {
    NewsFeed::from_frame(&read_csv(path)?, columns, tz)
}
