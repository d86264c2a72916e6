use std::{collections::HashMap, sync::LazyLock};

use itertools::Itertools;
use polars::{
    frame::DataFrame,
    prelude::{DataType, IntoLazy, SortMultipleOptions, UniqueKeepStrategy, col, len},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    data::news::{FLOORED_DATE, NewsCol, NewsFeed},
    error::{NewsQuantResult, polars_err},
    frame::str_values,
    math::stats::Summary,
    sentiment::{PolarityScorer, bounded_polarity},
};

/// Tokens of two or more word characters.
static KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("keyword pattern is valid"));

pub const COUNT: &str = "count";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherCount {
    pub publisher: String,
    pub count: usize,
}

/// Exploratory statistics over a news feed.
#[derive(Debug, Clone, Copy)]
pub struct NewsAnalyzer<'a> {
    feed: &'a NewsFeed,
}

impl<'a> NewsAnalyzer<'a> {
    pub fn new(feed: &'a NewsFeed) -> Self {
        Self { feed }
    }

    /// Distribution of headline lengths in characters. `None` for an empty feed.
    pub fn headline_length_stats(&self) -> NewsQuantResult<Option<Summary>> {
        let lengths = str_values(self.feed.column(NewsCol::Headline)?)?
            .into_iter()
            .flatten()
            .map(|h| h.chars().count() as f64);
        Summary::from_values(lengths)
    }

    /// Articles per publisher, most prolific first, ties by name.
    ///
    /// Rows without a publisher are ignored. Fails with a schema error when the feed
    /// carries no publisher column.
    pub fn publisher_counts(&self) -> NewsQuantResult<DataFrame> {
        let publisher = self.feed.column(NewsCol::Publisher)?.clone();

        DataFrame::new(vec![publisher])
            .map_err(|e| polars_err("counting publishers", e))?
            .lazy()
            .filter(col(NewsCol::Publisher).is_not_null())
            .group_by([col(NewsCol::Publisher)])
            .agg([len().cast(DataType::UInt64).alias(COUNT)])
            .sort(
                [COUNT, NewsCol::Publisher.as_str()],
                SortMultipleOptions::default().with_order_descending_multi([true, false]),
            )
            .collect()
            .map_err(|e| polars_err("counting publishers", e))
    }

    pub fn top_publishers(&self, n: usize) -> NewsQuantResult<Vec<PublisherCount>> {
        let counts = self.publisher_counts()?.head(Some(n));

        let names = counts
            .column(NewsCol::Publisher.as_str())
            .map_err(convert_err)?;
        let names = str_values(names)?;
        let values: Vec<Option<u64>> = counts
            .column(COUNT)
            .and_then(|c| c.u64().cloned())
            .map_err(convert_err)?
            .into_iter()
            .collect();

        Ok(names
            .into_iter()
            .zip(values)
            .filter_map(|(name, count)| {
                Some(PublisherCount {
                    publisher: name?.to_string(),
                    count: count? as usize,
                })
            })
            .collect())
    }

    /// Articles per UTC calendar day, in date order.
    pub fn daily_article_counts(&self) -> NewsQuantResult<DataFrame> {
        self.feed
            .floored_to_day()?
            .lazy()
            .group_by([col(FLOORED_DATE)])
            .agg([len().cast(DataType::UInt64).alias(COUNT)])
            .sort([FLOORED_DATE], SortMultipleOptions::default())
            .collect()
            .map_err(|e| polars_err("counting daily articles", e))
    }

    /// Distribution of polarity over every headline of the feed.
    pub fn sentiment_stats<S: PolarityScorer>(
        &self,
        scorer: &S,
    ) -> NewsQuantResult<Option<Summary>> {
        let scores: Vec<f64> = str_values(self.feed.column(NewsCol::Headline)?)?
            .into_iter()
            .flatten()
            .map(|h| bounded_polarity(scorer.polarity(h)))
            .collect();
        debug!(scored = scores.len(), "Scored feed headlines");
        Summary::from_values(scores)
    }

    /// The `k` most frequent lower-cased keywords, returned alphabetically.
    ///
    /// Ties on frequency are broken alphabetically.
    pub fn top_keywords(&self, k: usize) -> NewsQuantResult<Vec<String>> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let headlines = str_values(self.feed.column(NewsCol::Headline)?)?;
        for headline in headlines.into_iter().flatten() {
            let lowered = headline.to_lowercase();
            for token in KEYWORD.find_iter(&lowered) {
                *counts.entry(token.as_str().to_string()).or_default() += 1;
            }
        }

        Ok(counts
            .into_iter()
            .sorted_by(|(a, ca), (b, cb)| cb.cmp(ca).then_with(|| a.cmp(b)))
            .take(k)
            .map(|(word, _)| word)
            .sorted()
            .collect())
    }
}

/// Shape of a raw frame before it is typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuality {
    /// Null count per column, in column order.
    pub missing: Vec<(String, usize)>,
    /// Rows identical to an earlier row.
    pub duplicate_rows: usize,
    /// Column type per column, in column order.
    pub dtypes: Vec<(String, String)>,
}

impl DataQuality {
    pub fn total_missing(&self) -> usize {
        self.missing.iter().map(|(_, n)| n).sum()
    }
}

pub fn data_quality_check(df: &DataFrame) -> NewsQuantResult<DataQuality> {
    let missing = df
        .get_columns()
        .iter()
        .map(|c| (c.name().to_string(), c.null_count()))
        .collect();
    let dtypes = df
        .get_columns()
        .iter()
        .map(|c| (c.name().to_string(), c.dtype().to_string()))
        .collect();

    let distinct = df
        .clone()
        .lazy()
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()
        .map_err(|e| polars_err("checking duplicate rows", e))?
        .height();

    Ok(DataQuality {
        missing,
        duplicate_rows: df.height() - distinct,
        dtypes,
    })
}

fn convert_err(e: polars::error::PolarsError) -> crate::error::NewsQuantError {
    polars_err("reading publisher counts", e)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use polars::df;

    use super::*;
    use crate::{
        data::news::NewsRecord,
        error::{NewsQuantError, SchemaError},
        frame::micros_values,
    };

    fn record(day: u32, hour: u32, headline: &str, publisher: Option<&str>) -> NewsRecord {
        NewsRecord {
            timestamp: Utc.with_ymd_and_hms(2020, 6, day, hour, 0, 0).unwrap(),
            headline: headline.to_string(),
            publisher: publisher.map(str::to_string),
        }
    }

    fn feed() -> NewsFeed {
        NewsFeed::from_records([
            record(5, 9, "Stocks rally", Some("Lisa Levin")),
            record(5, 13, "Stocks slide on Fed", Some("Benzinga Newsdesk")),
            record(6, 10, "Fed holds rates", Some("Lisa Levin")),
            record(8, 23, "A rally in tech", None),
        ])
        .expect("feed")
    }

    #[test]
    fn headline_lengths() {
        let feed = feed();
        let stats = NewsAnalyzer::new(&feed)
            .headline_length_stats()
            .expect("stats")
            .expect("non-empty");
        // 12, 19, 15, 15
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, 15.25);
        assert_eq!(stats.min, 12.0);
        assert_eq!(stats.max, 19.0);
        assert_eq!(stats.median, 15.0);
    }

    #[test]
    fn publishers_ranked_by_article_count() {
        let feed = feed();
        let top = NewsAnalyzer::new(&feed).top_publishers(5).expect("publishers");
        assert_eq!(
            top,
            vec![
                PublisherCount { publisher: "Lisa Levin".into(), count: 2 },
                PublisherCount { publisher: "Benzinga Newsdesk".into(), count: 1 },
            ],
            "Null publishers are dropped"
        );
        assert_eq!(NewsAnalyzer::new(&feed).top_publishers(1).expect("top").len(), 1);
    }

    #[test]
    fn publisher_counts_need_publisher_column() {
        let raw = df!("Date" => ["2020-06-05"], "headline" => ["x"]).expect("frame");
        let feed = NewsFeed::from_frame(
            &raw,
            &crate::config::NewsColumns::default(),
            &crate::config::TimezoneConfig::default(),
        )
        .expect("feed");
        let err = NewsAnalyzer::new(&feed).publisher_counts().unwrap_err();
        assert!(matches!(err, NewsQuantError::Schema(SchemaError::MissingColumn { .. })));
    }

    #[test]
    fn articles_per_day() {
        let feed = feed();
        let daily = NewsAnalyzer::new(&feed).daily_article_counts().expect("daily");
        let counts: Vec<Option<u64>> = daily
            .column(COUNT)
            .expect("count")
            .u64()
            .expect("u64")
            .into_iter()
            .collect();
        assert_eq!(counts, vec![Some(2), Some(1), Some(1)]);

        let days = micros_values(daily.column(FLOORED_DATE).expect("date")).expect("days");
        let first = Utc.with_ymd_and_hms(2020, 6, 5, 0, 0, 0).unwrap().timestamp_micros();
        assert_eq!(days[0], Some(first));
    }

    #[test]
    fn sentiment_distribution_uses_scorer() {
        let feed = feed();
        let scorer = |h: &str| if h.contains("rally") { 1.0 } else { -1.0 };
        let stats = NewsAnalyzer::new(&feed)
            .sentiment_stats(&scorer)
            .expect("stats")
            .expect("non-empty");
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.min, -1.0);
        assert_eq!(stats.max, 1.0);
    }

    #[test]
    fn keywords_are_lowercased_and_ranked() {
        let feed = feed();
        let keywords = NewsAnalyzer::new(&feed).top_keywords(3).expect("keywords");
        // fed: 2, rally: 2, stocks: 2; single letters never count.
        assert_eq!(keywords, vec!["fed", "rally", "stocks"]);

        let one = NewsAnalyzer::new(&feed).top_keywords(1).expect("keywords");
        assert_eq!(one, vec!["fed"], "Ties resolve alphabetically");
    }

    #[test]
    fn quality_report_counts_nulls_and_duplicates() {
        let df = df!(
            "Date" => [Some("2020-05-22"), Some("2020-05-22"), None],
            "Close" => [Some("100"), Some("100"), Some("101")]
        )
        .expect("frame");

        let quality = data_quality_check(&df).expect("quality");
        assert_eq!(
            quality.missing,
            vec![("Date".to_string(), 1), ("Close".to_string(), 0)]
        );
        assert_eq!(quality.total_missing(), 1);
        assert_eq!(quality.duplicate_rows, 1);
        assert_eq!(quality.dtypes[1], ("Close".to_string(), "str".to_string()));
    }
}
