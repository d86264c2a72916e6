use newsquant::prelude::*;
use polars::prelude::DataType;

mod common;

use common::{fixture, fixture_scorer, load_fixture_news};

#[test]
fn news_fixture_statistics() {
    let news = load_fixture_news();
    let analyzer = NewsAnalyzer::new(&news);

    let lengths = analyzer
        .headline_length_stats()
        .expect("stats")
        .expect("Fixture has headlines");
    assert_eq!(lengths.count, 6);
    assert_eq!(lengths.min, 29.0, "'Company A posts solid quarter'");
    assert_eq!(lengths.max, 31.0, "'Analysts raise Company A target'");

    let publishers = analyzer.top_publishers(10).expect("publishers");
    assert_eq!(
        publishers,
        vec![
            PublisherCount { publisher: "Lisa Levin".into(), count: 3 },
            PublisherCount { publisher: "Benzinga Newsdesk".into(), count: 1 },
            PublisherCount { publisher: "Charles Gross".into(), count: 1 },
        ],
        "Missing publisher cells are skipped and ties sort by name"
    );

    let daily = analyzer.daily_article_counts().expect("daily");
    assert_eq!(daily.height(), 6, "Every fixture headline falls on its own day");

    let sentiment = analyzer
        .sentiment_stats(&fixture_scorer)
        .expect("sentiment")
        .expect("non-empty");
    assert_eq!(sentiment.min, -0.4);
    assert_eq!(sentiment.max, 0.9);

    let keywords = analyzer.top_keywords(1).expect("keywords");
    assert_eq!(keywords, vec!["company"]);
}

#[test]
fn quality_check_on_raw_news_file() {
    let raw = read_csv(fixture("news.csv")).expect("read");
    let quality = data_quality_check(&raw).expect("quality");

    assert_eq!(quality.duplicate_rows, 0);
    assert_eq!(quality.total_missing(), 1, "One article lacks a publisher");
    assert!(
        quality
            .missing
            .iter()
            .any(|(name, n)| name == "publisher" && *n == 1)
    );
    assert!(
        quality
            .dtypes
            .iter()
            .all(|(_, dtype)| *dtype == DataType::String.to_string()),
        "Raw frames are read as text"
    );
}
