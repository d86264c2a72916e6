use std::path::PathBuf;

use newsquant::prelude::*;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn load_fixture_news() -> NewsFeed {
    load_news(
        fixture("news.csv"),
        &NewsColumns::default(),
        &TimezoneConfig::default(),
    )
    .expect("Failed to load news fixture")
}

/// Deterministic polarity per fixture headline, keyed by a distinctive word.
pub fn fixture_scorer(headline: &str) -> f64 {
    const SCORES: &[(&str, f64)] = &[
        ("solid", 0.2),
        ("raise", 0.5),
        ("recall", -0.4),
        ("meeting", 0.1),
        ("wins", 0.6),
        ("extend", 0.9),
    ];
    SCORES
        .iter()
        .find(|(word, _)| headline.contains(word))
        .map_or(0.0, |(_, score)| *score)
}
