use std::{env, fs, path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use newsquant::prelude::*;
use time::macros::format_description;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Usage: `cargo run --example correlate -- [PRICES_CSV] [NEWS_CSV]`
///
/// Defaults to the test fixtures shipped with the crate.
fn main() -> Result<()> {
    let _guard = init_tracing()?;

    let mut args = env::args().skip(1);
    let prices_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| fixture("prices.csv"));
    let news_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| fixture("news.csv"));

    let config = CorrelationConfig::default();

    let load_start = Instant::now();
    let news = load_news(&news_path, &config.news, &config.timezone)
        .with_context(|| format!("Failed to load news from {}", news_path.display()))?;
    let load_time = load_start.elapsed();

    let run_start = Instant::now();
    let report = process_stock_data(&prices_path, &news, VaderScorer::new(), &config)
        .with_context(|| format!("Failed to correlate {}", prices_path.display()))?;
    let run_time = run_start.elapsed();

    println!("\n--- Sentiment vs. Daily Return ---");
    match report.correlation {
        Some(r) => println!("Pearson correlation: {r:.4} ({} pairs)", report.pairs),
        None => println!("Correlation undefined ({} pairs)", report.pairs),
    }
    println!("{}", report.joined.as_df());

    println!("\n--- Daily Sentiment ---");
    for day in report.joined.daily_aggregates()? {
        println!(
            "{}  {:>+.4}  ({} headlines)",
            day.date, day.average_sentiment, day.headline_count
        );
    }

    println!("\n--- News Overview ---");
    let analyzer = NewsAnalyzer::new(&news);
    if let Some(lengths) = analyzer.headline_length_stats()? {
        println!("Headline length: {lengths:?}");
    }
    if news.has_publisher() {
        for p in analyzer.top_publishers(5)? {
            println!("{:<24} {}", p.publisher, p.count);
        }
    }
    println!("Top keywords: {:?}", analyzer.top_keywords(10)?);

    println!("\n--- Technical Indicators ---");
    let prices = load_prices(&prices_path, &config.prices, &config.timezone)?;
    let indicators = prices.with_indicators(&[
        TechnicalIndicator::Sma(SmaWindow(20)),
        TechnicalIndicator::Ema(EmaWindow(12)),
        TechnicalIndicator::Rsi(RsiWindow(14)),
        TechnicalIndicator::Macd(MacdParams::default()),
    ])?;
    println!("{indicators}");

    println!("\n--- Timings ---");
    println!("1. News load time:        {load_time:?}");
    println!("2. Correlation run time:  {run_time:?}");

    // The WorkerGuard ensures all buffered logs are flushed when dropped.
    drop(_guard);

    Ok(())
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

// ================================================================================================
// Tracing Configuration
// ================================================================================================

fn init_tracing() -> Result<Option<WorkerGuard>> {
    let app_name = "newsquant";

    // Detect if running in container
    let in_container =
        env::var("CONTAINER").is_ok() || std::path::Path::new("/.dockerenv").exists();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if in_container {
        // Container mode: log to stdout
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_current_span(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        info!("Logging to stdout (container mode)");
        Ok(None)
    } else {
        // Local mode: log to file
        let log_dir = dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
            .context("Failed to find a state or home directory")?
            .join(app_name)
            .join("logs");
        fs::create_dir_all(&log_dir)?;

        let timestamp = time::OffsetDateTime::now_utc()
            .format(&format_description!(
                "[year][month][day]-[hour][minute][second]"
            ))
            .context("Failed to format timestamp")?;
        let file_name = format!("{app_name}-{timestamp}.log");

        let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(non_blocking)
            .with_current_span(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        info!(log_file = %log_dir.join(&file_name).display(), "Logging to file (local mode)");
        Ok(Some(guard))
    }
}
