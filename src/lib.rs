//! Correlates financial-news sentiment with daily stock returns.
//!
//! Prices and headlines are loaded into typed frames ([`data::price::PriceSeries`],
//! [`data::news::NewsFeed`]), aligned by trading day and annotated with sentiment and
//! returns by [`correlation::SentimentCorrelator`]. Technical indicators and news
//! exploratory statistics work on the same frames.

pub mod config;
pub mod correlation;
pub mod data;
pub mod eda;
pub mod error;
pub mod frame;
pub mod io;
pub mod math;
pub mod prelude;
pub mod sentiment;
