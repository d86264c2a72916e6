use polars::{
    frame::DataFrame,
    prelude::{
        EWMOptions, Expr, IntoLazy, RollingOptionsFixedWindow, SortMultipleOptions, col, lit,
        when,
    },
    series::ops::NullBehavior,
};
use serde::{Deserialize, Serialize};

use crate::{
    data::price::{PriceCol, PriceSeries},
    error::{DataError, NewsQuantResult, polars_err},
    frame::Frame,
};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmaWindow(pub u16);

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SmaWindow(pub u16);

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RsiWindow(pub u16);

/// Moving Average Convergence Divergence spans.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: u16,
    pub slow: u16,
    pub signal: u16,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TechnicalIndicator {
    Sma(SmaWindow),
    Ema(EmaWindow),
    Rsi(RsiWindow),
    Macd(MacdParams),
}

impl TechnicalIndicator {
    pub fn validate(&self) -> NewsQuantResult<()> {
        let ok = match self {
            Self::Sma(SmaWindow(w)) | Self::Ema(EmaWindow(w)) | Self::Rsi(RsiWindow(w)) => *w > 0,
            Self::Macd(p) => p.fast > 0 && p.signal > 0 && p.fast < p.slow,
        };
        if ok {
            Ok(())
        } else {
            Err(DataError::InvalidIndicator(format!("{self:?}")).into())
        }
    }

    /// Names of the columns this indicator appends, in order.
    pub fn column_names(&self) -> Vec<String> {
        match self {
            Self::Sma(w) => vec![w.column_name()],
            Self::Ema(w) => vec![w.column_name()],
            Self::Rsi(w) => vec![w.column_name()],
            Self::Macd(p) => {
                let suffix = format!("{}_{}_{}", p.fast, p.slow, p.signal);
                vec![
                    format!("macd_{suffix}"),
                    format!("macd_signal_{suffix}"),
                    format!("macd_hist_{suffix}"),
                ]
            }
        }
    }

    fn exprs(&self) -> Vec<Expr> {
        let close = col(PriceCol::Close);
        let names = self.column_names();
        let values = match self {
            Self::Sma(w) => vec![w.sma_expr(close)],
            Self::Ema(w) => vec![w.ema_expr(close)],
            Self::Rsi(w) => vec![w.rsi_expr(close)],
            Self::Macd(p) => {
                let (macd, signal, hist) = p.macd_exprs(close);
                vec![macd, signal, hist]
            }
        };
        values
            .into_iter()
            .zip(names)
            .map(|(expr, name)| expr.alias(name.as_str()))
            .collect()
    }
}

impl SmaWindow {
    pub fn column_name(&self) -> String {
        format!("sma_{}", self.0)
    }

    fn sma_expr(&self, source: Expr) -> Expr {
        let window = self.0 as usize;
        let options = RollingOptionsFixedWindow {
            window_size: window,
            min_periods: window,
            weights: None,
            center: false,
            fn_params: None,
        };
        source.rolling_mean(options)
    }
}

impl EmaWindow {
    pub fn column_name(&self) -> String {
        format!("ema_{}", self.0)
    }

    fn ema_expr(&self, source: Expr) -> Expr {
        source.ewm_mean(ewm_options(2.0 / (self.0 as f64 + 1.0), self.0))
    }
}

impl RsiWindow {
    pub fn column_name(&self) -> String {
        format!("rsi_{}", self.0)
    }

    fn rsi_expr(&self, source: Expr) -> Expr {
        // Wilder smoothing
        let options = ewm_options(1.0 / (self.0 as f64), self.0);

        let delta = source.diff(lit(1), NullBehavior::Ignore);
        let gain = delta.clone().clip(lit(0), lit(f64::MAX));
        let loss = delta.clip(lit(f64::MIN), lit(0)).abs();

        let avg_gain = gain.ewm_mean(options);
        let avg_loss = loss.ewm_mean(options);

        // No losses in the window: pure gain saturates at 100, a flat line sits at 50.
        when(avg_loss.clone().eq(lit(0.0)))
            .then(
                when(avg_gain.clone().eq(lit(0.0)))
                    .then(lit(50.0))
                    .otherwise(lit(100.0)),
            )
            .otherwise(lit(100.0) - (lit(100.0) / (lit(1.0) + avg_gain / avg_loss)))
    }
}

impl MacdParams {
    /// Returns `(macd, signal, histogram)`.
    fn macd_exprs(&self, source: Expr) -> (Expr, Expr, Expr) {
        let fast = EmaWindow(self.fast).ema_expr(source.clone());
        let slow = EmaWindow(self.slow).ema_expr(source);
        let macd = fast - slow;
        let signal = macd.clone().ewm_mean(ewm_options(
            2.0 / (self.signal as f64 + 1.0),
            self.signal,
        ));
        let hist = macd.clone() - signal.clone();
        (macd, signal, hist)
    }
}

/// Recursive, unbiased weighting. Nested averages skip the nulls of their input's warm-up.
fn ewm_options(alpha: f64, window: u16) -> EWMOptions {
    EWMOptions {
        alpha,
        adjust: false,
        bias: false,
        min_periods: window as usize,
        ignore_nulls: true,
    }
}

/// Sorts the series by date and appends the requested indicator columns.
pub(crate) fn compute_indicators(
    prices: &PriceSeries,
    indicators: &[TechnicalIndicator],
) -> NewsQuantResult<DataFrame> {
    for indicator in indicators {
        indicator.validate()?;
    }

    let exprs: Vec<Expr> = indicators.iter().flat_map(|i| i.exprs()).collect();

    prices
        .as_df()
        .clone()
        .lazy()
        .sort([PriceCol::Date], SortMultipleOptions::default())
        .with_columns(exprs)
        .collect()
        .map_err(|e| polars_err("computing technical indicators", e))
}
