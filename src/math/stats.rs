use itertools::{Itertools, MinMaxResult};
use polars::{
    frame::DataFrame,
    prelude::{Column, Expr, IntoLazy, QuantileMethod, col, lit},
};
use serde::{Deserialize, Serialize};

use crate::error::{DataError, NewsQuantError, NewsQuantResult, polars_err};

/// Relative spread under which a series counts as constant.
const ZERO_VARIANCE_TOLERANCE: f64 = 1e-12;

// ================================================================================================
// Correlation
// ================================================================================================

/// Pearson correlation coefficient of two equally long samples.
///
/// Returns `None` when fewer than two pairs are given, the lengths differ, or either
/// sample is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    if is_constant(xs) || is_constant(ys) {
        return None;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (cov, var_x, var_y) = xs.iter().zip(ys).fold((0.0, 0.0, 0.0), |(c, vx, vy), (x, y)| {
        let dx = x - mean_x;
        let dy = y - mean_y;
        (c + dx * dy, vx + dx * dx, vy + dy * dy)
    });

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}

/// Pearson correlation over the pairs where both sides are present and finite.
///
/// Returns the coefficient together with the number of pairs it was computed on.
pub fn pearson_pairs<I>(pairs: I) -> (Option<f64>, usize)
where
    I: IntoIterator<Item = (Option<f64>, Option<f64>)>,
{
    let (xs, ys): (Vec<f64>, Vec<f64>) = pairs
        .into_iter()
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((x, y)),
            _ => None,
        })
        .unzip();
    (pearson(&xs, &ys), xs.len())
}

fn is_constant(values: &[f64]) -> bool {
    match values.iter().copied().minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::NoElements | MinMaxResult::OneElement(_) => true,
        MinMaxResult::MinMax(min, max) => {
            let scale = min.abs().max(max.abs()).max(1.0);
            max - min <= ZERO_VARIANCE_TOLERANCE * scale
        }
    }
}

// ================================================================================================
// Descriptive statistics
// ================================================================================================

/// Count, moments and quartiles of a sample.
///
/// Quartiles are linearly interpolated between the closest ranks; `std` is the sample
/// standard deviation and is undefined for a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

const VALUE: &str = "value";

impl Summary {
    /// Summarizes the finite values of `values`. Returns `None` if there are none.
    pub fn from_values<I>(values: I) -> NewsQuantResult<Option<Self>>
    where
        I: IntoIterator<Item = f64>,
    {
        let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        let count = finite.len();
        if count == 0 {
            return Ok(None);
        }

        let stats = DataFrame::new(vec![Column::new(VALUE.into(), finite)])
            .map_err(convert_err)?
            .lazy()
            .select([
                col(VALUE).mean().alias("mean"),
                col(VALUE).std(1).alias("std"),
                col(VALUE).min().alias("min"),
                quantile_expr(0.25).alias("q25"),
                quantile_expr(0.5).alias("median"),
                quantile_expr(0.75).alias("q75"),
                col(VALUE).max().alias("max"),
            ])
            .collect()
            .map_err(convert_err)?;

        let required = |name: &str| -> NewsQuantResult<f64> {
            scalar(&stats, name)?.ok_or_else(|| {
                NewsQuantError::from(DataError::InvariantViolation(format!(
                    "summary statistic '{name}' is null"
                )))
            })
        };

        Ok(Some(Self {
            count,
            mean: required("mean")?,
            std: scalar(&stats, "std")?.filter(|_| count > 1),
            min: required("min")?,
            q25: required("q25")?,
            median: required("median")?,
            q75: required("q75")?,
            max: required("max")?,
        }))
    }
}

fn quantile_expr(q: f64) -> Expr {
    col(VALUE).quantile(lit(q), QuantileMethod::Linear)
}

fn scalar(df: &DataFrame, name: &str) -> NewsQuantResult<Option<f64>> {
    let value = df
        .column(name)
        .and_then(|c| c.f64().map(|ca| ca.get(0)))
        .map_err(convert_err)?;
    Ok(value)
}

fn convert_err(e: polars::error::PolarsError) -> NewsQuantError {
    polars_err("summarizing values", e)
}
