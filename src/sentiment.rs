use std::fmt;

use polars::prelude::{Expr, lit, when};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use vader_sentiment::SentimentIntensityAnalyzer;

/// Scores the polarity of a piece of text.
///
/// Implementations must be free of side effects and should return a value in `[-1, 1]`.
/// The pipeline clamps whatever comes back, so a misbehaving scorer cannot leak values
/// outside that range into the joined table.
pub trait PolarityScorer {
    fn polarity(&self, text: &str) -> f64;
}

impl<F> PolarityScorer for F
where
    F: Fn(&str) -> f64,
{
    fn polarity(&self, text: &str) -> f64 {
        self(text)
    }
}

/// Lexicon and rule based scorer returning the VADER compound score.
pub struct VaderScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl VaderScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VaderScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaderScorer").finish_non_exhaustive()
    }
}

impl PolarityScorer for VaderScorer {
    fn polarity(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }
        let scores = self.analyzer.polarity_scores(text);
        scores.get("compound").copied().unwrap_or(0.0).clamp(-1.0, 1.0)
    }
}

/// Categorical sentiment derived from the sign of a polarity.
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
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > 0.0 {
            Self::Positive
        } else if polarity < 0.0 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Same rule as [`SentimentLabel::from_polarity`], over a polarity column.
    pub(crate) fn expr(polarity: Expr) -> Expr {
        when(polarity.clone().gt(lit(0.0)))
            .then(lit(Self::Positive.as_str()))
            .when(polarity.lt(lit(0.0)))
            .then(lit(Self::Negative.as_str()))
            .otherwise(lit(Self::Neutral.as_str()))
    }
}

/// Clamps a raw score into `[-1, 1]`; non-finite scores count as neutral.
pub(crate) fn bounded_polarity(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
