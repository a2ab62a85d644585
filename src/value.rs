//! Composite value scoring: cost efficiency, fan quality and content appeal

use polars::prelude::*;
use tracing::info;

use crate::data::{columns, require_columns};
use crate::error::{AnalysisError, Result};
use crate::stats::{float_col, min_max_scaled, round_half_even, scalar, sort_rows, warn_if_flat};

/// Columns of the scored table, in output order
pub const OUTPUT_COLUMNS: [&str; 10] = [
    columns::NAME,
    columns::VALUE_SCORE,
    columns::FOLLOWERS,
    columns::CERTIFICATION,
    columns::VIDEO_PRICE,
    columns::VIDEO_CPE,
    columns::COST_INDEX,
    columns::FAN_QUALITY_INDEX,
    columns::CONTENT_APPEAL_INDEX,
    columns::PROVINCE,
];

// Intermediate columns, dropped from the output
const COST_BENEFIT: &str = "cost_benefit";
const CONTENT_APPEAL_RAW: &str = "content_appeal_raw";
const VALUE_SCORE_RAW: &str = "value_score_raw";

/// Weights of the composite score
#[derive(Debug, Clone, PartialEq)]
pub struct ValueScoreConfig {
    pub fan_quality_weight: f64,
    pub content_appeal_weight: f64,
    /// Added to the cost index so quality still counts at zero cost index
    pub cost_floor: f64,
}

impl Default for ValueScoreConfig {
    fn default() -> Self {
        Self {
            fan_quality_weight: 0.6,
            content_appeal_weight: 0.4,
            cost_floor: 0.1,
        }
    }
}

/// Scores influencers on a 0-100 value scale
#[derive(Debug, Clone, Default)]
pub struct ValueScorer {
    config: ValueScoreConfig,
}

impl ValueScorer {
    pub fn new(config: ValueScoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValueScoreConfig {
        &self.config
    }

    /// Score every row of an enriched table.
    ///
    /// # Arguments
    /// * `df` - Influencer table already carrying the derived ratio columns
    ///
    /// # Returns
    /// * The [`OUTPUT_COLUMNS`] sorted by value score, highest first. Ties keep
    ///   input order and rows without a score go last.
    pub fn score(&self, df: &DataFrame) -> Result<DataFrame> {
        require_columns(
            df,
            &[
                columns::NAME,
                columns::FOLLOWERS,
                columns::CERTIFICATION,
                columns::VIDEO_PRICE,
                columns::VIDEO_CPE,
                columns::PROVINCE,
                columns::ACTIVE_FAN_RATIO,
                columns::LOW_QUALITY_FAN_RATIO,
                columns::SAVE_LIKE_RATIO,
                columns::COMMENT_LIKE_RATIO,
            ],
        )?;
        if df.height() == 0 {
            return Err(AnalysisError::DegenerateNormalization(
                "cannot score an empty table".to_string(),
            ));
        }

        let median_cpe = typical_cpe(df)?;
        let weighted = (col(columns::FAN_QUALITY_INDEX) * lit(self.config.fan_quality_weight)
            + col(columns::CONTENT_APPEAL_INDEX) * lit(self.config.content_appeal_weight))
            * (col(columns::COST_INDEX) + lit(self.config.cost_floor));

        let scored = df
            .clone()
            .lazy()
            .with_columns([
                cost_benefit(median_cpe).alias(COST_BENEFIT),
                fan_quality_index().alias(columns::FAN_QUALITY_INDEX),
                content_appeal_raw().alias(CONTENT_APPEAL_RAW),
            ])
            .with_columns([
                min_max_scaled(col(COST_BENEFIT)).alias(columns::COST_INDEX),
                min_max_scaled(col(CONTENT_APPEAL_RAW)).alias(columns::CONTENT_APPEAL_INDEX),
            ])
            .with_column(weighted.alias(VALUE_SCORE_RAW))
            .with_column(
                round_half_even(min_max_scaled(col(VALUE_SCORE_RAW)) * lit(100.0), 2)
                    .alias(columns::VALUE_SCORE),
            )
            .collect()?;
        warn_if_flat(&scored, &[COST_BENEFIT, CONTENT_APPEAL_RAW, VALUE_SCORE_RAW])?;

        let sorted = sort_rows(&scored.select(OUTPUT_COLUMNS)?, columns::VALUE_SCORE, true)?;
        info!(
            rows = sorted.height(),
            unscored = sorted.column(columns::VALUE_SCORE)?.null_count(),
            "value scores computed"
        );
        Ok(sorted)
    }
}

/// Median of the strictly positive CPE values.
pub fn typical_cpe(df: &DataFrame) -> Result<f64> {
    let cpe = float_col(columns::VIDEO_CPE);
    scalar(df, cpe.clone().filter(cpe.gt(lit(0.0))).median())?.ok_or_else(|| {
        AnalysisError::DegenerateNormalization(
            "no strictly positive CPE value to derive a typical cost".to_string(),
        )
    })
}

/// Inverse CPE, with zero or missing CPE replaced by `median_cpe`.
///
/// Min-max scaled it becomes the cost index: lower cost maps closer to 1.
pub fn cost_benefit(median_cpe: f64) -> Expr {
    let cpe = float_col(columns::VIDEO_CPE);
    let adjusted = when(cpe.clone().is_null().or(cpe.clone().eq(lit(0.0))))
        .then(lit(median_cpe))
        .otherwise(cpe);
    lit(1.0) / adjusted
}

/// Active-fan share discounted by the low-quality-fan share.
pub fn fan_quality_index() -> Expr {
    float_col(columns::ACTIVE_FAN_RATIO) * (lit(1.0) - float_col(columns::LOW_QUALITY_FAN_RATIO))
}

/// Save/like plus comment/like; a missing ratio scores 0.
pub fn content_appeal_raw() -> Expr {
    (float_col(columns::SAVE_LIKE_RATIO) + float_col(columns::COMMENT_LIKE_RATIO))
        .fill_null(lit(0.0))
}
