//! Derived ratio features computed from raw counts

use polars::prelude::*;
use tracing::debug;

use crate::data::{columns, require_columns};
use crate::error::Result;
use crate::stats::{float_col, round_half_even, safe_ratio};

const RATIO_DECIMALS: i32 = 4;

/// Add commercial-post share, save/like and comment/like ratios.
///
/// Each ratio is rounded to four decimals. A zero or missing denominator, or
/// a missing numerator, yields a null ratio.
///
/// # Returns
/// * A new table with the three ratio columns appended (or replaced)
pub fn add_derived_metrics(df: &DataFrame) -> Result<DataFrame> {
    require_columns(
        df,
        &[
            columns::TOTAL_POSTS,
            columns::COMMERCIAL_POSTS,
            columns::LIKES_60D,
            columns::SAVES_60D,
            columns::COMMENTS_60D,
        ],
    )?;

    let out = df
        .clone()
        .lazy()
        .with_columns([
            ratio(columns::COMMERCIAL_POSTS, columns::TOTAL_POSTS)
                .alias(columns::COMMERCIAL_POST_RATIO),
            ratio(columns::SAVES_60D, columns::LIKES_60D).alias(columns::SAVE_LIKE_RATIO),
            ratio(columns::COMMENTS_60D, columns::LIKES_60D).alias(columns::COMMENT_LIKE_RATIO),
        ])
        .collect()?;

    debug!(
        null_commercial = out.column(columns::COMMERCIAL_POST_RATIO)?.null_count(),
        null_engagement = out.column(columns::SAVE_LIKE_RATIO)?.null_count(),
        "computed derived ratios"
    );
    Ok(out)
}

fn ratio(numerator: &str, denominator: &str) -> Expr {
    round_half_even(
        safe_ratio(float_col(numerator), float_col(denominator)),
        RATIO_DECIMALS,
    )
}
