//! Polars expression helpers shared by the analyses
//!
//! Nulls are missing values and are never coerced to zero unless a caller
//! does so explicitly.

use polars::prelude::*;
use tracing::warn;

use crate::error::Result;

/// Round half to even at `decimals` places, matching `rint(x * 10^d) / 10^d`.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Column-wise [`round_to`]; nulls stay null.
pub fn round_half_even(expr: Expr, decimals: i32) -> Expr {
    expr.cast(DataType::Float64).map(
        move |s| {
            let rounded = s.f64()?.apply_values(move |v| round_to(v, decimals));
            Ok(Some(rounded.into_series()))
        },
        GetOutput::from_type(DataType::Float64),
    )
}

/// Named column as nullable floats.
pub fn float_col(name: &str) -> Expr {
    col(name).cast(DataType::Float64)
}

/// `numerator / denominator`, null when the denominator is zero or missing.
pub fn safe_ratio(numerator: Expr, denominator: Expr) -> Expr {
    when(denominator.clone().is_null().or(denominator.clone().eq(lit(0.0))))
        .then(lit(NULL).cast(DataType::Float64))
        .otherwise(numerator / denominator)
}

/// Rescale to [0, 1] via `(x - min) / (max - min)`.
///
/// Nulls stay null and do not take part in the range. A zero range maps every
/// present value to 0.0.
pub fn min_max_scaled(expr: Expr) -> Expr {
    let range = expr.clone().max() - expr.clone().min();
    when(expr.clone().is_null())
        .then(lit(NULL).cast(DataType::Float64))
        .when(range.clone().eq(lit(0.0)))
        .then(lit(0.0))
        .otherwise((expr.clone() - expr.min()) / range)
}

/// Column with its gaps filled by the column median.
pub fn median_filled(name: &str) -> Expr {
    float_col(name).fill_null(float_col(name).median())
}

/// Evaluate a scalar expression over `df`; `None` when it comes out null.
pub fn scalar(df: &DataFrame, expr: Expr) -> Result<Option<f64>> {
    let out = df
        .clone()
        .lazy()
        .select([expr.cast(DataType::Float64).alias("value")])
        .collect()?;
    Ok(out.column("value")?.f64()?.get(0))
}

/// Log each column whose present values are all equal.
pub fn warn_if_flat(df: &DataFrame, names: &[&str]) -> Result<()> {
    for &name in names {
        let series = df.column(name)?;
        if let (Some(lo), Some(hi)) = (series.min::<f64>()?, series.max::<f64>()?) {
            if lo == hi {
                warn!(column = name, value = lo, "all values equal, normalizing to 0");
            }
        }
    }
    Ok(())
}

/// Stable sort on one column with nulls last.
pub fn sort_rows(df: &DataFrame, by: &str, descending: bool) -> Result<DataFrame> {
    let options = SortMultipleOptions::default()
        .with_order_descending(descending)
        .with_nulls_last(true)
        .with_maintain_order(true);
    Ok(df.sort([by], options)?)
}
