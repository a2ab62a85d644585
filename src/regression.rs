//! Price-driver analysis: correlations and an OLS model of video price

use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::{debug, info};

use crate::data::{columns, float_series, require_columns};
use crate::error::{AnalysisError, Result};
use crate::stats::{float_col, median_filled, round_half_even, round_to, sort_rows};

/// Explanatory variables of the price model
pub const PRICE_DRIVERS: [&str; 3] = [
    columns::FOLLOWERS,
    columns::ACTIVE_FAN_RATIO,
    columns::LIKES_60D,
];

/// Metrics compared pairwise in the correlation matrix
pub const CORRELATION_COLUMNS: [&str; 6] = [
    columns::VIDEO_PRICE,
    columns::FOLLOWERS,
    columns::LIKES_60D,
    columns::ACTIVE_FAN_RATIO,
    columns::SAVE_LIKE_RATIO,
    columns::COMMERCIAL_POST_RATIO,
];

/// Columns of the pricing table, in output order
pub const OUTPUT_COLUMNS: [&str; 5] = [
    columns::NAME,
    columns::VIDEO_PRICE,
    columns::PREDICTED_PRICE,
    columns::PRICE_RESIDUAL,
    columns::FOLLOWERS,
];

/// Header of the row-label column in the correlation table
const METRIC_LABEL: &str = "指标";

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionConfig {
    pub target: String,
    pub features: Vec<String>,
    pub correlation_columns: Vec<String>,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            target: columns::VIDEO_PRICE.to_string(),
            features: PRICE_DRIVERS.iter().map(|c| c.to_string()).collect(),
            correlation_columns: CORRELATION_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Pairwise Pearson correlations over median-filled columns
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// `None` where a column has zero variance
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }

    /// Matrix as a table: a label column followed by one column per metric.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut series = vec![Series::new(METRIC_LABEL, self.columns.clone())];
        for (j, name) in self.columns.iter().enumerate() {
            let column: Vec<Option<f64>> = self
                .values
                .iter()
                .map(|row| row[j].map(|v| round_to(v, 2)))
                .collect();
            series.push(float_series(name, &column));
        }
        Ok(DataFrame::new(series)?)
    }
}

/// Fitted OLS model statistics
#[derive(Debug, Clone)]
pub struct OlsSummary {
    pub intercept: f64,
    /// Coefficient per feature, in configured order
    pub coefficients: Vec<(String, f64)>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub n_observations: usize,
}

impl OlsSummary {
    pub fn coefficient(&self, feature: &str) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|(name, _)| name == feature)
            .map(|(_, value)| *value)
    }
}

/// Result of the price-driver analysis
#[derive(Debug)]
pub struct PriceAnalysis {
    pub correlation: CorrelationMatrix,
    pub summary: OlsSummary,
    /// [`OUTPUT_COLUMNS`] sorted by residual ascending (most underpriced first)
    pub ranked: DataFrame,
}

impl PriceAnalysis {
    /// The `n` rows priced furthest below the model.
    pub fn underpriced(&self, n: usize) -> DataFrame {
        self.ranked.head(Some(n))
    }

    /// The `n` rows priced furthest above the model, largest residual first.
    pub fn overpriced(&self, n: usize) -> Result<DataFrame> {
        sort_rows(&self.ranked.tail(Some(n)), columns::PRICE_RESIDUAL, true)
    }
}

/// Explains video price from audience and engagement features
#[derive(Debug, Clone, Default)]
pub struct PriceRegressor {
    config: RegressionConfig,
}

impl PriceRegressor {
    pub fn new(config: RegressionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    /// Correlate the price drivers, fit the price model and rank residuals.
    ///
    /// Rows without a target value are excluded from the fit. Missing
    /// feature values are filled with the column median.
    pub fn analyze(&self, df: &DataFrame) -> Result<PriceAnalysis> {
        let target = self.config.target.as_str();
        let mut required: Vec<&str> = vec![columns::NAME, columns::FOLLOWERS, target];
        required.extend(self.config.features.iter().map(String::as_str));
        required.extend(self.config.correlation_columns.iter().map(String::as_str));
        require_columns(df, &required)?;

        let correlation = self.correlation(df)?;

        // Feature medians come from the full column, before unpriced rows are dropped
        let mut selection = vec![col(columns::NAME), float_col(target).alias(target)];
        if !self.config.features.iter().any(|f| f == columns::FOLLOWERS) {
            selection.push(col(columns::FOLLOWERS));
        }
        selection.extend(
            self.config
                .features
                .iter()
                .map(|f| median_filled(f).alias(f)),
        );
        let priced = df
            .clone()
            .lazy()
            .select(selection)
            .filter(col(target).is_not_null().and(col(target).is_not_nan()))
            .collect()?;

        let n_features = self.config.features.len();
        if priced.height() < n_features + 2 {
            return Err(AnalysisError::Config(format!(
                "need at least {} rows with a {} value, found {}",
                n_features + 2,
                target,
                priced.height()
            )));
        }
        debug!(
            rows = priced.height(),
            dropped = df.height() - priced.height(),
            "regression rows selected"
        );

        let x = self.design_matrix(&priced)?;
        let y: Array1<f64> = priced.column(target)?.f64()?.into_no_null_iter().collect();

        let dataset = Dataset::new(x.clone(), y.clone());
        let fitted = LinearRegression::new()
            .fit(&dataset)
            .map_err(|e| AnalysisError::Regression(e.to_string()))?;
        let predicted: Array1<f64> = fitted.predict(&x);

        let summary = summarize(
            fitted.intercept(),
            fitted.params(),
            &self.config.features,
            &y,
            &predicted,
        );
        info!(
            observations = summary.n_observations,
            r_squared = summary.r_squared,
            "price model fitted"
        );

        let ranked = self.rank(&priced, &predicted)?;
        Ok(PriceAnalysis {
            correlation,
            summary,
            ranked,
        })
    }

    /// Pairwise Pearson correlations on a median-filled copy of the columns.
    fn correlation(&self, df: &DataFrame) -> Result<CorrelationMatrix> {
        let names = &self.config.correlation_columns;
        let filled = df
            .clone()
            .lazy()
            .select(
                names
                    .iter()
                    .map(|c| median_filled(c).alias(c))
                    .collect::<Vec<_>>(),
            );

        let mut pairs = Vec::with_capacity(names.len() * names.len());
        for (i, a) in names.iter().enumerate() {
            for (j, b) in names.iter().enumerate() {
                pairs.push(pearson_corr(col(a), col(b), 1).alias(&format!("{i}:{j}")));
            }
        }
        let table = filled.select(pairs).collect()?;

        let mut values = vec![vec![None; names.len()]; names.len()];
        for (i, row) in values.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                let series = table.column(&format!("{i}:{j}"))?.cast(&DataType::Float64)?;
                *cell = series.f64()?.get(0).filter(|v| v.is_finite());
            }
        }

        Ok(CorrelationMatrix {
            columns: names.clone(),
            values,
        })
    }

    fn design_matrix(&self, priced: &DataFrame) -> Result<Array2<f64>> {
        let mut x = Array2::<f64>::zeros((priced.height(), self.config.features.len()));
        for (j, name) in self.config.features.iter().enumerate() {
            let column: Array1<f64> = priced.column(name)?.f64()?.into_no_null_iter().collect();
            x.column_mut(j).assign(&column);
        }
        Ok(x)
    }

    fn rank(&self, priced: &DataFrame, predicted: &Array1<f64>) -> Result<DataFrame> {
        let target = self.config.target.as_str();
        let raw: Vec<Option<f64>> = predicted.iter().copied().map(Some).collect();

        let mut table = priced.clone();
        table.with_column(float_series(columns::PREDICTED_PRICE, &raw))?;
        let ranked = table
            .lazy()
            .with_column(round_half_even(col(columns::PREDICTED_PRICE), 2))
            .with_column(
                round_half_even(col(target) - col(columns::PREDICTED_PRICE), 2)
                    .alias(columns::PRICE_RESIDUAL),
            )
            .select([
                col(columns::NAME),
                col(target),
                col(columns::PREDICTED_PRICE),
                col(columns::PRICE_RESIDUAL),
                col(columns::FOLLOWERS),
            ])
            .sort(
                [columns::PRICE_RESIDUAL],
                SortMultipleOptions::default()
                    .with_nulls_last(true)
                    .with_maintain_order(true),
            )
            .collect()?;
        Ok(ranked)
    }
}

fn summarize(
    intercept: f64,
    params: &Array1<f64>,
    features: &[String],
    y: &Array1<f64>,
    predicted: &Array1<f64>,
) -> OlsSummary {
    let n = y.len();
    let p = features.len();
    let mean_y = y.mean().unwrap_or_default();

    let ss_res: f64 = y.iter().zip(predicted).map(|(a, b)| (a - b).powi(2)).sum();
    let ss_tot: f64 = y.iter().map(|a| (a - mean_y).powi(2)).sum();
    let r_squared = if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot };
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (n as f64 - 1.0) / (n as f64 - p as f64 - 1.0);

    OlsSummary {
        intercept,
        coefficients: features.iter().cloned().zip(params.iter().copied()).collect(),
        r_squared,
        adj_r_squared,
        n_observations: n,
    }
}
