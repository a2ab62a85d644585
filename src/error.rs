//! Error types for the analysis pipeline

use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Failures surfaced to the operator. None of them are retried.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Input path could not be opened or read
    #[error("input file not readable: {path}")]
    MissingInputFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An expected column is absent from the loaded table
    #[error("schema error: {0}")]
    Schema(String),

    /// A normalization or fill has no usable values to work from
    #[error("degenerate normalization: {0}")]
    DegenerateNormalization(String),

    /// Invalid analysis parameters (e.g. cluster count)
    #[error("configuration error: {0}")]
    Config(String),

    /// K-Means fitting failed
    #[error("clustering failed: {0}")]
    Clustering(String),

    /// OLS fitting failed
    #[error("regression failed: {0}")]
    Regression(String),

    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("report formatting error: {0}")]
    Format(#[from] std::fmt::Error),
}
