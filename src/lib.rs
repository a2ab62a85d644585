//! DarenForge: value scoring, K-Means segmentation and price-driver analysis
//! for social-media influencers ("达人").
//!
//! A cleaned influencer table is enriched with derived ratios once, then each
//! analysis reads it independently and returns its own table.

pub mod cli;
pub mod data;
pub mod error;
pub mod metrics;
pub mod model;
pub mod regression;
pub mod report;
pub mod stats;
pub mod value;

// Re-export public items for easier access
pub use cli::{Args, OutputPaths};
pub use data::{columns, load_influencers, write_csv};
pub use error::{AnalysisError, Result};
pub use metrics::add_derived_metrics;
pub use model::{ClusterConfig, ClusterProfile, ClusterProfiler, ClusterResult};
pub use regression::{PriceAnalysis, PriceRegressor, RegressionConfig};
pub use value::{ValueScoreConfig, ValueScorer};
