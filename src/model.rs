//! K-Means segmentation of influencers on standardized features

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::data::{columns, f64_column, require_columns};
use crate::error::{AnalysisError, Result};
use crate::stats::{median_filled, round_half_even};

/// Features used for segmentation unless configured otherwise
pub const DEFAULT_FEATURES: [&str; 5] = [
    columns::FOLLOWERS,
    columns::TOP1_AGE_SHARE,
    columns::SAVE_LIKE_RATIO,
    columns::COMMENT_LIKE_RATIO,
    columns::COMMERCIAL_POST_RATIO,
];

/// Rows considered when estimating the silhouette score
const SILHOUETTE_SAMPLE: usize = 100;

/// K-Means parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    /// Columns clustered on
    pub features: Vec<String>,
    /// Number of clusters
    pub n_clusters: usize,
    /// Seed for centroid initialization
    pub seed: u64,
    /// Independent initializations; the lowest-inertia run is kept
    pub n_runs: usize,
    /// Maximum iterations per run
    pub max_iters: u64,
    /// Convergence tolerance
    pub tolerance: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            features: DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect(),
            n_clusters: 4,
            seed: 42,
            n_runs: 10,
            max_iters: 300,
            tolerance: 1e-4,
        }
    }
}

/// Per-group summary in raw feature units
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterProfile {
    pub label: usize,
    pub size: usize,
    /// Mean of each feature, in `ClusterConfig::features` order
    pub means: Vec<f64>,
}

/// Outcome of a segmentation run
#[derive(Debug)]
pub struct ClusterResult {
    /// Input table with the group label column appended
    pub labeled: DataFrame,
    /// Cluster assignment per row
    pub labels: Array1<usize>,
    /// Cluster centroids in standardized space
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares
    pub inertia: f64,
    /// Mean silhouette coefficient over a leading sample of rows
    pub silhouette: f64,
    /// One profile per non-empty group, ascending by label
    pub profiles: Vec<ClusterProfile>,
    pub features: Vec<String>,
}

impl ClusterResult {
    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        cluster_sizes(&self.labels, self.n_clusters())
    }

    /// Profiles as a table: label, one mean column per feature, group size.
    pub fn profile_frame(&self) -> Result<DataFrame> {
        let labels: Vec<u32> = self.profiles.iter().map(|p| p.label as u32).collect();
        let mut series = vec![Series::new(columns::GROUP_LABEL, labels)];

        for (i, feature) in self.features.iter().enumerate() {
            let means: Vec<f64> = self.profiles.iter().map(|p| p.means[i]).collect();
            series.push(Series::new(feature, means));
        }

        let sizes: Vec<u32> = self.profiles.iter().map(|p| p.size as u32).collect();
        series.push(Series::new(columns::GROUP_SIZE, sizes));

        Ok(DataFrame::new(series)?)
    }
}

/// Segments influencers with K-Means
#[derive(Debug, Clone, Default)]
pub struct ClusterProfiler {
    config: ClusterConfig,
}

impl ClusterProfiler {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Cluster the rows of an enriched table.
    ///
    /// # Arguments
    /// * `df` - Influencer table carrying every configured feature column
    ///
    /// # Returns
    /// * Labeled table, per-group profiles and fit diagnostics
    pub fn cluster(&self, df: &DataFrame) -> Result<ClusterResult> {
        let features: Vec<&str> = self.config.features.iter().map(String::as_str).collect();
        require_columns(df, &features)?;

        let n_rows = df.height();
        let k = self.config.n_clusters;
        if k == 0 || k > n_rows {
            return Err(AnalysisError::Config(format!(
                "cluster count must be between 1 and the number of rows ({n_rows}), got {k}"
            )));
        }

        let filled = filled_features(df, &features)?;
        let standardized = standardize(&feature_matrix(&filled, &features)?);
        debug!(shape = ?standardized.shape(), "standardized clustering features");

        let dataset = DatasetBase::from(standardized.clone());
        let model = KMeans::params_with(k, StdRng::seed_from_u64(self.config.seed), L2Dist)
            .n_runs(self.config.n_runs)
            .max_n_iterations(self.config.max_iters)
            .tolerance(self.config.tolerance)
            .fit(&dataset)
            .map_err(|e| AnalysisError::Clustering(e.to_string()))?;

        let labels: Array1<usize> = model.predict(&standardized);
        let centroids = model.centroids().clone();
        let inertia = compute_inertia(&standardized, &labels, &centroids);
        let silhouette = silhouette_sample(&standardized, &labels, k, SILHOUETTE_SAMPLE);
        let profiles = profile_groups(&filled, &labels, &features)?;
        if profiles.len() < k {
            warn!(
                requested = k,
                populated = profiles.len(),
                "some clusters received no rows and are left out of the profiles"
            );
        }

        let label_values: Vec<u32> = labels.iter().map(|&l| l as u32).collect();
        let mut labeled = df.clone();
        labeled.with_column(Series::new(columns::GROUP_LABEL, label_values))?;

        info!(
            rows = n_rows,
            clusters = k,
            inertia,
            silhouette,
            "clustering complete"
        );

        Ok(ClusterResult {
            labeled,
            labels,
            centroids,
            inertia,
            silhouette,
            profiles,
            features: self.config.features.clone(),
        })
    }
}

/// Feature columns with each column's gaps filled by its median.
fn filled_features(df: &DataFrame, features: &[&str]) -> Result<DataFrame> {
    for &name in features {
        let series = df.column(name)?;
        if series.null_count() == series.len() {
            return Err(AnalysisError::DegenerateNormalization(format!(
                "feature '{name}' has no values"
            )));
        }
    }

    let filled = df
        .clone()
        .lazy()
        .select(
            features
                .iter()
                .map(|&name| median_filled(name).alias(name))
                .collect::<Vec<_>>(),
        )
        .collect()?;
    Ok(filled)
}

/// Convert filled feature columns to an ndarray (rows x features)
fn feature_matrix(filled: &DataFrame, features: &[&str]) -> Result<Array2<f64>> {
    let mut matrix = Array2::<f64>::zeros((filled.height(), features.len()));
    for (j, &name) in features.iter().enumerate() {
        let values: Array1<f64> = filled.column(name)?.f64()?.into_no_null_iter().collect();
        matrix.column_mut(j).assign(&values);
    }
    Ok(matrix)
}

/// Zero mean, unit population variance per column; constant columns keep scale 1.
pub fn standardize(features: &Array2<f64>) -> Array2<f64> {
    let Some(mean) = features.mean_axis(Axis(0)) else {
        return features.clone();
    };
    let scale = features
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s == 0.0 { 1.0 } else { s });

    (features - &mean) / &scale
}

/// Per-group means of the filled features, rounded to three decimals.
///
/// Groups without rows have no profile.
fn profile_groups(
    filled: &DataFrame,
    labels: &Array1<usize>,
    features: &[&str],
) -> Result<Vec<ClusterProfile>> {
    let mut labeled = filled.clone();
    let label_values: Vec<u32> = labels.iter().map(|&l| l as u32).collect();
    labeled.with_column(Series::new(columns::GROUP_LABEL, label_values))?;

    let mut aggs: Vec<Expr> = features.iter().map(|&f| col(f).mean()).collect();
    aggs.push(len().alias(columns::GROUP_SIZE));

    let grouped = labeled
        .lazy()
        .group_by([col(columns::GROUP_LABEL)])
        .agg(aggs)
        .with_columns(
            features
                .iter()
                .map(|&f| round_half_even(col(f), 3).alias(f))
                .collect::<Vec<_>>(),
        )
        .sort([columns::GROUP_LABEL], SortMultipleOptions::default())
        .collect()?;

    let group_labels = f64_column(&grouped, columns::GROUP_LABEL)?;
    let sizes = f64_column(&grouped, columns::GROUP_SIZE)?;
    let means: Vec<Vec<Option<f64>>> = features
        .iter()
        .map(|&f| f64_column(&grouped, f))
        .collect::<Result<_>>()?;

    Ok((0..grouped.height())
        .map(|row| ClusterProfile {
            label: group_labels[row].unwrap_or_default() as usize,
            size: sizes[row].unwrap_or_default() as usize,
            means: means.iter().map(|m| m[row].unwrap_or(f64::NAN)).collect(),
        })
        .collect())
}

fn cluster_sizes(labels: &Array1<usize>, k: usize) -> Vec<usize> {
    let mut sizes = vec![0; k];
    for &label in labels.iter() {
        if label < k {
            sizes[label] += 1;
        }
    }
    sizes
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    labels
        .iter()
        .enumerate()
        .filter(|(_, &cluster)| cluster < centroids.nrows())
        .map(|(i, &cluster)| {
            let point = features.row(i);
            let centroid = centroids.row(cluster);
            euclidean_distance(&point, &centroid).powi(2)
        })
        .sum()
}

/// Mean silhouette coefficient over the first `sample_size` rows
fn silhouette_sample(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    k: usize,
    sample_size: usize,
) -> f64 {
    let n_samples = features.nrows().min(sample_size);
    if n_samples < 2 || k < 2 {
        return 0.0;
    }

    let mut silhouette_sum = 0.0;

    for i in 0..n_samples {
        let point = features.row(i);
        let own = labels[i];

        let mut same = Vec::new();
        let mut other: Vec<Vec<f64>> = vec![Vec::new(); k];

        for j in 0..n_samples {
            if i == j {
                continue;
            }
            let distance = euclidean_distance(&point, &features.row(j));
            let label = labels[j];
            if label == own {
                same.push(distance);
            } else if label < k {
                other[label].push(distance);
            }
        }

        // A point alone in its cluster contributes 0
        if same.is_empty() {
            continue;
        }

        let a_i = same.iter().sum::<f64>() / same.len() as f64;
        let b_i = other
            .iter()
            .filter(|d| !d.is_empty())
            .map(|d| d.iter().sum::<f64>() / d.len() as f64)
            .fold(f64::INFINITY, f64::min);

        if b_i.is_finite() && a_i.max(b_i) > 0.0 {
            silhouette_sum += (b_i - a_i) / a_i.max(b_i);
        }
    }

    silhouette_sum / n_samples as f64
}

fn euclidean_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
