//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::model::ClusterConfig;

/// Influencer value scoring, segmentation and pricing analysis
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the cleaned influencer CSV
    #[arg(short, long, default_value = "combined_cleaned_final.csv")]
    pub input: PathBuf,

    /// Directory receiving the CSV outputs and text reports
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Number of clusters for K-Means
    #[arg(short = 'k', long, default_value = "4")]
    pub clusters: usize,

    /// Seed for K-Means initialization
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Independent K-Means initializations; the best run is kept
    #[arg(long, default_value = "10")]
    pub n_runs: usize,

    /// Maximum iterations for K-Means algorithm
    #[arg(long, default_value = "300")]
    pub max_iters: u64,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Output files written under the output directory
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub value_csv: PathBuf,
    pub value_report: PathBuf,
    pub cluster_csv: PathBuf,
    pub cluster_report: PathBuf,
    pub pricing_csv: PathBuf,
    pub regression_report: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &std::path::Path) -> Self {
        Self {
            value_csv: dir.join("daren_value_scores.csv"),
            value_report: dir.join("daren_value_report.txt"),
            cluster_csv: dir.join("daren_clusters.csv"),
            cluster_report: dir.join("cluster_analysis_report.txt"),
            pricing_csv: dir.join("daren_pricing_analysis.csv"),
            regression_report: dir.join("regression_analysis_report.txt"),
        }
    }
}

impl Args {
    /// K-Means settings from the command line, default feature set
    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            n_clusters: self.clusters,
            seed: self.seed,
            n_runs: self.n_runs,
            max_iters: self.max_iters,
            tolerance: self.tolerance,
            ..ClusterConfig::default()
        }
    }

    pub fn output_paths(&self) -> OutputPaths {
        OutputPaths::in_dir(&self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_run_fixed_pipeline() {
        let args = Args::parse_from(["darenforge"]);

        assert_eq!(args.input, PathBuf::from("combined_cleaned_final.csv"));
        assert_eq!(args.cluster_config(), ClusterConfig::default());
        assert_eq!(
            args.output_paths().value_csv,
            PathBuf::from("./daren_value_scores.csv")
        );
    }

    #[test]
    fn test_cluster_overrides() {
        let args = Args::parse_from(["darenforge", "-k", "5", "--seed", "7", "-o", "out"]);

        let config = args.cluster_config();
        assert_eq!(config.n_clusters, 5);
        assert_eq!(config.seed, 7);
        assert_eq!(
            args.output_paths().cluster_report,
            PathBuf::from("out/cluster_analysis_report.txt")
        );
    }
}
