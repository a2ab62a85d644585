//! DarenForge: influencer analytics CLI
//!
//! Loads the cleaned influencer table, derives ratio metrics and runs the
//! value, segmentation and pricing analyses, each writing a CSV and a report.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use darenforge::{
    add_derived_metrics, load_influencers, report, write_csv, Args, ClusterProfiler,
    PriceRegressor, ValueScorer,
};
use polars::prelude::DataFrame;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.verbose {
        println!("DarenForge - Influencer Value, Segmentation and Pricing Analysis");
        println!("================================================================\n");
    }

    run_pipeline(&args)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

/// Run the three analyses over one enriched table
fn run_pipeline(args: &Args) -> Result<()> {
    let start_time = Instant::now();
    let paths = args.output_paths();
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    // Step 1: Load data and derive ratios
    if args.verbose {
        println!("Step 1: Loading and enriching data");
        println!("  Input file: {}", args.input.display());
    }
    let raw = load_influencers(&args.input)?;
    let enriched = add_derived_metrics(&raw)?;
    println!("✓ Data loaded: {} influencers", enriched.height());

    // Step 2: Value scores
    run_value_analysis(&enriched, args).context("value analysis failed")?;
    println!("✓ Value scores saved to: {}", paths.value_csv.display());
    println!("✓ Value report saved to: {}", paths.value_report.display());

    // Step 3: Segmentation
    run_cluster_analysis(&enriched, args).context("cluster analysis failed")?;
    println!("✓ Clusters saved to: {}", paths.cluster_csv.display());
    println!("✓ Cluster report saved to: {}", paths.cluster_report.display());

    // Step 4: Pricing
    run_pricing_analysis(&enriched, args).context("pricing analysis failed")?;
    println!("✓ Pricing analysis saved to: {}", paths.pricing_csv.display());
    println!("✓ Regression report saved to: {}", paths.regression_report.display());

    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn run_value_analysis(enriched: &DataFrame, args: &Args) -> Result<()> {
    let paths = args.output_paths();
    let scored = ValueScorer::default().score(enriched)?;

    write_csv(&scored, &paths.value_csv)?;
    report::write_report(&report::value_report(&scored)?, &paths.value_report)?;
    Ok(())
}

fn run_cluster_analysis(enriched: &DataFrame, args: &Args) -> Result<()> {
    let paths = args.output_paths();
    let config = args.cluster_config();
    if args.verbose {
        println!("  Number of clusters: {}", config.n_clusters);
        println!("  Seed: {}, runs: {}", config.seed, config.n_runs);
    }

    let result = ClusterProfiler::new(config).cluster(enriched)?;
    if args.verbose {
        println!("  Inertia: {:.2}", result.inertia);
        println!("  Silhouette score (sample): {:.3}", result.silhouette);
    }

    write_csv(&result.labeled, &paths.cluster_csv)?;
    report::write_report(&report::cluster_report(&result)?, &paths.cluster_report)?;
    Ok(())
}

fn run_pricing_analysis(enriched: &DataFrame, args: &Args) -> Result<()> {
    let paths = args.output_paths();
    let analysis = PriceRegressor::default().analyze(enriched)?;
    if args.verbose {
        println!("  Observations: {}", analysis.summary.n_observations);
        println!("  R-squared: {:.3}", analysis.summary.r_squared);
    }

    write_csv(&analysis.ranked, &paths.pricing_csv)?;
    report::write_report(&report::regression_report(&analysis)?, &paths.regression_report)?;
    Ok(())
}
