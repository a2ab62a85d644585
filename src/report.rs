//! Plain-text reports with Markdown tables for each analysis

use std::fmt::{self, Write as _};
use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::data::{columns, f64_column, str_column};
use crate::error::Result;
use crate::model::ClusterResult;
use crate::regression::PriceAnalysis;
use crate::stats::{float_col, round_to};

const RULE_WIDTH: usize = 50;
const TOP_VALUE_ROWS: usize = 20;
const TOP_PROVINCES: usize = 5;
const RANKING_ROWS: usize = 10;

const COUNT: &str = "count";
const FOLLOWER_TIER: &str = "粉丝量级";

/// Follower tiers as right-closed intervals `(lower, upper]`
const FOLLOWER_TIERS: [(f64, f64, &str); 4] = [
    (0.0, 200_000.0, "10-20万"),
    (200_000.0, 500_000.0, "20-50万"),
    (500_000.0, 1_000_000.0, "50-100万"),
    (1_000_000.0, 50_000_000.0, "100万+"),
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Align {
    Left,
    Right,
}

/// A pipe-style Markdown table
#[derive(Debug, Clone)]
pub struct MarkdownTable {
    headers: Vec<String>,
    align: Vec<Align>,
    rows: Vec<Vec<String>>,
}

impl MarkdownTable {
    /// Render every column of `df`; numeric columns are right-aligned.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let mut headers = Vec::with_capacity(df.width());
        let mut align = Vec::with_capacity(df.width());
        let mut cells: Vec<Vec<String>> = Vec::with_capacity(df.width());

        for series in df.get_columns() {
            let name = series.name();
            headers.push(name.to_string());
            if series.dtype().is_numeric() {
                align.push(Align::Right);
                cells.push(
                    f64_column(df, name)?
                        .into_iter()
                        .map(|v| v.map(format_number).unwrap_or_default())
                        .collect(),
                );
            } else {
                align.push(Align::Left);
                cells.push(
                    str_column(df, name)?
                        .into_iter()
                        .map(Option::unwrap_or_default)
                        .collect(),
                );
            }
        }

        let rows = (0..df.height())
            .map(|r| cells.iter().map(|column| column[r].clone()).collect())
            .collect();

        Ok(Self {
            headers,
            align,
            rows,
        })
    }

    /// Two-column table of label/value pairs.
    pub fn from_counts(label: &str, value: &str, counts: &[(String, String)]) -> Self {
        Self {
            headers: vec![label.to_string(), value.to_string()],
            align: vec![Align::Left, Align::Right],
            rows: counts
                .iter()
                .map(|(k, v)| vec![k.clone(), v.clone()])
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MarkdownTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "| {} |", self.headers.join(" | "))?;

        let rule: Vec<&str> = self
            .align
            .iter()
            .map(|a| match a {
                Align::Left => ":---",
                Align::Right => "---:",
            })
            .collect();
        writeln!(f, "|{}|", rule.join("|"))?;

        for row in &self.rows {
            writeln!(f, "| {} |", row.join(" | "))?;
        }
        Ok(())
    }
}

/// Integral values print without decimals, others with up to four.
fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{value:.0}");
    }
    let text = format!("{value:.4}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn banner(out: &mut String, title: &str) -> fmt::Result {
    let rule = "=".repeat(RULE_WIDTH);
    writeln!(out, "{rule}")?;
    writeln!(out, "  {title}")?;
    writeln!(out, "{rule}")?;
    writeln!(out)
}

/// Occurrence counts of a column, most frequent first.
///
/// Nulls are skipped and ties keep first-appearance order.
pub fn value_counts(df: &DataFrame, column: &str) -> Result<Vec<(String, usize)>> {
    let counts = df
        .clone()
        .lazy()
        .select([col(column).cast(DataType::String)])
        .filter(col(column).is_not_null())
        .group_by_stable([col(column)])
        .agg([len().alias(COUNT)])
        .sort(
            [COUNT],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .collect()?;

    let keys = str_column(&counts, column)?;
    let totals = f64_column(&counts, COUNT)?;
    Ok(keys
        .into_iter()
        .zip(totals)
        .filter_map(|(key, n)| Some((key?, n? as usize)))
        .collect())
}

/// Tier label for a follower count, null outside every tier.
pub fn follower_tier(followers: Expr) -> Expr {
    let within = |(lo, hi, _): (f64, f64, &str)| {
        followers
            .clone()
            .gt(lit(lo))
            .and(followers.clone().lt_eq(lit(hi)))
    };
    let [small, mid, large, top] = FOLLOWER_TIERS;

    when(within(small))
        .then(lit(small.2))
        .when(within(mid))
        .then(lit(mid.2))
        .when(within(large))
        .then(lit(large.2))
        .when(within(top))
        .then(lit(top.2))
        .otherwise(lit(NULL).cast(DataType::String))
}

/// Per-tier counts with every tier listed, most frequent first.
fn tier_counts(df: &DataFrame) -> Result<Vec<(String, usize)>> {
    let tiered = df
        .clone()
        .lazy()
        .select([follower_tier(float_col(columns::FOLLOWERS)).alias(FOLLOWER_TIER)])
        .collect()?;
    let present = value_counts(&tiered, FOLLOWER_TIER)?;

    let mut counts: Vec<(String, usize)> = FOLLOWER_TIERS
        .iter()
        .map(|(_, _, label)| {
            let n = present
                .iter()
                .find(|(tier, _)| tier == label)
                .map_or(0, |(_, n)| *n);
            (label.to_string(), n)
        })
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(counts)
}

/// Counts as shares of the total, rounded to four decimals.
fn shares(counts: &[(String, usize)]) -> Vec<(String, String)> {
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    counts
        .iter()
        .map(|(k, n)| {
            let share = if total == 0 { 0.0 } else { *n as f64 / total as f64 };
            (k.clone(), format_number(round_to(share, 4)))
        })
        .collect()
}

/// Report for the value-score analysis.
///
/// # Arguments
/// * `scored` - Output of `ValueScorer::score`, sorted by value score
pub fn value_report(scored: &DataFrame) -> Result<String> {
    let mut out = String::new();
    banner(&mut out, "方向一：达人价值评估模型分析报告")?;

    writeln!(out, "--- Top {TOP_VALUE_ROWS} 价值洼地达人 ---")?;
    let top = scored.head(Some(TOP_VALUE_ROWS));
    writeln!(out, "{}", MarkdownTable::from_frame(&top)?)?;

    let top_decile = scored.head(Some(scored.height() / 10));
    writeln!(out, "--- 高价值达人 (Top 10%) 群体特征分析 ---")?;
    writeln!(out, "共 {} 位达人。", top_decile.height())?;
    writeln!(out)?;

    let counts = value_counts(&top_decile, columns::CERTIFICATION)?;
    writeln!(out, "1. 认证类型分布:")?;
    let table = MarkdownTable::from_counts(columns::CERTIFICATION, "proportion", &shares(&counts));
    writeln!(out, "{table}")?;

    let counts = tier_counts(&top_decile)?;
    writeln!(out, "2. 粉丝量级分布:")?;
    let table = MarkdownTable::from_counts(FOLLOWER_TIER, "proportion", &shares(&counts));
    writeln!(out, "{table}")?;

    let counts: Vec<(String, String)> = value_counts(&top_decile, columns::PROVINCE)?
        .into_iter()
        .take(TOP_PROVINCES)
        .map(|(k, n)| (k, n.to_string()))
        .collect();
    writeln!(out, "3. 地域分布 (Top {TOP_PROVINCES}):")?;
    let table = MarkdownTable::from_counts(columns::PROVINCE, COUNT, &counts);
    writeln!(out, "{table}")?;

    Ok(out)
}

/// Report for the segmentation analysis.
pub fn cluster_report(result: &ClusterResult) -> Result<String> {
    let mut out = String::new();
    banner(&mut out, "方向二：达人分群与画像描绘分析报告")?;

    let total = result.labels.len();
    writeln!(
        out,
        "已成功将 {} 位达人分为 {} 个群体。",
        total,
        result.n_clusters()
    )?;
    writeln!(out)?;

    writeln!(out, "--- 各群体特征画像 ---")?;
    writeln!(out, "{}", MarkdownTable::from_frame(&result.profile_frame()?)?)?;

    writeln!(out, "--- 聚类质量 ---")?;
    writeln!(out, "- 组内平方和 (inertia): {:.2}", result.inertia)?;
    writeln!(out, "- 轮廓系数 (前 100 位抽样): {:.3}", result.silhouette)?;
    writeln!(out)?;

    writeln!(out, "--- 群体规模 ---")?;
    for (label, size) in result.cluster_sizes().iter().enumerate() {
        let pct = if total == 0 { 0.0 } else { *size as f64 / total as f64 * 100.0 };
        writeln!(out, "- 群体{label}: {size} 位达人 ({pct:.1}%)")?;
    }
    writeln!(out)?;

    Ok(out)
}

/// Report for the price-driver analysis.
pub fn regression_report(analysis: &PriceAnalysis) -> Result<String> {
    let mut out = String::new();
    banner(&mut out, "方向三：关键成功因素探索分析报告")?;

    let corr = &analysis.correlation;
    writeln!(out, "--- 1. 相关性分析 ---")?;
    writeln!(out, "{}", MarkdownTable::from_frame(&corr.to_frame()?)?)?;
    for other in [columns::FOLLOWERS, columns::LIKES_60D] {
        let value = corr
            .get(columns::VIDEO_PRICE, other)
            .map_or_else(|| "nan".to_string(), |v| format!("{v:.2}"));
        writeln!(
            out,
            "- '{}' 与 '{}' 的相关性为: {}",
            columns::VIDEO_PRICE,
            other,
            value
        )?;
    }
    writeln!(out)?;

    let summary = &analysis.summary;
    writeln!(out, "--- 2. 回归模型分析 ---")?;
    writeln!(out, "模型摘要 (OLS):")?;
    let mut coefficients = vec![("const".to_string(), format_number(summary.intercept))];
    coefficients.extend(
        summary
            .coefficients
            .iter()
            .map(|(name, value)| (name.clone(), format_number(*value))),
    );
    writeln!(out, "{}", MarkdownTable::from_counts("变量", "coef", &coefficients))?;
    writeln!(out, "- 观测数: {}", summary.n_observations)?;
    writeln!(out, "- R-squared: {:.3}", summary.r_squared)?;
    writeln!(out, "- Adj. R-squared: {:.3}", summary.adj_r_squared)?;
    writeln!(out)?;

    writeln!(out, "模型解读:")?;
    writeln!(
        out,
        "- R-squared值为 {:.2}，说明模型可以解释约 {:.0}% 的报价变动。",
        summary.r_squared,
        summary.r_squared * 100.0
    )?;
    for (name, value) in &summary.coefficients {
        // Ratios are read per percentage point
        if name == columns::ACTIVE_FAN_RATIO {
            let per_point = value * 0.01;
            writeln!(out, "  - {name}每提高1个点(0.01)，报价平均增加 {per_point:.2} 元。")?;
        } else {
            writeln!(out, "  - {name}每增加1个，报价平均增加 {value:.2} 元。")?;
        }
    }
    writeln!(out)?;

    writeln!(out, "--- 3. 价值偏差分析 ---")?;
    writeln!(out, "Top {RANKING_ROWS} 可能被低估的达人 (实际报价远低于模型预估):")?;
    let under = analysis.underpriced(RANKING_ROWS);
    writeln!(out, "{}", MarkdownTable::from_frame(&under)?)?;
    writeln!(out, "Top {RANKING_ROWS} 可能被高估的达人 (实际报价远高于模型预估):")?;
    let over = analysis.overpriced(RANKING_ROWS)?;
    writeln!(out, "{}", MarkdownTable::from_frame(&over)?)?;

    Ok(out)
}

/// Write a report to disk, replacing any existing file.
pub fn write_report(content: &str, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, content)?;
    info!(path = %path.display(), bytes = content.len(), "wrote report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regression::{CorrelationMatrix, OlsSummary};

    /// Table rows (header and rule excluded) printed under `heading`
    fn table_rows<'a>(report: &'a str, heading: &str) -> Vec<&'a str> {
        report
            .lines()
            .skip_while(|line| !line.starts_with(heading))
            .skip(3)
            .take_while(|line| !line.is_empty())
            .collect()
    }

    /// 30 scored influencers; the leading three form the top 10%
    fn scored_table() -> DataFrame {
        let n = 30;
        let names: Vec<String> = (0..n).map(|i| format!("达人{i:02}")).collect();
        let scores: Vec<f64> = (0..n).map(|i| 100.0 - 3.0 * i as f64).collect();

        let mut followers = vec![5_000_000i64; n];
        followers[..3].copy_from_slice(&[150_000, 200_000, 800_000]);
        let mut certification = vec!["机构"; n];
        certification[1] = "个人";
        certification[2] = "个人";
        let mut province = vec!["北京"; n];
        province[..3].copy_from_slice(&["浙江", "上海", "上海"]);

        df!(
            columns::NAME => names,
            columns::VALUE_SCORE => scores,
            columns::FOLLOWERS => followers,
            columns::CERTIFICATION => certification,
            columns::PROVINCE => province
        )
        .unwrap()
    }

    fn price_analysis() -> PriceAnalysis {
        let correlation = CorrelationMatrix {
            columns: vec![columns::VIDEO_PRICE.to_string(), columns::FOLLOWERS.to_string()],
            values: vec![vec![Some(1.0), Some(0.9712)], vec![Some(0.9712), Some(1.0)]],
        };
        let summary = OlsSummary {
            intercept: 1000.0,
            coefficients: vec![
                (columns::FOLLOWERS.to_string(), 0.02),
                (columns::ACTIVE_FAN_RATIO.to_string(), 5000.0),
                (columns::LIKES_60D.to_string(), 3.0),
            ],
            r_squared: 0.95,
            adj_r_squared: 0.94,
            n_observations: 3,
        };
        let ranked = df!(
            columns::NAME => ["低", "中", "高"],
            columns::VIDEO_PRICE => [1000.0, 2000.0, 3000.0],
            columns::PREDICTED_PRICE => [1500.0, 2000.0, 2500.0],
            columns::PRICE_RESIDUAL => [-500.0, 0.0, 500.0],
            columns::FOLLOWERS => [100_000i64, 200_000, 300_000]
        )
        .unwrap();

        PriceAnalysis {
            correlation,
            summary,
            ranked,
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1_500_000.0), "1500000");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(0.123456), "0.1235");
        assert_eq!(format_number(-3.5), "-3.5");
        assert_eq!(format_number(f64::NAN), "nan");
    }

    #[test]
    fn test_render_table() {
        let df = df!(
            columns::NAME => ["甲", "乙"],
            columns::VALUE_SCORE => [Some(100.0), None]
        )
        .unwrap();
        let rendered = MarkdownTable::from_frame(&df).unwrap().render();

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "| 达人名称 | 综合价值分 |");
        assert_eq!(lines[1], "|:---|---:|");
        assert_eq!(lines[2], "| 甲 | 100 |");
        assert_eq!(lines[3], "| 乙 |  |");
    }

    #[test]
    fn test_value_counts_order() {
        let df = df!("x" => [Some("b"), Some("a"), None, Some("a"), Some("b"), Some("c")]).unwrap();
        assert_eq!(
            value_counts(&df, "x").unwrap(),
            vec![("b".to_string(), 2), ("a".to_string(), 2), ("c".to_string(), 1)]
        );
    }

    #[test]
    fn test_follower_tier_bounds() {
        let df = df!(
            columns::FOLLOWERS => [
                0.0,
                200_000.0,
                200_001.0,
                1_000_000.0,
                3_000_000.0,
                60_000_000.0
            ]
        )
        .unwrap();
        let tiers = df
            .lazy()
            .select([follower_tier(col(columns::FOLLOWERS)).alias(FOLLOWER_TIER)])
            .collect()
            .unwrap();

        assert_eq!(
            str_column(&tiers, FOLLOWER_TIER).unwrap(),
            vec![
                None,
                Some("10-20万".to_string()),
                Some("20-50万".to_string()),
                Some("50-100万".to_string()),
                Some("100万+".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_shares_rounded() {
        let counts = vec![("x".to_string(), 2), ("y".to_string(), 1)];
        assert_eq!(
            shares(&counts),
            vec![
                ("x".to_string(), "0.6667".to_string()),
                ("y".to_string(), "0.3333".to_string())
            ]
        );
    }

    #[test]
    fn test_value_report_top_decile_size() {
        let report = value_report(&scored_table()).unwrap();

        assert!(report.contains("共 3 位达人。"));
        assert_eq!(table_rows(&report, "--- Top 20").len(), 20);
    }

    #[test]
    fn test_value_report_certification_shares() {
        let report = value_report(&scored_table()).unwrap();

        assert_eq!(
            table_rows(&report, "1. 认证类型分布"),
            vec!["| 个人 | 0.6667 |", "| 机构 | 0.3333 |"]
        );
    }

    #[test]
    fn test_value_report_lists_every_follower_tier() {
        let report = value_report(&scored_table()).unwrap();

        // 200000 sits in the lower tier; empty tiers keep their listed order
        assert_eq!(
            table_rows(&report, "2. 粉丝量级分布"),
            vec![
                "| 10-20万 | 0.6667 |",
                "| 50-100万 | 0.3333 |",
                "| 20-50万 | 0 |",
                "| 100万+ | 0 |",
            ]
        );
    }

    #[test]
    fn test_value_report_province_ranking() {
        let report = value_report(&scored_table()).unwrap();

        assert_eq!(
            table_rows(&report, "3. 地域分布"),
            vec!["| 上海 | 2 |", "| 浙江 | 1 |"]
        );
    }

    #[test]
    fn test_regression_report_interpretation() {
        let report = regression_report(&price_analysis()).unwrap();
        let lines: Vec<&str> = report.lines().collect();

        assert!(lines.contains(&"- '视频笔记报价' 与 '粉丝数' 的相关性为: 0.97"));
        assert!(lines.contains(&"- '视频笔记报价' 与 '近60天平均点赞' 的相关性为: nan"));
        assert!(lines.contains(&"- R-squared: 0.950"));
        assert!(lines.contains(&"- Adj. R-squared: 0.940"));
        assert!(lines.contains(&"  - 活跃粉丝占比每提高1个点(0.01)，报价平均增加 50.00 元。"));
        assert!(lines.contains(&"  - 粉丝数每增加1个，报价平均增加 0.02 元。"));
        assert!(lines.contains(&"  - 近60天平均点赞每增加1个，报价平均增加 3.00 元。"));
    }

    #[test]
    fn test_regression_report_rankings() {
        let report = regression_report(&price_analysis()).unwrap();

        let under = table_rows(&report, "Top 10 可能被低估");
        assert!(under[0].starts_with("| 低 |"));
        let over = table_rows(&report, "Top 10 可能被高估");
        assert_eq!(over[0], "| 高 | 3000 | 2500 | 500 | 300000 |");
        assert_eq!(over.len(), 3);
    }
}
