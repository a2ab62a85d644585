//! Influencer table loading, column access and CSV output using Polars

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{AnalysisError, Result};

/// Column headers of the cleaned influencer file and of derived outputs
pub mod columns {
    pub const NAME: &str = "达人名称";
    pub const PROVINCE: &str = "省份";
    pub const CERTIFICATION: &str = "认证类型";
    pub const FOLLOWERS: &str = "粉丝数";
    pub const ACTIVE_FAN_RATIO: &str = "活跃粉丝占比";
    pub const LOW_QUALITY_FAN_RATIO: &str = "水粉占比";
    pub const TOTAL_POSTS: &str = "笔记总数";
    pub const COMMERCIAL_POSTS: &str = "商业笔记总数";
    pub const LIKES_60D: &str = "近60天平均点赞";
    pub const SAVES_60D: &str = "近60天平均收藏";
    pub const COMMENTS_60D: &str = "近60天平均评论";
    pub const VIDEO_PRICE: &str = "视频笔记报价";
    pub const VIDEO_CPE: &str = "视频CPE";
    pub const TOP1_AGE_SHARE: &str = "Top1年龄段占比";

    // Derived ratios
    pub const COMMERCIAL_POST_RATIO: &str = "商业笔记占比";
    pub const SAVE_LIKE_RATIO: &str = "藏赞比";
    pub const COMMENT_LIKE_RATIO: &str = "评赞比";

    // Value scoring
    pub const COST_INDEX: &str = "互动成本指数";
    pub const FAN_QUALITY_INDEX: &str = "粉丝质量指数";
    pub const CONTENT_APPEAL_INDEX: &str = "内容吸引力指数";
    pub const VALUE_SCORE: &str = "综合价值分";

    // Clustering
    pub const GROUP_LABEL: &str = "群体标签";
    pub const GROUP_SIZE: &str = "群体规模";

    // Regression
    pub const PREDICTED_PRICE: &str = "模型预估报价";
    pub const PRICE_RESIDUAL: &str = "报价偏差";
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Load the cleaned influencer CSV, tolerating a leading UTF-8 BOM.
///
/// # Arguments
/// * `path` - Path to the delimited input file
///
/// # Returns
/// * One row per influencer with the file's headers as column names
pub fn load_influencers(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let mut bytes = std::fs::read(path).map_err(|source| AnalysisError::MissingInputFile {
        path: path.display().to_string(),
        source,
    })?;

    if bytes.starts_with(UTF8_BOM) {
        debug!("stripping UTF-8 BOM from input");
        bytes.drain(..UTF8_BOM.len());
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;

    info!(
        rows = df.height(),
        columns = df.width(),
        path = %path.display(),
        "loaded influencer table"
    );
    Ok(df)
}

/// Write a table as CSV prefixed with a UTF-8 BOM, replacing any existing file.
pub fn write_csv(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)?;
    file.write_all(UTF8_BOM)?;

    let mut out = df.clone();
    CsvWriter::new(&mut file).include_header(true).finish(&mut out)?;

    info!(rows = df.height(), path = %path.display(), "wrote csv");
    Ok(())
}

/// Fail with a schema error naming every column in `names` absent from `df`.
pub fn require_columns(df: &DataFrame, names: &[&str]) -> Result<()> {
    let present = df.get_column_names();
    let missing: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| !present.contains(name))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AnalysisError::Schema(format!(
            "missing column(s): {}",
            missing.join(", ")
        )))
    }
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map_err(|_| AnalysisError::Schema(format!("missing column(s): {name}")))
}

/// Read a column as nullable floats; non-numeric cells become missing.
pub fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = column(df, name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

/// Read a column as nullable strings.
pub fn str_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = column(df, name)?.cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}

/// Build a nullable float column.
pub fn float_series(name: &str, values: &[Option<f64>]) -> Series {
    Series::new(name, values)
}
