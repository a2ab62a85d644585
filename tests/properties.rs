//! Property tests for value scoring

use std::collections::HashMap;

use darenforge::data::{f64_column, str_column};
use darenforge::value::fan_quality_index;
use darenforge::{add_derived_metrics, columns, ValueScorer};
use polars::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Row {
    followers: f64,
    active: f64,
    low_quality: f64,
    likes: f64,
    saves: f64,
    comments: f64,
    cpe: f64,
}

fn row() -> impl Strategy<Value = Row> {
    (
        10_000.0..3_000_000.0f64,
        0.0..1.0f64,
        0.0..1.0f64,
        prop_oneof![Just(0.0), 1.0..10_000.0f64],
        0.0..5_000.0f64,
        0.0..1_000.0f64,
        prop_oneof![Just(0.0), 0.5..50.0f64],
    )
        .prop_map(|(followers, active, low_quality, likes, saves, comments, cpe)| Row {
            followers,
            active,
            low_quality,
            likes,
            saves,
            comments,
            cpe,
        })
}

fn rows_with_permutation() -> impl Strategy<Value = (Vec<Row>, Vec<usize>)> {
    prop::collection::vec(row(), 2..15).prop_flat_map(|mut rows| {
        // at least one positive CPE keeps the typical cost defined
        rows[0].cpe = 10.0;
        let n = rows.len();
        (Just(rows), Just((0..n).collect::<Vec<_>>()).prop_shuffle())
    })
}

fn build_table(rows: &[Row], order: &[usize]) -> DataFrame {
    let pick = |f: fn(&Row) -> f64| order.iter().map(|&i| f(&rows[i])).collect::<Vec<_>>();
    let names: Vec<String> = order.iter().map(|i| format!("达人{i:02}")).collect();
    let n = order.len();

    let raw = df!(
        columns::NAME => names,
        columns::PROVINCE => vec!["浙江"; n],
        columns::CERTIFICATION => vec!["个人"; n],
        columns::FOLLOWERS => pick(|r: &Row| r.followers),
        columns::ACTIVE_FAN_RATIO => pick(|r: &Row| r.active),
        columns::LOW_QUALITY_FAN_RATIO => pick(|r: &Row| r.low_quality),
        columns::TOTAL_POSTS => vec![100.0; n],
        columns::COMMERCIAL_POSTS => vec![10.0; n],
        columns::LIKES_60D => pick(|r: &Row| r.likes),
        columns::SAVES_60D => pick(|r: &Row| r.saves),
        columns::COMMENTS_60D => pick(|r: &Row| r.comments),
        columns::VIDEO_PRICE => vec![5000.0; n],
        columns::VIDEO_CPE => pick(|r: &Row| r.cpe),
        columns::TOP1_AGE_SHARE => vec![0.4; n],
    )
    .unwrap();
    add_derived_metrics(&raw).unwrap()
}

fn scores_by_name(df: &DataFrame) -> HashMap<String, Option<f64>> {
    let names = str_column(df, columns::NAME).unwrap();
    let scores = f64_column(df, columns::VALUE_SCORE).unwrap();
    names
        .into_iter()
        .map(|n| n.unwrap())
        .zip(scores)
        .collect()
}

proptest! {
    #[test]
    fn value_score_ignores_row_order((rows, permutation) in rows_with_permutation()) {
        let identity: Vec<usize> = (0..rows.len()).collect();
        let scorer = ValueScorer::default();

        let original = scorer.score(&build_table(&rows, &identity)).unwrap();
        let shuffled = scorer.score(&build_table(&rows, &permutation)).unwrap();

        prop_assert_eq!(scores_by_name(&original), scores_by_name(&shuffled));
    }

    #[test]
    fn value_score_stays_in_range((rows, _) in rows_with_permutation()) {
        let identity: Vec<usize> = (0..rows.len()).collect();
        let scored = ValueScorer::default().score(&build_table(&rows, &identity)).unwrap();
        let scores: Vec<f64> = f64_column(&scored, columns::VALUE_SCORE)
            .unwrap()
            .into_iter()
            .map(|s| s.unwrap())
            .collect();

        prop_assert!(scores.iter().all(|s| (0.0..=100.0).contains(s)));
        prop_assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        prop_assert_eq!(*scores.last().unwrap(), 0.0);
    }

    #[test]
    fn fan_quality_within_unit_interval(active in 0.0..=1.0f64, low in 0.0..=1.0f64) {
        let df = df!(
            columns::ACTIVE_FAN_RATIO => [active],
            columns::LOW_QUALITY_FAN_RATIO => [low]
        )
        .unwrap();
        let quality = df
            .lazy()
            .select([fan_quality_index().alias(columns::FAN_QUALITY_INDEX)])
            .collect()
            .unwrap();
        let value = f64_column(&quality, columns::FAN_QUALITY_INDEX).unwrap()[0].unwrap();
        prop_assert!((0.0..=1.0).contains(&value));
    }

    #[test]
    fn zero_likes_have_no_ratios(saves in 0.0..5_000.0f64, comments in 0.0..1_000.0f64) {
        let row = Row {
            followers: 100_000.0,
            active: 0.5,
            low_quality: 0.1,
            likes: 0.0,
            saves,
            comments,
            cpe: 5.0,
        };
        let enriched = build_table(&[row], &[0]);

        prop_assert_eq!(f64_column(&enriched, columns::SAVE_LIKE_RATIO).unwrap()[0], None);
        prop_assert_eq!(f64_column(&enriched, columns::COMMENT_LIKE_RATIO).unwrap()[0], None);
    }
}
