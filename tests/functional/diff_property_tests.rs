//! Properties that hold for any pair of sorted inputs

use crate::common::tables::{id_name, statuses, text_at};
use datadiff::{
    DataDiff, DataType, DiffColumn, DiffOptions, EqualityMode, MemoryTable, RelationDef, ReportDensity,
    ReportStrategy, Value,
};

fn options() -> DiffOptions {
    DiffOptions::new().with_color(false)
}

/// Deterministic pseudo-random table: keys kept with step `keep`, names
/// rewritten every `rewrite` rows
fn generated(name: &str, rows: i64, keep: i64, rewrite: i64) -> MemoryTable {
    let data: Vec<(i64, String)> = (1..=rows)
        .filter(|id| id % keep != 0)
        .map(|id| {
            let value = if rewrite > 0 && id % rewrite == 0 {
                format!("changed_{}", id)
            } else {
                format!("value_{}", id)
            };
            (id, value)
        })
        .collect();
    let borrowed: Vec<(i64, &str)> = data.iter().map(|(id, v)| (*id, v.as_str())).collect();
    id_name(name, &borrowed)
}

fn pairs() -> Vec<(MemoryTable, MemoryTable)> {
    vec![
        (generated("s1", 50, 7, 0), generated("t1", 60, 5, 3)),
        (generated("s2", 10, 2, 0), generated("t2", 10, 3, 0)),
        (generated("s3", 0, 2, 0), generated("t3", 25, 11, 4)),
        (generated("s4", 40, 13, 2), generated("t4", 40, 13, 2)),
    ]
}

/// Sorted rows with a null key, null values and blank strings
fn sparse_values() -> MemoryTable {
    let relation = RelationDef::new()
        .with_column("id", DataType::Integer)
        .with_column("name", DataType::Text)
        .with_column("score", DataType::Double);
    let rows = vec![
        vec![None, Some(Value::from("no key")), None],
        vec![Some(Value::Integer(1)), None, Some(Value::Double(0.5))],
        vec![Some(Value::Integer(2)), Some(Value::from("")), None],
        vec![Some(Value::Integer(3)), Some(Value::from("  ")), Some(Value::Double(-1.0))],
        vec![Some(Value::Integer(4)), Some(Value::from("d")), None],
    ];
    MemoryTable::from_rows("sparse", relation, rows).unwrap()
}

#[test]
fn test_diff_against_itself_is_equal() {
    let mut sources: Vec<MemoryTable> = pairs().into_iter().map(|(source, _)| source).collect();
    sources.push(sparse_values());
    for mode in [EqualityMode::Strict, EqualityMode::Loss] {
        for source in &sources {
            let result = DataDiff::new(options().with_equality(mode).with_driver_columns(["id"]))
                .unwrap()
                .diff(source, Some(source))
                .unwrap();
            assert!(result.are_equal(), "{} under {:?}", source.name(), mode);
            assert_eq!(result.change_count(), 0);
            assert_eq!(result.deletion_count(), 0);
            assert!(statuses(result.report().unwrap()).iter().all(|s| s == "="));
        }
    }
}

/// `(origin, id, name)` of the report rows whose status matches
fn origin_rows(result: &datadiff::DiffResult, keep: impl Fn(&str) -> bool) -> Vec<(String, String, String)> {
    let report = result.report().unwrap();
    let mut rows: Vec<(String, String, String)> = statuses(report)
        .iter()
        .enumerate()
        .filter(|(_, status)| keep(status))
        .map(|(i, _)| {
            (
                text_at(report, i, "diff_origin").unwrap_or_default(),
                text_at(report, i, "id").unwrap_or_default(),
                text_at(report, i, "name").unwrap_or_default(),
            )
        })
        .collect();
    rows.sort();
    rows
}

fn swap_origin(origin: &str) -> String {
    match origin {
        "source" => "target".to_string(),
        "target" => "source".to_string(),
        other => other.to_string(),
    }
}

#[test]
fn test_swapping_sides_swaps_value_pairs() {
    let diff = DataDiff::new(options().with_diff_columns(vec![DiffColumn::Status, DiffColumn::Origin])).unwrap();
    for (source, target) in pairs() {
        let forward = diff.diff(&source, Some(&target)).unwrap();
        let backward = diff.diff(&target, Some(&source)).unwrap();

        let is_value = |s: &str| s.len() > 1;
        let mut swapped: Vec<_> = origin_rows(&forward, is_value)
            .into_iter()
            .map(|(origin, id, name)| (swap_origin(&origin), id, name))
            .collect();
        swapped.sort();
        assert_eq!(swapped, origin_rows(&backward, is_value));

        let key_values = |rows: Vec<(String, String, String)>| -> Vec<(String, String)> {
            rows.into_iter().map(|(_, id, name)| (id, name)).collect()
        };
        assert_eq!(
            key_values(origin_rows(&forward, |s| s == "+")),
            key_values(origin_rows(&backward, |s| s == "-"))
        );
        assert_eq!(
            key_values(origin_rows(&forward, |s| s == "-")),
            key_values(origin_rows(&backward, |s| s == "+"))
        );
    }
}

#[test]
fn test_swapping_sides_swaps_adds_and_deletes() {
    for (source, target) in pairs() {
        let diff = DataDiff::new(options()).unwrap();
        let forward = diff.diff(&source, Some(&target)).unwrap();
        let backward = diff.diff(&target, Some(&source)).unwrap();

        assert_eq!(forward.change_count(), backward.change_count());
        assert_eq!(forward.record_count(), backward.record_count());

        let count = |result: &datadiff::DiffResult, symbol: &str| {
            statuses(result.report().unwrap())
                .iter()
                .filter(|s| s.as_str() == symbol)
                .count()
        };
        assert_eq!(count(&forward, "+"), count(&backward, "-"));
        assert_eq!(count(&forward, "-"), count(&backward, "+"));
    }
}

#[test]
fn test_counters_match_the_report() {
    for (source, target) in pairs() {
        let result = DataDiff::new(options()).unwrap().diff(&source, Some(&target)).unwrap();
        let statuses = statuses(result.report().unwrap());

        let adds = statuses.iter().filter(|s| s.as_str() == "+").count() as u64;
        let deletes = statuses.iter().filter(|s| s.as_str() == "-").count() as u64;
        let values = statuses.iter().filter(|s| s.starts_with('-') && s.len() > 1).count() as u64;
        let unchanged = statuses.iter().filter(|s| s.as_str() == "=").count() as u64;

        assert_eq!(result.change_count(), adds + deletes + values);
        assert_eq!(result.deletion_count(), deletes + values);
        assert_eq!(result.step_count(), adds + deletes + values + unchanged);
        // Every source row is consumed by exactly one step
        assert_eq!(deletes + values + unchanged, source.rows().len() as u64);
        assert_eq!(adds + values + unchanged, target.rows().len() as u64);
        assert_eq!(
            result.record_count(),
            source.rows().len().max(target.rows().len()) as u64
        );
    }
}

#[test]
fn test_density_and_strategy_do_not_change_the_counters() {
    for (source, target) in pairs() {
        let baseline = DataDiff::new(options()).unwrap().diff(&source, Some(&target)).unwrap();
        for variant in [
            options().with_density(ReportDensity::Sparse),
            options().with_report(ReportStrategy::Cell),
            options().with_report(ReportStrategy::None),
        ] {
            let result = DataDiff::new(variant).unwrap().diff(&source, Some(&target)).unwrap();
            assert_eq!(result.change_count(), baseline.change_count());
            assert_eq!(result.deletion_count(), baseline.deletion_count());
            assert_eq!(result.step_count(), baseline.step_count());
        }
    }
}

#[test]
fn test_sparse_report_is_the_dense_report_without_unchanged_rows() {
    for (source, target) in pairs() {
        let dense = DataDiff::new(options()).unwrap().diff(&source, Some(&target)).unwrap();
        let sparse = DataDiff::new(options().with_density(ReportDensity::Sparse))
            .unwrap()
            .diff(&source, Some(&target))
            .unwrap();
        let dense_changes: Vec<String> = statuses(dense.report().unwrap())
            .into_iter()
            .filter(|s| s != "=")
            .collect();
        assert_eq!(statuses(sparse.report().unwrap()), dense_changes);
    }
}

#[test]
fn test_guard_at_the_exact_change_count_passes() {
    for (source, target) in pairs() {
        let changes = DataDiff::new(options())
            .unwrap()
            .diff(&source, Some(&target))
            .unwrap()
            .change_count();
        let at_limit = DataDiff::new(options().with_max_change_count(changes)).unwrap();
        assert!(at_limit.diff(&source, Some(&target)).is_ok());
        if changes > 0 {
            let below = DataDiff::new(options().with_max_change_count(changes - 1)).unwrap();
            assert!(below.diff(&source, Some(&target)).is_err());
        }
    }
}

#[test]
fn test_report_digest_is_stable() {
    let (source, target) = pairs().remove(0);
    let diff = DataDiff::new(options().with_report_name("digest")).unwrap();
    let first = diff.diff(&source, Some(&target)).unwrap().summary();
    let second = diff.diff(&source, Some(&target)).unwrap().summary();
    assert!(first.report_digest.is_some());
    assert_eq!(first.report_digest, second.report_digest);

    let other = diff.diff(&source, Some(&source)).unwrap().summary();
    assert_ne!(first.report_digest, other.report_digest);
}
