//! Reference scenarios of the merge diff

use crate::common::tables::{id_name, id_name_typed, scenario_source, scenario_target, statuses, text_at};
use datadiff::{DataDiff, DataType, DiffError, DiffOptions, EqualityMode, ReportDensity};

fn options() -> DiffOptions {
    DiffOptions::new().with_color(false)
}

#[test]
fn test_strict_value_delete_add() {
    let diff = DataDiff::new(options().with_driver_columns(["id"])).unwrap();
    let result = diff.diff(&scenario_source(), Some(&scenario_target())).unwrap();

    assert_eq!(result.change_count(), 3);
    assert_eq!(result.deletion_count(), 2);
    assert!(!result.are_equal());
    assert!(!result.is_source_contained_in_target());
    assert_eq!(result.driver_columns(), &["id".to_string()]);
    assert_eq!(statuses(result.report().unwrap()), vec!["=", "+1", "-1", "-", "+"]);
}

#[test]
fn test_loss_mode_with_case_insensitive_target() {
    let target = id_name_typed(
        "target",
        DataType::CaseInsensitiveText,
        &[(1, "a"), (2, "B"), (4, "d")],
    );
    let diff = DataDiff::new(options().with_equality(EqualityMode::Loss)).unwrap();
    let result = diff.diff(&scenario_source(), Some(&target)).unwrap();

    assert_eq!(result.change_count(), 2);
    assert_eq!(statuses(result.report().unwrap()), vec!["=", "=", "-", "+"]);

    // Text against citext is never strictly equal: rows 1 and 2 become value changes
    let strict = DataDiff::new(options()).unwrap().diff(&scenario_source(), Some(&target)).unwrap();
    assert_eq!(strict.change_count(), 4);
    assert_eq!(statuses(strict.report().unwrap()), vec!["+1", "-1", "+2", "-2", "-", "+"]);
}

#[test]
fn test_empty_target_deletes_every_row() {
    let source = scenario_source();
    let target = id_name("target", &[]);
    let result = DataDiff::new(options()).unwrap().diff(&source, Some(&target)).unwrap();

    assert_eq!(result.change_count(), 3);
    assert_eq!(result.deletion_count(), 3);
    assert_eq!(result.record_count(), 3);
    assert_eq!(statuses(result.report().unwrap()), vec!["-", "-", "-"]);
}

#[test]
fn test_change_guard_aborts_the_run() {
    let diff = DataDiff::new(options().with_max_change_count(1)).unwrap();
    let err = diff.diff(&scenario_source(), Some(&scenario_target())).unwrap_err();
    assert!(matches!(err, DiffError::TooManyChanges { max: 1 }));
    assert!(!err.is_precondition());
}

#[test]
fn test_zero_change_ceiling_accepts_equal_resources() {
    let diff = DataDiff::new(options().with_max_change_count(0)).unwrap();
    let result = diff.diff(&scenario_source(), Some(&scenario_source())).unwrap();
    assert!(result.are_equal());

    let err = diff.diff(&scenario_source(), Some(&scenario_target())).unwrap_err();
    assert!(matches!(err, DiffError::TooManyChanges { max: 0 }));
}

#[test]
fn test_sparse_value_pair_keeps_only_the_changed_cell() {
    let diff = DataDiff::new(options().with_density(ReportDensity::Sparse)).unwrap();
    let result = diff.diff(&scenario_source(), Some(&scenario_target())).unwrap();
    let report = result.report().unwrap();

    assert_eq!(statuses(report), vec!["+1", "-1", "-", "+"]);
    for row in 0..2 {
        assert_eq!(text_at(report, row, "id"), None);
        assert!(text_at(report, row, "name").is_some());
    }
}

#[test]
fn test_absent_target_is_an_empty_copy_of_the_source() {
    let result = DataDiff::new(options()).unwrap().diff(&scenario_source(), None).unwrap();
    assert_eq!(result.change_count(), 3);
    assert_eq!(result.target_name(), "source_empty");
}

#[test]
fn test_literal_rows_against_a_table() {
    use datadiff::Value;
    let rows = vec![
        vec![Some(Value::Integer(1)), Some(Value::from("a"))],
        vec![Some(Value::Integer(2)), Some(Value::from("b"))],
    ];
    let target = id_name("target", &[(1, "a"), (2, "b")]);
    let result = DataDiff::new(options()).unwrap().diff_rows(rows, Some(&target)).unwrap();
    assert!(result.are_equal());
    assert_eq!(result.record_count(), 2);
    assert_eq!(result.driver_columns(), &["1".to_string(), "2".to_string()]);
}
