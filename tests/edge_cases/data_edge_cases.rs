//! Edge case tests for data-related scenarios

use crate::common::tables::{id_name, statuses, text_at};
use datadiff::{
    DataDiff, DataType, DiffError, DiffOptions, EqualityMode, MemoryTable, RelationDef, Value,
};

fn options() -> DiffOptions {
    DiffOptions::new().with_color(false)
}

fn two_text_columns(name: &str, rows: Vec<(Option<&str>, Option<&str>)>) -> MemoryTable {
    let relation = RelationDef::new()
        .with_column("code", DataType::Text)
        .with_column("note", DataType::Text)
        .with_primary_key(&["code"])
        .unwrap();
    MemoryTable::from_rows(
        name,
        relation,
        rows.into_iter()
            .map(|(code, note)| vec![code.map(Value::from), note.map(Value::from)])
            .collect(),
    )
    .unwrap()
}

#[test]
fn test_both_sides_empty() {
    let empty = id_name("empty", &[]);
    let result = DataDiff::new(options()).unwrap().diff(&empty, Some(&empty)).unwrap();
    assert!(result.are_equal());
    assert_eq!(result.record_count(), 0);
    assert_eq!(result.step_count(), 0);
    assert!(result.report().unwrap().rows().is_empty());
    assert!(result
        .report()
        .unwrap()
        .comment()
        .unwrap()
        .ends_with("The data resources are equal."));
}

#[test]
fn test_empty_source_adds_every_row() {
    let empty = id_name("empty", &[]);
    let target = id_name("target", &[(1, "a"), (2, "b")]);
    let result = DataDiff::new(options()).unwrap().diff(&empty, Some(&target)).unwrap();
    assert_eq!(result.change_count(), 2);
    assert_eq!(result.deletion_count(), 0);
    assert!(result.is_source_contained_in_target());
    assert_eq!(statuses(result.report().unwrap()), vec!["+", "+"]);
}

#[test]
fn test_null_keys_align() {
    let source = two_text_columns("s", vec![(None, Some("x")), (Some("k"), Some("y"))]);
    let target = two_text_columns("t", vec![(None, Some("x")), (Some("k"), Some("z"))]);
    let result = DataDiff::new(options()).unwrap().diff(&source, Some(&target)).unwrap();
    assert_eq!(result.change_count(), 1);
    assert_eq!(statuses(result.report().unwrap()), vec!["=", "+1", "-1"]);
}

#[test]
fn test_null_against_blank_toggle() {
    let source = two_text_columns("s", vec![(Some("k"), None)]);
    let target = two_text_columns("t", vec![(Some("k"), Some(""))]);

    // Loss-equal: a value change under strict equality, no change under loss
    let strict = DataDiff::new(options()).unwrap().diff(&source, Some(&target)).unwrap();
    assert_eq!(strict.change_count(), 1);
    let loss = DataDiff::new(options().with_equality(EqualityMode::Loss))
        .unwrap()
        .diff(&source, Some(&target))
        .unwrap();
    assert!(loss.are_equal());

    let toggled = DataDiff::new(
        options()
            .with_equality(EqualityMode::Loss)
            .with_null_equals_blank(false),
    )
    .unwrap()
    .diff(&source, Some(&target))
    .unwrap();
    assert_eq!(toggled.change_count(), 1);
}

#[test]
fn test_duplicate_keys_are_walked_in_order() {
    let source = id_name("s", &[(1, "a"), (1, "b"), (2, "c")]);
    let target = id_name("t", &[(1, "a"), (2, "c")]);
    let result = DataDiff::new(options()).unwrap().diff(&source, Some(&target)).unwrap();
    // The second (1, b) meets (2, c): it sorts first, so it is deleted
    assert_eq!(result.change_count(), 1);
    assert_eq!(statuses(result.report().unwrap()), vec!["=", "-", "="]);
}

#[test]
fn test_unicode_values() {
    let source = id_name("s", &[(1, "café"), (2, "日本語"), (3, "🦀")]);
    let target = id_name("t", &[(1, "café"), (2, "日本語"), (3, "🦀 rust")]);
    let result = DataDiff::new(options()).unwrap().diff(&source, Some(&target)).unwrap();
    assert_eq!(result.change_count(), 1);
    let report = result.report().unwrap();
    assert_eq!(text_at(report, 2, "name").as_deref(), Some("🦀 rust"));
    assert_eq!(text_at(report, 3, "name").as_deref(), Some("🦀"));
}

#[test]
fn test_numeric_representations_under_loss() {
    let relation = |data_type| {
        RelationDef::new()
            .with_column("id", DataType::Integer)
            .with_column("amount", data_type)
            .with_primary_key(&["id"])
            .unwrap()
    };
    let source = MemoryTable::from_rows(
        "s",
        relation(DataType::Integer),
        vec![vec![Some(Value::Integer(1)), Some(Value::Integer(3))]],
    )
    .unwrap();
    let target = MemoryTable::from_rows(
        "t",
        relation(DataType::Double),
        vec![vec![Some(Value::Integer(1)), Some(Value::Double(3.0))]],
    )
    .unwrap();

    let strict = DataDiff::new(options()).unwrap().diff(&source, Some(&target)).unwrap();
    assert_eq!(strict.change_count(), 1);
    let loss = DataDiff::new(options().with_equality(EqualityMode::Loss))
        .unwrap()
        .diff(&source, Some(&target))
        .unwrap();
    assert!(loss.are_equal());
}

#[test]
fn test_structure_preconditions() {
    let no_columns = MemoryTable::new("nothing");
    let err = DataDiff::new(options()).unwrap().diff(&no_columns, None).unwrap_err();
    assert!(matches!(err, DiffError::EmptyStructure { .. }));
    assert!(err.to_string().contains("(nothing) has no columns"));

    let narrow = MemoryTable::with_relation("narrow", RelationDef::new().with_column("id", DataType::Integer));
    let wide = id_name("wide", &[]);
    let err = DataDiff::new(options()).unwrap().diff(&narrow, Some(&wide)).unwrap_err();
    match err {
        DiffError::StructureMismatch {
            source_columns,
            target_columns,
            ..
        } => {
            assert_eq!(source_columns, 1);
            assert_eq!(target_columns, 2);
        }
        other => panic!("Expected StructureMismatch, got {:?}", other),
    }
}

#[test]
fn test_unknown_driver_column() {
    let table = id_name("t", &[(1, "a")]);
    let err = DataDiff::new(options().with_driver_columns(["sku"]))
        .unwrap()
        .diff(&table, Some(&table))
        .unwrap_err();
    assert!(matches!(err, DiffError::UnknownColumn { .. }));
    assert!(err.is_precondition());
}

#[test]
fn test_prefix_with_spaces_is_rejected() {
    let err = DataDiff::new(options().with_column_prefix("my diff_")).unwrap_err();
    assert!(matches!(err, DiffError::Config { .. }));
}
