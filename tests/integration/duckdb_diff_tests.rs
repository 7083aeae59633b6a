//! Integration tests for diffs over DuckDB resources

use crate::common::{sample_data, tables::statuses, tables::text_at, TestFixture};
use datadiff::resource::attributes_table;
use datadiff::structure::ColumnAttribute;
use datadiff::{
    resolve_driver_columns, DataDiff, DataProcessor, DataResource, DiffOptions, DriverSource,
    DuckDbResource,
};
use std::fs;

fn options() -> DiffOptions {
    DiffOptions::new().with_color(false)
}

/// Sort a resource on its resolved driver columns
fn sorted<'c>(resource: DuckDbResource<'c>, keys: &[String]) -> DuckDbResource<'c> {
    let drivers = resolve_driver_columns(resource.name(), resource.relation_def(), keys).unwrap();
    resource.ordered_by(drivers.sort_positions())
}

#[test]
fn test_csv_files_diff() {
    let fixture = TestFixture::new().unwrap();
    let v1 = fixture.create_csv("v1.csv", &sample_data::products_v1()).unwrap();
    let v2 = fixture.create_csv("v2.csv", &sample_data::products_v2()).unwrap();

    let processor = DataProcessor::new().unwrap();
    let keys = vec!["id".to_string()];
    let source = sorted(processor.load(&v1).unwrap(), &keys);
    let target = sorted(processor.load(&v2).unwrap(), &keys);

    let result = DataDiff::new(options().with_driver_columns(["id"]))
        .unwrap()
        .diff(&source, Some(&target))
        .unwrap();
    assert_eq!(result.change_count(), 3);
    assert_eq!(result.record_count(), 3);
    let report = result.report().unwrap();
    assert_eq!(statuses(report), vec!["=", "+1", "-1", "-", "+"]);
    assert_eq!(text_at(report, 1, "price").as_deref(), Some("24.99"));
    assert_eq!(text_at(report, 2, "price").as_deref(), Some("19.99"));
}

#[test]
fn test_row_order_of_the_files_does_not_matter() {
    let fixture = TestFixture::new().unwrap();
    let v1 = fixture.create_csv("v1.csv", &sample_data::products_v1()).unwrap();
    let shuffled = fixture
        .create_csv("shuffled.csv", &sample_data::products_unordered())
        .unwrap();

    let processor = DataProcessor::new().unwrap();
    let source = sorted(processor.load(&v1).unwrap(), &[]);
    let target = sorted(processor.load(&shuffled).unwrap(), &[]);

    let result = DataDiff::new(options()).unwrap().diff(&source, Some(&target)).unwrap();
    assert!(result.are_equal());
    assert_eq!(result.record_count(), 3);
}

#[test]
fn test_small_chunks_give_the_same_result() {
    let fixture = TestFixture::new().unwrap();
    let source_path = fixture.create_large_csv("large_v1.csv", 120, 3).unwrap();
    let mut content = fs::read_to_string(&source_path).unwrap();
    content = content.replace("value_17_2", "edited").replace("value_90_1", "edited");
    let target_path = fixture.create_file("large_v2.csv", &content).unwrap();

    let keys = vec!["id".to_string()];
    let mut counts = Vec::new();
    for chunk_size in [7, 10_000] {
        let processor = DataProcessor::new_with_config(chunk_size).unwrap();
        let source = sorted(processor.load(&source_path).unwrap(), &keys);
        let target = sorted(processor.load(&target_path).unwrap(), &keys);
        let result = DataDiff::new(options().with_driver_columns(["id"]))
            .unwrap()
            .diff(&source, Some(&target))
            .unwrap();
        counts.push((result.change_count(), result.step_count()));
    }
    assert_eq!(counts, vec![(2, 120), (2, 120)]);
}

#[test]
fn test_table_primary_key_drives_the_diff() {
    let processor = DataProcessor::new().unwrap();
    processor
        .connection()
        .execute_batch(
            "CREATE TABLE orders_before (code VARCHAR, id INTEGER PRIMARY KEY);
             CREATE TABLE orders_after (code VARCHAR, id INTEGER PRIMARY KEY);
             INSERT INTO orders_before VALUES ('x', 1), ('y', 2);
             INSERT INTO orders_after VALUES ('x', 1), ('z', 2), ('w', 3);",
        )
        .unwrap();

    let source = processor.table("orders_before").unwrap();
    let drivers = resolve_driver_columns(source.name(), source.relation_def(), &[]).unwrap();
    assert_eq!(drivers.source(), DriverSource::PrimaryKey);
    assert_eq!(drivers.positions(), &[2]);

    let order = drivers.sort_positions();
    let source = source.ordered_by(order.clone());
    let target = processor.table("orders_after").unwrap().ordered_by(order);
    let result = DataDiff::new(options()).unwrap().diff(&source, Some(&target)).unwrap();
    assert_eq!(result.change_count(), 2);
    assert_eq!(result.deletion_count(), 1);
    assert_eq!(result.driver_columns(), &["id".to_string()]);
    assert!(!result.is_source_contained_in_target());
}

#[test]
fn test_report_is_written_and_exported() {
    let fixture = TestFixture::new().unwrap();
    let v1 = fixture.create_csv("v1.csv", &sample_data::products_v1()).unwrap();
    let v2 = fixture.create_csv("v2.csv", &sample_data::products_v2()).unwrap();

    let processor = DataProcessor::new().unwrap();
    let keys = vec!["id".to_string()];
    let source = sorted(processor.load(&v1).unwrap(), &keys);
    let target = sorted(processor.load(&v2).unwrap(), &keys);
    let result = DataDiff::new(options().with_report_name("product_changes"))
        .unwrap()
        .diff(&source, Some(&target))
        .unwrap();
    let report = result.report().unwrap();

    processor.write_table(report, "product_changes").unwrap();
    let stored = processor.table("product_changes").unwrap();
    assert_eq!(stored.row_count().unwrap(), 5);
    assert_eq!(stored.relation_def().column_names(), vec!["diff_status", "id", "name", "price"]);

    let output = fixture.root().join("changes.csv");
    processor.export_table("product_changes", &output).unwrap();
    let exported = fs::read_to_string(&output).unwrap();
    assert!(exported.starts_with("diff_status,id,name,price"));
    assert!(exported.contains("Gizmo"));
}

#[test]
fn test_structure_diff_of_two_files() {
    let fixture = TestFixture::new().unwrap();
    let v1 = fixture.create_file("v1.csv", "id,name,price\n1,a,1.5\n").unwrap();
    let v2 = fixture.create_file("v2.csv", "id,label,price\n1,a,2\n").unwrap();

    let processor = DataProcessor::new().unwrap();
    let source = processor.load(&v1).unwrap();
    let target = processor.load(&v2).unwrap();
    let source_columns = source.relation_def().columns_table("v1", ColumnAttribute::Name).unwrap();
    let target_columns = target.relation_def().columns_table("v2", ColumnAttribute::Name).unwrap();

    let result = DataDiff::new(options().with_driver_columns(["name"]))
        .unwrap()
        .diff(&source_columns, Some(&target_columns))
        .unwrap();
    // label added, name deleted, price retyped DOUBLE -> BIGINT
    assert_eq!(result.change_count(), 3);
    let report = result.report().unwrap();
    assert_eq!(statuses(report), vec!["=", "+", "-", "+3", "-3"]);
}

#[test]
fn test_attribute_diff_of_two_files() {
    let fixture = TestFixture::new().unwrap();
    let v1 = fixture.create_csv("v1.csv", &sample_data::products_v1()).unwrap();
    let v2 = fixture.create_file("v2.csv", "id,name,price\n1,Widget,9.99\n").unwrap();

    let processor = DataProcessor::new().unwrap();
    let source = attributes_table(&processor.load(&v1).unwrap()).unwrap();
    let target = attributes_table(&processor.load(&v2).unwrap()).unwrap();

    let result = DataDiff::new(options()).unwrap().diff(&source, Some(&target)).unwrap();
    assert_eq!(result.change_count(), 1);
    let report = result.report().unwrap();
    assert_eq!(text_at(report, 2, "attribute").as_deref(), Some("row_count"));
    assert_eq!(text_at(report, 2, "value").as_deref(), Some("1"));
    assert_eq!(text_at(report, 3, "value").as_deref(), Some("3"));
}

#[test]
fn test_sql_file_against_csv() {
    let fixture = TestFixture::new().unwrap();
    let csv = fixture.create_csv("v1.csv", &sample_data::products_v1()).unwrap();
    let sql = fixture
        .create_file(
            "products.sql",
            &format!(
                "-- products below five are dropped\nSELECT * FROM read_csv_auto('{}') WHERE price > 5;\n",
                csv.display()
            ),
        )
        .unwrap();

    let processor = DataProcessor::new().unwrap();
    let keys = vec!["id".to_string()];
    let source = sorted(processor.load(&csv).unwrap(), &keys);
    let target = sorted(processor.load(&sql).unwrap(), &keys);
    assert_eq!(target.name(), "products");

    let result = DataDiff::new(options().with_driver_columns(["id"]))
        .unwrap()
        .diff(&source, Some(&target))
        .unwrap();
    assert_eq!(result.change_count(), 1);
    assert!(!result.is_source_contained_in_target());
    assert_eq!(statuses(result.report().unwrap()), vec!["=", "=", "-"]);
}
