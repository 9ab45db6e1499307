use std::path::PathBuf;

use fleet_table::domain::TableError;
use fleet_table::export::ExportFormat;
use fleet_table::filter::FilterValue;
use fleet_table::loader::{ColumnKind, DataRecord, LoadedTable, load_data_file};
use fleet_table::prefs::{MemoryStorage, Preferences};
use fleet_table::table::SmartTable;

fn fixture() -> Result<LoadedTable, TableError> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/vehicles.csv");
    load_data_file(path)
}

fn table(loaded: &LoadedTable) -> SmartTable<DataRecord> {
    SmartTable::new(
        loaded.name.clone(),
        loaded.rows.clone(),
        loaded.display_map(),
        Box::new(Preferences::new(MemoryStorage::new())),
    )
    .with_filters(loaded.filter_config())
}

#[test]
fn csv_columns_get_their_kinds() -> Result<(), TableError> {
    let loaded = fixture()?;
    assert_eq!(loaded.name, "vehicles.csv");
    assert_eq!(loaded.rows.len(), 5);
    let kinds: Vec<ColumnKind> = loaded.columns.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ColumnKind::Text,
            ColumnKind::Text,
            ColumnKind::Text,
            ColumnKind::Numeric,
            ColumnKind::Numeric,
            ColumnKind::Boolean,
            ColumnKind::Temporal,
        ]
    );
    assert_eq!(loaded.columns[2].options[0], "Moving");
    Ok(())
}

#[test]
fn filters_apply_per_column_kind() -> Result<(), TableError> {
    let loaded = fixture()?;
    let mut t = table(&loaded);

    t.set_filter(
        "3",
        FilterValue::NumberRange {
            min: Some(50.0),
            max: None,
        },
    );
    assert_eq!(t.filtered_count(), 2);
    t.clear_filters();

    t.set_filter("5", FilterValue::Bool(true));
    assert_eq!(t.filtered_count(), 3);
    t.clear_filters();

    t.set_filter(
        "6",
        FilterValue::DateRange {
            from: Some("2024-05-13".to_string()),
            to: None,
        },
    );
    assert_eq!(t.filtered_count(), 3);
    Ok(())
}

#[test]
fn numeric_columns_sort_by_value_with_nulls_first() -> Result<(), TableError> {
    let loaded = fixture()?;
    let mut t = table(&loaded);
    t.toggle_sort(3);
    assert_eq!(t.view_indices(), &[3, 1, 2, 0, 4]);

    let csv = t.export(ExportFormat::Csv)?;
    let first_row = csv.body.lines().nth(1).unwrap_or_default();
    assert!(first_row.starts_with("\"DL03 GH 3456\",\"∅\""));
    Ok(())
}

#[test]
fn json_export_keeps_the_file_header() -> Result<(), TableError> {
    let loaded = fixture()?;
    let mut t = table(&loaded);
    t.set_search("meera");
    let doc = t.export(ExportFormat::Json)?;
    let rows: Vec<serde_json::Value> = serde_json::from_str(&doc.body)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["driver"], "Meera Iyer");
    assert_eq!(rows[0]["fuel"], 77.0);
    assert_eq!(rows[0]["ignition"], false);
    Ok(())
}
