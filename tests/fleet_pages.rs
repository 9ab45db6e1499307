use chrono::NaiveDate;
use rand::SeedableRng;
use rand::rngs::StdRng;

use fleet_table::domain::TableError;
use fleet_table::export::ExportFormat;
use fleet_table::filter::FilterValue;
use fleet_table::fleet::{self, Vehicle};
use fleet_table::prefs::{FileStorage, MemoryStorage, Preferences, PreferencesStore};
use fleet_table::selection::CheckState;
use fleet_table::table::SmartTable;
use fleet_table::view::{SortDir, SortState};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
}

fn vehicles(n: usize) -> Vec<Vehicle> {
    let mut rng = StdRng::seed_from_u64(7);
    fleet::seed_vehicles(n, &mut rng, today())
}

fn vehicle_table(data: Vec<Vehicle>, store: Box<dyn PreferencesStore>) -> SmartTable<Vehicle> {
    SmartTable::new("Vehicles", data, fleet::vehicle_columns(today()), store)
        .with_row_id(|v: &Vehicle, _| v.id.clone())
        .with_filters(fleet::vehicle_filters(today()))
        .with_json_projection(fleet::vehicle_summary_json)
}

fn memory() -> Box<dyn PreferencesStore> {
    Box::new(Preferences::new(MemoryStorage::new()))
}

#[test]
fn status_and_speed_filters_combine() {
    let data = vehicles(80);
    let expected = data
        .iter()
        .filter(|v| (v.status == "Moving" || v.status == "Idle") && v.speed >= 20.0)
        .count();

    let mut table = vehicle_table(data, memory());
    table.set_filter(
        "status",
        FilterValue::Many(vec!["Moving".to_string(), "Idle".to_string()]),
    );
    table.set_filter(
        "speed",
        FilterValue::NumberRange {
            min: Some(20.0),
            max: None,
        },
    );
    assert_eq!(table.active_filter_count(), 2);
    assert_eq!(table.filtered_count(), expected);

    table.clear_filter("speed");
    assert_eq!(table.active_filter_count(), 1);
    table.clear_filters();
    assert_eq!(table.filtered_count(), 80);
}

#[test]
fn attention_filter_flags_low_fuel_and_workshop() {
    let mut data = vehicles(10);
    for v in data.iter_mut() {
        v.fuel_level = 50.0;
        v.status = "Moving".to_string();
        v.insurance_expiry = "2030-01-01".to_string();
    }
    data[2].fuel_level = 8.0;
    data[5].status = "Maintenance".to_string();
    data[7].insurance_expiry = "2024-01-01".to_string();

    let mut table = vehicle_table(data, memory());
    table.set_filter("attention", FilterValue::Bool(true));
    let mut flagged: Vec<usize> = table.view_indices().to_vec();
    flagged.sort_unstable();
    assert_eq!(flagged, vec![2, 5, 7]);

    table.set_filter("attention", FilterValue::Bool(false));
    assert_eq!(table.filtered_count(), 10);
}

#[test]
fn speed_sorts_numerically() {
    let mut data = vehicles(4);
    for (v, speed) in data.iter_mut().zip([9.0, 100.0, 45.0, 0.0]) {
        v.speed = speed;
    }
    let mut table = vehicle_table(data, memory());
    table.toggle_sort(3);
    assert_eq!(table.sort(), SortState::new(3, SortDir::Asc));
    assert_eq!(table.view_indices(), &[3, 0, 2, 1]);
    table.toggle_sort(3);
    assert_eq!(table.view_indices(), &[1, 2, 0, 3]);
}

#[test]
fn preferences_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    let file_store = || -> Box<dyn PreferencesStore> {
        Box::new(Preferences::new(FileStorage::new(path.clone())))
    };

    let mut table = vehicle_table(vehicles(30), file_store());
    table.toggle_column(1);
    table.move_column(9, 0);
    table.toggle_sort(3);
    table.toggle_sort(3);
    table.set_filter("ignition", FilterValue::Bool(true));
    table.set_page_size(20);
    let prefs = table.preferences();
    drop(table);

    let restored = vehicle_table(vehicles(30), file_store());
    assert_eq!(restored.preferences(), prefs);
    assert_eq!(restored.sort(), SortState::new(3, SortDir::Desc));
    assert_eq!(restored.visible_columns().first(), Some(&9));
    assert!(!restored.visible_columns().contains(&1));
    assert_eq!(restored.pager().page_size(), 20);
    assert_eq!(restored.active_filter_count(), 1);

    // Page size is shared with every other table.
    let mut rng = StdRng::seed_from_u64(1);
    let admins = SmartTable::new(
        "Administrators",
        fleet::seed_administrators(5, &mut rng, today()),
        fleet::administrator_columns(),
        file_store(),
    );
    assert_eq!(admins.pager().page_size(), 20);
    assert_eq!(admins.active_filter_count(), 0);
}

#[test]
fn reset_forgets_stored_preferences() {
    let mut table = vehicle_table(vehicles(12), memory());
    table.toggle_column(2);
    table.set_filter("plate", FilterValue::Text("MH".to_string()));
    table.reset_preferences();
    assert_eq!(table.visible_columns().len(), 10);
    assert_eq!(table.active_filter_count(), 0);
    assert_eq!(table.sort(), SortState::new(0, SortDir::Asc));
}

#[test]
fn page_selection_and_selected_export() -> Result<(), TableError> {
    let mut table = vehicle_table(vehicles(25), memory());
    assert_eq!(table.page_check_state(), CheckState::Unchecked);
    table.toggle_page_selection();
    assert_eq!(table.page_check_state(), CheckState::Checked);
    assert_eq!(table.selection().len(), 10);

    table.next_page();
    assert_eq!(table.page_check_state(), CheckState::Unchecked);
    let first = table.page_indices()[0];
    table.toggle_row(first);
    assert_eq!(table.page_check_state(), CheckState::Indeterminate);
    assert_eq!(table.selection().len(), 11);

    let doc = table.export_selected(ExportFormat::Json)?;
    let rows: Vec<serde_json::Value> = serde_json::from_str(&doc.body)?;
    assert_eq!(rows.len(), 11);
    assert!(rows[0].get("plate").is_some());
    assert!(rows[0].get("odometerKm").is_none());

    table.clear_selection();
    assert!(table.selection().is_empty());
    Ok(())
}

#[test]
fn csv_export_follows_the_visible_columns() -> Result<(), TableError> {
    let mut table = vehicle_table(vehicles(6), memory());
    table.toggle_column(1);
    table.set_search(table.data()[4].plate.clone());

    let doc = table.export(ExportFormat::Csv)?;
    assert!(doc.file_name.starts_with("vehicles_"));
    assert!(doc.file_name.ends_with(".csv"));
    let lines: Vec<&str> = doc.body.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("\"Vehicle\",\"Status\""));
    assert!(!lines[0].contains("Driver"));
    assert!(lines[1].contains(&table.data()[4].plate));
    Ok(())
}

#[test]
fn vehicle_form_adds_and_edits() -> Result<(), TableError> {
    use fleet_table::table::RowForm;

    let form = fleet::VehicleForm { today: today() };
    let mut table = vehicle_table(vehicles(3), memory());
    let values: Vec<String> = ["KA 01 AB 1234", "Volvo FM 420", "Truck", "R. Iyer"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(form.fields().len(), values.len());
    let added = form.create(&values, table.data())?;
    assert!(table.data().iter().all(|v| v.id != added.id));
    table.push_row(added);
    assert_eq!(table.data().len(), 4);

    let mut edit = form.values_of(&table.data()[3]);
    edit[3] = "S. Rao".to_string();
    let updated = form.update(&table.data()[3], &edit)?;
    table.replace_row(3, updated)?;
    assert_eq!(table.data()[3].driver, "S. Rao");
    assert_eq!(table.data()[3].plate, "KA 01 AB 1234");

    let blank = vec![String::new(); 4];
    assert!(matches!(form.create(&blank, table.data()), Err(TableError::Validation(_))));
    Ok(())
}
