//! The configurable smart table.
//!
//! `SmartTable` owns the rows and composes the engines: rows are filtered,
//! sorted and paged into `view`, a list of positions in `data`. Every toolbar
//! change that is part of the table preferences is written to the injected
//! [`PreferencesStore`] right away.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::columns::ColumnManager;
use crate::display::{DisplayCell, DisplayMap};
use crate::domain::TableError;
use crate::export::{self, ExportBrand, ExportDocument, ExportFormat, ExportView};
use crate::filter::{self, FilterConfigMap, FilterOptions, FilterValue, FilterValues};
use crate::prefs::{GlobalSetting, PreferencesStore, TablePreferences, global_page_size};
use crate::record::Record;
use crate::selection::{BulkOutcome, CheckState, MultiSelectOption, SelectionManager};
use crate::view::{self, Pager, SortDir, SortState};

pub const DEFAULT_PAGE_SIZE: usize = 10;

pub type RowIdFn<T> = Arc<dyn Fn(&T, usize) -> String + Send + Sync>;
pub type RefreshFn<T> = Arc<dyn Fn() -> Result<Vec<T>, TableError> + Send + Sync>;
pub type JsonProjection<T> = Arc<dyn Fn(&[&T]) -> Result<String, TableError> + Send + Sync>;

/// Add/edit form of a row type, filled in one field at a time.
pub trait RowForm<T>: Send {
    fn fields(&self) -> &[&'static str];

    /// Current values of an existing row, one per field.
    fn values_of(&self, row: &T) -> Vec<String>;

    /// Builds a new row. `rows` are the current rows, for id allocation.
    fn create(&self, values: &[String], rows: &[T]) -> Result<T, TableError>;

    fn update(&self, row: &T, values: &[String]) -> Result<T, TableError>;
}

pub struct SmartTable<T> {
    title: String,
    data: Vec<T>,
    get_row_id: RowIdFn<T>,
    display: DisplayMap<T>,
    filter_config: FilterConfigMap<T>,
    filter_options: FilterOptions,
    actions: Vec<MultiSelectOption<T>>,
    export_brand: Option<ExportBrand>,
    json_projection: Option<JsonProjection<T>>,
    on_refresh: Option<RefreshFn<T>>,
    drawer_filters: bool,
    store: Box<dyn PreferencesStore>,

    search: String,
    filter_values: FilterValues,
    sort: SortState,
    pager: Pager,
    columns: ColumnManager,
    selection: SelectionManager,
    refresh: Option<Receiver<Result<Vec<T>, TableError>>>,
    fullscreen: bool,
    view: Vec<usize>,
}

impl<T> SmartTable<T>
where
    T: Record + Serialize + Send + Sync + 'static,
{
    /// Creates the table and restores its stored preferences.
    pub fn new(
        title: impl Into<String>,
        data: Vec<T>,
        display: DisplayMap<T>,
        store: Box<dyn PreferencesStore>,
    ) -> Self {
        let title = title.into();
        let page_size = global_page_size(store.as_ref()).unwrap_or(DEFAULT_PAGE_SIZE);
        let columns = ColumnManager::new(display.keys().copied());
        let mut table = Self {
            title,
            data,
            get_row_id: Arc::new(|_, idx| idx.to_string()),
            display,
            filter_config: FilterConfigMap::new(),
            filter_options: FilterOptions::default(),
            actions: Vec::new(),
            export_brand: Some(ExportBrand::default()),
            json_projection: None,
            on_refresh: None,
            drawer_filters: false,
            store,
            search: String::new(),
            filter_values: FilterValues::new(),
            sort: SortState::default(),
            pager: Pager::new(page_size),
            columns,
            selection: SelectionManager::new(),
            refresh: None,
            fullscreen: false,
            view: Vec::new(),
        };
        table.sort = table.default_sort();
        table.load_preferences();
        table.recompute();
        table
    }

    pub fn with_row_id(mut self, row_id: impl Fn(&T, usize) -> String + Send + Sync + 'static) -> Self {
        self.get_row_id = Arc::new(row_id);
        self
    }

    pub fn with_filters(mut self, filter_config: FilterConfigMap<T>) -> Self {
        self.filter_config = filter_config;
        self.recompute();
        self
    }

    pub fn with_filter_options(mut self, options: FilterOptions) -> Self {
        self.filter_options = options;
        self.recompute();
        self
    }

    pub fn with_actions(mut self, actions: Vec<MultiSelectOption<T>>) -> Self {
        self.actions = actions;
        self
    }

    /// `None` exports without header and footer.
    pub fn with_brand(mut self, brand: Option<ExportBrand>) -> Self {
        self.export_brand = brand;
        self
    }

    /// Replaces the raw-row JSON export with a custom projection.
    pub fn with_json_projection(
        mut self,
        projection: impl Fn(&[&T]) -> Result<String, TableError> + Send + Sync + 'static,
    ) -> Self {
        self.json_projection = Some(Arc::new(projection));
        self
    }

    pub fn with_refresh(
        mut self,
        refresh: impl Fn() -> Result<Vec<T>, TableError> + Send + Sync + 'static,
    ) -> Self {
        self.on_refresh = Some(Arc::new(refresh));
        self
    }

    pub fn with_drawer_filters(mut self, drawer: bool) -> Self {
        self.drawer_filters = drawer;
        self
    }

    /// Page size for a table when nothing is stored globally yet.
    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        if global_page_size(self.store.as_ref()).is_none() {
            self.pager.set_page_size(page_size);
            self.recompute();
        }
        self
    }

    // ----------------------------- Queries ------------------------------ //

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn row_id(&self, data_idx: usize) -> Option<String> {
        self.data
            .get(data_idx)
            .map(|row| (self.get_row_id)(row, data_idx))
    }

    pub fn column(&self, key: usize) -> Option<&DisplayCell<T>> {
        self.display.get(&key)
    }

    pub fn column_manager(&self) -> &ColumnManager {
        &self.columns
    }

    pub fn visible_columns(&self) -> Vec<usize> {
        self.columns.visible()
    }

    pub fn filter_configs(&self) -> &FilterConfigMap<T> {
        &self.filter_config
    }

    pub fn filter_values(&self) -> &FilterValues {
        &self.filter_values
    }

    pub fn active_filter_count(&self) -> usize {
        self.filter_values.values().filter(|v| !v.is_empty()).count()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn total_pages(&self) -> usize {
        self.pager.total_pages(self.view.len())
    }

    pub fn filtered_count(&self) -> usize {
        self.view.len()
    }

    /// Filtered and sorted positions in `data`.
    pub fn view_indices(&self) -> &[usize] {
        &self.view
    }

    /// Positions in `data` of the rows on the current page.
    pub fn page_indices(&self) -> &[usize] {
        &self.view[self.pager.page_range(self.view.len())]
    }

    pub fn page_rows(&self) -> Vec<&T> {
        self.page_indices().iter().map(|&i| &self.data[i]).collect()
    }

    pub fn page_ids(&self) -> Vec<String> {
        self.page_indices()
            .iter()
            .map(|&i| (self.get_row_id)(&self.data[i], i))
            .collect()
    }

    pub fn page_check_state(&self) -> CheckState {
        self.selection.page_state(&self.page_ids())
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    pub fn is_selected(&self, data_idx: usize) -> bool {
        self.row_id(data_idx)
            .is_some_and(|id| self.selection.is_selected(&id))
    }

    /// Selected rows out of the full data, filtered or not.
    pub fn selected_rows(&self) -> Vec<&T> {
        let row_id = &self.get_row_id;
        self.selection.selected_rows(&self.data, |row, idx| row_id(row, idx))
    }

    pub fn actions(&self) -> &[MultiSelectOption<T>] {
        &self.actions
    }

    pub fn show_bulk_bar(&self) -> bool {
        !self.actions.is_empty() && !self.selection.is_empty()
    }

    pub fn has_refresh(&self) -> bool {
        self.on_refresh.is_some()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_some()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn drawer_filters(&self) -> bool {
        self.drawer_filters
    }

    pub fn preferences(&self) -> TablePreferences {
        TablePreferences {
            column_order: self.columns.order().to_vec(),
            hidden_cols: self.columns.hidden().to_vec(),
            filters: self.filter_values.clone(),
            sort_key: self.sort.key,
            sort_dir: self.sort.dir,
        }
    }

    // ---------------------------- Toolbar ------------------------------- //

    /// Filters on every keystroke, back to the first page.
    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
        self.pager.reset();
        self.recompute();
    }

    pub fn set_filter(&mut self, key: &str, value: FilterValue) {
        if value.is_empty() {
            self.filter_values.remove(key);
        } else {
            self.filter_values.insert(key.to_string(), value);
        }
        self.pager.reset();
        self.recompute();
        self.persist();
    }

    pub fn clear_filter(&mut self, key: &str) {
        self.set_filter(key, FilterValue::Text(String::new()));
    }

    pub fn clear_filters(&mut self) {
        self.filter_values.clear();
        self.pager.reset();
        self.recompute();
        self.persist();
    }

    /// Header click on `column`.
    pub fn toggle_sort(&mut self, column: usize) {
        if !self.display.contains_key(&column) {
            return;
        }
        self.set_sort(self.sort.cycle(column));
    }

    pub fn set_sort(&mut self, sort: SortState) {
        self.sort = sort;
        self.recompute();
        self.persist();
    }

    pub fn set_page(&mut self, page: usize) {
        self.pager.set_page(page, self.view.len());
    }

    pub fn first_page(&mut self) {
        self.pager.first();
    }

    pub fn previous_page(&mut self) {
        self.pager.previous(self.view.len());
    }

    pub fn next_page(&mut self) {
        self.pager.next(self.view.len());
    }

    pub fn last_page(&mut self) {
        self.pager.last(self.view.len());
    }

    /// Also becomes the default page size of every other table.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.pager.set_page_size(page_size);
        self.store
            .set_global(GlobalSetting::PageSize, &self.pager.page_size().to_string());
        self.recompute();
    }

    pub fn move_column(&mut self, from: usize, to: usize) {
        if self.columns.move_column(from, to) {
            self.persist();
        }
    }

    pub fn shift_column(&mut self, key: usize, step: isize) {
        if self.columns.shift_column(key, step) {
            self.persist();
        }
    }

    pub fn toggle_column(&mut self, key: usize) {
        if self.columns.toggle_visibility(key) {
            self.persist();
        }
    }

    /// Forgets the stored preferences and returns to the defaults.
    pub fn reset_preferences(&mut self) {
        self.store.clear(&self.title);
        self.columns.reset();
        self.filter_values.clear();
        self.sort = self.default_sort();
        self.pager.reset();
        self.recompute();
        info!("Reset preferences of {}", self.title);
    }

    pub fn toggle_fullscreen(&mut self) {
        self.fullscreen = !self.fullscreen;
    }

    // --------------------------- Selection ------------------------------ //

    pub fn toggle_row(&mut self, data_idx: usize) {
        if let Some(id) = self.row_id(data_idx) {
            self.selection.toggle(&id);
        }
    }

    pub fn toggle_page_selection(&mut self) {
        let ids = self.page_ids();
        self.selection.toggle_page(&ids);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Runs a bulk action over the selection. Returns `None` without calling
    /// the action when nothing is selected.
    pub fn run_action(&mut self, idx: usize) -> Result<Option<BulkOutcome>, TableError> {
        let Some(action) = self.actions.get(idx).cloned() else {
            return Ok(None);
        };
        if self.selection.is_empty() {
            debug!("Bulk action {} declined, nothing selected", action.name);
            return Ok(None);
        }
        let outcome = {
            let rows = self.selected_rows();
            info!("Running bulk action {} on {} rows", action.name, rows.len());
            action.run(&rows, self.selection.ids())?
        };
        if outcome == BulkOutcome::Remove {
            self.remove_selected();
        }
        Ok(Some(outcome))
    }

    /// Drops every selected row from the data and clears the selection.
    pub fn remove_selected(&mut self) {
        let row_id = Arc::clone(&self.get_row_id);
        let selected = self.selection.ids().clone();
        let before = self.data.len();
        let mut idx = 0;
        self.data.retain(|row| {
            let keep = !selected.contains(&row_id(row, idx));
            idx += 1;
            keep
        });
        self.selection.clear();
        info!("Removed {} rows from {}", before - self.data.len(), self.title);
        self.recompute();
    }

    // ----------------------------- Data --------------------------------- //

    /// Replaces all rows, keeping the selection of ids that still exist.
    pub fn replace_data(&mut self, data: Vec<T>) {
        self.data = data;
        let existing: HashSet<String> = self
            .data
            .iter()
            .enumerate()
            .map(|(idx, row)| (self.get_row_id)(row, idx))
            .collect();
        self.selection.retain_existing(&existing);
        self.recompute();
    }

    /// Replaces one row in place, e.g. after an edit form was saved.
    pub fn replace_row(&mut self, data_idx: usize, row: T) -> Result<(), TableError> {
        let slot = self
            .data
            .get_mut(data_idx)
            .ok_or_else(|| TableError::Validation(format!("No row at position {data_idx}")))?;
        *slot = row;
        self.recompute();
        Ok(())
    }

    pub fn push_row(&mut self, row: T) {
        self.data.push(row);
        self.recompute();
    }

    /// Starts `on_refresh` on a worker thread. A refresh that is already
    /// running is not queued again.
    pub fn begin_refresh(&mut self) -> bool {
        let Some(refresh) = self.on_refresh.as_ref().map(Arc::clone) else {
            return false;
        };
        if self.refresh.is_some() {
            debug!("Refresh of {} already running", self.title);
            return false;
        }
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // The receiver may be gone when the table was dropped.
            let _ = tx.send(refresh());
        });
        self.refresh = Some(rx);
        trace!("Refresh of {} started", self.title);
        true
    }

    /// Collects a finished refresh. The refreshing flag is cleared whether
    /// the refresh succeeded, failed or its worker died.
    pub fn poll_refresh(&mut self) -> Option<Result<usize, TableError>> {
        let rx = self.refresh.as_ref()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                Err(TableError::Refresh("refresh worker stopped".to_string()))
            }
        };
        self.refresh = None;
        Some(match result {
            Ok(rows) => {
                let count = rows.len();
                self.replace_data(rows);
                info!("Refreshed {} with {count} rows", self.title);
                Ok(count)
            }
            Err(e) => {
                warn!("Refresh of {} failed: {e}", self.title);
                Err(e)
            }
        })
    }

    // ---------------------------- Export -------------------------------- //

    /// Text snapshot of the given rows over the visible columns.
    pub fn export_view_of(&self, indices: &[usize]) -> ExportView {
        let visible: Vec<&DisplayCell<T>> = self
            .visible_columns()
            .iter()
            .filter_map(|k| self.display.get(k))
            .collect();
        ExportView {
            title: self.title.clone(),
            columns: visible.iter().map(|c| c.title_text()).collect(),
            rows: indices
                .iter()
                .filter_map(|&i| self.data.get(i))
                .map(|row| visible.iter().map(|c| c.content_text(row)).collect())
                .collect(),
        }
    }

    pub fn export_view(&self) -> ExportView {
        self.export_view_of(&self.view)
    }

    /// Exports the filtered, sorted view over the visible columns.
    pub fn export(&self, format: ExportFormat) -> Result<ExportDocument, TableError> {
        self.export_at(format, &self.view, Local::now().naive_local())
    }

    /// Exports the selected rows in data order.
    pub fn export_selected(&self, format: ExportFormat) -> Result<ExportDocument, TableError> {
        let selected: Vec<usize> = (0..self.data.len())
            .filter(|&i| self.is_selected(i))
            .collect();
        self.export_at(format, &selected, Local::now().naive_local())
    }

    pub fn export_at(
        &self,
        format: ExportFormat,
        indices: &[usize],
        generated_at: NaiveDateTime,
    ) -> Result<ExportDocument, TableError> {
        if format == ExportFormat::Json {
            let rows: Vec<&T> = indices.iter().filter_map(|&i| self.data.get(i)).collect();
            let body = match &self.json_projection {
                Some(project) => project(&rows)?,
                None => export::to_json(&rows)?,
            };
            return Ok(ExportDocument::new(&self.title, format, body, generated_at));
        }
        let view = self.export_view_of(indices);
        ExportDocument::from_view(&view, format, self.export_brand.as_ref(), generated_at)
    }

    // ---------------------------- Internal ------------------------------ //

    fn default_sort(&self) -> SortState {
        match self.display.keys().next() {
            Some(&first) => SortState::new(first, SortDir::Asc),
            None => SortState::default(),
        }
    }

    fn load_preferences(&mut self) {
        let Some(prefs) = self.store.get(&self.title) else {
            debug!("No stored preferences for {}", self.title);
            return;
        };
        self.columns.restore(&prefs.column_order, &prefs.hidden_cols);
        self.filter_values = prefs
            .filters
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .collect();
        self.sort = match prefs.sort_key {
            Some(key) if !self.display.contains_key(&key) => self.default_sort(),
            key => SortState {
                key,
                dir: prefs.sort_dir,
            },
        };
        debug!("Restored preferences of {}", self.title);
    }

    fn persist(&mut self) {
        let prefs = self.preferences();
        self.store.set(&self.title, &prefs);
    }

    fn recompute(&mut self) {
        let filtered = filter::filter_indices(
            &self.data,
            &self.search,
            &self.filter_config,
            &self.filter_values,
            &self.filter_options,
        );
        self.view = view::sort_indices(&self.data, &filtered, &self.display, &self.sort);
        self.pager.clamp(self.view.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Content;
    use crate::filter::FilterConfig;
    use crate::prefs::{MemoryStorage, Preferences};
    use crate::record::FieldValue;
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Truck {
        plate: String,
        speed: f64,
    }

    impl Record for Truck {
        fn field(&self, name: &str) -> FieldValue {
            match name {
                "plate" => self.plate.as_str().into(),
                "speed" => self.speed.into(),
                _ => FieldValue::Null,
            }
        }

        fn values(&self) -> Vec<FieldValue> {
            vec![self.plate.as_str().into(), self.speed.into()]
        }
    }

    fn trucks(n: usize) -> Vec<Truck> {
        (0..n)
            .map(|i| Truck {
                plate: format!("T-{i:02}"),
                speed: (i * 10) as f64,
            })
            .collect()
    }

    fn columns() -> DisplayMap<Truck> {
        DisplayMap::from([
            (0, DisplayCell::new("Plate", |t: &Truck| Content::text(t.plate.clone()))),
            (1, DisplayCell::new("Speed", |t: &Truck| Content::Number(t.speed))),
            (2, DisplayCell::new("Label", |t: &Truck| Content::text(format!("{} @ {}", t.plate, t.speed)))),
        ])
    }

    fn table(n: usize) -> SmartTable<Truck> {
        SmartTable::new(
            "Trucks",
            trucks(n),
            columns(),
            Box::new(Preferences::new(MemoryStorage::new())),
        )
        .with_row_id(|t: &Truck, _| t.plate.clone())
        .with_filters(FilterConfigMap::new().with("speed", FilterConfig::number_range("Speed", "speed")))
    }

    #[test]
    fn first_column_ascending_by_default() {
        let t = table(3);
        assert_eq!(t.sort(), SortState::new(0, SortDir::Asc));
        assert_eq!(t.pager().page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(t.view_indices(), &[0, 1, 2]);
    }

    #[test]
    fn filter_change_returns_to_first_page() {
        let mut t = table(45);
        t.last_page();
        assert_eq!(t.pager().page(), 5);
        t.set_filter(
            "speed",
            FilterValue::NumberRange {
                min: Some(100.0),
                max: None,
            },
        );
        assert_eq!(t.pager().page(), 1);
        assert_eq!(t.filtered_count(), 35);
        t.set_search("T-4");
        assert_eq!(t.filtered_count(), 5);
        assert_eq!(t.total_pages(), 1);
    }

    #[test]
    fn empty_result_keeps_one_page() {
        let mut t = table(12);
        t.set_search("no such truck");
        assert_eq!(t.filtered_count(), 0);
        assert_eq!(t.total_pages(), 1);
        assert_eq!(t.pager().page(), 1);
        assert!(t.page_rows().is_empty());
    }

    #[test]
    fn selection_survives_filtering() {
        let mut t = table(30);
        t.toggle_row(3);
        t.set_search("T-2");
        assert!(!t.page_indices().contains(&3));
        assert_eq!(t.selected_rows().len(), 1);
        assert_eq!(t.page_check_state(), CheckState::Unchecked);
        t.toggle_page_selection();
        assert_eq!(t.page_check_state(), CheckState::Checked);
        assert_eq!(t.selection().len(), 11);
    }

    #[test]
    fn bulk_remove_drops_rows_and_selection() -> Result<(), TableError> {
        let mut t = table(5).with_actions(vec![MultiSelectOption::new("Delete", |_, _| {
            Ok(BulkOutcome::Remove)
        })]);
        assert_eq!(t.run_action(0)?, None);
        t.toggle_row(1);
        t.toggle_row(3);
        assert!(t.show_bulk_bar());
        assert_eq!(t.run_action(0)?, Some(BulkOutcome::Remove));
        assert_eq!(t.data().len(), 3);
        assert!(t.selection().is_empty());
        assert!(!t.show_bulk_bar());
        Ok(())
    }

    #[test]
    fn sort_uses_rendered_text() {
        let mut t = table(12);
        t.toggle_sort(1);
        let speeds: Vec<f64> = t.page_rows().iter().map(|r| r.speed).collect();
        assert_eq!(speeds[..4], [0.0, 10.0, 100.0, 110.0]);
        t.toggle_sort(1);
        assert_eq!(t.sort().dir, SortDir::Desc);
        t.toggle_sort(1);
        assert_eq!(t.sort().key, None);
        assert_eq!(t.page_indices()[0], 0);
    }

    #[test]
    fn csv_export_follows_visible_columns() -> Result<(), TableError> {
        let mut t = table(2);
        t.toggle_column(2);
        t.move_column(1, 0);
        let doc = t.export(ExportFormat::Csv)?;
        assert_eq!(doc.body, "\"Speed\",\"Plate\"\n\"0\",\"T-00\"\n\"10\",\"T-01\"");
        Ok(())
    }

    #[test]
    fn json_export_uses_projection_when_set() -> Result<(), TableError> {
        let t = table(2).with_json_projection(|rows: &[&Truck]| {
            export::to_json(&rows.iter().map(|r| r.plate.as_str()).collect::<Vec<_>>())
        });
        let doc = t.export(ExportFormat::Json)?;
        assert_eq!(doc.body, "[\n  \"T-00\",\n  \"T-01\"\n]");
        Ok(())
    }

    #[test]
    fn refresh_replaces_data_and_clears_flag() {
        let mut t = table(2).with_refresh(|| Ok(trucks(7)));
        assert!(t.begin_refresh());
        assert!(!t.begin_refresh());
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut outcome = None;
        while outcome.is_none() && Instant::now() < deadline {
            outcome = t.poll_refresh();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(matches!(outcome, Some(Ok(7))));
        assert!(!t.is_refreshing());
        assert_eq!(t.data().len(), 7);
    }

    #[test]
    fn failed_refresh_still_clears_flag() {
        let mut t = table(2).with_refresh(|| Err(TableError::Refresh("offline".to_string())));
        assert!(t.begin_refresh());
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut outcome = None;
        while outcome.is_none() && Instant::now() < deadline {
            outcome = t.poll_refresh();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(matches!(outcome, Some(Err(TableError::Refresh(_)))));
        assert!(!t.is_refreshing());
        assert_eq!(t.data().len(), 2);
    }

    #[test]
    fn panicking_refresh_worker_clears_flag() {
        let mut t = table(3).with_refresh(|| -> Result<Vec<Truck>, TableError> { panic!("offline") });
        assert!(t.begin_refresh());
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut outcome = None;
        while outcome.is_none() && Instant::now() < deadline {
            outcome = t.poll_refresh();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(matches!(outcome, Some(Err(TableError::Refresh(_)))));
        assert!(!t.is_refreshing());
        assert_eq!(t.data().len(), 3);
        assert!(t.begin_refresh());
    }
}
