use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::display::Tone;
use crate::domain::{CMDMode, HELP_TEXT, Message, TableConfig, TableError};
use crate::export::{self, ExportFormat};
use crate::inputter::{InputResult, Inputter};
use crate::record::Record;
use crate::selection::{ActionVariant, BulkOutcome, CheckState};
use crate::table::{RowForm, SmartTable};
use crate::ui::{
    BULKBAR_HEIGHT, CHECKBOX_WIDTH, CMDLINE_HEIGH, COLUMN_WIDTH_MARGIN, FOOTER_HEIGHT,
    TABLE_HEADER_HEIGHT, TOOLBAR_HEIGHT,
};
use crate::view;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Status {
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    Table,
    Record,
    Popup,
    CmdInput,
    Filters,
    Columns,
    Export,
    Bulk,
}

/// Styled pieces of one rendered cell.
pub type Segments = Vec<(Tone, String)>;

#[derive(Debug, Clone, Default)]
pub struct ColumnView {
    pub key: usize,
    pub name: String,
    pub width: usize,
    pub data: Vec<Segments>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelItem {
    pub label: String,
    pub value: String,
    pub tone: Tone,
}

impl PanelItem {
    fn new(label: impl Into<String>, value: impl Into<String>, tone: Tone) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            tone,
        }
    }
}

/// A list popup: filter panel, column manager, export menu, bulk actions or
/// the record drawer.
#[derive(Debug, Clone, Default)]
pub struct PanelView {
    pub title: String,
    pub items: Vec<PanelItem>,
    pub selected: usize,
    pub hint: String,
    /// Rendered docked to the right instead of centered.
    pub drawer: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagerView {
    pub page: usize,
    pub total_pages: usize,
    pub window: Vec<usize>,
    pub page_size: usize,
    pub is_first: bool,
    pub is_last: bool,
}

pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub checkboxes: Vec<bool>,
    pub header_check: CheckState,
    pub nrows: usize,
    pub filtered: usize,
    pub total: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub pager: PagerView,
    pub search: String,
    pub active_filters: usize,
    pub selected_count: usize,
    pub bulk_actions: Vec<(String, ActionVariant)>,
    pub panel: Option<PanelView>,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub cmdinput: InputResult,
    pub cmd_prompt: String,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_status_message_update: Instant,
    pub tooltip: Option<String>,
    pub fullscreen: bool,
    pub refreshing: bool,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            table: Vec::new(),
            checkboxes: Vec::new(),
            header_check: CheckState::Unchecked,
            nrows: 0,
            filtered: 0,
            total: 0,
            selected_row: 0,
            selected_column: 0,
            pager: PagerView::default(),
            search: String::new(),
            active_filters: 0,
            selected_count: 0,
            bulk_actions: Vec::new(),
            panel: None,
            show_popup: false,
            popup_message: String::new(),
            layout: UILayout::default(),
            cmdinput: InputResult::default(),
            cmd_prompt: String::new(),
            active_cmdinput: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
            tooltip: None,
            fullscreen: false,
            refreshing: false,
            last_update: Instant::now(),
        }
    }
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
    pub statusline_width: usize,
    pub statusline_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize, fullscreen: bool, bulk_bar: bool) -> Self {
        let mut chrome = CMDLINE_HEIGH + TABLE_HEADER_HEIGHT;
        if !fullscreen {
            chrome += TOOLBAR_HEIGHT + FOOTER_HEIGHT;
        }
        if bulk_bar {
            chrome += BULKBAR_HEIGHT;
        }
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(CHECKBOX_WIDTH),
            table_height: ui_height.saturating_sub(chrome),
            statusline_width: ui_width,
            statusline_height: CMDLINE_HEIGH,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

/// Values typed into an add/edit form so far.
struct FormState {
    editing: Option<usize>,
    values: Vec<String>,
}

pub struct Model<T> {
    config: TableConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    table: SmartTable<T>,
    form: Option<Box<dyn RowForm<T>>>,
    form_state: Option<FormState>,
    curser_row: usize, // Position within the current page
    offset_row: usize,
    curser_column: usize, // Position within the rendered columns
    offset_column: usize,
    panel_curser: usize,
    record_pos: usize, // Position of the drawer row in the sorted view
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    search_backup: String,
    filter_inputs: HashMap<String, String>,
    status_message: String,
    last_status_message_update: Instant,
}

impl<T> Model<T>
where
    T: Record + Serialize + Send + Sync + 'static,
{
    pub fn init(table: SmartTable<T>, config: &TableConfig, ui_width: usize, ui_height: usize) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::Ready,
            modus: Modus::Table,
            previous_modus: Modus::Table,
            table,
            form: None,
            form_state: None,
            curser_row: 0,
            offset_row: 0,
            curser_column: 0,
            offset_column: 0,
            panel_curser: 0,
            record_pos: 0,
            uilayout: UILayout::from_values(ui_width, ui_height, false, false),
            uidata: UIData::empty(),
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            search_backup: String::new(),
            filter_inputs: HashMap::new(),
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        let message = format!(
            "Loaded {} rows into {}, press ? for help",
            model.table.data().len(),
            model.table.title()
        );
        model.set_status_message(message);
        model.relayout();
        model.update_uidata();
        model
    }

    pub fn with_form(mut self, form: Option<Box<dyn RowForm<T>>>) -> Self {
        self.form = form;
        self
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn table(&self) -> &SmartTable<T> {
        &self.table
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TableError> {
        self.poll_refresh();

        if let Some(msg) = message {
            trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);
            if let Message::Resize(width, height) = msg {
                self.ui_resize(width, height);
            } else {
                match self.modus {
                    Modus::Table => self.update_table(msg)?,
                    Modus::Record => self.update_record(msg),
                    Modus::Popup => match msg {
                        Message::Quit => self.quit(),
                        Message::Exit | Message::Enter | Message::Help => self.exit(),
                        _ => (),
                    },
                    Modus::CmdInput => {
                        if let Message::RawKey(key) = msg {
                            self.raw_input(key)
                        }
                    }
                    Modus::Filters => self.update_filters(msg),
                    Modus::Columns => self.update_columns(msg),
                    Modus::Export => self.update_export(msg),
                    Modus::Bulk => self.update_bulk(msg),
                }
            }
        }

        self.update_uidata();
        Ok(())
    }

    // ------------------------ Modus dispatch ----------------------------- //

    fn update_table(&mut self, msg: Message) -> Result<(), TableError> {
        match msg {
            Message::Quit => self.quit(),
            Message::MoveUp => self.move_selection_up(),
            Message::MoveDown => self.move_selection_down(),
            Message::MoveLeft => self.move_selection_left(),
            Message::MoveRight => self.move_selection_right(),
            Message::MoveBeginning => self.select_page_row(0),
            Message::MoveEnd => self.select_page_row(usize::MAX),
            Message::FirstPage => self.change_page(|t| t.first_page()),
            Message::PreviousPage => self.change_page(|t| t.previous_page()),
            Message::NextPage => self.change_page(|t| t.next_page()),
            Message::LastPage => self.change_page(|t| t.last_page()),
            Message::PageSizeUp => self.step_page_size(true),
            Message::PageSizeDown => self.step_page_size(false),
            Message::Enter => self.open_record(),
            Message::Help => self.show_help(),
            Message::Search => {
                self.search_backup = self.table.search().to_string();
                let current = self.search_backup.clone();
                self.enter_cmd_mode(CMDMode::Search, &current);
            }
            Message::Filters => self.open_panel(Modus::Filters),
            Message::ClearFilters => {
                self.table.clear_filters();
                self.filter_inputs.clear();
                self.clamp_curser();
                self.set_status_message("Cleared all filters");
            }
            Message::Columns => self.open_panel(Modus::Columns),
            Message::ExportMenu => self.open_panel(Modus::Export),
            Message::BulkActions => {
                if self.table.show_bulk_bar() {
                    self.open_panel(Modus::Bulk);
                } else {
                    self.set_status_message("Select rows to use bulk actions");
                }
            }
            Message::Sort => self.sort_current_column(),
            Message::ToggleSelect => {
                if let Some(idx) = self.current_data_idx() {
                    self.table.toggle_row(idx);
                    self.relayout();
                }
            }
            Message::TogglePageSelection => {
                self.table.toggle_page_selection();
                self.relayout();
            }
            Message::ClearSelection => {
                self.table.clear_selection();
                self.relayout();
            }
            Message::Fullscreen => {
                self.table.toggle_fullscreen();
                self.relayout();
            }
            Message::Exit => {
                if self.table.is_fullscreen() {
                    self.table.toggle_fullscreen();
                    self.relayout();
                }
            }
            Message::Refresh => self.refresh(),
            Message::CopyCell => self.copy_table_cell(),
            Message::CopyRow => self.copy_table_row(),
            Message::AddRow => self.start_form(None),
            Message::EditRow => self.start_form(self.current_data_idx()),
            _ => (),
        }
        Ok(())
    }

    fn update_record(&mut self, msg: Message) {
        match msg {
            Message::Quit => self.quit(),
            Message::MoveUp => self.panel_curser = self.panel_curser.saturating_sub(1),
            Message::MoveDown => {
                let fields = self.table.column_manager().order().len();
                if self.panel_curser + 1 < fields {
                    self.panel_curser += 1;
                }
            }
            Message::MoveLeft => self.record_pos = self.record_pos.saturating_sub(1),
            Message::MoveRight => {
                if self.record_pos + 1 < self.table.filtered_count() {
                    self.record_pos += 1;
                }
            }
            Message::CopyCell => {
                if let Some(value) = self.record_field(self.panel_curser) {
                    self.copy_text(value);
                }
            }
            Message::EditRow => {
                let idx = self.table.view_indices().get(self.record_pos).copied();
                self.start_form(idx);
            }
            Message::Help => self.show_help(),
            Message::Enter | Message::Exit => self.exit(),
            _ => (),
        }
    }

    fn update_filters(&mut self, msg: Message) {
        let count = self.table.filter_configs().len();
        match msg {
            Message::Quit => self.quit(),
            Message::MoveUp => self.panel_curser = self.panel_curser.saturating_sub(1),
            Message::MoveDown => self.panel_down(count),
            Message::Enter => {
                if let Some((key, config)) = self.table.filter_configs().get_index(self.panel_curser) {
                    let current = self
                        .filter_inputs
                        .get(key)
                        .cloned()
                        .unwrap_or_else(|| config.input_text(self.table.filter_values().get(key)));
                    self.enter_cmd_mode(CMDMode::FilterValue(self.panel_curser), &current);
                }
            }
            Message::ClearSelection => {
                if let Some((key, _)) = self.table.filter_configs().get_index(self.panel_curser) {
                    let key = key.to_string();
                    self.table.clear_filter(&key);
                    self.filter_inputs.remove(&key);
                    self.clamp_curser();
                }
            }
            Message::ClearFilters => {
                self.table.clear_filters();
                self.filter_inputs.clear();
                self.clamp_curser();
            }
            Message::Filters | Message::Exit => self.exit(),
            _ => (),
        }
    }

    fn update_columns(&mut self, msg: Message) {
        let order = self.table.column_manager().order().to_vec();
        let key = order.get(self.panel_curser).copied();
        match msg {
            Message::Quit => self.quit(),
            Message::MoveUp => self.panel_curser = self.panel_curser.saturating_sub(1),
            Message::MoveDown => self.panel_down(order.len()),
            Message::ToggleSelect => {
                if let Some(key) = key {
                    self.table.toggle_column(key);
                }
            }
            Message::MoveColumnUp => {
                if let Some(key) = key {
                    self.table.shift_column(key, -1);
                    self.panel_curser = self.table.column_manager().position(key).unwrap_or(0);
                }
            }
            Message::MoveColumnDown => {
                if let Some(key) = key {
                    self.table.shift_column(key, 1);
                    self.panel_curser = self.table.column_manager().position(key).unwrap_or(0);
                }
            }
            Message::ResetPreferences => {
                self.table.reset_preferences();
                self.filter_inputs.clear();
                self.panel_curser = 0;
                self.set_status_message("Table preferences reset");
            }
            Message::Columns | Message::Exit => self.exit(),
            _ => (),
        }
        self.clamp_curser();
    }

    fn update_export(&mut self, msg: Message) {
        let entries = self.export_entries();
        match msg {
            Message::Quit => self.quit(),
            Message::MoveUp => self.panel_curser = self.panel_curser.saturating_sub(1),
            Message::MoveDown => self.panel_down(entries.len()),
            Message::Enter => {
                if let Some(&(format, selected_only)) = entries.get(self.panel_curser) {
                    self.export(format, selected_only);
                    self.exit();
                }
            }
            Message::ExportMenu | Message::Exit => self.exit(),
            _ => (),
        }
    }

    fn update_bulk(&mut self, msg: Message) {
        match msg {
            Message::Quit => self.quit(),
            Message::MoveUp => self.panel_curser = self.panel_curser.saturating_sub(1),
            Message::MoveDown => self.panel_down(self.table.actions().len()),
            Message::Enter => {
                self.run_action(self.panel_curser);
                self.exit();
            }
            Message::BulkActions | Message::Exit => self.exit(),
            _ => (),
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn exit(&mut self) {
        trace!("Leaving {:?}", self.modus);
        self.previous_modus = self.modus;
        self.modus = Modus::Table;
        self.panel_curser = 0;
        self.uidata.show_popup = false;
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::Popup;
    }

    fn open_panel(&mut self, modus: Modus) {
        self.previous_modus = self.modus;
        self.modus = modus;
        self.panel_curser = 0;
    }

    fn panel_down(&mut self, len: usize) {
        if self.panel_curser + 1 < len {
            self.panel_curser += 1;
        }
    }

    fn open_record(&mut self) {
        if self.current_data_idx().is_none() {
            return;
        }
        let page_start = self.table.pager().page_range(self.table.filtered_count()).start;
        self.record_pos = page_start + self.curser_row;
        self.open_panel(Modus::Record);
    }

    fn record_field(&self, pos: usize) -> Option<String> {
        let data_idx = *self.table.view_indices().get(self.record_pos)?;
        let row = self.table.data().get(data_idx)?;
        let key = *self.table.column_manager().order().get(pos)?;
        self.table.column(key).map(|c| c.content_text(row))
    }

    fn refresh(&mut self) {
        if !self.table.has_refresh() {
            self.set_status_message("This table cannot be refreshed");
        } else if self.table.begin_refresh() {
            self.set_status_message("Refreshing ...");
        } else {
            self.set_status_message("Refresh already running");
        }
    }

    fn poll_refresh(&mut self) {
        match self.table.poll_refresh() {
            Some(Ok(count)) => {
                self.clamp_curser();
                self.set_status_message(format!("Refreshed, {count} rows"));
            }
            Some(Err(e)) => self.set_status_message(format!("Refresh failed: {e}")),
            None => {}
        }
    }

    fn export_entries(&self) -> Vec<(ExportFormat, bool)> {
        let mut entries: Vec<(ExportFormat, bool)> =
            ExportFormat::ALL.iter().map(|&f| (f, false)).collect();
        if !self.table.selection().is_empty() {
            entries.extend(ExportFormat::ALL.iter().map(|&f| (f, true)));
        }
        entries
    }

    fn export(&mut self, format: ExportFormat, selected_only: bool) {
        let document = if selected_only {
            self.table.export_selected(format)
        } else {
            self.table.export(format)
        };
        match document.and_then(|doc| doc.write_to(&self.config.export_dir)) {
            Ok(path) => {
                info!("Exported {} as {} to {}", self.table.title(), format.label(), path.display());
                if format == ExportFormat::Pdf {
                    export::open_for_print(&path);
                }
                self.set_status_message(format!("Exported to {}", path.display()));
            }
            Err(e) => {
                error!("Export failed: {e}");
                self.set_status_message(format!("Export failed: {e}"));
            }
        }
    }

    fn run_action(&mut self, idx: usize) {
        let name = self
            .table
            .actions()
            .get(idx)
            .map(|a| a.name.clone())
            .unwrap_or_default();
        match self.table.run_action(idx) {
            Ok(Some(BulkOutcome::Message(message))) => self.set_status_message(message),
            Ok(Some(BulkOutcome::Remove)) => {
                self.clamp_curser();
                self.set_status_message(format!("{name}: done"));
            }
            Ok(Some(BulkOutcome::Done)) => self.set_status_message(format!("{name}: done")),
            Ok(None) => self.set_status_message("Nothing selected"),
            Err(e) => {
                warn!("Bulk action {name} failed: {e}");
                self.set_status_message(format!("{name} failed: {e}"));
            }
        }
        self.relayout();
    }

    fn step_page_size(&mut self, grow: bool) {
        let size = view::step_page_size(self.table.pager().page_size(), grow);
        self.table.set_page_size(size);
        self.curser_row = 0;
        self.offset_row = 0;
        self.set_status_message(format!("{size} rows per page"));
    }

    fn change_page(&mut self, turn: impl FnOnce(&mut SmartTable<T>)) {
        turn(&mut self.table);
        self.curser_row = 0;
        self.offset_row = 0;
    }

    fn sort_current_column(&mut self) {
        let Some(key) = self.current_column_key() else {
            return;
        };
        self.table.toggle_sort(key);
        let sort = self.table.sort();
        let title = self.table.column(key).map(|c| c.title_text()).unwrap_or_default();
        match sort.key {
            Some(_) => self.set_status_message(format!("Sorted by {title} {:?}", sort.dir)),
            None => self.set_status_message("Initial order"),
        }
        self.clamp_curser();
    }

    // ------------------------- Command line ------------------------------ //

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.cmd_mode == Some(CMDMode::Search) && !self.last_input.finished {
                self.table.set_search(self.last_input.input.clone());
                self.clamp_curser();
            }
            if self.last_input.finished {
                self.handle_cmd_input();
            }
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode, prefill: &str) {
        trace!("Entering command mode {mode:?} ...");
        if self.modus != Modus::CmdInput {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::CmdInput;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.input.clear();
        self.input.set(prefill);
        self.last_input = self.input.get();
    }

    fn leave_cmd_mode(&mut self) {
        self.active_cmdinput = false;
        self.cmd_mode = None;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CmdInput;
    }

    fn handle_cmd_input(&mut self) {
        let cmd_input = self.last_input.input.clone();
        let canceled = self.last_input.canceled;
        trace!("Handle cmd input {cmd_input:?}, canceled {canceled}");
        let mode = self.cmd_mode;
        self.leave_cmd_mode();

        match mode {
            Some(CMDMode::Search) => {
                let term = if canceled {
                    self.search_backup.clone()
                } else {
                    cmd_input
                };
                self.table.set_search(term);
                self.clamp_curser();
                self.set_status_message(format!("{} matching rows", self.table.filtered_count()));
            }
            Some(CMDMode::FilterValue(idx)) => {
                if !canceled {
                    self.apply_filter_input(idx, &cmd_input);
                }
            }
            Some(CMDMode::FormField(field)) => {
                if canceled {
                    self.form_state = None;
                    self.set_status_message("Form discarded");
                } else {
                    self.next_form_field(field, cmd_input);
                }
            }
            None => debug!("Cmd mode is none!"),
        }
    }

    fn apply_filter_input(&mut self, idx: usize, input: &str) {
        let Some((key, config)) = self.table.filter_configs().get_index(idx) else {
            return;
        };
        let key = key.to_string();
        let value = config.parse_input(input);
        let summary = config.describe(Some(&value));
        let label = config.label().to_string();
        self.table.set_filter(&key, value);
        if input.trim().is_empty() {
            self.filter_inputs.remove(&key);
        } else {
            self.filter_inputs.insert(key, input.trim().to_string());
        }
        self.clamp_curser();
        self.set_status_message(format!(
            "{label}: {summary}, {} matching rows",
            self.table.filtered_count()
        ));
    }

    // ---------------------------- Forms ---------------------------------- //

    fn start_form(&mut self, editing: Option<usize>) {
        let Some(form) = self.form.as_ref() else {
            self.set_status_message("Rows of this table cannot be edited");
            return;
        };
        let values = match editing {
            Some(idx) => match self.table.data().get(idx) {
                Some(row) => form.values_of(row),
                None => return,
            },
            None => vec![String::new(); form.fields().len()],
        };
        let first = values.first().cloned().unwrap_or_default();
        self.form_state = Some(FormState { editing, values });
        self.enter_cmd_mode(CMDMode::FormField(0), &first);
    }

    fn next_form_field(&mut self, field: usize, value: String) {
        let Some(state) = self.form_state.as_mut() else {
            return;
        };
        if let Some(slot) = state.values.get_mut(field) {
            *slot = value;
        }
        let next = field + 1;
        if let Some(prefill) = state.values.get(next).cloned() {
            self.enter_cmd_mode(CMDMode::FormField(next), &prefill);
        } else {
            self.submit_form();
        }
    }

    fn submit_form(&mut self) {
        let (Some(form), Some(state)) = (self.form.as_ref(), self.form_state.take()) else {
            return;
        };
        let result = match state.editing {
            Some(idx) => match self.table.data().get(idx) {
                Some(row) => form
                    .update(row, &state.values)
                    .and_then(|row| self.table.replace_row(idx, row)),
                None => Err(TableError::Validation("The row no longer exists".into())),
            },
            None => form
                .create(&state.values, self.table.data())
                .map(|row| self.table.push_row(row)),
        };
        match result {
            Ok(()) => {
                info!("Saved row in {}", self.table.title());
                self.clamp_curser();
                self.set_status_message("Saved");
            }
            Err(e) => {
                debug!("Form rejected: {e}");
                self.set_status_message(e.to_string());
            }
        }
    }

    // --------------------------- Clipboard ------------------------------- //

    fn copy_text(&mut self, text: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("No clipboard available: {e}");
                    self.set_status_message("No clipboard available");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(text) {
                Ok(_) => {
                    trace!("Copied content to clipboard.");
                    self.set_status_message("Copied to clipboard");
                }
                Err(e) => trace!("Error copying to clipboard: {:?}", e),
            }
        }
    }

    fn copy_table_cell(&mut self) {
        let (Some(idx), Some(key)) = (self.current_data_idx(), self.current_column_key()) else {
            return;
        };
        let cell = self
            .table
            .data()
            .get(idx)
            .zip(self.table.column(key))
            .map(|(row, column)| column.content_text(row));
        if let Some(cell) = cell {
            trace!("Cell content: {}", cell);
            self.copy_text(cell);
        }
    }

    fn copy_table_row(&mut self) {
        let Some(idx) = self.current_data_idx() else {
            return;
        };
        let view = self.table.export_view_of(&[idx]);
        if let Some(cells) = view.rows.first() {
            let row_content = cells
                .iter()
                .map(|c| wrap_cell_content(c))
                .collect::<Vec<String>>()
                .join(",");
            self.copy_text(row_content);
        }
    }

    // --------------------------- Movement -------------------------------- //

    fn page_len(&self) -> usize {
        self.table.page_indices().len()
    }

    fn current_data_idx(&self) -> Option<usize> {
        self.table.page_indices().get(self.curser_row).copied()
    }

    fn current_column_key(&self) -> Option<usize> {
        self.table
            .visible_columns()
            .get(self.offset_column + self.curser_column)
            .copied()
    }

    fn select_page_row(&mut self, row: usize) {
        self.curser_row = row.min(self.page_len().saturating_sub(1));
        self.scroll_to_curser();
    }

    fn move_selection_up(&mut self) {
        if self.curser_row > 0 {
            self.select_page_row(self.curser_row - 1);
        } else if !self.table.pager().is_first() {
            self.table.previous_page();
            self.select_page_row(usize::MAX);
        }
    }

    fn move_selection_down(&mut self) {
        if self.curser_row + 1 < self.page_len() {
            self.select_page_row(self.curser_row + 1);
        } else if !self.table.pager().is_last(self.table.filtered_count()) {
            self.table.next_page();
            self.select_page_row(0);
        }
    }

    fn move_selection_left(&mut self) {
        if self.curser_column > 0 {
            self.curser_column -= 1;
        } else if self.offset_column > 0 {
            self.offset_column -= 1;
        }
    }

    fn move_selection_right(&mut self) {
        let visible = self.table.visible_columns().len();
        if self.offset_column + self.curser_column + 1 >= visible {
            return;
        }
        if self.curser_column + 1 < self.uidata.table.len() {
            self.curser_column += 1;
        } else {
            self.offset_column += 1;
        }
    }

    fn scroll_to_curser(&mut self) {
        let height = self.uilayout.table_height.max(1);
        if self.curser_row < self.offset_row {
            self.offset_row = self.curser_row;
        } else if self.curser_row >= self.offset_row + height {
            self.offset_row = self.curser_row + 1 - height;
        }
    }

    /// Keeps the cursors inside the page and the visible columns after the
    /// data or the view changed underneath them.
    fn clamp_curser(&mut self) {
        let rows = self.page_len();
        self.curser_row = self.curser_row.min(rows.saturating_sub(1));
        self.offset_row = self.offset_row.min(self.curser_row);
        let columns = self.table.visible_columns().len();
        self.offset_column = self.offset_column.min(columns.saturating_sub(1));
        if self.offset_column + self.curser_column >= columns {
            self.curser_column = columns.saturating_sub(self.offset_column + 1);
        }
        self.record_pos = self
            .record_pos
            .min(self.table.filtered_count().saturating_sub(1));
        self.scroll_to_curser();
    }

    fn relayout(&mut self) {
        self.uilayout = UILayout::from_values(
            self.uilayout.width,
            self.uilayout.height,
            self.table.is_fullscreen(),
            self.table.show_bulk_bar(),
        );
        self.clamp_curser();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout.width = width;
        self.uilayout.height = height;
        self.relayout();
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    // ------------------------- UI snapshot ------------------------------- //

    fn update_uidata(&mut self) {
        // The bulk bar can appear or vanish with any selection change.
        if self.uilayout.table_height
            != UILayout::from_values(
                self.uilayout.width,
                self.uilayout.height,
                self.table.is_fullscreen(),
                self.table.show_bulk_bar(),
            )
            .table_height
        {
            self.relayout();
        }

        let page = self.table.page_indices().to_vec();
        let rend = (self.offset_row + self.uilayout.table_height).min(page.len());
        let rbegin = self.offset_row.min(rend);
        let rows = &page[rbegin..rend];

        let table = self.build_columns(rows);
        let count = self.table.filtered_count();
        let pager = self.table.pager();

        self.uidata = UIData {
            name: self.table.title().to_string(),
            checkboxes: rows.iter().map(|&i| self.table.is_selected(i)).collect(),
            header_check: self.table.page_check_state(),
            nrows: rows.len(),
            filtered: count,
            total: self.table.data().len(),
            selected_row: self.curser_row.saturating_sub(self.offset_row),
            selected_column: self.curser_column.min(table.len().saturating_sub(1)),
            table,
            pager: PagerView {
                page: pager.page(),
                total_pages: pager.total_pages(count),
                window: pager.page_window(count).collect(),
                page_size: pager.page_size(),
                is_first: pager.is_first(),
                is_last: pager.is_last(count),
            },
            search: self.table.search().to_string(),
            active_filters: self.table.active_filter_count(),
            selected_count: self.table.selection().len(),
            bulk_actions: if self.table.show_bulk_bar() {
                self.table
                    .actions()
                    .iter()
                    .map(|a| {
                        let label = match a.icon.as_deref() {
                            Some(icon) => format!("{icon} {}", a.name),
                            None => a.name.clone(),
                        };
                        (label, a.variant)
                    })
                    .collect()
            } else {
                Vec::new()
            },
            panel: self.build_panel(),
            show_popup: self.modus == Modus::Popup,
            popup_message: HELP_TEXT.to_string(),
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            cmd_prompt: self.cmd_prompt(),
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
            tooltip: self.focused_tooltip(),
            fullscreen: self.table.is_fullscreen(),
            refreshing: self.table.is_refreshing(),
            last_update: Instant::now(),
        };
    }

    fn build_columns(&self, rows: &[usize]) -> Vec<ColumnView> {
        let sort = self.table.sort();
        let mut columns = Vec::new();
        let mut visible_width = 0;
        for &key in self.table.visible_columns().iter().skip(self.offset_column) {
            let Some(cell) = self.table.column(key) else {
                error!("Trying to access column with unknown key {key}!");
                continue;
            };
            let name = format!("{}{}", cell.title_text(), sort.marker(key));
            let data: Vec<Segments> = rows
                .iter()
                .filter_map(|&i| self.table.data().get(i))
                .map(|row| {
                    cell.render_content(row)
                        .segments()
                        .into_iter()
                        .map(|(tone, s)| (tone, s.replace("\r\n", " ↵ ").replace('\n', " ↵ ")))
                        .collect()
                })
                .collect();
            let mut width = calculate_column_width(&name, &data, self.config.max_column_width);

            if visible_width + width > self.uilayout.table_width {
                // Add the last partial visible column
                if visible_width < self.uilayout.table_width && columns.is_empty() {
                    width = self.uilayout.table_width - visible_width;
                } else {
                    break;
                }
            }
            visible_width += width;
            columns.push(ColumnView {
                key,
                name,
                width,
                data,
            });
        }
        columns
    }

    fn build_panel(&self) -> Option<PanelView> {
        let panel = match self.modus {
            Modus::CmdInput => return self.panel_for(self.previous_modus),
            modus => self.panel_for(modus)?,
        };
        Some(panel)
    }

    fn panel_for(&self, modus: Modus) -> Option<PanelView> {
        let mut panel = match modus {
            Modus::Filters => PanelView {
                title: format!(" Filters ({} active) ", self.table.active_filter_count()),
                items: self
                    .table
                    .filter_configs()
                    .iter()
                    .map(|(key, config)| {
                        let value = self.table.filter_values().get(key);
                        let tone = if value.is_some() { Tone::Info } else { Tone::Muted };
                        PanelItem::new(config.label(), config.describe(value), tone)
                    })
                    .collect(),
                hint: self
                    .table
                    .filter_configs()
                    .get_index(self.panel_curser)
                    .map(|(_, c)| c.input_hint())
                    .unwrap_or_default(),
                drawer: self.table.drawer_filters(),
                ..Default::default()
            },
            Modus::Columns => PanelView {
                title: " Columns ".to_string(),
                items: self
                    .table
                    .column_manager()
                    .order()
                    .iter()
                    .filter_map(|&key| {
                        let cell = self.table.column(key)?;
                        let hidden = self.table.column_manager().is_hidden(key);
                        Some(PanelItem::new(
                            cell.title_text(),
                            if hidden { "hidden" } else { "shown" },
                            if hidden { Tone::Muted } else { Tone::Success },
                        ))
                    })
                    .collect(),
                hint: "space show/hide · K/J move · R reset".to_string(),
                ..Default::default()
            },
            Modus::Export => PanelView {
                title: " Export ".to_string(),
                items: self
                    .export_entries()
                    .into_iter()
                    .map(|(format, selected_only)| {
                        let scope = if selected_only {
                            format!("{} selected rows", self.table.selection().len())
                        } else {
                            format!("{} rows in view", self.table.filtered_count())
                        };
                        PanelItem::new(format.label(), scope, Tone::Plain)
                    })
                    .collect(),
                hint: format!("saved to {}", self.config.export_dir.display()),
                ..Default::default()
            },
            Modus::Bulk => PanelView {
                title: format!(" {} selected ", self.table.selection().len()),
                items: self
                    .table
                    .actions()
                    .iter()
                    .map(|a| {
                        let tone = match a.variant {
                            ActionVariant::Default => Tone::Plain,
                            ActionVariant::Secondary => Tone::Info,
                            ActionVariant::Destructive => Tone::Danger,
                        };
                        PanelItem::new(a.name.clone(), a.tooltip.clone().unwrap_or_default(), tone)
                    })
                    .collect(),
                ..Default::default()
            },
            Modus::Record => {
                let data_idx = *self.table.view_indices().get(self.record_pos)?;
                let row = self.table.data().get(data_idx)?;
                PanelView {
                    title: format!(
                        " Record {}/{} ",
                        self.record_pos + 1,
                        self.table.filtered_count()
                    ),
                    items: self
                        .table
                        .column_manager()
                        .order()
                        .iter()
                        .filter_map(|&key| {
                            let cell = self.table.column(key)?;
                            let mut value = cell.content_text(row);
                            if let Some(tip) = cell.render_tooltip(row) {
                                value = format!("{value}  ({})", tip.flatten());
                            }
                            Some(PanelItem::new(cell.title_text(), value, Tone::Plain))
                        })
                        .collect(),
                    hint: "←/→ previous/next record · y copy · E edit".to_string(),
                    drawer: true,
                    ..Default::default()
                }
            }
            Modus::Table | Modus::Popup | Modus::CmdInput => return None,
        };
        panel.selected = self.panel_curser.min(panel.items.len().saturating_sub(1));
        Some(panel)
    }

    fn cmd_prompt(&self) -> String {
        match self.cmd_mode {
            Some(CMDMode::Search) => "/".to_string(),
            Some(CMDMode::FilterValue(idx)) => self
                .table
                .filter_configs()
                .get_index(idx)
                .map(|(_, c)| format!("{} [{}]: ", c.label(), c.input_hint()))
                .unwrap_or_default(),
            Some(CMDMode::FormField(field)) => self
                .form
                .as_ref()
                .and_then(|f| f.fields().get(field).copied())
                .map(|name| format!("{name}: "))
                .unwrap_or_default(),
            None => String::new(),
        }
    }

    fn focused_tooltip(&self) -> Option<String> {
        let row = self.table.data().get(self.current_data_idx()?)?;
        let cell = self.table.column(self.current_column_key()?)?;
        cell.render_tooltip(row).map(|c| c.flatten())
    }
}

fn calculate_column_width(name: &str, data: &[Segments], max_column_width: usize) -> usize {
    let content = data
        .iter()
        .map(|segments| segments.iter().map(|(_, s)| s.chars().count()).sum::<usize>())
        .max()
        .unwrap_or(0);
    let width = std::cmp::max(name.chars().count(), content) + COLUMN_WIDTH_MARGIN;
    std::cmp::min(width, max_column_width)
}

/// Quotes a cell for a comma separated clipboard row.
fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping || needs_escaping {
        out = format!("\"{out}\"");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{Content, DisplayCell, DisplayMap};
    use crate::filter::{FilterConfig, FilterConfigMap, FilterValue};
    use crate::prefs::{MemoryStorage, Preferences};
    use crate::record::FieldValue;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    #[derive(Debug, Clone, Serialize)]
    struct Bus {
        line: String,
        seats: f64,
    }

    impl Record for Bus {
        fn field(&self, name: &str) -> FieldValue {
            match name {
                "line" => self.line.as_str().into(),
                "seats" => self.seats.into(),
                _ => FieldValue::Null,
            }
        }

        fn values(&self) -> Vec<FieldValue> {
            vec![self.line.as_str().into(), self.seats.into()]
        }
    }

    struct BusForm;

    impl RowForm<Bus> for BusForm {
        fn fields(&self) -> &[&'static str] {
            &["Line", "Seats"]
        }

        fn values_of(&self, row: &Bus) -> Vec<String> {
            vec![row.line.clone(), row.seats.to_string()]
        }

        fn create(&self, values: &[String], _rows: &[Bus]) -> Result<Bus, TableError> {
            let seats = values[1]
                .parse()
                .map_err(|_| TableError::Validation("Seats must be a number".into()))?;
            Ok(Bus {
                line: values[0].clone(),
                seats,
            })
        }

        fn update(&self, _row: &Bus, values: &[String]) -> Result<Bus, TableError> {
            self.create(values, &[])
        }
    }

    fn model(n: usize) -> Model<Bus> {
        let data = (0..n)
            .map(|i| Bus {
                line: format!("L{i:02}"),
                seats: (20 + i) as f64,
            })
            .collect();
        let display = DisplayMap::from([
            (0, DisplayCell::new("Line", |b: &Bus| Content::text(b.line.clone()))),
            (
                1,
                DisplayCell::new("Seats", |b: &Bus| Content::Number(b.seats))
                    .with_tooltip(|b: &Bus| Content::text(format!("{} free", b.seats))),
            ),
        ]);
        let table = SmartTable::new(
            "Buses",
            data,
            display,
            Box::new(Preferences::new(MemoryStorage::new())),
        )
        .with_filters(FilterConfigMap::new().with("seats", FilterConfig::number_range("Seats", "seats")));
        Model::init(table, &TableConfig::default(), 100, 30).with_form(Some(Box::new(BusForm)))
    }

    fn send(model: &mut Model<Bus>, msg: Message) {
        model.update(Some(msg)).unwrap();
    }

    fn type_line(model: &mut Model<Bus>, text: &str) {
        for c in text.chars() {
            send(model, Message::RawKey(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)));
        }
        send(model, Message::RawKey(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
    }

    #[test]
    fn paging_moves_the_cursor_across_pages() {
        let mut m = model(25);
        send(&mut m, Message::MoveEnd);
        assert_eq!(m.get_uidata().selected_row, 9);
        send(&mut m, Message::MoveDown);
        assert_eq!(m.get_uidata().pager.page, 2);
        assert_eq!(m.get_uidata().selected_row, 0);
        send(&mut m, Message::LastPage);
        assert_eq!(m.get_uidata().nrows, 5);
        assert_eq!(m.get_uidata().pager.window, vec![1, 2, 3]);
        assert!(m.get_uidata().pager.is_last);
    }

    #[test]
    fn search_filters_while_typing_and_escape_restores() {
        let mut m = model(25);
        send(&mut m, Message::Search);
        assert!(m.raw_keyevents());
        send(&mut m, Message::RawKey(KeyEvent::new(KeyCode::Char('L'), KeyModifiers::NONE)));
        send(&mut m, Message::RawKey(KeyEvent::new(KeyCode::Char('1'), KeyModifiers::NONE)));
        assert_eq!(m.get_uidata().filtered, 10);
        send(&mut m, Message::RawKey(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(!m.raw_keyevents());
        assert_eq!(m.get_uidata().filtered, 25);
    }

    #[test]
    fn filter_panel_applies_typed_range() {
        let mut m = model(25);
        send(&mut m, Message::Filters);
        assert!(m.get_uidata().panel.is_some());
        send(&mut m, Message::Enter);
        type_line(&mut m, "40..");
        assert_eq!(m.get_uidata().filtered, 5);
        assert_eq!(m.get_uidata().active_filters, 1);
        // The panel survives the edit and keeps the value after closing.
        assert!(m.get_uidata().panel.is_some());
        send(&mut m, Message::Exit);
        assert!(m.get_uidata().panel.is_none());
        assert_eq!(m.get_uidata().filtered, 5);
    }

    #[test]
    fn first_frame_shows_rows_before_any_event() {
        let m = model(25);
        assert_eq!(m.get_uidata().nrows, 10);
        assert_eq!(m.get_uidata().total, 25);
        assert_eq!(m.get_uidata().pager.page, 1);
    }

    #[test]
    fn editing_a_restored_filter_starts_from_its_value() {
        let mut m = model(25);
        m.table.set_filter(
            "seats",
            FilterValue::NumberRange {
                min: Some(40.0),
                max: None,
            },
        );
        send(&mut m, Message::Filters);
        send(&mut m, Message::Enter);
        assert_eq!(m.input.get().input, "40..");
        type_line(&mut m, "");
        assert_eq!(m.get_uidata().filtered, 5);
    }

    #[test]
    fn selection_shows_bulk_bar_only_with_actions() {
        let mut m = model(5);
        send(&mut m, Message::ToggleSelect);
        assert_eq!(m.get_uidata().selected_count, 1);
        assert!(m.get_uidata().checkboxes[0]);
        assert!(m.get_uidata().bulk_actions.is_empty());
        send(&mut m, Message::TogglePageSelection);
        assert_eq!(m.get_uidata().header_check, CheckState::Checked);
    }

    #[test]
    fn column_manager_hides_columns() {
        let mut m = model(5);
        assert_eq!(m.get_uidata().table.len(), 2);
        send(&mut m, Message::Columns);
        send(&mut m, Message::MoveDown);
        send(&mut m, Message::ToggleSelect);
        send(&mut m, Message::Exit);
        assert_eq!(m.get_uidata().table.len(), 1);
        assert_eq!(m.get_uidata().table[0].name, "Line ▲");
    }

    #[test]
    fn tooltip_follows_focused_cell() {
        let mut m = model(5);
        assert_eq!(m.get_uidata().tooltip, None);
        send(&mut m, Message::MoveRight);
        assert_eq!(m.get_uidata().tooltip.as_deref(), Some("20 free"));
    }

    #[test]
    fn form_reports_validation_in_status_line() {
        let mut m = model(3);
        send(&mut m, Message::AddRow);
        type_line(&mut m, "L99");
        type_line(&mut m, "many");
        assert_eq!(m.get_uidata().status_message, "Seats must be a number");
        assert_eq!(m.get_uidata().total, 3);

        send(&mut m, Message::AddRow);
        type_line(&mut m, "L99");
        type_line(&mut m, "12");
        assert_eq!(m.get_uidata().total, 4);
    }

    #[test]
    fn record_drawer_lists_every_column() {
        let mut m = model(3);
        send(&mut m, Message::Enter);
        let panel = m.get_uidata().panel.clone().unwrap();
        assert!(panel.drawer);
        assert_eq!(panel.items.len(), 2);
        assert_eq!(panel.items[1].value, "20  (20 free)");
        send(&mut m, Message::MoveRight);
        let panel = m.get_uidata().panel.clone().unwrap();
        assert_eq!(panel.items[0].value, "L01");
    }

    #[test]
    fn wraps_csv_cells() {
        assert_eq!(wrap_cell_content("plain"), "plain");
        assert_eq!(wrap_cell_content("a b"), "\"a b\"");
        assert_eq!(wrap_cell_content("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
