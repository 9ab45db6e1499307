use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("io error: {0}")]
    Io(#[from] Error),
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("unknown file type")]
    UnknownFileType,
    #[error("{0}")]
    Validation(String),
    #[error("clipboard error: {0}")]
    Clipboard(String),
    #[error("refresh failed: {0}")]
    Refresh(String),
    #[error("export failed: {0}")]
    Export(String),
}

/// Runtime configuration of the dashboard, assembled from the command line.
#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct TableConfig {
    /// Milliseconds to wait for a terminal event before redrawing.
    pub event_poll_time: u64,
    pub max_column_width: usize,
    /// Page size used when nothing is stored yet.
    pub page_size: usize,
    #[setters(strip_option)]
    pub storage_path: Option<PathBuf>,
    pub export_dir: PathBuf,
    pub drawer_filters: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 28,
            page_size: 10,
            storage_path: None,
            export_dir: PathBuf::from("."),
            drawer_filters: false,
        }
    }
}

/// Which line-input the command line is currently feeding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Search,
    FilterValue(usize),
    FormField(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MoveBeginning,
    MoveEnd,
    FirstPage,
    PreviousPage,
    NextPage,
    LastPage,
    PageSizeUp,
    PageSizeDown,
    Enter,
    Exit,
    Help,
    Search,
    Filters,
    ClearFilters,
    Columns,
    ExportMenu,
    BulkActions,
    Sort,
    ToggleSelect,
    TogglePageSelection,
    ClearSelection,
    MoveColumnUp,
    MoveColumnDown,
    ResetPreferences,
    Fullscreen,
    Refresh,
    CopyCell,
    CopyRow,
    AddRow,
    EditRow,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
Navigation
  ↑/k ↓/j        move row        ←/h →/l   move column
  g / G          first / last row on page
  n / p          next / previous page
  N / P          last / first page
  + / -          grow / shrink page size

Table
  /              search all columns
  f              filter panel      F   clear all filters
  s              cycle sort (asc, desc, initial) on column
  c              column manager    e   export menu
  space          toggle row        a   toggle page selection
  x              clear selection   b   bulk actions
  enter          record drawer     z   fullscreen
  r              refresh           y / Y  copy cell / row
  A / E          add row / edit focused row

Panels
  ↑ ↓            choose entry      enter  edit filter, export, run action
  x              clear the chosen filter

Column manager
  ↑ ↓            choose column     space  show / hide
  K / J          move column up / down
  R              reset table preferences

Command line
  enter accept   esc cancel   ctrl-w delete word   ctrl-u clear

q quit    esc close panel";
