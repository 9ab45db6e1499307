//! Row model loaded from CSV, Parquet or Arrow files.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, info};

use crate::display::{Content, DisplayCell, DisplayMap, Tone};
use crate::domain::TableError;
use crate::filter::{FilterConfig, FilterConfigMap};
use crate::record::{FieldValue, Record};

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    Csv,
    Parquet,
    Arrow,
}

#[derive(Debug)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
    file_type: FileType,
}

/// Value kind of a loaded column, decides its filter editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Boolean,
    Temporal,
    Text,
}

/// Text columns with at most this many distinct values get a select filter.
const MAX_SELECT_OPTIONS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    /// Distinct values by descending frequency, only kept for small sets.
    pub options: Vec<String>,
}

/// One row of a loaded file. Field names are shared by all rows.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    names: Arc<Vec<String>>,
    values: Vec<FieldValue>,
}

impl DataRecord {
    pub fn new(names: Arc<Vec<String>>, values: Vec<FieldValue>) -> Self {
        Self { names, values }
    }

    pub fn get(&self, idx: usize) -> &FieldValue {
        self.values.get(idx).unwrap_or(&FieldValue::Null)
    }
}

impl Record for DataRecord {
    fn field(&self, name: &str) -> FieldValue {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.get(idx).clone())
            .unwrap_or(FieldValue::Null)
    }

    fn values(&self) -> Vec<FieldValue> {
        self.values.clone()
    }
}

impl Serialize for DataRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.names.len()))?;
        for (name, value) in self.names.iter().zip(self.values.iter()) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Rows and schema of one loaded file.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<DataRecord>,
}

impl LoadedTable {
    /// One column per field, rendering the raw value.
    pub fn display_map(&self) -> DisplayMap<DataRecord> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, info)| {
                let kind = info.kind;
                let cell = DisplayCell::new(info.name.as_str(), move |row: &DataRecord| {
                    match (kind, row.get(idx)) {
                        (_, FieldValue::Null) => Content::styled(Tone::Muted, Content::text("∅")),
                        (ColumnKind::Boolean, FieldValue::Bool(true)) => {
                            Content::styled(Tone::Success, Content::text("yes"))
                        }
                        (ColumnKind::Boolean, FieldValue::Bool(false)) => {
                            Content::styled(Tone::Muted, Content::text("no"))
                        }
                        (_, value) => Content::text(value.to_string()),
                    }
                });
                let cell = if info.kind == ColumnKind::Numeric {
                    cell.with_compare(move |a: &DataRecord, b: &DataRecord| {
                        let a = a.get(idx).as_number().unwrap_or(f64::NEG_INFINITY);
                        let b = b.get(idx).as_number().unwrap_or(f64::NEG_INFINITY);
                        a.total_cmp(&b)
                    })
                } else {
                    cell
                };
                (idx, cell)
            })
            .collect()
    }

    /// A filter per column, keyed by the stringified column index.
    pub fn filter_config(&self) -> FilterConfigMap<DataRecord> {
        let mut configs = FilterConfigMap::new();
        for (idx, info) in self.columns.iter().enumerate() {
            let label = info.name.as_str();
            let field = info.name.as_str();
            let config = match info.kind {
                ColumnKind::Numeric => FilterConfig::number_range(label, field),
                ColumnKind::Boolean => FilterConfig::boolean(label, field),
                ColumnKind::Temporal => FilterConfig::date_range(label, field),
                ColumnKind::Text if !info.options.is_empty() => {
                    FilterConfig::select(label, field, info.options.clone(), true)
                }
                ColumnKind::Text => FilterConfig::text(label, field),
            };
            configs.insert(idx.to_string(), config);
        }
        configs
    }
}

pub fn load_data_file(path: PathBuf) -> Result<LoadedTable, TableError> {
    let file_info = get_file_info(path)?;
    debug!("Loading {:?}", file_info);
    let frame = match file_info.file_type {
        FileType::Csv => load_csv(&file_info.path)?,
        FileType::Parquet => load_parquet(&file_info.path)?,
        FileType::Arrow => load_arrow(&file_info.path)?,
    };

    // Columns are converted in parallel, one rayon task per column.
    let start_time = Instant::now();
    let df = frame.collect()?;
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let converted: Result<Vec<(ColumnInfo, Vec<FieldValue>)>, PolarsError> = names
        .par_iter()
        .map(|name| load_column(&df, name))
        .collect();
    let converted = converted?;
    let nrows = df.height();

    let names = Arc::new(names);
    let mut rows: Vec<Vec<FieldValue>> = (0..nrows)
        .map(|_| Vec::with_capacity(names.len()))
        .collect();
    let mut columns = Vec::with_capacity(converted.len());
    for (info, values) in converted {
        for (row, value) in rows.iter_mut().zip(values) {
            row.push(value);
        }
        columns.push(info);
    }
    let rows = rows
        .into_iter()
        .map(|values| DataRecord::new(Arc::clone(&names), values))
        .collect::<Vec<_>>();

    info!(
        "Loaded {} rows x {} columns from {} ({} bytes) in {}ms",
        rows.len(),
        columns.len(),
        file_info.path.display(),
        file_info.file_size,
        start_time.elapsed().as_millis()
    );

    let name = file_info
        .path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string();
    Ok(LoadedTable {
        name,
        columns,
        rows,
    })
}

fn detect_file_type(path: &Path) -> Result<FileType, TableError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::Csv),
        Some("PARQUET") | Some("PQ") => Ok(FileType::Parquet),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::Arrow),
        _ => Err(TableError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, TableError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TableError::FileNotFound,
        ErrorKind::PermissionDenied => TableError::PermissionDenied,
        _ => TableError::Io(e),
    })?;
    if !metadata.is_file() {
        return Err(TableError::LoadingFailed("Not a file!".into()));
    }
    let file_type = detect_file_type(&path)?;
    Ok(FileInfo {
        path,
        file_size: metadata.len(),
        file_type,
    })
}

fn column_kind(dtype: &DataType) -> ColumnKind {
    match dtype {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float32
        | DataType::Float64 => ColumnKind::Numeric,
        DataType::Boolean => ColumnKind::Boolean,
        DataType::Date | DataType::Datetime(_, _) => ColumnKind::Temporal,
        _ => ColumnKind::Text,
    }
}

/// Header names that hint at a date column stored as text.
fn looks_temporal(name: &str) -> bool {
    let name = name.to_lowercase();
    ["date", "time", "updated", "update", "expiry", "since"]
        .iter()
        .any(|hint| name.contains(hint))
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<(ColumnInfo, Vec<FieldValue>), PolarsError> {
    let column = df.column(col_name)?;
    let mut kind = column_kind(column.dtype());

    let values: Vec<FieldValue> = match kind {
        ColumnKind::Numeric => {
            let cast = column.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| v.map(FieldValue::Number).unwrap_or(FieldValue::Null))
                .collect()
        }
        ColumnKind::Boolean => column
            .bool()?
            .into_iter()
            .map(|v| v.map(FieldValue::Bool).unwrap_or(FieldValue::Null))
            .collect(),
        ColumnKind::Temporal | ColumnKind::Text => {
            let cast = column.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| match v {
                    Some(s) => FieldValue::Text(s.replace("\r\n", " ↵ ").replace('\n', " ↵ ")),
                    None => FieldValue::Null,
                })
                .collect()
        }
    };

    if kind == ColumnKind::Text && looks_temporal(col_name) {
        kind = ColumnKind::Temporal;
    }
    let options = if kind == ColumnKind::Text {
        value_counts(&values)
            .filter(|counts| counts.len() <= MAX_SELECT_OPTIONS)
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    Ok((
        ColumnInfo {
            name: col_name.to_string(),
            kind,
            options,
        },
        values,
    ))
}

/// Distinct non-null values, most frequent first. `None` for empty columns.
fn value_counts(values: &[FieldValue]) -> Option<Vec<String>> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in values.iter().filter(|v| !v.is_null()) {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    if counts.is_empty() {
        return None;
    }
    let mut sorted: Vec<(usize, String)> = counts.into_iter().map(|(k, v)| (v, k)).collect();
    sorted.sort_unstable_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    Some(sorted.into_iter().map(|(_, v)| v).collect())
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .with_try_parse_dates(true)
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_follows_extension() {
        assert_eq!(detect_file_type(Path::new("a.csv")).ok(), Some(FileType::Csv));
        assert_eq!(detect_file_type(Path::new("a.PQ")).ok(), Some(FileType::Parquet));
        assert_eq!(detect_file_type(Path::new("a.feather")).ok(), Some(FileType::Arrow));
        assert!(matches!(
            detect_file_type(Path::new("a.xlsx")),
            Err(TableError::UnknownFileType)
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            load_data_file(PathBuf::from("does/not/exist.csv")),
            Err(TableError::FileNotFound)
        ));
    }

    #[test]
    fn value_counts_orders_by_frequency() {
        let values: Vec<FieldValue> = ["b", "a", "b", "c", "b", "a"]
            .into_iter()
            .map(FieldValue::from)
            .chain([FieldValue::Null])
            .collect();
        assert_eq!(
            value_counts(&values),
            Some(vec!["b".to_string(), "a".to_string(), "c".to_string()])
        );
        assert_eq!(value_counts(&[FieldValue::Null]), None);
    }

    #[test]
    fn records_serialize_as_objects() -> Result<(), TableError> {
        let names = Arc::new(vec!["plate".to_string(), "speed".to_string()]);
        let row = DataRecord::new(names, vec!["MH12".into(), FieldValue::Number(62.0)]);
        assert_eq!(serde_json::to_string(&row)?, "{\"plate\":\"MH12\",\"speed\":62.0}");
        assert_eq!(row.field("speed"), FieldValue::Number(62.0));
        assert_eq!(row.field("missing"), FieldValue::Null);
        Ok(())
    }
}
