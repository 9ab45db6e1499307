//! Declarative per-field filters and the global search.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use derive_setters::Setters;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::display::Content;
use crate::record::{FieldValue, Record};

/// Sentinel select/text value meaning "no restriction".
pub const ANY: &str = "any";
/// Tristate value of a boolean filter that lets every row through.
pub const ALL: &str = "all";

/// Current value of one filter control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum FilterValue {
    Text(String),
    Many(Vec<String>),
    Bool(bool),
    NumberRange { min: Option<f64>, max: Option<f64> },
    DateRange { from: Option<String>, to: Option<String> },
    Custom(serde_json::Value),
}

impl FilterValue {
    /// Empty values are skipped by the engine: blank text, the `any`
    /// sentinel, empty selections and unbounded ranges.
    pub fn is_empty(&self) -> bool {
        match self {
            FilterValue::Text(s) => s.is_empty() || s == ANY,
            FilterValue::Many(v) => v.is_empty(),
            FilterValue::Bool(_) => false,
            FilterValue::NumberRange { min, max } => min.is_none() && max.is_none(),
            FilterValue::DateRange { from, to } => {
                from.as_deref().is_none_or(str::is_empty) && to.as_deref().is_none_or(str::is_empty)
            }
            FilterValue::Custom(v) => match v {
                serde_json::Value::Null => true,
                serde_json::Value::String(s) => s.is_empty() || s == ANY,
                serde_json::Value::Array(a) => a.is_empty(),
                _ => false,
            },
        }
    }
}

pub type Predicate<T> = Arc<dyn Fn(&T, &FilterValue) -> bool + Send + Sync>;
pub type Editor = Arc<dyn Fn(&FilterValue) -> Content + Send + Sync>;

/// How one filter control behaves and how it tests a row.
pub enum FilterConfig<T> {
    Text {
        label: String,
        field: String,
    },
    Select {
        label: String,
        field: String,
        options: Vec<String>,
        multiple: bool,
    },
    Boolean {
        label: String,
        field: String,
    },
    NumberRange {
        label: String,
        field: String,
    },
    DateRange {
        label: String,
        field: String,
    },
    Custom {
        label: String,
        editor: Option<Editor>,
        predicate: Predicate<T>,
    },
}

impl<T> Clone for FilterConfig<T> {
    fn clone(&self) -> Self {
        match self {
            FilterConfig::Text { label, field } => FilterConfig::Text {
                label: label.clone(),
                field: field.clone(),
            },
            FilterConfig::Select {
                label,
                field,
                options,
                multiple,
            } => FilterConfig::Select {
                label: label.clone(),
                field: field.clone(),
                options: options.clone(),
                multiple: *multiple,
            },
            FilterConfig::Boolean { label, field } => FilterConfig::Boolean {
                label: label.clone(),
                field: field.clone(),
            },
            FilterConfig::NumberRange { label, field } => FilterConfig::NumberRange {
                label: label.clone(),
                field: field.clone(),
            },
            FilterConfig::DateRange { label, field } => FilterConfig::DateRange {
                label: label.clone(),
                field: field.clone(),
            },
            FilterConfig::Custom {
                label,
                editor,
                predicate,
            } => FilterConfig::Custom {
                label: label.clone(),
                editor: editor.clone(),
                predicate: Arc::clone(predicate),
            },
        }
    }
}

impl<T> FilterConfig<T> {
    pub fn text(label: impl Into<String>, field: impl Into<String>) -> Self {
        FilterConfig::Text {
            label: label.into(),
            field: field.into(),
        }
    }

    pub fn select(
        label: impl Into<String>,
        field: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
        multiple: bool,
    ) -> Self {
        FilterConfig::Select {
            label: label.into(),
            field: field.into(),
            options: options.into_iter().map(Into::into).collect(),
            multiple,
        }
    }

    pub fn boolean(label: impl Into<String>, field: impl Into<String>) -> Self {
        FilterConfig::Boolean {
            label: label.into(),
            field: field.into(),
        }
    }

    pub fn number_range(label: impl Into<String>, field: impl Into<String>) -> Self {
        FilterConfig::NumberRange {
            label: label.into(),
            field: field.into(),
        }
    }

    pub fn date_range(label: impl Into<String>, field: impl Into<String>) -> Self {
        FilterConfig::DateRange {
            label: label.into(),
            field: field.into(),
        }
    }

    pub fn custom(
        label: impl Into<String>,
        predicate: impl Fn(&T, &FilterValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        FilterConfig::Custom {
            label: label.into(),
            editor: None,
            predicate: Arc::new(predicate),
        }
    }

    /// Attaches a summary renderer to a custom filter. Other kinds are
    /// returned unchanged.
    pub fn with_editor(self, render: impl Fn(&FilterValue) -> Content + Send + Sync + 'static) -> Self {
        match self {
            FilterConfig::Custom {
                label, predicate, ..
            } => FilterConfig::Custom {
                label,
                editor: Some(Arc::new(render)),
                predicate,
            },
            other => other,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FilterConfig::Text { label, .. }
            | FilterConfig::Select { label, .. }
            | FilterConfig::Boolean { label, .. }
            | FilterConfig::NumberRange { label, .. }
            | FilterConfig::DateRange { label, .. }
            | FilterConfig::Custom { label, .. } => label,
        }
    }

    /// Short description of the value syntax the line editor expects.
    pub fn input_hint(&self) -> String {
        match self {
            FilterConfig::Text { .. } => "words, all must match".to_string(),
            FilterConfig::Select {
                options, multiple, ..
            } => {
                let sep = if *multiple { ", several with ','" } else { "" };
                format!("one of {}{sep}", options.join("|"))
            }
            FilterConfig::Boolean { .. } => "all | true | false".to_string(),
            FilterConfig::NumberRange { .. } => "min..max, either side optional".to_string(),
            FilterConfig::DateRange { .. } => "YYYY-MM-DD..YYYY-MM-DD, either side optional".to_string(),
            FilterConfig::Custom { .. } => "free text".to_string(),
        }
    }

    /// Turns what the user typed into the value shape of this filter kind.
    pub fn parse_input(&self, input: &str) -> FilterValue {
        let input = input.trim();
        match self {
            FilterConfig::Text { .. } => FilterValue::Text(input.to_string()),
            FilterConfig::Select { multiple: true, .. } => FilterValue::Many(
                input
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            FilterConfig::Select { .. } => FilterValue::Text(input.to_string()),
            FilterConfig::Boolean { .. } => match input.to_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => FilterValue::Bool(true),
                "false" | "no" | "n" | "0" => FilterValue::Bool(false),
                _ => FilterValue::Text(ALL.to_string()),
            },
            FilterConfig::NumberRange { .. } => {
                let (min, max) = split_range(input);
                FilterValue::NumberRange {
                    min: min.and_then(|s| s.parse().ok()),
                    max: max.and_then(|s| s.parse().ok()),
                }
            }
            FilterConfig::DateRange { .. } => {
                let (from, to) = split_range(input);
                FilterValue::DateRange {
                    from: from.map(str::to_string),
                    to: to.map(str::to_string),
                }
            }
            FilterConfig::Custom { .. } => {
                if input.is_empty() {
                    FilterValue::Custom(serde_json::Value::Null)
                } else {
                    FilterValue::Custom(serde_json::Value::String(input.to_string()))
                }
            }
        }
    }

    /// Human readable summary of a value, used by the filter panel.
    pub fn describe(&self, value: Option<&FilterValue>) -> String {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return ANY.to_string();
        };
        if let FilterConfig::Custom {
            editor: Some(editor),
            ..
        } = self
        {
            return editor(value).flatten();
        }
        describe_value(value)
    }

    /// Text for the line editor that `parse_input` turns back into `value`.
    pub fn input_text(&self, value: Option<&FilterValue>) -> String {
        value
            .filter(|v| !v.is_empty())
            .map(describe_value)
            .unwrap_or_default()
    }
}

fn describe_value(value: &FilterValue) -> String {
    match value {
        FilterValue::Text(s) => s.clone(),
        FilterValue::Many(v) => v.join(", "),
        FilterValue::Bool(b) => b.to_string(),
        FilterValue::NumberRange { min, max } => format!(
            "{}..{}",
            min.map(|n| n.to_string()).unwrap_or_default(),
            max.map(|n| n.to_string()).unwrap_or_default()
        ),
        FilterValue::DateRange { from, to } => format!(
            "{}..{}",
            from.as_deref().unwrap_or_default(),
            to.as_deref().unwrap_or_default()
        ),
        FilterValue::Custom(v) => match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

/// Splits `a..b` into its optional halves. Without `..` the whole input is the
/// lower bound.
fn split_range(input: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(s: &str) -> Option<&str> {
        let s = s.trim();
        (!s.is_empty()).then_some(s)
    }
    match input.split_once("..") {
        Some((lo, hi)) => (non_empty(lo), non_empty(hi)),
        None => (non_empty(input), None),
    }
}

/// Filter descriptors keyed by filter id, in insertion order.
pub struct FilterConfigMap<T> {
    entries: Vec<(String, FilterConfig<T>)>,
}

impl<T> Default for FilterConfigMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Clone for FilterConfigMap<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T> FilterConfigMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the descriptor stored under `key`.
    pub fn insert(&mut self, key: impl Into<String>, config: FilterConfig<T>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = config,
            None => self.entries.push((key, config)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, config: FilterConfig<T>) -> Self {
        self.insert(key, config);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FilterConfig<T>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, c)| c)
    }

    pub fn get_index(&self, idx: usize) -> Option<(&str, &FilterConfig<T>)> {
        self.entries.get(idx).map(|(k, c)| (k.as_str(), c))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterConfig<T>)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type FilterValues = BTreeMap<String, FilterValue>;

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct FilterOptions {
    /// Offset in which dates without a zone and day bounds are interpreted.
    pub reference_offset: FixedOffset,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            reference_offset: Utc.fix(),
        }
    }
}

/// Browser `Date.toString()` output and similar zoned forms.
const ZONED_FORMATS: &[&str] = &[
    "%A %B %d %Y %H:%M:%S GMT%z",
    "%B %d %Y %H:%M:%S GMT%z",
    "%Y-%m-%d %H:%M:%S %z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %I:%M %p",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%B %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%A %B %d %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%A %B %d %Y",
];

/// Permissive date parsing. Values without a zone are read in `offset`.
pub fn parse_date(input: &str, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // "GMT+0530 (India Standard Time)" carries a zone name after the offset.
    let s = match s.find(" (") {
        Some(pos) if s.ends_with(')') => s[..pos].trim_end(),
        _ => s,
    };
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    let upper = s.to_uppercase();
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&upper, fmt) {
            return localize(naive, offset);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&upper, fmt) {
            return localize(date.and_time(NaiveTime::MIN), offset);
        }
    }
    None
}

fn localize(naive: NaiveDateTime, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Last millisecond of the calendar day `instant` falls on in `offset`.
fn end_of_day(instant: DateTime<Utc>, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    let local_day = instant.with_timezone(offset).date_naive();
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?;
    localize(local_day.and_time(last), offset)
}

fn field_date(value: &FieldValue, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    match value {
        FieldValue::Text(s) => parse_date(s, offset),
        FieldValue::Number(ms) => DateTime::from_timestamp_millis(*ms as i64),
        _ => None,
    }
}

/// Whether `row` passes one filter. Values whose shape does not fit the
/// filter kind impose no restriction.
pub fn matches<T: Record>(
    row: &T,
    config: &FilterConfig<T>,
    value: &FilterValue,
    options: &FilterOptions,
) -> bool {
    if value.is_empty() {
        return true;
    }
    match config {
        FilterConfig::Text { field, .. } => match value {
            FilterValue::Text(needle) => {
                let haystack = row.field(field).to_string().to_lowercase();
                needle
                    .to_lowercase()
                    .split_whitespace()
                    .all(|token| haystack.contains(token))
            }
            _ => true,
        },
        FilterConfig::Select {
            field, multiple, ..
        } => {
            let actual = row.field(field).to_string();
            match value {
                FilterValue::Many(selected) => selected.iter().any(|s| *s == actual),
                FilterValue::Text(selected) if *multiple => {
                    selected.split(',').map(str::trim).any(|s| s == actual)
                }
                FilterValue::Text(selected) => *selected == actual,
                _ => true,
            }
        }
        FilterConfig::Boolean { field, .. } => {
            let wanted = match value {
                FilterValue::Bool(b) => Some(*b),
                FilterValue::Text(s) if s == "true" => Some(true),
                FilterValue::Text(s) if s == "false" => Some(false),
                _ => None,
            };
            match wanted {
                Some(b) => row.field(field).as_bool() == Some(b),
                None => true,
            }
        }
        FilterConfig::NumberRange { field, .. } => match value {
            FilterValue::NumberRange { min, max } => match row.field(field).as_number() {
                Some(n) => min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi),
                None => false,
            },
            _ => true,
        },
        FilterConfig::DateRange { field, .. } => match value {
            FilterValue::DateRange { from, to } => {
                let offset = &options.reference_offset;
                let Some(date) = field_date(&row.field(field), offset) else {
                    return true;
                };
                let lower = from.as_deref().and_then(|s| parse_date(s, offset));
                let upper = to
                    .as_deref()
                    .and_then(|s| parse_date(s, offset))
                    .and_then(|d| end_of_day(d, offset));
                lower.is_none_or(|lo| date >= lo) && upper.is_none_or(|hi| date <= hi)
            }
            _ => true,
        },
        FilterConfig::Custom { predicate, .. } => predicate(row, value),
    }
}

/// Global search over the joined values of a row.
pub fn matches_search<T: Record>(row: &T, search: &str) -> bool {
    search.is_empty() || row.search_text().to_lowercase().contains(search)
}

/// Indexes into `data` of every row that passes the search and all active
/// filters, in data order.
pub fn filter_indices<T: Record + Sync>(
    data: &[T],
    search: &str,
    configs: &FilterConfigMap<T>,
    values: &FilterValues,
    options: &FilterOptions,
) -> Vec<usize> {
    let search = search.to_lowercase();
    let active: Vec<(&FilterConfig<T>, &FilterValue)> = configs
        .iter()
        .filter_map(|(key, config)| {
            values
                .get(key)
                .filter(|v| !v.is_empty())
                .map(|v| (config, v))
        })
        .collect();

    let indices: Vec<usize> = data
        .par_iter()
        .enumerate()
        .filter(|(_, row)| {
            matches_search(*row, &search)
                && active
                    .iter()
                    .all(|(config, value)| matches(*row, *config, *value, options))
        })
        .map(|(idx, _)| idx)
        .collect();

    trace!(
        "Filtered {} of {} rows with {} active filters",
        indices.len(),
        data.len(),
        active.len()
    );
    indices
}

/// Row references version of [`filter_indices`].
pub fn apply_filters<'a, T: Record + Sync>(
    data: &'a [T],
    search: &str,
    configs: &FilterConfigMap<T>,
    values: &FilterValues,
    options: &FilterOptions,
) -> Vec<&'a T> {
    filter_indices(data, search, configs, values, options)
        .into_iter()
        .map(|idx| &data[idx])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Reading {
        plate: String,
        status: String,
        speed: FieldValue,
        ignition: bool,
        last_update: String,
    }

    impl Record for Reading {
        fn field(&self, name: &str) -> FieldValue {
            match name {
                "plate" => self.plate.as_str().into(),
                "status" => self.status.as_str().into(),
                "speed" => self.speed.clone(),
                "ignition" => self.ignition.into(),
                "lastUpdate" => self.last_update.as_str().into(),
                _ => FieldValue::Null,
            }
        }

        fn values(&self) -> Vec<FieldValue> {
            vec![
                self.plate.as_str().into(),
                self.status.as_str().into(),
                self.speed.clone(),
                self.ignition.into(),
                self.last_update.as_str().into(),
            ]
        }
    }

    fn reading(plate: &str, status: &str, speed: f64, ignition: bool, last_update: &str) -> Reading {
        Reading {
            plate: plate.to_string(),
            status: status.to_string(),
            speed: FieldValue::Number(speed),
            ignition,
            last_update: last_update.to_string(),
        }
    }

    fn fleet() -> Vec<Reading> {
        vec![
            reading("MH12 AB 1001", "Parked", 0.0, false, "2025-10-16"),
            reading("MH12 AB 1002", "Idle", 48.0, true, "2025-10-17 09:15 AM"),
            reading("KA01 ZZ 2003", "Moving", 62.0, true, "2025-10-17T23:59:00+05:30"),
            reading("DL04 CX 3004", "Moving", 71.0, true, "not a date"),
        ]
    }

    fn configs() -> FilterConfigMap<Reading> {
        FilterConfigMap::new()
            .with("plate", FilterConfig::text("Plate", "plate"))
            .with(
                "status",
                FilterConfig::select("Status", "status", ["Parked", "Idle", "Moving"], true),
            )
            .with("ignition", FilterConfig::boolean("Ignition", "ignition"))
            .with("speed", FilterConfig::number_range("Speed", "speed"))
            .with("lastUpdate", FilterConfig::date_range("Last update", "lastUpdate"))
    }

    fn run(data: &[Reading], values: &FilterValues) -> Vec<String> {
        apply_filters(data, "", &configs(), values, &FilterOptions::default())
            .into_iter()
            .map(|r| r.plate.clone())
            .collect()
    }

    fn single(key: &str, value: FilterValue) -> FilterValues {
        FilterValues::from([(key.to_string(), value)])
    }

    #[test]
    fn min_speed_keeps_only_faster_vehicles() {
        let values = single(
            "speed",
            FilterValue::NumberRange {
                min: Some(50.0),
                max: None,
            },
        );
        assert_eq!(run(&fleet(), &values), vec!["KA01 ZZ 2003", "DL04 CX 3004"]);
    }

    #[test]
    fn number_range_drops_non_numeric_fields() {
        let mut data = fleet();
        data[0].speed = FieldValue::Text("n/a".to_string());
        let values = single(
            "speed",
            FilterValue::NumberRange {
                min: None,
                max: Some(100.0),
            },
        );
        assert_eq!(run(&data, &values).len(), 3);
    }

    #[test]
    fn date_range_end_is_inclusive_through_end_of_day() {
        let values = single(
            "lastUpdate",
            FilterValue::DateRange {
                from: None,
                to: Some("2025-10-17".to_string()),
            },
        );
        let plates = run(&fleet(), &values);
        assert!(plates.contains(&"KA01 ZZ 2003".to_string()));
        assert!(plates.contains(&"MH12 AB 1002".to_string()));
    }

    #[test]
    fn date_range_lets_unparseable_dates_through() {
        let values = single(
            "lastUpdate",
            FilterValue::DateRange {
                from: Some("2025-10-17".to_string()),
                to: None,
            },
        );
        assert_eq!(
            run(&fleet(), &values),
            vec!["MH12 AB 1002", "KA01 ZZ 2003", "DL04 CX 3004"]
        );
    }

    #[test]
    fn boolean_all_or_unset_excludes_nothing() {
        assert_eq!(run(&fleet(), &FilterValues::new()).len(), 4);
        let values = single("ignition", FilterValue::Text(ALL.to_string()));
        assert_eq!(run(&fleet(), &values).len(), 4);
    }

    #[test]
    fn boolean_requires_strict_value() {
        let values = single("ignition", FilterValue::Text("false".to_string()));
        assert_eq!(run(&fleet(), &values), vec!["MH12 AB 1001"]);
        let values = single("ignition", FilterValue::Bool(true));
        assert_eq!(run(&fleet(), &values).len(), 3);
    }

    #[test]
    fn text_filter_requires_every_token() {
        let values = single("plate", FilterValue::Text("ab mh12".to_string()));
        assert_eq!(run(&fleet(), &values), vec!["MH12 AB 1001", "MH12 AB 1002"]);
        let values = single("plate", FilterValue::Text("ab ka01".to_string()));
        assert!(run(&fleet(), &values).is_empty());
    }

    #[test]
    fn select_matches_exactly_or_from_set() {
        let values = single("status", FilterValue::Many(vec!["Idle".into(), "Parked".into()]));
        assert_eq!(run(&fleet(), &values), vec!["MH12 AB 1001", "MH12 AB 1002"]);
        let values = single("status", FilterValue::Text("Mov".to_string()));
        assert!(run(&fleet(), &values).is_empty());
        let values = single("status", FilterValue::Text(ANY.to_string()));
        assert_eq!(run(&fleet(), &values).len(), 4);
    }

    #[test]
    fn custom_filter_delegates_to_predicate() {
        let configs = FilterConfigMap::new().with(
            "fast",
            FilterConfig::custom("Fast", |r: &Reading, v: &FilterValue| {
                matches!(v, FilterValue::Custom(serde_json::Value::Bool(true)))
                    && r.speed.as_number().is_some_and(|s| s > 60.0)
            }),
        );
        let values = single("fast", FilterValue::Custom(serde_json::Value::Bool(true)));
        let data = fleet();
        let rows = apply_filters(&data, "", &configs, &values, &FilterOptions::default());
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn search_matches_any_value_case_insensitive() {
        let data = fleet();
        let rows = apply_filters(
            &data,
            "MOVING",
            &configs(),
            &FilterValues::new(),
            &FilterOptions::default(),
        );
        assert_eq!(rows.len(), 2);
        let rows = apply_filters(&data, "true", &configs(), &FilterValues::new(), &FilterOptions::default());
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn filtering_twice_changes_nothing() {
        let values = FilterValues::from([
            ("plate".to_string(), FilterValue::Text("a".to_string())),
            (
                "speed".to_string(),
                FilterValue::NumberRange {
                    min: Some(10.0),
                    max: None,
                },
            ),
        ]);
        let opts = FilterOptions::default();
        let data = fleet();
        let once: Vec<Reading> = apply_filters(&data, "m", &configs(), &values, &opts)
            .into_iter()
            .cloned()
            .collect();
        let twice: Vec<Reading> = apply_filters(&once, "m", &configs(), &values, &opts)
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn parse_date_accepts_dashboard_formats() {
        let utc = FilterOptions::default().reference_offset;
        let am = parse_date("2025-10-17 09:15 am", &utc).map(|d| d.to_rfc3339());
        assert_eq!(am.as_deref(), Some("2025-10-17T09:15:00+00:00"));
        let pm = parse_date("2025-10-17 09:15 PM", &utc).map(|d| d.to_rfc3339());
        assert_eq!(pm.as_deref(), Some("2025-10-17T21:15:00+00:00"));
        assert!(parse_date("2025-10-17", &utc).is_some());
        assert!(parse_date("next tuesday", &utc).is_none());
    }

    #[test]
    fn parse_date_accepts_browser_formats() {
        let utc = FilterOptions::default().reference_offset;
        let day = |s: &str| parse_date(s, &utc).map(|d| d.to_rfc3339());
        let midnight = Some("2025-10-17T00:00:00+00:00".to_string());
        assert_eq!(day("10/17/2025"), midnight);
        assert_eq!(day("Oct 17, 2025"), midnight);
        assert_eq!(day("17 Oct 2025"), midnight);
        assert_eq!(
            day("October 17, 2025 09:15").as_deref(),
            Some("2025-10-17T09:15:00+00:00")
        );
        assert_eq!(
            day("Fri Oct 17 2025 09:15:00 GMT+0530").as_deref(),
            Some("2025-10-17T03:45:00+00:00")
        );
        assert_eq!(
            day("Fri Oct 17 2025 09:15:00 GMT+0530 (India Standard Time)").as_deref(),
            Some("2025-10-17T03:45:00+00:00")
        );
    }

    #[test]
    fn date_range_excludes_slash_dates_before_the_bound() {
        let mut data = fleet();
        data[0].last_update = "10/01/2024".to_string();
        data[1].last_update = "2024-10-01".to_string();
        data[2].last_update = "Oct 17, 2025".to_string();
        data[3].last_update = "17 Oct 2025".to_string();
        let values = single(
            "lastUpdate",
            FilterValue::DateRange {
                from: Some("2025-01-01".to_string()),
                to: None,
            },
        );
        assert_eq!(run(&data, &values), vec!["KA01 ZZ 2003", "DL04 CX 3004"]);
    }

    #[test]
    fn parse_input_follows_filter_kind() {
        let range: FilterConfig<Reading> = FilterConfig::number_range("Speed", "speed");
        assert_eq!(
            range.parse_input("50.."),
            FilterValue::NumberRange {
                min: Some(50.0),
                max: None
            }
        );
        let flag: FilterConfig<Reading> = FilterConfig::boolean("Ignition", "ignition");
        assert_eq!(flag.parse_input("whatever"), FilterValue::Text(ALL.to_string()));
        let many: FilterConfig<Reading> = FilterConfig::select("S", "status", ["a", "b"], true);
        assert_eq!(
            many.parse_input("a, b,"),
            FilterValue::Many(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(many.describe(None), ANY);
    }
}
