//! Persisted table preferences.
//!
//! Preferences live in a flat string key-value storage, the way a browser's
//! local storage would hold them. Every table writes one JSON entry keyed by
//! its sanitized title, the page size is shared by all tables under one key.
//! Storage failures never reach the user: they are logged and the table keeps
//! working with in-memory state.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::domain::TableError;
use crate::filter::FilterValues;
use crate::view::{SortDir, SortState};

pub const GLOBAL_PAGE_SIZE_KEY: &str = "smartTable_globalPageSize";
pub const PREFERENCES_KEY_PREFIX: &str = "smartTable_preferences_";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TablePreferences {
    pub column_order: Vec<usize>,
    pub hidden_cols: Vec<usize>,
    pub filters: FilterValues,
    pub sort_key: Option<usize>,
    pub sort_dir: SortDir,
}

impl TablePreferences {
    pub fn sort(&self) -> SortState {
        SortState {
            key: self.sort_key,
            dir: self.sort_dir,
        }
    }
}

/// Lower-cases the title, replaces non-alphanumerics with `_` and collapses
/// runs of `_`.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}

pub fn preferences_key(title: &str) -> String {
    format!("{PREFERENCES_KEY_PREFIX}{}", sanitize_title(title))
}

/// Settings shared by every table instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalSetting {
    PageSize,
}

impl GlobalSetting {
    pub fn key(&self) -> &'static str {
        match self {
            GlobalSetting::PageSize => GLOBAL_PAGE_SIZE_KEY,
        }
    }
}

/// Synchronous string storage.
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, TableError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), TableError>;
    fn remove_item(&mut self, key: &str) -> Result<(), TableError>;
}

/// Storage that lives as long as the process. Used by tests and as the
/// fallback when no storage file can be located.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, TableError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), TableError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), TableError> {
        self.items.remove(key);
        Ok(())
    }
}

/// All keys in one JSON object file, re-read on every access so several
/// running dashboards see each other's writes.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/fleet-table/storage.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fleet-table").join("storage.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, TableError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, items: &BTreeMap<String, String>) -> Result<(), TableError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(items)?)?;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, TableError> {
        Ok(self.load()?.remove(key))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), TableError> {
        let mut items = self.load()?;
        items.insert(key.to_string(), value.to_string());
        self.save(&items)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), TableError> {
        let mut items = self.load()?;
        if items.remove(key).is_some() {
            self.save(&items)?;
        }
        Ok(())
    }
}

/// Per-table preference persistence, scoped by table title.
pub trait PreferencesStore: Send {
    fn get(&self, table_id: &str) -> Option<TablePreferences>;
    fn set(&mut self, table_id: &str, prefs: &TablePreferences);
    fn clear(&mut self, table_id: &str);
    fn global(&self, setting: GlobalSetting) -> Option<String>;
    fn set_global(&mut self, setting: GlobalSetting, value: &str);
}

/// [`PreferencesStore`] over any [`KeyValueStorage`]. Errors are logged and
/// swallowed.
#[derive(Debug, Clone, Default)]
pub struct Preferences<S> {
    storage: S,
}

impl<S: KeyValueStorage> Preferences<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

impl<S: KeyValueStorage + Send> PreferencesStore for Preferences<S> {
    fn get(&self, table_id: &str) -> Option<TablePreferences> {
        let key = preferences_key(table_id);
        let raw = match self.storage.get_item(&key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Failed to read table preferences {key}: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(prefs) => {
                trace!("Loaded preferences {key}");
                Some(prefs)
            }
            Err(e) => {
                warn!("Ignoring unreadable table preferences {key}: {e}");
                None
            }
        }
    }

    fn set(&mut self, table_id: &str, prefs: &TablePreferences) {
        let key = preferences_key(table_id);
        let result = serde_json::to_string(prefs)
            .map_err(TableError::from)
            .and_then(|raw| self.storage.set_item(&key, &raw));
        if let Err(e) = result {
            warn!("Failed to store table preferences {key}: {e}");
        }
    }

    fn clear(&mut self, table_id: &str) {
        let key = preferences_key(table_id);
        match self.storage.remove_item(&key) {
            Ok(()) => debug!("Cleared preferences {key}"),
            Err(e) => warn!("Failed to clear table preferences {key}: {e}"),
        }
    }

    fn global(&self, setting: GlobalSetting) -> Option<String> {
        self.storage
            .get_item(setting.key())
            .unwrap_or_else(|e| {
                warn!("Failed to read {}: {e}", setting.key());
                None
            })
    }

    fn set_global(&mut self, setting: GlobalSetting, value: &str) {
        if let Err(e) = self.storage.set_item(setting.key(), value) {
            warn!("Failed to store {}: {e}", setting.key());
        }
    }
}

/// Stored global page size, ignoring values that are not positive integers.
pub fn global_page_size(store: &dyn PreferencesStore) -> Option<usize> {
    store
        .global(GlobalSetting::PageSize)
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterValue;

    /// Storage whose every operation fails, like a full or locked disk.
    struct BrokenStorage;

    impl KeyValueStorage for BrokenStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>, TableError> {
            Err(TableError::PermissionDenied)
        }

        fn set_item(&mut self, _key: &str, _value: &str) -> Result<(), TableError> {
            Err(TableError::PermissionDenied)
        }

        fn remove_item(&mut self, _key: &str) -> Result<(), TableError> {
            Err(TableError::PermissionDenied)
        }
    }

    fn sample() -> TablePreferences {
        TablePreferences {
            column_order: vec![3, 0, 2, 1],
            hidden_cols: vec![2],
            filters: FilterValues::from([(
                "speed".to_string(),
                FilterValue::NumberRange {
                    min: Some(50.0),
                    max: None,
                },
            )]),
            sort_key: Some(3),
            sort_dir: SortDir::Desc,
        }
    }

    #[test]
    fn titles_sanitize_into_keys() {
        assert_eq!(sanitize_title("Vehicle List"), "vehicle_list");
        assert_eq!(sanitize_title("Admins -- (All)"), "admins_all_");
        assert_eq!(
            preferences_key("Fleet Documents"),
            "smartTable_preferences_fleet_documents"
        );
    }

    #[test]
    fn preferences_round_trip_through_storage() {
        let mut store = Preferences::new(MemoryStorage::new());
        store.set("Vehicles", &sample());
        assert_eq!(store.get("Vehicles"), Some(sample()));
        let raw = store
            .storage()
            .raw("smartTable_preferences_vehicles")
            .unwrap_or_default();
        assert!(raw.contains("\"columnOrder\":[3,0,2,1]"));
        assert!(raw.contains("\"sortDir\":\"desc\""));
        store.clear("Vehicles");
        assert_eq!(store.get("Vehicles"), None);
    }

    #[test]
    fn page_size_is_shared_and_validated() {
        let mut store = Preferences::new(MemoryStorage::new());
        assert_eq!(global_page_size(&store), None);
        store.set_global(GlobalSetting::PageSize, "20");
        assert_eq!(global_page_size(&store), Some(20));
        store.set_global(GlobalSetting::PageSize, "0");
        assert_eq!(global_page_size(&store), None);
        assert_eq!(store.storage().raw(GLOBAL_PAGE_SIZE_KEY), Some("0"));
    }

    #[test]
    fn broken_storage_degrades_to_defaults() {
        let mut store = Preferences::new(BrokenStorage);
        store.set("Vehicles", &sample());
        store.clear("Vehicles");
        store.set_global(GlobalSetting::PageSize, "20");
        assert_eq!(store.get("Vehicles"), None);
        assert_eq!(global_page_size(&store), None);
    }

    #[test]
    fn unreadable_entry_is_ignored() {
        let mut storage = MemoryStorage::new();
        storage
            .set_item("smartTable_preferences_vehicles", "{not json")
            .unwrap_or_default();
        let store = Preferences::new(storage);
        assert_eq!(store.get("Vehicles"), None);
    }

    #[test]
    fn file_storage_persists_between_instances() -> Result<(), TableError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("storage.json");
        let mut first = Preferences::new(FileStorage::new(&path));
        first.set("Vehicles", &sample());
        first.set_global(GlobalSetting::PageSize, "50");

        let second = Preferences::new(FileStorage::new(&path));
        assert_eq!(second.get("Vehicles"), Some(sample()));
        assert_eq!(global_page_size(&second), Some(50));
        Ok(())
    }
}
