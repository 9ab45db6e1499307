use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::domain::TableError;

/// Checkbox state of the "select all on page" header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Checked,
    Indeterminate,
    Unchecked,
}

impl CheckState {
    pub fn symbol(&self) -> &'static str {
        match self {
            CheckState::Checked => "[x]",
            CheckState::Indeterminate => "[-]",
            CheckState::Unchecked => "[ ]",
        }
    }
}

/// Selected row identifiers. Ids outlive filtering: a row that is filtered
/// out of view stays selected until it is deselected or removed from the data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionManager {
    selected: HashSet<String>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &HashSet<String> {
        &self.selected
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn select(&mut self, id: impl Into<String>) {
        self.selected.insert(id.into());
    }

    pub fn deselect(&mut self, id: &str) {
        self.selected.remove(id);
    }

    /// Returns whether the row is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.selected.remove(id) {
            false
        } else {
            self.selected.insert(id.to_string());
            true
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn page_state<S: AsRef<str>>(&self, page_ids: &[S]) -> CheckState {
        let picked = page_ids
            .iter()
            .filter(|id| self.selected.contains(id.as_ref()))
            .count();
        match picked {
            0 => CheckState::Unchecked,
            n if n == page_ids.len() => CheckState::Checked,
            _ => CheckState::Indeterminate,
        }
    }

    /// Header checkbox click: a fully selected page is deselected, anything
    /// else selects every row of the page.
    pub fn toggle_page<S: AsRef<str>>(&mut self, page_ids: &[S]) {
        if self.page_state(page_ids) == CheckState::Checked {
            for id in page_ids {
                self.selected.remove(id.as_ref());
            }
        } else {
            for id in page_ids {
                self.selected.insert(id.as_ref().to_string());
            }
        }
        trace!("Page toggle, {} rows selected", self.selected.len());
    }

    /// Selected rows looked up in the full, unfiltered data.
    pub fn selected_rows<'a, T>(
        &self,
        data: &'a [T],
        row_id: impl Fn(&T, usize) -> String,
    ) -> Vec<&'a T> {
        data.iter()
            .enumerate()
            .filter(|(idx, row)| self.selected.contains(&row_id(row, *idx)))
            .map(|(_, row)| row)
            .collect()
    }

    /// Forgets ids that no longer belong to any row.
    pub fn retain_existing(&mut self, existing: &HashSet<String>) {
        self.selected.retain(|id| existing.contains(id));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionVariant {
    #[default]
    Default,
    Secondary,
    Destructive,
}

/// What the table does after a bulk action succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOutcome {
    Done,
    Message(String),
    /// Remove the selected rows from the data and clear the selection.
    Remove,
}

pub type BulkCallback<T> =
    Arc<dyn Fn(&[&T], &HashSet<String>) -> Result<BulkOutcome, TableError> + Send + Sync>;

/// A named operation over the current selection.
pub struct MultiSelectOption<T> {
    pub name: String,
    pub variant: ActionVariant,
    pub tooltip: Option<String>,
    pub icon: Option<String>,
    callback: BulkCallback<T>,
}

impl<T> Clone for MultiSelectOption<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            variant: self.variant,
            tooltip: self.tooltip.clone(),
            icon: self.icon.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> fmt::Debug for MultiSelectOption<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiSelectOption")
            .field("name", &self.name)
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

impl<T> MultiSelectOption<T> {
    pub fn new(
        name: impl Into<String>,
        callback: impl Fn(&[&T], &HashSet<String>) -> Result<BulkOutcome, TableError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            variant: ActionVariant::Default,
            tooltip: None,
            icon: None,
            callback: Arc::new(callback),
        }
    }

    pub fn variant(mut self, variant: ActionVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn run(&self, rows: &[&T], ids: &HashSet<String>) -> Result<BulkOutcome, TableError> {
        (self.callback)(rows, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_checkbox_reflects_page() {
        let mut sel = SelectionManager::new();
        let page = ["1", "2", "3"];
        assert_eq!(sel.page_state(&page), CheckState::Unchecked);
        sel.select("2");
        assert_eq!(sel.page_state(&page), CheckState::Indeterminate);
        sel.toggle_page(&page);
        assert_eq!(sel.page_state(&page), CheckState::Checked);
        sel.toggle_page(&page);
        assert_eq!(sel.page_state(&page), CheckState::Unchecked);
        assert!(sel.is_empty());
    }

    #[test]
    fn page_toggle_leaves_other_pages_alone() {
        let mut sel = SelectionManager::new();
        sel.select("9");
        sel.toggle_page(&["1", "2"]);
        sel.toggle_page(&["1", "2"]);
        assert!(sel.is_selected("9"));
        assert_eq!(sel.len(), 1);
        let empty: [&str; 0] = [];
        assert_eq!(sel.page_state(&empty), CheckState::Unchecked);
    }

    #[test]
    fn selected_rows_come_from_full_data() {
        let data = vec!["a", "b", "c", "d"];
        let mut sel = SelectionManager::new();
        assert!(sel.toggle("1"));
        sel.select("3");
        assert!(!sel.toggle("3"));
        sel.select("2");
        let rows = sel.selected_rows(&data, |_, idx| idx.to_string());
        assert_eq!(rows, vec![&"b", &"c"]);
    }

    #[test]
    fn removed_rows_drop_out_of_selection() {
        let mut sel = SelectionManager::new();
        sel.select("a");
        sel.select("gone");
        sel.retain_existing(&HashSet::from(["a".to_string()]));
        assert_eq!(sel.len(), 1);
        sel.clear();
        assert!(sel.is_empty());
    }

    #[test]
    fn bulk_action_receives_selection() {
        let action = MultiSelectOption::new("Count", |rows: &[&u32], ids: &HashSet<String>| {
            Ok(BulkOutcome::Message(format!("{} rows / {} ids", rows.len(), ids.len())))
        })
        .variant(ActionVariant::Secondary)
        .icon("#");
        let ids = HashSet::from(["0".to_string(), "1".to_string()]);
        let outcome = action.run(&[&1, &2], &ids).ok();
        assert_eq!(outcome, Some(BulkOutcome::Message("2 rows / 2 ids".to_string())));
        assert_eq!(action.icon.as_deref(), Some("#"));
    }
}
