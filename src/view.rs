//! Sorting by rendered column text and the paged window over it.

use std::cmp::Ordering;
use std::ops::{Range, RangeInclusive};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::display::DisplayMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// Sort column and direction. `key == None` is the initial, unsorted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub key: Option<usize>,
    pub dir: SortDir,
}

impl SortState {
    pub fn new(key: usize, dir: SortDir) -> Self {
        Self {
            key: Some(key),
            dir,
        }
    }

    /// Header click: ascending, descending, then back to initial for the same
    /// column; a different column always starts ascending.
    pub fn cycle(self, column: usize) -> Self {
        match (self.key, self.dir) {
            (Some(k), SortDir::Asc) if k == column => SortState::new(column, SortDir::Desc),
            (Some(k), SortDir::Desc) if k == column => SortState {
                key: None,
                dir: SortDir::Asc,
            },
            _ => SortState::new(column, SortDir::Asc),
        }
    }

    /// Marker shown next to a header title.
    pub fn marker(&self, column: usize) -> &'static str {
        match (self.key, self.dir) {
            (Some(k), SortDir::Asc) if k == column => " ▲",
            (Some(k), SortDir::Desc) if k == column => " ▼",
            _ => "",
        }
    }
}

/// Orders `indices` (positions in `data`) by the sort column. Columns without
/// an explicit comparator compare their flattened rendered text as plain
/// strings. The sort is stable in both directions.
pub fn sort_indices<T>(
    data: &[T],
    indices: &[usize],
    columns: &DisplayMap<T>,
    sort: &SortState,
) -> Vec<usize> {
    let mut sorted = indices.to_vec();
    let Some(cell) = sort.key.and_then(|k| columns.get(&k)) else {
        return sorted;
    };

    match cell.comparator() {
        Some(compare) => sorted.sort_by(|&a, &b| directed(compare(&data[a], &data[b]), sort.dir)),
        None => {
            // Render every key once instead of twice per comparison.
            let mut keyed: Vec<(usize, String)> = sorted
                .iter()
                .map(|&idx| (idx, cell.content_text(&data[idx])))
                .collect();
            keyed.sort_by(|(_, a), (_, b)| directed(a.cmp(b), sort.dir));
            sorted = keyed.into_iter().map(|(idx, _)| idx).collect();
        }
    }
    trace!("Sorted {} rows by column {:?} {:?}", sorted.len(), sort.key, sort.dir);
    sorted
}

fn directed(ord: Ordering, dir: SortDir) -> Ordering {
    match dir {
        SortDir::Asc => ord,
        SortDir::Desc => ord.reverse(),
    }
}

/// Page number (1 based) and page size of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page: usize,
    page_size: usize,
}

pub const PAGE_SIZES: &[usize] = &[5, 10, 20, 50, 100];

impl Default for Pager {
    fn default() -> Self {
        Self::new(10)
    }
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self, count: usize) -> usize {
        count.div_ceil(self.page_size).max(1)
    }

    /// Keeps the page inside `[1, total_pages]`.
    pub fn clamp(&mut self, count: usize) {
        self.page = self.page.clamp(1, self.total_pages(count));
    }

    pub fn set_page(&mut self, page: usize, count: usize) {
        self.page = page;
        self.clamp(count);
    }

    /// Changing the size always returns to the first page.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    pub fn reset(&mut self) {
        self.page = 1;
    }

    pub fn first(&mut self) {
        self.page = 1;
    }

    pub fn previous(&mut self, count: usize) {
        self.set_page(self.page.saturating_sub(1), count);
    }

    pub fn next(&mut self, count: usize) {
        self.set_page(self.page + 1, count);
    }

    pub fn last(&mut self, count: usize) {
        self.page = self.total_pages(count);
    }

    /// Slice bounds of the current page within `count` sorted rows.
    pub fn page_range(&self, count: usize) -> Range<usize> {
        let start = ((self.page - 1) * self.page_size).min(count);
        let end = (self.page * self.page_size).min(count);
        start..end
    }

    /// Numbered page buttons: up to two pages either side of the current one.
    pub fn page_window(&self, count: usize) -> RangeInclusive<usize> {
        let total = self.total_pages(count);
        let page = self.page.min(total);
        page.saturating_sub(2).max(1)..=(page + 2).min(total)
    }

    pub fn is_first(&self) -> bool {
        self.page <= 1
    }

    pub fn is_last(&self, count: usize) -> bool {
        self.page >= self.total_pages(count)
    }
}

/// Next larger or smaller entry of [`PAGE_SIZES`].
pub fn step_page_size(current: usize, grow: bool) -> usize {
    if grow {
        PAGE_SIZES
            .iter()
            .copied()
            .find(|&s| s > current)
            .unwrap_or(current)
    } else {
        PAGE_SIZES
            .iter()
            .rev()
            .copied()
            .find(|&s| s < current)
            .unwrap_or(current)
    }
}
