use std::collections::BTreeSet;

use tracing::{debug, trace};

/// Order and visibility of the columns of one table.
///
/// Columns are identified by their display-map key. `order` always holds
/// every known key exactly once, `hidden` is a subset of it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnManager {
    order: Vec<usize>,
    hidden: Vec<usize>,
    locked: BTreeSet<usize>,
}

impl ColumnManager {
    /// Natural order of the given keys, nothing hidden.
    pub fn new(keys: impl IntoIterator<Item = usize>) -> Self {
        let mut order: Vec<usize> = keys.into_iter().collect();
        order.sort_unstable();
        order.dedup();
        Self {
            order,
            hidden: Vec::new(),
            locked: BTreeSet::new(),
        }
    }

    /// Marks a column that can never be hidden, e.g. the selection column.
    pub fn with_locked(mut self, key: usize) -> Self {
        self.locked.insert(key);
        self.hidden.retain(|&k| k != key);
        self
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn hidden(&self) -> &[usize] {
        &self.hidden
    }

    pub fn is_hidden(&self, key: usize) -> bool {
        self.hidden.contains(&key)
    }

    /// Column order minus hidden columns, order preserved.
    pub fn visible(&self) -> Vec<usize> {
        self.order
            .iter()
            .copied()
            .filter(|k| !self.hidden.contains(k))
            .collect()
    }

    /// Drag and drop: takes the column at position `from` and drops it in
    /// front of the column at position `to` (`to == len` drops at the end).
    /// Dropping after the original position shifts the target left by one,
    /// since the dragged column was removed first.
    pub fn move_column(&mut self, from: usize, to: usize) -> bool {
        if from >= self.order.len() || to > self.order.len() || from == to {
            return false;
        }
        let key = self.order.remove(from);
        let target = if to > from { to - 1 } else { to };
        self.order.insert(target.min(self.order.len()), key);
        trace!("Moved column {key} from {from} to {target}: {:?}", self.order);
        true
    }

    /// Moves the column one step toward the front (`-1`) or back (`+1`).
    pub fn shift_column(&mut self, key: usize, step: isize) -> bool {
        let Some(from) = self.position(key) else {
            return false;
        };
        match step {
            s if s < 0 && from > 0 => self.move_column(from, from - 1),
            s if s > 0 && from + 1 < self.order.len() => self.move_column(from, from + 2),
            _ => false,
        }
    }

    pub fn position(&self, key: usize) -> Option<usize> {
        self.order.iter().position(|&k| k == key)
    }

    /// Hides a visible column or shows a hidden one. Locked and unknown
    /// columns are left alone.
    pub fn toggle_visibility(&mut self, key: usize) -> bool {
        let visible = self.is_hidden(key);
        self.set_visible(key, visible)
    }

    pub fn set_visible(&mut self, key: usize, visible: bool) -> bool {
        if !self.order.contains(&key) || (self.locked.contains(&key) && !visible) {
            return false;
        }
        if visible {
            self.hidden.retain(|&k| k != key);
        } else if !self.hidden.contains(&key) {
            self.hidden.push(key);
        }
        true
    }

    /// Adopts stored order and hidden lists, repaired against the columns the
    /// table currently has: unknown keys are dropped, new keys are appended in
    /// natural order.
    pub fn restore(&mut self, order: &[usize], hidden: &[usize]) {
        let known: BTreeSet<usize> = self.order.iter().copied().collect();
        let mut restored: Vec<usize> = Vec::with_capacity(known.len());
        for key in order {
            if known.contains(key) && !restored.contains(key) {
                restored.push(*key);
            }
        }
        for key in &known {
            if !restored.contains(key) {
                restored.push(*key);
            }
        }
        if restored != order {
            debug!("Stored column order {order:?} repaired to {restored:?}");
        }
        self.order = restored;
        self.hidden = hidden
            .iter()
            .copied()
            .filter(|k| known.contains(k) && !self.locked.contains(k))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
    }

    /// Natural ascending order, nothing hidden.
    pub fn reset(&mut self) {
        self.order.sort_unstable();
        self.hidden.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_is_order_minus_hidden() {
        let mut cm = ColumnManager::new(0..6);
        cm.move_column(4, 0);
        cm.toggle_visibility(2);
        cm.toggle_visibility(4);
        assert_eq!(cm.order(), &[4, 0, 1, 2, 3, 5]);
        assert_eq!(cm.visible(), vec![0, 1, 3, 5]);
        cm.toggle_visibility(4);
        assert_eq!(cm.visible(), vec![4, 0, 1, 3, 5]);
    }

    #[test]
    fn dropping_after_origin_accounts_for_removal() {
        let mut cm = ColumnManager::new(0..5);
        assert!(cm.move_column(0, 3));
        assert_eq!(cm.order(), &[1, 2, 0, 3, 4]);
        assert!(cm.move_column(0, 5));
        assert_eq!(cm.order(), &[2, 0, 3, 4, 1]);
        assert!(!cm.move_column(2, 2));
        assert!(!cm.move_column(9, 0));
    }

    #[test]
    fn shift_moves_one_step() {
        let mut cm = ColumnManager::new(0..3);
        assert!(cm.shift_column(0, 1));
        assert_eq!(cm.order(), &[1, 0, 2]);
        assert!(cm.shift_column(2, -1));
        assert_eq!(cm.order(), &[1, 2, 0]);
        assert!(!cm.shift_column(0, 1));
        assert!(!cm.shift_column(1, -1));
    }

    #[test]
    fn locked_column_cannot_be_hidden() {
        let mut cm = ColumnManager::new(0..3).with_locked(0);
        assert!(!cm.toggle_visibility(0));
        assert!(cm.toggle_visibility(1));
        assert_eq!(cm.visible(), vec![0, 2]);
    }

    #[test]
    fn restore_repairs_against_current_columns() {
        let mut cm = ColumnManager::new(0..4);
        cm.restore(&[3, 9, 1, 3], &[1, 9]);
        assert_eq!(cm.order(), &[3, 1, 0, 2]);
        assert_eq!(cm.hidden(), &[1]);
        cm.reset();
        assert_eq!(cm.order(), &[0, 1, 2, 3]);
        assert!(cm.hidden().is_empty());
    }
}
