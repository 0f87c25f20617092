use std::collections::BTreeSet;

use super::TaskId;

/// Task ids checked for bulk operations. Membership only, no order.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: BTreeSet<TaskId>,
}

impl Selection {
    pub fn toggle(&mut self, id: &str, checked: bool) {
        if checked {
            self.ids.insert(id.to_string());
        } else {
            self.ids.remove(id);
        }
    }

    /// Add every id in `ids` (union with the current selection).
    pub fn select_all<I, T>(&mut self, ids: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.ids.extend(ids.into_iter().map(Into::into));
    }

    /// Remove the given ids, or everything when `ids` is `None`.
    pub fn clear(&mut self, ids: Option<&[TaskId]>) {
        match ids {
            Some(ids) => {
                for id in ids {
                    self.ids.remove(id);
                }
            }
            None => self.ids.clear(),
        }
    }

    /// Keep only the ids for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.ids.retain(|id| keep(id));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.ids.iter().cloned().collect()
    }
}
