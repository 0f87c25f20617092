use std::collections::BTreeMap;

use super::{Status, Task};

/// Advisory per-status task limits for one project.
///
/// Exceeding a limit only flags the column; it never rejects a drop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WipLimits {
    limits: BTreeMap<Status, u32>,
}

impl WipLimits {
    pub fn get(&self, status: Status) -> Option<u32> {
        self.limits.get(&status).copied()
    }

    /// Set or clear a limit. Zero clears, since limits are positive.
    pub fn set(&mut self, status: Status, limit: Option<u32>) {
        match limit.filter(|l| *l > 0) {
            Some(l) => {
                self.limits.insert(status, l);
            }
            None => {
                self.limits.remove(&status);
            }
        }
    }

    /// Whether `count` tasks in `status` exceed its limit.
    pub fn is_over(&self, status: Status, count: usize) -> bool {
        self.get(status).is_some_and(|limit| count > limit as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Status, u32)> + '_ {
        self.limits.iter().map(|(s, l)| (*s, *l))
    }
}

impl FromIterator<(Status, u32)> for WipLimits {
    fn from_iter<I: IntoIterator<Item = (Status, u32)>>(iter: I) -> Self {
        let mut limits = Self::default();
        for (status, limit) in iter {
            limits.set(status, Some(limit));
        }
        limits
    }
}

/// One status column as derived from the task cache.
#[derive(Debug)]
pub struct ColumnView<'a> {
    pub status: Status,
    pub items: Vec<&'a Task>,
    pub count: usize,
    /// Completed subtasks over all subtasks in the column, as a percentage.
    /// Zero when the column has no subtasks.
    pub completion_pct: f64,
    pub wip_limit: Option<u32>,
    pub over_limit: bool,
}

/// Group `tasks` into one view per status, in board order.
pub fn project<'a>(tasks: &'a [Task], limits: &WipLimits) -> Vec<ColumnView<'a>> {
    Status::ALL
        .iter()
        .map(|&status| {
            let items: Vec<&Task> = tasks.iter().filter(|t| t.status == status).collect();
            let total: usize = items.iter().map(|t| t.subtasks.len()).sum();
            let done: usize = items.iter().map(|t| t.completed_subtasks()).sum();
            let completion_pct = if total == 0 {
                0.0
            } else {
                done as f64 * 100.0 / total as f64
            };
            let count = items.len();
            ColumnView {
                status,
                items,
                count,
                completion_pct,
                wip_limit: limits.get(status),
                over_limit: limits.is_over(status, count),
            }
        })
        .collect()
}
