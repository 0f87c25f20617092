use super::cache::TaskCache;
use super::{Status, TaskId};

/// Where a dragged task was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// Empty space in a column: append to its end.
    Column(Status),
    /// Another task: take its position in that task's column.
    Task(TaskId),
}

/// Drag gesture lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    /// Gesture active, nothing persisted yet.
    Dragging { task_id: TaskId },
    /// Local state already updated, store calls in flight.
    Reconciling { task_id: TaskId },
}

impl DragState {
    pub fn dragged(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Dragging { task_id } | Self::Reconciling { task_id } => Some(task_id),
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging { .. })
    }
}

/// The new column orderings produced by a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropPlan {
    pub task_id: TaskId,
    pub from: Status,
    pub to: Status,
    /// Index of the task in `dest_order`.
    pub index: usize,
    pub dest_order: Vec<TaskId>,
    /// New order of the source column. Equal to `dest_order` within a column.
    pub source_order: Vec<TaskId>,
    /// False when the drop leaves every ordering as it was.
    pub changed: bool,
}

impl DropPlan {
    pub fn is_cross_column(&self) -> bool {
        self.from != self.to
    }
}

/// Work out where `task_id` lands when released on `target`.
///
/// Returns `None` when the task is not cached, the target task is not
/// cached, or the task was dropped onto itself.
pub fn plan_drop(cache: &TaskCache, task_id: &str, target: &DropTarget) -> Option<DropPlan> {
    let from = cache.get(task_id)?.status;
    let (to, over) = match target {
        DropTarget::Column(status) => (*status, None),
        DropTarget::Task(id) if id == task_id => return None,
        DropTarget::Task(id) => (cache.get(id)?.status, Some(id.as_str())),
    };

    let source = cache.column_order(from);
    if from == to {
        let old = source.iter().position(|id| id == task_id)?;
        let mut order = source.clone();
        let moved = order.remove(old);
        // Same-column moves take the target's original index, then reinsert.
        let index = match over {
            Some(over) => source.iter().position(|id| id == over)?,
            None => order.len(),
        }
        .min(order.len());
        order.insert(index, moved);
        let changed = order != source;
        return Some(DropPlan {
            task_id: task_id.to_string(),
            from,
            to,
            index,
            source_order: order.clone(),
            dest_order: order,
            changed,
        });
    }

    let source_order: Vec<TaskId> = source.into_iter().filter(|id| id != task_id).collect();
    let mut dest_order = cache.column_order(to);
    let index = over
        .and_then(|over| dest_order.iter().position(|id| id == over))
        .unwrap_or(dest_order.len());
    dest_order.insert(index, task_id.to_string());
    Some(DropPlan {
        task_id: task_id.to_string(),
        from,
        to,
        index,
        dest_order,
        source_order,
        changed: true,
    })
}
