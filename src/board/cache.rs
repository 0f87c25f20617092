use super::{Status, Task, TaskFilter, TaskId, TaskPatch};
use crate::store::{StoreError, TaskStore};

/// The in-memory task list behind one board view.
///
/// Column order is the order of tasks sharing a status within `tasks`.
/// Loads replace the list wholesale; optimistic edits patch entries by id.
#[derive(Debug, Default)]
pub struct TaskCache {
    tasks: Vec<Task>,
    filter: TaskFilter,
}

impl TaskCache {
    pub fn new(filter: TaskFilter) -> Self {
        Self { tasks: Vec::new(), filter }
    }

    /// Replace the cache with the store's answer for `filter`.
    ///
    /// On error the previous contents and filter are kept.
    pub fn load<S: TaskStore>(&mut self, store: &S, filter: TaskFilter) -> Result<(), StoreError> {
        let tasks = store.list_tasks(&filter)?;
        tracing::debug!(project = %filter.project_id, count = tasks.len(), "task cache loaded");
        self.replace(tasks, filter);
        Ok(())
    }

    pub fn replace(&mut self, tasks: Vec<Task>, filter: TaskFilter) {
        self.tasks = tasks;
        self.filter = filter;
    }

    /// The filters the current contents were loaded with.
    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Merge `patch` into every entry whose id is in `ids`.
    /// Returns how many entries were touched.
    pub fn apply_local(&mut self, ids: &[TaskId], patch: &TaskPatch) -> usize {
        let mut touched = 0;
        for task in self.tasks.iter_mut().filter(|t| ids.contains(&t.id)) {
            patch.apply(task);
            task.touch();
            touched += 1;
        }
        touched
    }

    /// Remove every entry whose id is in `ids`. Returns how many were removed.
    pub fn remove(&mut self, ids: &[TaskId]) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !ids.contains(&t.id));
        before - self.tasks.len()
    }

    /// Append a task created elsewhere (lands at the end of its column).
    pub fn insert(&mut self, task: Task) {
        if let Some(existing) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *existing = task;
        } else {
            self.tasks.push(task);
        }
    }

    /// Ids of the tasks in `status`, in column order.
    pub fn column_order(&self, status: Status) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.id.clone())
            .collect()
    }

    /// Rearrange the `status` column to follow `order`.
    ///
    /// Only the slots already holding that column's tasks are permuted, so
    /// other columns keep their order. Ids in `order` that are not in the
    /// column are ignored; column tasks missing from `order` keep their
    /// relative order after the listed ones.
    pub fn set_column_order(&mut self, status: Status, order: &[TaskId]) {
        let slots: Vec<usize> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status == status)
            .map(|(i, _)| i)
            .collect();
        let mut column: Vec<Task> = slots.iter().map(|&i| self.tasks[i].clone()).collect();
        let mut arranged = Vec::with_capacity(column.len());
        for id in order {
            if let Some(pos) = column.iter().position(|t| &t.id == id) {
                arranged.push(column.remove(pos));
            }
        }
        arranged.extend(column);
        for (slot, task) in slots.into_iter().zip(arranged) {
            self.tasks[slot] = task;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::test_support::task;
    use crate::board::Priority;
    use crate::store::memory::MemoryStore;

    fn cache(tasks: Vec<Task>) -> TaskCache {
        let mut c = TaskCache::new(TaskFilter::for_project("p1"));
        c.replace(tasks, TaskFilter::for_project("p1"));
        c
    }

    #[test]
    fn test_load_replaces_contents_and_filter() {
        let store = MemoryStore::with_tasks(vec![task("a", Status::ToDo), task("b", Status::Done)]);
        let mut c = cache(vec![task("stale", Status::ToDo)]);
        let mut filter = TaskFilter::for_project("p1");
        filter.status = Some(Status::Done);
        c.load(&store, filter.clone()).unwrap();
        assert_eq!(c.column_order(Status::Done), vec!["b"]);
        assert!(!c.contains("stale"));
        assert_eq!(c.filter(), &filter);
    }

    #[test]
    fn test_load_failure_keeps_previous_contents() {
        let store = MemoryStore::with_tasks(vec![task("a", Status::ToDo)]);
        store.fail_next(1);
        let mut c = cache(vec![task("old", Status::ToDo)]);
        assert!(c.load(&store, TaskFilter::for_project("p1")).is_err());
        assert!(c.contains("old"));
    }

    #[test]
    fn test_apply_local_leaves_other_entries_untouched() {
        let mut c = cache(vec![task("a", Status::ToDo), task("b", Status::ToDo)]);
        let patch = TaskPatch { priority: Some(Priority::Critical), ..TaskPatch::default() };
        assert_eq!(c.apply_local(&["a".to_string()], &patch), 1);
        assert_eq!(c.get("a").unwrap().priority, Priority::Critical);
        assert_eq!(c.get("b").unwrap().priority, Priority::Medium);
    }

    #[test]
    fn test_remove_by_ids() {
        let mut c = cache(vec![task("a", Status::ToDo), task("b", Status::ToDo), task("c", Status::Done)]);
        assert_eq!(c.remove(&["a".to_string(), "c".to_string(), "zz".to_string()]), 2);
        assert_eq!(c.len(), 1);
        assert!(c.contains("b"));
    }

    #[test]
    fn test_set_column_order_only_permutes_that_column() {
        let mut c = cache(vec![
            task("a", Status::ToDo),
            task("x", Status::Done),
            task("b", Status::ToDo),
            task("c", Status::ToDo),
        ]);
        c.set_column_order(Status::ToDo, &["c".into(), "a".into(), "b".into()]);
        assert_eq!(c.column_order(Status::ToDo), vec!["c", "a", "b"]);
        assert_eq!(c.tasks()[1].id, "x");
    }

    #[test]
    fn test_set_column_order_ignores_foreign_and_keeps_missing() {
        let mut c = cache(vec![task("a", Status::ToDo), task("b", Status::ToDo), task("c", Status::ToDo)]);
        c.set_column_order(Status::ToDo, &["c".into(), "ghost".into()]);
        assert_eq!(c.column_order(Status::ToDo), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_insert_appends_to_end_of_column() {
        let mut c = cache(vec![task("a", Status::ToDo)]);
        c.insert(task("n", Status::ToDo));
        assert_eq!(c.column_order(Status::ToDo), vec!["a", "n"]);
    }
}
