//! In-memory task store for controller tests: records every call and can be
//! told to fail the next few of them.

use std::cell::RefCell;

use chrono::NaiveDate;
use fuzzy_matcher::skim::SkimMatcherV2;

use super::{task_matches, StoreError, TaskStore};
use crate::board::{
    NewTask, Status, Task, TaskFilter, TaskId, TaskPatch, TeamSummary, UserSummary,
};

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListTasks,
    CreateTask(String),
    PatchTask(TaskId, TaskPatchSummary),
    BulkPatch(Vec<TaskId>),
    BulkDueDate(Vec<TaskId>, Option<NaiveDate>),
    Reorder(Status, Vec<TaskId>),
    BulkDelete(Vec<TaskId>),
    ListUsers,
    ListTeams,
}

/// The status half of a patch, enough to tell drag calls apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPatchSummary {
    pub status: Option<Status>,
}

#[derive(Default)]
struct Inner {
    tasks: Vec<Task>,
    users: Vec<UserSummary>,
    teams: Vec<TeamSummary>,
    calls: Vec<Call>,
    fail_next: usize,
    next_id: u32,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RefCell<Inner>,
}

impl MemoryStore {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let store = Self::default();
        {
            let mut inner = store.inner.borrow_mut();
            inner.next_id = tasks.len() as u32 + 1;
            inner.tasks = tasks;
        }
        store
    }

    pub fn with_directory(self, users: Vec<UserSummary>, teams: Vec<TeamSummary>) -> Self {
        {
            let mut inner = self.inner.borrow_mut();
            inner.users = users;
            inner.teams = teams;
        }
        self
    }

    /// Make the next `n` calls fail with [`StoreError::Unavailable`].
    pub fn fail_next(&self, n: usize) {
        self.inner.borrow_mut().fail_next = n;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.borrow().calls.clone()
    }

    /// Drain the recorded calls.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.inner.borrow_mut().calls)
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.inner.borrow().tasks.iter().find(|t| t.id == id).cloned()
    }

    fn record(&self, call: Call) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push(call);
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn patch_many(&self, ids: &[TaskId], patch: &TaskPatch) {
        let mut inner = self.inner.borrow_mut();
        for task in inner.tasks.iter_mut().filter(|t| ids.contains(&t.id)) {
            patch.apply(task);
        }
    }
}

impl TaskStore for MemoryStore {
    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        self.record(Call::ListTasks)?;
        let inner = self.inner.borrow();
        let matcher = SkimMatcherV2::default();
        Ok(inner
            .tasks
            .iter()
            .filter(|t| task_matches(t, filter, &inner.users, &inner.teams, &matcher))
            .cloned()
            .collect())
    }

    fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        self.record(Call::CreateTask(new.title.clone()))?;
        let mut inner = self.inner.borrow_mut();
        let id = format!("m{}", inner.next_id);
        inner.next_id += 1;
        let mut task = Task::new(id, new.project_id, new.title);
        task.status = new.status;
        task.priority = new.priority;
        task.assigned_user_id = new.assigned_user_id;
        task.assigned_team_id = new.assigned_team_id;
        task.due_date = new.due_date;
        inner.tasks.push(task.clone());
        Ok(task)
    }

    fn patch_task(&self, id: &str, patch: &TaskPatch) -> Result<Task, StoreError> {
        self.record(Call::PatchTask(id.to_string(), TaskPatchSummary { status: patch.status }))?;
        let ids = [id.to_string()];
        self.patch_many(&ids, patch);
        self.task(id).ok_or_else(|| StoreError::UnknownTask(id.to_string()))
    }

    fn bulk_patch_tasks(&self, ids: &[TaskId], patch: &TaskPatch) -> Result<(), StoreError> {
        self.record(Call::BulkPatch(ids.to_vec()))?;
        self.patch_many(ids, patch);
        Ok(())
    }

    fn bulk_set_due_date(&self, ids: &[TaskId], date: Option<NaiveDate>) -> Result<(), StoreError> {
        self.record(Call::BulkDueDate(ids.to_vec(), date))?;
        let patch = TaskPatch { due_date: Some(date), ..TaskPatch::default() };
        self.patch_many(ids, &patch);
        Ok(())
    }

    fn reorder_column(
        &self,
        _project_id: &str,
        status: Status,
        ordered_ids: &[TaskId],
    ) -> Result<(), StoreError> {
        self.record(Call::Reorder(status, ordered_ids.to_vec()))
    }

    fn bulk_delete_tasks(&self, ids: &[TaskId]) -> Result<(), StoreError> {
        self.record(Call::BulkDelete(ids.to_vec()))?;
        self.inner.borrow_mut().tasks.retain(|t| !ids.contains(&t.id));
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<UserSummary>, StoreError> {
        self.record(Call::ListUsers)?;
        Ok(self.inner.borrow().users.clone())
    }

    fn list_teams(&self) -> Result<Vec<TeamSummary>, StoreError> {
        self.record(Call::ListTeams)?;
        Ok(self.inner.borrow().teams.clone())
    }
}
