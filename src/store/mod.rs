pub mod fs;
#[cfg(test)]
pub mod memory;

use std::path::PathBuf;

use chrono::NaiveDate;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::board::{
    NewTask, ProjectId, Status, Task, TaskFilter, TaskId, TaskPatch, TeamSummary, UserSummary,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("toml deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(".tasklane directory not found (walk up from {0})")]
    NotFound(PathBuf),
    #[error("invalid task file {path}: {reason}")]
    InvalidTask { path: PathBuf, reason: String },
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),
    #[error("unknown project: {0}")]
    UnknownProject(ProjectId),
    #[error("task store unavailable: {0}")]
    Unavailable(String),
}

/// A cross-column drop: the task's new status plus the full new ordering
/// of both columns it touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub from: Status,
    pub to: Status,
    pub dest_order: Vec<TaskId>,
    pub source_order: Vec<TaskId>,
}

/// The task store the board synchronizes with.
///
/// Calls are issued after the board has already applied its optimistic
/// change; an `Err` never rolls anything back by itself.
pub trait TaskStore {
    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError>;

    fn create_task(&self, new: NewTask) -> Result<Task, StoreError>;

    fn patch_task(&self, id: &str, patch: &TaskPatch) -> Result<Task, StoreError>;

    fn bulk_patch_tasks(&self, ids: &[TaskId], patch: &TaskPatch) -> Result<(), StoreError>;

    fn bulk_set_due_date(&self, ids: &[TaskId], date: Option<NaiveDate>) -> Result<(), StoreError>;

    fn reorder_column(
        &self,
        project_id: &str,
        status: Status,
        ordered_ids: &[TaskId],
    ) -> Result<(), StoreError>;

    fn bulk_delete_tasks(&self, ids: &[TaskId]) -> Result<(), StoreError>;

    fn list_users(&self) -> Result<Vec<UserSummary>, StoreError>;

    fn list_teams(&self) -> Result<Vec<TeamSummary>, StoreError>;

    /// Persist a cross-column drop.
    ///
    /// The default issues three calls in order: status patch, destination
    /// reorder, source reorder, and stops at the first failure. Both
    /// reorders are idempotent and may be replayed alone; the status patch
    /// must land before the destination reorder is replayed. Stores that
    /// can commit all three at once should override this.
    fn move_task(&self, project_id: &str, id: &str, req: &MoveRequest) -> Result<(), StoreError> {
        self.patch_task(id, &TaskPatch::status(req.to))?;
        self.reorder_column(project_id, req.to, &req.dest_order)?;
        self.reorder_column(project_id, req.from, &req.source_order)?;
        Ok(())
    }
}

/// Whether `task` passes every filter in `filter`.
///
/// `users` and `teams` resolve the lead filter: a task matches when its
/// assigned user reports to the lead, or its assigned team is led by them.
pub fn task_matches(
    task: &Task,
    filter: &TaskFilter,
    users: &[UserSummary],
    teams: &[TeamSummary],
    matcher: &SkimMatcherV2,
) -> bool {
    if task.project_id != filter.project_id {
        return false;
    }
    if filter.status.is_some_and(|s| task.status != s) {
        return false;
    }
    if filter.priority.is_some_and(|p| task.priority != p) {
        return false;
    }
    if let Some(assignee) = &filter.assignee {
        if !task.is_assigned_to(assignee) {
            return false;
        }
    }
    if let Some(team) = &filter.team {
        if task.assigned_team_id.as_ref() != Some(team) {
            return false;
        }
    }
    if let Some(lead) = &filter.lead {
        let manages_user = task.assigned_user_id.as_ref().is_some_and(|uid| {
            users
                .iter()
                .any(|u| &u.id == uid && u.manager_id.as_ref() == Some(lead))
        });
        let leads_team = task.assigned_team_id.as_ref().is_some_and(|tid| {
            teams
                .iter()
                .any(|t| &t.id == tid && t.lead_id.as_ref() == Some(lead))
        });
        if !manages_user && !leads_team {
            return false;
        }
    }
    if let Some(query) = filter.search.as_deref().filter(|q| !q.is_empty()) {
        if matcher.fuzzy_match(&task.title, query).is_none() {
            return false;
        }
    }
    true
}
