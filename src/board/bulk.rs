use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;

use super::cache::TaskCache;
use super::{Priority, Status, Task, TaskId, TaskPatch, TeamId, UserId};
use crate::store::{StoreError, TaskStore};

/// Which field a bulk operation edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkField {
    Status,
    Priority,
    Assignee,
    Team,
    DueDate,
}

impl BulkField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Priority => "priority",
            Self::Assignee => "assignee",
            Self::Team => "team",
            Self::DueDate => "due",
        }
    }
}

impl std::str::FromStr for BulkField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "status" => Ok(Self::Status),
            "priority" => Ok(Self::Priority),
            "assignee" | "assign" | "user" => Ok(Self::Assignee),
            "team" => Ok(Self::Team),
            "due" | "due-date" | "duedate" => Ok(Self::DueDate),
            other => Err(format!(
                "unknown field '{other}': use status, priority, assignee, team, due"
            )),
        }
    }
}

/// Whether a raw picker/CLI value means "clear this field". Blank input
/// is not a clear; it means no value was given.
fn is_none_sentinel(raw: &str) -> bool {
    raw == "-" || raw.eq_ignore_ascii_case("none")
}

/// A single field value applied across a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    Status(Status),
    Priority(Priority),
    AssignUser(Option<UserId>),
    AssignTeam(Option<TeamId>),
    DueDate(Option<NaiveDate>),
}

impl FieldChange {
    /// Validate a raw value for `field`.
    ///
    /// Status and priority must name a member of their domain. For assignee,
    /// team and due date the `none` sentinel becomes an explicit clear.
    /// Blank input yields `Ok(None)`: there is nothing to apply.
    pub fn parse(field: BulkField, raw: &str) -> Result<Option<Self>, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let change = match field {
            BulkField::Status => Self::Status(raw.parse()?),
            BulkField::Priority => Self::Priority(raw.parse()?),
            BulkField::Assignee if is_none_sentinel(raw) => Self::AssignUser(None),
            BulkField::Assignee => Self::AssignUser(Some(raw.to_string())),
            BulkField::Team if is_none_sentinel(raw) => Self::AssignTeam(None),
            BulkField::Team => Self::AssignTeam(Some(raw.to_string())),
            BulkField::DueDate if is_none_sentinel(raw) => Self::DueDate(None),
            BulkField::DueDate => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| Self::DueDate(Some(d)))
                .map_err(|_| format!("invalid date '{raw}': use YYYY-MM-DD or none"))?,
        };
        Ok(Some(change))
    }

    pub fn field(&self) -> BulkField {
        match self {
            Self::Status(_) => BulkField::Status,
            Self::Priority(_) => BulkField::Priority,
            Self::AssignUser(_) => BulkField::Assignee,
            Self::AssignTeam(_) => BulkField::Team,
            Self::DueDate(_) => BulkField::DueDate,
        }
    }

    /// The value `task` currently holds for `field`.
    pub fn read(field: BulkField, task: &Task) -> Self {
        match field {
            BulkField::Status => Self::Status(task.status),
            BulkField::Priority => Self::Priority(task.priority),
            BulkField::Assignee => Self::AssignUser(task.assigned_user_id.clone()),
            BulkField::Team => Self::AssignTeam(task.assigned_team_id.clone()),
            BulkField::DueDate => Self::DueDate(task.due_date),
        }
    }

    pub fn to_patch(&self) -> TaskPatch {
        let mut patch = TaskPatch::default();
        match self {
            Self::Status(s) => patch.status = Some(*s),
            Self::Priority(p) => patch.priority = Some(*p),
            Self::AssignUser(u) => patch.assigned_user_id = Some(u.clone()),
            Self::AssignTeam(t) => patch.assigned_team_id = Some(t.clone()),
            Self::DueDate(d) => patch.due_date = Some(*d),
        }
        patch
    }

    /// Short "field → value" text for notices and the activity log.
    pub fn describe(&self) -> String {
        let value = match self {
            Self::Status(s) => s.label().to_string(),
            Self::Priority(p) => p.to_string(),
            Self::AssignUser(u) | Self::AssignTeam(u) => u.clone().unwrap_or_else(|| "none".into()),
            Self::DueDate(d) => d.map(|d| d.to_string()).unwrap_or_else(|| "none".into()),
        };
        format!("{} → {value}", self.field().as_str())
    }
}

/// Send `change` for `ids` as one store call.
pub fn send_change<S: TaskStore>(
    store: &S,
    ids: &[TaskId],
    change: &FieldChange,
) -> Result<(), StoreError> {
    match change {
        FieldChange::DueDate(date) => store.bulk_set_due_date(ids, *date),
        other => store.bulk_patch_tasks(ids, &other.to_patch()),
    }
}

/// A bulk edit plus the values it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkEdit {
    pub ids: Vec<TaskId>,
    /// Previous value per id; keys are exactly `ids`.
    pub previous: BTreeMap<TaskId, FieldChange>,
    pub change: FieldChange,
}

impl BulkEdit {
    /// Snapshot the current values of `change`'s field for the cached tasks
    /// among `ids`. Ids not in the cache are left out of the edit.
    pub fn capture(cache: &TaskCache, ids: &[TaskId], change: FieldChange) -> Self {
        let field = change.field();
        let mut kept = Vec::with_capacity(ids.len());
        let mut previous = BTreeMap::new();
        for id in ids {
            if let Some(task) = cache.get(id) {
                kept.push(id.clone());
                previous.insert(id.clone(), FieldChange::read(field, task));
            }
        }
        Self { ids: kept, previous, change }
    }

    /// The calls that undo this edit: ids grouped by their previous value,
    /// in first-seen order.
    pub fn inverse_groups(&self) -> Vec<(Vec<TaskId>, FieldChange)> {
        let mut groups: Vec<(Vec<TaskId>, FieldChange)> = Vec::new();
        for id in &self.ids {
            let Some(prev) = self.previous.get(id) else { continue };
            match groups.iter_mut().find(|(_, value)| value == prev) {
                Some((ids, _)) => ids.push(id.clone()),
                None => groups.push((vec![id.clone()], prev.clone())),
            }
        }
        groups
    }
}

/// The single retained record of the most recent mutation.
///
/// Only the latest bulk action can be undone or retried; starting a new one
/// replaces whatever was here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOp {
    /// Committed edit; undo restores `previous`.
    Undoable(BulkEdit),
    /// Edit whose store call failed; retry replays it.
    FailedEdit(BulkEdit),
    /// The groups of an undo whose store calls failed. Each group restores
    /// its own previous value, so retry replays them one by one.
    FailedUndo(Vec<BulkEdit>),
    /// Delete waiting out its grace period. The deadline lives here so the
    /// timer and the record are created and dropped together.
    DeleteGrace { ids: Vec<TaskId>, expires_at: Instant },
    /// Delete whose store call failed; retry sends it again immediately.
    FailedDelete { ids: Vec<TaskId> },
}

impl PendingOp {
    pub fn offers_undo(&self) -> bool {
        matches!(self, Self::Undoable(_) | Self::DeleteGrace { .. })
    }

    pub fn offers_retry(&self) -> bool {
        matches!(self, Self::FailedEdit(_) | Self::FailedUndo(_) | Self::FailedDelete { .. })
    }
}
