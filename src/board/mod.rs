pub mod bulk;
pub mod cache;
pub mod columns;
pub mod controller;
pub mod drag;
pub mod notice;
pub mod selection;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Opaque task identity, as handed out by the task store.
pub type TaskId = String;
pub type UserId = String;
pub type TeamId = String;
pub type ProjectId = String;

/// Lowercase a user-typed enum value and drop separators, so that
/// `In Progress`, `in-progress` and `IN_PROGRESS` all compare equal.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Workflow status. Every task is in exactly one status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Status {
    #[default]
    ToDo,
    InProgress,
    Review,
    Done,
}

impl Status {
    /// Board column order, left to right.
    pub const ALL: [Status; 4] = [Self::ToDo, Self::InProgress, Self::Review, Self::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToDo => "ToDo",
            Self::InProgress => "InProgress",
            Self::Review => "Review",
            Self::Done => "Done",
        }
    }

    /// Human-readable column title.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ToDo => "To Do",
            Self::InProgress => "In Progress",
            Self::Review => "Review",
            Self::Done => "Done",
        }
    }

    /// Position of this status in [`Status::ALL`].
    pub fn index(self) -> usize {
        match self {
            Self::ToDo => 0,
            Self::InProgress => 1,
            Self::Review => 2,
            Self::Done => 3,
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "todo" => Ok(Self::ToDo),
            "inprogress" => Ok(Self::InProgress),
            "review" => Ok(Self::Review),
            "done" => Ok(Self::Done),
            _ => Err(format!("unknown status '{s}': use todo, in-progress, review, done")),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority levels for tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("unknown priority '{s}': use low, medium, high, critical")),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task summary as cached by the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_team_id: Option<TeamId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Completion flag per subtask.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<bool>,
    /// Additional assignees besides `assigned_user_id`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<UserId>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// The markdown body (not serialized into frontmatter).
    #[serde(skip)]
    pub description: String,
}

impl Task {
    pub fn new(id: TaskId, project_id: ProjectId, title: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id,
            title,
            status: Status::default(),
            priority: Priority::default(),
            assigned_user_id: None,
            assigned_team_id: None,
            due_date: None,
            subtasks: Vec::new(),
            assignees: Vec::new(),
            created: now,
            updated: now,
            description: String::new(),
        }
    }

    /// Touch the task, updating its `updated` timestamp.
    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }

    pub fn completed_subtasks(&self) -> usize {
        self.subtasks.iter().filter(|done| **done).count()
    }

    /// Whether `user` is the primary or an additional assignee.
    pub fn is_assigned_to(&self, user: &str) -> bool {
        self.assigned_user_id.as_deref() == Some(user) || self.assignees.iter().any(|a| a == user)
    }
}

/// A partial update. `Some(None)` on an optional field clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub assigned_user_id: Option<Option<UserId>>,
    pub assigned_team_id: Option<Option<TeamId>>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    pub fn status(status: Status) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the patch into `task`. Fields not named by the patch are untouched.
    pub fn apply(&self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(user) = &self.assigned_user_id {
            task.assigned_user_id = user.clone();
        }
        if let Some(team) = &self.assigned_team_id {
            task.assigned_team_id = team.clone();
        }
        if let Some(due) = self.due_date {
            task.due_date = due;
        }
    }
}

/// Fields for creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub project_id: ProjectId,
    pub title: String,
    pub status: Status,
    pub priority: Priority,
    pub assigned_user_id: Option<UserId>,
    pub assigned_team_id: Option<TeamId>,
    pub due_date: Option<NaiveDate>,
    pub description: String,
}

/// The query a board view is loaded with. Changing any field reloads the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub project_id: ProjectId,
    pub search: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub assignee: Option<UserId>,
    pub team: Option<TeamId>,
    /// Manager/lead proxy: tasks of users this person manages, or of teams they lead.
    pub lead: Option<UserId>,
}

impl TaskFilter {
    pub fn for_project(project_id: impl Into<ProjectId>) -> Self {
        Self { project_id: project_id.into(), ..Self::default() }
    }

    /// Whether anything beyond the project narrows the result.
    pub fn is_narrowed(&self) -> bool {
        self.search.is_some()
            || self.status.is_some()
            || self.priority.is_some()
            || self.assignee.is_some()
            || self.team.is_some()
            || self.lead.is_some()
    }

    /// Drop every narrowing filter, keeping the project.
    pub fn cleared(&self) -> Self {
        Self::for_project(self.project_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub id: TeamId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<UserId>,
}
