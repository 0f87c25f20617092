use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};

use super::{task_matches, MoveRequest, StoreError, TaskStore};
use crate::board::{
    NewTask, Project, Status, Task, TaskFilter, TaskId, TaskPatch, TeamSummary, UserSummary,
};
use crate::config::{LocalConfig, StoreConfig, StoreSection};

pub const STORE_DIR: &str = ".tasklane";

/// Ids double as file names, so only `[A-Za-z0-9_-]` is allowed.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Find the .tasklane directory by walking up from `start`.
pub fn find_store_dir(start: &Path) -> Result<PathBuf, StoreError> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(STORE_DIR);
        if candidate.is_dir() {
            return Ok(candidate);
        }
        if !dir.pop() {
            return Err(StoreError::NotFound(start.to_path_buf()));
        }
    }
}

/// Initialize a new .tasklane directory with one project, one user and one team.
pub fn init_store(root: &Path, name: &str) -> Result<PathBuf, StoreError> {
    let dir = root.join(STORE_DIR);
    fs::create_dir_all(dir.join("tasks"))?;
    fs::create_dir_all(dir.join("order"))?;

    let config = StoreConfig {
        store: StoreSection {
            name: name.to_string(),
            next_task_id: 1,
            created_at: Some(Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        },
        projects: vec![Project { id: "main".into(), name: name.to_string() }],
        users: vec![UserSummary { id: "me".into(), name: "Me".into(), manager_id: None }],
        teams: vec![TeamSummary { id: "core".into(), name: "Core".into(), lead_id: Some("me".into()) }],
    };
    fs::write(dir.join("config.toml"), toml::to_string_pretty(&config)?)?;
    let _ = ensure_local_gitignore(&dir);
    Ok(dir)
}

/// Persisted per-status order of one project (`order/<project>.toml`).
/// Keys are [`Status::as_str`] names.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ColumnOrder {
    #[serde(default)]
    columns: BTreeMap<String, Vec<TaskId>>,
}

impl ColumnOrder {
    fn get(&self, status: Status) -> &[TaskId] {
        self.columns.get(status.as_str()).map(Vec::as_slice).unwrap_or(&[])
    }

    fn position(&self, status: Status, id: &str) -> Option<usize> {
        self.get(status).iter().position(|i| i == id)
    }

    /// Put `ordered` into the slots its ids already hold in `status`.
    /// Ids the caller did not send (hidden by a filter) keep their slot;
    /// new ones go to the end.
    fn merge(&mut self, status: Status, ordered: &[TaskId]) {
        let mut queue: Vec<&TaskId> = Vec::with_capacity(ordered.len());
        for id in ordered {
            if !queue.contains(&id) {
                queue.push(id);
            }
        }
        let current = self.columns.remove(status.as_str()).unwrap_or_default();
        let mut next = queue.iter();
        let mut merged: Vec<TaskId> = current
            .iter()
            .map(|id| {
                if queue.contains(&id) {
                    next.next().map(|n| (*n).clone()).unwrap_or_else(|| id.clone())
                } else {
                    id.clone()
                }
            })
            .collect();
        merged.extend(next.map(|n| (*n).clone()));
        self.columns.insert(status.as_str().to_string(), merged);
    }

    fn remove(&mut self, ids: &[TaskId]) {
        for column in self.columns.values_mut() {
            column.retain(|id| !ids.contains(id));
        }
    }

    fn remove_from(&mut self, status: Status, id: &str) {
        if let Some(column) = self.columns.get_mut(status.as_str()) {
            column.retain(|i| i != id);
        }
    }

    fn push(&mut self, status: Status, id: &str) {
        let column = self.columns.entry(status.as_str().to_string()).or_default();
        if !column.iter().any(|i| i == id) {
            column.push(id.to_string());
        }
    }
}

/// A task store kept in a `.tasklane/` directory: one markdown file per task
/// with TOML frontmatter, plus per-project order files.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    /// Open an existing store directory.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let store = Self { dir: dir.to_path_buf() };
        store.config()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> Result<StoreConfig, StoreError> {
        let content = fs::read_to_string(self.dir.join("config.toml"))?;
        Ok(toml::from_str(&content)?)
    }

    fn save_config(&self, config: &StoreConfig) -> Result<(), StoreError> {
        fs::write(self.dir.join("config.toml"), toml::to_string_pretty(config)?)?;
        Ok(())
    }

    pub fn projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.config()?.projects)
    }

    fn task_path(&self, id: &str) -> PathBuf {
        self.dir.join("tasks").join(format!("{id}.md"))
    }

    fn order_path(&self, project: &str) -> PathBuf {
        self.dir.join("order").join(format!("{project}.toml"))
    }

    fn load_task(&self, id: &str) -> Result<Task, StoreError> {
        let path = self.task_path(id);
        if !is_safe_id(id) || !path.exists() {
            return Err(StoreError::UnknownTask(id.to_string()));
        }
        load_task_file(&path)
    }

    /// Load every task for `ids`, failing before anything is written if one
    /// of them does not exist.
    fn load_tasks(&self, ids: &[TaskId]) -> Result<Vec<Task>, StoreError> {
        ids.iter().map(|id| self.load_task(id)).collect()
    }

    fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        let path = self.task_path(&task.id);
        let content = serialize_task(task)?;
        let needs_write = match fs::read_to_string(&path) {
            Ok(existing) => existing.replace("\r\n", "\n") != content,
            Err(_) => true,
        };
        if needs_write {
            fs::write(&path, content)?;
        }
        Ok(())
    }

    /// Every readable task file. Broken files are skipped with a warning.
    fn load_all(&self) -> Result<Vec<Task>, StoreError> {
        let tasks_dir = self.dir.join("tasks");
        let mut tasks = Vec::new();
        if !tasks_dir.exists() {
            return Ok(tasks);
        }
        for entry in fs::read_dir(&tasks_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            match load_task_file(&path) {
                Ok(task) => tasks.push(task),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping invalid task"),
            }
        }
        Ok(tasks)
    }

    fn load_order(&self, project: &str) -> Result<ColumnOrder, StoreError> {
        if !is_safe_id(project) {
            return Err(StoreError::UnknownProject(project.to_string()));
        }
        match fs::read_to_string(self.order_path(project)) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ColumnOrder::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_order(&self, project: &str, order: &ColumnOrder) -> Result<(), StoreError> {
        fs::create_dir_all(self.dir.join("order"))?;
        fs::write(self.order_path(project), toml::to_string_pretty(order)?)?;
        Ok(())
    }

    /// Write back patched tasks, moving any whose status changed to the end
    /// of their new column.
    fn write_patched(&self, tasks: Vec<Task>, patch: &TaskPatch, action: &str) -> Result<(), StoreError> {
        let mut orders: BTreeMap<String, ColumnOrder> = BTreeMap::new();
        for mut task in tasks {
            let before = task.status;
            patch.apply(&mut task);
            task.touch();
            self.save_task(&task)?;
            if task.status != before {
                if !orders.contains_key(&task.project_id) {
                    orders.insert(task.project_id.clone(), self.load_order(&task.project_id)?);
                }
                if let Some(order) = orders.get_mut(&task.project_id) {
                    order.remove(std::slice::from_ref(&task.id));
                    order.push(task.status, &task.id);
                }
            }
            append_activity(&self.dir, action, &task.id, &task.title, &patch_extras(patch));
        }
        for (project, order) in &orders {
            self.save_order(project, order)?;
        }
        Ok(())
    }

    pub fn activity(&self) -> Result<Vec<ActivityEntry>, StoreError> {
        load_activity(&self.dir)
    }
}

impl TaskStore for FsStore {
    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let config = self.config()?;
        if config.project(&filter.project_id).is_none() {
            return Err(StoreError::UnknownProject(filter.project_id.clone()));
        }
        let order = self.load_order(&filter.project_id)?;
        let matcher = SkimMatcherV2::default();
        let mut tasks: Vec<Task> = self
            .load_all()?
            .into_iter()
            .filter(|t| task_matches(t, filter, &config.users, &config.teams, &matcher))
            .collect();
        tasks.sort_by(|a, b| {
            let pa = order.position(a.status, &a.id).unwrap_or(usize::MAX);
            let pb = order.position(b.status, &b.id).unwrap_or(usize::MAX);
            pa.cmp(&pb).then(a.created.cmp(&b.created)).then(a.id.cmp(&b.id))
        });
        Ok(tasks)
    }

    fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        let mut config = self.config()?;
        if config.project(&new.project_id).is_none() {
            return Err(StoreError::UnknownProject(new.project_id));
        }
        let id = config.next_task_id();
        let mut task = Task::new(id, new.project_id, new.title);
        task.status = new.status;
        task.priority = new.priority;
        task.assigned_user_id = new.assigned_user_id;
        task.assigned_team_id = new.assigned_team_id;
        task.due_date = new.due_date;
        task.description = new.description;

        self.save_task(&task)?;
        self.save_config(&config)?;
        let mut order = self.load_order(&task.project_id)?;
        order.push(task.status, &task.id);
        self.save_order(&task.project_id, &order)?;
        append_activity(&self.dir, "create", &task.id, &task.title, &[("status", task.status.as_str())]);
        Ok(task)
    }

    fn patch_task(&self, id: &str, patch: &TaskPatch) -> Result<Task, StoreError> {
        let task = self.load_task(id)?;
        self.write_patched(vec![task], patch, "update")?;
        self.load_task(id)
    }

    fn bulk_patch_tasks(&self, ids: &[TaskId], patch: &TaskPatch) -> Result<(), StoreError> {
        let tasks = self.load_tasks(ids)?;
        self.write_patched(tasks, patch, "bulk-update")
    }

    fn bulk_set_due_date(&self, ids: &[TaskId], date: Option<NaiveDate>) -> Result<(), StoreError> {
        let tasks = self.load_tasks(ids)?;
        let patch = TaskPatch { due_date: Some(date), ..TaskPatch::default() };
        self.write_patched(tasks, &patch, "bulk-update")
    }

    fn reorder_column(&self, project_id: &str, status: Status, ordered_ids: &[TaskId]) -> Result<(), StoreError> {
        let mut order = self.load_order(project_id)?;
        order.merge(status, ordered_ids);
        self.save_order(project_id, &order)?;
        tracing::debug!(project = project_id, %status, count = ordered_ids.len(), "column order saved");
        Ok(())
    }

    fn bulk_delete_tasks(&self, ids: &[TaskId]) -> Result<(), StoreError> {
        let tasks = self.load_tasks(ids)?;
        let mut orders: BTreeMap<String, ColumnOrder> = BTreeMap::new();
        for task in &tasks {
            fs::remove_file(self.task_path(&task.id))?;
            if !orders.contains_key(&task.project_id) {
                orders.insert(task.project_id.clone(), self.load_order(&task.project_id)?);
            }
            append_activity(&self.dir, "delete", &task.id, &task.title, &[] as &[(&str, &str)]);
        }
        for (project, order) in orders.iter_mut() {
            order.remove(ids);
            self.save_order(project, order)?;
        }
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<UserSummary>, StoreError> {
        Ok(self.config()?.users)
    }

    fn list_teams(&self) -> Result<Vec<TeamSummary>, StoreError> {
        Ok(self.config()?.teams)
    }

    /// Validate first, then write the task file and the project's order
    /// file once, so a failure leaves either the old or the new layout.
    fn move_task(&self, project_id: &str, id: &str, req: &MoveRequest) -> Result<(), StoreError> {
        let mut task = self.load_task(id)?;
        let mut order = self.load_order(project_id)?;
        order.merge(req.to, &req.dest_order);
        order.merge(req.from, &req.source_order);
        order.remove_from(req.from, id);

        task.status = req.to;
        task.touch();
        self.save_task(&task)?;
        self.save_order(project_id, &order)?;
        append_activity(
            &self.dir,
            "move",
            &task.id,
            &task.title,
            &[("from", req.from.as_str()), ("to", req.to.as_str())],
        );
        Ok(())
    }
}

fn patch_extras(patch: &TaskPatch) -> Vec<(&'static str, String)> {
    let mut extras = Vec::new();
    if let Some(status) = patch.status {
        extras.push(("status", status.as_str().to_string()));
    }
    if let Some(priority) = patch.priority {
        extras.push(("priority", priority.as_str().to_string()));
    }
    if let Some(user) = &patch.assigned_user_id {
        extras.push(("assignee", user.clone().unwrap_or_else(|| "none".into())));
    }
    if let Some(team) = &patch.assigned_team_id {
        extras.push(("team", team.clone().unwrap_or_else(|| "none".into())));
    }
    if let Some(due) = patch.due_date {
        extras.push(("due", due.map(|d| d.to_string()).unwrap_or_else(|| "none".into())));
    }
    extras
}

/// Parse a task .md file with TOML frontmatter.
fn load_task_file(path: &Path) -> Result<Task, StoreError> {
    let content = fs::read_to_string(path)?;
    let (frontmatter, body) = parse_frontmatter(&content).ok_or_else(|| StoreError::InvalidTask {
        path: path.to_path_buf(),
        reason: "missing or invalid TOML frontmatter".into(),
    })?;
    let mut task: Task = toml::from_str(&frontmatter).map_err(|e| StoreError::InvalidTask {
        path: path.to_path_buf(),
        reason: format!("invalid TOML: {e}"),
    })?;
    if !is_safe_id(&task.id) {
        return Err(StoreError::InvalidTask {
            path: path.to_path_buf(),
            reason: format!("unsafe task id: {:?}", task.id),
        });
    }
    task.description = body;
    Ok(task)
}

/// Serialize a task to the frontmatter + markdown body format.
fn serialize_task(task: &Task) -> Result<String, StoreError> {
    let mut out = String::from("---\n");
    out.push_str(&toml::to_string(task)?);
    out.push_str("---\n");
    if !task.description.is_empty() {
        out.push('\n');
        out.push_str(&task.description);
        if !task.description.ends_with('\n') {
            out.push('\n');
        }
    }
    Ok(out)
}

/// Parse `---` delimited TOML frontmatter from a string.
/// Returns (frontmatter, body).
///
/// Normalizes `\r\n` to `\n` so files edited on Windows parse correctly.
fn parse_frontmatter(content: &str) -> Option<(String, String)> {
    let content = content.replace("\r\n", "\n");
    let content = content.trim_start();
    let after_first = content.strip_prefix("---")?;
    let after_first = after_first.strip_prefix('\n').unwrap_or(after_first);
    let end = after_first.find("\n---")?;
    let frontmatter = after_first[..end].to_string();
    let rest = &after_first[end + 4..];
    let body = rest.strip_prefix('\n').unwrap_or(rest).trim().to_string();
    Some((frontmatter, body))
}

// ---------------------------------------------------------------------------
// Activity log (.tasklane/activity.log, append-only JSONL)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub ts: String,
    pub action: String,
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub extras: BTreeMap<String, String>,
}

/// Append a single JSONL event to `.tasklane/activity.log`.
///
/// Best-effort: a failed write is logged and otherwise ignored, so the log
/// never interrupts a mutation.
pub fn append_activity<V: AsRef<str>>(
    dir: &Path,
    action: &str,
    task_id: &str,
    title: &str,
    extras: &[(&str, V)],
) {
    let entry = ActivityEntry {
        ts: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        action: action.to_string(),
        id: task_id.to_string(),
        title: title.to_string(),
        extras: extras
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_ref().to_string()))
            .collect(),
    };
    if let Err(e) = try_append_activity(dir, &entry) {
        tracing::debug!(error = %e, "activity log write failed");
    }
}

fn try_append_activity(dir: &Path, entry: &ActivityEntry) -> Result<(), StoreError> {
    use std::io::Write;
    let line = serde_json::to_string(entry)?;
    let mut file = fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(dir.join("activity.log"))?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Read the activity log, oldest first. Unparseable lines are skipped.
pub fn load_activity(dir: &Path) -> Result<Vec<ActivityEntry>, StoreError> {
    let content = match fs::read_to_string(dir.join("activity.log")) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| match serde_json::from_str(l) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed activity line");
                None
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Local config (.tasklane/local.toml, gitignored, per-user preferences)
// ---------------------------------------------------------------------------

/// Load per-user local preferences from `.tasklane/local.toml`.
/// Returns `Ok(default)` if the file is absent; surfaces a `StoreError`
/// if the file exists but cannot be parsed, so callers can warn the user.
pub fn load_local_config(dir: &Path) -> Result<LocalConfig, StoreError> {
    let path = dir.join("local.toml");
    if !path.exists() {
        return Ok(LocalConfig::default());
    }
    let content = fs::read_to_string(&path)?;
    Ok(toml::from_str(&content)?)
}

/// Persist per-user local preferences to `.tasklane/local.toml`, making a
/// best-effort attempt to keep the file out of version control.
pub fn save_local_config(dir: &Path, config: &LocalConfig) -> Result<(), StoreError> {
    let content = toml::to_string_pretty(config)?;
    fs::write(dir.join("local.toml"), content)?;
    let _ = ensure_local_gitignore(dir);
    Ok(())
}

/// Ensure `.tasklane/.gitignore` contains a `local.toml` entry.
/// Opens the file once with read+write access to avoid a TOCTOU window.
fn ensure_local_gitignore(dir: &Path) -> Result<(), StoreError> {
    use std::io::{Read, Seek, Write};
    let path = dir.join(".gitignore");
    let entry = "local.toml";
    let mut file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    if content.lines().any(|l| l.trim() == entry) {
        return Ok(());
    }
    file.seek(std::io::SeekFrom::End(0))?;
    if !content.is_empty() && !content.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    writeln!(file, "{entry}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Priority;

    fn store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = init_store(dir.path(), "Test").unwrap();
        let store = FsStore::open(&path).unwrap();
        (dir, store)
    }

    fn add(store: &FsStore, title: &str, status: Status) -> Task {
        store
            .create_task(NewTask {
                project_id: "main".into(),
                title: title.into(),
                status,
                ..NewTask::default()
            })
            .unwrap()
    }

    fn ids_of(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_parse_frontmatter() {
        let content = "---\nid = \"1\"\ntitle = \"Test\"\n---\n\nBody text here.\n";
        let (fm, body) = parse_frontmatter(content).unwrap();
        assert!(fm.contains("id = \"1\""));
        assert_eq!(body, "Body text here.");
    }

    #[test]
    fn test_parse_frontmatter_crlf() {
        let content = "---\r\nid = \"1\"\r\n---\r\n\r\nBody.\r\n";
        let (fm, body) = parse_frontmatter(content).unwrap();
        assert!(fm.contains("id = \"1\""));
        assert_eq!(body, "Body.");
    }

    #[test]
    fn test_parse_frontmatter_missing() {
        assert!(parse_frontmatter("just text").is_none());
        assert!(parse_frontmatter("---\nid = 1\n").is_none());
    }

    #[test]
    fn test_task_file_roundtrip() {
        let (_tmp, store) = store();
        let mut task = Task::new("42".into(), "main".into(), "Roundtrip".into());
        task.priority = Priority::Critical;
        task.status = Status::Review;
        task.due_date = NaiveDate::from_ymd_opt(2025, 7, 1);
        task.subtasks = vec![true, false];
        task.assignees = vec!["bo".into()];
        task.description = "Line one.\n\nLine two.".into();
        store.save_task(&task).unwrap();

        let loaded = store.load_task("42").unwrap();
        assert_eq!(loaded.priority, Priority::Critical);
        assert_eq!(loaded.status, Status::Review);
        assert_eq!(loaded.due_date, task.due_date);
        assert_eq!(loaded.subtasks, vec![true, false]);
        assert_eq!(loaded.assignees, vec!["bo"]);
        assert_eq!(loaded.description, task.description);
        assert_eq!(loaded.created.timestamp(), task.created.timestamp());
    }

    #[test]
    fn test_init_seeds_directory() {
        let (_tmp, store) = store();
        let config = store.config().unwrap();
        assert_eq!(config.store.name, "Test");
        assert_eq!(config.projects[0].id, "main");
        assert_eq!(store.list_users().unwrap().len(), 1);
        assert_eq!(store.list_teams().unwrap()[0].lead_id.as_deref(), Some("me"));
        let gitignore = fs::read_to_string(store.dir().join(".gitignore")).unwrap();
        assert!(gitignore.contains("local.toml"));
    }

    #[test]
    fn test_find_store_dir_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        init_store(dir.path(), "Test").unwrap();
        let nested = dir.path().join("src/deep/nested");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_store_dir(&nested).unwrap(), dir.path().join(STORE_DIR));
    }

    #[test]
    fn test_find_store_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(find_store_dir(dir.path()), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_create_assigns_ids_and_appends_to_column() {
        let (_tmp, store) = store();
        let a = add(&store, "First", Status::ToDo);
        let b = add(&store, "Second", Status::ToDo);
        assert_eq!(a.id, "1");
        assert_eq!(b.id, "2");
        let tasks = store.list_tasks(&TaskFilter::for_project("main")).unwrap();
        assert_eq!(ids_of(&tasks), vec!["1", "2"]);
    }

    #[test]
    fn test_create_in_unknown_project_fails() {
        let (_tmp, store) = store();
        let err = store
            .create_task(NewTask { project_id: "nope".into(), title: "x".into(), ..NewTask::default() })
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownProject(_)));
    }

    #[test]
    fn test_reorder_changes_list_order() {
        let (_tmp, store) = store();
        add(&store, "a", Status::ToDo);
        add(&store, "b", Status::ToDo);
        add(&store, "c", Status::ToDo);
        store
            .reorder_column("main", Status::ToDo, &["3".into(), "1".into(), "2".into()])
            .unwrap();
        let tasks = store.list_tasks(&TaskFilter::for_project("main")).unwrap();
        assert_eq!(ids_of(&tasks), vec!["3", "1", "2"]);
    }

    #[test]
    fn test_partial_reorder_keeps_hidden_slots() {
        let mut order = ColumnOrder::default();
        order.merge(Status::ToDo, &["a".into(), "h".into(), "b".into()]);
        // "h" is filtered out of the board; the user swaps a and b.
        order.merge(Status::ToDo, &["b".into(), "a".into(), "b".into()]);
        assert_eq!(order.get(Status::ToDo), ["b", "h", "a"]);
        order.merge(Status::ToDo, &["n".into()]);
        assert_eq!(order.get(Status::ToDo), ["b", "h", "a", "n"]);
    }

    #[test]
    fn test_filters_and_search() {
        let (_tmp, store) = store();
        add(&store, "Fix login redirect", Status::ToDo);
        add(&store, "Write release notes", Status::Done);
        let mut filter = TaskFilter::for_project("main");
        filter.search = Some("login".into());
        assert_eq!(ids_of(&store.list_tasks(&filter).unwrap()), vec!["1"]);
        let mut filter = TaskFilter::for_project("main");
        filter.status = Some(Status::Done);
        assert_eq!(ids_of(&store.list_tasks(&filter).unwrap()), vec!["2"]);
    }

    #[test]
    fn test_bulk_patch_updates_files() {
        let (_tmp, store) = store();
        add(&store, "a", Status::ToDo);
        add(&store, "b", Status::ToDo);
        let patch = TaskPatch { priority: Some(Priority::High), ..TaskPatch::default() };
        store.bulk_patch_tasks(&["1".into(), "2".into()], &patch).unwrap();
        assert_eq!(store.load_task("1").unwrap().priority, Priority::High);
        assert_eq!(store.load_task("2").unwrap().priority, Priority::High);
    }

    #[test]
    fn test_bulk_patch_with_unknown_id_writes_nothing() {
        let (_tmp, store) = store();
        add(&store, "a", Status::ToDo);
        let patch = TaskPatch { priority: Some(Priority::Low), ..TaskPatch::default() };
        let err = store.bulk_patch_tasks(&["1".into(), "99".into()], &patch).unwrap_err();
        assert!(matches!(err, StoreError::UnknownTask(ref id) if id == "99"));
        assert_eq!(store.load_task("1").unwrap().priority, Priority::Medium);
    }

    #[test]
    fn test_status_patch_moves_task_to_end_of_new_column() {
        let (_tmp, store) = store();
        add(&store, "a", Status::ToDo);
        add(&store, "b", Status::Done);
        store.patch_task("1", &TaskPatch::status(Status::Done)).unwrap();
        let tasks = store.list_tasks(&TaskFilter::for_project("main")).unwrap();
        assert_eq!(ids_of(&tasks), vec!["2", "1"]);
        let order = store.load_order("main").unwrap();
        assert!(order.get(Status::ToDo).is_empty());
    }

    #[test]
    fn test_bulk_due_date_set_and_clear() {
        let (_tmp, store) = store();
        add(&store, "a", Status::ToDo);
        let d = NaiveDate::from_ymd_opt(2025, 12, 24);
        store.bulk_set_due_date(&["1".into()], d).unwrap();
        assert_eq!(store.load_task("1").unwrap().due_date, d);
        store.bulk_set_due_date(&["1".into()], None).unwrap();
        assert_eq!(store.load_task("1").unwrap().due_date, None);
    }

    #[test]
    fn test_move_task_writes_status_and_both_orders() {
        let (_tmp, store) = store();
        add(&store, "a", Status::ToDo);
        add(&store, "b", Status::ToDo);
        add(&store, "c", Status::InProgress);
        let req = MoveRequest {
            from: Status::ToDo,
            to: Status::InProgress,
            dest_order: vec!["1".into(), "3".into()],
            source_order: vec!["2".into()],
        };
        store.move_task("main", "1", &req).unwrap();
        assert_eq!(store.load_task("1").unwrap().status, Status::InProgress);
        let order = store.load_order("main").unwrap();
        assert_eq!(order.get(Status::ToDo), ["2"]);
        assert_eq!(order.get(Status::InProgress), ["1", "3"]);
    }

    #[test]
    fn test_move_unknown_task_changes_nothing() {
        let (_tmp, store) = store();
        add(&store, "a", Status::ToDo);
        let req = MoveRequest {
            from: Status::ToDo,
            to: Status::Done,
            dest_order: vec!["9".into()],
            source_order: vec!["1".into()],
        };
        assert!(store.move_task("main", "9", &req).is_err());
        assert!(store.load_order("main").unwrap().get(Status::Done).is_empty());
    }

    #[test]
    fn test_bulk_delete_removes_files_and_order() {
        let (_tmp, store) = store();
        add(&store, "a", Status::ToDo);
        add(&store, "b", Status::ToDo);
        store.bulk_delete_tasks(&["1".into()]).unwrap();
        assert!(!store.task_path("1").exists());
        let tasks = store.list_tasks(&TaskFilter::for_project("main")).unwrap();
        assert_eq!(ids_of(&tasks), vec!["2"]);
        assert_eq!(store.load_order("main").unwrap().get(Status::ToDo), ["2"]);
    }

    #[test]
    fn test_invalid_task_file_is_skipped() {
        let (_tmp, store) = store();
        add(&store, "ok", Status::ToDo);
        fs::write(store.dir().join("tasks/broken.md"), "no frontmatter").unwrap();
        fs::write(
            store.dir().join("tasks/evil.md"),
            "---\nid = \"../x\"\nproject_id = \"main\"\ntitle = \"t\"\ncreated = \"2025-01-01T00:00:00Z\"\nupdated = \"2025-01-01T00:00:00Z\"\n---\n",
        )
        .unwrap();
        let tasks = store.list_tasks(&TaskFilter::for_project("main")).unwrap();
        assert_eq!(ids_of(&tasks), vec!["1"]);
    }

    #[test]
    fn test_unsafe_ids_are_unknown() {
        let (_tmp, store) = store();
        assert!(matches!(store.load_task("../config"), Err(StoreError::UnknownTask(_))));
        assert!(matches!(
            store.reorder_column("../x", Status::ToDo, &[]),
            Err(StoreError::UnknownProject(_))
        ));
    }

    #[test]
    fn test_activity_log_records_mutations() {
        let (_tmp, store) = store();
        add(&store, "Say \"hi\"", Status::ToDo);
        store.bulk_patch_tasks(&["1".into()], &TaskPatch::status(Status::Done)).unwrap();
        store.bulk_delete_tasks(&["1".into()]).unwrap();

        let log = store.activity().unwrap();
        let actions: Vec<&str> = log.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["create", "bulk-update", "delete"]);
        assert_eq!(log[0].title, "Say \"hi\"");
        assert_eq!(log[1].extras.get("status").map(String::as_str), Some("Done"));
    }

    #[test]
    fn test_activity_log_skips_garbage_lines() {
        let (_tmp, store) = store();
        fs::write(
            store.dir().join("activity.log"),
            "not json\n{\"ts\":\"t\",\"action\":\"create\",\"id\":\"1\",\"title\":\"x\"}\n",
        )
        .unwrap();
        assert_eq!(store.activity().unwrap().len(), 1);
    }

    #[test]
    fn test_local_config_absent_returns_default() {
        let (_tmp, store) = store();
        assert_eq!(load_local_config(store.dir()).unwrap(), LocalConfig::default());
    }

    #[test]
    fn test_local_config_invalid_toml_returns_err() {
        let (_tmp, store) = store();
        fs::write(store.dir().join("local.toml"), "delete_grace_ms = !!!\n").unwrap();
        assert!(load_local_config(store.dir()).is_err());
    }

    #[test]
    fn test_local_config_roundtrip() {
        let (_tmp, store) = store();
        let cfg = LocalConfig { rollback_on_failure: true, delete_grace_ms: 5000, ..LocalConfig::default() };
        save_local_config(store.dir(), &cfg).unwrap();
        assert_eq!(load_local_config(store.dir()).unwrap(), cfg);
    }

    #[test]
    fn test_gitignore_entry_not_duplicated() {
        let (_tmp, store) = store();
        save_local_config(store.dir(), &LocalConfig::default()).unwrap();
        save_local_config(store.dir(), &LocalConfig::default()).unwrap();
        let content = fs::read_to_string(store.dir().join(".gitignore")).unwrap();
        assert_eq!(content.lines().filter(|l| l.trim() == "local.toml").count(), 1);
    }
}
