use std::time::{Duration, Instant};

use super::bulk::{send_change, BulkEdit, FieldChange, PendingOp};
use super::cache::TaskCache;
use super::columns::{self, ColumnView, WipLimits};
use super::drag::{plan_drop, DragState, DropTarget};
use super::notice::{Notice, NoticeDuration, Notifier, Severity};
use super::selection::Selection;
use super::{NewTask, Status, TaskFilter, TaskId, TaskPatch, TeamSummary, UserSummary};
use crate::store::{MoveRequest, StoreError, TaskStore};

pub const DEFAULT_DELETE_GRACE: Duration = Duration::from_millis(3000);

/// Client-side behaviour knobs, loaded from `local.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub delete_grace: Duration,
    /// Restore previous values locally when a bulk edit fails.
    pub rollback_on_failure: bool,
    pub notice_duration: NoticeDuration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delete_grace: DEFAULT_DELETE_GRACE,
            rollback_on_failure: false,
            notice_duration: NoticeDuration::default(),
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// One board view: the task cache and everything that mutates it.
///
/// Store failures never escape as `Err` from mutations; they end up as an
/// error notice with whatever affordance applies.
pub struct BoardController<S: TaskStore> {
    store: S,
    cache: TaskCache,
    selection: Selection,
    drag: DragState,
    pending: Option<PendingOp>,
    notifier: Notifier,
    wip: WipLimits,
    settings: Settings,
    users: Vec<UserSummary>,
    teams: Vec<TeamSummary>,
}

impl<S: TaskStore> BoardController<S> {
    pub fn new(store: S, filter: TaskFilter, settings: Settings) -> Self {
        Self {
            store,
            cache: TaskCache::new(filter),
            selection: Selection::default(),
            drag: DragState::Idle,
            pending: None,
            notifier: Notifier::new(settings.notice_duration),
            wip: WipLimits::default(),
            settings,
            users: Vec::new(),
            teams: Vec::new(),
        }
    }

    /// Build a controller and load its first page of tasks.
    ///
    /// The user/team directory is only needed for pickers, so failing to
    /// fetch it is logged and otherwise ignored.
    pub fn open(store: S, filter: TaskFilter, settings: Settings) -> Result<Self, StoreError> {
        let mut ctl = Self::new(store, filter.clone(), settings);
        ctl.load(filter)?;
        if let Err(e) = ctl.load_directory() {
            tracing::warn!(error = %e, "could not load users and teams");
        }
        Ok(ctl)
    }

    /// Reload the cache for `filter`. Anything not in the result drops out
    /// of the selection.
    pub fn load(&mut self, filter: TaskFilter) -> Result<(), StoreError> {
        self.cache.load(&self.store, filter)?;
        let cache = &self.cache;
        self.selection.retain(|id| cache.contains(id));
        if self.drag.dragged().is_some_and(|id| !cache.contains(id)) {
            self.drag = DragState::Idle;
        }
        Ok(())
    }

    pub fn reload(&mut self) -> Result<(), StoreError> {
        self.load(self.cache.filter().clone())
    }

    pub fn load_directory(&mut self) -> Result<(), StoreError> {
        self.users = self.store.list_users()?;
        self.teams = self.store.list_teams()?;
        Ok(())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &TaskCache {
        &self.cache
    }

    pub fn filter(&self) -> &TaskFilter {
        self.cache.filter()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn drag(&self) -> &DragState {
        &self.drag
    }

    pub fn pending(&self) -> Option<&PendingOp> {
        self.pending.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notifier.current()
    }

    pub fn notice_progress(&self, now: Instant) -> u16 {
        self.notifier.progress(now)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn users(&self) -> &[UserSummary] {
        &self.users
    }

    pub fn teams(&self) -> &[TeamSummary] {
        &self.teams
    }

    pub fn wip_limits(&self) -> &WipLimits {
        &self.wip
    }

    pub fn columns(&self) -> Vec<ColumnView<'_>> {
        columns::project(self.cache.tasks(), &self.wip)
    }

    /// Whether `id` is waiting out a delete grace period.
    pub fn is_pending_delete(&self, id: &str) -> bool {
        matches!(&self.pending, Some(PendingOp::DeleteGrace { ids, .. }) if ids.iter().any(|i| i == id))
    }

    // ── Settings ──

    pub fn set_wip_limits(&mut self, limits: WipLimits) {
        self.wip = limits;
    }

    pub fn set_wip_limit(&mut self, status: Status, limit: Option<u32>) {
        self.wip.set(status, limit);
        tracing::debug!(%status, ?limit, "wip limit changed");
    }

    pub fn set_notice_duration(&mut self, duration: NoticeDuration) {
        self.settings.notice_duration = duration;
        self.notifier.set_duration(duration);
    }

    // ── Notices ──

    pub fn notify(&mut self, severity: Severity, message: impl Into<String>, now: Instant) {
        let notice = match severity {
            Severity::Success => Notice::success(message, now),
            Severity::Error => Notice::error(message, now),
        };
        self.notifier.show(notice);
    }

    pub fn dismiss_notice(&mut self) {
        if self.notifier.current().is_some() {
            tracing::debug!("notice dismissed");
        }
        self.notifier.dismiss();
    }

    // ── Selection ──

    /// Check or uncheck a cached task. Unknown ids are ignored.
    pub fn toggle(&mut self, id: &str, checked: bool) {
        if self.cache.contains(id) {
            self.selection.toggle(id, checked);
        }
    }

    pub fn select_all(&mut self, ids: &[TaskId]) {
        let cache = &self.cache;
        self.selection.select_all(ids.iter().filter(|id| cache.contains(id)).cloned());
    }

    pub fn clear_selection(&mut self, ids: Option<&[TaskId]>) {
        self.selection.clear(ids);
    }

    // ── Drag and drop ──

    /// Pick up a cached task. Returns false for unknown ids.
    pub fn begin_drag(&mut self, id: &str) -> bool {
        if !self.cache.contains(id) {
            return false;
        }
        tracing::debug!(task = id, "drag started");
        self.drag = DragState::Dragging { task_id: id.to_string() };
        true
    }

    pub fn cancel_drag(&mut self) {
        if self.drag.is_dragging() {
            tracing::debug!("drag cancelled");
        }
        self.drag = DragState::Idle;
    }

    /// Release the dragged task on `target`.
    ///
    /// The cache is reordered before the store hears about it. A drop that
    /// leaves every column as it was makes no store call. A failed store
    /// call leaves the new order in place and shows an error notice.
    pub fn drop_on(&mut self, target: &DropTarget, now: Instant) -> bool {
        let DragState::Dragging { task_id } = std::mem::take(&mut self.drag) else {
            return false;
        };
        let Some(plan) = plan_drop(&self.cache, &task_id, target) else {
            tracing::debug!(task = %task_id, ?target, "drop ignored");
            return false;
        };

        if plan.is_cross_column() {
            self.cache.apply_local(std::slice::from_ref(&task_id), &TaskPatch::status(plan.to));
            self.cache.set_column_order(plan.from, &plan.source_order);
        }
        self.cache.set_column_order(plan.to, &plan.dest_order);

        if !plan.changed {
            tracing::debug!(task = %task_id, "drop left order unchanged");
            return true;
        }

        self.drag = DragState::Reconciling { task_id: task_id.clone() };
        let project = self.cache.filter().project_id.clone();
        let result = if plan.is_cross_column() {
            let req = MoveRequest {
                from: plan.from,
                to: plan.to,
                dest_order: plan.dest_order.clone(),
                source_order: plan.source_order.clone(),
            };
            self.store.move_task(&project, &task_id, &req)
        } else {
            self.store.reorder_column(&project, plan.to, &plan.dest_order)
        };
        match result {
            Ok(()) => tracing::info!(
                task = %task_id,
                from = %plan.from,
                to = %plan.to,
                index = plan.index,
                "task moved"
            ),
            Err(e) => {
                tracing::warn!(task = %task_id, error = %e, "move not saved");
                self.notifier.show(Notice::error(format!("Move not saved: {e}"), now));
            }
        }
        self.drag = DragState::Idle;
        true
    }

    // ── Bulk mutations ──

    /// Apply `change` to every selected task.
    ///
    /// Returns false, with no other effect, when nothing cached is selected.
    pub fn bulk_update(&mut self, change: FieldChange, now: Instant) -> bool {
        if self.selection.is_empty() {
            return false;
        }
        let edit = BulkEdit::capture(&self.cache, &self.selection.ids(), change);
        if edit.ids.is_empty() {
            self.selection.clear(None);
            return false;
        }
        self.supersede_pending(now);

        self.cache.apply_local(&edit.ids, &edit.change.to_patch());
        let result = send_change(&self.store, &edit.ids, &edit.change);
        self.settle_edit(edit, result, now);
        self.selection.clear(None);
        true
    }

    /// Schedule the selected tasks for deletion after the grace period.
    pub fn bulk_delete(&mut self, now: Instant) -> bool {
        let cache = &self.cache;
        let ids: Vec<TaskId> = self
            .selection
            .ids()
            .into_iter()
            .filter(|id| cache.contains(id))
            .collect();
        if ids.is_empty() {
            return false;
        }
        self.supersede_pending(now);

        let expires_at = now + self.settings.delete_grace;
        tracing::info!(count = ids.len(), grace_ms = self.settings.delete_grace.as_millis() as u64, "delete scheduled");
        self.notifier.show(
            Notice::success(format!("Deleting {} task{}", ids.len(), plural(ids.len())), now)
                .with_undo(),
        );
        self.pending = Some(PendingOp::DeleteGrace { ids, expires_at });
        self.selection.clear(None);
        true
    }

    /// Reverse the last bulk action, if it can be undone.
    pub fn undo(&mut self, now: Instant) -> bool {
        match self.pending.take() {
            Some(PendingOp::Undoable(edit)) => {
                self.restore_local(&edit);
                let groups = edit
                    .inverse_groups()
                    .into_iter()
                    .map(|(ids, previous)| BulkEdit {
                        previous: ids.iter().map(|id| (id.clone(), edit.change.clone())).collect(),
                        ids,
                        change: previous,
                    })
                    .collect();
                self.send_undo(groups, now);
                true
            }
            Some(PendingOp::DeleteGrace { ids, .. }) => {
                tracing::info!(count = ids.len(), "delete cancelled");
                self.notifier.show(Notice::success(
                    format!("Kept {} task{}", ids.len(), plural(ids.len())),
                    now,
                ));
                true
            }
            other => {
                self.pending = other;
                false
            }
        }
    }

    /// Replay the last failed store call with its original ids and value.
    pub fn retry(&mut self, now: Instant) -> bool {
        match self.pending.take() {
            Some(PendingOp::FailedEdit(edit)) => {
                tracing::debug!(count = edit.ids.len(), "retrying bulk edit");
                self.cache.apply_local(&edit.ids, &edit.change.to_patch());
                let result = send_change(&self.store, &edit.ids, &edit.change);
                self.settle_edit(edit, result, now);
                true
            }
            Some(PendingOp::FailedUndo(groups)) => {
                tracing::debug!(groups = groups.len(), "retrying undo");
                for group in &groups {
                    self.cache.apply_local(&group.ids, &group.change.to_patch());
                }
                self.send_undo(groups, now);
                true
            }
            Some(PendingOp::FailedDelete { ids }) => {
                tracing::debug!(count = ids.len(), "retrying delete");
                self.commit_delete(ids, now);
                true
            }
            other => {
                self.pending = other;
                false
            }
        }
    }

    /// Create a task in the store and append it to the board if it
    /// belongs to the project on screen.
    pub fn create_task(&mut self, new: NewTask, now: Instant) -> Option<TaskId> {
        match self.store.create_task(new) {
            Ok(task) => {
                tracing::info!(task = %task.id, "task created");
                let id = task.id.clone();
                self.notifier.show(Notice::success(format!("Created {}", task.id), now));
                if task.project_id == self.cache.filter().project_id {
                    self.cache.insert(task);
                }
                Some(id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "task not created");
                self.notifier.show(Notice::error(format!("Create failed: {e}"), now));
                None
            }
        }
    }

    // ── Timers ──

    /// Advance every timer to `now`. Returns true when something visible
    /// changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        let grace_over = matches!(
            &self.pending,
            Some(PendingOp::DeleteGrace { expires_at, .. }) if now >= *expires_at
        );
        if grace_over {
            if let Some(PendingOp::DeleteGrace { ids, .. }) = self.pending.take() {
                self.commit_delete(ids, now);
                changed = true;
            }
        }
        changed |= self.notifier.tick(now).is_some();
        changed
    }

    /// The earliest instant at which [`BoardController::tick`] has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        let grace = match &self.pending {
            Some(PendingOp::DeleteGrace { expires_at, .. }) => Some(*expires_at),
            _ => None,
        };
        match (grace, self.notifier.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Send a delete that is still waiting out its grace period right away.
    /// Used when the board closes and before a newer mutation takes the slot.
    pub fn flush_scheduled_delete(&mut self, now: Instant) {
        if !matches!(self.pending, Some(PendingOp::DeleteGrace { .. })) {
            return;
        }
        if let Some(PendingOp::DeleteGrace { ids, .. }) = self.pending.take() {
            tracing::debug!(count = ids.len(), "flushing scheduled delete");
            self.commit_delete(ids, now);
        }
    }

    // ── Internals ──

    /// Make room for a new mutation in the single pending slot.
    fn supersede_pending(&mut self, now: Instant) {
        self.flush_scheduled_delete(now);
        self.pending = None;
    }

    fn settle_edit(&mut self, edit: BulkEdit, result: Result<(), StoreError>, now: Instant) {
        let n = edit.ids.len();
        match result {
            Ok(()) => {
                tracing::info!(count = n, change = %edit.change.describe(), "bulk edit saved");
                self.notifier.show(
                    Notice::success(
                        format!("Updated {n} task{}: {}", plural(n), edit.change.describe()),
                        now,
                    )
                    .with_undo(),
                );
                self.pending = Some(PendingOp::Undoable(edit));
            }
            Err(e) => {
                tracing::warn!(count = n, change = %edit.change.describe(), error = %e, "bulk edit not saved");
                if self.settings.rollback_on_failure {
                    self.restore_local(&edit);
                }
                self.notifier
                    .show(Notice::error(format!("Update failed: {e}"), now).with_retry());
                self.pending = Some(PendingOp::FailedEdit(edit));
            }
        }
    }

    /// Send each group of an undo. Groups that fail are all kept for retry.
    fn send_undo(&mut self, groups: Vec<BulkEdit>, now: Instant) {
        let total: usize = groups.iter().map(|g| g.ids.len()).sum();
        let mut failed = Vec::new();
        let mut last_error = None;
        for group in groups {
            if let Err(e) = send_change(&self.store, &group.ids, &group.change) {
                tracing::warn!(count = group.ids.len(), error = %e, "undo not saved");
                last_error = Some(e);
                failed.push(group);
            }
        }
        match last_error {
            None => {
                tracing::info!(count = total, "bulk edit undone");
                self.notifier
                    .show(Notice::success(format!("Restored {total} task{}", plural(total)), now));
            }
            Some(e) => {
                self.notifier
                    .show(Notice::error(format!("Undo not saved: {e}"), now).with_retry());
                self.pending = Some(PendingOp::FailedUndo(failed));
            }
        }
    }

    fn restore_local(&mut self, edit: &BulkEdit) {
        for (ids, previous) in edit.inverse_groups() {
            self.cache.apply_local(&ids, &previous.to_patch());
        }
    }

    fn commit_delete(&mut self, ids: Vec<TaskId>, now: Instant) {
        match self.store.bulk_delete_tasks(&ids) {
            Ok(()) => {
                let removed = self.cache.remove(&ids);
                self.selection.clear(Some(&ids));
                if self.drag.dragged().is_some_and(|id| ids.iter().any(|i| i == id)) {
                    self.drag = DragState::Idle;
                }
                tracing::info!(count = ids.len(), removed, "tasks deleted");
                self.notifier.show(Notice::success(
                    format!("Deleted {} task{}", ids.len(), plural(ids.len())),
                    now,
                ));
            }
            Err(e) => {
                tracing::warn!(count = ids.len(), error = %e, "delete not saved");
                self.notifier
                    .show(Notice::error(format!("Delete failed: {e}"), now).with_retry());
                self.pending = Some(PendingOp::FailedDelete { ids });
            }
        }
    }
}
