use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;

use crate::board::bulk::{BulkField, FieldChange};
use crate::board::controller::BoardController;
use crate::board::drag::DropTarget;
use crate::board::notice::Severity;
use crate::board::{NewTask, Priority, Status, TaskFilter, TaskId};
use crate::config::LocalConfig;
use crate::input::action::{Action, FilterField};
use crate::input::keymap::map_key;
use crate::store::fs::{load_local_config, save_local_config, FsStore};
use crate::store::TaskStore;

/// Longest the event loop sleeps when no timer is due.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Reusable text editing buffer with cursor.
///
/// `cursor` is a **char index** (not byte index), always in `0..=char_count`.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    pub input: String,
    pub cursor: usize,
}

impl TextBuffer {
    pub fn new(input: String) -> Self {
        let cursor = input.chars().count();
        Self { input, cursor }
    }

    pub fn empty() -> Self {
        Self { input: String::new(), cursor: 0 }
    }

    /// Convert a char index to a byte index.
    fn byte_offset(&self, char_idx: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    pub fn insert(&mut self, c: char) {
        let byte_idx = self.byte_offset(self.cursor);
        self.input.insert(byte_idx, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            let byte_idx = self.byte_offset(self.cursor - 1);
            self.input.remove(byte_idx);
            self.cursor -= 1;
        }
    }

    pub fn delete_word(&mut self) {
        let byte_pos = self.byte_offset(self.cursor);
        let before = &self.input[..byte_pos];
        let start_byte = before
            .trim_end()
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let start_char = self.input[..start_byte].chars().count();
        self.input.drain(start_byte..byte_pos);
        self.cursor = start_char;
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.input.chars().count() {
            self.cursor += 1;
        }
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.input.chars().count();
    }
}

/// Current interaction mode.
#[derive(Debug, Clone)]
pub enum Mode {
    Normal,
    /// Bulk action menu for the selection.
    Space,
    FilterMenu,
    Input {
        prompt: &'static str,
        buf: TextBuffer,
        on_confirm: InputTarget,
    },
    Picker {
        title: &'static str,
        items: Vec<PickerItem>,
        selected: usize,
        target: PickerTarget,
    },
    Help,
}

impl Mode {
    /// Single-key menus that fall back to Normal on any unbound key.
    pub fn is_minor(&self) -> bool {
        matches!(self, Mode::Space | Mode::FilterMenu)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputTarget {
    NewTaskTitle,
    Search,
    DueDate,
    WipLimit(Status),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerTarget {
    Bulk(BulkField),
    Filter(FilterField),
}

/// One picker row. `value` is what gets parsed on confirm; `current` marks
/// the value already in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerItem {
    pub label: String,
    pub value: String,
    pub current: bool,
}

impl PickerItem {
    fn new(label: impl Into<String>, value: impl Into<String>, current: bool) -> Self {
        Self { label: label.into(), value: value.into(), current }
    }
}

/// Global application state. Everything about the tasks themselves lives
/// in the [`BoardController`]; this is cursor and modal state only.
pub struct AppState {
    pub mode: Mode,
    pub focused_column: usize,
    pub selected_task: usize,
    pub should_quit: bool,
    pub store_dir: PathBuf,
    pub local: LocalConfig,
}

impl AppState {
    pub fn new(store_dir: PathBuf, local: LocalConfig) -> Self {
        Self {
            mode: Mode::Normal,
            focused_column: 0,
            selected_task: 0,
            should_quit: false,
            store_dir,
            local,
        }
    }

    pub fn focused_status(&self) -> Status {
        Status::ALL[self.focused_column.min(Status::ALL.len() - 1)]
    }

    /// Id of the task under the cursor.
    pub fn selected_task_id<S: TaskStore>(&self, ctl: &BoardController<S>) -> Option<TaskId> {
        ctl.cache()
            .column_order(self.focused_status())
            .into_iter()
            .nth(self.selected_task)
    }

    /// Clamp the selected task index to the column's task count.
    pub fn clamp_selection<S: TaskStore>(&mut self, ctl: &BoardController<S>) {
        let len = ctl.cache().column_order(self.focused_status()).len();
        if len == 0 {
            self.selected_task = 0;
        } else if self.selected_task >= len {
            self.selected_task = len - 1;
        }
    }

    /// Put the cursor on `id`, wherever it now sits.
    fn focus_task<S: TaskStore>(&mut self, ctl: &BoardController<S>, id: &str) {
        for status in Status::ALL {
            if let Some(pos) = ctl.cache().column_order(status).iter().position(|t| t == id) {
                self.focused_column = status.index();
                self.selected_task = pos;
                return;
            }
        }
    }
}

pub fn run(
    terminal: &mut DefaultTerminal,
    store_dir: &Path,
    project: Option<&str>,
) -> color_eyre::Result<()> {
    let store = FsStore::open(store_dir)?;
    let project_id = match project {
        Some(p) => p.to_string(),
        None => store
            .projects()?
            .into_iter()
            .next()
            .map(|p| p.id)
            .ok_or_else(|| color_eyre::eyre::eyre!("no projects configured in {}", store_dir.display()))?,
    };

    let (local, local_err) = match load_local_config(store_dir) {
        Ok(cfg) => (cfg, None),
        Err(e) => {
            tracing::warn!(error = %e, "using default local settings");
            (LocalConfig::default(), Some(e))
        }
    };

    let mut ctl = BoardController::open(store, TaskFilter::for_project(&project_id), local.settings())?;
    ctl.set_wip_limits(local.wip_limits_for(&project_id));
    tracing::info!(project = %project_id, tasks = ctl.cache().len(), "board opened");
    if let Some(e) = local_err {
        ctl.notify(Severity::Error, format!("local.toml ignored: {e}"), Instant::now());
    }

    let mut state = AppState::new(store_dir.to_path_buf(), local);
    state.clamp_selection(&ctl);

    let result = event_loop(terminal, &mut ctl, &mut state);
    close_board(&mut ctl, result)
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    ctl: &mut BoardController<FsStore>,
    state: &mut AppState,
) -> color_eyre::Result<()> {
    loop {
        let now = Instant::now();
        if ctl.tick(now) {
            state.clamp_selection(ctl);
        }

        terminal.draw(|f| crate::ui::render(f, &*ctl, &*state, now))?;

        let timeout = ctl
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_POLL)
            .min(IDLE_POLL);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let action = map_key(key, &state.mode, ctl.drag().is_dragging());
                process_action(ctl, state, action, Instant::now());

                if state.should_quit {
                    return Ok(());
                }
            }
        }
    }
}

/// Send a delete still in its grace period, then hand back how the loop
/// ended. Runs on error exits too.
fn close_board<S: TaskStore>(
    ctl: &mut BoardController<S>,
    result: color_eyre::Result<()>,
) -> color_eyre::Result<()> {
    ctl.flush_scheduled_delete(Instant::now());
    result
}

fn process_action<S: TaskStore>(
    ctl: &mut BoardController<S>,
    state: &mut AppState,
    action: Action,
    now: Instant,
) {
    let was_minor_mode = state.mode.is_minor();

    match action {
        Action::None => {
            if was_minor_mode {
                state.mode = Mode::Normal;
            }
        }

        // Navigation
        Action::FocusPrevColumn
        | Action::FocusNextColumn
        | Action::SelectPrevTask
        | Action::SelectNextTask
        | Action::JumpToFirstTask
        | Action::JumpToLastTask => {
            handle_navigation(ctl, state, action, was_minor_mode);
        }

        // Drag and drop
        Action::BeginDrag | Action::DropOnTarget | Action::DropAtEnd | Action::CancelDrag => {
            handle_drag(ctl, state, action, now);
        }

        // Selection
        Action::ToggleSelect | Action::SelectColumn | Action::ClearSelection => {
            handle_selection(ctl, state, action);
        }

        // Bulk actions and notice affordances
        Action::BulkEdit(_) | Action::BulkDelete | Action::Undo | Action::Retry => {
            handle_bulk(ctl, state, action, now);
        }

        // Filter
        Action::StartSearch | Action::FilterBy(_) | Action::ClearFilters => {
            handle_filter(ctl, state, action, now);
        }

        // Text input delegation
        Action::InputChar(_)
        | Action::InputBackspace
        | Action::InputLeft
        | Action::InputRight
        | Action::InputHome
        | Action::InputEnd
        | Action::InputDeleteWord
        | Action::InputConfirm
        | Action::InputCancel => {
            handle_input(ctl, state, action, now);
        }

        // Mode entry
        Action::EnterSpaceMode => state.mode = Mode::Space,
        Action::EnterFilterMode => state.mode = Mode::FilterMenu,

        // Board-level actions
        Action::SetWipLimit => {
            let status = state.focused_status();
            let current = ctl.wip_limits().get(status).map(|n| n.to_string()).unwrap_or_default();
            state.mode = Mode::Input {
                prompt: "WIP limit (0 clears)",
                buf: TextBuffer::new(current),
                on_confirm: InputTarget::WipLimit(status),
            };
        }
        Action::DismissNotice => ctl.dismiss_notice(),
        Action::CycleNoticeDuration => {
            let next = ctl.settings().notice_duration.next();
            ctl.set_notice_duration(next);
            state.local.notice_duration = next;
            persist_local(ctl, state, now);
            ctl.notify(Severity::Success, format!("Notices stay up {}", next.as_str()), now);
        }
        Action::NewTask => {
            state.mode = Mode::Input {
                prompt: "New task",
                buf: TextBuffer::empty(),
                on_confirm: InputTarget::NewTaskTitle,
            };
        }
        Action::ReloadBoard => {
            state.mode = Mode::Normal;
            match ctl.reload() {
                Ok(()) => {
                    if let Err(e) = ctl.load_directory() {
                        tracing::warn!(error = %e, "could not reload users and teams");
                    }
                    state.clamp_selection(ctl);
                    ctl.notify(Severity::Success, "Board reloaded", now);
                }
                Err(e) => ctl.notify(Severity::Error, format!("Reload failed: {e}"), now),
            }
        }
        Action::ShowHelp => state.mode = Mode::Help,
        Action::Quit => match &state.mode {
            Mode::Normal => state.should_quit = true,
            _ => state.mode = Mode::Normal,
        },
    }
}

/// Write `local.toml`, reporting failure as a notice.
fn persist_local<S: TaskStore>(ctl: &mut BoardController<S>, state: &AppState, now: Instant) {
    if let Err(e) = save_local_config(&state.store_dir, &state.local) {
        tracing::warn!(error = %e, "local settings not saved");
        ctl.notify(Severity::Error, format!("Settings not saved: {e}"), now);
    }
}

/// Reload with `filter`, keeping the cursor in range.
fn apply_filter<S: TaskStore>(
    ctl: &mut BoardController<S>,
    state: &mut AppState,
    filter: TaskFilter,
    now: Instant,
) {
    match ctl.load(filter) {
        Ok(()) => state.clamp_selection(ctl),
        Err(e) => ctl.notify(Severity::Error, format!("Filter failed: {e}"), now),
    }
}

// ---------------------------------------------------------------------------
// Handler: Navigation (column focus, task cursor, picker rows)
// ---------------------------------------------------------------------------

fn handle_navigation<S: TaskStore>(
    ctl: &BoardController<S>,
    state: &mut AppState,
    action: Action,
    was_minor_mode: bool,
) {
    if let Mode::Picker { items, selected, .. } = &mut state.mode {
        match action {
            Action::SelectPrevTask => *selected = selected.saturating_sub(1),
            Action::SelectNextTask if *selected + 1 < items.len() => *selected += 1,
            _ => {}
        }
        return;
    }
    if was_minor_mode {
        state.mode = Mode::Normal;
    }

    match action {
        Action::FocusPrevColumn => {
            if state.focused_column > 0 {
                state.focused_column -= 1;
            }
        }
        Action::FocusNextColumn => {
            if state.focused_column + 1 < Status::ALL.len() {
                state.focused_column += 1;
            }
        }
        Action::SelectPrevTask => state.selected_task = state.selected_task.saturating_sub(1),
        Action::SelectNextTask => state.selected_task += 1,
        Action::JumpToFirstTask => state.selected_task = 0,
        Action::JumpToLastTask => state.selected_task = usize::MAX,
        _ => unreachable!(),
    }
    state.clamp_selection(ctl);
}

// ---------------------------------------------------------------------------
// Handler: Drag and drop
// ---------------------------------------------------------------------------

fn handle_drag<S: TaskStore>(
    ctl: &mut BoardController<S>,
    state: &mut AppState,
    action: Action,
    now: Instant,
) {
    match action {
        Action::BeginDrag => {
            if let Some(id) = state.selected_task_id(ctl) {
                ctl.begin_drag(&id);
            }
        }
        Action::DropOnTarget | Action::DropAtEnd => {
            let Some(dragged) = ctl.drag().dragged().map(str::to_string) else {
                return;
            };
            let target = match (&action, state.selected_task_id(ctl)) {
                (Action::DropOnTarget, Some(over)) => DropTarget::Task(over),
                _ => DropTarget::Column(state.focused_status()),
            };
            if ctl.drop_on(&target, now) {
                state.focus_task(ctl, &dragged);
            }
        }
        Action::CancelDrag => ctl.cancel_drag(),
        _ => unreachable!(),
    }
}

// ---------------------------------------------------------------------------
// Handler: Selection
// ---------------------------------------------------------------------------

fn handle_selection<S: TaskStore>(ctl: &mut BoardController<S>, state: &mut AppState, action: Action) {
    match action {
        Action::ToggleSelect => {
            if let Some(id) = state.selected_task_id(ctl) {
                let checked = !ctl.selection().contains(&id);
                ctl.toggle(&id, checked);
            }
        }
        Action::SelectColumn => {
            let ids = ctl.cache().column_order(state.focused_status());
            ctl.select_all(&ids);
        }
        Action::ClearSelection => ctl.clear_selection(None),
        _ => unreachable!(),
    }
}

// ---------------------------------------------------------------------------
// Handler: Bulk actions, undo, retry
// ---------------------------------------------------------------------------

fn handle_bulk<S: TaskStore>(
    ctl: &mut BoardController<S>,
    state: &mut AppState,
    action: Action,
    now: Instant,
) {
    state.mode = Mode::Normal;
    match action {
        Action::BulkEdit(BulkField::DueDate) => {
            if !ctl.selection().is_empty() {
                state.mode = Mode::Input {
                    prompt: "Due date (YYYY-MM-DD or none)",
                    buf: TextBuffer::empty(),
                    on_confirm: InputTarget::DueDate,
                };
            }
        }
        Action::BulkEdit(field) => {
            if !ctl.selection().is_empty() {
                let (title, items) = bulk_picker_items(ctl, field);
                state.mode = Mode::Picker { title, items, selected: 0, target: PickerTarget::Bulk(field) };
            }
        }
        Action::BulkDelete => {
            ctl.bulk_delete(now);
        }
        Action::Undo => {
            ctl.undo(now);
        }
        Action::Retry => {
            ctl.retry(now);
        }
        _ => unreachable!(),
    }
    state.clamp_selection(ctl);
}

/// The "none" row for optional fields parses as an explicit clear.
fn bulk_picker_items<S: TaskStore>(
    ctl: &BoardController<S>,
    field: BulkField,
) -> (&'static str, Vec<PickerItem>) {
    match field {
        BulkField::Status => (
            "Move to",
            Status::ALL.iter().map(|s| PickerItem::new(s.label(), s.as_str(), false)).collect(),
        ),
        BulkField::Priority => (
            "Priority",
            Priority::ALL.iter().map(|p| PickerItem::new(p.as_str(), p.as_str(), false)).collect(),
        ),
        BulkField::Assignee => {
            let mut items = vec![PickerItem::new("(unassigned)", "none", false)];
            items.extend(ctl.users().iter().map(|u| PickerItem::new(&u.name, &u.id, false)));
            ("Assign user", items)
        }
        BulkField::Team => {
            let mut items = vec![PickerItem::new("(no team)", "none", false)];
            items.extend(ctl.teams().iter().map(|t| PickerItem::new(&t.name, &t.id, false)));
            ("Assign team", items)
        }
        BulkField::DueDate => ("Due date", Vec::new()),
    }
}

// ---------------------------------------------------------------------------
// Handler: Search / filter menu
// ---------------------------------------------------------------------------

fn handle_filter<S: TaskStore>(
    ctl: &mut BoardController<S>,
    state: &mut AppState,
    action: Action,
    now: Instant,
) {
    state.mode = Mode::Normal;
    match action {
        Action::StartSearch => {
            let current = ctl.filter().search.clone().unwrap_or_default();
            state.mode = Mode::Input {
                prompt: "Search",
                buf: TextBuffer::new(current),
                on_confirm: InputTarget::Search,
            };
        }
        Action::FilterBy(field) => {
            let items = filter_picker_items(ctl, field);
            let selected = items.iter().position(|i| i.current).unwrap_or(0);
            state.mode = Mode::Picker {
                title: field.label(),
                items,
                selected,
                target: PickerTarget::Filter(field),
            };
        }
        Action::ClearFilters => {
            if ctl.filter().is_narrowed() {
                let filter = ctl.filter().cleared();
                apply_filter(ctl, state, filter, now);
                ctl.notify(Severity::Success, "Filters cleared", now);
            }
        }
        _ => unreachable!(),
    }
}

/// First row is always "(any)", which drops that filter.
fn filter_picker_items<S: TaskStore>(ctl: &BoardController<S>, field: FilterField) -> Vec<PickerItem> {
    let filter = ctl.filter();
    let mut items = vec![PickerItem::new("(any)", "", false)];
    match field {
        FilterField::Status => items.extend(
            Status::ALL
                .iter()
                .map(|s| PickerItem::new(s.label(), s.as_str(), filter.status == Some(*s))),
        ),
        FilterField::Priority => items.extend(
            Priority::ALL
                .iter()
                .map(|p| PickerItem::new(p.as_str(), p.as_str(), filter.priority == Some(*p))),
        ),
        FilterField::Assignee | FilterField::Lead => {
            let active = match field {
                FilterField::Assignee => filter.assignee.as_deref(),
                _ => filter.lead.as_deref(),
            };
            items.extend(
                ctl.users()
                    .iter()
                    .map(|u| PickerItem::new(&u.name, &u.id, active == Some(u.id.as_str()))),
            );
        }
        FilterField::Team => items.extend(
            ctl.teams()
                .iter()
                .map(|t| PickerItem::new(&t.name, &t.id, filter.team.as_deref() == Some(t.id.as_str()))),
        ),
    }
    if !items.iter().skip(1).any(|i| i.current) {
        items[0].current = true;
    }
    items
}

/// Rebuild `filter` with `field` set from a picker value. Empty clears it.
fn set_filter_field(filter: &mut TaskFilter, field: FilterField, value: &str) -> Result<(), String> {
    let value = (!value.is_empty()).then(|| value.to_string());
    match field {
        FilterField::Status => filter.status = value.map(|v| v.parse::<Status>()).transpose()?,
        FilterField::Priority => filter.priority = value.map(|v| v.parse::<Priority>()).transpose()?,
        FilterField::Assignee => filter.assignee = value,
        FilterField::Team => filter.team = value,
        FilterField::Lead => filter.lead = value,
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handler: Text input (char entry, cursor movement, confirm, cancel)
// ---------------------------------------------------------------------------

fn handle_input<S: TaskStore>(
    ctl: &mut BoardController<S>,
    state: &mut AppState,
    action: Action,
    now: Instant,
) {
    if let Action::InputConfirm = action {
        handle_input_confirm(ctl, state, now);
        return;
    }
    if let Action::InputCancel = action {
        state.mode = Mode::Normal;
        return;
    }
    let Mode::Input { buf, .. } = &mut state.mode else {
        return;
    };
    match action {
        Action::InputChar(c) => buf.insert(c),
        Action::InputBackspace => buf.backspace(),
        Action::InputLeft => buf.move_left(),
        Action::InputRight => buf.move_right(),
        Action::InputHome => buf.home(),
        Action::InputEnd => buf.end(),
        Action::InputDeleteWord => buf.delete_word(),
        _ => unreachable!(),
    }
}

/// Process InputConfirm for Input and Picker modes.
fn handle_input_confirm<S: TaskStore>(ctl: &mut BoardController<S>, state: &mut AppState, now: Instant) {
    let old_mode = std::mem::replace(&mut state.mode, Mode::Normal);

    match old_mode {
        Mode::Input { buf, on_confirm: InputTarget::NewTaskTitle, .. } => {
            let title = buf.input.trim().to_string();
            if title.is_empty() {
                return;
            }
            let new = NewTask {
                project_id: ctl.filter().project_id.clone(),
                title,
                status: state.focused_status(),
                ..NewTask::default()
            };
            if let Some(id) = ctl.create_task(new, now) {
                state.focus_task(ctl, &id);
            }
        }
        Mode::Input { buf, on_confirm: InputTarget::Search, .. } => {
            let query = buf.input.trim();
            let mut filter = ctl.filter().clone();
            filter.search = (!query.is_empty()).then(|| query.to_string());
            if filter != *ctl.filter() {
                apply_filter(ctl, state, filter, now);
            }
        }
        Mode::Input { buf, on_confirm: InputTarget::DueDate, .. } => {
            match FieldChange::parse(BulkField::DueDate, &buf.input) {
                Ok(Some(change)) => {
                    ctl.bulk_update(change, now);
                }
                Ok(None) => {}
                Err(msg) => ctl.notify(Severity::Error, msg, now),
            }
        }
        Mode::Input { buf, on_confirm: InputTarget::WipLimit(status), .. } => {
            let raw = buf.input.trim();
            let parsed = if raw.is_empty() { Ok(0) } else { raw.parse::<u32>() };
            match parsed {
                Ok(limit) => {
                    ctl.set_wip_limit(status, Some(limit));
                    let project = ctl.filter().project_id.clone();
                    state.local.set_wip_limits(&project, ctl.wip_limits());
                    persist_local(ctl, state, now);
                    let msg = match ctl.wip_limits().get(status) {
                        Some(n) => format!("{} limited to {n}", status.label()),
                        None => format!("{} limit cleared", status.label()),
                    };
                    ctl.notify(Severity::Success, msg, now);
                }
                Err(_) => ctl.notify(Severity::Error, format!("invalid limit '{raw}'"), now),
            }
        }
        Mode::Picker { items, selected, target, .. } => {
            let Some(item) = items.get(selected) else {
                return;
            };
            match target {
                PickerTarget::Bulk(field) => match FieldChange::parse(field, &item.value) {
                    Ok(Some(change)) => {
                        ctl.bulk_update(change, now);
                        state.clamp_selection(ctl);
                    }
                    Ok(None) => {}
                    Err(msg) => ctl.notify(Severity::Error, msg, now),
                },
                PickerTarget::Filter(field) => {
                    let mut filter = ctl.filter().clone();
                    match set_filter_field(&mut filter, field, &item.value) {
                        Ok(()) => apply_filter(ctl, state, filter, now),
                        Err(msg) => ctl.notify(Severity::Error, msg, now),
                    }
                }
            }
        }
        other => state.mode = other,
    }
}
