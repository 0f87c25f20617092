use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::action::{Action, FilterField};
use crate::app::Mode;
use crate::board::bulk::BulkField;

/// Map a key event to a semantic action based on current mode.
///
/// `dragging` is true while a task is picked up; it only changes Normal mode.
pub fn map_key(key: KeyEvent, mode: &Mode, dragging: bool) -> Action {
    match mode {
        Mode::Normal if dragging => map_dragging(key),
        Mode::Normal => map_normal(key),
        Mode::Space => map_space(key),
        Mode::FilterMenu => map_filter_menu(key),
        Mode::Input { .. } => map_input(key),
        Mode::Picker { .. } => map_picker(key),
        Mode::Help => match key.code {
            KeyCode::Esc | KeyCode::Char('q') => Action::Quit,
            _ => Action::None,
        },
    }
}

fn map_normal(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Char('h') | KeyCode::Left => Action::FocusPrevColumn,
        KeyCode::Char('l') | KeyCode::Right => Action::FocusNextColumn,
        KeyCode::Char('j') | KeyCode::Down => Action::SelectNextTask,
        KeyCode::Char('k') | KeyCode::Up => Action::SelectPrevTask,
        KeyCode::Char('g') | KeyCode::Home => Action::JumpToFirstTask,
        KeyCode::Char('G') | KeyCode::End => Action::JumpToLastTask,
        KeyCode::Char('m') => Action::BeginDrag,
        KeyCode::Char('x') => Action::ToggleSelect,
        KeyCode::Char('X') => Action::SelectColumn,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('c') => Action::ClearSelection,
        KeyCode::Char(' ') => Action::EnterSpaceMode,
        KeyCode::Char('u') => Action::Undo,
        KeyCode::Char('r') => Action::Retry,
        KeyCode::Char('z') => Action::DismissNotice,
        KeyCode::Char('/') => Action::StartSearch,
        KeyCode::Char('f') => Action::EnterFilterMode,
        KeyCode::Char('w') => Action::SetWipLimit,
        KeyCode::Char('n') => Action::CycleNoticeDuration,
        KeyCode::Char('N') => Action::NewTask,
        KeyCode::Char('R') => Action::ReloadBoard,
        KeyCode::Char('?') => Action::ShowHelp,
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Esc => Action::ClearFilters,
        _ => Action::None,
    }
}

/// Normal mode with a task picked up: navigation still works so the cursor
/// can pick the drop target, everything else is held back.
fn map_dragging(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Enter => Action::DropOnTarget,
        KeyCode::Char('e') => Action::DropAtEnd,
        KeyCode::Esc => Action::CancelDrag,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('h')
        | KeyCode::Left
        | KeyCode::Char('l')
        | KeyCode::Right
        | KeyCode::Char('j')
        | KeyCode::Down
        | KeyCode::Char('k')
        | KeyCode::Up
        | KeyCode::Char('g')
        | KeyCode::Home
        | KeyCode::Char('G')
        | KeyCode::End => map_normal(key),
        _ => Action::None,
    }
}

fn map_space(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Char('s') => Action::BulkEdit(BulkField::Status),
        KeyCode::Char('p') => Action::BulkEdit(BulkField::Priority),
        KeyCode::Char('a') => Action::BulkEdit(BulkField::Assignee),
        KeyCode::Char('t') => Action::BulkEdit(BulkField::Team),
        KeyCode::Char('D') => Action::BulkEdit(BulkField::DueDate),
        KeyCode::Char('d') => Action::BulkDelete,
        KeyCode::Char('u') => Action::Undo,
        KeyCode::Char('r') => Action::ReloadBoard,
        KeyCode::Char('?') => Action::ShowHelp,
        KeyCode::Esc => Action::None,
        _ => Action::None,
    }
}

fn map_filter_menu(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Char('s') => Action::FilterBy(FilterField::Status),
        KeyCode::Char('p') => Action::FilterBy(FilterField::Priority),
        KeyCode::Char('a') => Action::FilterBy(FilterField::Assignee),
        KeyCode::Char('t') => Action::FilterBy(FilterField::Team),
        KeyCode::Char('l') => Action::FilterBy(FilterField::Lead),
        KeyCode::Char('/') => Action::StartSearch,
        KeyCode::Char('c') => Action::ClearFilters,
        KeyCode::Esc => Action::None,
        _ => Action::None,
    }
}

fn map_input(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Enter => Action::InputConfirm,
        KeyCode::Esc => Action::InputCancel,
        KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::InputHome,
        KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::InputEnd,
        KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Action::InputDeleteWord
        }
        KeyCode::Char(c) => Action::InputChar(c),
        KeyCode::Backspace => Action::InputBackspace,
        KeyCode::Left => Action::InputLeft,
        KeyCode::Right => Action::InputRight,
        KeyCode::Home => Action::InputHome,
        KeyCode::End => Action::InputEnd,
        _ => Action::None,
    }
}

fn map_picker(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => Action::SelectNextTask,
        KeyCode::Char('k') | KeyCode::Up => Action::SelectPrevTask,
        KeyCode::Enter | KeyCode::Char(' ') => Action::InputConfirm,
        KeyCode::Esc => Action::InputCancel,
        _ => Action::None,
    }
}

// ---------------------------------------------------------------------------
// Binding registry: single source of truth for keybinding documentation.
// Used by the help overlay, status bar hints, and minor-mode popup.
// ---------------------------------------------------------------------------

/// A documented keybinding for display in help/hints.
pub struct Binding {
    pub key: &'static str,
    pub description: &'static str,
}

/// A group of related bindings (one section in help).
pub struct BindingGroup {
    pub name: &'static str,
    pub bindings: &'static [Binding],
}

pub const NORMAL_BINDINGS: &[Binding] = &[
    Binding { key: "h / l", description: "Switch columns" },
    Binding { key: "j / k", description: "Move between tasks" },
    Binding { key: "g / G", description: "First/last task" },
    Binding { key: "m", description: "Pick up task" },
    Binding { key: "x", description: "Toggle selection" },
    Binding { key: "X", description: "Select whole column" },
    Binding { key: "c", description: "Clear selection" },
    Binding { key: "u", description: "Undo last action" },
    Binding { key: "r", description: "Retry failed save" },
    Binding { key: "z", description: "Dismiss notice" },
    Binding { key: "w", description: "Set column WIP limit" },
    Binding { key: "n", description: "Cycle notice duration" },
    Binding { key: "N", description: "New task" },
    Binding { key: "R", description: "Reload board" },
    Binding { key: "/", description: "Search tasks" },
    Binding { key: "?", description: "Help" },
    Binding { key: "Esc", description: "Clear filters" },
    Binding { key: "q", description: "Quit" },
];

pub const DRAG_BINDINGS: &[Binding] = &[
    Binding { key: "h j k l", description: "Choose drop target" },
    Binding { key: "Enter", description: "Drop before task under cursor" },
    Binding { key: "e", description: "Drop at end of column" },
    Binding { key: "Esc", description: "Put back" },
];

pub const SPACE_BINDINGS: &[Binding] = &[
    Binding { key: "s", description: "Set status" },
    Binding { key: "p", description: "Set priority" },
    Binding { key: "a", description: "Assign user" },
    Binding { key: "t", description: "Assign team" },
    Binding { key: "D", description: "Set due date" },
    Binding { key: "d", description: "Delete" },
    Binding { key: "u", description: "Undo last action" },
    Binding { key: "r", description: "Reload board" },
    Binding { key: "?", description: "Help" },
];

pub const FILTER_BINDINGS: &[Binding] = &[
    Binding { key: "s", description: "By status" },
    Binding { key: "p", description: "By priority" },
    Binding { key: "a", description: "By assignee" },
    Binding { key: "t", description: "By team" },
    Binding { key: "l", description: "By team lead" },
    Binding { key: "/", description: "Text search" },
    Binding { key: "c", description: "Clear all" },
];

/// All binding groups for the help overlay.
pub const HELP_GROUPS: &[BindingGroup] = &[
    BindingGroup { name: "Normal Mode", bindings: NORMAL_BINDINGS },
    BindingGroup { name: "Dragging (m)", bindings: DRAG_BINDINGS },
    BindingGroup { name: "Bulk (Space)", bindings: SPACE_BINDINGS },
    BindingGroup { name: "Filter (f)", bindings: FILTER_BINDINGS },
];

/// Get bindings for a minor mode (for popup and status display).
pub fn mode_bindings(mode: &Mode) -> &'static [Binding] {
    match mode {
        Mode::Space => SPACE_BINDINGS,
        Mode::FilterMenu => FILTER_BINDINGS,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn key_ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn normal(code: KeyCode) -> Action {
        map_key(key(code), &Mode::Normal, false)
    }

    fn dragging(code: KeyCode) -> Action {
        map_key(key(code), &Mode::Normal, true)
    }

    // ── Normal mode bindings ──

    #[test]
    fn normal_h_moves_left() {
        assert_eq!(normal(KeyCode::Char('h')), Action::FocusPrevColumn);
        assert_eq!(normal(KeyCode::Left), Action::FocusPrevColumn);
    }

    #[test]
    fn normal_l_moves_right() {
        assert_eq!(normal(KeyCode::Char('l')), Action::FocusNextColumn);
        assert_eq!(normal(KeyCode::Right), Action::FocusNextColumn);
    }

    #[test]
    fn normal_j_k_select_tasks() {
        assert_eq!(normal(KeyCode::Char('j')), Action::SelectNextTask);
        assert_eq!(normal(KeyCode::Up), Action::SelectPrevTask);
    }

    #[test]
    fn normal_m_picks_up() {
        assert_eq!(normal(KeyCode::Char('m')), Action::BeginDrag);
    }

    #[test]
    fn normal_selection_keys() {
        assert_eq!(normal(KeyCode::Char('x')), Action::ToggleSelect);
        assert_eq!(normal(KeyCode::Char('X')), Action::SelectColumn);
        assert_eq!(normal(KeyCode::Char('c')), Action::ClearSelection);
    }

    #[test]
    fn normal_ctrl_c_quits_instead_of_clearing() {
        assert_eq!(map_key(key_ctrl('c'), &Mode::Normal, false), Action::Quit);
    }

    #[test]
    fn normal_u_and_r_are_notice_affordances() {
        assert_eq!(normal(KeyCode::Char('u')), Action::Undo);
        assert_eq!(normal(KeyCode::Char('r')), Action::Retry);
        assert_eq!(normal(KeyCode::Char('z')), Action::DismissNotice);
        assert_eq!(normal(KeyCode::Char('R')), Action::ReloadBoard);
    }

    #[test]
    fn normal_enter_does_nothing_without_drag() {
        assert_eq!(normal(KeyCode::Enter), Action::None);
        assert_eq!(normal(KeyCode::Char('e')), Action::None);
    }

    #[test]
    fn normal_esc_clears_filters() {
        assert_eq!(normal(KeyCode::Esc), Action::ClearFilters);
    }

    // ── Dragging ──

    #[test]
    fn dragging_enter_drops_and_esc_cancels() {
        assert_eq!(dragging(KeyCode::Enter), Action::DropOnTarget);
        assert_eq!(dragging(KeyCode::Char('e')), Action::DropAtEnd);
        assert_eq!(dragging(KeyCode::Esc), Action::CancelDrag);
    }

    #[test]
    fn dragging_keeps_navigation() {
        assert_eq!(dragging(KeyCode::Char('l')), Action::FocusNextColumn);
        assert_eq!(dragging(KeyCode::Down), Action::SelectNextTask);
    }

    #[test]
    fn dragging_blocks_mutations() {
        assert_eq!(dragging(KeyCode::Char('x')), Action::None);
        assert_eq!(dragging(KeyCode::Char(' ')), Action::None);
        assert_eq!(dragging(KeyCode::Char('u')), Action::None);
    }

    #[test]
    fn dragging_only_affects_normal_mode() {
        assert_eq!(map_key(key(KeyCode::Enter), &Mode::Space, true), Action::None);
    }

    // ── Minor modes ──

    #[test]
    fn space_keys_map_to_bulk_fields() {
        assert_eq!(map_key(key(KeyCode::Char('s')), &Mode::Space, false), Action::BulkEdit(BulkField::Status));
        assert_eq!(map_key(key(KeyCode::Char('D')), &Mode::Space, false), Action::BulkEdit(BulkField::DueDate));
        assert_eq!(map_key(key(KeyCode::Char('d')), &Mode::Space, false), Action::BulkDelete);
    }

    #[test]
    fn filter_menu_l_filters_by_lead() {
        assert_eq!(
            map_key(key(KeyCode::Char('l')), &Mode::FilterMenu, false),
            Action::FilterBy(FilterField::Lead)
        );
    }

    #[test]
    fn help_esc_and_q_close() {
        assert_eq!(map_key(key(KeyCode::Esc), &Mode::Help, false), Action::Quit);
        assert_eq!(map_key(key(KeyCode::Char('q')), &Mode::Help, false), Action::Quit);
        assert_eq!(map_key(key(KeyCode::Char('x')), &Mode::Help, false), Action::None);
    }

    #[test]
    fn input_ctrl_w_deletes_word() {
        let mode = Mode::Input {
            prompt: "Search",
            buf: crate::app::TextBuffer::empty(),
            on_confirm: crate::app::InputTarget::Search,
        };
        assert_eq!(map_key(key_ctrl('w'), &mode, false), Action::InputDeleteWord);
        assert_eq!(map_key(key(KeyCode::Char('w')), &mode, false), Action::InputChar('w'));
    }

    #[test]
    fn every_minor_mode_has_bindings() {
        assert!(!mode_bindings(&Mode::Space).is_empty());
        assert!(!mode_bindings(&Mode::FilterMenu).is_empty());
        assert!(mode_bindings(&Mode::Normal).is_empty());
    }
}
