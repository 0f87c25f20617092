use crate::board::bulk::BulkField;

/// Task fields the filter menu can narrow on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Status,
    Priority,
    Assignee,
    Team,
    Lead,
}

impl FilterField {
    pub fn label(self) -> &'static str {
        match self {
            Self::Status => "Status",
            Self::Priority => "Priority",
            Self::Assignee => "Assignee",
            Self::Team => "Team",
            Self::Lead => "Team lead",
        }
    }
}

/// All possible semantic actions in Tasklane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // Navigation
    FocusPrevColumn,
    FocusNextColumn,
    SelectPrevTask,
    SelectNextTask,
    JumpToFirstTask,
    JumpToLastTask,

    // Drag and drop
    BeginDrag,
    DropOnTarget,
    DropAtEnd,
    CancelDrag,

    // Selection
    ToggleSelect,
    SelectColumn,
    ClearSelection,

    // Bulk actions on the selection
    BulkEdit(BulkField),
    BulkDelete,

    // Notice affordances
    Undo,
    Retry,
    DismissNotice,

    // Search & filter
    StartSearch,
    FilterBy(FilterField),
    ClearFilters,

    // Board
    SetWipLimit,
    CycleNoticeDuration,
    NewTask,
    ReloadBoard,
    ShowHelp,
    Quit,

    // Minor mode entry
    EnterSpaceMode,
    EnterFilterMode,

    // Input modal
    InputConfirm,
    InputCancel,
    InputChar(char),
    InputBackspace,
    InputLeft,
    InputRight,
    InputHome,
    InputEnd,
    InputDeleteWord,

    // No-op
    None,
}
