use ratatui::style::{Color, Modifier, Style};

use crate::board::Priority;

/// Color theme for Tasklane.
///
/// All text and UI chrome uses the terminal's default foreground color (Color::Reset).
/// Only functional glyphs (priority, WIP, selection, drag) and notices get color.
pub struct Theme;

impl Theme {
    // Base: everything defaults to the terminal's own foreground
    pub const FG: Color = Color::Reset;
    pub const DIM: Color = Color::DarkGray;

    // Column
    pub const COLUMN_HEADER: Color = Color::Reset;
    pub const COLUMN_BORDER: Color = Color::Reset;

    // Task rows
    pub const SELECTED_MARK: Color = Color::Cyan;
    pub const DRAGGED: Color = Color::Magenta;
    pub const PENDING_DELETE: Color = Color::DarkGray;
    pub const OVERDUE: Color = Color::Red;

    // Functional glyph colors
    pub const PRIORITY_LOW: Color = Color::Green;
    pub const PRIORITY_HIGH: Color = Color::Yellow;
    pub const PRIORITY_CRITICAL: Color = Color::Red;

    // WIP limit glyphs
    pub const WIP_OK: Color = Color::Green;
    pub const WIP_NEAR: Color = Color::Yellow;
    pub const WIP_OVER: Color = Color::Red;

    // Status bar
    pub const STATUS_SUCCESS: Color = Color::Green;
    pub const STATUS_ERROR: Color = Color::Red;

    // Hint popup
    pub const HINT_KEY: Color = Color::Reset;
    pub const HINT_DESC: Color = Color::Reset;

    pub fn dim_style() -> Style {
        Style::default().fg(Self::DIM)
    }

    pub fn status_style() -> Style {
        Style::default().fg(Self::FG)
    }

    pub fn badge_style() -> Style {
        Style::default()
            .fg(Self::FG)
            .add_modifier(Modifier::BOLD | Modifier::REVERSED)
    }

    /// Color for a priority level.
    pub fn priority_color(priority: Priority) -> Color {
        match priority {
            Priority::Low => Self::PRIORITY_LOW,
            Priority::Medium => Self::FG,
            Priority::High => Self::PRIORITY_HIGH,
            Priority::Critical => Self::PRIORITY_CRITICAL,
        }
    }

    /// Color for a column's `count/limit` badge: over, at the limit, or under.
    pub fn wip_color(count: usize, limit: u32) -> Color {
        let limit = limit as usize;
        if count > limit {
            Self::WIP_OVER
        } else if count == limit {
            Self::WIP_NEAR
        } else {
            Self::WIP_OK
        }
    }
}
