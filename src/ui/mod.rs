pub mod board_view;
pub mod help;
pub mod input_modal;
pub mod status_bar;
pub mod theme;

use std::time::Instant;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::Frame;

use crate::app::{AppState, Mode};
use crate::board::controller::BoardController;
use crate::store::TaskStore;

/// Create a centered rect within `area` using percentage-based sizing with minimums.
pub fn centered_rect(area: Rect, w_pct: u16, h_pct: u16, min_w: u16, min_h: u16) -> Rect {
    let width = (area.width * w_pct / 100).max(min_w).min(area.width);
    let height = (area.height * h_pct / 100).max(min_h).min(area.height);
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;
    Rect::new(x, y, width, height)
}

pub fn render<S: TaskStore>(f: &mut Frame, ctl: &BoardController<S>, state: &AppState, now: Instant) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(f.area());

    let today = chrono::Local::now().date_naive();
    board_view::render_board(f, chunks[0], ctl, state, today);
    status_bar::render_status_bar(f, chunks[1], ctl, state, now);

    // Overlays
    match &state.mode {
        Mode::Space | Mode::FilterMenu => {
            input_modal::render_hint_popup(f, chunks[0], &state.mode, ctl.selection().len());
        }
        Mode::Picker { title, items, selected, .. } => {
            input_modal::render_picker(f, chunks[0], title, items, *selected);
        }
        Mode::Help => help::render_help(f, f.area()),
        Mode::Normal | Mode::Input { .. } => {}
    }
}
