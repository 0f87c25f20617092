use chrono::NaiveDate;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Padding, Paragraph, Scrollbar, ScrollbarOrientation,
    ScrollbarState,
};
use ratatui::Frame;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use super::theme::Theme;
use crate::app::AppState;
use crate::board::columns::ColumnView;
use crate::board::controller::BoardController;
use crate::board::{Priority, Task};
use crate::store::TaskStore;

/// How a task row should look beyond its content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RowFlags {
    pub cursor: bool,
    pub checked: bool,
    pub dragged: bool,
    pub pending_delete: bool,
}

/// Total display width of an icon list, including one-space separators between items.
pub(crate) fn total_icon_width(icons: &[(String, Style)]) -> usize {
    icons.iter().map(|(t, _)| t.width()).sum::<usize>() + icons.len().saturating_sub(1)
}

/// Return the subset of `candidates` that fits within `avail_width`.
///
/// Icons are dropped from the left (least important first) until the remaining
/// set fits. If even the single last icon exceeds `avail_width`, returns empty.
pub(crate) fn fit_icons(candidates: &[(String, Style)], avail_width: usize) -> Vec<(String, Style)> {
    let mut start = 0;
    while start + 1 < candidates.len() && total_icon_width(&candidates[start..]) > avail_width {
        start += 1;
    }
    let remaining = &candidates[start..];
    if total_icon_width(remaining) > avail_width {
        return Vec::new();
    }
    remaining.to_vec()
}

/// Border color for a task row. A drag in progress outranks everything.
pub(crate) fn row_border_color(flags: RowFlags, is_col_focused: bool) -> Color {
    if flags.dragged {
        Theme::DRAGGED
    } else if flags.pending_delete {
        Theme::PENDING_DELETE
    } else if flags.checked {
        Theme::SELECTED_MARK
    } else if is_col_focused {
        Theme::FG
    } else {
        Theme::DIM
    }
}

/// Truncate `title` to `max_width` display columns, ending in `…` when cut.
pub(crate) fn truncate_title(title: &str, max_width: usize) -> String {
    if title.width() <= max_width {
        return title.to_string();
    }
    let avail = max_width.saturating_sub(1);
    let truncated: String = title
        .graphemes(true)
        .scan(0, |w, g| {
            let gw = g.width();
            (*w + gw <= avail).then(|| {
                *w += gw;
                g
            })
        })
        .collect();
    format!("{truncated}…")
}

/// Column header text: label, count, and subtask completion when there is any.
pub(crate) fn header_text(view: &ColumnView<'_>) -> String {
    let has_subtasks = view.items.iter().any(|t| !t.subtasks.is_empty());
    if has_subtasks {
        format!(" {} ({}) {:.0}% ", view.status.label(), view.count, view.completion_pct)
    } else {
        format!(" {} ({}) ", view.status.label(), view.count)
    }
}

fn priority_glyph(priority: Priority) -> Option<&'static str> {
    match priority {
        Priority::Low => Some("↓"),
        Priority::Medium => None,
        Priority::High => Some("!"),
        Priority::Critical => Some("!!"),
    }
}

/// Right-hand glyphs for a row, least important first.
pub(crate) fn task_glyphs(task: &Task, today: NaiveDate) -> Vec<(String, Style)> {
    let mut glyphs = Vec::new();
    if !task.subtasks.is_empty() {
        glyphs.push((
            format!("{}/{}", task.completed_subtasks(), task.subtasks.len()),
            Theme::dim_style(),
        ));
    }
    if let Some(due) = task.due_date {
        let style = if due < today {
            Style::default().fg(Theme::OVERDUE)
        } else {
            Theme::dim_style()
        };
        glyphs.push((due.format("%m-%d").to_string(), style));
    }
    if let Some(sym) = priority_glyph(task.priority) {
        glyphs.push((sym.to_string(), Style::default().fg(Theme::priority_color(task.priority))));
    }
    glyphs
}

pub fn render_board<S: TaskStore>(
    f: &mut Frame,
    area: Rect,
    ctl: &BoardController<S>,
    state: &AppState,
    today: NaiveDate,
) {
    let views = ctl.columns();
    let constraints: Vec<Constraint> = views
        .iter()
        .map(|_| Constraint::Ratio(1, views.len() as u32))
        .collect();
    let col_areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (idx, view) in views.iter().enumerate() {
        let is_focused = state.focused_column == idx;
        render_column(f, col_areas[idx], view, is_focused, ctl, state, today);
    }
}

fn render_column<S: TaskStore>(
    f: &mut Frame,
    area: Rect,
    view: &ColumnView<'_>,
    is_focused: bool,
    ctl: &BoardController<S>,
    state: &AppState,
    today: NaiveDate,
) {
    let wip_text = match view.wip_limit {
        Some(limit) => Span::styled(
            format!("[{}/{}]", view.count, limit),
            Style::default().fg(Theme::wip_color(view.count, limit)),
        ),
        None => Span::raw(""),
    };

    let header_line = Line::from(vec![
        Span::styled(
            header_text(view),
            Style::default()
                .fg(Theme::COLUMN_HEADER)
                .add_modifier(Modifier::BOLD),
        ),
        wip_text,
    ]);

    let focused_mod = if is_focused { Modifier::BOLD } else { Modifier::empty() };
    let border_color = if view.over_limit { Theme::WIP_OVER } else { Theme::COLUMN_BORDER };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color).add_modifier(focused_mod))
        .border_type(BorderType::Rounded)
        .title(header_line)
        .padding(Padding::new(1, 1, 0, 0));

    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if view.items.is_empty() {
        let hint = if ctl.drag().is_dragging() && is_focused { "drop here (Enter)" } else { "empty" };
        f.render_widget(
            Paragraph::new(Span::styled(hint, Theme::dim_style())),
            Rect::new(inner.x, inner.y, inner.width, 1),
        );
        return;
    }

    let row_height: u16 = 5;
    let max_visible = ((inner.height / row_height) as usize).max(1);
    let cursor = if is_focused { state.selected_task } else { 0 };
    let scroll_offset = if cursor >= max_visible { cursor - max_visible + 1 } else { 0 };

    for (idx, task) in view.items.iter().enumerate().skip(scroll_offset).take(max_visible) {
        let y = inner.y + ((idx - scroll_offset) as u16 * row_height);
        if y + row_height > inner.y + inner.height {
            break;
        }
        let flags = RowFlags {
            cursor: is_focused && idx == state.selected_task,
            checked: ctl.selection().contains(&task.id),
            dragged: ctl.drag().dragged() == Some(task.id.as_str()),
            pending_delete: ctl.is_pending_delete(&task.id),
        };
        render_task(f, Rect::new(inner.x, y, inner.width, row_height), task, flags, is_focused, today);
    }

    if view.items.len() > max_visible {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight);
        let mut scrollbar_state = ScrollbarState::new(view.items.len()).position(scroll_offset);
        f.render_stateful_widget(scrollbar, area, &mut scrollbar_state);
    }
}

fn render_task(f: &mut Frame, area: Rect, task: &Task, flags: RowFlags, is_col_focused: bool, today: NaiveDate) {
    if area.width < 6 || area.height < 3 {
        return;
    }

    let cursor_mod = if flags.cursor { Modifier::BOLD } else { Modifier::empty() };
    let mut text_mod = cursor_mod;
    if flags.pending_delete {
        text_mod |= Modifier::CROSSED_OUT;
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(row_border_color(flags, is_col_focused)).add_modifier(cursor_mod))
        .border_type(if flags.cursor || flags.dragged { BorderType::Thick } else { BorderType::Rounded });

    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.height == 0 || inner.width < 4 {
        return;
    }

    // Line 1: [x] id ... glyphs
    let mark = if flags.checked { "[x] " } else { "[ ] " };
    let left_width = mark.width() + task.id.width();
    let avail_glyph_width = (inner.width as usize).saturating_sub(left_width + 1);
    let glyphs = fit_icons(&task_glyphs(task, today), avail_glyph_width);
    let glyphs_width = total_icon_width(&glyphs);
    let padding = (inner.width as usize).saturating_sub(left_width + glyphs_width);

    let mut line1 = vec![
        Span::styled(mark, Style::default().fg(if flags.checked { Theme::SELECTED_MARK } else { Theme::DIM })),
        Span::styled(task.id.as_str(), Style::default().fg(Theme::DIM).add_modifier(text_mod)),
        Span::raw(" ".repeat(padding)),
    ];
    for (i, (text, style)) in glyphs.into_iter().enumerate() {
        if i > 0 {
            line1.push(Span::raw(" "));
        }
        line1.push(Span::styled(text, style));
    }
    f.render_widget(Paragraph::new(Line::from(line1)), Rect::new(inner.x, inner.y, inner.width, 1));

    // Line 2: title
    if inner.height >= 2 {
        let title = truncate_title(&task.title, inner.width as usize);
        let style = if flags.pending_delete {
            Style::default().fg(Theme::PENDING_DELETE).add_modifier(text_mod)
        } else {
            Style::default().fg(Theme::FG).add_modifier(text_mod)
        };
        f.render_widget(
            Paragraph::new(Span::styled(title, style)),
            Rect::new(inner.x, inner.y + 1, inner.width, 1),
        );
    }

    // Line 3: assignee and team
    if inner.height >= 3 {
        let mut spans = Vec::new();
        if let Some(user) = &task.assigned_user_id {
            spans.push(Span::styled(format!("@{user}"), Style::default().fg(Theme::FG)));
        }
        if let Some(team) = &task.assigned_team_id {
            if !spans.is_empty() {
                spans.push(Span::styled(" · ", Theme::dim_style()));
            }
            spans.push(Span::styled(format!("#{team}"), Theme::dim_style()));
        }
        if !spans.is_empty() {
            f.render_widget(
                Paragraph::new(Line::from(spans)),
                Rect::new(inner.x, inner.y + 2, inner.width, 1),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::columns::{project, WipLimits};
    use crate::board::test_support::task;
    use crate::board::Status;

    fn s() -> Style {
        Style::default()
    }

    fn icon(t: &str) -> (String, Style) {
        (t.to_string(), s())
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    // ── fit_icons ─────────────────────────────────────────────────────────────

    #[test]
    fn total_icon_width_counts_separators() {
        assert_eq!(total_icon_width(&[]), 0);
        assert_eq!(total_icon_width(&[icon("2/3"), icon("!!")]), 6);
    }

    #[test]
    fn fit_icons_all_fit_returns_all() {
        let r = fit_icons(&[icon("~"), icon("X")], 10);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn fit_icons_drops_leftmost_first() {
        let r = fit_icons(&[icon("1/2"), icon("06-01"), icon("!")], 7);
        let texts: Vec<&str> = r.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, vec!["06-01", "!"]);
    }

    #[test]
    fn fit_icons_clears_all_when_nothing_fits() {
        assert!(fit_icons(&[icon("!!")], 1).is_empty());
    }

    // ── row styling ──────────────────────────────────────────────────────────

    #[test]
    fn border_drag_wins_over_selection() {
        let flags = RowFlags { dragged: true, checked: true, pending_delete: true, cursor: false };
        assert_eq!(row_border_color(flags, false), Theme::DRAGGED);
    }

    #[test]
    fn border_pending_delete_before_checked() {
        let flags = RowFlags { checked: true, pending_delete: true, ..RowFlags::default() };
        assert_eq!(row_border_color(flags, true), Theme::PENDING_DELETE);
    }

    #[test]
    fn border_plain_row_dims_outside_focus() {
        assert_eq!(row_border_color(RowFlags::default(), true), Theme::FG);
        assert_eq!(row_border_color(RowFlags::default(), false), Theme::DIM);
    }

    // ── text ────────────────────────────────────────────────────────────────

    #[test]
    fn truncate_title_keeps_short_titles() {
        assert_eq!(truncate_title("Fix login", 20), "Fix login");
    }

    #[test]
    fn truncate_title_respects_wide_graphemes() {
        // Each CJK char is two columns wide.
        let t = truncate_title("日本語のタイトル", 7);
        assert_eq!(t, "日本語…");
        assert!(t.width() <= 7);
    }

    #[test]
    fn header_shows_completion_only_with_subtasks() {
        let mut a = task("a", Status::ToDo);
        let b = task("b", Status::InProgress);
        a.subtasks = vec![true, false, false, true];
        let tasks = vec![a, b];
        let views = project(&tasks, &WipLimits::default());
        assert_eq!(header_text(&views[0]), " To Do (1) 50% ");
        assert_eq!(header_text(&views[1]), " In Progress (1) ");
    }

    #[test]
    fn glyphs_flag_overdue_dates() {
        let mut t = task("a", Status::ToDo);
        t.due_date = Some(day(6, 1));
        t.priority = Priority::Critical;
        let glyphs = task_glyphs(&t, day(6, 2));
        assert_eq!(glyphs[0].0, "06-01");
        assert_eq!(glyphs[0].1.fg, Some(Theme::OVERDUE));
        assert_eq!(glyphs[1].0, "!!");

        let glyphs = task_glyphs(&t, day(5, 30));
        assert_eq!(glyphs[0].1.fg, Some(Theme::DIM));
    }

    #[test]
    fn glyphs_empty_for_plain_medium_task() {
        assert!(task_glyphs(&task("a", Status::ToDo), day(1, 1)).is_empty());
    }
}
