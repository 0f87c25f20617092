use std::time::Instant;

use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use super::theme::Theme;
use crate::app::{AppState, Mode};
use crate::board::controller::BoardController;
use crate::board::notice::{Notice, Severity};
use crate::board::TaskFilter;
use crate::store::TaskStore;

const GAUGE_WIDTH: usize = 10;

pub fn render_status_bar<S: TaskStore>(
    f: &mut Frame,
    area: Rect,
    ctl: &BoardController<S>,
    state: &AppState,
    now: Instant,
) {
    // Input mode takes over the entire bar
    if let Mode::Input { prompt, buf, .. } = &state.mode {
        let line = Line::from(vec![
            Span::styled(format!(" {prompt} "), Theme::badge_style()),
            Span::raw(format!(" {}", buf.input)),
            Span::raw("_"),
        ]);
        f.render_widget(Paragraph::new(line).style(Theme::status_style()), area);
        return;
    }

    let left = build_left_zone(ctl, state);
    let right = build_right_zone(ctl, state);

    let left_width: usize = left.iter().map(|s| s.content.width()).sum();
    let right_width: usize = right.iter().map(|s| s.content.width()).sum();
    let center_avail = (area.width as usize).saturating_sub(left_width + right_width);
    let center = match ctl.notice() {
        Some(notice) => build_notice_zone(notice, ctl.notice_progress(now), center_avail),
        None => vec![Span::raw(" ".repeat(center_avail))],
    };

    let mut spans = left;
    spans.extend(center);
    spans.extend(right);
    f.render_widget(Paragraph::new(Line::from(spans)).style(Theme::status_style()), area);
}

/// Left zone: mode badge, project and active filters.
fn build_left_zone<'a, S: TaskStore>(ctl: &'a BoardController<S>, state: &AppState) -> Vec<Span<'a>> {
    let mode_str = match &state.mode {
        Mode::Normal if ctl.drag().is_dragging() => "MOVE",
        Mode::Normal => "NORMAL",
        Mode::Space => "BULK",
        Mode::FilterMenu => "FILTER",
        Mode::Picker { .. } => "PICKER",
        Mode::Help => "HELP",
        Mode::Input { .. } => "",
    };
    let filter = ctl.filter();
    let mut spans = vec![
        Span::styled(format!(" {mode_str} "), Theme::badge_style()),
        Span::raw(" "),
        Span::styled(format!("{} ", filter.project_id), Theme::dim_style()),
    ];
    let summary = filter_summary(filter);
    if !summary.is_empty() {
        spans.push(Span::styled(format!("{summary} "), Style::default().fg(Theme::FG)));
    }
    spans
}

/// Right zone: selection size and cursor position.
fn build_right_zone<'a, S: TaskStore>(ctl: &'a BoardController<S>, state: &AppState) -> Vec<Span<'a>> {
    let mut spans = Vec::new();
    let selected = ctl.selection().len();
    if selected > 0 {
        spans.push(Span::styled(
            format!("{selected} selected "),
            Style::default().fg(Theme::SELECTED_MARK),
        ));
    }
    let status = state.focused_status();
    let count = ctl.cache().column_order(status).len();
    let pos = if count > 0 {
        format!(" {}/{}", state.selected_task + 1, count)
    } else {
        " 0".to_string()
    };
    spans.push(Span::styled(status.label(), Theme::dim_style()));
    spans.push(Span::styled(pos, Style::default().fg(Theme::FG)));
    spans.push(Span::raw(" "));
    spans
}

/// Compact text for the narrowing filters in effect, e.g. `/login status:Review`.
pub(crate) fn filter_summary(filter: &TaskFilter) -> String {
    let mut parts = Vec::new();
    if let Some(q) = &filter.search {
        parts.push(format!("/{q}"));
    }
    if let Some(s) = filter.status {
        parts.push(format!("status:{s}"));
    }
    if let Some(p) = filter.priority {
        parts.push(format!("priority:{p}"));
    }
    if let Some(u) = &filter.assignee {
        parts.push(format!("@{u}"));
    }
    if let Some(t) = &filter.team {
        parts.push(format!("#{t}"));
    }
    if let Some(l) = &filter.lead {
        parts.push(format!("lead:{l}"));
    }
    parts.join(" ")
}

/// Remaining-time gauge: full when the notice appears, empty when it expires.
pub(crate) fn progress_bar(elapsed_pct: u16, width: usize) -> String {
    let remaining = 100 - elapsed_pct.min(100) as usize;
    let filled = (remaining * width).div_ceil(100);
    format!("{}{}", "▰".repeat(filled), "▱".repeat(width - filled))
}

/// Key hints for whatever the notice offers.
pub(crate) fn affordance_hints(notice: &Notice) -> String {
    let mut hints = Vec::new();
    if notice.offers_undo {
        hints.push("u undo");
    }
    if notice.offers_retry {
        hints.push("r retry");
    }
    if hints.is_empty() {
        String::new()
    } else {
        format!(" [{}]", hints.join(" · "))
    }
}

/// Center zone: notice text, hints and gauge, padded to fill `avail_width`.
fn build_notice_zone(notice: &Notice, elapsed_pct: u16, avail_width: usize) -> Vec<Span<'static>> {
    let color = match notice.severity {
        Severity::Success => Theme::STATUS_SUCCESS,
        Severity::Error => Theme::STATUS_ERROR,
    };
    let hints = affordance_hints(notice);
    let gauge = format!(" {}", progress_bar(elapsed_pct, GAUGE_WIDTH));
    let text_width = notice.message.width() + hints.width() + gauge.width();

    if text_width >= avail_width {
        let truncated: String = notice.message.chars().take(avail_width).collect();
        return vec![Span::styled(truncated, Style::default().fg(color))];
    }

    let pad_total = avail_width - text_width;
    let pad_left = pad_total / 2;
    vec![
        Span::raw(" ".repeat(pad_left)),
        Span::styled(notice.message.clone(), Style::default().fg(color)),
        Span::styled(hints, Style::default().fg(Theme::FG)),
        Span::styled(gauge, Theme::dim_style()),
        Span::raw(" ".repeat(pad_total - pad_left)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Status;

    #[test]
    fn progress_bar_drains_over_time() {
        assert_eq!(progress_bar(0, 4), "▰▰▰▰");
        assert_eq!(progress_bar(50, 4), "▰▰▱▱");
        assert_eq!(progress_bar(100, 4), "▱▱▱▱");
        assert_eq!(progress_bar(250, 4), "▱▱▱▱");
    }

    #[test]
    fn progress_bar_keeps_a_sliver_until_expiry() {
        assert_eq!(progress_bar(99, 10), "▰▱▱▱▱▱▱▱▱▱");
    }

    #[test]
    fn hints_follow_affordances() {
        let now = Instant::now();
        assert_eq!(affordance_hints(&Notice::success("ok", now)), "");
        assert_eq!(affordance_hints(&Notice::success("ok", now).with_undo()), " [u undo]");
        assert_eq!(affordance_hints(&Notice::error("no", now).with_retry()), " [r retry]");
    }

    #[test]
    fn filter_summary_lists_narrowing_fields() {
        let mut filter = TaskFilter::for_project("web");
        assert_eq!(filter_summary(&filter), "");
        filter.search = Some("login".into());
        filter.status = Some(Status::Review);
        filter.lead = Some("ana".into());
        assert_eq!(filter_summary(&filter), "/login status:Review lead:ana");
    }

    #[test]
    fn notice_zone_pads_to_width() {
        let notice = Notice::success("Saved", Instant::now()).with_undo();
        let spans = build_notice_zone(&notice, 0, 60);
        let width: usize = spans.iter().map(|s| s.content.width()).sum();
        assert_eq!(width, 60);
    }
}
