use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Progress redraw cadence while a notice is visible.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Notification severity for statusbar coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
    pub offers_undo: bool,
    pub offers_retry: bool,
    pub created_at: Instant,
}

impl Notice {
    pub fn success(message: impl Into<String>, now: Instant) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Success,
            offers_undo: false,
            offers_retry: false,
            created_at: now,
        }
    }

    pub fn error(message: impl Into<String>, now: Instant) -> Self {
        Self { severity: Severity::Error, ..Self::success(message, now) }
    }

    pub fn with_undo(mut self) -> Self {
        self.offers_undo = true;
        self
    }

    pub fn with_retry(mut self) -> Self {
        self.offers_retry = true;
        self
    }
}

/// How long a notice stays up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NoticeDuration {
    #[serde(rename = "3s")]
    Short,
    #[default]
    #[serde(rename = "5s")]
    Normal,
    #[serde(rename = "7s")]
    Long,
    #[serde(rename = "10s")]
    Longest,
}

impl NoticeDuration {
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(match self {
            Self::Short => 3000,
            Self::Normal => 5000,
            Self::Long => 7000,
            Self::Longest => 10_000,
        })
    }

    pub fn next(self) -> Self {
        match self {
            Self::Short => Self::Normal,
            Self::Normal => Self::Long,
            Self::Long => Self::Longest,
            Self::Longest => Self::Short,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "3s",
            Self::Normal => "5s",
            Self::Long => "7s",
            Self::Longest => "10s",
        }
    }
}

/// What a call to [`Notifier::tick`] observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeEvent {
    /// Progress advanced; redraw.
    Tick,
    /// The notice ran out and was dismissed.
    Expired,
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Idle,
    Showing {
        notice: Notice,
        expires_at: Instant,
        next_tick: Instant,
    },
}

/// Single-slot notice display.
///
/// The auto-dismiss deadline and the progress tick are fields of the
/// `Showing` state, so leaving that state drops both.
#[derive(Debug)]
pub struct Notifier {
    slot: Slot,
    duration: NoticeDuration,
}

impl Notifier {
    pub fn new(duration: NoticeDuration) -> Self {
        Self { slot: Slot::Idle, duration }
    }

    /// Applies to notices shown after the change.
    pub fn set_duration(&mut self, duration: NoticeDuration) {
        self.duration = duration;
    }

    /// Show `notice`, replacing whatever is up along with its timers.
    pub fn show(&mut self, notice: Notice) {
        self.teardown();
        let expires_at = notice.created_at + self.duration.as_duration();
        let next_tick = notice.created_at + TICK_INTERVAL;
        tracing::debug!(message = %notice.message, severity = ?notice.severity, "notice shown");
        self.slot = Slot::Showing { notice, expires_at, next_tick };
    }

    pub fn dismiss(&mut self) {
        self.teardown();
    }

    /// Every transition out of `Showing` goes through here.
    fn teardown(&mut self) {
        self.slot = Slot::Idle;
    }

    pub fn current(&self) -> Option<&Notice> {
        match &self.slot {
            Slot::Showing { notice, .. } => Some(notice),
            Slot::Idle => None,
        }
    }

    /// Elapsed share of the display time, 0..=100.
    pub fn progress(&self, now: Instant) -> u16 {
        match &self.slot {
            Slot::Showing { notice, .. } => {
                let total = self.duration.as_duration().as_millis().max(1);
                let elapsed = now.saturating_duration_since(notice.created_at).as_millis();
                (elapsed * 100 / total).min(100) as u16
            }
            Slot::Idle => 0,
        }
    }

    /// Advance timers to `now`.
    pub fn tick(&mut self, now: Instant) -> Option<NoticeEvent> {
        let Slot::Showing { expires_at, next_tick, .. } = &mut self.slot else {
            return None;
        };
        if now >= *expires_at {
            self.teardown();
            return Some(NoticeEvent::Expired);
        }
        if now >= *next_tick {
            while *next_tick <= now {
                *next_tick += TICK_INTERVAL;
            }
            return Some(NoticeEvent::Tick);
        }
        None
    }

    /// The earliest instant [`Notifier::tick`] has work to do, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.slot {
            Slot::Showing { expires_at, next_tick, .. } => Some((*expires_at).min(*next_tick)),
            Slot::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_show_replaces_current_notice() {
        let t0 = Instant::now();
        let mut n = Notifier::new(NoticeDuration::Normal);
        n.show(Notice::success("first", t0).with_undo());
        n.show(Notice::error("second", t0 + ms(1000)).with_retry());
        let cur = n.current().unwrap();
        assert_eq!(cur.message, "second");
        assert!(cur.offers_retry);
        assert!(!cur.offers_undo);
        // Deadline follows the replacement, not the original.
        assert_eq!(n.tick(t0 + ms(5500)), Some(NoticeEvent::Tick));
        assert!(n.current().is_some());
    }

    #[test]
    fn test_expires_after_duration_and_stops_ticking() {
        let t0 = Instant::now();
        let mut n = Notifier::new(NoticeDuration::Short);
        n.show(Notice::success("saved", t0));
        assert_eq!(n.next_deadline(), Some(t0 + ms(100)));
        assert_eq!(n.tick(t0 + ms(3100)), Some(NoticeEvent::Expired));
        assert!(n.current().is_none());
        assert_eq!(n.next_deadline(), None);
        // No further timer activity once dismissed.
        assert_eq!(n.tick(t0 + ms(3200)), None);
        assert_eq!(n.tick(t0 + ms(60_000)), None);
    }

    #[test]
    fn test_ticks_every_interval_while_visible() {
        let t0 = Instant::now();
        let mut n = Notifier::new(NoticeDuration::Normal);
        n.show(Notice::success("x", t0));
        assert_eq!(n.tick(t0 + ms(50)), None);
        assert_eq!(n.tick(t0 + ms(100)), Some(NoticeEvent::Tick));
        assert_eq!(n.tick(t0 + ms(150)), None);
        assert_eq!(n.next_deadline(), Some(t0 + ms(200)));
        // A late tick catches up without firing repeatedly.
        assert_eq!(n.tick(t0 + ms(750)), Some(NoticeEvent::Tick));
        assert_eq!(n.next_deadline(), Some(t0 + ms(800)));
    }

    #[test]
    fn test_progress_is_clamped() {
        let t0 = Instant::now();
        let mut n = Notifier::new(NoticeDuration::Longest);
        assert_eq!(n.progress(t0), 0);
        n.show(Notice::success("x", t0));
        assert_eq!(n.progress(t0), 0);
        assert_eq!(n.progress(t0 + ms(2500)), 25);
        assert_eq!(n.progress(t0 + ms(99_999)), 100);
    }

    #[test]
    fn test_dismiss_clears_timers() {
        let t0 = Instant::now();
        let mut n = Notifier::new(NoticeDuration::Normal);
        n.show(Notice::success("x", t0));
        n.dismiss();
        assert!(n.current().is_none());
        assert_eq!(n.next_deadline(), None);
        assert_eq!(n.tick(t0 + ms(10_000)), None);
    }

    #[test]
    fn test_duration_cycle() {
        let mut d = NoticeDuration::Short;
        let mut seen = vec![];
        for _ in 0..4 {
            seen.push(d.as_duration().as_millis());
            d = d.next();
        }
        assert_eq!(seen, vec![3000, 5000, 7000, 10_000]);
        assert_eq!(d, NoticeDuration::Short);
    }
}
