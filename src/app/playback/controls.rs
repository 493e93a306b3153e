use std::time::{Duration, Instant};

pub(crate) const CONTROLS_HIDE_AFTER: Duration = Duration::from_millis(3_000);

/// Visibility of the on-screen playback controls.
///
/// Controls show on every interaction and hide once `hide_after` passes
/// without another one. Only the latest deadline counts.
#[derive(Debug, Clone)]
pub(crate) struct ControlsTimer {
    hide_after: Duration,
    shown: bool,
    deadline: Option<Instant>,
}

impl ControlsTimer {
    pub(crate) fn new(hide_after: Duration, now: Instant) -> Self {
        let mut timer = Self {
            hide_after,
            shown: false,
            deadline: None,
        };
        timer.touch(now);
        timer
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.shown = true;
        self.deadline = Some(now + self.hide_after);
    }

    pub(crate) fn toggle(&mut self, now: Instant) {
        if self.is_visible(now) {
            self.shown = false;
            self.deadline = None;
        } else {
            self.touch(now);
        }
    }

    pub(crate) fn is_visible(&self, now: Instant) -> bool {
        self.shown && self.deadline.is_none_or(|deadline| now < deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_until_deadline() {
        let start = Instant::now();
        let timer = ControlsTimer::new(CONTROLS_HIDE_AFTER, start);

        assert!(timer.is_visible(start));
        assert!(timer.is_visible(start + Duration::from_millis(2_999)));
        assert!(!timer.is_visible(start + CONTROLS_HIDE_AFTER));
    }

    #[test]
    fn later_touch_replaces_earlier_deadline() {
        let start = Instant::now();
        let mut timer = ControlsTimer::new(CONTROLS_HIDE_AFTER, start);

        timer.touch(start + Duration::from_millis(2_000));

        assert!(timer.is_visible(start + Duration::from_millis(4_000)));
        assert!(!timer.is_visible(start + Duration::from_millis(5_000)));
    }

    #[test]
    fn toggle_hides_and_reshows() {
        let start = Instant::now();
        let mut timer = ControlsTimer::new(CONTROLS_HIDE_AFTER, start);

        timer.toggle(start);
        assert!(!timer.is_visible(start));

        let later = start + Duration::from_millis(10_000);
        timer.toggle(later);
        assert!(timer.is_visible(later));
        assert!(!timer.is_visible(later + CONTROLS_HIDE_AFTER));
    }
}
