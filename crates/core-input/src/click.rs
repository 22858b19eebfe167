//! Click-count computation for consecutive mouse-down events.
//!
//! A run of `Down` events for the same button at the same coordinates,
//! each arriving within `threshold` of the previous one, increments the
//! click count up to a maximum of 3 (double/triple click); anything else
//! resets the run to a single click.

use core_events::{MouseAction, MouseButton, MouseEvent};
use std::time::{Duration, Instant};

pub const DEFAULT_THRESHOLD: Duration = Duration::from_millis(300);
const MAX_CLICK_COUNT: u8 = 3;

struct LastDown {
    button: MouseButton,
    x: u16,
    y: u16,
    at: Instant,
    count: u8,
}

/// Stateful counter; one instance lives for the life of the input task.
pub struct ClickCounter {
    threshold: Duration,
    last: Option<LastDown>,
}

impl ClickCounter {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last: None,
        }
    }

    /// Annotates `event.click_count` in place for `Down` events; all other
    /// actions pass through unchanged and do not affect the run.
    pub fn annotate(&mut self, event: &mut MouseEvent) {
        if event.action != MouseAction::Down {
            return;
        }
        self.annotate_at(event, Instant::now());
    }

    fn annotate_at(&mut self, event: &mut MouseEvent, now: Instant) {
        let count = match &self.last {
            Some(last)
                if last.button == event.button
                    && last.x == event.x
                    && last.y == event.y
                    && now.saturating_duration_since(last.at) <= self.threshold =>
            {
                (last.count + 1).min(MAX_CLICK_COUNT)
            }
            _ => 1,
        };
        event.click_count = count;
        self.last = Some(LastDown {
            button: event.button,
            x: event.x,
            y: event.y,
            at: now,
            count,
        });
    }
}

impl Default for ClickCounter {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
