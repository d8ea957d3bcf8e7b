//! Blink timing for the border
//!
//! Two states: `Steady` (border always drawn) and `Blinking` (visibility
//! toggles on every timer tick). The timer is a `tokio::time::Interval`
//! owned by the scheduler, so dropping it cancels all pending ticks.

use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use crate::matcher::VisualSpec;

enum BlinkState {
    Steady,
    Blinking { interval: Duration, timer: Interval },
}

/// What `apply` did to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkChange {
    Unchanged,
    Started,
    Restarted,
    Stopped,
}

pub struct BlinkScheduler {
    state: BlinkState,
    visible: bool,
}

impl Default for BlinkScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BlinkScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlinkScheduler")
            .field("interval", &self.interval())
            .field("visible", &self.visible)
            .finish()
    }
}

impl BlinkScheduler {
    pub fn new() -> Self {
        Self {
            state: BlinkState::Steady,
            visible: true,
        }
    }

    /// Bring the scheduler in line with a freshly resolved spec.
    ///
    /// An unchanged interval keeps the running timer so unrelated config
    /// changes do not reset the blink phase.
    pub fn apply(&mut self, spec: &VisualSpec) -> BlinkChange {
        if !spec.blinks() {
            return if self.stop() { BlinkChange::Stopped } else { BlinkChange::Unchanged };
        }

        let wanted = Duration::from_millis(spec.blink_interval_ms as u64);
        match &self.state {
            BlinkState::Blinking { interval, .. } if *interval == wanted => BlinkChange::Unchanged,
            BlinkState::Blinking { .. } => {
                self.start(wanted);
                BlinkChange::Restarted
            }
            BlinkState::Steady => {
                self.start(wanted);
                BlinkChange::Started
            }
        }
    }

    fn start(&mut self, interval: Duration) {
        // First toggle happens one full period after (re)start
        let mut timer = time::interval_at(Instant::now() + interval, interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval_ms = interval.as_millis() as u64, "Blink timer started");
        self.state = BlinkState::Blinking { interval, timer };
        self.visible = true;
    }

    /// Cancel the timer and reset to visible. Returns whether a timer was running.
    pub fn stop(&mut self) -> bool {
        let was_blinking = matches!(self.state, BlinkState::Blinking { .. });
        if was_blinking {
            debug!("Blink timer stopped");
        }
        self.state = BlinkState::Steady;
        self.visible = true;
        was_blinking
    }

    /// Completes at the next timer tick; pending forever while steady.
    /// Cancel-safe, intended for `tokio::select!`.
    pub async fn next_tick(&mut self) {
        match &mut self.state {
            BlinkState::Blinking { timer, .. } => {
                timer.tick().await;
            }
            BlinkState::Steady => std::future::pending::<()>().await,
        }
    }

    /// Toggle visibility after a tick. Ignored while steady.
    pub fn on_tick(&mut self) -> bool {
        if self.is_blinking() {
            self.visible = !self.visible;
        }
        self.visible
    }

    pub fn is_blinking(&self) -> bool {
        matches!(self.state, BlinkState::Blinking { .. })
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn interval(&self) -> Option<Duration> {
        match &self.state {
            BlinkState::Blinking { interval, .. } => Some(*interval),
            BlinkState::Steady => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    fn spec(blinking: bool, interval_ms: u32) -> VisualSpec {
        VisualSpec {
            color: Some(Rgb::from_rgb24(0xFF0000)),
            blinking,
            blink_interval_ms: interval_ms,
            ..VisualSpec::disabled()
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_toggles_every_interval() {
        let mut blink = BlinkScheduler::new();
        assert_eq!(blink.apply(&spec(true, 300)), BlinkChange::Started);
        assert!(blink.is_visible());

        let start = Instant::now();
        blink.next_tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(300));
        assert!(!blink.on_tick());

        blink.next_tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(600));
        assert!(blink.on_tick());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_same_interval_keeps_timer_phase() {
        let mut blink = BlinkScheduler::new();
        let start = Instant::now();
        blink.apply(&spec(true, 500));

        time::advance(Duration::from_millis(400)).await;
        assert_eq!(blink.apply(&spec(true, 500)), BlinkChange::Unchanged);

        blink.next_tick().await;
        // Still the original schedule: no restart, no extra period
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_changed_interval_restarts_timer() {
        let mut blink = BlinkScheduler::new();
        let start = Instant::now();
        blink.apply(&spec(true, 500));

        time::advance(Duration::from_millis(400)).await;
        assert_eq!(blink.apply(&spec(true, 300)), BlinkChange::Restarted);
        assert_eq!(blink.interval(), Some(Duration::from_millis(300)));

        blink.next_tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(700));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_stop_resets_visibility_and_cancels_ticks() {
        let mut blink = BlinkScheduler::new();
        blink.apply(&spec(true, 200));
        blink.next_tick().await;
        assert!(!blink.on_tick());

        assert_eq!(blink.apply(&spec(false, 200)), BlinkChange::Stopped);
        assert!(blink.is_visible());
        assert!(!blink.is_blinking());

        let fired = time::timeout(Duration::from_secs(10), blink.next_tick()).await;
        assert!(fired.is_err(), "steady scheduler must not tick");
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_no_color_never_blinks() {
        let mut blink = BlinkScheduler::new();
        let no_color = VisualSpec { color: None, ..spec(true, 300) };
        assert_eq!(blink.apply(&no_color), BlinkChange::Unchanged);
        assert!(!blink.is_blinking());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut blink = BlinkScheduler::new();
        assert!(!blink.stop());
        assert!(!blink.stop());
        assert!(blink.is_visible());
        // Ticks while steady leave the border visible
        assert!(blink.on_tick());
    }
}
