use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub const MIN_DURATION_MINUTES: u32 = 5;
pub const MAX_DURATION_MINUTES: u32 = 180;
pub const DEFAULT_DURATION_MINUTES: u32 = 20;

/// Seconds between interval bells.
pub const INTERVAL_SECS: u64 = 600;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    /// Stopped and waiting for the session to be committed or discarded.
    Stopped,
}

/// What a single tick of the countdown observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Progress { remaining_secs: u64 },
    Interval { elapsed_secs: u64, remaining_secs: u64 },
    Completed { duration_minutes: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: TimerStatus,
    pub duration_minutes: u32,
    pub elapsed_secs: u64,
    pub started_at: Option<DateTime<Utc>>,
    /// Captured when the session starts; elapsed time is always measured
    /// against it so a suspended process catches up on the next tick.
    #[serde(skip)]
    pub running_anchor: Option<Instant>,
    /// Index of the last 10-minute boundary a bell was rung for.
    #[serde(skip)]
    pub last_interval_mark: u64,
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION_MINUTES)
    }
}

impl TimerState {
    pub fn new(duration_minutes: u32) -> Self {
        Self {
            status: TimerStatus::Idle,
            duration_minutes,
            elapsed_secs: 0,
            started_at: None,
            running_anchor: None,
            last_interval_mark: 0,
        }
    }

    pub fn target_secs(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    pub fn remaining_secs(&self) -> u64 {
        match self.status {
            TimerStatus::Idle => self.target_secs(),
            TimerStatus::Running | TimerStatus::Stopped => {
                self.target_secs().saturating_sub(self.elapsed_secs)
            }
        }
    }

    pub fn is_valid_duration(minutes: u32) -> bool {
        (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes)
    }

    /// Only meaningful while idle; the caller enforces that.
    pub fn set_duration(&mut self, minutes: u32) {
        *self = Self::new(minutes);
    }

    pub fn begin(&mut self, start_at: DateTime<Utc>, now: Instant) {
        *self = Self {
            status: TimerStatus::Running,
            duration_minutes: self.duration_minutes,
            elapsed_secs: 0,
            started_at: Some(start_at),
            running_anchor: Some(now),
            last_interval_mark: 0,
        };
    }

    pub fn sync_elapsed(&mut self, now: Instant) {
        if let (TimerStatus::Running, Some(anchor)) = (self.status, self.running_anchor) {
            self.elapsed_secs = now.saturating_duration_since(anchor).as_secs();
        }
    }

    /// Advance the countdown to `now`. Returns `None` unless the timer is running.
    pub fn tick(&mut self, now: Instant) -> Option<Tick> {
        if self.status != TimerStatus::Running {
            return None;
        }

        self.sync_elapsed(now);
        let target = self.target_secs();

        if self.elapsed_secs >= target {
            self.elapsed_secs = target;
            self.halt();
            return Some(Tick::Completed {
                duration_minutes: self.duration_minutes,
            });
        }

        let remaining_secs = target - self.elapsed_secs;
        let mark = self.elapsed_secs / INTERVAL_SECS;
        if mark > self.last_interval_mark {
            self.last_interval_mark = mark;
            return Some(Tick::Interval {
                elapsed_secs: mark * INTERVAL_SECS,
                remaining_secs,
            });
        }

        Some(Tick::Progress { remaining_secs })
    }

    /// Stop a running countdown and report the elapsed whole minutes, rounded up.
    pub fn stop(&mut self, now: Instant) -> Option<u32> {
        if self.status != TimerStatus::Running {
            return None;
        }
        self.sync_elapsed(now);
        self.elapsed_secs = self.elapsed_secs.min(self.target_secs());
        self.halt();
        Some(self.elapsed_minutes())
    }

    pub fn elapsed_minutes(&self) -> u32 {
        let minutes = self.elapsed_secs.div_ceil(60).max(1);
        u32::try_from(minutes)
            .unwrap_or(u32::MAX)
            .min(self.duration_minutes)
    }

    fn halt(&mut self) {
        self.status = TimerStatus::Stopped;
        self.running_anchor = None;
    }

    /// Back to idle with the configured duration restored.
    pub fn reset(&mut self) {
        *self = Self::new(self.duration_minutes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn running(minutes: u32) -> (TimerState, Instant) {
        let mut state = TimerState::new(minutes);
        let start = Instant::now();
        state.begin(Utc::now(), start);
        (state, start)
    }

    fn at(start: Instant, secs: u64) -> Instant {
        start + Duration::from_secs(secs)
    }

    #[test]
    fn idle_reports_full_duration() {
        let state = TimerState::new(30);
        assert_eq!(state.status, TimerStatus::Idle);
        assert_eq!(state.remaining_secs(), 1800);
        assert!(state.clone().tick(Instant::now()).is_none());
    }

    #[test]
    fn progress_counts_down_from_anchor() {
        let (mut state, start) = running(5);
        assert_eq!(
            state.tick(at(start, 1)),
            Some(Tick::Progress { remaining_secs: 299 })
        );
        // A long gap between ticks is caught up in one step.
        assert_eq!(
            state.tick(at(start, 250)),
            Some(Tick::Progress { remaining_secs: 50 })
        );
    }

    #[test]
    fn interval_fires_once_per_boundary_below_target() {
        let (mut state, start) = running(30);
        let mut intervals = Vec::new();
        for secs in 0..=1800 {
            if let Some(Tick::Interval { elapsed_secs, .. }) = state.tick(at(start, secs)) {
                intervals.push(elapsed_secs);
            }
        }
        assert_eq!(intervals, vec![600, 1200]);
        assert_eq!(state.status, TimerStatus::Stopped);
    }

    #[test]
    fn repeated_ticks_at_same_instant_do_not_refire_interval() {
        let (mut state, start) = running(20);
        assert!(matches!(
            state.tick(at(start, 600)),
            Some(Tick::Interval { elapsed_secs: 600, .. })
        ));
        assert!(matches!(
            state.tick(at(start, 600)),
            Some(Tick::Progress { remaining_secs: 600 })
        ));
    }

    #[test]
    fn late_tick_still_rings_crossed_boundary() {
        let (mut state, start) = running(20);
        assert_eq!(
            state.tick(at(start, 603)),
            Some(Tick::Interval {
                elapsed_secs: 600,
                remaining_secs: 597
            })
        );
    }

    #[test]
    fn no_interval_at_completion() {
        let (mut state, start) = running(10);
        assert_eq!(
            state.tick(at(start, 600)),
            Some(Tick::Completed { duration_minutes: 10 })
        );
        assert_eq!(state.remaining_secs(), 0);
        assert!(state.tick(at(start, 601)).is_none());
    }

    #[test]
    fn overshoot_never_goes_negative() {
        let (mut state, start) = running(5);
        assert_eq!(
            state.tick(at(start, 10_000)),
            Some(Tick::Completed { duration_minutes: 5 })
        );
        assert_eq!(state.remaining_secs(), 0);
        assert_eq!(state.elapsed_minutes(), 5);
    }

    #[test]
    fn stop_rounds_elapsed_up_to_whole_minutes() {
        for (secs, minutes) in [(0, 1), (1, 1), (60, 1), (61, 2), (1205, 21), (1200, 20)] {
            let (mut state, start) = running(180);
            assert_eq!(state.stop(at(start, secs)), Some(minutes), "stop at {secs}s");
            assert_eq!(state.status, TimerStatus::Stopped);
        }
    }

    #[test]
    fn stop_is_capped_at_configured_duration() {
        let (mut state, start) = running(5);
        assert_eq!(state.stop(at(start, 400)), Some(5));
    }

    #[test]
    fn stop_when_not_running_is_ignored() {
        let mut state = TimerState::new(5);
        assert_eq!(state.stop(Instant::now()), None);
        assert_eq!(state.status, TimerStatus::Idle);
    }

    #[test]
    fn reset_restores_full_duration() {
        let (mut state, start) = running(15);
        state.stop(at(start, 90));
        state.reset();
        assert_eq!(state.status, TimerStatus::Idle);
        assert_eq!(state.remaining_secs(), 900);
        assert!(state.started_at.is_none());
    }

    #[test]
    fn duration_bounds() {
        assert!(!TimerState::is_valid_duration(4));
        assert!(TimerState::is_valid_duration(5));
        assert!(TimerState::is_valid_duration(180));
        assert!(!TimerState::is_valid_duration(181));
    }
}
