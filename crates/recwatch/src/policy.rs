//! Recording decision policy
//!
//! A pure function from one poll of telemetry, the operator's desired state
//! and the per-device watchdog memory to the action the supervisor should take.
//!
//! Cameras that report a recording flag are handled directly. Cameras that only
//! report remaining capacity are handled by rollover detection: remaining
//! capacity only shrinks while a clip records, so a jump upwards means the clip
//! ended and the camera is no longer recording.

use crate::camera::{CameraState, Reported};
use std::time::Duration;

/// `previous_remaining` before the first poll of a connection
pub const UNSEEN_REMAINING: Duration = Duration::from_secs(99 * 3600);

/// What the supervisor should do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    /// Stop (failure tolerated) then start recording
    Restart,
    Stop,
}

/// Per-connection memory of the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogMemory {
    /// A restart was issued and not yet followed by a stop
    pub started: bool,
    /// Remaining capacity seen on the last poll that reported it
    pub previous_remaining: Duration,
}

impl Default for WatchdogMemory {
    fn default() -> Self {
        Self {
            started: false,
            previous_remaining: UNSEEN_REMAINING,
        }
    }
}

/// Tunable thresholds of the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyThresholds {
    /// Restart a flagged camera when less than this capacity remains
    pub restart_margin: Duration,
    /// Minimum increase of remaining capacity that counts as a clip rollover
    pub rollover_jump: Duration,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            restart_margin: Duration::from_secs(10),
            rollover_jump: Duration::from_secs(60),
        }
    }
}

/// Decide the action for one tick and return the updated memory.
pub fn evaluate(
    state: &CameraState,
    desired: bool,
    memory: WatchdogMemory,
    thresholds: &PolicyThresholds,
) -> (Action, WatchdogMemory) {
    let mut next = memory;

    let action = if desired {
        let restart = match (state.recording, state.remaining) {
            (Reported::Known(recording), remaining) => {
                !recording
                    || matches!(remaining, Reported::Known(r) if r < thresholds.restart_margin)
            }
            (Reported::Unknown, Reported::Known(remaining)) => {
                remaining > memory.previous_remaining.saturating_add(thresholds.rollover_jump)
                    || !memory.started
            }
            (Reported::Unknown, Reported::Unknown) => false,
        };
        if restart {
            next.started = true;
            Action::Restart
        } else {
            Action::None
        }
    } else {
        let stop = match state.recording {
            Reported::Known(recording) => recording,
            Reported::Unknown => memory.started,
        };
        if stop {
            next.started = false;
            Action::Stop
        } else {
            Action::None
        }
    };

    if let Reported::Known(remaining) = state.remaining {
        next.previous_remaining = remaining;
    }

    (action, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn state(recording: Reported<bool>, remaining: Reported<Duration>) -> CameraState {
        CameraState {
            recording,
            remaining,
        }
    }

    fn memory(started: bool, previous: u64) -> WatchdogMemory {
        WatchdogMemory {
            started,
            previous_remaining: secs(previous),
        }
    }

    fn run(s: CameraState, desired: bool, m: WatchdogMemory) -> (Action, WatchdogMemory) {
        evaluate(&s, desired, m, &PolicyThresholds::default())
    }

    #[test]
    fn test_default_memory() {
        let m = WatchdogMemory::default();
        assert!(!m.started);
        assert_eq!(m.previous_remaining, secs(99 * 3600));
    }

    #[test]
    fn test_not_desired_and_not_started_never_stops() {
        let inputs = [
            state(Reported::Known(false), Reported::Known(secs(100))),
            state(Reported::Unknown, Reported::Known(secs(100))),
            state(Reported::Unknown, Reported::Unknown),
            state(Reported::Known(false), Reported::Unknown),
        ];
        for s in inputs {
            let mut m = WatchdogMemory::default();
            for _ in 0..5 {
                let (action, next) = run(s, false, m);
                assert_eq!(action, Action::None, "state {:?}", s);
                m = next;
            }
        }
    }

    #[test]
    fn test_flag_not_recording_restarts_regardless_of_remaining() {
        for remaining in [
            Reported::Known(secs(0)),
            Reported::Known(secs(5000)),
            Reported::Unknown,
        ] {
            let (action, next) = run(
                state(Reported::Known(false), remaining),
                true,
                WatchdogMemory::default(),
            );
            assert_eq!(action, Action::Restart);
            assert!(next.started);
        }
    }

    #[test]
    fn test_flag_recording_with_capacity_left_does_nothing() {
        let (action, next) = run(
            state(Reported::Known(true), Reported::Known(secs(15))),
            true,
            memory(true, 16),
        );
        assert_eq!(action, Action::None);
        assert_eq!(next.previous_remaining, secs(15));
    }

    #[test]
    fn test_flag_recording_near_limit_restarts() {
        let (action, _) = run(
            state(Reported::Known(true), Reported::Known(secs(5))),
            true,
            memory(true, 6),
        );
        assert_eq!(action, Action::Restart);
    }

    #[test]
    fn test_flag_recording_exactly_at_margin_does_nothing() {
        let (action, _) = run(
            state(Reported::Known(true), Reported::Known(secs(10))),
            true,
            memory(true, 11),
        );
        assert_eq!(action, Action::None);
    }

    #[test]
    fn test_counter_only_rollover_restarts() {
        let (action, next) = run(
            state(Reported::Unknown, Reported::Known(secs(1200))),
            true,
            memory(true, 1000),
        );
        assert_eq!(action, Action::Restart);
        assert!(next.started);
        assert_eq!(next.previous_remaining, secs(1200));
    }

    #[test]
    fn test_counter_only_small_jump_does_nothing() {
        let (action, next) = run(
            state(Reported::Unknown, Reported::Known(secs(1050))),
            true,
            memory(true, 1000),
        );
        assert_eq!(action, Action::None);
        assert_eq!(next.previous_remaining, secs(1050));

        let (action, _) = run(
            state(Reported::Unknown, Reported::Known(secs(1060))),
            true,
            memory(true, 1000),
        );
        assert_eq!(action, Action::None, "a jump of exactly 60s is not a rollover");
    }

    #[test]
    fn test_counter_only_first_tick_starts() {
        let (action, next) = run(
            state(Reported::Unknown, Reported::Known(secs(3600))),
            true,
            WatchdogMemory::default(),
        );
        assert_eq!(action, Action::Restart);

        // Once started, a normally decreasing counter is left alone
        let (action, _) = run(
            state(Reported::Unknown, Reported::Known(secs(3599))),
            true,
            next,
        );
        assert_eq!(action, Action::None);
    }

    #[test]
    fn test_no_telemetry_does_nothing() {
        let m = memory(false, 500);
        let (action, next) = run(state(Reported::Unknown, Reported::Unknown), true, m);
        assert_eq!(action, Action::None);
        assert_eq!(next, m);
    }

    #[test]
    fn test_desired_off_stops_flagged_recording() {
        let (action, next) = run(
            state(Reported::Known(true), Reported::Known(secs(900))),
            false,
            memory(true, 901),
        );
        assert_eq!(action, Action::Stop);
        assert!(!next.started);
    }

    #[test]
    fn test_desired_off_stops_counter_only_once() {
        let s = state(Reported::Unknown, Reported::Known(secs(900)));
        let (action, next) = run(s, false, memory(true, 901));
        assert_eq!(action, Action::Stop);
        assert!(!next.started);

        let (action, _) = run(s, false, next);
        assert_eq!(action, Action::None);
    }

    #[test]
    fn test_unknown_remaining_keeps_previous() {
        let (_, next) = run(
            state(Reported::Known(true), Reported::Unknown),
            true,
            memory(true, 321),
        );
        assert_eq!(next.previous_remaining, secs(321));
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = PolicyThresholds {
            restart_margin: secs(30),
            rollover_jump: secs(5),
        };
        let near_end = state(Reported::Known(true), Reported::Known(secs(20)));
        assert_eq!(
            evaluate(&near_end, true, memory(true, 21), &thresholds).0,
            Action::Restart
        );
        let rollover = state(Reported::Unknown, Reported::Known(secs(110)));
        assert_eq!(
            evaluate(&rollover, true, memory(true, 100), &thresholds).0,
            Action::Restart
        );
    }
}
