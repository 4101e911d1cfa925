//! Cooldown policy.
//!
//! A new resize is blocked until the window for its direction has passed
//! since the last operation completed (or started, when the completion
//! time is unknown). While overloaded the overload window applies instead.
//! A scale-in right after another scale-in is held back for three hours.

use dbscale_core::InstanceConfig;
use dbscale_state::ScalingState;
use tracing::{debug, info};

const MS_PER_MINUTE: u64 = 60_000;

/// Minimum time between two consecutive scale-in operations.
pub const SCALE_IN_REPEAT_WINDOW_MINUTES: u64 = 180;

/// Whether a resize from `config.current_size` to `suggested_size` must
/// wait, given the recorded `state` and the current time `now` (ms).
pub fn is_blocked(
    config: &InstanceConfig,
    suggested_size: u32,
    state: &ScalingState,
    now: u64,
) -> bool {
    let scale_out = suggested_size > config.current_size;
    let reference = state.cooldown_reference();

    if reference == 0 {
        debug!(
            project_id = %config.project_id,
            instance_id = %config.instance_id,
            "no previous scaling operation found"
        );
        info!(project_id = %config.project_id, instance_id = %config.instance_id, "autoscale allowed");
        return false;
    }

    let (direction, window_minutes) = window(config, scale_out);
    let window_ms = window_minutes.saturating_mul(MS_PER_MINUTE);
    let elapsed = now.saturating_sub(reference);
    let mut blocked = elapsed < window_ms;

    debug!(
        project_id = %config.project_id,
        instance_id = %config.instance_id,
        elapsed = %human_duration(elapsed),
        window = %human_duration(window_ms),
        "cooldown for {direction}"
    );

    if !scale_out
        && state.previous_was_scale_in()
        && elapsed < SCALE_IN_REPEAT_WINDOW_MINUTES * MS_PER_MINUTE
    {
        info!(
            project_id = %config.project_id,
            instance_id = %config.instance_id,
            elapsed = %human_duration(elapsed),
            "last scale-in too recent, another scale-in not allowed within 3h"
        );
        blocked = true;
    }

    if blocked {
        info!(project_id = %config.project_id, instance_id = %config.instance_id, "autoscale not allowed yet");
    } else {
        info!(project_id = %config.project_id, instance_id = %config.instance_id, "autoscale allowed");
    }
    blocked
}

/// Direction label and cooldown window (minutes) for the suggested move.
fn window(config: &InstanceConfig, scale_out: bool) -> (&'static str, u64) {
    if config.is_overloaded {
        let minutes = match config.overload_cooling_minutes {
            Some(minutes) => minutes,
            None => {
                info!(
                    project_id = %config.project_id,
                    instance_id = %config.instance_id,
                    "no overload cooldown configured, using scale-out window of {} minutes",
                    config.scale_out_cooling_minutes
                );
                config.scale_out_cooling_minutes
            }
        };
        let direction = if scale_out { "scale out during overload" } else { "scale in during overload" };
        return (direction, minutes);
    }

    if scale_out {
        ("scale out", config.scale_out_cooling_minutes)
    } else {
        ("scale in", config.scale_in_cooling_minutes)
    }
}

/// `3723000` → `1h 2m 3s`
pub(crate) fn human_duration(ms: u64) -> String {
    let secs = ms / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m {s}s"),
        _ => format!("{h}h {m}m {s}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: u64 = 1_700_000_000_000;

    fn minutes(n: u64) -> u64 {
        n * MS_PER_MINUTE
    }

    fn config(current: u32) -> InstanceConfig {
        let mut config = InstanceConfig::new("proj", "db-1", current);
        config.scale_out_cooling_minutes = 5;
        config.scale_in_cooling_minutes = 30;
        config
    }

    fn scaled_at(ts: u64) -> ScalingState {
        ScalingState {
            last_scaling_timestamp: ts,
            ..Default::default()
        }
    }

    #[test]
    fn never_scaled_is_not_blocked() {
        assert!(!is_blocked(&config(4), 8, &ScalingState::default(), T));
    }

    #[test]
    fn scale_out_window() {
        let state = scaled_at(T);
        assert!(is_blocked(&config(4), 8, &state, T + minutes(4)));
        assert!(!is_blocked(&config(4), 8, &state, T + minutes(6)));
    }

    #[test]
    fn window_boundary_is_allowed() {
        assert!(!is_blocked(&config(4), 8, &scaled_at(T), T + minutes(5)));
    }

    #[test]
    fn scale_in_uses_its_own_window() {
        let state = scaled_at(T);
        assert!(is_blocked(&config(8), 4, &state, T + minutes(10)));
        assert!(!is_blocked(&config(8), 4, &state, T + minutes(31)));
    }

    #[test]
    fn completion_time_takes_precedence() {
        let state = ScalingState {
            last_scaling_timestamp: T,
            last_scaling_complete_timestamp: T + minutes(10),
            ..Default::default()
        };
        assert!(is_blocked(&config(4), 8, &state, T + minutes(12)));
        assert!(!is_blocked(&config(4), 8, &state, T + minutes(16)));
    }

    #[test]
    fn overload_window_overrides_direction() {
        let mut c = config(4);
        c.is_overloaded = true;
        c.overload_cooling_minutes = Some(1);
        assert!(!is_blocked(&c, 8, &scaled_at(T), T + minutes(2)));
    }

    #[test]
    fn overload_without_window_uses_scale_out() {
        let mut c = config(8);
        c.scale_in_cooling_minutes = 1;
        c.is_overloaded = true;
        assert!(is_blocked(&c, 4, &scaled_at(T), T + minutes(3)));
        assert!(!is_blocked(&c, 4, &scaled_at(T), T + minutes(6)));
    }

    #[test]
    fn repeated_scale_in_is_held_back() {
        let state = ScalingState {
            last_scaling_timestamp: T,
            scaling_previous_size: Some(16),
            scaling_requested_size: Some(8),
            ..Default::default()
        };
        assert!(is_blocked(&config(8), 4, &state, T + minutes(120)));
        assert!(!is_blocked(&config(8), 4, &state, T + minutes(181)));
    }

    #[test]
    fn scale_out_after_scale_in_is_not_held_back() {
        let state = ScalingState {
            last_scaling_timestamp: T,
            scaling_previous_size: Some(16),
            scaling_requested_size: Some(8),
            ..Default::default()
        };
        assert!(!is_blocked(&config(8), 16, &state, T + minutes(6)));
    }

    #[test]
    fn clock_behind_reference_is_blocked() {
        assert!(is_blocked(&config(4), 8, &scaled_at(T), T - 1_000));
    }

    #[test]
    fn human_durations() {
        assert_eq!(human_duration(0), "0s");
        assert_eq!(human_duration(59_999), "59s");
        assert_eq!(human_duration(minutes(4)), "4m 0s");
        assert_eq!(human_duration(3_723_000), "1h 2m 3s");
    }
}
