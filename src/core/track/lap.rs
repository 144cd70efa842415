//! Crossing interpolation and lap pairing
//!
//! Two small state machines. The [`CrossingPairer`] pairs a pre-finish
//! fix with the next post-finish fix and interpolates the instant the
//! signed distance crossed zero, giving sub-sample timing from 1-10 Hz
//! fixes. The [`LapTimer`] pairs successive crossing times into lap
//! durations, rejecting stale references.

use super::sectors::{CrossingEvent, FinishSide};

/// Default staleness limit between paired crossing times, seconds
pub const DEFAULT_MAX_GAP_SECS: f64 = 300.0;

/// Interpolated finish-line crossing time from a straddling sample pair.
///
/// Preconditions: the pre sample on the negative-or-zero side, the post
/// sample on the positive-or-zero side, and both time and distance
/// strictly increasing. Any violation yields `None`; a bad sample pair
/// is a non-event, never a fabricated value.
pub fn interpolate(
    pre_time: f64,
    pre_distance: f64,
    post_time: f64,
    post_distance: f64,
) -> Option<f64> {
    if pre_distance > 0.0 || post_distance < 0.0 {
        return None;
    }
    if post_distance <= pre_distance || post_time <= pre_time {
        return None;
    }
    Some(pre_time - pre_distance * (post_time - pre_time) / (post_distance - pre_distance))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PairerState {
    Idle,
    PendingPre { pre_time: f64, pre_distance: f64 },
}

/// Pairs pre/post-finish crossings into interpolated crossing times.
///
/// Retains exactly one pending pre-finish slot; a fresh pre-finish fix
/// overwrites a stale one.
#[derive(Debug)]
pub struct CrossingPairer {
    state: PairerState,
}

impl CrossingPairer {
    /// Start idle with no pending crossing
    pub fn new() -> Self {
        Self {
            state: PairerState::Idle,
        }
    }

    /// Feed one classified fix; returns an interpolated crossing time
    /// when a valid pre/post pair completes.
    pub fn observe(&mut self, event: &CrossingEvent) -> Option<f64> {
        match event.side {
            FinishSide::PreFinish => {
                self.state = PairerState::PendingPre {
                    pre_time: event.seconds_utc,
                    pre_distance: event.signed_distance_m,
                };
                None
            }
            FinishSide::PostFinish => match std::mem::replace(&mut self.state, PairerState::Idle)
            {
                PairerState::Idle => None,
                PairerState::PendingPre {
                    pre_time,
                    pre_distance,
                } => {
                    let t = interpolate(
                        pre_time,
                        pre_distance,
                        event.seconds_utc,
                        event.signed_distance_m,
                    );
                    if t.is_none() {
                        tracing::debug!(
                            pre_time,
                            pre_distance,
                            post_time = event.seconds_utc,
                            post_distance = event.signed_distance_m,
                            "non-monotonic sample pair at finish crossing, dropped"
                        );
                    }
                    t
                }
            },
        }
    }
}

impl Default for CrossingPairer {
    fn default() -> Self {
        Self::new()
    }
}

/// A completed lap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LapRecord {
    /// Crossing time that started the lap, seconds since UTC midnight
    pub start_seconds: f64,
    /// Lap duration in seconds
    pub duration_seconds: f64,
    /// Reserved for pit-in/out invalidation; always true for now
    pub valid: bool,
}

impl LapRecord {
    /// Duration formatted as `minutes:seconds.hundredths`
    pub fn format_duration(&self) -> String {
        format_lap_time(self.duration_seconds)
    }
}

/// Format a duration as `m:ss.hh`, e.g. `1:35.32`
pub fn format_lap_time(seconds: f64) -> String {
    let mut minutes = (seconds / 60.0) as u64;
    let mut whole = (seconds % 60.0) as u64;
    let mut hundredths = ((seconds % 1.0) * 100.0).round() as u64;
    // carry when the fraction rounds up to a full second
    if hundredths == 100 {
        hundredths = 0;
        whole += 1;
        if whole == 60 {
            whole = 0;
            minutes += 1;
        }
    }
    format!("{minutes}:{whole:02}.{hundredths:02}")
}

/// Pairs successive crossing times into lap durations.
///
/// Retains exactly one reference-time slot. A gap beyond `max_gap`
/// emits nothing and restarts the reference, treating the new crossing
/// as the start of an unrelated session (out-lap, restart).
#[derive(Debug)]
pub struct LapTimer {
    reference: Option<f64>,
    max_gap: f64,
}

impl LapTimer {
    /// Timer with the default 300 s staleness limit
    pub fn new() -> Self {
        Self::with_max_gap(DEFAULT_MAX_GAP_SECS)
    }

    /// Timer with a custom staleness limit in seconds
    pub fn with_max_gap(max_gap: f64) -> Self {
        Self {
            reference: None,
            max_gap,
        }
    }

    /// Feed one crossing time; returns a lap when it pairs with the
    /// retained reference within `max_gap`.
    pub fn cross(&mut self, t: f64) -> Option<LapRecord> {
        let reference = self.reference.replace(t)?;
        let duration = t - reference;
        if duration > self.max_gap {
            tracing::debug!(
                gap = duration,
                max_gap = self.max_gap,
                "crossing gap exceeds limit, restarting reference"
            );
            return None;
        }
        Some(LapRecord {
            start_seconds: reference,
            duration_seconds: duration,
            valid: true,
        })
    }
}

impl Default for LapTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pre(t: f64, d: f64) -> CrossingEvent {
        CrossingEvent {
            side: FinishSide::PreFinish,
            seconds_utc: t,
            signed_distance_m: d,
        }
    }

    fn post(t: f64, d: f64) -> CrossingEvent {
        CrossingEvent {
            side: FinishSide::PostFinish,
            seconds_utc: t,
            signed_distance_m: d,
        }
    }

    #[test]
    fn test_interpolate_midpoint() {
        assert_eq!(interpolate(10.0, -2.0, 12.0, 2.0), Some(11.0));
    }

    #[test]
    fn test_interpolate_asymmetric() {
        // crossing three quarters of the way through the interval
        let t = interpolate(100.0, -3.0, 104.0, 1.0).unwrap();
        assert!((t - 103.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_rejects_same_sign_pairs() {
        assert_eq!(interpolate(10.0, 1.0, 12.0, 2.0), None);
        assert_eq!(interpolate(10.0, -2.0, 12.0, -1.0), None);
    }

    #[test]
    fn test_interpolate_rejects_non_monotonic_pairs() {
        assert_eq!(interpolate(12.0, -2.0, 10.0, 2.0), None);
        assert_eq!(interpolate(10.0, 0.0, 12.0, 0.0), None);
    }

    #[test]
    fn test_pairer_pairs_pre_then_post() {
        let mut pairer = CrossingPairer::new();
        assert_eq!(pairer.observe(&pre(10.0, -2.0)), None);
        assert_eq!(pairer.observe(&post(12.0, 2.0)), Some(11.0));
    }

    #[test]
    fn test_pairer_post_while_idle_is_no_event() {
        let mut pairer = CrossingPairer::new();
        assert_eq!(pairer.observe(&post(12.0, 2.0)), None);
    }

    #[test]
    fn test_pairer_fresh_pre_overwrites_stale_pending() {
        let mut pairer = CrossingPairer::new();
        pairer.observe(&pre(10.0, -4.0));
        pairer.observe(&pre(20.0, -2.0));
        assert_eq!(pairer.observe(&post(22.0, 2.0)), Some(21.0));
    }

    #[test]
    fn test_pairer_clears_pending_after_bad_pair() {
        let mut pairer = CrossingPairer::new();
        pairer.observe(&pre(10.0, 2.0)); // wrong side
        assert_eq!(pairer.observe(&post(12.0, 3.0)), None);
        // pending slot was consumed, another post pairs with nothing
        assert_eq!(pairer.observe(&post(14.0, 1.0)), None);
    }

    #[test]
    fn test_lap_timer_first_crossing_seeds_reference() {
        let mut timer = LapTimer::new();
        assert_eq!(timer.cross(100.0), None);
    }

    #[test]
    fn test_lap_timer_emits_duration_within_gap() {
        let mut timer = LapTimer::new();
        timer.cross(100.0);
        let lap = timer.cross(195.32).expect("within max_gap");
        assert!((lap.duration_seconds - 95.32).abs() < 1e-9);
        assert_eq!(lap.format_duration(), "1:35.32");
        assert!(lap.valid);
    }

    #[test]
    fn test_lap_timer_gap_restarts_reference() {
        let mut timer = LapTimer::new();
        timer.cross(100.0);
        assert_eq!(timer.cross(500.0), None);
        // reference moved to 500, so the next crossing pairs against it
        let lap = timer.cross(590.0).expect("paired with restarted reference");
        assert!((lap.duration_seconds - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_format_lap_time() {
        assert_eq!(format_lap_time(95.32), "1:35.32");
        assert_eq!(format_lap_time(60.0), "1:00.00");
        assert_eq!(format_lap_time(59.999), "1:00.00");
        assert_eq!(format_lap_time(125.07), "2:05.07");
    }
}
