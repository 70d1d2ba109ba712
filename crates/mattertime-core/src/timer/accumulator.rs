//! Duration accounting.
//!
//! Converts a start/stop pair into elapsed seconds and folds it into a
//! running total. Nothing here touches storage or the clock.

use chrono::{DateTime, Utc};

use crate::error::TimerError;

/// Whole seconds between `start` and `stop`.
///
/// # Errors
/// Returns [`TimerError::InvalidInterval`] when `stop` is before `start`.
pub fn elapsed(start: DateTime<Utc>, stop: DateTime<Utc>) -> Result<u64, TimerError> {
    let secs = (stop - start).num_seconds();
    if stop < start {
        return Err(TimerError::InvalidInterval { start, stop });
    }
    Ok(secs as u64)
}

/// `total_before + elapsed(start, stop)`, saturating at `u64::MAX`.
///
/// # Errors
/// Propagates [`TimerError::InvalidInterval`] from [`elapsed`].
pub fn accumulate(
    total_before: u64,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
) -> Result<u64, TimerError> {
    Ok(total_before.saturating_add(elapsed(start, stop)?))
}

/// A finalized interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Seconds actually credited. Zero when the interval was clamped.
    pub duration_secs: u64,
    /// The clock ran backwards and the interval was clamped to zero.
    pub clamped: bool,
}

/// Finalize an interval, clamping a negative one to zero.
///
/// Used by the state machine, where a clock anomaly must never abort the
/// transition or reduce the total. The clamp is logged.
pub fn finalize(start: DateTime<Utc>, stop: DateTime<Utc>) -> Interval {
    match elapsed(start, stop) {
        Ok(duration_secs) => Interval {
            started_at: start,
            ended_at: stop,
            duration_secs,
            clamped: false,
        },
        Err(err) => {
            tracing::warn!(%start, %stop, "{err}; crediting zero seconds");
            Interval {
                started_at: start,
                ended_at: start,
                duration_secs: 0,
                clamped: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn elapsed_whole_seconds() {
        assert_eq!(elapsed(t0(), t0() + Duration::seconds(125)).unwrap(), 125);
        assert_eq!(elapsed(t0(), t0()).unwrap(), 0);
        // Sub-second remainders are truncated.
        assert_eq!(
            elapsed(t0(), t0() + Duration::milliseconds(1_999)).unwrap(),
            1
        );
    }

    #[test]
    fn negative_interval_is_rejected() {
        let err = elapsed(t0(), t0() - Duration::seconds(1)).unwrap_err();
        assert!(matches!(err, TimerError::InvalidInterval { .. }));
    }

    #[test]
    fn accumulate_adds_to_prior_total() {
        assert_eq!(accumulate(125, t0(), t0() + Duration::seconds(10)).unwrap(), 135);
        assert_eq!(
            accumulate(u64::MAX - 1, t0(), t0() + Duration::seconds(10)).unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn finalize_clamps_backwards_clock() {
        let interval = finalize(t0(), t0() - Duration::seconds(60));
        assert!(interval.clamped);
        assert_eq!(interval.duration_secs, 0);
        assert_eq!(interval.ended_at, interval.started_at);
    }

    #[test]
    fn finalize_keeps_forward_interval() {
        let interval = finalize(t0(), t0() + Duration::seconds(60));
        assert!(!interval.clamped);
        assert_eq!(interval.duration_secs, 60);
    }
}
