//! Scrobble threshold policy
//!
//! Pure computation of play progress toward the scrobble threshold from
//! cached timing data. Progress is relative to a configurable fraction of
//! the track length (0.75 by default), compensating for custom track start
//! and finish times.

use crate::error::{Error, Result};

/// Compute progress toward the scrobble threshold, clamped to 1.0.
///
/// `furthest` is the furthest playback position reached (seconds), which the
/// tracker keeps monotone even if the player reports a rewind. A
/// non-positive relative track length is bad configuration data and is
/// surfaced as an error rather than silently divided.
pub fn scrobble_progress(
    furthest: f64,
    track_start: f64,
    track_finish: f64,
    fraction: f64,
) -> Result<f64> {
    let relative_length = track_finish - track_start;
    // NaN compares false against everything, so the non-positive check
    // alone would let a NaN length through and arm the track instantly
    if !relative_length.is_finite() || relative_length <= 0.0 {
        return Err(Error::Config(format!(
            "bad track length: start {track_start}, finish {track_finish}"
        )));
    }
    if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
        return Err(Error::Config(format!(
            "scrobble threshold fraction out of range: {fraction}"
        )));
    }

    let relative_position = (furthest - track_start).max(0.0);
    let threshold_length = relative_length * fraction;

    Ok((relative_position / threshold_length).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_reaches_one_at_threshold() {
        // 75% of a 100 second track is reached at position 75
        let progress = scrobble_progress(75.0, 0.0, 100.0, 0.75).unwrap();
        assert!((progress - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_clamps_at_one() {
        let progress = scrobble_progress(90.0, 0.0, 100.0, 0.75).unwrap();
        assert_eq!(progress, 1.0);
    }

    #[test]
    fn test_progress_is_monotone_for_increasing_positions() {
        let mut last = 0.0;
        for position in [0.0, 10.0, 30.0, 55.0, 74.0, 76.0, 100.0] {
            let progress = scrobble_progress(position, 0.0, 100.0, 0.75).unwrap();
            assert!(progress >= last, "progress regressed at position {position}");
            last = progress;
        }
    }

    #[test]
    fn test_non_finite_track_length_is_rejected() {
        assert!(scrobble_progress(10.0, 0.0, f64::NAN, 0.75).is_err());
        assert!(scrobble_progress(10.0, f64::NAN, 100.0, 0.75).is_err());
        assert!(scrobble_progress(10.0, 0.0, f64::INFINITY, 0.75).is_err());
        assert!(scrobble_progress(10.0, 0.0, 100.0, f64::NAN).is_err());
    }

    #[test]
    fn test_position_before_track_start_counts_as_zero() {
        // Custom track start times can put the reported position before the
        // start of the track proper
        let progress = scrobble_progress(5.0, 10.0, 110.0, 0.75).unwrap();
        assert_eq!(progress, 0.0);
    }

    #[test]
    fn test_compensates_for_custom_start_time() {
        let progress = scrobble_progress(85.0, 10.0, 110.0, 0.75).unwrap();
        assert!((progress - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_positive_length_is_an_error() {
        assert!(scrobble_progress(10.0, 0.0, 0.0, 0.75).is_err());
        assert!(scrobble_progress(10.0, 50.0, 40.0, 0.75).is_err());
    }

    #[test]
    fn test_bad_fraction_is_an_error() {
        assert!(scrobble_progress(10.0, 0.0, 100.0, 0.0).is_err());
        assert!(scrobble_progress(10.0, 0.0, 100.0, 1.5).is_err());
    }
}
