//! Playback tracker state machine
//!
//! Consumes one [`PlayerSnapshot`] per poll tick and advances the in-progress
//! scrobble: validates snapshots, debounces transient bad metadata during
//! track transitions, keeps the furthest-position watermark monotone, and
//! arms the event for submission once the threshold is reached.
//!
//! The tracker is deliberately a pure state machine: it mutates only its own
//! state and reports required side effects through [`TrackerOutcome`], which
//! the owning actor applies (history append, enrichment dispatch, observer
//! notifications). It is never called concurrently with itself.

use tracing::{debug, error, trace};

use crate::player::PlayerSnapshot;
use crate::scrobble::Scrobble;
use crate::tracking::threshold;

/// Cached timing data for the in-progress track.
#[derive(Debug, Clone, Default)]
struct CachedTiming {
    /// Furthest playback position reached, monotone under backward scrubbing
    furthest_position_reached: f64,
    track_start: f64,
    track_finish: f64,
    /// Consecutive suppressed ticks since the last accepted change
    ticks_since_change: u32,
}

/// Coarse tracker state for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    /// No track playing
    NoTrack,
    /// Track adopted, metadata still loading
    TrackLoading,
    /// Track playing, progress below the threshold
    TrackPlaying,
    /// Threshold reached, eligible for finalize-on-change or finalize-on-stop
    TrackArmed,
}

/// Side effects the owner must apply after a tick.
#[derive(Debug, Default)]
pub struct TrackerOutcome {
    /// User-visible (title, message) notification to raise
    pub notification: Option<(String, String)>,
    /// Outgoing armed scrobble to finalize into history, before the newly
    /// adopted track is announced
    pub finalized: Option<Scrobble>,
    /// A new in-progress scrobble was adopted this tick
    pub adopted: bool,
    /// The now-playing slot was emptied (player stopped)
    pub cleared: bool,
    /// Progress recomputed this tick (0.0..=1.0)
    pub progress: Option<f64>,
    /// The in-progress scrobble crossed the threshold this tick
    pub newly_armed: bool,
}

/// State machine owning the in-progress scrobble.
pub struct PlaybackTracker {
    current: Option<Scrobble>,
    timing: CachedTiming,
    armed_for_submission: bool,
    track_valid: bool,
    progress: f64,
    threshold_fraction: f64,
    debounce_ticks: u32,
}

impl PlaybackTracker {
    pub fn new(threshold_fraction: f64, debounce_ticks: u32) -> Self {
        Self {
            current: None,
            timing: CachedTiming::default(),
            armed_for_submission: false,
            // Start valid so a broken player raises one notification
            track_valid: true,
            progress: 0.0,
            threshold_fraction,
            debounce_ticks,
        }
    }

    pub fn current(&self) -> Option<&Scrobble> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut Scrobble> {
        self.current.as_mut()
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn armed(&self) -> bool {
        self.armed_for_submission
    }

    pub fn phase(&self) -> TrackerPhase {
        match &self.current {
            None => TrackerPhase::NoTrack,
            Some(current) if current.is_loading => TrackerPhase::TrackLoading,
            Some(_) if self.armed_for_submission => TrackerPhase::TrackArmed,
            Some(_) => TrackerPhase::TrackPlaying,
        }
    }

    /// Take the in-progress scrobble if it is armed; used at shutdown to
    /// finalize a qualifying track the player never changed away from.
    pub fn take_armed(&mut self) -> Option<Scrobble> {
        if self.armed_for_submission {
            self.armed_for_submission = false;
            self.current.take()
        } else {
            None
        }
    }

    /// Advance the state machine with a fresh snapshot.
    pub fn on_snapshot(&mut self, snapshot: &PlayerSnapshot) -> TrackerOutcome {
        let mut outcome = TrackerOutcome::default();

        // Transport errors and unusable metadata share the
        // notify-once-then-suppress rule: one notification per distinct
        // breakage until a valid snapshot arrives.
        let invalid_reason = if let Some(error) = &snapshot.error {
            Some(error.clone())
        } else if snapshot.track_title.is_empty() || snapshot.artist_name.is_empty() {
            Some("Track title and artist metadata are required".to_string())
        } else {
            None
        };

        if let Some(reason) = invalid_reason {
            if self.track_valid {
                self.track_valid = false;
                debug!("error loading media player state: {reason}");
                outcome.notification =
                    Some(("Error loading current track".to_string(), reason));
            } else {
                trace!("suppressing repeated invalid snapshot: {reason}");
            }
            return outcome;
        }
        self.track_valid = true;

        // Player stopped: empty the now-playing slot.
        if !snapshot.is_playing {
            if self.current.take().is_some() {
                self.armed_for_submission = false;
                self.progress = 0.0;
                outcome.cleared = true;
            }
            return outcome;
        }

        let track_changed = match &self.current {
            None => true,
            Some(current) => {
                snapshot.track_title != current.title
                    || snapshot.artist_name != current.artist
                    || snapshot.album_title.as_deref().unwrap_or("")
                        != current.album.as_deref().unwrap_or("")
            }
        };

        if track_changed {
            let mut suppressed = false;

            // A changed artist or album under an unchanged title could be the
            // player misreporting metadata mid-transition. Hold the change
            // until it survives `debounce_ticks` consecutive polls.
            if let Some(current) = &self.current {
                if snapshot.track_title == current.title {
                    self.timing.ticks_since_change += 1;
                    if self.timing.ticks_since_change < self.debounce_ticks {
                        debug!(
                            new = %format!("{} - {}", snapshot.artist_name, snapshot.track_title),
                            current = %format!("{} - {}", current.artist, current.title),
                            "skipping potentially bad media player data"
                        );
                        suppressed = true;
                    }
                }
            }

            if !suppressed {
                // Finalize the outgoing track first so history stays ordered
                // and each qualifying track is emitted exactly once.
                if self.armed_for_submission {
                    outcome.finalized = self.current.take();
                }

                self.current = Some(Scrobble::new(
                    &snapshot.track_title,
                    &snapshot.artist_name,
                    snapshot.album_title.as_deref(),
                ));
                self.armed_for_submission = false;
                self.progress = 0.0;
                self.timing = CachedTiming {
                    furthest_position_reached: 0.0,
                    track_start: snapshot.track_start_seconds,
                    track_finish: snapshot.track_finish_seconds,
                    ticks_since_change: 0,
                };
                outcome.adopted = true;

                trace!(
                    "now playing: {} - {} | {}",
                    snapshot.artist_name,
                    snapshot.track_title,
                    snapshot.album_title.as_deref().unwrap_or("")
                );
            }
        } else {
            // The reported track settled back onto the current one
            self.timing.ticks_since_change = 0;
        }

        // Scrubbing backward never reduces reported progress. A
        // debounce-suppressed tick still updates timing for the old track;
        // its title was unchanged, so the position plausibly belongs to it.
        if snapshot.position_seconds > self.timing.furthest_position_reached {
            self.timing.furthest_position_reached = snapshot.position_seconds;
        }

        if self.current.is_some() {
            match threshold::scrobble_progress(
                self.timing.furthest_position_reached,
                self.timing.track_start,
                self.timing.track_finish,
                self.threshold_fraction,
            ) {
                Ok(progress) => {
                    self.progress = progress;
                    outcome.progress = Some(progress);
                    if progress >= 1.0 && !self.armed_for_submission {
                        self.armed_for_submission = true;
                        outcome.newly_armed = true;
                        if let Some(current) = &self.current {
                            debug!("{}: ready for submission", current.title);
                        }
                    }
                }
                // Bad timing data must not stop the poll loop
                Err(e) => error!("cannot compute scrobble progress: {e}"),
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(title: &str, artist: &str, position: f64) -> PlayerSnapshot {
        PlayerSnapshot {
            is_playing: true,
            track_title: title.to_string(),
            artist_name: artist.to_string(),
            album_title: None,
            position_seconds: position,
            track_start_seconds: 0.0,
            track_finish_seconds: 100.0,
            error: None,
        }
    }

    fn stopped(title: &str, artist: &str) -> PlayerSnapshot {
        PlayerSnapshot {
            is_playing: false,
            ..playing(title, artist, 0.0)
        }
    }

    fn tracker() -> PlaybackTracker {
        PlaybackTracker::new(0.75, 3)
    }

    #[test]
    fn test_adopts_first_track() {
        let mut tracker = tracker();
        let outcome = tracker.on_snapshot(&playing("A", "X", 0.0));

        assert!(outcome.adopted);
        assert!(outcome.finalized.is_none());
        assert_eq!(tracker.current().unwrap().title, "A");
        assert_eq!(tracker.phase(), TrackerPhase::TrackLoading);
    }

    #[test]
    fn test_worked_example_arms_and_finalizes_exactly_once() {
        // Stream from the design notes: A/X at 0, 76, 90, then B/Y at 0 with
        // a 0.75 threshold on a 100 second track.
        let mut tracker = tracker();
        tracker.on_snapshot(&playing("A", "X", 0.0));

        let outcome = tracker.on_snapshot(&playing("A", "X", 76.0));
        assert_eq!(outcome.progress, Some(1.0));
        assert!(outcome.newly_armed);
        assert!(tracker.armed());

        // More ticks on the same armed track must not re-arm or finalize
        let outcome = tracker.on_snapshot(&playing("A", "X", 90.0));
        assert!(!outcome.newly_armed);
        assert!(outcome.finalized.is_none());

        let outcome = tracker.on_snapshot(&playing("B", "Y", 0.0));
        assert_eq!(outcome.finalized.as_ref().unwrap().title, "A");
        assert!(outcome.adopted);
        assert!(!tracker.armed());
        assert_eq!(tracker.current().unwrap().title, "B");
    }

    #[test]
    fn test_unqualified_track_is_not_finalized_on_change() {
        let mut tracker = tracker();
        tracker.on_snapshot(&playing("A", "X", 0.0));
        tracker.on_snapshot(&playing("A", "X", 30.0));

        let outcome = tracker.on_snapshot(&playing("B", "Y", 0.0));
        assert!(outcome.finalized.is_none());
        assert!(outcome.adopted);
    }

    #[test]
    fn test_scrubbing_backward_keeps_progress() {
        let mut tracker = tracker();
        tracker.on_snapshot(&playing("A", "X", 0.0));
        tracker.on_snapshot(&playing("A", "X", 50.0));
        let before = tracker.progress();

        let outcome = tracker.on_snapshot(&playing("A", "X", 10.0));
        assert_eq!(outcome.progress, Some(before));
        assert_eq!(tracker.progress(), before);

        // Real progress overtakes the watermark again
        tracker.on_snapshot(&playing("A", "X", 60.0));
        assert!(tracker.progress() > before);
    }

    #[test]
    fn test_debounce_suppresses_metadata_flips_under_same_title() {
        let mut tracker = tracker();
        tracker.on_snapshot(&playing("Alone", "Marshmello", 10.0));

        // Artist flips while the title stays put: suppressed twice, accepted
        // on the third consecutive tick.
        let outcome = tracker.on_snapshot(&playing("Alone", "Alan Walker", 11.0));
        assert!(!outcome.adopted);
        assert_eq!(tracker.current().unwrap().artist, "Marshmello");

        let outcome = tracker.on_snapshot(&playing("Alone", "Alan Walker", 12.0));
        assert!(!outcome.adopted);

        let outcome = tracker.on_snapshot(&playing("Alone", "Alan Walker", 13.0));
        assert!(outcome.adopted);
        assert_eq!(tracker.current().unwrap().artist, "Alan Walker");
    }

    #[test]
    fn test_debounce_counter_resets_when_metadata_settles() {
        let mut tracker = tracker();
        tracker.on_snapshot(&playing("Alone", "Marshmello", 10.0));

        tracker.on_snapshot(&playing("Alone", "Alan Walker", 11.0));
        tracker.on_snapshot(&playing("Alone", "Alan Walker", 12.0));
        // Flap resolves back to the current track
        tracker.on_snapshot(&playing("Alone", "Marshmello", 13.0));

        // A fresh flip starts counting from zero again
        let outcome = tracker.on_snapshot(&playing("Alone", "Alan Walker", 14.0));
        assert!(!outcome.adopted);
        assert_eq!(tracker.current().unwrap().artist, "Marshmello");
    }

    #[test]
    fn test_title_change_is_accepted_immediately() {
        let mut tracker = tracker();
        tracker.on_snapshot(&playing("A", "X", 10.0));

        let outcome = tracker.on_snapshot(&playing("B", "X", 0.0));
        assert!(outcome.adopted);
        assert_eq!(tracker.current().unwrap().title, "B");
    }

    #[test]
    fn test_debounced_tick_still_updates_old_track_progress() {
        let mut tracker = tracker();
        tracker.on_snapshot(&playing("Alone", "Marshmello", 10.0));

        let outcome = tracker.on_snapshot(&playing("Alone", "Alan Walker", 80.0));
        assert!(!outcome.adopted);
        // Timing kept flowing for the old track and armed it
        assert_eq!(outcome.progress, Some(1.0));
        assert!(tracker.armed());
    }

    #[test]
    fn test_invalid_snapshot_notifies_exactly_once() {
        let mut tracker = tracker();
        tracker.on_snapshot(&playing("A", "X", 10.0));

        let invalid = playing("localtrack.mp3", "", 5.0);
        let outcome = tracker.on_snapshot(&invalid);
        assert!(outcome.notification.is_some());
        // Current event is left untouched
        assert_eq!(tracker.current().unwrap().title, "A");

        let outcome = tracker.on_snapshot(&invalid);
        assert!(outcome.notification.is_none());

        // A valid snapshot re-arms the notification
        tracker.on_snapshot(&playing("A", "X", 11.0));
        let outcome = tracker.on_snapshot(&invalid);
        assert!(outcome.notification.is_some());
    }

    #[test]
    fn test_transport_error_notifies_once_and_suppresses() {
        let mut tracker = tracker();
        let broken = PlayerSnapshot::from_error("player is not running");

        let outcome = tracker.on_snapshot(&broken);
        assert!(outcome.notification.is_some());

        let outcome = tracker.on_snapshot(&broken);
        assert!(outcome.notification.is_none());
    }

    #[test]
    fn test_stop_clears_current_event() {
        let mut tracker = tracker();
        tracker.on_snapshot(&playing("A", "X", 80.0));
        assert!(tracker.armed());

        let outcome = tracker.on_snapshot(&stopped("A", "X"));
        assert!(outcome.cleared);
        assert!(tracker.current().is_none());
        assert_eq!(tracker.phase(), TrackerPhase::NoTrack);
        assert_eq!(tracker.progress(), 0.0);

        // A second stopped snapshot observes nothing
        let outcome = tracker.on_snapshot(&stopped("A", "X"));
        assert!(!outcome.cleared);
    }

    #[test]
    fn test_take_armed_returns_qualifying_track_once() {
        let mut tracker = tracker();
        tracker.on_snapshot(&playing("A", "X", 80.0));

        let taken = tracker.take_armed();
        assert_eq!(taken.unwrap().title, "A");
        assert!(tracker.take_armed().is_none());
    }

    #[test]
    fn test_zero_length_track_does_not_stop_the_loop() {
        let mut tracker = tracker();
        let mut snapshot = playing("A", "X", 10.0);
        snapshot.track_finish_seconds = 0.0;

        let outcome = tracker.on_snapshot(&snapshot);
        assert!(outcome.adopted);
        assert!(outcome.progress.is_none());
        assert!(!tracker.armed());

        // The tracker keeps processing subsequent ticks
        let outcome = tracker.on_snapshot(&playing("B", "Y", 0.0));
        assert!(outcome.adopted);
    }
}
