//! Playback tracking
//!
//! The state machine that owns "the track currently playing", decides when a
//! track qualifies as a scrobble, and the pure threshold policy it uses.

pub mod threshold;
pub mod tracker;

pub use tracker::{PlaybackTracker, TrackerOutcome, TrackerPhase};
