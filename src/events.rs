//! Observer events
//!
//! Every "emits" in the system is one of these typed events posted to the
//! broadcast channel in [`SharedState`](crate::state::SharedState). UI
//! layers subscribe and react; per-position events let list views update a
//! single row instead of refreshing everything.

use serde::Serialize;

use crate::history::Selection;

/// Summary of the in-progress track for the now-playing display.
#[derive(Debug, Clone, Serialize)]
pub struct NowPlayingSummary {
    pub track_title: String,
    pub artist_name: String,
    pub album_title: Option<String>,
    pub loved: bool,
    pub artwork_url: Option<String>,
    pub has_metadata: bool,
}

impl From<&crate::scrobble::Scrobble> for NowPlayingSummary {
    fn from(scrobble: &crate::scrobble::Scrobble) -> Self {
        Self {
            track_title: scrobble.title.clone(),
            artist_name: scrobble.artist.clone(),
            album_title: scrobble.album.clone(),
            loved: scrobble.loved,
            // History rows render the small artwork variant
            artwork_url: scrobble.artwork_url_small.clone(),
            has_metadata: scrobble.has_metadata(),
        }
    }
}

/// Events observable by the UI (or any other subscriber).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum AppEvent {
    /// The now-playing slot changed (new track, metadata update, or empty)
    NowPlayingChanged { summary: Option<NowPlayingSummary> },

    /// Progress toward the scrobble threshold (0.0..=1.0)
    ProgressChanged { progress: f64 },

    /// The selection cursor moved
    SelectionChanged { selection: Selection },

    /// The contents of the selected event changed
    SelectedScrobbleChanged,

    /// A finalized scrobble was prepended to history
    HistoryAppended,

    /// The whole history list was (re)loaded
    HistoryRefreshed,

    /// Artwork for one history row arrived
    ArtworkChanged { position: usize },

    /// Loved flag for one history row changed
    LovedChanged { position: usize },

    /// Aggregate loading indicator for the initial history batch
    LoadingIndicatorChanged { visible: bool },

    /// The friend roster was refreshed and resorted
    RosterRefreshed,

    /// Roster refresh in progress
    RosterLoadingChanged { visible: bool },

    /// Artwork for one roster row arrived
    RosterArtworkChanged { position: usize },

    /// Mini-mode preference toggled
    MiniModeChanged { enabled: bool },

    /// User-facing notification for a non-fatal error
    Notification { title: String, message: String },
}
