//! Mock media player
//!
//! Scripted track table with deliberately awkward entries: a track with no
//! artist, consecutive tracks sharing a title, long names, diacritics. Used
//! for development without a real player and by the integration tests. The
//! position advances a fixed amount per poll; controls allow jumping
//! straight to the threshold or to the next track.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{PlayerSnapshot, PlayerSource};

/// One scripted track in the mock rotation.
struct MockTrack {
    title: &'static str,
    artist: &'static str,
    album: Option<&'static str>,
    track_start: f64,
    track_finish: f64,
}

const MOCK_TRACKS: &[MockTrack] = &[
    // Album on Last.fm doesn't match the player's album title
    MockTrack {
        title: "Don't Stop",
        artist: "Kuuro",
        album: Some("Don't Stop - Single"),
        track_start: 0.0,
        track_finish: 100.0,
    },
    // No album at all
    MockTrack {
        title: "Where It's At",
        artist: "Beck",
        album: None,
        track_start: 0.0,
        track_finish: 100.0,
    },
    // Consecutive tracks with the same title
    MockTrack {
        title: "Alone",
        artist: "Marshmello",
        album: None,
        track_start: 0.0,
        track_finish: 100.0,
    },
    MockTrack {
        title: "Alone",
        artist: "Alan Walker",
        album: None,
        track_start: 0.0,
        track_finish: 100.0,
    },
    // Missing artist: produces an invalid snapshot on purpose
    MockTrack {
        title: "localtrack.mp3",
        artist: "",
        album: None,
        track_start: 0.0,
        track_finish: 100.0,
    },
    // Several artists in one credit
    MockTrack {
        title: "Flames",
        artist: "R3HAB, ZAYN & Jungleboi",
        album: Some("Flames (The EP)"),
        track_start: 0.0,
        track_finish: 100.0,
    },
    // Diacritics in the artist name
    MockTrack {
        title: "Grapevine",
        artist: "Tiësto",
        album: Some("Grapevine - Single"),
        track_start: 0.0,
        track_finish: 221.0,
    },
];

struct MockState {
    track_index: usize,
    position: f64,
    playing: bool,
}

/// Scripted player selected by the mock-data configuration flag.
pub struct MockPlayer {
    state: Mutex<MockState>,
    /// Seconds the position advances per poll
    step: f64,
}

impl MockPlayer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                track_index: 0,
                position: 0.0,
                playing: true,
            }),
            step: 1.0,
        }
    }

    /// Advance the rotation to the next scripted track.
    pub fn next_track(&self) {
        let mut state = self.state.lock().unwrap();
        state.track_index = (state.track_index + 1) % MOCK_TRACKS.len();
        state.position = 0.0;
    }

    /// Jump straight to the scrobble threshold of the current track.
    pub fn seek_to_threshold(&self) {
        let mut state = self.state.lock().unwrap();
        let track = &MOCK_TRACKS[state.track_index];
        state.position = track.track_finish * 0.75;
    }

    pub fn set_position(&self, position: f64) {
        self.state.lock().unwrap().position = position;
    }

    pub fn set_playing(&self, playing: bool) {
        self.state.lock().unwrap().playing = playing;
    }
}

impl Default for MockPlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlayerSource for MockPlayer {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn poll(&self) -> PlayerSnapshot {
        let mut state = self.state.lock().unwrap();
        let track = &MOCK_TRACKS[state.track_index];

        if state.playing {
            state.position += self.step;
        }

        PlayerSnapshot {
            is_playing: state.playing,
            track_title: track.title.to_string(),
            artist_name: track.artist.to_string(),
            album_title: track.album.map(|a| a.to_string()),
            position_seconds: state.position,
            track_start_seconds: track.track_start,
            track_finish_seconds: track.track_finish,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_position_advances_per_poll() {
        let player = MockPlayer::new();
        let first = player.poll().await;
        let second = player.poll().await;
        assert!(second.position_seconds > first.position_seconds);
        assert_eq!(first.track_title, second.track_title);
    }

    #[tokio::test]
    async fn test_next_track_resets_position() {
        let player = MockPlayer::new();
        player.set_position(50.0);
        player.next_track();
        let snapshot = player.poll().await;
        assert_eq!(snapshot.track_title, "Where It's At");
        assert!(snapshot.position_seconds < 50.0);
    }

    #[tokio::test]
    async fn test_seek_to_threshold() {
        let player = MockPlayer::new();
        player.seek_to_threshold();
        let snapshot = player.poll().await;
        assert!(snapshot.position_seconds >= 75.0);
    }

    #[tokio::test]
    async fn test_paused_player_reports_not_playing() {
        let player = MockPlayer::new();
        player.set_playing(false);
        let snapshot = player.poll().await;
        assert!(!snapshot.is_playing);
        // Metadata is still reported while paused
        assert!(!snapshot.track_title.is_empty());
    }
}
