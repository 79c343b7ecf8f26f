//! Scrobble events and track identity
//!
//! A [`Scrobble`] is one occurrence of a track being played. It is created as
//! soon as the tracker confirms a track change and enriched asynchronously
//! with metadata from the remote service. Two scrobbles share a *track
//! identity* when title, artist and album match, independent of timestamp;
//! identity (not object identity) drives all cross-event propagation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::lastfm::TrackMetadata;

/// Equality key for a track, independent of when it was played.
///
/// The album component is the empty string for tracks without an album so
/// identities stay hashable and comparable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TrackIdentity {
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl TrackIdentity {
    pub fn new(title: &str, artist: &str, album: Option<&str>) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.unwrap_or("").to_string(),
        }
    }
}

impl std::fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// One play event, created on track change and finalized into history once
/// the scrobble threshold is met and the track changes away (or stops).
#[derive(Debug, Clone, Serialize)]
pub struct Scrobble {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub timestamp: DateTime<Utc>,

    // Enrichment fields, filled in asynchronously after creation
    pub lastfm_url: Option<String>,
    pub plays: Option<u64>,
    pub artist_plays: Option<u64>,
    pub loved: bool,
    pub canonical_album: Option<String>,
    pub artwork_url: Option<String>,
    pub artwork_url_small: Option<String>,
    pub is_loading: bool,
    pub has_error: bool,
}

impl Scrobble {
    /// Create a scrobble for a track that just started playing, stamped now.
    pub fn new(title: &str, artist: &str, album: Option<&str>) -> Self {
        Self::with_timestamp(title, artist, album, Utc::now())
    }

    /// Create a scrobble with an explicit timestamp (historical entries).
    pub fn with_timestamp(
        title: &str,
        artist: &str,
        album: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.map(|a| a.to_string()),
            timestamp,
            lastfm_url: None,
            plays: None,
            artist_plays: None,
            loved: false,
            canonical_album: None,
            artwork_url: None,
            artwork_url_small: None,
            is_loading: true,
            has_error: false,
        }
    }

    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity::new(&self.title, &self.artist, self.album.as_deref())
    }

    /// Whether two scrobbles refer to the same track, regardless of timestamp.
    pub fn same_track(&self, other: &Scrobble) -> bool {
        self.identity() == other.identity()
    }

    /// Whether enrichment has completed successfully for this event.
    pub fn has_metadata(&self) -> bool {
        self.lastfm_url.is_some()
    }

    /// Merge fetched metadata into this event and clear the loading flag.
    pub fn apply_metadata(&mut self, metadata: &TrackMetadata) {
        self.lastfm_url = metadata.url.clone();
        self.plays = metadata.plays;
        self.artist_plays = metadata.artist_plays;
        self.loved = metadata.loved;
        self.canonical_album = metadata.canonical_album.clone();
        self.artwork_url = metadata.artwork_url.clone();
        self.artwork_url_small = metadata.artwork_url_small.clone();
        self.is_loading = false;
        self.has_error = false;
    }

    /// Record a failed enrichment attempt. The event stays usable and the
    /// failure never blocks completion accounting.
    pub fn mark_enrichment_failed(&mut self) {
        self.is_loading = false;
        self.has_error = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_timestamp() {
        let a = Scrobble::new("Alone", "Marshmello", Some("Alone - Single"));
        let mut b = a.clone();
        b.timestamp = b.timestamp + chrono::Duration::hours(2);
        assert!(a.same_track(&b));
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn test_identity_distinguishes_artist() {
        // Same title by two different artists must not share identity
        let a = Scrobble::new("Alone", "Marshmello", None);
        let b = Scrobble::new("Alone", "Alan Walker", None);
        assert!(!a.same_track(&b));
    }

    #[test]
    fn test_missing_album_maps_to_empty_identity_component() {
        let with_none = Scrobble::new("Where It's At", "Beck", None);
        assert_eq!(with_none.identity().album, "");
    }

    #[test]
    fn test_apply_metadata_clears_loading() {
        let mut scrobble = Scrobble::new("Don't Stop", "Kuuro", None);
        assert!(scrobble.is_loading);
        assert!(!scrobble.has_metadata());

        let metadata = TrackMetadata {
            url: Some("https://www.last.fm/music/Kuuro/_/Don%27t+Stop".into()),
            plays: Some(12),
            artist_plays: Some(40),
            loved: true,
            ..Default::default()
        };
        scrobble.apply_metadata(&metadata);

        assert!(scrobble.has_metadata());
        assert!(!scrobble.is_loading);
        assert!(scrobble.loved);
        assert_eq!(scrobble.plays, Some(12));
    }

    #[test]
    fn test_failed_enrichment_sets_error_flag() {
        let mut scrobble = Scrobble::new("Grapevine", "Tiësto", None);
        scrobble.mark_enrichment_failed();
        assert!(scrobble.has_error);
        assert!(!scrobble.is_loading);
        assert!(!scrobble.has_metadata());
    }
}
