//! Friend roster
//!
//! Secondary view of the same shape as history: a list of remote users each
//! carrying at most one "current or last track" summary. Refreshes fan out
//! one track fetch per friend; once all have answered, the list re-sorts
//! with currently-playing friends first, friends with any track second, and
//! the original alphabetical order as stable tiebreak. Artwork enrichment
//! for playing friends goes through the same dedup coordinator as history.

use serde::Serialize;

/// Remote user profile as returned by the friends endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct FriendProfile {
    pub username: String,
    pub real_name: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

/// A friend's current or most recent track.
#[derive(Debug, Clone, Serialize)]
pub struct FriendTrack {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub url: Option<String>,
    pub artwork_url: Option<String>,
    pub is_playing: bool,
}

/// One roster row.
#[derive(Debug, Clone, Serialize)]
pub struct Friend {
    pub username: String,
    pub real_name: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub last_track: Option<FriendTrack>,
    pub is_loading: bool,
}

impl Friend {
    fn from_profile(profile: FriendProfile) -> Self {
        Self {
            username: profile.username,
            real_name: profile.real_name,
            url: profile.url,
            image_url: profile.image_url,
            last_track: None,
            is_loading: true,
        }
    }
}

/// Roster state owned by the actor.
pub struct FriendRoster {
    friends: Vec<Friend>,
    /// Friends whose track fetch has answered during the current refresh
    loaded_count: usize,
    is_refreshing: bool,
}

impl FriendRoster {
    pub fn new() -> Self {
        Self {
            friends: Vec::new(),
            loaded_count: 0,
            is_refreshing: false,
        }
    }

    pub fn friends(&self) -> &[Friend] {
        &self.friends
    }

    pub fn is_refreshing(&self) -> bool {
        self.is_refreshing
    }

    /// Guard against overlapping refreshes. Returns false when one is
    /// already running.
    pub fn begin_refresh(&mut self) -> bool {
        if self.is_refreshing {
            return false;
        }
        self.is_refreshing = true;
        self.loaded_count = 0;
        true
    }

    /// Install the fetched friend list, alphabetical by username. Returns
    /// true when the set of usernames actually changed.
    pub fn apply_friends(&mut self, profiles: Vec<FriendProfile>) -> bool {
        let mut incoming: Vec<String> = profiles.iter().map(|p| p.username.clone()).collect();
        let mut existing: Vec<String> =
            self.friends.iter().map(|f| f.username.clone()).collect();
        incoming.sort();
        existing.sort();
        let changed = incoming != existing;

        if changed {
            let mut friends: Vec<Friend> =
                profiles.into_iter().map(Friend::from_profile).collect();
            friends.sort_by_key(|f| f.username.to_lowercase());
            self.friends = friends;
        } else {
            for friend in &mut self.friends {
                friend.is_loading = true;
            }
        }
        self.loaded_count = 0;
        changed
    }

    /// Record one friend's track result. Returns true once every friend has
    /// answered and the roster has been re-sorted.
    pub fn apply_track(&mut self, username: &str, track: Option<FriendTrack>) -> bool {
        if let Some(friend) = self.friends.iter_mut().find(|f| f.username == username) {
            friend.last_track = track;
            friend.is_loading = false;
        }

        // Count every answer, found or not; this tracks loading, not success
        self.loaded_count += 1;
        if self.loaded_count >= self.friends.len() {
            self.resort();
            self.is_refreshing = false;
            return true;
        }
        false
    }

    /// Abort a refresh that failed before any track fetches ran.
    pub fn finish_refresh(&mut self) {
        self.is_refreshing = false;
    }

    /// Playing first, any-track second, alphabetical as stable tiebreak.
    /// The list is already alphabetical, so a stable sort on the two
    /// activity keys preserves username order within each group.
    fn resort(&mut self) {
        self.friends.sort_by_key(|friend| {
            let playing = friend
                .last_track
                .as_ref()
                .map(|t| t.is_playing)
                .unwrap_or(false);
            let has_track = friend.last_track.is_some();
            (!playing, !has_track)
        });
    }

    /// Rows whose playing track matches the given title/artist; used to
    /// apply artwork from enrichment results by position.
    pub fn positions_playing(&self, title: &str, artist: &str) -> Vec<usize> {
        self.friends
            .iter()
            .enumerate()
            .filter(|(_, friend)| {
                friend
                    .last_track
                    .as_ref()
                    .map(|t| t.is_playing && t.title == title && t.artist == artist)
                    .unwrap_or(false)
            })
            .map(|(position, _)| position)
            .collect()
    }

    pub fn set_artwork(&mut self, position: usize, artwork_url: Option<String>) {
        if let Some(track) = self
            .friends
            .get_mut(position)
            .and_then(|friend| friend.last_track.as_mut())
        {
            track.artwork_url = artwork_url;
        }
    }
}

impl Default for FriendRoster {
    fn default() -> Self {
        Self::new()
    }
}
