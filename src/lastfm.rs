//! Last.fm API client
//!
//! The remote scrobble service behind the [`ScrobbleService`] trait: track
//! metadata lookups for enrichment, now-playing announcements, scrobble
//! submission, loved-status updates, recent history, and the friends
//! endpoints used by the roster. The client is constructed explicitly and
//! passed where needed; there is no process-wide instance.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::roster::{FriendProfile, FriendTrack};
use crate::scrobble::{Scrobble, TrackIdentity};

const LASTFM_API_ROOT: &str = "https://ws.audioscrobbler.com/2.0/";
const USER_AGENT: &str = "lastwave/0.1 (https://github.com/lastwave/lastwave)";

/// Last.fm client errors
#[derive(Debug, Error)]
pub enum LastfmError {
    #[error("network error: {0}")]
    Network(String),

    #[error("track not found: {0}")]
    NotFound(String),

    #[error("not authenticated with Last.fm")]
    NotAuthenticated,

    #[error("API error {0}: {1}")]
    Api(i64, String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Metadata fetched asynchronously for one track identity.
#[derive(Debug, Clone, Default)]
pub struct TrackMetadata {
    pub url: Option<String>,
    pub plays: Option<u64>,
    pub artist_plays: Option<u64>,
    pub loved: bool,
    pub canonical_album: Option<String>,
    pub artwork_url: Option<String>,
    pub artwork_url_small: Option<String>,
}

/// One completed (or in-progress) play from the user's remote history.
#[derive(Debug, Clone)]
pub struct RecentTrack {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub now_playing: bool,
}

/// Abstract contract for the remote scrobble service.
#[async_trait]
pub trait ScrobbleService: Send + Sync {
    async fn track_metadata(
        &self,
        identity: &TrackIdentity,
    ) -> Result<TrackMetadata, LastfmError>;

    async fn update_now_playing(&self, identity: &TrackIdentity) -> Result<(), LastfmError>;

    async fn submit(&self, scrobble: &Scrobble) -> Result<(), LastfmError>;

    async fn set_loved(&self, identity: &TrackIdentity, loved: bool)
        -> Result<(), LastfmError>;

    async fn recent_tracks(&self, count: usize) -> Result<Vec<RecentTrack>, LastfmError>;

    async fn friends(&self) -> Result<Vec<FriendProfile>, LastfmError>;

    async fn friend_last_track(
        &self,
        username: &str,
    ) -> Result<Option<FriendTrack>, LastfmError>;
}

/// HTTP client for the Last.fm web service.
pub struct LastfmClient {
    http: reqwest::Client,
    api_key: String,
    session_key: Option<String>,
    username: String,
}

impl LastfmClient {
    pub fn new(
        api_key: String,
        session_key: Option<String>,
        username: String,
    ) -> Result<Self, LastfmError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LastfmError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            session_key,
            username,
        })
    }

    async fn get(
        &self,
        method: &str,
        params: Vec<(&str, String)>,
    ) -> Result<serde_json::Value, LastfmError> {
        let mut query = vec![
            ("method", method.to_string()),
            ("api_key", self.api_key.clone()),
            ("format", "json".to_string()),
        ];
        query.extend(params);

        debug!(method, "querying Last.fm API");
        let response = self
            .http
            .get(LASTFM_API_ROOT)
            .query(&query)
            .send()
            .await
            .map_err(|e| LastfmError::Network(e.to_string()))?;

        Self::decode(response).await
    }

    async fn post(
        &self,
        method: &str,
        params: Vec<(&str, String)>,
    ) -> Result<serde_json::Value, LastfmError> {
        let session_key = self
            .session_key
            .as_ref()
            .ok_or(LastfmError::NotAuthenticated)?;

        let mut form = vec![
            ("method", method.to_string()),
            ("api_key", self.api_key.clone()),
            ("sk", session_key.clone()),
            ("format", "json".to_string()),
        ];
        form.extend(params);

        debug!(method, "posting to Last.fm API");
        let response = self
            .http
            .post(LASTFM_API_ROOT)
            .form(&form)
            .send()
            .await
            .map_err(|e| LastfmError::Network(e.to_string()))?;

        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<serde_json::Value, LastfmError> {
        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LastfmError::Parse(e.to_string()))?;

        // Last.fm reports most failures in the body, not the status line
        if let Some(code) = body.get("error").and_then(|e| e.as_i64()) {
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            // Error 6: "parameters incorrect", returned for unknown tracks
            if code == 6 {
                return Err(LastfmError::NotFound(message));
            }
            return Err(LastfmError::Api(code, message));
        }

        if !status.is_success() {
            return Err(LastfmError::Api(status.as_u16() as i64, status.to_string()));
        }

        Ok(body)
    }

    fn identity_params(identity: &TrackIdentity) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("track", identity.title.clone()),
            ("artist", identity.artist.clone()),
        ];
        if !identity.album.is_empty() {
            params.push(("album", identity.album.clone()));
        }
        params
    }
}

#[async_trait]
impl ScrobbleService for LastfmClient {
    async fn track_metadata(
        &self,
        identity: &TrackIdentity,
    ) -> Result<TrackMetadata, LastfmError> {
        let mut params = Self::identity_params(identity);
        params.push(("username", self.username.clone()));
        params.push(("autocorrect", "1".to_string()));

        let body = self.get("track.getInfo", params).await?;
        let info: TrackInfoResponse = serde_json::from_value(body)
            .map_err(|e| LastfmError::Parse(e.to_string()))?;
        let track = info.track;

        let album = track.album.unwrap_or_default();
        let mut metadata = TrackMetadata {
            url: track.url,
            plays: parse_count(&track.user_playcount),
            artist_plays: None,
            loved: track.user_loved.as_deref() == Some("1"),
            canonical_album: album.title,
            artwork_url: pick_image(&album.image, "extralarge"),
            artwork_url_small: pick_image(&album.image, "medium"),
        };

        // Artist play count comes from a second endpoint
        let artist_body = self
            .get(
                "artist.getInfo",
                vec![
                    ("artist", identity.artist.clone()),
                    ("username", self.username.clone()),
                    ("autocorrect", "1".to_string()),
                ],
            )
            .await?;
        let artist: ArtistInfoResponse = serde_json::from_value(artist_body)
            .map_err(|e| LastfmError::Parse(e.to_string()))?;
        metadata.artist_plays = artist
            .artist
            .stats
            .and_then(|stats| parse_count(&stats.user_playcount));

        Ok(metadata)
    }

    async fn update_now_playing(&self, identity: &TrackIdentity) -> Result<(), LastfmError> {
        self.post("track.updateNowPlaying", Self::identity_params(identity))
            .await?;
        Ok(())
    }

    async fn submit(&self, scrobble: &Scrobble) -> Result<(), LastfmError> {
        let mut params = vec![
            ("track", scrobble.title.clone()),
            ("artist", scrobble.artist.clone()),
            ("timestamp", scrobble.timestamp.timestamp().to_string()),
        ];
        if let Some(album) = &scrobble.album {
            params.push(("album", album.clone()));
        }
        self.post("track.scrobble", params).await?;
        Ok(())
    }

    async fn set_loved(
        &self,
        identity: &TrackIdentity,
        loved: bool,
    ) -> Result<(), LastfmError> {
        let method = if loved { "track.love" } else { "track.unlove" };
        self.post(
            method,
            vec![
                ("track", identity.title.clone()),
                ("artist", identity.artist.clone()),
            ],
        )
        .await?;
        Ok(())
    }

    async fn recent_tracks(&self, count: usize) -> Result<Vec<RecentTrack>, LastfmError> {
        let body = self
            .get(
                "user.getRecentTracks",
                vec![
                    ("user", self.username.clone()),
                    ("limit", count.to_string()),
                ],
            )
            .await?;
        let parsed: RecentTracksResponse = serde_json::from_value(body)
            .map_err(|e| LastfmError::Parse(e.to_string()))?;

        let mut tracks = Vec::new();
        for entry in parsed.recenttracks.track {
            let now_playing = entry
                .attr
                .as_ref()
                .and_then(|attr| attr.nowplaying.as_deref())
                == Some("true");
            let timestamp = entry
                .date
                .as_ref()
                .and_then(|date| date.uts.parse::<i64>().ok())
                .and_then(|uts| Utc.timestamp_opt(uts, 0).single())
                .unwrap_or_else(Utc::now);

            tracks.push(RecentTrack {
                title: entry.name,
                artist: entry.artist.text,
                album: entry.album.and_then(|album| {
                    if album.text.is_empty() {
                        None
                    } else {
                        Some(album.text)
                    }
                }),
                timestamp,
                now_playing,
            });
        }
        Ok(tracks)
    }

    async fn friends(&self) -> Result<Vec<FriendProfile>, LastfmError> {
        let body = self
            .get("user.getFriends", vec![("user", self.username.clone())])
            .await?;
        let parsed: FriendsResponse = serde_json::from_value(body)
            .map_err(|e| LastfmError::Parse(e.to_string()))?;

        Ok(parsed
            .friends
            .user
            .into_iter()
            .map(|user| FriendProfile {
                username: user.name,
                real_name: user.realname.filter(|name| !name.is_empty()),
                url: user.url,
                image_url: pick_image(&user.image, "medium"),
            })
            .collect())
    }

    async fn friend_last_track(
        &self,
        username: &str,
    ) -> Result<Option<FriendTrack>, LastfmError> {
        let body = self
            .get(
                "user.getRecentTracks",
                vec![
                    ("user", username.to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        let parsed: RecentTracksResponse = serde_json::from_value(body)
            .map_err(|e| LastfmError::Parse(e.to_string()))?;

        Ok(parsed.recenttracks.track.into_iter().next().map(|entry| {
            let is_playing = entry
                .attr
                .as_ref()
                .and_then(|attr| attr.nowplaying.as_deref())
                == Some("true");
            FriendTrack {
                title: entry.name,
                artist: entry.artist.text,
                album: entry.album.and_then(|album| {
                    if album.text.is_empty() {
                        None
                    } else {
                        Some(album.text)
                    }
                }),
                url: entry.url,
                artwork_url: None,
                is_playing,
            }
        }))
    }
}

fn parse_count(value: &Option<String>) -> Option<u64> {
    value.as_ref().and_then(|v| v.parse().ok())
}

fn pick_image(images: &[ImageRef], size: &str) -> Option<String> {
    images
        .iter()
        .find(|image| image.size == size)
        .or_else(|| images.last())
        .map(|image| image.url.clone())
        .filter(|url| !url.is_empty())
}

// --- Response shapes (only the fields we read) ---

#[derive(Debug, Deserialize)]
struct TrackInfoResponse {
    track: TrackInfo,
}

#[derive(Debug, Deserialize)]
struct TrackInfo {
    url: Option<String>,
    #[serde(rename = "userplaycount")]
    user_playcount: Option<String>,
    #[serde(rename = "userloved")]
    user_loved: Option<String>,
    album: Option<AlbumInfo>,
}

#[derive(Debug, Deserialize, Default)]
struct AlbumInfo {
    title: Option<String>,
    #[serde(default)]
    image: Vec<ImageRef>,
}

#[derive(Debug, Deserialize)]
struct ImageRef {
    #[serde(rename = "#text")]
    url: String,
    size: String,
}

#[derive(Debug, Deserialize)]
struct ArtistInfoResponse {
    artist: ArtistInfo,
}

#[derive(Debug, Deserialize)]
struct ArtistInfo {
    stats: Option<ArtistStats>,
}

#[derive(Debug, Deserialize)]
struct ArtistStats {
    #[serde(rename = "userplaycount")]
    user_playcount: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecentTracksResponse {
    recenttracks: RecentTracksInner,
}

#[derive(Debug, Deserialize)]
struct RecentTracksInner {
    #[serde(default)]
    track: Vec<RecentTrackEntry>,
}

#[derive(Debug, Deserialize)]
struct RecentTrackEntry {
    name: String,
    artist: TextField,
    album: Option<TextField>,
    url: Option<String>,
    date: Option<DateField>,
    #[serde(rename = "@attr")]
    attr: Option<RecentTrackAttr>,
}

#[derive(Debug, Deserialize)]
struct TextField {
    #[serde(rename = "#text")]
    text: String,
}

#[derive(Debug, Deserialize)]
struct DateField {
    uts: String,
}

#[derive(Debug, Deserialize)]
struct RecentTrackAttr {
    nowplaying: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FriendsResponse {
    friends: FriendsInner,
}

#[derive(Debug, Deserialize)]
struct FriendsInner {
    #[serde(default)]
    user: Vec<FriendUser>,
}

#[derive(Debug, Deserialize)]
struct FriendUser {
    name: String,
    realname: Option<String>,
    url: Option<String>,
    #[serde(default)]
    image: Vec<ImageRef>,
}
