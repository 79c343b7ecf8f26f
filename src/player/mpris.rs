//! MPRIS media player source (Linux)
//!
//! Polls an MPRIS-capable player (Spotify, mpv, ...) over the D-Bus session
//! bus using the `org.mpris.MediaPlayer2.Player` properties. Any D-Bus
//! failure (player quit, bus gone) is folded into `snapshot.error`; fields
//! the player omits simply come back empty, which the tracker treats as
//! invalid metadata with its own notify-once rule.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;
use zbus::{Connection, Proxy};
use zvariant::OwnedValue;

use crate::error::{Error, Result};

use super::{PlayerSnapshot, PlayerSource};

const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";
const MPRIS_PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";

/// Player source backed by an MPRIS bus name, e.g.
/// `org.mpris.MediaPlayer2.spotify`.
pub struct MprisPlayer {
    connection: Connection,
    bus_name: String,
}

impl MprisPlayer {
    pub async fn connect(bus_name: &str) -> Result<Self> {
        let connection = Connection::session()
            .await
            .map_err(|e| Error::Player(format!("cannot connect to session bus: {e}")))?;
        debug!(bus = bus_name, "connected to session bus for MPRIS polling");

        Ok(Self {
            connection,
            bus_name: bus_name.to_string(),
        })
    }

    async fn read_snapshot(&self) -> zbus::Result<PlayerSnapshot> {
        let proxy = Proxy::new(
            &self.connection,
            self.bus_name.as_str(),
            MPRIS_PATH,
            MPRIS_PLAYER_INTERFACE,
        )
        .await?;

        let status: String = proxy.get_property("PlaybackStatus").await?;
        let mut metadata: HashMap<String, OwnedValue> =
            proxy.get_property("Metadata").await?;

        // Some players don't expose Position; treat that as the start
        let position_us: i64 = proxy.get_property("Position").await.unwrap_or(0);

        let track_title = metadata
            .remove("xesam:title")
            .and_then(|v| String::try_from(v).ok())
            .unwrap_or_default();
        let artist_name = metadata
            .remove("xesam:artist")
            .and_then(|v| Vec::<String>::try_from(v).ok())
            .map(|artists| artists.join(", "))
            .unwrap_or_default();
        let album_title = metadata
            .remove("xesam:album")
            .and_then(|v| String::try_from(v).ok())
            .filter(|album| !album.is_empty());

        // mpris:length is microseconds, reported as either signed or
        // unsigned depending on the player
        let length_us = match metadata.remove("mpris:length") {
            Some(value) => {
                let signed = value.try_clone().ok().and_then(|v| i64::try_from(v).ok());
                signed
                    .or_else(|| u64::try_from(value).ok().map(|v| v as i64))
                    .unwrap_or(0)
            }
            None => 0,
        };

        Ok(PlayerSnapshot {
            is_playing: status == "Playing",
            track_title,
            artist_name,
            album_title,
            position_seconds: position_us as f64 / 1_000_000.0,
            track_start_seconds: 0.0,
            track_finish_seconds: length_us as f64 / 1_000_000.0,
            error: None,
        })
    }
}

#[async_trait]
impl PlayerSource for MprisPlayer {
    fn name(&self) -> &'static str {
        "mpris"
    }

    async fn poll(&self) -> PlayerSnapshot {
        match self.read_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => PlayerSnapshot::from_error(e.to_string()),
        }
    }
}
