//! Media player sources
//!
//! A player source produces a [`PlayerSnapshot`] on demand: one polled
//! reading of the external player's state. Transport failures are modeled as
//! `snapshot.error` rather than a `Result`, so the poll loop always has a
//! snapshot to hand to the tracker. Implementations are selected at startup
//! from configuration, never by runtime type inspection.

pub mod mock;
pub mod mpris;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{PlayerKind, Settings};
use crate::error::Result;

pub use mock::MockPlayer;
pub use mpris::MprisPlayer;

/// Immutable description of what the media player reports at one instant.
///
/// If `error` is set, every other field is unreliable.
#[derive(Debug, Clone, Default)]
pub struct PlayerSnapshot {
    pub is_playing: bool,
    pub track_title: String,
    pub artist_name: String,
    pub album_title: Option<String>,
    pub position_seconds: f64,
    pub track_start_seconds: f64,
    pub track_finish_seconds: f64,
    pub error: Option<String>,
}

impl PlayerSnapshot {
    /// Snapshot representing a failed poll.
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Polymorphic capability every media player integration provides.
#[async_trait]
pub trait PlayerSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Produce a fresh snapshot. May be slow; the scheduler skips ticks
    /// while a poll is outstanding.
    async fn poll(&self) -> PlayerSnapshot;
}

/// Build the configured player source.
pub async fn create_player(settings: &Settings) -> Result<Arc<dyn PlayerSource>> {
    match settings.player {
        PlayerKind::Mock => Ok(Arc::new(MockPlayer::new())),
        PlayerKind::Mpris => {
            let player = MprisPlayer::connect(&settings.mpris_bus).await?;
            Ok(Arc::new(player))
        }
    }
}
