//! lastwave - Last.fm scrobbler driven by polled media player state
//!
//! The core loop: a scheduler polls the configured media player once per
//! tick, the playback tracker turns the stream of snapshots into scrobble
//! events, the history ledger records finalized events, and the enrichment
//! coordinator fills in remote metadata asynchronously. A single actor task
//! owns all mutable state; observers subscribe to typed events.

pub mod app;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod events;
pub mod history;
pub mod lastfm;
pub mod player;
pub mod prefs;
pub mod roster;
pub mod scrobble;
pub mod state;
pub mod tracking;

pub use app::{spawn_scheduler, App, AppHandle, AppMsg};
pub use error::{Error, Result};
pub use events::AppEvent;
pub use history::Selection;
pub use scrobble::{Scrobble, TrackIdentity};
pub use state::SharedState;
