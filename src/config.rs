//! Configuration
//!
//! Command-line arguments (all environment-overridable) resolved into a
//! validated [`Settings`] struct. Defaults live in code.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};

/// Fast-mode poll period used when `--fast-polling` is set.
const FAST_POLL_INTERVAL_MS: u64 = 100;

/// Command-line arguments for lastwave
#[derive(Parser, Debug, Clone)]
#[command(name = "lastwave")]
#[command(about = "Last.fm scrobbler driven by polled media player state")]
#[command(version)]
pub struct Args {
    /// Poll interval in milliseconds
    #[arg(long, default_value = "1000", env = "LASTWAVE_POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,

    /// Poll every 100 ms regardless of --poll-interval-ms
    #[arg(long, env = "LASTWAVE_FAST_POLLING")]
    pub fast_polling: bool,

    /// Use the scripted mock player instead of a real one
    #[arg(long, env = "LASTWAVE_MOCK_PLAYER")]
    pub mock_player: bool,

    /// Actually submit scrobbles and now-playing updates to Last.fm
    #[arg(long, env = "LASTWAVE_SUBMIT")]
    pub submit: bool,

    /// Skip loading the initial scrobble history page
    #[arg(long, env = "LASTWAVE_SKIP_HISTORY")]
    pub skip_initial_history: bool,

    /// Number of historical scrobbles to load at startup
    #[arg(long, default_value = "30", env = "LASTWAVE_HISTORY_PAGE_SIZE")]
    pub history_page_size: usize,

    /// Fraction of the track that must play before a scrobble qualifies
    #[arg(long, default_value = "0.75", env = "LASTWAVE_THRESHOLD_FRACTION")]
    pub threshold_fraction: f64,

    /// Consecutive poll ticks before a same-title metadata change is trusted
    #[arg(long, default_value = "3", env = "LASTWAVE_DEBOUNCE_TICKS")]
    pub debounce_ticks: u32,

    /// MPRIS bus name of the player to poll
    #[arg(
        long,
        default_value = "org.mpris.MediaPlayer2.spotify",
        env = "LASTWAVE_MPRIS_BUS"
    )]
    pub mpris_bus: String,

    /// Last.fm API key
    #[arg(long, default_value = "", env = "LASTFM_API_KEY")]
    pub api_key: String,

    /// Last.fm session key (required for submission)
    #[arg(long, env = "LASTFM_SESSION_KEY")]
    pub session_key: Option<String>,

    /// Last.fm username
    #[arg(long, default_value = "", env = "LASTFM_USERNAME")]
    pub username: String,

    /// Preference store path
    #[arg(long, default_value = "lastwave-prefs.toml", env = "LASTWAVE_PREFS")]
    pub prefs_path: PathBuf,
}

/// Which player source to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKind {
    Mock,
    Mpris,
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub poll_interval: Duration,
    pub player: PlayerKind,
    pub submit: bool,
    pub skip_initial_history: bool,
    pub history_page_size: usize,
    pub threshold_fraction: f64,
    pub debounce_ticks: u32,
    pub mpris_bus: String,
    pub api_key: String,
    pub session_key: Option<String>,
    pub username: String,
    pub prefs_path: PathBuf,
}

impl Settings {
    pub fn from_args(args: Args) -> Result<Self> {
        if args.threshold_fraction <= 0.0 || args.threshold_fraction > 1.0 {
            return Err(Error::Config(format!(
                "threshold fraction must be in (0, 1], got {}",
                args.threshold_fraction
            )));
        }
        if args.debounce_ticks == 0 {
            return Err(Error::Config("debounce tick count must be at least 1".into()));
        }
        if args.history_page_size == 0 {
            return Err(Error::Config("history page size must be at least 1".into()));
        }
        if args.poll_interval_ms == 0 {
            return Err(Error::Config("poll interval must be positive".into()));
        }

        let poll_interval = if args.fast_polling {
            Duration::from_millis(FAST_POLL_INTERVAL_MS)
        } else {
            Duration::from_millis(args.poll_interval_ms)
        };

        Ok(Self {
            poll_interval,
            player: if args.mock_player {
                PlayerKind::Mock
            } else {
                PlayerKind::Mpris
            },
            submit: args.submit,
            skip_initial_history: args.skip_initial_history,
            history_page_size: args.history_page_size,
            threshold_fraction: args.threshold_fraction,
            debounce_ticks: args.debounce_ticks,
            mpris_bus: args.mpris_bus,
            api_key: args.api_key,
            session_key: args.session_key,
            username: args.username,
            prefs_path: args.prefs_path,
        })
    }
}
