//! Application actor
//!
//! Single owner of all mutable state: the playback tracker, the history
//! ledger, the enrichment coordinator, the friend roster and the preference
//! store. Everything else talks to it through [`AppMsg`] over an mpsc
//! channel, so no state is ever touched from two tasks at once. Observers
//! get typed [`AppEvent`]s through [`SharedState`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::config::Settings;
use crate::enrichment::EnrichmentCoordinator;
use crate::events::{AppEvent, NowPlayingSummary};
use crate::history::{HistoryLedger, Selection};
use crate::lastfm::{LastfmError, RecentTrack, ScrobbleService, TrackMetadata};
use crate::player::{PlayerSnapshot, PlayerSource};
use crate::prefs::{self, PrefStore};
use crate::roster::{FriendProfile, FriendRoster, FriendTrack};
use crate::scrobble::{Scrobble, TrackIdentity};
use crate::state::SharedState;
use crate::tracking::PlaybackTracker;

/// Messages accepted by the application actor.
#[derive(Debug)]
pub enum AppMsg {
    /// A fresh player poll result from the scheduler
    Snapshot(PlayerSnapshot),

    /// Initial history page fetched at startup
    HistoryLoaded(Result<Vec<RecentTrack>, LastfmError>),

    /// A metadata fetch resolved (or failed)
    EnrichmentDone {
        identity: TrackIdentity,
        initial: bool,
        result: Result<TrackMetadata, LastfmError>,
    },

    /// Move the selection cursor
    Select(Selection),

    /// Toggle the loved flag on the given event
    ToggleLoved(Selection),

    /// Kick off a friend roster refresh
    RefreshRoster,

    /// The friend list fetch resolved
    RosterFriendsLoaded(Result<Vec<FriendProfile>, LastfmError>),

    /// One friend's current/last track fetch resolved
    RosterTrackLoaded {
        username: String,
        track: Option<FriendTrack>,
    },

    /// Flip the persisted mini-mode preference
    ToggleMiniMode,
}

/// Cheap clonable handle for sending messages to the actor.
#[derive(Clone)]
pub struct AppHandle {
    tx: mpsc::Sender<AppMsg>,
}

impl AppHandle {
    pub fn sender(&self) -> mpsc::Sender<AppMsg> {
        self.tx.clone()
    }

    pub async fn send(&self, msg: AppMsg) {
        if self.tx.send(msg).await.is_err() {
            warn!("app has shut down, message dropped");
        }
    }

    pub async fn select(&self, selection: Selection) {
        self.send(AppMsg::Select(selection)).await;
    }

    pub async fn toggle_loved(&self, selection: Selection) {
        self.send(AppMsg::ToggleLoved(selection)).await;
    }

    pub async fn refresh_roster(&self) {
        self.send(AppMsg::RefreshRoster).await;
    }

    pub async fn toggle_mini_mode(&self) {
        self.send(AppMsg::ToggleMiniMode).await;
    }
}

/// The application actor. Owns every piece of mutable state.
pub struct App {
    settings: Settings,
    shared: Arc<SharedState>,
    service: Arc<dyn ScrobbleService>,
    tracker: PlaybackTracker,
    ledger: HistoryLedger,
    enrichment: EnrichmentCoordinator,
    roster: FriendRoster,
    prefs: PrefStore,
    tx: mpsc::Sender<AppMsg>,
    rx: mpsc::Receiver<AppMsg>,
}

impl App {
    pub fn new(
        settings: Settings,
        shared: Arc<SharedState>,
        service: Arc<dyn ScrobbleService>,
        prefs: PrefStore,
    ) -> (Self, AppHandle) {
        let (tx, rx) = mpsc::channel(64);
        let tracker =
            PlaybackTracker::new(settings.threshold_fraction, settings.debounce_ticks);
        let enrichment = EnrichmentCoordinator::new(service.clone(), tx.clone());

        let app = Self {
            settings,
            shared,
            service,
            tracker,
            ledger: HistoryLedger::new(),
            enrichment,
            roster: FriendRoster::new(),
            prefs,
            tx: tx.clone(),
            rx,
        };
        (app, AppHandle { tx })
    }

    pub fn shared(&self) -> Arc<SharedState> {
        self.shared.clone()
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn roster(&self) -> &FriendRoster {
        &self.roster
    }

    pub fn tracker(&self) -> &PlaybackTracker {
        &self.tracker
    }

    pub fn mini_mode(&self) -> bool {
        self.prefs.get_bool(prefs::MINI_MODE)
    }

    /// Fetch the initial page of remote history in the background. The
    /// result arrives as [`AppMsg::HistoryLoaded`].
    pub fn start_initial_history(&self) {
        if self.settings.skip_initial_history || self.settings.username.is_empty() {
            debug!("initial history load skipped");
            return;
        }

        let service = self.service.clone();
        let tx = self.tx.clone();
        let count = self.settings.history_page_size;
        tokio::spawn(async move {
            let result = service.recent_tracks(count).await;
            let _ = tx.send(AppMsg::HistoryLoaded(result)).await;
        });
    }

    /// Drive the actor until every sender outside the app is gone or the
    /// caller drops the future (shutdown).
    pub async fn run(&mut self) {
        while let Some(msg) = self.rx.recv().await {
            self.handle(msg).await;
        }
    }

    /// Process exactly one queued message. Returns false when the channel
    /// has closed.
    pub async fn handle_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(msg) => {
                self.handle(msg).await;
                true
            }
            None => false,
        }
    }

    /// Finalize a still-armed in-progress track on shutdown, so a track the
    /// player never changed away from still scrobbles.
    pub async fn finalize_on_shutdown(&mut self) {
        if let Some(scrobble) = self.tracker.take_armed() {
            info!("finalizing armed track on shutdown: {}", scrobble.title);
            self.finalize_scrobble(scrobble).await;
        }
    }

    pub async fn handle(&mut self, msg: AppMsg) {
        match msg {
            AppMsg::Snapshot(snapshot) => self.on_snapshot(snapshot).await,
            AppMsg::HistoryLoaded(result) => self.on_history_loaded(result).await,
            AppMsg::EnrichmentDone {
                identity,
                initial,
                result,
            } => self.on_enrichment_done(identity, initial, result).await,
            AppMsg::Select(selection) => self.on_select(selection),
            AppMsg::ToggleLoved(selection) => self.on_toggle_loved(selection).await,
            AppMsg::RefreshRoster => self.on_refresh_roster(),
            AppMsg::RosterFriendsLoaded(result) => self.on_roster_friends(result),
            AppMsg::RosterTrackLoaded { username, track } => {
                self.on_roster_track(username, track)
            }
            AppMsg::ToggleMiniMode => self.on_toggle_mini_mode(),
        }
    }

    async fn on_snapshot(&mut self, snapshot: PlayerSnapshot) {
        let outcome = self.tracker.on_snapshot(&snapshot);

        if let Some((title, message)) = outcome.notification {
            self.shared.broadcast(AppEvent::Notification { title, message });
        }

        if let Some(finalized) = outcome.finalized {
            self.finalize_scrobble(finalized).await;
        }

        if outcome.adopted {
            self.adopt_current().await;
        }

        if outcome.cleared {
            self.shared.set_now_playing(None).await;
            self.shared.set_progress(0.0).await;
            self.shared
                .broadcast(AppEvent::NowPlayingChanged { summary: None });
            self.shared
                .broadcast(AppEvent::ProgressChanged { progress: 0.0 });

            // A selection pointing at the emptied slot has nothing left to
            // point at
            if self.ledger.selection() == Selection::CurrentTrack {
                self.ledger.select(Selection::None);
                self.shared.broadcast(AppEvent::SelectionChanged {
                    selection: Selection::None,
                });
                self.shared.broadcast(AppEvent::SelectedScrobbleChanged);
            }
        }

        if let Some(progress) = outcome.progress {
            self.shared.set_progress(progress).await;
            self.shared
                .broadcast(AppEvent::ProgressChanged { progress });
        }
    }

    /// Move a finalized scrobble into history and submit it upstream.
    async fn finalize_scrobble(&mut self, mut scrobble: Scrobble) {
        // Show the new play immediately instead of waiting for the remote
        // counts to catch up
        if scrobble.has_metadata() {
            scrobble.plays = Some(scrobble.plays.unwrap_or(0) + 1);
            scrobble.artist_plays = Some(scrobble.artist_plays.unwrap_or(0) + 1);
        }

        if self.settings.submit {
            let service = self.service.clone();
            let outgoing = scrobble.clone();
            tokio::spawn(async move {
                if let Err(e) = service.submit(&outgoing).await {
                    warn!("scrobble submission failed for {}: {e}", outgoing.title);
                }
            });
        } else {
            debug!("submission disabled, keeping {} local", scrobble.title);
        }

        let shifted = self.ledger.append_head(scrobble);
        self.shared.broadcast(AppEvent::HistoryAppended);
        if shifted {
            self.shared.broadcast(AppEvent::SelectionChanged {
                selection: self.ledger.selection(),
            });
        }
    }

    /// Announce the freshly adopted in-progress track and kick off its
    /// metadata fetch.
    async fn adopt_current(&mut self) {
        let current = match self.tracker.current() {
            Some(current) => current.clone(),
            None => return,
        };

        let summary = NowPlayingSummary::from(&current);
        self.shared.set_now_playing(Some(summary.clone())).await;
        self.shared.set_progress(0.0).await;
        self.shared.broadcast(AppEvent::NowPlayingChanged {
            summary: Some(summary),
        });
        self.shared
            .broadcast(AppEvent::ProgressChanged { progress: 0.0 });

        match self.ledger.selection() {
            // With nothing selected, follow the playing track
            Selection::None => {
                self.ledger.select(Selection::CurrentTrack);
                self.shared.broadcast(AppEvent::SelectionChanged {
                    selection: Selection::CurrentTrack,
                });
                self.shared.broadcast(AppEvent::SelectedScrobbleChanged);
            }
            // The cursor stays put, but the contents of the slot it points
            // at were just replaced
            Selection::CurrentTrack => {
                self.shared.broadcast(AppEvent::SelectedScrobbleChanged);
            }
            Selection::HistoryPosition(_) => {}
        }

        if self.settings.submit {
            let service = self.service.clone();
            let identity = current.identity();
            tokio::spawn(async move {
                if let Err(e) = service.update_now_playing(&identity).await {
                    warn!("now-playing update failed for {identity}: {e}");
                }
            });
        }

        self.enrichment.request(&current, false);
    }

    async fn on_history_loaded(&mut self, result: Result<Vec<RecentTrack>, LastfmError>) {
        let tracks = match result {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("initial history load failed: {e}");
                self.shared.broadcast(AppEvent::Notification {
                    title: "Error loading scrobble history".to_string(),
                    message: e.to_string(),
                });
                return;
            }
        };

        // The first entry may be the in-progress track; the tracker owns
        // that, history only holds completed plays
        let entries: Vec<Scrobble> = tracks
            .into_iter()
            .filter(|track| !track.now_playing)
            .map(|track| {
                Scrobble::with_timestamp(
                    &track.title,
                    &track.artist,
                    track.album.as_deref(),
                    track.timestamp,
                )
            })
            .collect();

        debug!("loaded {} historical scrobbles", entries.len());
        for entry in &entries {
            self.ledger.push_back(entry.clone());
        }
        self.shared.broadcast(AppEvent::HistoryRefreshed);

        if entries.is_empty() {
            return;
        }

        self.enrichment.begin_initial_batch(entries.len());
        self.shared
            .broadcast(AppEvent::LoadingIndicatorChanged { visible: true });
        for entry in &entries {
            if self.enrichment.request(entry, true) {
                // Every entry was deduplicated or already loaded
                self.shared
                    .broadcast(AppEvent::LoadingIndicatorChanged { visible: false });
            }
        }
    }

    async fn on_enrichment_done(
        &mut self,
        identity: TrackIdentity,
        initial: bool,
        result: Result<TrackMetadata, LastfmError>,
    ) {
        let metadata = match result {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("enrichment failed for {identity}: {e}");
                None
            }
        };

        let mutation = match &metadata {
            Some(metadata) => self.ledger.propagate_mutation(
                &identity,
                self.tracker.current_mut(),
                |scrobble| scrobble.apply_metadata(metadata),
            ),
            None => self.ledger.propagate_mutation(
                &identity,
                self.tracker.current_mut(),
                |scrobble| scrobble.mark_enrichment_failed(),
            ),
        };

        for position in &mutation.positions {
            self.shared
                .broadcast(AppEvent::ArtworkChanged { position: *position });
            self.shared
                .broadcast(AppEvent::LovedChanged { position: *position });
        }

        if mutation.current_matched {
            if let Some(current) = self.tracker.current() {
                let summary = NowPlayingSummary::from(current);
                self.shared.set_now_playing(Some(summary.clone())).await;
                self.shared.broadcast(AppEvent::NowPlayingChanged {
                    summary: Some(summary),
                });
            }
        }

        let selected_matches = self
            .ledger
            .selected(self.tracker.current())
            .map(|selected| selected.identity() == identity)
            .unwrap_or(false);
        if selected_matches {
            self.shared.broadcast(AppEvent::SelectedScrobbleChanged);
        }

        // The same fetch serves roster rows playing this track
        if let Some(metadata) = &metadata {
            let positions = self.roster.positions_playing(&identity.title, &identity.artist);
            for position in positions {
                self.roster.set_artwork(position, metadata.artwork_url.clone());
                self.shared
                    .broadcast(AppEvent::RosterArtworkChanged { position });
            }
        }

        if initial && self.enrichment.complete_one() {
            self.shared
                .broadcast(AppEvent::LoadingIndicatorChanged { visible: false });
        }
    }

    fn on_select(&mut self, selection: Selection) {
        if self.ledger.select(selection) {
            self.shared
                .broadcast(AppEvent::SelectionChanged { selection });
            self.shared.broadcast(AppEvent::SelectedScrobbleChanged);
        } else {
            debug!("rejected out-of-range selection {selection:?}");
        }
    }

    async fn on_toggle_loved(&mut self, selection: Selection) {
        let target = match selection {
            Selection::None => None,
            Selection::CurrentTrack => self.tracker.current(),
            Selection::HistoryPosition(position) => self.ledger.get(position),
        };
        let target = match target {
            Some(target) => target,
            None => return,
        };

        // Loved state lives on the remote track record; without metadata
        // there is nothing to toggle against
        if !target.has_metadata() {
            debug!("loved toggle ignored, {} has no metadata yet", target.title);
            return;
        }

        let identity = target.identity();
        let desired = !target.loved;

        let mutation = self.ledger.propagate_mutation(
            &identity,
            self.tracker.current_mut(),
            |scrobble| scrobble.loved = desired,
        );

        for position in &mutation.positions {
            self.shared
                .broadcast(AppEvent::LovedChanged { position: *position });
        }
        if mutation.current_matched {
            if let Some(current) = self.tracker.current() {
                let summary = NowPlayingSummary::from(current);
                self.shared.set_now_playing(Some(summary.clone())).await;
                self.shared.broadcast(AppEvent::NowPlayingChanged {
                    summary: Some(summary),
                });
            }
        }
        self.shared.broadcast(AppEvent::SelectedScrobbleChanged);

        if self.settings.submit {
            let service = self.service.clone();
            tokio::spawn(async move {
                if let Err(e) = service.set_loved(&identity, desired).await {
                    warn!("loved update failed for {identity}: {e}");
                }
            });
        }
    }

    fn on_refresh_roster(&mut self) {
        if self.settings.username.is_empty() {
            debug!("no username configured, roster refresh skipped");
            return;
        }
        if !self.roster.begin_refresh() {
            debug!("roster refresh already in progress");
            return;
        }

        self.shared
            .broadcast(AppEvent::RosterLoadingChanged { visible: true });

        let service = self.service.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = service.friends().await;
            let _ = tx.send(AppMsg::RosterFriendsLoaded(result)).await;
        });
    }

    fn on_roster_friends(&mut self, result: Result<Vec<FriendProfile>, LastfmError>) {
        let profiles = match result {
            Ok(profiles) => profiles,
            Err(e) => {
                warn!("friend list fetch failed: {e}");
                self.roster.finish_refresh();
                self.shared
                    .broadcast(AppEvent::RosterLoadingChanged { visible: false });
                self.shared.broadcast(AppEvent::Notification {
                    title: "Error loading friends".to_string(),
                    message: e.to_string(),
                });
                return;
            }
        };

        self.roster.apply_friends(profiles);
        self.shared.broadcast(AppEvent::RosterRefreshed);

        let usernames: Vec<String> = self
            .roster
            .friends()
            .iter()
            .map(|friend| friend.username.clone())
            .collect();
        if usernames.is_empty() {
            self.roster.finish_refresh();
            self.shared
                .broadcast(AppEvent::RosterLoadingChanged { visible: false });
            return;
        }

        // One track fetch per friend, all in parallel; every friend answers
        // exactly once so the roster's completion count terminates
        let service = self.service.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let fetches = usernames.into_iter().map(|username| {
                let service = service.clone();
                async move {
                    let track = match service.friend_last_track(&username).await {
                        Ok(track) => track,
                        Err(e) => {
                            warn!("track fetch failed for friend {username}: {e}");
                            None
                        }
                    };
                    (username, track)
                }
            });
            for (username, track) in join_all(fetches).await {
                if tx
                    .send(AppMsg::RosterTrackLoaded { username, track })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
    }

    fn on_roster_track(&mut self, username: String, track: Option<FriendTrack>) {
        // Playing friends get artwork through the shared enrichment path,
        // deduplicated against history fetches for the same track
        if let Some(playing) = track.as_ref().filter(|t| t.is_playing) {
            let identity =
                TrackIdentity::new(&playing.title, &playing.artist, playing.album.as_deref());
            self.enrichment.request_identity(identity, false);
        }

        if self.roster.apply_track(&username, track) {
            self.shared.broadcast(AppEvent::RosterRefreshed);
            self.shared
                .broadcast(AppEvent::RosterLoadingChanged { visible: false });
        }
    }

    fn on_toggle_mini_mode(&mut self) {
        let enabled = !self.prefs.get_bool(prefs::MINI_MODE);
        if let Err(e) = self
            .prefs
            .set(prefs::MINI_MODE, if enabled { "true" } else { "false" })
        {
            warn!("could not persist mini-mode preference: {e}");
        }
        self.shared
            .broadcast(AppEvent::MiniModeChanged { enabled });
    }
}

/// Spawn the poll scheduler: one tick per period, first tick immediate.
///
/// A tick whose previous poll is still outstanding is skipped rather than
/// queued, so a slow player can never build a backlog of polls.
pub fn spawn_scheduler(
    player: Arc<dyn PlayerSource>,
    tx: mpsc::Sender<AppMsg>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(player = player.name(), ?period, "poll scheduler started");
        let outstanding = Arc::new(AtomicBool::new(false));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if tx.is_closed() {
                break;
            }
            if outstanding.swap(true, Ordering::SeqCst) {
                trace!("previous poll still outstanding, skipping tick");
                continue;
            }

            let player = player.clone();
            let tx = tx.clone();
            let outstanding = outstanding.clone();
            tokio::spawn(async move {
                let snapshot = player.poll().await;
                outstanding.store(false, Ordering::SeqCst);
                let _ = tx.send(AppMsg::Snapshot(snapshot)).await;
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use crate::lastfm::TrackMetadata;
    use async_trait::async_trait;
    use clap::Parser;

    struct StaticService;

    #[async_trait]
    impl ScrobbleService for StaticService {
        async fn track_metadata(
            &self,
            _: &TrackIdentity,
        ) -> Result<TrackMetadata, LastfmError> {
            Ok(TrackMetadata {
                url: Some("https://example.invalid/track".into()),
                plays: Some(4),
                ..Default::default()
            })
        }

        async fn update_now_playing(&self, _: &TrackIdentity) -> Result<(), LastfmError> {
            Ok(())
        }

        async fn submit(&self, _: &Scrobble) -> Result<(), LastfmError> {
            Ok(())
        }

        async fn set_loved(&self, _: &TrackIdentity, _: bool) -> Result<(), LastfmError> {
            Ok(())
        }

        async fn recent_tracks(&self, _: usize) -> Result<Vec<RecentTrack>, LastfmError> {
            Ok(Vec::new())
        }

        async fn friends(&self) -> Result<Vec<FriendProfile>, LastfmError> {
            Ok(Vec::new())
        }

        async fn friend_last_track(
            &self,
            _: &str,
        ) -> Result<Option<FriendTrack>, LastfmError> {
            Ok(None)
        }
    }

    fn test_app() -> (App, AppHandle, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut args = Args::parse_from(["lastwave"]);
        args.prefs_path = dir.path().join("prefs.toml");
        let settings = Settings::from_args(args).unwrap();
        let prefs = PrefStore::load(&settings.prefs_path).unwrap();
        let (app, handle) = App::new(
            settings,
            Arc::new(SharedState::new()),
            Arc::new(StaticService),
            prefs,
        );
        (app, handle, dir)
    }

    fn snapshot(title: &str, artist: &str, position: f64) -> PlayerSnapshot {
        PlayerSnapshot {
            is_playing: true,
            track_title: title.to_string(),
            artist_name: artist.to_string(),
            album_title: None,
            position_seconds: position,
            track_start_seconds: 0.0,
            track_finish_seconds: 100.0,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_adopting_a_track_follows_it_with_the_selection() {
        let (mut app, _handle, _dir) = test_app();
        app.handle(AppMsg::Snapshot(snapshot("Alone", "Marshmello", 0.0)))
            .await;

        assert_eq!(app.history().selection(), Selection::CurrentTrack);
        assert_eq!(app.tracker().current().unwrap().title, "Alone");
    }

    #[tokio::test]
    async fn test_qualified_track_lands_in_history_on_change() {
        let (mut app, _handle, _dir) = test_app();
        app.handle(AppMsg::Snapshot(snapshot("Alone", "Marshmello", 0.0)))
            .await;
        app.handle(AppMsg::Snapshot(snapshot("Alone", "Marshmello", 80.0)))
            .await;
        app.handle(AppMsg::Snapshot(snapshot("Flames", "R3HAB", 0.0)))
            .await;

        assert_eq!(app.history().len(), 1);
        assert_eq!(app.history().get(0).unwrap().title, "Alone");
        assert_eq!(app.tracker().current().unwrap().title, "Flames");
    }

    #[tokio::test]
    async fn test_stop_clears_selection_of_current_track() {
        let (mut app, _handle, _dir) = test_app();
        app.handle(AppMsg::Snapshot(snapshot("Alone", "Marshmello", 0.0)))
            .await;
        assert_eq!(app.history().selection(), Selection::CurrentTrack);

        let mut stopped = snapshot("Alone", "Marshmello", 10.0);
        stopped.is_playing = false;
        app.handle(AppMsg::Snapshot(stopped)).await;

        assert!(app.tracker().current().is_none());
        assert_eq!(app.history().selection(), Selection::None);
    }

    #[tokio::test]
    async fn test_mini_mode_toggle_persists() {
        let (mut app, _handle, _dir) = test_app();
        assert!(!app.mini_mode());

        app.handle(AppMsg::ToggleMiniMode).await;
        assert!(app.mini_mode());
        app.handle(AppMsg::ToggleMiniMode).await;
        assert!(!app.mini_mode());
    }

    #[tokio::test]
    async fn test_loved_toggle_requires_metadata() {
        let (mut app, _handle, _dir) = test_app();
        app.handle(AppMsg::Snapshot(snapshot("Alone", "Marshmello", 0.0)))
            .await;

        // No metadata yet, toggle is a no-op
        app.handle(AppMsg::ToggleLoved(Selection::CurrentTrack)).await;
        assert!(!app.tracker().current().unwrap().loved);

        // Pump the enrichment result queued by adoption, then toggle
        assert!(app.handle_next().await);
        assert!(app.tracker().current().unwrap().has_metadata());
        app.handle(AppMsg::ToggleLoved(Selection::CurrentTrack)).await;
        assert!(app.tracker().current().unwrap().loved);
    }

    /// Player whose polls block until released, to hold a poll outstanding
    /// across several scheduler periods.
    struct GatedPlayer {
        polls: std::sync::atomic::AtomicUsize,
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl crate::player::PlayerSource for GatedPlayer {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn poll(&self) -> PlayerSnapshot {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            snapshot("Alone", "Marshmello", 0.0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_skips_ticks_while_poll_outstanding() {
        let player = Arc::new(GatedPlayer {
            polls: std::sync::atomic::AtomicUsize::new(0),
            gate: tokio::sync::Notify::new(),
        });
        let (tx, mut rx) = mpsc::channel(8);
        let scheduler = spawn_scheduler(player.clone(), tx, Duration::from_millis(100));

        // The first poll fires immediately, before any period elapses
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(player.polls.load(Ordering::SeqCst), 1);

        // Several periods elapse while the poll is still outstanding; those
        // ticks are skipped, not queued
        tokio::time::advance(Duration::from_millis(350)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(player.polls.load(Ordering::SeqCst), 1);

        // Releasing the gate delivers the lone snapshot
        player.gate.notify_waiters();
        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, AppMsg::Snapshot(_)));

        // The first tick after completion dispatches again
        tokio::time::advance(Duration::from_millis(100)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(player.polls.load(Ordering::SeqCst), 2);

        scheduler.abort();
    }

    #[tokio::test]
    async fn test_shutdown_finalizes_armed_track() {
        let (mut app, _handle, _dir) = test_app();
        app.handle(AppMsg::Snapshot(snapshot("Alone", "Marshmello", 0.0)))
            .await;
        app.handle(AppMsg::Snapshot(snapshot("Alone", "Marshmello", 80.0)))
            .await;

        app.finalize_on_shutdown().await;
        assert_eq!(app.history().len(), 1);
        assert!(app.tracker().current().is_none());
    }
}
