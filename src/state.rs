//! Shared observable state
//!
//! Event broadcaster plus read-mostly mirrors of the now-playing summary and
//! scrobble progress. All mutation happens on the owning actor task; other
//! tasks and UI layers only subscribe or read.

use tokio::sync::{broadcast, RwLock};

use crate::events::{AppEvent, NowPlayingSummary};

/// State shared between the actor, the scheduler and observers.
pub struct SharedState {
    /// Event broadcaster for observers
    event_tx: broadcast::Sender<AppEvent>,

    /// Mirror of the in-progress track summary
    now_playing: RwLock<Option<NowPlayingSummary>>,

    /// Mirror of progress toward the scrobble threshold (0.0..=1.0)
    progress: RwLock<f64>,
}

impl SharedState {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            event_tx,
            now_playing: RwLock::new(None),
            progress: RwLock::new(0.0),
        }
    }

    /// Broadcast an event to all observers. No receivers is fine.
    pub fn broadcast(&self, event: AppEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.event_tx.subscribe()
    }

    pub async fn now_playing(&self) -> Option<NowPlayingSummary> {
        self.now_playing.read().await.clone()
    }

    pub async fn set_now_playing(&self, summary: Option<NowPlayingSummary>) {
        *self.now_playing.write().await = summary;
    }

    pub async fn progress(&self) -> f64 {
        *self.progress.read().await
    }

    pub async fn set_progress(&self, progress: f64) {
        *self.progress.write().await = progress.clamp(0.0, 1.0);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_mirror_clamps() {
        let state = SharedState::new();
        assert_eq!(state.progress().await, 0.0);

        state.set_progress(0.5).await;
        assert_eq!(state.progress().await, 0.5);

        state.set_progress(1.5).await;
        assert_eq!(state.progress().await, 1.0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscriber() {
        let state = SharedState::new();
        let mut rx = state.subscribe();

        state.broadcast(AppEvent::ProgressChanged { progress: 0.25 });

        match rx.recv().await.unwrap() {
            AppEvent::ProgressChanged { progress } => assert_eq!(progress, 0.25),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
