//! Enrichment coordinator
//!
//! Dispatches asynchronous metadata fetches per scrobble and keeps exactly
//! one fetch in flight per track identity. Results come back to the owning
//! actor as [`AppMsg::EnrichmentDone`] messages in whatever order the remote
//! service answers; identity-based propagation makes late results land
//! correctly. Also tracks the pending count for the initial history batch,
//! which drives the single aggregate loading indicator.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::app::AppMsg;
use crate::lastfm::ScrobbleService;
use crate::scrobble::{Scrobble, TrackIdentity};

pub struct EnrichmentCoordinator {
    service: Arc<dyn ScrobbleService>,
    tx: mpsc::Sender<AppMsg>,
    /// Identities with a fetch in flight; check-and-insert is atomic under
    /// the lock so concurrent dispatch cannot race the membership test
    in_flight: Arc<Mutex<HashSet<TrackIdentity>>>,
    /// Outstanding completions from the initial history batch
    initial_remaining: usize,
}

impl EnrichmentCoordinator {
    pub fn new(service: Arc<dyn ScrobbleService>, tx: mpsc::Sender<AppMsg>) -> Self {
        Self {
            service,
            tx,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            initial_remaining: 0,
        }
    }

    /// Arm the loading indicator countdown for the initial history page.
    pub fn begin_initial_batch(&mut self, count: usize) {
        self.initial_remaining = count;
    }

    pub fn initial_pending(&self) -> usize {
        self.initial_remaining
    }

    /// Request enrichment for a scrobble. Returns true when this call just
    /// finished the initial batch (the loading indicator should turn off).
    pub fn request(&mut self, scrobble: &Scrobble, initial: bool) -> bool {
        if scrobble.has_metadata() {
            debug!(track = %scrobble.identity(), "metadata already loaded, skipping fetch");
            if initial {
                return self.complete_one();
            }
            return false;
        }
        self.request_identity(scrobble.identity(), initial)
    }

    /// Request enrichment by identity (used by the roster, whose rows are
    /// not scrobbles). Same dedup and accounting rules as [`request`].
    ///
    /// [`request`]: Self::request
    pub fn request_identity(&mut self, identity: TrackIdentity, initial: bool) -> bool {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(identity.clone()) {
                // Intentional no-op, not an error: another fetch for this
                // identity is already running and will propagate to every
                // matching event
                debug!(track = %identity, "fetch already in flight, skipping");
                if initial {
                    drop(in_flight);
                    return self.complete_one();
                }
                return false;
            }
        }

        let service = self.service.clone();
        let tx = self.tx.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            let result = service.track_metadata(&identity).await;
            in_flight.lock().unwrap().remove(&identity);
            if tx
                .send(AppMsg::EnrichmentDone {
                    identity,
                    initial,
                    result,
                })
                .await
                .is_err()
            {
                warn!("enrichment result dropped, app has shut down");
            }
        });
        false
    }

    /// Count one completion toward the initial batch. Returns true when the
    /// batch just fully resolved. Failed fetches count too.
    pub fn complete_one(&mut self) -> bool {
        if self.initial_remaining > 0 {
            self.initial_remaining -= 1;
            if self.initial_remaining == 0 {
                debug!("initial scrobble history fully enriched");
                return true;
            }
        }
        false
    }
}
