//! Scrobble history ledger
//!
//! Ordered, append-only (at the head) sequence of finalized scrobbles with a
//! movable selection cursor. Inserting at the head shifts a positional
//! selection down by one so the user's selection keeps pointing at the same
//! logical event. History order never re-sorts.

use serde::Serialize;

use crate::scrobble::{Scrobble, TrackIdentity};

/// What the user has selected in the history sidebar.
///
/// An explicit variant per case instead of sentinel indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "position")]
pub enum Selection {
    /// Nothing selected
    None,
    /// The in-progress (currently playing) event
    CurrentTrack,
    /// A position in the history list (0 = newest)
    HistoryPosition(usize),
}

/// Result of propagating a field change across the ledger.
pub struct MutationOutcome {
    /// History positions whose entry was mutated (newest first)
    pub positions: Vec<usize>,
    /// Whether the in-progress event matched and was mutated
    pub current_matched: bool,
}

/// Finalized scrobbles, newest first, plus the selection cursor.
pub struct HistoryLedger {
    entries: Vec<Scrobble>,
    selection: Selection,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            selection: Selection::None,
        }
    }

    pub fn entries(&self) -> &[Scrobble] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Scrobble> {
        self.entries.get(position)
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Prepend a finalized scrobble.
    ///
    /// A positional selection shifts by one so it still points at the same
    /// logical event; `None` and `CurrentTrack` selections are unaffected.
    /// Returns true when the selection moved.
    pub fn append_head(&mut self, scrobble: Scrobble) -> bool {
        self.entries.insert(0, scrobble);

        if let Selection::HistoryPosition(n) = self.selection {
            self.selection = Selection::HistoryPosition(n + 1);
            return true;
        }
        false
    }

    /// Append at the tail; used when loading the initial history page
    /// (entries arrive newest first).
    pub fn push_back(&mut self, scrobble: Scrobble) {
        self.entries.push(scrobble);
    }

    /// Move the selection cursor. An out-of-range position is rejected.
    pub fn select(&mut self, selection: Selection) -> bool {
        if let Selection::HistoryPosition(n) = selection {
            if n >= self.entries.len() {
                return false;
            }
        }
        self.selection = selection;
        true
    }

    /// Resolve the selection to an event. The in-progress event lives in the
    /// tracker, so the caller passes it in.
    pub fn selected<'a>(&'a self, current: Option<&'a Scrobble>) -> Option<&'a Scrobble> {
        match self.selection {
            Selection::None => None,
            Selection::CurrentTrack => current,
            Selection::HistoryPosition(n) => self.entries.get(n),
        }
    }

    /// Apply a field change to every stored event sharing the given track
    /// identity, plus the in-progress event if it matches.
    ///
    /// Returns the affected history positions so callers can notify
    /// observers precisely by index instead of broadcasting a full refresh.
    pub fn propagate_mutation<F>(
        &mut self,
        identity: &TrackIdentity,
        current: Option<&mut Scrobble>,
        mutator: F,
    ) -> MutationOutcome
    where
        F: Fn(&mut Scrobble),
    {
        let mut positions = Vec::new();
        for (position, entry) in self.entries.iter_mut().enumerate() {
            if entry.identity() == *identity {
                mutator(entry);
                positions.push(position);
            }
        }

        let mut current_matched = false;
        if let Some(current) = current {
            if current.identity() == *identity {
                mutator(current);
                current_matched = true;
            }
        }

        MutationOutcome {
            positions,
            current_matched,
        }
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new()
    }
}
