//! The single owned sprint collection.
//!
//! [`SprintStore`] holds the ordered, id-unique collection and publishes every
//! revision through a `watch` channel. Views hold a [`SprintView`] and read the
//! latest published value; they never keep a second copy to synchronise.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;

use pareto_core::types::{Sprint, SprintId};

use crate::frame::Frame;
use crate::reconcile::{reconcile, Outcome};

/// Immutable snapshot handed to readers.
pub type Snapshot = Arc<Vec<Sprint>>;

/// Owner of the sprint collection. Writes take `&mut self`; there is exactly
/// one writer per store.
#[derive(Debug)]
pub struct SprintStore {
    tx: watch::Sender<Snapshot>,
}

impl Default for SprintStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SprintStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Self { tx }
    }

    pub fn from_sprints(sprints: Vec<Sprint>) -> Self {
        let mut store = Self::new();
        store.replace_all(sprints);
        store
    }

    /// Replace the whole collection, e.g. with the result of the initial fetch.
    ///
    /// Later duplicates of an identifier are discarded so the collection stays
    /// unique by id.
    pub fn replace_all(&mut self, sprints: Vec<Sprint>) {
        let mut seen = HashSet::new();
        let unique: Vec<Sprint> = sprints
            .into_iter()
            .filter(|s| {
                let fresh = seen.insert(s.id.clone());
                if !fresh {
                    tracing::warn!(sprint = %s.id, "duplicate sprint in fetch result ignored");
                }
                fresh
            })
            .collect();
        self.tx.send_replace(Arc::new(unique));
    }

    /// Fold one frame into the collection, publishing only when it changed.
    pub fn apply(&mut self, frame: Frame) -> Outcome {
        let incoming = match frame {
            Frame::Status { message } => return Outcome::Status { message },
            Frame::SprintUpdate(incoming) => incoming,
        };
        // Rejected ids never pay for a copy of the collection.
        if !self.tx.borrow().iter().any(|s| s.id == incoming.id) {
            return Outcome::UnknownSprint { id: incoming.id };
        }

        let mut next = self.snapshot();
        let outcome = reconcile(
            Arc::make_mut(&mut next).as_mut_slice(),
            Frame::SprintUpdate(incoming),
        );
        if outcome.changed() {
            self.tx.send_replace(next);
        }
        outcome
    }

    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    pub fn get(&self, id: &SprintId) -> Option<Sprint> {
        self.tx.borrow().iter().find(|s| &s.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    pub fn subscribe(&self) -> SprintView {
        SprintView {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side of a [`SprintStore`].
#[derive(Debug, Clone)]
pub struct SprintView {
    rx: watch::Receiver<Snapshot>,
}

impl SprintView {
    /// Latest published collection; marks it as seen.
    pub fn current(&mut self) -> Snapshot {
        self.rx.borrow_and_update().clone()
    }

    pub fn get(&self, id: &SprintId) -> Option<Sprint> {
        self.rx.borrow().iter().find(|s| &s.id == id).cloned()
    }

    /// Wait for the next revision. Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}
