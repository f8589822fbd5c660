//! Folding decoded frames into the sprint collection.
//!
//! Policy for a sprint-update frame:
//!
//! 1. Locate the stored record with the same identifier.
//! 2. No match → drop the frame and log it. The collection never grows from
//!    the channel; only the initial fetch introduces sprints.
//! 3. Both records carry `updatedAt` and the incoming one is strictly older
//!    → drop it as stale. Frames carry no sequence number, so this is the
//!    only defence against reordering. Without `updatedAt` on either side the
//!    last processed frame wins.
//! 4. Otherwise replace the record in place; position and every other record
//!    are untouched.
//!
//! Status frames never change the collection.

use tokio::sync::broadcast;

use pareto_core::types::{Sprint, SprintId};

use crate::error::FrameError;
use crate::frame::Frame;
use crate::store::SprintStore;

/// What a single frame did to the collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Record at `index` was replaced.
    Replaced { id: SprintId, index: usize },
    /// No stored record has this identifier; nothing changed.
    UnknownSprint { id: SprintId },
    /// Incoming `updatedAt` is older than the stored one; nothing changed.
    Stale {
        id: SprintId,
        stored: i64,
        incoming: i64,
    },
    /// Status notice; nothing changed.
    Status { message: String },
}

impl Outcome {
    pub fn changed(&self) -> bool {
        matches!(self, Outcome::Replaced { .. })
    }
}

/// A user-visible message raised while a live session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Text of a status frame.
    Status(String),
    /// A caught failure (fetch error, dropped frame, channel closed).
    Error(String),
}

/// Apply `frame` to `sprints` according to the module policy.
pub fn reconcile(sprints: &mut [Sprint], frame: Frame) -> Outcome {
    let incoming = match frame {
        Frame::Status { message } => return Outcome::Status { message },
        Frame::SprintUpdate(sprint) => sprint,
    };

    let Some(index) = sprints.iter().position(|s| s.id == incoming.id) else {
        return Outcome::UnknownSprint { id: incoming.id };
    };

    if let (Some(stored), Some(incoming_at)) = (sprints[index].updated_at, incoming.updated_at) {
        if incoming_at < stored {
            return Outcome::Stale {
                id: incoming.id,
                stored,
                incoming: incoming_at,
            };
        }
    }

    let id = incoming.id.clone();
    sprints[index] = *incoming;
    Outcome::Replaced { id, index }
}

/// Frame handler bound to a [`SprintStore`].
///
/// The reconciler is the store's only writer while a channel is open; every
/// frame is fully applied and published before the next one is looked at.
pub struct Reconciler {
    store: SprintStore,
    notices: broadcast::Sender<Notice>,
    applied: u64,
    dropped: u64,
}

impl Reconciler {
    pub fn new(store: SprintStore, notices: broadcast::Sender<Notice>) -> Self {
        Self {
            store,
            notices,
            applied: 0,
            dropped: 0,
        }
    }

    pub fn store(&self) -> &SprintStore {
        &self.store
    }

    /// Frames that replaced a record.
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Frames that were malformed, unknown or stale.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Decode and apply one raw payload.
    ///
    /// Malformed payloads are dropped with a warning and reported as an error
    /// notice; they never reach the store.
    pub fn handle_raw(&mut self, raw: &str) -> Result<Outcome, FrameError> {
        match Frame::decode(raw) {
            Ok(frame) => Ok(self.handle(frame)),
            Err(err) => {
                self.dropped += 1;
                tracing::warn!(error = %err, len = raw.len(), "dropping malformed frame");
                self.notify(Notice::Error(format!("ignored malformed update: {err}")));
                Err(err)
            }
        }
    }

    pub fn handle(&mut self, frame: Frame) -> Outcome {
        let outcome = self.store.apply(frame);
        match &outcome {
            Outcome::Replaced { id, index } => {
                self.applied += 1;
                tracing::debug!(sprint = %id, index, "sprint replaced");
            }
            Outcome::UnknownSprint { id } => {
                self.dropped += 1;
                tracing::warn!(sprint = %id, "update for unsubscribed sprint dropped");
            }
            Outcome::Stale {
                id,
                stored,
                incoming,
            } => {
                self.dropped += 1;
                tracing::info!(
                    sprint = %id,
                    stored_updated_at = stored,
                    incoming_updated_at = incoming,
                    "stale sprint update dropped",
                );
            }
            Outcome::Status { message } => {
                tracing::info!(message = %message, "channel status");
                self.notify(Notice::Status(message.clone()));
            }
        }
        outcome
    }

    fn notify(&self, notice: Notice) {
        // No subscribers is fine; notices are best effort.
        let _ = self.notices.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sprint(value: serde_json::Value) -> Sprint {
        serde_json::from_value(value).expect("sprint")
    }

    fn update(value: serde_json::Value) -> Frame {
        Frame::from_value(value).expect("frame")
    }

    #[test]
    fn matching_update_replaces_in_place() {
        let mut sprints = vec![
            sprint(json!({"id": "a", "score": 1})),
            sprint(json!({"id": "b", "score": 2})),
        ];

        let outcome = reconcile(&mut sprints, update(json!({"id": "a", "score": 5})));

        assert_eq!(
            outcome,
            Outcome::Replaced {
                id: SprintId::from("a"),
                index: 0
            }
        );
        assert_eq!(
            sprints,
            vec![
                sprint(json!({"id": "a", "score": 5})),
                sprint(json!({"id": "b", "score": 2})),
            ]
        );
    }

    #[test]
    fn replacement_drops_fields_missing_from_the_update() {
        let mut sprints = vec![sprint(json!({"id": "a", "score": 1, "badge": "gold"}))];
        reconcile(&mut sprints, update(json!({"id": "a", "score": 2})));
        assert!(sprints[0].extra_field("badge").is_none());
    }

    // Current policy: updates for identifiers outside the collection are
    // dropped rather than appended.
    #[test]
    fn unknown_id_leaves_collection_unchanged() {
        let mut sprints = vec![sprint(json!({"id": "a", "score": 1}))];
        let before = sprints.clone();

        let outcome = reconcile(&mut sprints, update(json!({"id": "zzz", "score": 9})));

        assert_eq!(
            outcome,
            Outcome::UnknownSprint {
                id: SprintId::from("zzz")
            }
        );
        assert_eq!(sprints, before);
    }

    #[test]
    fn status_frame_leaves_collection_unchanged() {
        let mut sprints = vec![sprint(json!({"id": "a"}))];
        let before = sprints.clone();
        let outcome = reconcile(&mut sprints, update(json!({"message": "Forbidden"})));
        assert!(!outcome.changed());
        assert_eq!(sprints, before);
    }

    #[test]
    fn older_update_is_rejected_as_stale() {
        let mut sprints = vec![sprint(json!({"id": "a", "updatedAt": 200, "score": 3}))];
        let outcome = reconcile(
            &mut sprints,
            update(json!({"id": "a", "updatedAt": 100, "score": 1})),
        );
        assert_eq!(
            outcome,
            Outcome::Stale {
                id: SprintId::from("a"),
                stored: 200,
                incoming: 100
            }
        );
        assert_eq!(sprints[0].extra_field("score"), Some(&json!(3)));
    }

    #[test]
    fn equal_update_time_is_applied() {
        let mut sprints = vec![sprint(json!({"id": "a", "updatedAt": 200, "score": 3}))];
        let outcome = reconcile(
            &mut sprints,
            update(json!({"id": "a", "updatedAt": 200, "score": 4})),
        );
        assert!(outcome.changed());
    }

    // Without updatedAt there is nothing to order by: the last processed
    // frame wins, even if the server produced it earlier.
    #[test]
    fn unversioned_updates_are_last_processed_wins() {
        let mut sprints = vec![sprint(json!({"id": "a", "score": 1}))];
        reconcile(&mut sprints, update(json!({"id": "a", "score": 3})));
        reconcile(&mut sprints, update(json!({"id": "a", "score": 2})));
        assert_eq!(sprints[0].extra_field("score"), Some(&json!(2)));
    }

    #[test]
    fn reconciler_counts_and_notifies() {
        let store = SprintStore::from_sprints(vec![sprint(json!({"id": "a"}))]);
        let (tx, mut rx) = broadcast::channel(8);
        let mut reconciler = Reconciler::new(store, tx);

        assert!(reconciler.handle_raw(r#"{"id":"a","score":1}"#).is_ok());
        assert!(reconciler.handle_raw(r#"{"id":"nope"}"#).is_ok());
        assert!(reconciler.handle_raw("garbage").is_err());
        assert!(reconciler.handle_raw(r#"{"message":"hello"}"#).is_ok());

        assert_eq!(reconciler.applied(), 1);
        assert_eq!(reconciler.dropped(), 2);

        assert!(matches!(rx.try_recv(), Ok(Notice::Error(_))));
        assert_eq!(rx.try_recv().ok(), Some(Notice::Status("hello".to_string())));
    }
}
