//! Subscription keys for the live channel.
//!
//! The channel address carries one `key<index>=<sprint id>` query pair per
//! subscribed sprint, zero-indexed, joined with `&`:
//!
//! ```text
//! wss://push.example.com/prod?key0=<id0>&key1=<id1>
//! ```
//!
//! The key set is fixed for the lifetime of one connection.

use std::collections::HashSet;

use pareto_core::types::{Sprint, SprintId};

/// The sprint identifiers one channel connection is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subscription {
    ids: Vec<SprintId>,
}

impl Subscription {
    /// Derive the key set from the sprints fetched on entry.
    ///
    /// Order follows `sprints`; a repeated identifier keeps only its first
    /// position so the key set never lists a sprint twice.
    pub fn from_sprints(sprints: &[Sprint]) -> Self {
        Self::from_ids(sprints.iter().map(|s| s.id.clone()))
    }

    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = SprintId>,
    {
        let mut seen = HashSet::new();
        let ids = ids
            .into_iter()
            .filter(|id| {
                let fresh = seen.insert(id.clone());
                if !fresh {
                    tracing::debug!(sprint = %id, "duplicate sprint id dropped from subscription");
                }
                fresh
            })
            .collect();
        Self { ids }
    }

    pub fn ids(&self) -> &[SprintId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn covers(&self, id: &SprintId) -> bool {
        self.ids.contains(id)
    }

    /// `key0=<id0>&key1=<id1>&…`; empty when there is nothing to subscribe to.
    pub fn query_string(&self) -> String {
        self.ids
            .iter()
            .enumerate()
            .map(|(idx, id)| format!("key{idx}={id}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Full channel address for `endpoint`.
    ///
    /// An empty key set yields the bare endpoint.
    pub fn address(&self, endpoint: &str) -> String {
        let query = self.query_string();
        if query.is_empty() {
            endpoint.to_string()
        } else {
            format!("{endpoint}?{query}")
        }
    }
}
