//! Classification Coordination
//!
//! Every module id maps to a slot that is settled at most once. Proxies for a
//! dependency may ask for its classification before or after the dependency
//! itself has been transformed; both orders observe the same value.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::trace;

/// Export shape of a module, as seen by the proxies of edges pointing at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Classification {
    /// Nothing conclusive is known; proxies unwrap the namespace at runtime.
    Unknown,
    EsmWithDefault,
    EsmWithoutDefault,
    Cjs,
}

impl Classification {
    pub fn is_cjs(self) -> bool {
        self == Classification::Cjs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationState {
    Pending,
    Resolved(Classification),
}

#[derive(Debug, Default)]
pub struct ClassificationRegistry {
    slots: DashMap<String, watch::Sender<Option<Classification>>>,
}

impl ClassificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspends until `id` has been classified.
    pub async fn wait(&self, id: &str) -> Classification {
        // The map guard must not be held across the await below.
        let mut receiver = self
            .slots
            .entry(id.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe();

        loop {
            let current = *receiver.borrow_and_update();
            if let Some(classification) = current {
                return classification;
            }
            trace!(id, "waiting for classification");
            if receiver.changed().await.is_err() {
                return Classification::Unknown;
            }
        }
    }

    /// Settles `id`. Returns `false` if it was already settled, leaving the
    /// first value in place.
    pub fn resolve(&self, id: &str, classification: Classification) -> bool {
        let sender = self
            .slots
            .entry(id.to_string())
            .or_insert_with(|| watch::channel(None).0);
        sender.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(classification);
            true
        })
    }

    pub fn peek(&self, id: &str) -> ClassificationState {
        match self.slots.get(id).and_then(|sender| *sender.borrow()) {
            Some(classification) => ClassificationState::Resolved(classification),
            None => ClassificationState::Pending,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
