//! The registry of live listeners shared by the store implementations.

use crate::store::{Query, StoreEvent};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::trace;

/// Identifies a listener registered with a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

struct Entry {
    query: Query,
    sender: mpsc::UnboundedSender<StoreEvent>,
}

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<ListenerId, Entry>>,
}

impl Listeners {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ListenerId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(
        &self,
        query: Query,
    ) -> (ListenerId, mpsc::UnboundedReceiver<StoreEvent>) {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().insert(id, Entry { query, sender });
        trace!("Registered listener {id:?}");
        (id, receiver)
    }

    pub(crate) fn remove(&self, id: ListenerId) {
        if self.lock().remove(&id).is_some() {
            trace!("Removed listener {id:?}");
        }
    }

    /// The listeners whose query reads one of `collections`.
    pub(crate) fn interested(&self, collections: &BTreeSet<String>) -> Vec<(ListenerId, Query)> {
        self.lock()
            .iter()
            .filter(|(_, e)| collections.contains(e.query.collection_name()))
            .map(|(id, e)| (*id, e.query.clone()))
            .collect()
    }

    /// Every registered listener.
    pub(crate) fn all(&self) -> Vec<(ListenerId, Query)> {
        self.lock()
            .iter()
            .map(|(id, e)| (*id, e.query.clone()))
            .collect()
    }

    /// Pushes `event` to a listener. A listener whose receiver is gone is dropped from the
    /// registry, and so is a listener that was sent an error.
    pub(crate) fn send(&self, id: ListenerId, event: StoreEvent) {
        let mut entries = self.lock();
        let terminal = matches!(event, StoreEvent::Error(_));
        let delivered = match entries.get(&id) {
            Some(entry) => entry.sender.send(event).is_ok(),
            None => return,
        };
        if !delivered || terminal {
            entries.remove(&id);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}
