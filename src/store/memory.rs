//! An in-process `DocumentStore`.
//!
//! Besides holding data, it can simulate the failure modes of a hosted store: an access policy
//! that denies operations on a collection, and loss of connectivity. Listeners are notified while
//! the commit still holds the lock, so every listener sees snapshots in commit order.

use crate::store::{
    apply_write, check_precondition, Commit, DocPath, Document, DocumentStore, Listener,
    ListenerId, Operation, Query, StoreError, StoreEvent, StoreResult,
};
use crate::store::listeners::Listeners;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

#[derive(Default)]
struct State {
    docs: BTreeMap<DocPath, Document>,
    denied: BTreeSet<(String, Operation)>,
    offline: bool,
}

impl State {
    fn check(&self, path: &str, collection: &str, operation: Operation) -> StoreResult<()> {
        if self.offline {
            return Err(StoreError::Unavailable {
                path: path.to_string(),
                operation,
                message: "the client is offline".to_string(),
            });
        }
        if self.denied.contains(&(collection.to_string(), operation)) {
            return Err(StoreError::PermissionDenied {
                path: path.to_string(),
                operation,
            });
        }
        Ok(())
    }

    fn run_query(&self, query: &Query) -> Vec<Document> {
        self.docs
            .values()
            .filter(|d| query.matches(d))
            .cloned()
            .collect()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    listeners: Listeners,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            listeners: Listeners::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Denies `operation` on every document of `collection`. `Operation::List` covers queries and
    /// subscriptions.
    pub fn deny(&self, collection: &str, operation: Operation) {
        self.lock()
            .denied
            .insert((collection.to_string(), operation));
    }

    /// Removes every denial.
    pub fn allow_all(&self) {
        self.lock().denied.clear();
    }

    /// Going offline fails every live listener with `StoreError::Unavailable` and every later
    /// operation until connectivity is restored.
    pub fn set_offline(&self, offline: bool) {
        let mut state = self.lock();
        state.offline = offline;
        if offline {
            for (id, query) in self.listeners.all() {
                let path = query.collection_name().to_string();
                self.listeners.send(
                    id,
                    StoreEvent::Error(StoreError::Unavailable {
                        path,
                        operation: Operation::List,
                        message: "the client is offline".to_string(),
                    }),
                );
            }
        }
        debug!("Memory store offline={offline}");
    }

    /// The number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// The number of documents in `collection`, ignoring access policy.
    pub fn count(&self, collection: &str) -> usize {
        self.lock()
            .docs
            .keys()
            .filter(|p| p.collection() == collection)
            .count()
    }

    fn notify(&self, state: &State, collections: &BTreeSet<String>) {
        for (id, query) in self.listeners.interested(collections) {
            let snapshot = state.run_query(&query);
            trace!("Pushing {} documents to listener {id:?}", snapshot.len());
            self.listeners.send(id, StoreEvent::Snapshot(snapshot));
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
        let state = self.lock();
        state.check(&path.to_string(), path.collection(), Operation::Get)?;
        Ok(state.docs.get(path).cloned())
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let state = self.lock();
        let collection = query.collection_name();
        state.check(collection, collection, Operation::List)?;
        Ok(state.run_query(query))
    }

    async fn commit(&self, commit: Commit) -> StoreResult<()> {
        let mut state = self.lock();

        for write in commit.writes() {
            let path = write.path();
            let exists = state.docs.contains_key(path);
            state.check(&path.to_string(), path.collection(), write.operation(exists))?;
        }

        for precondition in commit.preconditions() {
            let current = state.docs.get(&precondition.path).map(Document::version);
            check_precondition(precondition, current)?;
        }

        // Stage every write before touching the real map so a failing write applies nothing.
        let mut staged: BTreeMap<DocPath, Option<Document>> = BTreeMap::new();
        for write in commit.writes() {
            let path = write.path();
            let existing = match staged.get(path) {
                Some(pending) => pending.clone(),
                None => state.docs.get(path).cloned(),
            };
            let next = apply_write(existing.as_ref(), write)?;
            staged.insert(path.clone(), next);
        }

        for (path, doc) in staged {
            match doc {
                Some(doc) => {
                    state.docs.insert(path, doc);
                }
                None => {
                    state.docs.remove(&path);
                }
            }
        }
        trace!("Committed {} writes", commit.writes().len());

        self.notify(&state, &commit.touched_collections());
        Ok(())
    }

    async fn subscribe(&self, query: Query) -> StoreResult<Listener> {
        let state = self.lock();
        let (id, events) = self.listeners.register(query.clone());
        let collection = query.collection_name();
        let event = match state.check(collection, collection, Operation::List) {
            Ok(()) => StoreEvent::Snapshot(state.run_query(&query)),
            Err(e) => StoreEvent::Error(e),
        };
        self.listeners.send(id, event);
        Ok(Listener { id, events })
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}
