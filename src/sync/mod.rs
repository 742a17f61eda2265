//! Live views of a query.
//!
//! A subscription registers a store listener and runs one tokio task that turns every snapshot
//! pushed by the store into a `ViewState`: documents are parsed into typed records, the ones that
//! fail their schema check are dropped with a warning, and the rest are sorted. Each new state
//! replaces the previous one whole through a `watch` channel, so a reader never observes a
//! half-applied snapshot.
//!
//! Permission and connectivity failures end the subscription. They are published to the fault
//! sink and left in the state as `error`; they are never returned to the reader as an `Err`.

mod order;

pub use order::SortOrder;

use crate::fault::{self, FaultSink};
use crate::model::{Record, SchemaError};
use crate::store::{Document, DocumentStore, ListenerId, Listener, Query, StoreError, StoreEvent};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// The local mirror of a query's result set.
#[derive(Debug)]
pub struct ViewState<T> {
    pub records: Arc<Vec<T>>,
    /// True until the first snapshot or error arrives.
    pub loading: bool,
    pub error: Option<StoreError>,
}

impl<T> ViewState<T> {
    fn loading() -> Self {
        Self {
            records: Arc::new(Vec::new()),
            loading: true,
            error: None,
        }
    }

    fn failed(error: StoreError) -> Self {
        Self {
            records: Arc::new(Vec::new()),
            loading: false,
            error: Some(error),
        }
    }
}

impl<T> Clone for ViewState<T> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}

type Slot<T> = Arc<Mutex<Option<watch::Sender<ViewState<T>>>>>;

fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns a running subscription. Dropping the handle closes it.
pub struct SubscriptionHandle<T> {
    state: watch::Receiver<ViewState<T>>,
    slot: Slot<T>,
    task: Mutex<Option<JoinHandle<()>>>,
    listener: Option<ListenerId>,
    store: Arc<dyn DocumentStore>,
}

impl<T> SubscriptionHandle<T>
where
    T: Send + Sync + 'static,
{
    /// The current state.
    pub fn state(&self) -> ViewState<T> {
        self.state.borrow().clone()
    }

    /// A receiver of every state from now on, for callers that want to await changes themselves.
    pub fn watch(&self) -> watch::Receiver<ViewState<T>> {
        self.state.clone()
    }

    /// Waits for the next state. `None` once the subscription has stopped.
    pub async fn next(&mut self) -> Option<ViewState<T>> {
        self.state.changed().await.ok()?;
        Some(self.state.borrow_and_update().clone())
    }

    /// Waits until the state satisfies `ready`. `None` if the subscription stops first.
    pub async fn wait_for<F>(&mut self, mut ready: F) -> Option<ViewState<T>>
    where
        F: FnMut(&ViewState<T>) -> bool,
    {
        self.state
            .wait_for(|s| ready(s))
            .await
            .ok()
            .map(|s| (*s).clone())
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.slot).is_none()
    }

    /// Stops the subscription. Once this returns no further snapshot is applied to the state;
    /// the last state stays readable. Closing twice is a no-op.
    pub fn close(&self) {
        let sender = lock(&self.slot).take();
        if sender.is_none() {
            return;
        }
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        if let Some(id) = self.listener {
            self.store.unsubscribe(id);
        }
        debug!("Closed subscription {:?}", self.listener);
    }
}

impl<T> Drop for SubscriptionHandle<T> {
    fn drop(&mut self) {
        if lock(&self.slot).take().is_some() {
            if let Some(task) = lock(&self.task).take() {
                task.abort();
            }
            if let Some(id) = self.listener {
                self.store.unsubscribe(id);
            }
        }
    }
}

/// Subscribes `query`, parsing documents with `T::from_document`.
pub async fn subscribe<T>(
    store: Arc<dyn DocumentStore>,
    query: Query,
    order: SortOrder<T>,
    faults: Arc<dyn FaultSink>,
) -> SubscriptionHandle<T>
where
    T: Record,
{
    subscribe_with(store, query, T::from_document, order, faults).await
}

/// Subscribes `query`, parsing documents with `mapper`.
///
/// If the store refuses the subscription outright, the fault is published and the returned
/// handle is already in its final, failed state.
pub async fn subscribe_with<T, F>(
    store: Arc<dyn DocumentStore>,
    query: Query,
    mapper: F,
    order: SortOrder<T>,
    faults: Arc<dyn FaultSink>,
) -> SubscriptionHandle<T>
where
    T: Send + Sync + 'static,
    F: Fn(&Document) -> Result<T, SchemaError> + Send + Sync + 'static,
{
    let (sender, receiver) = watch::channel(ViewState::loading());
    let collection = query.collection_name().to_string();

    let Listener { id, mut events } = match store.subscribe(query).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!("Subscription to '{collection}' failed: {e}");
            fault::report(faults.as_ref(), &e, None);
            sender.send_replace(ViewState::failed(e));
            return SubscriptionHandle {
                state: receiver,
                slot: Arc::new(Mutex::new(None)),
                task: Mutex::new(None),
                listener: None,
                store,
            };
        }
    };

    let slot: Slot<T> = Arc::new(Mutex::new(Some(sender)));
    let task_slot = slot.clone();
    let task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let next = match event {
                StoreEvent::Snapshot(docs) => {
                    let mut records = Vec::with_capacity(docs.len());
                    for doc in &docs {
                        match mapper(doc) {
                            Ok(record) => records.push(record),
                            Err(e) => warn!("Dropping document from view: {e}"),
                        }
                    }
                    order.sort(&mut records);
                    ViewState {
                        records: Arc::new(records),
                        loading: false,
                        error: None,
                    }
                }
                StoreEvent::Error(e) => {
                    warn!("Subscription to '{collection}' stopped: {e}");
                    ViewState::failed(e)
                }
            };
            let failure = next.error.clone();
            let stop = failure.is_some();

            // Applying and reporting under the lock is what lets `close` promise that nothing
            // lands or gets published after it.
            let applied = {
                let slot = lock(&task_slot);
                match slot.as_ref() {
                    Some(sender) => {
                        if let Some(e) = &failure {
                            fault::report(faults.as_ref(), e, None);
                        }
                        sender.send_replace(next);
                        true
                    }
                    None => false,
                }
            };
            if !applied || stop {
                break;
            }
        }
        // The store is gone or the listener ended; the last state stays.
        lock(&task_slot).take();
    });

    SubscriptionHandle {
        state: receiver,
        slot,
        task: Mutex::new(Some(task)),
        listener: Some(id),
        store,
    }
}
