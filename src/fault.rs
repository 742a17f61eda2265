//! The fault channel: structured reports of permission and connectivity failures.
//!
//! Services and subscriptions receive a `FaultSink` explicitly (through `AppContext`) and publish
//! to it whenever the store denies an operation or cannot be reached. The error is still returned
//! to the caller; the sink is for whoever wants to surface faults globally (a log, a UI banner).

use crate::store::{Operation, StoreError};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

pub const PERMISSION_ERROR: &str = "permission-error";
pub const CONNECTIVITY_ERROR: &str = "connectivity-error";

/// The payload of a `permission-error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionFault {
    pub resource_path: String,
    pub operation: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "name")]
pub enum FaultEvent {
    #[serde(rename = "permission-error")]
    Permission(PermissionFault),
    #[serde(rename = "connectivity-error", rename_all = "camelCase")]
    Connectivity {
        resource_path: String,
        operation: Operation,
        message: String,
    },
}

impl FaultEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FaultEvent::Permission(_) => PERMISSION_ERROR,
            FaultEvent::Connectivity { .. } => CONNECTIVITY_ERROR,
        }
    }

    pub fn resource_path(&self) -> &str {
        match self {
            FaultEvent::Permission(p) => &p.resource_path,
            FaultEvent::Connectivity { resource_path, .. } => resource_path,
        }
    }

    /// The event for a store error, if it is one that goes to the fault channel.
    pub fn from_store_error(error: &StoreError, request_payload: Option<Value>) -> Option<Self> {
        match error {
            StoreError::PermissionDenied { path, operation } => {
                Some(FaultEvent::Permission(PermissionFault {
                    resource_path: path.clone(),
                    operation: *operation,
                    request_payload,
                }))
            }
            StoreError::Unavailable {
                path,
                operation,
                message,
            } => Some(FaultEvent::Connectivity {
                resource_path: path.clone(),
                operation: *operation,
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

/// Receives fault events. `emit` must not block.
pub trait FaultSink: Send + Sync {
    fn emit(&self, event: FaultEvent);
}

/// Publishes the fault for `error` to `sink`, if there is one. Returns true if something was
/// published.
pub(crate) fn report(sink: &dyn FaultSink, error: &StoreError, payload: Option<Value>) -> bool {
    match FaultEvent::from_store_error(error, payload) {
        Some(event) => {
            sink.emit(event);
            true
        }
        None => false,
    }
}

/// A broadcast fault channel. Any number of receivers can subscribe; events published while no
/// one listens are dropped.
#[derive(Clone)]
pub struct FaultChannel {
    sender: broadcast::Sender<FaultEvent>,
}

impl FaultChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FaultEvent> {
        self.sender.subscribe()
    }

    /// Spawns a task that logs every fault until the channel is dropped.
    pub fn spawn_logger(&self) -> JoinHandle<()> {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => warn!(
                        "{}: {}",
                        event.name(),
                        serde_json::to_string(&event).unwrap_or_default()
                    ),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Fault logger skipped {n} events")
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for FaultChannel {
    fn default() -> Self {
        Self::new(64)
    }
}

impl FaultSink for FaultChannel {
    fn emit(&self, event: FaultEvent) {
        // No receivers is not an error.
        let _ = self.sender.send(event);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpFaultSink;

impl FaultSink for NoOpFaultSink {
    fn emit(&self, _event: FaultEvent) {}
}

/// Keeps every event in memory. Useful for asserting on faults.
#[derive(Debug, Clone, Default)]
pub struct RecordingFaultSink {
    events: Arc<Mutex<Vec<FaultEvent>>>,
}

impl RecordingFaultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FaultEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FaultSink for RecordingFaultSink {
    fn emit(&self, event: FaultEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
