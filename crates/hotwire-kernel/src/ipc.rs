//! Main-process IPC bus abstraction
//!
//! Mirrors the shape of a desktop main-process IPC object: fire-and-forget
//! event subscriptions (`on` / `once`) and request/response handlers
//! (`handle` / `handle_once`). Listener identity is explicit so that a
//! listener can be removed again after the code that registered it is gone.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Message body carried over the bus.
pub type Payload = serde_json::Value;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Errors surfaced by bus operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IpcError {
    /// No handler is registered for the invoked channel.
    #[error("No handler registered for channel: {0}")]
    NoHandler(String),

    /// A handler was found but failed while answering.
    #[error("Handler for channel {channel} failed: {message}")]
    HandlerFailed { channel: String, message: String },
}

/// An event subscription callback.
///
/// Every `Listener::new` gets a fresh identity; clones share it. Removal
/// from a bus matches on that identity, never on the closure itself.
#[derive(Clone)]
pub struct Listener {
    id: u64,
    callback: Arc<dyn Fn(&Payload) + Send + Sync>,
}

impl Listener {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        Self {
            id: NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed),
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn call(&self, payload: &Payload) {
        (self.callback)(payload)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

/// A request/response handler.
#[derive(Clone)]
pub struct Handler {
    callback: Arc<dyn Fn(Payload) -> Result<Payload, IpcError> + Send + Sync>,
}

impl Handler {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(Payload) -> Result<Payload, IpcError> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn call(&self, payload: Payload) -> Result<Payload, IpcError> {
        (self.callback)(payload)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

/// Main-process side of the IPC bus.
///
/// Registration calls are synchronous: they only update subscription
/// tables and never run user code.
pub trait IpcMain: Send + Sync {
    /// Subscribe to `event` until removed.
    fn on(&self, event: &str, listener: Listener);

    /// Subscribe to the next occurrence of `event` only.
    fn once(&self, event: &str, listener: Listener);

    /// Remove a previously registered listener. Unknown listeners are ignored.
    fn remove_listener(&self, event: &str, listener: &Listener);

    /// Answer requests on `channel`. A second registration replaces the first.
    fn handle(&self, channel: &str, handler: Handler);

    /// Answer the next request on `channel`, then unregister.
    fn handle_once(&self, channel: &str, handler: Handler);

    /// Drop the handler for `channel`. Unknown channels are ignored.
    fn remove_handler(&self, channel: &str);
}
