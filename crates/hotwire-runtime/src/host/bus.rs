//! In-process IPC bus
//!
//! Event subscriptions fan out synchronously on [`LocalIpcMain::emit`];
//! request handlers answer [`LocalIpcMain::invoke`]. Callbacks always run
//! with the internal locks released, so a listener may register or remove
//! other listeners.

use std::collections::HashMap;

use hotwire_kernel::{Handler, IpcError, IpcMain, Listener, Payload};
use parking_lot::Mutex;
use tracing::{debug, warn};

struct Subscription {
    listener: Listener,
    once: bool,
}

struct Registration {
    handler: Handler,
    once: bool,
}

/// Bus implementation living entirely inside the harness process
#[derive(Default)]
pub struct LocalIpcMain {
    listeners: Mutex<HashMap<String, Vec<Subscription>>>,
    handlers: Mutex<HashMap<String, Registration>>,
}

impl LocalIpcMain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` to every listener of `event`. Returns how many fired.
    pub fn emit(&self, event: &str, payload: &Payload) -> usize {
        let fired: Vec<Listener> = {
            let mut listeners = self.listeners.lock();
            let Some(subscriptions) = listeners.get_mut(event) else {
                debug!("No listeners for event {}", event);
                return 0;
            };

            let fired = subscriptions.iter().map(|s| s.listener.clone()).collect();
            subscriptions.retain(|s| !s.once);
            if subscriptions.is_empty() {
                listeners.remove(event);
            }
            fired
        };

        for listener in &fired {
            listener.call(payload);
        }

        fired.len()
    }

    /// Send a request to the handler of `channel` and return its answer.
    pub fn invoke(&self, channel: &str, payload: Payload) -> Result<Payload, IpcError> {
        let handler = {
            let mut handlers = self.handlers.lock();
            let once = match handlers.get(channel) {
                Some(registration) => registration.once,
                None => return Err(IpcError::NoHandler(channel.to_string())),
            };

            if once {
                handlers.remove(channel).map(|r| r.handler)
            } else {
                handlers.get(channel).map(|r| r.handler.clone())
            }
        };

        match handler {
            Some(handler) => handler.call(payload),
            None => Err(IpcError::NoHandler(channel.to_string())),
        }
    }

    /// Number of live subscriptions for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }

    /// Whether `channel` currently has a handler
    pub fn has_handler(&self, channel: &str) -> bool {
        self.handlers.lock().contains_key(channel)
    }

    /// Channels with a registered handler, sorted
    pub fn handler_channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.handlers.lock().keys().cloned().collect();
        channels.sort();
        channels
    }
}

impl IpcMain for LocalIpcMain {
    fn on(&self, event: &str, listener: Listener) {
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Subscription {
                listener,
                once: false,
            });
    }

    fn once(&self, event: &str, listener: Listener) {
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Subscription {
                listener,
                once: true,
            });
    }

    fn remove_listener(&self, event: &str, listener: &Listener) {
        let mut listeners = self.listeners.lock();
        if let Some(subscriptions) = listeners.get_mut(event) {
            if let Some(index) = subscriptions.iter().position(|s| &s.listener == listener) {
                subscriptions.remove(index);
            }
            if subscriptions.is_empty() {
                listeners.remove(event);
            }
        }
    }

    fn handle(&self, channel: &str, handler: Handler) {
        let previous = self.handlers.lock().insert(
            channel.to_string(),
            Registration {
                handler,
                once: false,
            },
        );
        if previous.is_some() {
            warn!("Handler for channel {} replaced", channel);
        }
    }

    fn handle_once(&self, channel: &str, handler: Handler) {
        let previous = self.handlers.lock().insert(
            channel.to_string(),
            Registration {
                handler,
                once: true,
            },
        );
        if previous.is_some() {
            warn!("Handler for channel {} replaced", channel);
        }
    }

    fn remove_handler(&self, channel: &str) {
        self.handlers.lock().remove(channel);
    }
}
