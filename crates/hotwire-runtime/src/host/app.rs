//! In-process application lifecycle object

use std::collections::HashMap;

use hotwire_kernel::{AppLifecycle, Listener, Payload};
use parking_lot::Mutex;
use tracing::debug;

/// Application object whose events are raised by the harness itself
/// (for example `before-quit` on Ctrl-C).
#[derive(Default)]
pub struct LocalApp {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
}

impl LocalApp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise `event`. Returns how many listeners ran.
    pub fn emit(&self, event: &str, payload: &Payload) -> usize {
        let listeners = self.listeners.lock().get(event).cloned().unwrap_or_default();
        debug!("App event {} -> {} listener(s)", event, listeners.len());

        for listener in &listeners {
            listener.call(payload);
        }
        listeners.len()
    }

    /// Number of subscriptions for `event`
    pub fn subscription_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }
}

impl AppLifecycle for LocalApp {
    fn on(&self, event: &str, listener: Listener) {
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }
}
