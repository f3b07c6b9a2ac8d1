//! Application lifecycle abstraction

use crate::ipc::Listener;

/// Process-level application object (ready, window-all-closed, before-quit, ...).
///
/// Subscribe only: nothing in the harness removes app listeners.
pub trait AppLifecycle: Send + Sync {
    fn on(&self, event: &str, listener: Listener);
}
