//! Context proxies
//!
//! Every module gets a [`ModuleContext`] whose bus and app objects wrap the
//! real ones: subscriptions are routed through the [`RegistrationTracker`]
//! under the module's path, and application events are subscribed at most
//! once for the lifetime of the harness.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hotwire_kernel::{AppLifecycle, Handler, HostContext, IpcMain, Listener, ModuleContext};
use parking_lot::Mutex;
use tracing::debug;

use crate::tracker::RegistrationTracker;

/// Bus wrapper bound to one module path
pub struct TrackedIpcMain {
    path: PathBuf,
    tracker: Arc<RegistrationTracker>,
}

impl TrackedIpcMain {
    pub fn new(path: PathBuf, tracker: Arc<RegistrationTracker>) -> Self {
        Self { path, tracker }
    }
}

impl IpcMain for TrackedIpcMain {
    fn on(&self, event: &str, listener: Listener) {
        self.tracker.record_persistent(&self.path, event, listener);
    }

    fn once(&self, event: &str, listener: Listener) {
        self.tracker.record_once(&self.path, event, listener);
    }

    fn remove_listener(&self, event: &str, listener: &Listener) {
        self.tracker.bus().remove_listener(event, listener);
    }

    fn handle(&self, channel: &str, handler: Handler) {
        self.tracker.record_handle(&self.path, channel, handler);
    }

    fn handle_once(&self, channel: &str, handler: Handler) {
        self.tracker.record_handle_once(&self.path, channel, handler);
    }

    fn remove_handler(&self, channel: &str) {
        self.tracker.bus().remove_handler(channel);
    }
}

/// App wrapper that ignores repeated subscriptions to the same event
pub struct DedupAppLifecycle {
    app: Arc<dyn AppLifecycle>,
    used: Arc<Mutex<HashSet<String>>>,
}

impl AppLifecycle for DedupAppLifecycle {
    fn on(&self, event: &str, listener: Listener) {
        if !self.used.lock().insert(event.to_string()) {
            debug!("App event {} already subscribed, ignoring", event);
            return;
        }
        self.app.on(event, listener);
    }
}

/// Builds tracked contexts for modules
pub struct ContextFactory {
    host: HostContext,
    tracker: Arc<RegistrationTracker>,
    used_app_events: Arc<Mutex<HashSet<String>>>,
}

impl ContextFactory {
    pub fn new(host: HostContext, tracker: Arc<RegistrationTracker>) -> Self {
        Self {
            host,
            tracker,
            used_app_events: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn host(&self) -> &HostContext {
        &self.host
    }

    pub fn tracker(&self) -> &Arc<RegistrationTracker> {
        &self.tracker
    }

    /// Context for one mount of the module at `path`
    pub fn for_module(&self, path: &Path) -> ModuleContext {
        let ipc = TrackedIpcMain::new(path.to_path_buf(), self.tracker.clone());
        let app = DedupAppLifecycle {
            app: self.host.app().clone(),
            used: self.used_app_events.clone(),
        };

        ModuleContext::new(
            path.to_path_buf(),
            self.host.surface().clone(),
            Arc::new(ipc),
            Arc::new(app),
        )
    }

    /// App events subscribed so far, sorted
    pub fn used_app_events(&self) -> Vec<String> {
        let mut events: Vec<String> = self.used_app_events.lock().iter().cloned().collect();
        events.sort();
        events
    }
}
