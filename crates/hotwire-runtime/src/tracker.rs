//! Registration tracker
//!
//! Remembers every subscription a module made on the bus, keyed by module
//! path, so that all of them can be removed when the module is unmounted.
//! Request handler channels are tracked in one harness-wide list instead:
//! clearing any module drains every handler, on the convention that modules
//! register their handlers again when they are mounted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hotwire_kernel::{Handler, IpcMain, Listener};
use parking_lot::Mutex;
use tracing::debug;

/// Which handler channels a [`RegistrationTracker::clear`] removes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HandleScope {
    /// Every tracked channel, whoever registered it
    #[default]
    Harness,
    /// Only channels registered by the module being cleared
    Module,
}

impl std::str::FromStr for HandleScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "harness" | "process" => Ok(Self::Harness),
            "module" => Ok(Self::Module),
            other => Err(format!("Unknown handle scope: {}", other)),
        }
    }
}

/// Subscriptions made by one module, in registration order
#[derive(Default)]
struct RegistrationRecord {
    persistent: Vec<(String, Listener)>,
    once: Vec<(String, Listener)>,
}

impl RegistrationRecord {
    fn len(&self) -> usize {
        self.persistent.len() + self.once.len()
    }
}

struct HandleEntry {
    owner: PathBuf,
    channel: String,
}

/// What a [`RegistrationTracker::clear`] removed from the bus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub listeners_removed: usize,
    pub handlers_removed: usize,
}

/// Per-module bookkeeping of bus registrations
pub struct RegistrationTracker {
    /// The real bus
    bus: Arc<dyn IpcMain>,
    scope: HandleScope,
    records: Mutex<HashMap<PathBuf, RegistrationRecord>>,
    handle_channels: Mutex<Vec<HandleEntry>>,
}

impl RegistrationTracker {
    pub fn new(bus: Arc<dyn IpcMain>) -> Self {
        Self::with_scope(bus, HandleScope::default())
    }

    pub fn with_scope(bus: Arc<dyn IpcMain>, scope: HandleScope) -> Self {
        Self {
            bus,
            scope,
            records: Mutex::new(HashMap::new()),
            handle_channels: Mutex::new(Vec::new()),
        }
    }

    pub fn bus(&self) -> &Arc<dyn IpcMain> {
        &self.bus
    }

    pub fn scope(&self) -> HandleScope {
        self.scope
    }

    /// Track a persistent subscription of `path` and register it on the bus.
    pub fn record_persistent(&self, path: &Path, event: &str, listener: Listener) {
        self.records
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .persistent
            .push((event.to_string(), listener.clone()));
        self.bus.on(event, listener);
    }

    /// Track a one-shot subscription of `path` and register it on the bus.
    pub fn record_once(&self, path: &Path, event: &str, listener: Listener) {
        self.records
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .once
            .push((event.to_string(), listener.clone()));
        self.bus.once(event, listener);
    }

    /// Register a request handler and track its channel.
    ///
    /// Registering a channel twice leaves two entries; removal is idempotent.
    pub fn record_handle(&self, owner: &Path, channel: &str, handler: Handler) {
        self.bus.handle(channel, handler);
        self.push_channel(owner, channel);
    }

    /// Register a one-shot request handler and track its channel.
    pub fn record_handle_once(&self, owner: &Path, channel: &str, handler: Handler) {
        self.bus.handle_once(channel, handler);
        self.push_channel(owner, channel);
    }

    fn push_channel(&self, owner: &Path, channel: &str) {
        self.handle_channels.lock().push(HandleEntry {
            owner: owner.to_path_buf(),
            channel: channel.to_string(),
        });
    }

    /// Remove everything `path` subscribed, forget `path`, and drain handler
    /// channels according to the tracker's [`HandleScope`].
    pub fn clear(&self, path: &Path) -> ClearReport {
        let record = self.records.lock().remove(path);

        let mut listeners_removed = 0;
        if let Some(record) = record {
            for (event, listener) in record.persistent.iter().chain(record.once.iter()) {
                self.bus.remove_listener(event, listener);
                listeners_removed += 1;
            }
        }

        let drained: Vec<HandleEntry> = {
            let mut channels = self.handle_channels.lock();
            match self.scope {
                HandleScope::Harness => channels.drain(..).collect(),
                HandleScope::Module => {
                    let (mine, rest) = channels.drain(..).partition(|e| e.owner == path);
                    *channels = rest;
                    mine
                }
            }
        };

        for entry in &drained {
            self.bus.remove_handler(&entry.channel);
        }

        debug!(
            "Cleared {:?}: {} listener(s), {} handler channel(s)",
            path,
            listeners_removed,
            drained.len()
        );

        ClearReport {
            listeners_removed,
            handlers_removed: drained.len(),
        }
    }

    /// Whether `path` currently has a record
    pub fn has_record(&self, path: &Path) -> bool {
        self.records.lock().contains_key(path)
    }

    /// Number of tracked subscriptions (persistent and once) for `path`
    pub fn listener_count(&self, path: &Path) -> usize {
        self.records.lock().get(path).map_or(0, RegistrationRecord::len)
    }

    /// Paths with a record, sorted
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.records.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Tracked handler channels in registration order
    pub fn handle_channels(&self) -> Vec<String> {
        self.handle_channels
            .lock()
            .iter()
            .map(|e| e.channel.clone())
            .collect()
    }
}
